//! HTTP client for the fraud-detection service, as used by a payment form.

pub mod notice;

pub use notice::{notice_for, Notice, Severity};

use bigdecimal::BigDecimal;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::domain::Transaction;
use crate::services::{Submission, SubmissionEnvelope, SubmissionRequest};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not signed in")]
    NotAuthenticated,

    #[error("{0}")]
    Validation(String),

    #[error("a submission is already in flight")]
    Busy,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request rejected with {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("invalid service url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub token: String,
}

/// Raw form input, exactly as typed.
#[derive(Debug, Clone, Default)]
pub struct PaymentForm {
    pub recipient_id: String,
    pub amount: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct SubmissionClient {
    http: Client,
    base_url: Url,
    session: Option<Session>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the submission ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SubmissionClient {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url.as_ref()).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!("{} cannot be a base", base_url)));
        }

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            session: None,
            in_flight: AtomicBool::new(false),
        })
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn session(&self) -> Result<&Session, ClientError> {
        self.session.as_ref().ok_or(ClientError::NotAuthenticated)
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Submits the form for the signed-in user. Nothing goes over the wire
    /// unless the form passes local checks and no other submit is running.
    pub async fn submit(&self, form: &PaymentForm) -> Result<Submission, ClientError> {
        let session = self.session()?;
        let (recipient_id, amount) = check_form(form)?;

        let _guard = self.begin_submission()?;

        let envelope = SubmissionEnvelope {
            transaction: SubmissionRequest {
                sender_id: Some(session.user_id.clone()),
                recipient_id: Some(recipient_id),
                amount: Some(amount),
                ..Default::default()
            },
        };

        tracing::debug!(sender_id = %session.user_id, "Submitting transaction");
        let response = self
            .http
            .post(self.endpoint(&["fraud-detection"])?)
            .bearer_auth(&session.token)
            .json(&envelope)
            .send()
            .await?;

        decode(response).await
    }

    pub async fn approve(&self, id: &str) -> Result<Transaction, ClientError> {
        let session = self.session()?;
        let response = self
            .http
            .post(self.endpoint(&["transactions", id, "approve"])?)
            .bearer_auth(&session.token)
            .send()
            .await?;

        decode(response).await
    }

    pub async fn list(&self) -> Result<Vec<Transaction>, ClientError> {
        let session = self.session()?;
        let response = self
            .http
            .get(self.endpoint(&["transactions"])?)
            .bearer_auth(&session.token)
            .send()
            .await?;

        decode(response).await
    }

    fn begin_submission(&self) -> Result<InFlightGuard<'_>, ClientError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlightGuard(&self.in_flight))
            .map_err(|_| ClientError::Busy)
    }
}

fn check_form(form: &PaymentForm) -> Result<(String, BigDecimal), ClientError> {
    let recipient_id = form.recipient_id.trim();
    let amount = form.amount.trim();
    if recipient_id.is_empty() || amount.is_empty() {
        return Err(ClientError::Validation(
            "Please fill in all required fields.".to_string(),
        ));
    }

    let amount: BigDecimal = amount
        .parse()
        .map_err(|_| ClientError::Validation("Please enter a valid amount.".to_string()))?;
    if amount <= BigDecimal::from(0) {
        return Err(ClientError::Validation(
            "Amount must be greater than zero.".to_string(),
        ));
    }

    Ok((recipient_id.to_string(), amount))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
        return Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Rejected { status, .. } => StatusCode::from_u16(*status).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(recipient: &str, amount: &str) -> PaymentForm {
        PaymentForm {
            recipient_id: recipient.to_string(),
            amount: amount.to_string(),
        }
    }

    #[test]
    fn test_check_form() {
        let (recipient, amount) = check_form(&form(" Alice Johnson ", "50.00")).unwrap();
        assert_eq!(recipient, "Alice Johnson");
        assert_eq!(amount, "50".parse::<BigDecimal>().unwrap());

        assert!(matches!(check_form(&form("", "5")), Err(ClientError::Validation(_))));
        assert!(matches!(check_form(&form("Bob", "")), Err(ClientError::Validation(_))));
        assert!(matches!(check_form(&form("Bob", "abc")), Err(ClientError::Validation(_))));
        assert!(matches!(check_form(&form("Bob", "0")), Err(ClientError::Validation(_))));
        assert!(matches!(check_form(&form("Bob", "-3")), Err(ClientError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unauthenticated_submit_fails_locally() {
        let client = SubmissionClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.submit(&form("Bob", "5")).await.unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client =
            SubmissionClient::new("http://127.0.0.1:9/api/", Duration::from_secs(1)).unwrap();
        let url = client.endpoint(&["transactions", "TX 1/../x", "approve"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9/api/transactions/TX%201%2F..%2Fx/approve"
        );
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(matches!(
            SubmissionClient::new("not a url", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            SubmissionClient::new("mailto:ops@example.com", Duration::from_secs(1)),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_guard_resets_flag() {
        let client = SubmissionClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        {
            let _guard = client.begin_submission().unwrap();
            assert!(client.is_submitting());
            assert!(matches!(client.begin_submission(), Err(ClientError::Busy)));
        }
        assert!(!client.is_submitting());
    }
}
