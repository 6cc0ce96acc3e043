//! Transaction submission pipeline.
//! Authenticate, authorize, validate, enrich, score, persist. Any failure
//! before persistence leaves the store untouched.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{Transaction, TransactionIdGenerator, TransactionStatus};
use crate::error::AppError;
use crate::middleware::auth::{Authenticator, CallerId};
use crate::ports::{StoreError, TransactionStore};
use crate::scoring::{FeatureEnricher, RiskScorer, ScoringError, SignalContext};
use crate::validation::{self, ValidationError};

/// Attempts at finding a free generated id before giving up.
pub const MAX_ID_ATTEMPTS: usize = 5;

pub const COMPLETED_MESSAGE: &str = "Transaction was processed successfully.";
pub const FLAGGED_MESSAGE: &str = "Transaction was flagged for review due to suspicious activity.";

/// Raw submission as sent by a client. Everything is optional here so that
/// missing fields surface as validation errors rather than decode failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default, with = "crate::domain::amount::option")]
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Wire envelope: `{ "transaction": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionEnvelope {
    pub transaction: SubmissionRequest,
}

/// Successful outcome: the persisted transaction and a message keyed on its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub transaction: Transaction,
    pub message: String,
}

impl Submission {
    pub fn new(transaction: Transaction) -> Self {
        let message = outcome_message(transaction.status).to_string();
        Self {
            transaction,
            message,
        }
    }
}

pub fn outcome_message(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Flagged => FLAGGED_MESSAGE,
        TransactionStatus::Completed | TransactionStatus::Pending => COMPLETED_MESSAGE,
    }
}

struct ValidatedRequest {
    id: Option<String>,
    recipient_id: String,
    amount: BigDecimal,
    date: Option<DateTime<Utc>>,
}

pub struct ScoringService {
    store: Arc<dyn TransactionStore>,
    authenticator: Arc<dyn Authenticator>,
    enricher: Arc<FeatureEnricher>,
    scorer: Arc<dyn RiskScorer>,
    ids: TransactionIdGenerator,
}

impl ScoringService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        authenticator: Arc<dyn Authenticator>,
        enricher: Arc<FeatureEnricher>,
        scorer: Arc<dyn RiskScorer>,
    ) -> Self {
        Self {
            store,
            authenticator,
            enricher,
            scorer,
            ids: TransactionIdGenerator::new(),
        }
    }

    pub async fn submit(
        &self,
        request: SubmissionRequest,
        bearer: Option<&str>,
    ) -> Result<Submission, AppError> {
        let caller = self.authenticator.authenticate(bearer).await?;
        let sender_id = authorize_sender(&caller, request.sender_id.as_deref())?;
        let request = validate(request)?;

        let now = Utc::now();
        let features = self
            .enricher
            .enrich(&SignalContext {
                sender_id: &sender_id,
                recipient_id: &request.recipient_id,
                amount: &request.amount,
                now,
            })
            .await
            .map_err(ScoringError::from)?;

        let fraud_score = self.scorer.score(&features).await?;
        let date = request.date.unwrap_or(now);

        let transaction = self
            .persist(request.id, |id| {
                Transaction::scored(
                    id,
                    sender_id.clone(),
                    request.recipient_id.clone(),
                    request.amount.clone(),
                    date,
                    fraud_score,
                )
            })
            .await?;

        tracing::info!(
            transaction_id = %transaction.id,
            sender_id = %transaction.sender_id,
            fraud_score = fraud_score.value(),
            status = %transaction.status,
            scorer = self.scorer.name(),
            "Transaction scored and stored"
        );

        Ok(Submission::new(transaction))
    }

    /// Inserts the transaction. Generated ids are retried on collision; a
    /// caller-supplied id that collides is a persistence error.
    async fn persist<F>(&self, supplied_id: Option<String>, build: F) -> Result<Transaction, AppError>
    where
        F: Fn(String) -> Transaction,
    {
        if let Some(id) = supplied_id {
            return Ok(self.store.insert(&build(id)).await?);
        }

        let mut last_collision = None;
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let candidate = build(self.ids.next_id());
            match self.store.insert(&candidate).await {
                Ok(stored) => return Ok(stored),
                Err(StoreError::DuplicateId(id)) => {
                    tracing::warn!(transaction_id = %id, attempt, "Generated id collided, retrying");
                    last_collision = Some(id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::DuplicateId(last_collision.unwrap_or_default()).into())
    }
}

/// The request must name the authenticated caller as its sender.
fn authorize_sender(caller: &CallerId, sender_id: Option<&str>) -> Result<String, AppError> {
    match sender_id {
        Some(sender) if sender == caller.as_str() => Ok(sender.to_string()),
        other => Err(AppError::Authorization(format!(
            "caller {} submitted for sender {}",
            caller,
            other.unwrap_or("<none>")
        ))),
    }
}

fn validate(request: SubmissionRequest) -> Result<ValidatedRequest, ValidationError> {
    let amount = validation::validate_positive_amount(request.amount.as_ref())?;
    let recipient_id = validation::validate_recipient(request.recipient_id.as_deref())?;
    if let Some(id) = request.id.as_deref() {
        validation::validate_transaction_id(id)?;
    }

    Ok(ValidatedRequest {
        id: request.id,
        recipient_id,
        amount,
        date: request.date,
    })
}
