use serde::Serialize;

use crate::client::ClientError;
use crate::domain::TransactionStatus;
use crate::services::Submission;

pub const GENERIC_FAILURE: &str = "Failed to process transaction. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// User-facing summary of a submit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    fn new(title: &str, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            severity,
        }
    }
}

/// Server-side failure detail never reaches the notice.
pub fn notice_for(result: &Result<Submission, ClientError>) -> Notice {
    match result {
        Ok(submission) if submission.transaction.status == TransactionStatus::Flagged => {
            Notice::new("Transaction Flagged", submission.message.clone(), Severity::Warning)
        }
        Ok(submission) => Notice::new("Transaction Completed", submission.message.clone(), Severity::Info),
        Err(ClientError::NotAuthenticated) => Notice::new(
            "Authentication Required",
            "You must be logged in to make transactions.",
            Severity::Error,
        ),
        Err(ClientError::Validation(message)) => {
            Notice::new("Validation Error", message.clone(), Severity::Error)
        }
        Err(ClientError::Busy) => Notice::new(
            "Submission In Progress",
            "Please wait for the current transaction to finish.",
            Severity::Info,
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Transaction submission failed");
            Notice::new("Transaction Error", GENERIC_FAILURE, Severity::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FraudScore, Transaction};
    use chrono::Utc;

    fn submission(score: i64) -> Submission {
        Submission::new(Transaction::scored(
            "TX1".to_string(),
            "U1".to_string(),
            "Alice Johnson".to_string(),
            "50".parse().unwrap(),
            Utc::now(),
            FraudScore::new(score).unwrap(),
        ))
    }

    #[test]
    fn test_outcome_notices() {
        let flagged = notice_for(&Ok(submission(81)));
        assert_eq!(flagged.title, "Transaction Flagged");
        assert_eq!(flagged.severity, Severity::Warning);

        let completed = notice_for(&Ok(submission(80)));
        assert_eq!(completed.title, "Transaction Completed");
        assert_eq!(completed.severity, Severity::Info);
    }

    #[test]
    fn test_failure_hides_detail() {
        let notice = notice_for(&Err(ClientError::Rejected {
            status: 500,
            message: "Failed to store transaction".to_string(),
        }));
        assert_eq!(notice.title, "Transaction Error");
        assert_eq!(notice.description, GENERIC_FAILURE);
    }

    #[test]
    fn test_local_failures() {
        assert_eq!(
            notice_for(&Err(ClientError::NotAuthenticated)).title,
            "Authentication Required"
        );
        assert_eq!(
            notice_for(&Err(ClientError::Validation("x".to_string()))).title,
            "Validation Error"
        );
        assert_eq!(notice_for(&Err(ClientError::Busy)).title, "Submission In Progress");
    }
}
