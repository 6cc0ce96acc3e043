//! Manual review: moving a transaction to `completed`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::middleware::auth::{Authenticator, CallerId};
use crate::ports::TransactionStore;

/// Decides whether a caller may approve a given transaction.
pub trait ReviewPolicy: Send + Sync {
    fn can_review(&self, caller: &CallerId, transaction: &Transaction) -> bool;
}

/// Any authenticated caller may approve any transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyAuthenticatedReviewer;

impl ReviewPolicy for AnyAuthenticatedReviewer {
    fn can_review(&self, _caller: &CallerId, _transaction: &Transaction) -> bool {
        true
    }
}

/// Only the configured reviewer ids may approve.
#[derive(Debug, Clone, Default)]
pub struct ReviewerAllowList {
    reviewers: HashSet<String>,
}

impl ReviewerAllowList {
    pub fn new<I, S>(reviewers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reviewers: reviewers.into_iter().map(Into::into).collect(),
        }
    }
}

impl ReviewPolicy for ReviewerAllowList {
    fn can_review(&self, caller: &CallerId, _transaction: &Transaction) -> bool {
        self.reviewers.contains(caller.as_str())
    }
}

pub struct ReviewService {
    store: Arc<dyn TransactionStore>,
    authenticator: Arc<dyn Authenticator>,
    policy: Arc<dyn ReviewPolicy>,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        authenticator: Arc<dyn Authenticator>,
        policy: Arc<dyn ReviewPolicy>,
    ) -> Self {
        Self {
            store,
            authenticator,
            policy,
        }
    }

    /// Sets `status = completed`, whatever the current status. Approving twice is a no-op.
    pub async fn approve(&self, id: &str, bearer: Option<&str>) -> Result<Transaction, AppError> {
        let caller = self.authenticator.authenticate(bearer).await?;
        let current = self.store.get(id).await?;

        if !self.policy.can_review(&caller, &current) {
            return Err(AppError::Authorization(format!(
                "caller {} may not review transaction {}",
                caller, id
            )));
        }

        let updated = self.store.mark_completed(id).await?;
        tracing::info!(
            transaction_id = %id,
            reviewer = %caller,
            previous_status = %current.status,
            "Transaction approved"
        );
        Ok(updated)
    }
}
