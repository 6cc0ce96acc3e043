//! Transaction Store boundary.
//!
//! The store is the only shared mutable resource in the pipeline. Uniqueness of
//! ids and atomicity of update-by-id are its responsibility; callers only see
//! the `TransactionStore` trait and the change feed it hands out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::Transaction;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction {0} already exists")]
    DuplicateId(String),

    #[error("transaction {0} not found")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("corrupt transaction row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change on the transactions table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub transaction: Transaction,
}

/// Aggregate of a sender's past transactions, as seen by one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SenderActivity {
    pub last_at: Option<DateTime<Utc>>,
    pub total: u64,
    pub to_recipient: u64,
}

/// What a subscriber receives from the change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Event(ChangeEvent),
    /// Events were lost (slow subscriber or upstream reconnect); re-read the table.
    Gap,
}

/// Subscription handle to a store's change feed.
pub struct ChangeFeed {
    rx: broadcast::Receiver<FeedMessage>,
}

impl ChangeFeed {
    pub fn new(rx: broadcast::Receiver<FeedMessage>) -> Self {
        Self { rx }
    }

    /// Next message, or `None` once the store side has shut down.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        match self.rx.recv().await {
            Ok(message) => Some(message),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Change feed subscriber lagged");
                Some(FeedMessage::Gap)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert-or-fail; an existing id yields `StoreError::DuplicateId`.
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction>;

    /// Update-by-id setting `status = completed`, as one atomic operation.
    async fn mark_completed(&self, id: &str) -> StoreResult<Transaction>;

    async fn get(&self, id: &str) -> StoreResult<Transaction>;

    /// Every transaction, newest first (see `domain::newest_first`).
    async fn list_recent(&self) -> StoreResult<Vec<Transaction>>;

    /// Latest date and counts over everything `sender_id` has sent, computed by the store.
    async fn sender_activity(&self, sender_id: &str, recipient_id: &str)
        -> StoreResult<SenderActivity>;

    fn subscribe(&self) -> ChangeFeed;

    async fn ping(&self) -> StoreResult<()>;
}
