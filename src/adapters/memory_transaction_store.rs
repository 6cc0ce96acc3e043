//! In-process implementation of TransactionStore.
//! Used when no database is configured and throughout the test suite.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::adapters::DEFAULT_FEED_CAPACITY;
use crate::domain::{newest_first, Transaction};
use crate::ports::{
    ChangeEvent, ChangeFeed, ChangeKind, FeedMessage, SenderActivity, StoreError, StoreResult,
    TransactionStore,
};

pub struct MemoryTransactionStore {
    rows: RwLock<HashMap<String, Transaction>>,
    changes: broadcast::Sender<FeedMessage>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            rows: RwLock::new(HashMap::new()),
            changes,
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Store-level housekeeping; the pipeline itself never deletes.
    pub async fn remove(&self, id: &str) -> StoreResult<Transaction> {
        let removed = self
            .rows
            .write()
            .await
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.publish(ChangeKind::Delete, &removed);
        Ok(removed)
    }

    fn publish(&self, kind: ChangeKind, tx: &Transaction) {
        // No subscribers is not an error.
        let _ = self.changes.send(FeedMessage::Event(ChangeEvent {
            kind,
            transaction: tx.clone(),
        }));
    }
}

impl Default for MemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&tx.id) {
            return Err(StoreError::DuplicateId(tx.id.clone()));
        }
        rows.insert(tx.id.clone(), tx.clone());
        self.publish(ChangeKind::Insert, tx);
        Ok(tx.clone())
    }

    async fn mark_completed(&self, id: &str) -> StoreResult<Transaction> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.approve();
        let updated = row.clone();
        self.publish(ChangeKind::Update, &updated);
        Ok(updated)
    }

    async fn get(&self, id: &str) -> StoreResult<Transaction> {
        self.rows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_recent(&self) -> StoreResult<Vec<Transaction>> {
        let mut all: Vec<Transaction> = self.rows.read().await.values().cloned().collect();
        all.sort_by(newest_first);
        Ok(all)
    }

    async fn sender_activity(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> StoreResult<SenderActivity> {
        let rows = self.rows.read().await;
        let activity = rows
            .values()
            .filter(|tx| tx.sender_id == sender_id)
            .fold(SenderActivity::default(), |mut acc, tx| {
                acc.total += 1;
                if tx.recipient_id == recipient_id {
                    acc.to_recipient += 1;
                }
                acc.last_at = acc.last_at.max(Some(tx.date));
                acc
            });
        Ok(activity)
    }

    fn subscribe(&self) -> ChangeFeed {
        ChangeFeed::new(self.changes.subscribe())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
