//! Live, ordered view of the transactions table.
//!
//! The view subscribes to the change feed before its first read, so a change
//! committed between the read and the subscription cannot be lost.

use std::sync::Arc;
use tokio::sync::watch;

use crate::domain::{newest_first, Transaction};
use crate::ports::{ChangeEvent, ChangeFeed, ChangeKind, FeedMessage, StoreResult, TransactionStore};

/// How the view reacts to a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Patch the list from the event payload; re-read only after a feed gap.
    #[default]
    Incremental,
    /// Re-read the whole table on every event.
    FullRefresh,
}

pub struct TransactionListView {
    store: Arc<dyn TransactionStore>,
    feed: ChangeFeed,
    rows: Vec<Transaction>,
    mode: RefreshMode,
}

impl TransactionListView {
    pub async fn open(store: Arc<dyn TransactionStore>, mode: RefreshMode) -> StoreResult<Self> {
        let feed = store.subscribe();
        let rows = store.list_recent().await?;
        Ok(Self {
            store,
            feed,
            rows,
            mode,
        })
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub async fn full_refresh(&mut self) -> StoreResult<()> {
        self.rows = self.store.list_recent().await?;
        tracing::debug!(rows = self.rows.len(), "Transaction list re-read");
        Ok(())
    }

    pub fn apply(&mut self, event: &ChangeEvent) {
        let tx = &event.transaction;
        self.rows.retain(|row| row.id != tx.id);

        if event.kind != ChangeKind::Delete {
            let at = self
                .rows
                .partition_point(|row| newest_first(row, tx) == std::cmp::Ordering::Less);
            self.rows.insert(at, tx.clone());
        }
    }

    /// Waits for the next feed message and folds it into the view.
    /// Returns `Ok(false)` once the feed has closed.
    pub async fn next_change(&mut self) -> StoreResult<bool> {
        match self.feed.recv().await {
            Some(FeedMessage::Event(event)) => {
                match self.mode {
                    RefreshMode::Incremental => self.apply(&event),
                    RefreshMode::FullRefresh => self.full_refresh().await?,
                }
                Ok(true)
            }
            Some(FeedMessage::Gap) => {
                tracing::info!("Change feed gap, re-reading transactions");
                self.full_refresh().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Publishes a snapshot after the initial read and after every change,
    /// until the feed closes or every receiver is gone.
    pub async fn run_until_closed(mut self, snapshots: watch::Sender<Vec<Transaction>>) -> StoreResult<()> {
        if snapshots.send(self.rows.clone()).is_err() {
            return Ok(());
        }

        while self.next_change().await? {
            if snapshots.send(self.rows.clone()).is_err() {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTransactionStore;
    use crate::domain::{FraudScore, TransactionStatus};
    use chrono::{TimeZone, Utc};

    fn tx(id: &str, secs: i64, score: i64) -> Transaction {
        Transaction::scored(
            id.to_string(),
            "U1".to_string(),
            "Bob Smith".to_string(),
            "20".parse().unwrap(),
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            FraudScore::new(score).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_apply_keeps_newest_first() {
        let store = Arc::new(MemoryTransactionStore::new());
        store.insert(&tx("TX2", 20, 10)).await.unwrap();
        let mut view = TransactionListView::open(store.clone(), RefreshMode::Incremental)
            .await
            .unwrap();

        view.apply(&ChangeEvent {
            kind: ChangeKind::Insert,
            transaction: tx("TX3", 30, 10),
        });
        view.apply(&ChangeEvent {
            kind: ChangeKind::Insert,
            transaction: tx("TX1", 10, 10),
        });

        let ids: Vec<_> = view.rows().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["TX3", "TX2", "TX1"]);
    }

    #[tokio::test]
    async fn test_update_replaces_and_delete_removes() {
        let store = Arc::new(MemoryTransactionStore::new());
        store.insert(&tx("TX1", 10, 95)).await.unwrap();
        store.insert(&tx("TX2", 20, 5)).await.unwrap();
        let mut view = TransactionListView::open(store.clone(), RefreshMode::Incremental)
            .await
            .unwrap();

        store.mark_completed("TX1").await.unwrap();
        assert!(view.next_change().await.unwrap());
        assert_eq!(view.rows().len(), 2);
        assert_eq!(view.rows()[1].status, TransactionStatus::Completed);

        store.remove("TX2").await.unwrap();
        assert!(view.next_change().await.unwrap());
        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.rows()[0].id, "TX1");
    }

    #[tokio::test]
    async fn test_gap_triggers_full_reread() {
        let store = Arc::new(MemoryTransactionStore::with_feed_capacity(1));
        let mut view = TransactionListView::open(store.clone(), RefreshMode::Incremental)
            .await
            .unwrap();

        for i in 0..3 {
            store.insert(&tx(&format!("TX{}", i), i, 10)).await.unwrap();
        }

        assert!(view.next_change().await.unwrap());
        assert_eq!(view.rows().len(), 3);
    }
}
