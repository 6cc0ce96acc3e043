//! Postgres implementation of TransactionStore.
//!
//! The change feed is driven by `LISTEN/NOTIFY`: the `transactions_notify_change`
//! trigger (see `migrations/`) publishes every row change on `CHANGE_CHANNEL`
//! as `{"kind": TG_OP, "transaction": <row>}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::adapters::DEFAULT_FEED_CAPACITY;
use crate::domain::{FraudScore, Transaction};
use crate::ports::{
    ChangeEvent, ChangeFeed, FeedMessage, SenderActivity, StoreError, StoreResult,
    TransactionStore,
};

pub const CHANGE_CHANNEL: &str = "transactions_changes";

const COLUMNS: &str = "id, sender_id, recipient_id, amount, date, status, fraud_score";

/// Postgres-backed transaction store.
pub struct PostgresTransactionStore {
    pool: PgPool,
    changes: broadcast::Sender<FeedMessage>,
    listener_task: JoinHandle<()>,
}

impl PostgresTransactionStore {
    /// Wraps `pool` and starts forwarding table notifications to subscribers.
    pub async fn connect(pool: PgPool) -> StoreResult<Self> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (changes, _) = broadcast::channel(DEFAULT_FEED_CAPACITY);
        let listener_task = tokio::spawn(forward_notifications(listener, changes.clone()));

        tracing::info!(channel = CHANGE_CHANNEL, "Listening for transaction changes");

        Ok(Self {
            pool,
            changes,
            listener_task,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Drop for PostgresTransactionStore {
    fn drop(&mut self) {
        self.listener_task.abort();
    }
}

async fn forward_notifications(mut listener: PgListener, changes: broadcast::Sender<FeedMessage>) {
    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                    Ok(event) => {
                        let _ = changes.send(FeedMessage::Event(event));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Undecodable change notification");
                        let _ = changes.send(FeedMessage::Gap);
                    }
                }
            }
            Ok(None) => {
                // Connection dropped; notifications sent meanwhile are gone.
                tracing::warn!("Change feed connection lost, reconnecting");
                let _ = changes.send(FeedMessage::Gap);
            }
            Err(e) => {
                tracing::error!(error = %e, "Change feed listener error");
                let _ = changes.send(FeedMessage::Gap);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn map_insert_error(id: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateId(id.to_string())
        }
        _ => StoreError::from(err),
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&tx.id)
        .bind(&tx.sender_id)
        .bind(&tx.recipient_id)
        .bind(&tx.amount)
        .bind(tx.date)
        .bind(tx.status.as_str())
        .bind(i32::from(tx.fraud_score.value()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(&tx.id, e))?;

        row.into_domain()
    }

    async fn mark_completed(&self, id: &str) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE transactions SET status = 'completed' WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn get(&self, id: &str) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn list_recent(&self) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {COLUMNS} FROM transactions ORDER BY date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn sender_activity(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> StoreResult<SenderActivity> {
        let (last_at, total, to_recipient): (Option<DateTime<Utc>>, i64, i64) = sqlx::query_as(
            r#"
            SELECT MAX(date),
                   COUNT(*),
                   COUNT(*) FILTER (WHERE recipient_id = $2)
            FROM transactions
            WHERE sender_id = $1
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        let count = |n: i64| {
            u64::try_from(n).map_err(|_| StoreError::Corrupt(format!("negative count {}", n)))
        };
        Ok(SenderActivity {
            last_at,
            total: count(total)?,
            to_recipient: count(to_recipient)?,
        })
    }

    fn subscribe(&self) -> ChangeFeed {
        ChangeFeed::new(self.changes.subscribe())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    sender_id: String,
    recipient_id: String,
    amount: bigdecimal::BigDecimal,
    date: DateTime<Utc>,
    status: String,
    fraud_score: i32,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let status = self
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.id, e)))?;
        let fraud_score = FraudScore::new(i64::from(self.fraud_score))
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.id, e)))?;

        Ok(Transaction {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            amount: self.amount,
            date: self.date,
            status,
            fraud_score,
        })
    }
}
