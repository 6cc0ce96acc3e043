//! Feature enrichment for a raw transaction request.
//!
//! `hour_of_day` comes from the submission time. The three history features are
//! separate `Signal` slots so each one can be backed by random placeholders,
//! store history, or an external source without touching scorers or services.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::ports::{SenderActivity, TransactionStore};

/// Upper bound reported for `time_since_last_tx` when a sender has no usable history.
pub const MAX_HOURS_SINCE_LAST_TX: f64 = 48.0;
pub const MAX_RANDOM_DISTANCE_KM: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub amount: f64,
    pub hour_of_day: u32,
    pub time_since_last_tx: f64,
    pub recipient_frequency: f64,
    pub distance_to_recipient_km: f64,
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("signal {signal} unavailable: {reason}")]
    Unavailable { signal: &'static str, reason: String },

    #[error("signal {signal} produced {value}, outside its valid range")]
    OutOfRange { signal: &'static str, value: f64 },

    #[error("amount is not representable as a feature")]
    Amount,
}

/// Inputs every signal may look at.
#[derive(Debug, Clone)]
pub struct SignalContext<'a> {
    pub sender_id: &'a str,
    pub recipient_id: &'a str,
    pub amount: &'a BigDecimal,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait Signal: Send + Sync {
    fn name(&self) -> &'static str;

    async fn compute(&self, ctx: &SignalContext<'_>) -> Result<f64, EnrichmentError>;
}

/// Uniform random value in `[low, high)`. Placeholder until real data exists.
pub struct RandomSignal {
    name: &'static str,
    low: f64,
    high: f64,
}

impl RandomSignal {
    pub fn new(name: &'static str, low: f64, high: f64) -> Self {
        Self { name, low, high }
    }

    pub fn hours_since_last_tx() -> Self {
        Self::new("time_since_last_tx", 0.0, MAX_HOURS_SINCE_LAST_TX)
    }

    pub fn recipient_frequency() -> Self {
        Self::new("recipient_frequency", 0.0, 1.0)
    }

    pub fn distance_km() -> Self {
        Self::new("distance_to_recipient_km", 0.0, MAX_RANDOM_DISTANCE_KM)
    }
}

#[async_trait]
impl Signal for RandomSignal {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn compute(&self, _ctx: &SignalContext<'_>) -> Result<f64, EnrichmentError> {
        Ok(rand::thread_rng().gen_range(self.low..self.high))
    }
}

pub struct ConstantSignal {
    name: &'static str,
    value: f64,
}

impl ConstantSignal {
    pub fn new(name: &'static str, value: f64) -> Self {
        Self { name, value }
    }
}

#[async_trait]
impl Signal for ConstantSignal {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn compute(&self, _ctx: &SignalContext<'_>) -> Result<f64, EnrichmentError> {
        Ok(self.value)
    }
}

/// Hours since the sender's most recent transaction to any recipient, capped.
pub struct HoursSinceLastTransaction {
    store: Arc<dyn TransactionStore>,
    cap_hours: f64,
}

impl HoursSinceLastTransaction {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self {
            store,
            cap_hours: MAX_HOURS_SINCE_LAST_TX,
        }
    }
}

#[async_trait]
impl Signal for HoursSinceLastTransaction {
    fn name(&self) -> &'static str {
        "time_since_last_tx"
    }

    async fn compute(&self, ctx: &SignalContext<'_>) -> Result<f64, EnrichmentError> {
        let activity = sender_activity(&*self.store, self.name(), ctx).await?;

        Ok(match activity.last_at {
            Some(at) => {
                let hours = (ctx.now - at).num_seconds() as f64 / 3600.0;
                hours.clamp(0.0, self.cap_hours)
            }
            None => self.cap_hours,
        })
    }
}

/// Share of the sender's past transactions that went to this recipient.
pub struct RecipientFrequency {
    store: Arc<dyn TransactionStore>,
}

impl RecipientFrequency {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Signal for RecipientFrequency {
    fn name(&self) -> &'static str {
        "recipient_frequency"
    }

    async fn compute(&self, ctx: &SignalContext<'_>) -> Result<f64, EnrichmentError> {
        let activity = sender_activity(&*self.store, self.name(), ctx).await?;

        if activity.total == 0 {
            return Ok(0.0);
        }
        Ok(activity.to_recipient as f64 / activity.total as f64)
    }
}

async fn sender_activity(
    store: &dyn TransactionStore,
    signal: &'static str,
    ctx: &SignalContext<'_>,
) -> Result<SenderActivity, EnrichmentError> {
    store
        .sender_activity(ctx.sender_id, ctx.recipient_id)
        .await
        .map_err(|e| EnrichmentError::Unavailable {
            signal,
            reason: e.to_string(),
        })
}

pub struct FeatureEnricher {
    time_since_last_tx: Box<dyn Signal>,
    recipient_frequency: Box<dyn Signal>,
    distance_to_recipient_km: Box<dyn Signal>,
}

impl FeatureEnricher {
    pub fn new(
        time_since_last_tx: Box<dyn Signal>,
        recipient_frequency: Box<dyn Signal>,
        distance_to_recipient_km: Box<dyn Signal>,
    ) -> Self {
        Self {
            time_since_last_tx,
            recipient_frequency,
            distance_to_recipient_km,
        }
    }

    /// All three history features drawn at random.
    pub fn random() -> Self {
        Self::new(
            Box::new(RandomSignal::hours_since_last_tx()),
            Box::new(RandomSignal::recipient_frequency()),
            Box::new(RandomSignal::distance_km()),
        )
    }

    /// History features computed from the store. There is no location data, so
    /// distance stays neutral.
    pub fn from_history(store: Arc<dyn TransactionStore>) -> Self {
        Self::new(
            Box::new(HoursSinceLastTransaction::new(store.clone())),
            Box::new(RecipientFrequency::new(store)),
            Box::new(ConstantSignal::new("distance_to_recipient_km", 0.0)),
        )
    }

    pub fn with_distance(mut self, signal: Box<dyn Signal>) -> Self {
        self.distance_to_recipient_km = signal;
        self
    }

    pub async fn enrich(&self, ctx: &SignalContext<'_>) -> Result<FeatureVector, EnrichmentError> {
        let amount = ctx
            .amount
            .to_f64()
            .filter(|a| a.is_finite())
            .ok_or(EnrichmentError::Amount)?;

        let time_since_last_tx = checked(&*self.time_since_last_tx, ctx, f64::INFINITY).await?;
        let recipient_frequency = checked(&*self.recipient_frequency, ctx, 1.0).await?;
        let distance_to_recipient_km =
            checked(&*self.distance_to_recipient_km, ctx, f64::INFINITY).await?;

        let features = FeatureVector {
            amount,
            hour_of_day: ctx.now.hour(),
            time_since_last_tx,
            recipient_frequency,
            distance_to_recipient_km,
        };
        tracing::debug!(?features, "Transaction enriched");
        Ok(features)
    }
}

async fn checked(
    signal: &dyn Signal,
    ctx: &SignalContext<'_>,
    max: f64,
) -> Result<f64, EnrichmentError> {
    let value = signal.compute(ctx).await?;
    if value.is_nan() || value < 0.0 || value > max {
        return Err(EnrichmentError::OutOfRange {
            signal: signal.name(),
            value,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTransactionStore;
    use crate::domain::{FraudScore, Transaction};
    use chrono::{Duration, TimeZone};

    fn ctx<'a>(amount: &'a BigDecimal, now: DateTime<Utc>) -> SignalContext<'a> {
        SignalContext {
            sender_id: "U1",
            recipient_id: "Alice Johnson",
            amount,
            now,
        }
    }

    async fn seed(store: &MemoryTransactionStore, id: &str, recipient: &str, at: DateTime<Utc>) {
        store
            .insert(&Transaction::scored(
                id.to_string(),
                "U1".to_string(),
                recipient.to_string(),
                "10".parse().unwrap(),
                at,
                FraudScore::new(5).unwrap(),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_random_features_stay_in_range() {
        let enricher = FeatureEnricher::random();
        let amount: BigDecimal = "50.00".parse().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 14, 5, 0).unwrap();

        for _ in 0..200 {
            let f = enricher.enrich(&ctx(&amount, now)).await.unwrap();
            assert_eq!(f.hour_of_day, 14);
            assert_eq!(f.amount, 50.0);
            assert!((0.0..MAX_HOURS_SINCE_LAST_TX).contains(&f.time_since_last_tx));
            assert!((0.0..1.0).contains(&f.recipient_frequency));
            assert!((0.0..MAX_RANDOM_DISTANCE_KM).contains(&f.distance_to_recipient_km));
        }
    }

    #[tokio::test]
    async fn test_history_features_from_store() {
        let store = Arc::new(MemoryTransactionStore::new());
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        seed(&store, "TX1", "Alice Johnson", now - Duration::hours(30)).await;
        seed(&store, "TX2", "Bob Smith", now - Duration::hours(6)).await;
        seed(&store, "TX3", "Alice Johnson", now - Duration::hours(10)).await;
        seed(&store, "TX4", "Carol Danvers", now - Duration::hours(20)).await;

        let enricher = FeatureEnricher::from_history(store);
        let amount: BigDecimal = "5".parse().unwrap();
        let f = enricher.enrich(&ctx(&amount, now)).await.unwrap();

        assert_eq!(f.time_since_last_tx, 6.0);
        assert_eq!(f.recipient_frequency, 0.5);
        assert_eq!(f.distance_to_recipient_km, 0.0);
    }

    #[tokio::test]
    async fn test_history_features_for_new_sender() {
        let store = Arc::new(MemoryTransactionStore::new());
        let enricher = FeatureEnricher::from_history(store);
        let amount: BigDecimal = "5".parse().unwrap();

        let f = enricher.enrich(&ctx(&amount, Utc::now())).await.unwrap();

        assert_eq!(f.time_since_last_tx, MAX_HOURS_SINCE_LAST_TX);
        assert_eq!(f.recipient_frequency, 0.0);
    }

    #[tokio::test]
    async fn test_slot_is_replaceable_and_checked() {
        let enricher = FeatureEnricher::random()
            .with_distance(Box::new(ConstantSignal::new("distance_to_recipient_km", 420.0)));
        let amount: BigDecimal = "5".parse().unwrap();
        let f = enricher.enrich(&ctx(&amount, Utc::now())).await.unwrap();
        assert_eq!(f.distance_to_recipient_km, 420.0);

        let broken = FeatureEnricher::new(
            Box::new(ConstantSignal::new("time_since_last_tx", 1.0)),
            Box::new(ConstantSignal::new("recipient_frequency", 1.5)),
            Box::new(ConstantSignal::new("distance_to_recipient_km", 0.0)),
        );
        let err = broken.enrich(&ctx(&amount, Utc::now())).await.unwrap_err();
        assert!(matches!(
            err,
            EnrichmentError::OutOfRange {
                signal: "recipient_frequency",
                ..
            }
        ));
    }
}
