//! Risk scorers.
//!
//! A scorer maps a feature vector to a `FraudScore` and nothing else: the
//! flagged/completed decision belongs to the scoring service.

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

use crate::domain::FraudScore;
use crate::scoring::features::{EnrichmentError, FeatureVector};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("feature enrichment failed: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("model request failed: {0}")]
    Request(String),

    #[error("model service returned {0}")]
    Status(u16),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[async_trait]
pub trait RiskScorer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn score(&self, features: &FeatureVector) -> Result<FraudScore, ScoringError>;
}

/// Always returns the same score. Useful for wiring tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub FraudScore);

#[async_trait]
impl RiskScorer for FixedScorer {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn score(&self, _features: &FeatureVector) -> Result<FraudScore, ScoringError> {
        Ok(self.0)
    }
}

/// Uniform score in `0..100`, ignoring the features. Reference behaviour only.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomScorer;

#[async_trait]
impl RiskScorer for RandomScorer {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn score(&self, _features: &FeatureVector) -> Result<FraudScore, ScoringError> {
        let raw = rand::thread_rng().gen_range(0..100);
        FraudScore::new(raw).map_err(|e| ScoringError::InvalidResponse(e.to_string()))
    }
}

/// Additive rule weights. The defaults sum to 100.
#[derive(Debug, Clone)]
pub struct RuleWeights {
    pub night_hours: u8,
    pub rapid_repeat: u8,
    pub rare_recipient: u8,
    pub long_distance: u8,
    pub large_amount: u8,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            night_hours: 25,
            rapid_repeat: 20,
            rare_recipient: 20,
            long_distance: 20,
            large_amount: 15,
        }
    }
}

/// Deterministic rules modelled on the usual fraud profile: late-night activity,
/// bursts of payments, new or rare payees, far-away payees, and large amounts.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedScorer {
    weights: RuleWeights,
}

impl RuleBasedScorer {
    pub fn new(weights: RuleWeights) -> Self {
        Self { weights }
    }

    fn raw_score(&self, f: &FeatureVector) -> u32 {
        let w = &self.weights;
        let mut score = 0u32;

        if f.hour_of_day < 5 {
            score += u32::from(w.night_hours);
        }

        if f.time_since_last_tx < 0.25 {
            score += u32::from(w.rapid_repeat);
        } else if f.time_since_last_tx < 1.0 {
            score += u32::from(w.rapid_repeat) / 2;
        }

        if f.recipient_frequency < 0.05 {
            score += u32::from(w.rare_recipient);
        } else if f.recipient_frequency < 0.2 {
            score += u32::from(w.rare_recipient) / 2;
        }

        if f.distance_to_recipient_km > 100.0 {
            score += u32::from(w.long_distance);
        } else if f.distance_to_recipient_km > 50.0 {
            score += u32::from(w.long_distance) / 2;
        }

        if f.amount > 1000.0 {
            score += u32::from(w.large_amount);
        } else if f.amount > 400.0 {
            score += u32::from(w.large_amount) * 2 / 3;
        }

        score.min(u32::from(FraudScore::MAX))
    }
}

#[async_trait]
impl RiskScorer for RuleBasedScorer {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn score(&self, features: &FeatureVector) -> Result<FraudScore, ScoringError> {
        FraudScore::new(i64::from(self.raw_score(features)))
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))
    }
}
