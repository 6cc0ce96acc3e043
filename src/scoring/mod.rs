//! Feature enrichment and risk scoring.
//!
//! The pipeline only depends on `FeatureEnricher` and the `RiskScorer` trait;
//! concrete scorers are interchangeable.

pub mod features;
pub mod remote;
pub mod scorer;

pub use features::{
    ConstantSignal, EnrichmentError, FeatureEnricher, FeatureVector, HoursSinceLastTransaction,
    RandomSignal, RecipientFrequency, Signal, SignalContext,
};
pub use remote::RemoteModelScorer;
pub use scorer::{FixedScorer, RandomScorer, RiskScorer, RuleBasedScorer, RuleWeights, ScoringError};
