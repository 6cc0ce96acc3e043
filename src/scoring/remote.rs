use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::FraudScore;
use crate::scoring::features::FeatureVector;
use crate::scoring::scorer::{RiskScorer, ScoringError};

pub const DETECT_PATH: &str = "/api/v1/detect-fraud";

/// Response body of the model service.
#[derive(Debug, Deserialize)]
struct ModelResponse {
    fraud_score: i64,
    #[serde(default)]
    model_type: Option<String>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Scores by calling an external model service over HTTP.
#[derive(Clone)]
pub struct RemoteModelScorer {
    client: Client,
    base_url: String,
    model_type: String,
    model_version: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl RemoteModelScorer {
    /// Three consecutive failures open the breaker for 60-120 seconds.
    pub fn new(
        base_url: String,
        model_type: String,
        model_version: String,
        timeout: Duration,
    ) -> Result<Self, ScoringError> {
        Self::with_circuit_breaker(base_url, model_type, model_version, timeout, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        model_type: String,
        model_version: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScoringError::Request(e.to_string()))?;

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Ok(Self {
            client,
            base_url,
            model_type,
            model_version,
            circuit_breaker,
        })
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RiskScorer for RemoteModelScorer {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn score(&self, features: &FeatureVector) -> Result<FraudScore, ScoringError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), DETECT_PATH);
        let request = self
            .client
            .post(&url)
            .header("X-Model-Type", &self.model_type)
            .header("X-Model-Version", &self.model_version)
            .json(features);

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| ScoringError::Request(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(ScoringError::Status(response.status().as_u16()));
                }

                // A body that stalls past the timeout is a failed request, not a bad answer.
                response.json::<ModelResponse>().await.map_err(|e| {
                    if e.is_timeout() {
                        ScoringError::Request(e.to_string())
                    } else {
                        ScoringError::InvalidResponse(e.to_string())
                    }
                })
            })
            .await;

        let body = match result {
            Ok(body) => body,
            Err(FailsafeError::Rejected) => {
                return Err(ScoringError::CircuitBreakerOpen(
                    "model service circuit breaker is open".to_string(),
                ))
            }
            Err(FailsafeError::Inner(e)) => return Err(e),
        };

        if let Some(error) = body.error.filter(|e| !e.is_empty()) {
            return Err(ScoringError::InvalidResponse(error));
        }

        let score = FraudScore::new(body.fraud_score)
            .map_err(|e| ScoringError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            score = score.value(),
            model_type = body.model_type.as_deref().unwrap_or(self.model_type.as_str()),
            model_version = body.model_version.as_deref().unwrap_or(self.model_version.as_str()),
            "Model scored transaction"
        );
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scorer_starts_closed() {
        let scorer = RemoteModelScorer::new(
            "http://localhost:8080".to_string(),
            "xgboost".to_string(),
            "v1".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(scorer.circuit_state(), "closed");
        assert_eq!(scorer.base_url(), "http://localhost:8080");
    }
}
