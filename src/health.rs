use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::ports::TransactionStore;
use crate::scoring::RemoteModelScorer;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    fn name(&self) -> &'static str;

    /// A failing critical dependency makes the whole service unhealthy.
    fn is_critical(&self) -> bool;

    async fn check(&self) -> DependencyStatus;
}

pub struct StoreChecker {
    store: Arc<dyn TransactionStore>,
}

impl StoreChecker {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DependencyChecker for StoreChecker {
    fn name(&self) -> &'static str {
        "store"
    }

    fn is_critical(&self) -> bool {
        true
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.store.ping().await {
            Ok(_) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::Unhealthy {
                status: "unhealthy".to_string(),
                error: e.to_string(),
            },
        }
    }
}

/// Reports the remote model's circuit breaker; an open breaker degrades the service.
pub struct ModelChecker {
    scorer: RemoteModelScorer,
}

impl ModelChecker {
    pub fn new(scorer: RemoteModelScorer) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl DependencyChecker for ModelChecker {
    fn name(&self) -> &'static str {
        "model"
    }

    fn is_critical(&self) -> bool {
        false
    }

    async fn check(&self) -> DependencyStatus {
        match self.scorer.circuit_state() {
            "closed" => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: 0,
            },
            state => DependencyStatus::Unhealthy {
                status: "unhealthy".to_string(),
                error: format!("circuit breaker {}", state),
            },
        }
    }
}

pub async fn check_health(
    checkers: &[Arc<dyn DependencyChecker>],
    start_time: Instant,
) -> HealthResponse {
    let timeout_duration = Duration::from_secs(5);

    let results = futures::future::join_all(
        checkers
            .iter()
            .map(|checker| timeout(timeout_duration, checker.check())),
    )
    .await;

    let mut dependencies = HashMap::new();
    let mut critical = Vec::new();
    for (checker, result) in checkers.iter().zip(results) {
        if checker.is_critical() {
            critical.push(checker.name());
        }
        dependencies.insert(
            checker.name().to_string(),
            result.unwrap_or_else(|_| DependencyStatus::Unhealthy {
                status: "unhealthy".to_string(),
                error: "timeout".to_string(),
            }),
        );
    }

    HealthResponse {
        status: determine_overall_status(&dependencies, &critical),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}

fn determine_overall_status(
    dependencies: &HashMap<String, DependencyStatus>,
    critical_deps: &[&str],
) -> String {
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (name, status) in dependencies {
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if critical_deps.contains(&name.as_str()) {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
    }

    if has_critical_failure {
        "unhealthy".to_string()
    } else if has_non_critical_failure {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryTransactionStore;

    fn unhealthy() -> DependencyStatus {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: "down".to_string(),
        }
    }

    fn healthy() -> DependencyStatus {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: 1,
        }
    }

    #[test]
    fn test_overall_status() {
        let mut deps = HashMap::new();
        deps.insert("store".to_string(), healthy());
        deps.insert("model".to_string(), healthy());
        assert_eq!(determine_overall_status(&deps, &["store"]), "healthy");

        deps.insert("model".to_string(), unhealthy());
        assert_eq!(determine_overall_status(&deps, &["store"]), "degraded");

        deps.insert("store".to_string(), unhealthy());
        assert_eq!(determine_overall_status(&deps, &["store"]), "unhealthy");
    }

    #[tokio::test]
    async fn test_memory_store_is_healthy() {
        let checkers: Vec<Arc<dyn DependencyChecker>> = vec![Arc::new(StoreChecker::new(
            Arc::new(MemoryTransactionStore::new()),
        ))];

        let response = check_health(&checkers, Instant::now()).await;

        assert_eq!(response.status, "healthy");
        assert!(matches!(
            response.dependencies.get("store"),
            Some(DependencyStatus::Healthy { .. })
        ));
    }
}
