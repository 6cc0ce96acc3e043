pub mod adapters;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod presenter;
pub mod scoring;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use axum::{
    http::{header, HeaderName, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::adapters::{MemoryTransactionStore, PostgresTransactionStore};
use crate::config::{Config, FeatureSource, ScorerKind};
use crate::health::{DependencyChecker, ModelChecker, StoreChecker};
use crate::middleware::auth::{Authenticator, HmacTokenAuthenticator};
use crate::middleware::request_logger::{request_logger_middleware, RequestLogConfig};
use crate::ports::TransactionStore;
use crate::scoring::{
    FeatureEnricher, RandomScorer, RemoteModelScorer, RiskScorer, RuleBasedScorer,
};
use crate::services::{
    AnyAuthenticatedReviewer, ReviewPolicy, ReviewService, ReviewerAllowList, ScoringService,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TransactionStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub scoring: Arc<ScoringService>,
    pub review: Arc<ReviewService>,
    pub health_checkers: Arc<Vec<Arc<dyn DependencyChecker>>>,
    pub request_timeout: Duration,
    pub request_log: RequestLogConfig,
    pub start_time: Instant,
}

impl AppState {
    /// Wires both services over one store and one authenticator.
    pub fn new(
        store: Arc<dyn TransactionStore>,
        authenticator: Arc<dyn Authenticator>,
        enricher: FeatureEnricher,
        scorer: Arc<dyn RiskScorer>,
        policy: Arc<dyn ReviewPolicy>,
    ) -> Self {
        let scoring = ScoringService::new(
            store.clone(),
            authenticator.clone(),
            Arc::new(enricher),
            scorer,
        );
        let review = ReviewService::new(store.clone(), authenticator.clone(), policy);
        let store_checker: Arc<dyn DependencyChecker> = Arc::new(StoreChecker::new(store.clone()));

        Self {
            store,
            authenticator,
            scoring: Arc::new(scoring),
            review: Arc::new(review),
            health_checkers: Arc::new(vec![store_checker]),
            request_timeout: Duration::from_secs(10),
            request_log: RequestLogConfig::default(),
            start_time: Instant::now(),
        }
    }

    pub fn with_health_checker(mut self, checker: Arc<dyn DependencyChecker>) -> Self {
        Arc::make_mut(&mut self.health_checkers).push(checker);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_request_log(mut self, request_log: RequestLogConfig) -> Self {
        self.request_log = request_log;
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/fraud-detection", post(handlers::transactions::submit))
        .route("/transactions", get(handlers::transactions::list))
        .route("/transactions/feed", get(handlers::ws::ws_handler))
        .route("/transactions/:id", get(handlers::transactions::get))
        .route("/transactions/:id/approve", post(handlers::transactions::approve))
        .layer(axum_middleware::from_fn_with_state(
            state.request_log,
            request_logger_middleware,
        ))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(cors)
        .with_state(state)
}

/// Postgres when `DATABASE_URL` is set (migrations applied), in-memory otherwise.
pub async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn TransactionStore>> {
    match &config.database_url {
        Some(url) => {
            let pool =
                db::create_pool(url, Duration::from_secs(config.request_timeout_secs)).await?;
            db::run_migrations(&pool).await?;
            Ok(Arc::new(PostgresTransactionStore::connect(pool).await?))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, transactions are kept in memory only");
            Ok(Arc::new(MemoryTransactionStore::new()))
        }
    }
}

/// Builds the store, scorer and services described by `config`.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let request_timeout = Duration::from_secs(config.request_timeout_secs);

    let store = connect_store(config).await?;

    let authenticator: Arc<dyn Authenticator> =
        Arc::new(HmacTokenAuthenticator::new(config.auth_secret.clone()));

    let enricher = match config.features {
        FeatureSource::Random => FeatureEnricher::random(),
        FeatureSource::History => FeatureEnricher::from_history(store.clone()),
    };

    let policy: Arc<dyn ReviewPolicy> = if config.reviewer_ids.is_empty() {
        Arc::new(AnyAuthenticatedReviewer)
    } else {
        Arc::new(ReviewerAllowList::new(config.reviewer_ids.iter().cloned()))
    };

    let mut model_checker = None;
    let scorer: Arc<dyn RiskScorer> = match config.scorer {
        ScorerKind::Random => Arc::new(RandomScorer),
        ScorerKind::Rules => Arc::new(RuleBasedScorer::default()),
        ScorerKind::Remote => {
            let url = config
                .model_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("MODEL_URL is required when SCORER=remote"))?;
            let remote = RemoteModelScorer::new(
                url,
                config.model_type.clone(),
                config.model_version.clone(),
                request_timeout,
            )?;
            model_checker = Some(Arc::new(ModelChecker::new(remote.clone())));
            Arc::new(remote)
        }
    };
    tracing::info!(scorer = scorer.name(), features = ?config.features, "Risk scoring configured");

    let mut state = AppState::new(store, authenticator, enricher, scorer, policy)
        .with_request_timeout(request_timeout)
        .with_request_log(RequestLogConfig {
            log_body: config.log_request_body,
        });
    if let Some(checker) = model_checker {
        state = state.with_health_checker(checker);
    }

    Ok(state)
}
