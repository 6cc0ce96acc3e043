pub mod transactions;
pub mod ws;

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::error::AppError;
use crate::health::check_health;
use crate::middleware::auth::{bearer_token, CallerId};
use crate::AppState;

/// Authenticated caller, taken from the `Authorization: Bearer` header.
pub struct Caller(pub CallerId);

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = state
            .authenticator
            .authenticate(bearer_token(&parts.headers))
            .await?;
        Ok(Caller(caller))
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = check_health(&state.health_checkers, state.start_time).await;

    // 503 only when a critical dependency is down; degraded still serves
    let status_code = if response.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}
