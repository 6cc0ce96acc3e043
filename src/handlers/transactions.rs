use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};

use crate::domain::Transaction;
use crate::error::AppError;
use crate::handlers::Caller;
use crate::middleware::auth::bearer_token;
use crate::services::{Submission, SubmissionEnvelope};
use crate::AppState;

/// `POST /fraud-detection`
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmissionEnvelope>, JsonRejection>,
) -> Result<Json<Submission>, AppError> {
    let bearer = bearer_token(&headers);

    let Json(envelope) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            // unauthenticated callers get 401 even when the body is garbage
            state.authenticator.authenticate(bearer).await?;
            return Err(AppError::BadRequest(rejection.body_text()));
        }
    };

    let submission = state.scoring.submit(envelope.transaction, bearer).await?;
    Ok(Json(submission))
}

/// `GET /transactions`, newest first.
pub async fn list(
    State(state): State<AppState>,
    Caller(_caller): Caller,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = state.store.list_recent().await?;
    Ok(Json(transactions))
}

pub async fn get(
    State(state): State<AppState>,
    Caller(_caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state.store.get(&id).await?;
    Ok(Json(transaction))
}

/// `POST /transactions/:id/approve`
pub async fn approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state.review.approve(&id, bearer_token(&headers)).await?;
    Ok(Json(transaction))
}
