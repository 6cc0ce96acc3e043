use axum::{
    body::{Body, Bytes, HttpBody},
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

const MAX_BODY_LOG_SIZE: usize = 1024; // 1KB limit for body logging
/// Largest body buffered for logging; matches axum's default `Json` limit.
pub const MAX_BUFFERED_BODY_SIZE: usize = 2 * 1024 * 1024;

enum BodyReadError {
    TooLarge,
    Failed,
}

/// Collects the body chunk by chunk, giving up as soon as it passes `limit`.
async fn read_bounded(mut body: Body, limit: usize) -> Result<Bytes, BodyReadError> {
    let declared = body.size_hint().exact().or_else(|| body.size_hint().upper());
    if declared.map_or(false, |len| len > limit as u64) {
        return Err(BodyReadError::TooLarge);
    }

    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|_| BodyReadError::Failed)?;
        if buf.len() + chunk.len() > limit {
            return Err(BodyReadError::TooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

fn declared_length(req: &Request<Body>) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogConfig {
    pub log_body: bool,
}

pub async fn request_logger_middleware(
    State(config): State<RequestLogConfig>,
    mut req: Request<Body>,
    next: Next<Body>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    if let Ok(value) = request_id.parse() {
        req.headers_mut().insert("x-request-id", value);
    }

    if config.log_body {
        if declared_length(&req).map_or(false, |len| len > MAX_BUFFERED_BODY_SIZE as u64) {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                "Declared request body too large"
            );
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }

        let (parts, body) = req.into_parts();
        let bytes = match read_bounded(body, MAX_BUFFERED_BODY_SIZE).await {
            Ok(bytes) => bytes,
            Err(BodyReadError::TooLarge) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "Request body too large"
                );
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
            Err(BodyReadError::Failed) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "Failed to read request body"
                );
                return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
            }
        };

        let logged_body = if bytes.len() > MAX_BODY_LOG_SIZE {
            format!("[{} bytes, not logged]", bytes.len())
        } else if let Ok(json) = serde_json::from_slice::<serde_json::Value>(&bytes) {
            let sanitized = crate::utils::sanitize::sanitize_json(&json);
            serde_json::to_string(&sanitized).unwrap_or_else(|_| "[invalid json]".to_string())
        } else {
            format!("[non-json, {} bytes]", bytes.len())
        };

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_size = bytes.len(),
            body = %logged_body,
            "Incoming request"
        );

        req = Request::from_parts(parts, Body::from(bytes));
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "Incoming request"
        );
    }

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = latency.as_millis() as u64,
        "Outgoing response"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(value) = request_id.parse() {
        parts.headers.insert("x-request-id", value);
    }

    Response::from_parts(parts, body)
}
