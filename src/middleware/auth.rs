//! Caller authentication.
//!
//! Bearer tokens have the form `<user_id>.<hex(HMAC-SHA256(secret, user_id))>`.
//! The `Authenticator` trait keeps the pipeline independent of that format, so
//! an identity-provider backed implementation can replace it.

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed bearer token")]
    MalformedToken,

    #[error("token signature verification failed")]
    SignatureMismatch,

    #[error("invalid signing secret configuration")]
    InvalidSecret,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, bearer: Option<&str>) -> Result<CallerId, AuthError>;
}

/// Token from an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[derive(Clone)]
pub struct HmacTokenAuthenticator {
    secret: String,
}

impl HmacTokenAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac_for(&self, user_id: &str) -> Result<HmacSha256, AuthError> {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| AuthError::InvalidSecret)?;
        mac.update(user_id.as_bytes());
        Ok(mac)
    }

    /// Mints a token for `user_id`.
    pub fn issue(&self, user_id: &str) -> Result<String, AuthError> {
        if user_id.is_empty() || user_id.contains('.') {
            return Err(AuthError::MalformedToken);
        }
        let signature = self.mac_for(user_id)?.finalize().into_bytes();
        Ok(format!("{}.{}", user_id, hex::encode(signature)))
    }

    /// Verify the signature using constant-time comparison
    pub fn verify(&self, token: &str) -> Result<CallerId, AuthError> {
        let (user_id, signature_hex) = token.split_once('.').ok_or(AuthError::MalformedToken)?;
        if user_id.is_empty() {
            return Err(AuthError::MalformedToken);
        }

        let signature = hex::decode(signature_hex).map_err(|_| AuthError::MalformedToken)?;

        self.mac_for(user_id)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::SignatureMismatch)?;

        Ok(CallerId::new(user_id))
    }
}

#[async_trait]
impl Authenticator for HmacTokenAuthenticator {
    async fn authenticate(&self, bearer: Option<&str>) -> Result<CallerId, AuthError> {
        let token = bearer.ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}
