//! Bearer authentication for the action routes.
//!
//! Every caller presents the same shared secret as
//! `Authorization: Bearer <secret>`. The comparison goes through
//! `ring::hmac::verify` against a tag computed once at startup, so the time
//! taken does not depend on how many leading bytes of the guess match.

use crate::errors::CoordinatorError;
use crate::observability::metrics::record_auth_failure;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use common::secret::{ExposeSecret, SecretString};
use ring::hmac;
use ring::rand::SystemRandom;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
///
/// Holds an ephemeral HMAC key and the tag of the configured secret under that
/// key. The secret itself is not retained.
#[derive(Clone)]
pub struct AuthState {
    key: hmac::Key,
    expected: hmac::Tag,
}

impl AuthState {
    /// Derive the verification state from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::Internal` if the system random source fails.
    pub fn new(secret: &SecretString) -> Result<Self, CoordinatorError> {
        let rng = SystemRandom::new();
        let key = hmac::Key::generate(hmac::HMAC_SHA256, &rng).map_err(|_| {
            CoordinatorError::Internal("failed to generate authentication key".to_string())
        })?;
        let expected = hmac::sign(&key, secret.expose_secret().as_bytes());
        Ok(Self { key, expected })
    }

    /// Constant-time check of a presented token against the secret.
    #[must_use]
    pub fn verify(&self, presented: &str) -> bool {
        hmac::verify(&self.key, presented.as_bytes(), self.expected.as_ref()).is_ok()
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Extract the Bearer token from the Authorization header.
fn extract_bearer_token(req: &Request) -> Result<&str, CoordinatorError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "coord.middleware.auth", "Missing Authorization header");
            CoordinatorError::Unauthorized
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "coord.middleware.auth", "Invalid Authorization header format");
        CoordinatorError::Unauthorized
    })
}

/// Authentication middleware for the action routes.
///
/// # Response
///
/// - Returns 401 Unauthorized if the header is missing, malformed, or carries
///   the wrong secret
/// - Continues to the next handler otherwise
#[instrument(skip_all, name = "coord.middleware.auth")]
pub async fn require_bearer(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, CoordinatorError> {
    let token = match extract_bearer_token(&req) {
        Ok(token) => token,
        Err(e) => {
            record_auth_failure();
            return Err(e);
        }
    };

    if !state.verify(token) {
        tracing::debug!(target: "coord.middleware.auth", "Bearer token rejected");
        record_auth_failure();
        return Err(CoordinatorError::Unauthorized);
    }

    Ok(next.run(req).await)
}
