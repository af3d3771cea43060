//! Host authentication
//!
//! The host API uses HTTP Basic auth. The host WebSocket presents the
//! password as `?key=`. Both are disabled unless HOST_USERNAME and
//! HOST_PASSWORD are set.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Authentication configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Username for the host API (None = auth disabled)
    pub username: Option<String>,
    /// Password for the host API, also the host WebSocket key
    pub password: Option<String>,
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl AuthConfig {
    /// Load auth config from environment variables
    /// HOST_USERNAME and HOST_PASSWORD must both be set to enable auth
    pub fn from_env() -> Self {
        Self::new(non_empty_env("HOST_USERNAME"), non_empty_env("HOST_PASSWORD"))
    }

    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        match (username, password) {
            (Some(username), Some(password)) => {
                tracing::info!(
                    "Host authentication enabled (key {})",
                    key_fingerprint(&password)
                );
                Self {
                    username: Some(username),
                    password: Some(password),
                }
            }
            (username, password) => {
                if username.is_some() || password.is_some() {
                    tracing::warn!(
                        "HOST_USERNAME and HOST_PASSWORD must both be set to enable authentication"
                    );
                }
                tracing::warn!("Host authentication DISABLED - anyone can act as host!");
                Self::default()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Validate Basic auth credentials
    pub fn validate(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => digest_eq(u, username) & digest_eq(p, password),
            _ => true,
        }
    }

    /// Validate the `key` a host WebSocket connected with
    pub fn validate_host_key(&self, key: Option<&str>) -> bool {
        match (&self.password, key) {
            _ if !self.is_enabled() => true,
            (Some(expected), Some(key)) => digest_eq(expected, key),
            _ => false,
        }
    }
}

/// Compare two secrets via their SHA-256 digests in constant time
fn digest_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Short hex digest of a key, safe to put in logs
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..4])
}

/// Decode an `Authorization: Basic ...` header value
fn basic_credentials(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Middleware for HTTP Basic Authentication on host routes
pub async fn host_auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !auth_config.is_enabled() {
        return next.run(request).await;
    }

    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(basic_credentials);

    if let Some((username, password)) = credentials {
        if auth_config.validate(&username, &password) {
            return next.run(request).await;
        }
        tracing::warn!("Rejected host API credentials for user {:?}", username);
    }

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"knowme host\"")],
        "Unauthorized",
    )
        .into_response()
}
