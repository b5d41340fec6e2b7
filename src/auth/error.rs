//! Classified authentication failures.

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::jwks::KeyDirectoryError;

/// Authentication errors.
///
/// `Configuration` is an operator problem; the other kinds describe a bad or
/// missing credential. The two groups must stay distinguishable.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Issuer missing or key directory unreachable
    Configuration(String),
    /// Malformed header, missing kid, or unusable key material
    InvalidToken(String),
    /// Missing bearer token or failed verification
    Unauthenticated(String),
    /// Verified identity lacks a required tenant
    Forbidden(String),
}

impl AuthError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::InvalidToken(_) => "invalid_token",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidToken(_) | Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Diagnostic text. Not meant for control flow.
    pub fn detail(&self) -> &str {
        match self {
            Self::Configuration(msg)
            | Self::InvalidToken(msg)
            | Self::Unauthenticated(msg)
            | Self::Forbidden(msg) => msg,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Identity provider misconfigured: {}", msg),
            Self::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            Self::Unauthenticated(msg) => write!(f, "Authentication required: {}", msg),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<KeyDirectoryError> for AuthError {
    fn from(err: KeyDirectoryError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.kind(),
            "detail": self.detail(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
