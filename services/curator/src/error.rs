//! Error taxonomy for the curator service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::StoreError;
use serde_json::json;
use thiserror::Error;

use crate::models::LimitKind;

/// Every failure is scoped to a single request
#[derive(Error, Debug)]
pub enum CuratorError {
    /// Missing, expired, rebound or wrong-mode session
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// Daily quota or per-draft refinement cap reached
    #[error("Rate limit exceeded for {kind}: {used}/{max} used")]
    RateLimitExceeded { kind: LimitKind, used: u32, max: u32 },

    /// Prompt judged not to be about music, mood or activity
    #[error("Prompt rejected: similarity {score:.3} below threshold {threshold:.3}")]
    ValidationFailed { score: f32, threshold: f32 },

    /// AI provider, embedding provider or catalog unavailable
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Catalog could not supply enough tracks after widened passes
    #[error("Insufficient results: requested {requested}, found {achieved}")]
    InsufficientResults { requested: usize, achieved: usize },

    /// Malformed input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Draft in the wrong state or modified concurrently
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CuratorError {
    /// Stable machine-readable kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionInvalid(_) => "session_invalid",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::InsufficientResults { .. } => "insufficient_results",
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::SessionInvalid(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ValidationFailed { .. } | Self::InsufficientResults { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CuratorError {
    fn into_response(self) -> Response {
        let status = self.status();

        let details = match &self {
            Self::RateLimitExceeded { kind, used, max } => {
                json!({ "kind": kind, "used": used, "max": max })
            }
            Self::ValidationFailed { score, threshold } => {
                json!({ "score": score, "threshold": threshold })
            }
            Self::InsufficientResults {
                requested,
                achieved,
            } => json!({ "requested": requested, "achieved": achieved }),
            _ => serde_json::Value::Null,
        };

        // Store internals stay in the logs
        let message = match &self {
            Self::Store(e) => {
                tracing::error!("Store failure: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
            "details": details,
        }));

        (status, body).into_response()
    }
}

/// Type alias for curator results
pub type CuratorResult<T> = Result<T, CuratorError>;
