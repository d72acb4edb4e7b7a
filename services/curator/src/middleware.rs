//! Session middleware for the playlist routes

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{AppState, error::CuratorError};

pub const SESSION_HEADER: &str = "x-session-id";
pub const DEVICE_HEADER: &str = "x-device-id";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Resolve the caller's session and stash it in request extensions
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, CuratorError> {
    let session_id = header_value(req.headers(), SESSION_HEADER).to_string();
    let device_id = header_value(req.headers(), DEVICE_HEADER).to_string();

    let session = state.session_gate.validate(&session_id, &device_id).await?;
    debug!("Session {} resolved to owner {}", session.session_id, session.owner_key);

    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}
