//! Curator service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    error::CuratorResult,
    middleware::session_middleware,
    models::{CommitRequest, GenerateRequest, RefineRequest, ResolvedSession},
};

/// Create the router for the curator service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/playlists/generate", post(generate_playlist))
        .route("/playlists/:id", get(get_playlist).delete(delete_playlist))
        .route("/playlists/:id/refine", post(refine_playlist))
        .route("/playlists/:id/commit", post(commit_playlist))
        .route("/rate-limit", get(rate_limit_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "curator-service",
        "config": state.info.as_ref(),
    }))
}

/// Generate a new draft playlist from a prompt
pub async fn generate_playlist(
    State(state): State<AppState>,
    Extension(session): Extension<ResolvedSession>,
    Json(payload): Json<GenerateRequest>,
) -> CuratorResult<impl IntoResponse> {
    let response = state.service.generate(&session, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Refine an existing draft with feedback
pub async fn refine_playlist(
    State(state): State<AppState>,
    Extension(session): Extension<ResolvedSession>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefineRequest>,
) -> CuratorResult<impl IntoResponse> {
    let response = state.service.refine(&session, id, payload).await?;
    Ok(Json(response))
}

/// Get a draft by ID
pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(session): Extension<ResolvedSession>,
    Path(id): Path<Uuid>,
) -> CuratorResult<impl IntoResponse> {
    Ok(Json(state.service.get_draft(&session, id).await?))
}

/// Mark a draft as committed to the external catalog
pub async fn commit_playlist(
    State(state): State<AppState>,
    Extension(session): Extension<ResolvedSession>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommitRequest>,
) -> CuratorResult<impl IntoResponse> {
    Ok(Json(state.service.commit_draft(&session, id, payload).await?))
}

/// Delete a draft
pub async fn delete_playlist(
    State(state): State<AppState>,
    Extension(session): Extension<ResolvedSession>,
    Path(id): Path<Uuid>,
) -> CuratorResult<impl IntoResponse> {
    state.service.delete_draft(&session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Today's quota usage for the caller
pub async fn rate_limit_status(
    State(state): State<AppState>,
    Extension(session): Extension<ResolvedSession>,
) -> CuratorResult<impl IntoResponse> {
    Ok(Json(state.service.rate_limit_status(&session).await?))
}
