//! Basic auth guard for the credential endpoint
use crate::{error::RemoteError, state::AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Rejects requests whose `Authorization` header is not the configured Basic credential
pub async fn basic_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, RemoteError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| RemoteError::Auth("Missing credentials".to_string()))?;

    state.auth.verify_basic(header).map_err(|e| {
        tracing::warn!("Credential request rejected: {}", e);
        e
    })?;

    Ok(next.run(request).await)
}
