//! Remote server error types
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Art proxy error: {0}")]
    Proxy(String),

    #[error("Playback controller unavailable: {0}")]
    Playback(#[from] fermata_playback::PlaybackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for RemoteError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            RemoteError::Auth(msg) => {
                let body = Json(json!({ "error": msg }));
                // Browsers only prompt for credentials when challenged
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Basic realm=\"fermata\"")],
                    body,
                )
                    .into_response();
            }
            RemoteError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            RemoteError::Proxy(msg) => (StatusCode::BAD_GATEWAY, msg),
            RemoteError::Http(ref e) => {
                tracing::warn!("Upstream HTTP error: {}", e);
                (StatusCode::BAD_GATEWAY, "Upstream error".to_string())
            }
            RemoteError::Playback(ref e) => {
                tracing::error!("Playback error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Playback unavailable".to_string(),
                )
            }
            RemoteError::Config(ref msg) => {
                tracing::error!("Config error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                )
            }
            RemoteError::Io(ref e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "IO error".to_string())
            }
            RemoteError::Jwt(ref e) => {
                tracing::error!("JWT error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Token error".to_string(),
                )
            }
            RemoteError::Serialization(ref e) => {
                tracing::error!("Serialization error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Serialization error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
