//! Error types for playback management

use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The backend rejected or failed a transport call
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend's command channel is gone (decode engine exited)
    #[error("Backend channel closed")]
    BackendClosed,

    /// A persisted queue snapshot could not be used
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A persisted queue snapshot was written by an incompatible version
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedSnapshotVersion(u32),

    /// The controller task has stopped
    #[error("Playback controller closed")]
    ControllerClosed,

    /// Music server error
    #[error(transparent)]
    Core(#[from] fermata_core::CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlaybackError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
