//! Fermata player application
//!
//! Wires the song library, a playback backend, the queue controller and
//! the remote session server into one process.

pub mod app;
pub mod config;
pub mod decoder;
pub mod error;
pub mod library;
pub mod resume;

pub use app::Player;
pub use config::PlayerConfig;
pub use error::{PlayerError, Result};
