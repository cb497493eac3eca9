//! Fermata Core
//!
//! Platform-agnostic domain types, the music server boundary, and error
//! handling shared by the playback engine, the remote session server, and
//! the player application.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Song`, `GainInfo`, `LibraryItem`
//! - **Server Boundary**: the `MusicServer` trait (fetch, scrobble, favorite, rating)
//! - **Error Handling**: `CoreError` with a distinguishable cancellation marker
//!
//! # Example
//!
//! ```rust
//! use fermata_core::{Song, SongQuery};
//!
//! let song = Song::new("song-1", "server-1", "Clair de Lune", 302.0);
//! assert_eq!(song.duration, 302.0);
//!
//! let query = SongQuery::album("album-7");
//! assert_eq!(query.album_ids, vec!["album-7".to_string()]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod server;
pub mod song;

pub use error::{CoreError, Result};
pub use server::{MusicServer, Scrobble, ScrobbleEvent, SongQuery, SortOrder};
pub use song::{GainInfo, LibraryItem, Song};
