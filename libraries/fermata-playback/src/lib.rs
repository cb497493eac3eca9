//! Fermata - Playback Queue Engine
//!
//! Transport-agnostic playback management for Fermata.
//!
//! This crate provides:
//! - Play queue with parallel default/shuffled orderings
//! - Repeat (None, All, One) and track shuffle with exact advance rules
//! - Two player slots (A/B) for gapless handoff
//! - Backend adapters (out-of-process decode engine, in-process media elements)
//! - Scrobble tracking
//! - Compressed queue snapshots for resume-on-restart
//! - A single-writer controller task that serializes every mutation
//!
//! # Architecture
//!
//! ```text
//!  UI / hotkeys ─┐                         ┌──► broadcast<PlayerEvent>
//!  remote ───────┼─► Command ─► Controller ┤
//!                │              (engine)   └──► watch<PlayerSnapshot>
//!  backend ──────┴─► TransportEvent ──┘ ▲
//!                                       └── PlaybackBackend calls
//! ```
//!
//! # Example: Driving the engine directly
//!
//! ```rust
//! use fermata_core::Song;
//! use fermata_playback::backend::RecordingBackend;
//! use fermata_playback::{AddPosition, EngineState, PlaybackConfig, QueueEngine, RepeatMode};
//!
//! let backend = RecordingBackend::new();
//! let mut engine = QueueEngine::new(PlaybackConfig::default(), Box::new(backend));
//!
//! let songs = vec![
//!     Song::new("1", "srv", "First", 200.0),
//!     Song::new("2", "srv", "Second", 180.0),
//! ];
//! engine.enqueue(songs, AddPosition::Now, None);
//! assert_eq!(engine.state(), EngineState::Playing);
//!
//! engine.next();
//! assert_eq!(engine.current_index(), Some(1));
//!
//! // Manual navigation never wraps unless repeat is ALL
//! engine.next();
//! assert_eq!(engine.current_index(), Some(1));
//!
//! engine.set_repeat(RepeatMode::All);
//! engine.next();
//! assert_eq!(engine.current_index(), Some(0));
//! ```
//!
//! # Example: Running the controller
//!
//! ```rust,no_run
//! use fermata_playback::backend::{transport_channel, ClockElement, EmbeddedBackend};
//! use fermata_playback::{Command, Controller, PlaybackConfig, QueueEngine};
//! # use std::sync::Arc;
//! # async fn run(server: Arc<dyn fermata_core::MusicServer>) -> fermata_playback::Result<()> {
//! let config = PlaybackConfig::default();
//! let (sink, transport) = transport_channel(config.tick_capacity);
//! let backend = EmbeddedBackend::new(ClockElement::new(), ClockElement::new(), sink);
//!
//! let engine = QueueEngine::new(config, Box::new(backend));
//! let (controller, handle) = Controller::new(engine, server, transport);
//! controller.spawn();
//!
//! handle.send(Command::Play).await?;
//! let mut events = handle.subscribe();
//! let _first = events.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod controller;
mod engine;
mod error;
pub mod events;
pub mod queue;
pub mod scrobble;
mod shuffle;
pub mod slots;
pub mod snapshot;
pub mod types;
mod volume;

// Public exports
pub use controller::{Command, Controller, ControllerHandle, StartAt};
pub use engine::QueueEngine;
pub use error::{PlaybackError, Result};
pub use events::{PlayerEvent, PlayerSnapshot};
pub use queue::{PlayQueue, RemoveOutcome};
pub use snapshot::{QueueSnapshot, SnapshotStore};
pub use types::{
    AddPosition, EngineState, LoadId, PlaybackConfig, PlaybackStatus, QueueEntry, RepeatMode,
    ShuffleMode, Slot, UniqueId,
};
pub use volume::Volume;
