//! Player events and snapshots
//!
//! The engine queues an event for every observable change. The controller
//! drains them after each batch of mutations, coalesces them, and fans them
//! out to subscribers (the remote session server among them).

use crate::types::{EngineState, PlaybackStatus, QueueEntry, RepeatMode, Slot};
use serde::{Deserialize, Serialize};

/// Events emitted by the queue engine
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Current entry changed (or the queue emptied)
    Song(Option<QueueEntry>),

    /// Playing / paused
    Playback(PlaybackStatus),

    /// Playhead in seconds
    Position(f64),

    /// Volume level 0-100 (0 while muted)
    Volume(u8),

    Repeat(RepeatMode),

    /// Shuffle on/off
    Shuffle(bool),

    /// A song's favorite flag changed
    Favorite { id: String, favorite: bool },

    /// A song's rating changed
    Rating { id: String, rating: Option<u8> },

    /// Queue contents or order changed
    QueueChanged,

    /// Something the user must act on (playback failure, failed server call)
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Song,
    Playback,
    Position,
    Volume,
    Repeat,
    Shuffle,
    Queue,
    /// Never merged
    Each,
}

impl PlayerEvent {
    fn kind(&self) -> Kind {
        match self {
            Self::Song(_) => Kind::Song,
            Self::Playback(_) => Kind::Playback,
            Self::Position(_) => Kind::Position,
            Self::Volume(_) => Kind::Volume,
            Self::Repeat(_) => Kind::Repeat,
            Self::Shuffle(_) => Kind::Shuffle,
            Self::QueueChanged => Kind::Queue,
            Self::Favorite { .. } | Self::Rating { .. } | Self::Error(_) => Kind::Each,
        }
    }
}

/// Collapse a batch of events to what an observer needs
///
/// State events keep only their last occurrence; favorite, rating and error
/// events are all kept. Relative order of survivors is preserved.
pub fn coalesce(events: Vec<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut seen: Vec<Kind> = Vec::new();
    let mut kept: Vec<PlayerEvent> = Vec::with_capacity(events.len());

    for event in events.into_iter().rev() {
        let kind = event.kind();
        if kind != Kind::Each {
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);
        }
        kept.push(event);
    }

    kept.reverse();
    kept
}

/// Compact, read-only view of the player for observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub song: Option<QueueEntry>,
    pub status: PlaybackStatus,
    pub state: EngineState,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    pub volume: u8,
    pub muted: bool,
    pub speed: f64,
    /// Playhead in seconds
    pub position: f64,
    pub current_index: Option<usize>,
    pub queue_length: usize,
    pub active_slot: Slot,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            song: None,
            status: PlaybackStatus::Paused,
            state: EngineState::Empty,
            repeat: RepeatMode::None,
            shuffle: false,
            volume: 0,
            muted: false,
            speed: 1.0,
            position: 0.0,
            current_index: None,
            queue_length: 0,
            active_slot: Slot::A,
        }
    }
}
