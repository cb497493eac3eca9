//! Core types for playback management

use fermata_core::Song;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one queue entry
///
/// A song's domain id may appear several times in a queue (the same track
/// queued twice), so entries are told apart by a generated id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(Uuid);

impl UniqueId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing uuid
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A song as it sits in the play queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub unique_id: UniqueId,

    #[serde(flatten)]
    pub song: Song,
}

impl QueueEntry {
    /// Wrap a song with a freshly generated unique id
    pub fn new(song: Song) -> Self {
        Self {
            unique_id: UniqueId::generate(),
            song,
        }
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatMode {
    /// Stop when the queue ends
    #[default]
    None,

    /// Loop the entire queue
    All,

    /// Loop the current track (automatic advance only)
    One,
}

impl RepeatMode {
    /// Next mode in the toggle cycle NONE -> ALL -> ONE -> NONE
    #[must_use]
    pub fn cycle(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }
}

/// Shuffle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShuffleMode {
    /// Play in insertion order
    #[default]
    None,

    /// Shuffle at track granularity
    Track,
}

impl ShuffleMode {
    pub fn is_on(self) -> bool {
        self == Self::Track
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::None => Self::Track,
            Self::Track => Self::None,
        }
    }
}

/// Playback status as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackStatus {
    Playing,
    Paused,
}

/// Queue engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    /// No entries queued
    Empty,

    /// Entries queued and a current index set, nothing audible
    Stopped,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,
}

impl EngineState {
    /// Observer-facing status; only PLAYING counts as playing
    pub fn status(self) -> PlaybackStatus {
        match self {
            Self::Playing => PlaybackStatus::Playing,
            Self::Empty | Self::Stopped | Self::Paused => PlaybackStatus::Paused,
        }
    }
}

/// One of the two playback handles used for gapless handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// The sibling slot
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Array index for slot-indexed storage
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// Identifies one load of a song into a slot
///
/// The engine hands out a fresh id for every prime, and backends echo it
/// back on every transport report. A report carrying an id the slot no
/// longer holds describes media that has since been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(u64);

impl LoadId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where newly added songs go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddPosition {
    /// Replace the queue
    Now,

    /// Right after the current entry
    Next,

    /// At the tail
    Last,
}

/// Configuration for the queue engine and its controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Start playing when songs are added to an empty queue (default: true)
    pub autoplay: bool,

    /// `previous()` past this many seconds restarts the track (default: 10)
    pub previous_restart_threshold: f64,

    /// Seconds skipped by skip-forward (default: 10)
    pub skip_forward_step: f64,

    /// Seconds skipped by skip-backward (default: 5)
    pub skip_backward_step: f64,

    /// Initial volume (0-100, default: 80)
    pub volume: u8,

    /// Initial playback speed (0.5-1.5, default: 1.0)
    pub speed: f64,

    /// Report scrobbles to the music server (default: true)
    pub scrobble: bool,

    /// Bounded command queue of the controller (default: 64)
    pub command_capacity: usize,

    /// Broadcast buffer for player events (default: 256)
    pub event_capacity: usize,

    /// Bounded queue for position ticks (default: 16)
    pub tick_capacity: usize,

    /// How often the controller polls the backend, in milliseconds (default: 250)
    pub poll_interval_ms: u64,
}

/// Playback speed bounds
pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 1.5;

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            previous_restart_threshold: 10.0,
            skip_forward_step: 10.0,
            skip_backward_step: 5.0,
            volume: 80,
            speed: 1.0,
            scrobble: true,
            command_capacity: 64,
            event_capacity: 256,
            tick_capacity: 16,
            poll_interval_ms: 250,
        }
    }
}
