//! Playback backend adapters
//!
//! The queue engine is transport-agnostic: it tells a [`PlaybackBackend`]
//! what to load into which slot and when to play, and the backend reports
//! raw transport events back through an [`EventSink`].
//!
//! Variants:
//! - [`LocalBackend`]: an out-of-process decode engine behind a command channel
//! - [`EmbeddedBackend`]: two in-process media elements, one per slot
//! - [`RecordingBackend`]: records calls, for tests
//!
//! A backend never decides queue order. The one piece of autonomy it has is
//! the gapless handoff: when the active slot ends naturally and the sibling
//! is primed, the backend starts the sibling itself before reporting
//! `ended(slot)`. The engine then only flips its slot label.
//!
//! Every report carries the [`LoadId`] the slot was primed with, so the
//! engine can tell a report about the media it holds now from a late one
//! about media it has already replaced.

mod embedded;
mod local;
mod recording;

pub use embedded::{ClockElement, EmbeddedBackend, MediaElement};
pub use local::{DecoderCommand, DecoderEvent, DecoderLink, DecoderQuit, LocalBackend};
pub use recording::{BackendCall, RecordingBackend};

use crate::error::Result;
use crate::types::{LoadId, Slot};
use fermata_core::Song;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Capability interface over a playback transport
///
/// Calls are fire-and-forget: an `Ok` means the request was accepted, not
/// that audio is already flowing. Failures that happen later arrive as
/// [`TransportEvent::Error`].
pub trait PlaybackBackend: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Load a song into `slot` without starting it; reports about it carry `load`
    fn prime(&mut self, slot: Slot, load: LoadId, song: &Song) -> Result<()>;

    /// Make `slot` authoritative; the previously active slot is stopped and released
    fn activate(&mut self, slot: Slot) -> Result<()>;

    /// Unload `slot`
    fn release(&mut self, slot: Slot) -> Result<()>;

    /// Start or resume the active slot
    fn play(&mut self) -> Result<()>;

    /// Pause the active slot
    fn pause(&mut self) -> Result<()>;

    /// Halt the active slot and rewind it; primed slots stay loaded
    fn stop(&mut self) -> Result<()>;

    /// Seek the active slot
    fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Volume 0-100
    fn set_volume(&mut self, level: u8) -> Result<()>;

    /// Playback rate, already clamped to 0.5..=1.5
    fn set_speed(&mut self, speed: f64) -> Result<()>;

    /// Drive in-process transports; called periodically by the controller
    fn poll(&mut self) {}
}

/// Periodic, droppable playhead report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportTick {
    pub slot: Slot,
    pub load: LoadId,
    pub position: f64,
}

/// Transport events that must never be dropped
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The slot's media completed naturally
    Ended { slot: Slot, load: LoadId },

    /// The slot failed to load or decode
    Error {
        slot: Slot,
        load: LoadId,
        message: String,
    },

    /// The transport as a whole went away (decode engine exited)
    Failed { message: String },
}

/// Producer side of the transport channels, cloned into backends
#[derive(Debug, Clone)]
pub struct EventSink {
    ticks: mpsc::Sender<TransportTick>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSink {
    /// Report the playhead; dropped when the controller is behind
    pub fn position(&self, slot: Slot, load: LoadId, position: f64) {
        match self.ticks.try_send(TransportTick {
            slot,
            load,
            position,
        }) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Dropping position tick, controller busy");
            }
        }
    }

    pub fn ended(&self, slot: Slot, load: LoadId) {
        self.send(TransportEvent::Ended { slot, load });
    }

    pub fn error(&self, slot: Slot, load: LoadId, message: impl Into<String>) {
        self.send(TransportEvent::Error {
            slot,
            load,
            message: message.into(),
        });
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(TransportEvent::Failed {
            message: message.into(),
        });
    }

    fn send(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Transport event after controller shutdown");
        }
    }
}

/// Consumer side of the transport channels, owned by the controller
#[derive(Debug)]
pub struct TransportReceiver {
    pub ticks: mpsc::Receiver<TransportTick>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Create the transport channels; ticks are bounded at `tick_capacity`
pub fn transport_channel(tick_capacity: usize) -> (EventSink, TransportReceiver) {
    let (tick_tx, tick_rx) = mpsc::channel(tick_capacity.max(1));
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        EventSink {
            ticks: tick_tx,
            events: event_tx,
        },
        TransportReceiver {
            ticks: tick_rx,
            events: event_rx,
        },
    )
}
