//! Out-of-process decode engine adapter
//!
//! Commands go out over an unbounded channel; whoever owns the receiving
//! end (a child process bridge, a socket, a test) forwards them to the
//! engine. Events coming back are handed to a [`DecoderLink`].
//!
//! The decode engine keeps its own two-entry playlist (active + next) and
//! rolls over to the primed entry on natural end, like the embedded
//! backend does. It must echo the `load` id of a `load` command on every
//! event about that media.

use super::{EventSink, PlaybackBackend};
use crate::error::{PlaybackError, Result};
use crate::types::{LoadId, Slot};
use fermata_core::Song;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Command sent to the decode engine (one JSON object per line on the wire)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum DecoderCommand {
    Load {
        slot: Slot,
        load: LoadId,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gain: Option<f64>,
    },
    Activate {
        slot: Slot,
    },
    Unload {
        slot: Slot,
    },
    Play,
    Pause,
    Stop,
    Seek {
        seconds: f64,
    },
    Volume {
        level: u8,
    },
    Speed {
        speed: f64,
    },
    Quit,
}

/// Event reported by the decode engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DecoderEvent {
    Position {
        slot: Slot,
        load: LoadId,
        seconds: f64,
    },
    Ended {
        slot: Slot,
        load: LoadId,
    },
    Error {
        slot: Slot,
        load: LoadId,
        message: String,
    },
}

/// Backend driving an external decode engine
#[derive(Debug)]
pub struct LocalBackend {
    commands: mpsc::UnboundedSender<DecoderCommand>,
}

impl LocalBackend {
    /// Create the backend and the receiving end of its command channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DecoderCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { commands: tx }, rx)
    }

    fn send(&self, command: DecoderCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::BackendClosed)
    }

    /// Handle that can ask the decode engine to exit after the backend is gone
    pub fn quit_handle(&self) -> DecoderQuit {
        DecoderQuit {
            commands: self.commands.clone(),
        }
    }
}

/// Sends the final `quit` command; held by whoever owns the engine process
#[derive(Debug, Clone)]
pub struct DecoderQuit {
    commands: mpsc::UnboundedSender<DecoderCommand>,
}

impl DecoderQuit {
    pub fn quit(&self) -> Result<()> {
        self.commands
            .send(DecoderCommand::Quit)
            .map_err(|_| PlaybackError::BackendClosed)
    }
}

impl PlaybackBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn prime(&mut self, slot: Slot, load: LoadId, song: &Song) -> Result<()> {
        self.send(DecoderCommand::Load {
            slot,
            load,
            url: song.stream_url.clone(),
            gain: song.track_gain(),
        })
    }

    fn activate(&mut self, slot: Slot) -> Result<()> {
        self.send(DecoderCommand::Activate { slot })
    }

    fn release(&mut self, slot: Slot) -> Result<()> {
        self.send(DecoderCommand::Unload { slot })
    }

    fn play(&mut self) -> Result<()> {
        self.send(DecoderCommand::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.send(DecoderCommand::Pause)
    }

    fn stop(&mut self) -> Result<()> {
        self.send(DecoderCommand::Stop)
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        self.send(DecoderCommand::Seek { seconds })
    }

    fn set_volume(&mut self, level: u8) -> Result<()> {
        self.send(DecoderCommand::Volume { level })
    }

    fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.send(DecoderCommand::Speed { speed })
    }
}

/// Routes decode engine events into the transport channels
#[derive(Debug, Clone)]
pub struct DecoderLink {
    sink: EventSink,
}

impl DecoderLink {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }

    pub fn dispatch(&self, event: DecoderEvent) {
        match event {
            DecoderEvent::Position {
                slot,
                load,
                seconds,
            } => self.sink.position(slot, load, seconds),
            DecoderEvent::Ended { slot, load } => self.sink.ended(slot, load),
            DecoderEvent::Error {
                slot,
                load,
                message,
            } => {
                tracing::warn!("Decode engine error on slot {:?} ({}): {}", slot, load, message);
                self.sink.error(slot, load, message);
            }
        }
    }

    /// The engine's event stream ended; nothing it had loaded will report again
    pub fn disconnected(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Decode engine disconnected: {}", reason);
        self.sink.failed(reason);
    }

    /// Parse one line of engine output and dispatch it
    pub fn dispatch_line(&self, line: &str) -> Result<()> {
        let event: DecoderEvent = serde_json::from_str(line)?;
        self.dispatch(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{transport_channel, TransportEvent};

    #[test]
    fn commands_reach_the_channel() {
        let (mut backend, mut rx) = LocalBackend::new();
        let song = Song::new("1", "srv", "One", 60.0).with_stream_url("http://s/1");

        backend.prime(Slot::B, LoadId::new(4), &song).unwrap();
        backend.activate(Slot::B).unwrap();
        backend.seek(12.5).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            DecoderCommand::Load {
                slot: Slot::B,
                load: LoadId::new(4),
                url: "http://s/1".into(),
                gain: None,
            }
        );
        assert_eq!(rx.try_recv().unwrap(), DecoderCommand::Activate { slot: Slot::B });
        assert_eq!(rx.try_recv().unwrap(), DecoderCommand::Seek { seconds: 12.5 });
    }

    #[test]
    fn closed_engine_is_an_error() {
        let (mut backend, rx) = LocalBackend::new();
        drop(rx);
        assert!(matches!(backend.play(), Err(PlaybackError::BackendClosed)));
    }

    #[test]
    fn wire_format() {
        let line = serde_json::to_string(&DecoderCommand::Volume { level: 40 }).unwrap();
        assert_eq!(line, r#"{"command":"volume","level":40}"#);

        let event: DecoderEvent =
            serde_json::from_str(r#"{"event":"ended","slot":"a","load":9}"#).unwrap();
        assert_eq!(
            event,
            DecoderEvent::Ended {
                slot: Slot::A,
                load: LoadId::new(9)
            }
        );

        let (mut backend, mut rx) = LocalBackend::new();
        let song = Song::new("1", "srv", "One", 60.0).with_stream_url("http://s/1");
        backend.prime(Slot::A, LoadId::new(12), &song).unwrap();
        let line = serde_json::to_string(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(
            line,
            r#"{"command":"load","slot":"a","load":12,"url":"http://s/1"}"#
        );
    }

    #[test]
    fn quit_handle_outlives_backend() {
        let (backend, mut rx) = LocalBackend::new();
        let quit = backend.quit_handle();
        drop(backend);

        quit.quit().unwrap();
        assert_eq!(rx.try_recv().unwrap(), DecoderCommand::Quit);

        drop(rx);
        assert!(matches!(quit.quit(), Err(PlaybackError::BackendClosed)));
    }

    #[test]
    fn link_forwards_events() {
        let (sink, mut rx) = transport_channel(4);
        let link = DecoderLink::new(sink);

        link.dispatch_line(r#"{"event":"position","slot":"b","load":2,"seconds":3.5}"#)
            .unwrap();
        link.dispatch_line(r#"{"event":"error","slot":"b","load":2,"message":"decode"}"#)
            .unwrap();
        // Untagged reports cannot be matched to a load
        assert!(link
            .dispatch_line(r#"{"event":"ended","slot":"b"}"#)
            .is_err());
        link.disconnected("exited with status 1");
        assert!(link.dispatch_line("not json").is_err());

        assert_eq!(rx.ticks.try_recv().unwrap().position, 3.5);
        assert_eq!(
            rx.events.try_recv().unwrap(),
            TransportEvent::Error {
                slot: Slot::B,
                load: LoadId::new(2),
                message: "decode".into()
            }
        );
        assert_eq!(
            rx.events.try_recv().unwrap(),
            TransportEvent::Failed {
                message: "exited with status 1".into()
            }
        );
    }
}
