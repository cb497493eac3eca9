//! Remote session wire protocol
//!
//! JSON envelopes over a WebSocket. Clients send events tagged by `event`
//! with their fields inline; the server pushes events tagged by `event`
//! with the payload under `data`:
//!
//! ```text
//! client → { "event": "volume", "volume": 40 }
//! server → { "event": "volume", "data": 40 }
//! ```

use fermata_playback::{
    Command, PlaybackStatus, PlayerEvent, PlayerSnapshot, QueueEntry, RepeatMode,
};
use serde::{Deserialize, Serialize};

/// Protocol revision; an `authenticate` carrying a different one is closed
/// with [`CLOSE_VERSION_MISMATCH`]
pub const PROTOCOL_VERSION: u32 = 1;

/// Server shutting down; do not reconnect right away
pub const CLOSE_SHUTDOWN: u16 = 4000;
/// A newer connection replaced this one; not an error
pub const CLOSE_SUPERSEDED: u16 = 4001;
/// Protocol version mismatch; reload full state
pub const CLOSE_VERSION_MISMATCH: u16 = 4002;
/// Credential rejected; reload full state
pub const CLOSE_AUTH_REJECTED: u16 = 4003;
/// No credential arrived within the authentication window
pub const CLOSE_AUTH_TIMEOUT: u16 = 4004;

/// Events sent by a remote client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    Authenticate {
        header: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u32>,
    },
    Play,
    Pause,
    Next,
    Previous,
    /// Cycle repeat mode
    Repeat,
    /// Toggle shuffle
    Shuffle,
    Volume {
        volume: u8,
    },
    /// Absolute seek in seconds
    Position {
        position: f64,
    },
    /// Relative seek in seconds
    Seek {
        offset: f64,
    },
    Favorite {
        id: String,
        favorite: bool,
    },
    Rating {
        id: String,
        rating: Option<u8>,
    },
    /// Fetch the current song's artwork
    Proxy,
}

impl ClientEvent {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// The controller command this event maps to; `None` for session-level events
    pub fn into_command(self) -> Option<Command> {
        let command = match self {
            Self::Authenticate { .. } | Self::Proxy => return None,
            Self::Play => Command::Play,
            Self::Pause => Command::Pause,
            Self::Next => Command::Next,
            Self::Previous => Command::Previous,
            Self::Repeat => Command::ToggleRepeat,
            Self::Shuffle => Command::ToggleShuffle,
            Self::Volume { volume } => Command::SetVolume(volume.min(100)),
            Self::Position { position } => Command::Seek(position),
            Self::Seek { offset } => Command::SeekBy(offset),
            Self::Favorite { id, favorite } => Command::SetFavorite {
                ids: vec![id],
                favorite,
            },
            Self::Rating { id, rating } => Command::SetRating {
                ids: vec![id],
                rating,
            },
        };
        Some(command)
    }
}

/// Events pushed to remote clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Error(String),
    Song(Option<QueueEntry>),
    State(RemoteState),
    Position(f64),
    Playback(PlaybackStatus),
    Favorite { id: String, favorite: bool },
    Rating { id: String, rating: Option<u8> },
    Repeat(RepeatMode),
    Shuffle(bool),
    Volume(u8),
    /// Base64 image bytes
    Proxy(String),
}

impl ServerEvent {
    /// Wire form of a player event; queue-shape changes are not pushed
    pub fn from_player_event(event: &PlayerEvent) -> Option<Self> {
        let event = match event {
            PlayerEvent::Song(entry) => Self::Song(entry.clone()),
            PlayerEvent::Playback(status) => Self::Playback(*status),
            PlayerEvent::Position(seconds) => Self::Position(*seconds),
            PlayerEvent::Volume(level) => Self::Volume(*level),
            PlayerEvent::Repeat(mode) => Self::Repeat(*mode),
            PlayerEvent::Shuffle(on) => Self::Shuffle(*on),
            PlayerEvent::Favorite { id, favorite } => Self::Favorite {
                id: id.clone(),
                favorite: *favorite,
            },
            PlayerEvent::Rating { id, rating } => Self::Rating {
                id: id.clone(),
                rating: *rating,
            },
            PlayerEvent::Error(message) => Self::Error(message.clone()),
            PlayerEvent::QueueChanged => return None,
        };
        Some(event)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Compact state pushed on authentication and after a subscriber lagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteState {
    pub song: Option<QueueEntry>,
    pub status: PlaybackStatus,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    pub volume: u8,
    pub position: f64,
}

impl From<&PlayerSnapshot> for RemoteState {
    fn from(snapshot: &PlayerSnapshot) -> Self {
        Self {
            song: snapshot.song.clone(),
            status: snapshot.status,
            repeat: snapshot.repeat,
            shuffle: snapshot.shuffle,
            volume: if snapshot.muted { 0 } else { snapshot.volume },
            position: snapshot.position,
        }
    }
}

/// How a client should react to a close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// 4000: warn that the server is down, no immediate reconnect
    ServerDown,
    /// 4001, or a close the client initiated itself: nothing to report
    Natural,
    /// 4002/4003: reload full state
    Reload,
    /// Anything else: surface as an unexpected failure
    Unexpected,
}

impl CloseDisposition {
    /// `natural` is set when the client closed the socket on purpose
    pub fn classify(code: u16, natural: bool) -> Self {
        match code {
            CLOSE_VERSION_MISMATCH | CLOSE_AUTH_REJECTED => Self::Reload,
            CLOSE_SHUTDOWN => Self::ServerDown,
            CLOSE_SUPERSEDED => Self::Natural,
            _ if natural => Self::Natural,
            _ => Self::Unexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fermata_core::Song;
    use serde_json::json;

    #[test]
    fn test_parse_client_events() {
        let auth = ClientEvent::parse(r#"{"event":"authenticate","header":"Bearer x"}"#).unwrap();
        assert_eq!(
            auth,
            ClientEvent::Authenticate {
                header: "Bearer x".into(),
                version: None
            }
        );

        let volume = ClientEvent::parse(r#"{"event":"volume","volume":40}"#).unwrap();
        assert!(matches!(
            volume.into_command(),
            Some(Command::SetVolume(40))
        ));

        let rating = ClientEvent::parse(r#"{"event":"rating","id":"s1","rating":null}"#).unwrap();
        assert_eq!(
            rating,
            ClientEvent::Rating {
                id: "s1".into(),
                rating: None
            }
        );

        assert!(ClientEvent::parse(r#"{"event":"selfDestruct"}"#).is_err());
        assert!(ClientEvent::parse("not json").is_err());
    }

    #[test]
    fn test_session_events_have_no_command() {
        assert!(ClientEvent::Proxy.into_command().is_none());
        assert!(ClientEvent::Authenticate {
            header: String::new(),
            version: None
        }
        .into_command()
        .is_none());
        assert!(matches!(
            ClientEvent::Seek { offset: -5.0 }.into_command(),
            Some(Command::SeekBy(o)) if o == -5.0
        ));
    }

    #[test]
    fn test_volume_is_capped() {
        assert!(matches!(
            ClientEvent::Volume { volume: 250 }.into_command(),
            Some(Command::SetVolume(100))
        ));
    }

    #[test]
    fn test_server_event_wire_shape() {
        let value = serde_json::to_value(ServerEvent::Playback(PlaybackStatus::Playing)).unwrap();
        assert_eq!(value, json!({"event": "playback", "data": "PLAYING"}));

        let value = serde_json::to_value(ServerEvent::Repeat(RepeatMode::All)).unwrap();
        assert_eq!(value, json!({"event": "repeat", "data": "ALL"}));

        let value = serde_json::to_value(ServerEvent::Favorite {
            id: "s1".into(),
            favorite: true,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"event": "favorite", "data": {"id": "s1", "favorite": true}})
        );

        let value = serde_json::to_value(ServerEvent::Error("nope".into())).unwrap();
        assert_eq!(value, json!({"event": "error", "data": "nope"}));
    }

    #[test]
    fn test_song_event_carries_song_fields() {
        let entry = QueueEntry::new(Song::new("s1", "srv", "Title", 100.0));
        let value = serde_json::to_value(ServerEvent::Song(Some(entry.clone()))).unwrap();
        assert_eq!(value["event"], "song");
        assert_eq!(value["data"]["id"], "s1");
        assert_eq!(value["data"]["name"], "Title");
        assert_eq!(
            value["data"]["uniqueId"],
            serde_json::to_value(entry.unique_id).unwrap()
        );
    }

    #[test]
    fn test_queue_changes_are_not_pushed() {
        assert!(ServerEvent::from_player_event(&PlayerEvent::QueueChanged).is_none());
        assert_eq!(
            ServerEvent::from_player_event(&PlayerEvent::Shuffle(true)),
            Some(ServerEvent::Shuffle(true))
        );
    }

    #[test]
    fn test_state_mutes_volume() {
        let mut snapshot = PlayerSnapshot::default();
        snapshot.volume = 70;
        snapshot.muted = true;
        assert_eq!(RemoteState::from(&snapshot).volume, 0);
    }

    #[test]
    fn test_close_disposition() {
        assert_eq!(CloseDisposition::classify(4000, false), CloseDisposition::ServerDown);
        assert_eq!(CloseDisposition::classify(4001, false), CloseDisposition::Natural);
        assert_eq!(CloseDisposition::classify(4002, false), CloseDisposition::Reload);
        assert_eq!(CloseDisposition::classify(4003, true), CloseDisposition::Reload);
        assert_eq!(CloseDisposition::classify(4004, false), CloseDisposition::Unexpected);
        assert_eq!(CloseDisposition::classify(1006, false), CloseDisposition::Unexpected);
        assert_eq!(CloseDisposition::classify(1000, true), CloseDisposition::Natural);
    }
}
