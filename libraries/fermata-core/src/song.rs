/// Song types as delivered by the music server
use serde::{Deserialize, Serialize};

/// Kind of library item a value was fetched as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LibraryItem {
    Album,
    AlbumArtist,
    Artist,
    Genre,
    Playlist,
    #[default]
    Song,
}

/// Replay-gain pair (album and track level), either side may be unknown
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GainInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<f64>,
}

/// A playable song
///
/// Songs are treated as immutable once inserted into a queue, apart from
/// the user's favorite flag and rating which the player keeps in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// Song id on the music server (may repeat within a queue)
    pub id: String,

    /// Id of the server this song belongs to
    pub server_id: String,

    /// Song title
    pub name: String,

    #[serde(default)]
    pub artist_name: String,

    #[serde(default)]
    pub album: Option<String>,

    /// Length in seconds
    pub duration: f64,

    #[serde(default)]
    pub bpm: Option<f64>,

    #[serde(default)]
    pub gain: Option<GainInfo>,

    #[serde(default)]
    pub peak: Option<GainInfo>,

    #[serde(default)]
    pub user_favorite: bool,

    /// Rating 0-5, `None` when unrated
    #[serde(default)]
    pub user_rating: Option<u8>,

    /// Direct stream URL for the playback backend
    #[serde(default)]
    pub stream_url: String,

    /// Cover art URL, proxied to remote clients on request
    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub item_type: LibraryItem,
}

impl Song {
    /// Create a song with the minimum fields needed for playback
    pub fn new(
        id: impl Into<String>,
        server_id: impl Into<String>,
        name: impl Into<String>,
        duration: f64,
    ) -> Self {
        Self {
            id: id.into(),
            server_id: server_id.into(),
            name: name.into(),
            artist_name: String::new(),
            album: None,
            duration,
            bpm: None,
            gain: None,
            peak: None,
            user_favorite: false,
            user_rating: None,
            stream_url: String::new(),
            image_url: None,
            item_type: LibraryItem::Song,
        }
    }

    /// Builder: set the stream URL
    #[must_use]
    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = url.into();
        self
    }

    /// Builder: set the artist name
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist_name = artist.into();
        self
    }

    /// Builder: set the cover art URL
    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Track replay gain in dB, if known
    pub fn track_gain(&self) -> Option<f64> {
        self.gain.and_then(|g| g.track.or(g.album))
    }
}
