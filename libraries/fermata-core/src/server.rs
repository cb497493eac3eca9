/// Music server boundary
///
/// The concrete Jellyfin/Navidrome/Subsonic clients live outside this
/// workspace; the player only needs this capability.
use crate::error::Result;
use crate::song::Song;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Query used to resolve a batch of songs to enqueue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongQuery {
    #[serde(default)]
    pub album_ids: Vec<String>,

    #[serde(default)]
    pub artist_ids: Vec<String>,

    #[serde(default)]
    pub playlist_id: Option<String>,

    #[serde(default)]
    pub search_term: Option<String>,

    #[serde(default)]
    pub sort: SortOrder,

    #[serde(default)]
    pub limit: Option<usize>,
}

impl SongQuery {
    /// All songs of one album
    pub fn album(id: impl Into<String>) -> Self {
        Self {
            album_ids: vec![id.into()],
            ..Self::default()
        }
    }

    /// All songs of one playlist
    pub fn playlist(id: impl Into<String>) -> Self {
        Self {
            playlist_id: Some(id.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Scrobble lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScrobbleEvent {
    Start,
    Pause,
    Unpause,
    TimeUpdate,
}

/// A scrobble report for one song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scrobble {
    pub id: String,
    pub event: ScrobbleEvent,
    /// Playhead in seconds
    pub position: f64,
    /// `true` for the single "listened" submission, `false` for now-playing updates
    pub submission: bool,
}

/// Capability interface for a music server backend
#[async_trait]
pub trait MusicServer: Send + Sync {
    /// Resolve a query into songs, in server order
    async fn fetch_songs_by_query(&self, query: SongQuery) -> Result<Vec<Song>>;

    /// Fetch specific songs, in the order of `ids`
    async fn fetch_songs_by_id(&self, ids: &[String]) -> Result<Vec<Song>>;

    /// Report listening progress
    async fn scrobble(&self, scrobble: Scrobble) -> Result<()>;

    /// Mark songs as (un)favorite
    async fn set_favorite(&self, ids: &[String], favorite: bool) -> Result<()>;

    /// Set or clear the rating of songs
    async fn set_rating(&self, ids: &[String], rating: Option<u8>) -> Result<()>;
}
