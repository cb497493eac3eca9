//! JSON song library
//!
//! A local stand-in for a streaming server: songs and playlists come from a
//! JSON document, favorites and ratings are kept in memory, scrobbles are
//! logged.
//!
//! ```json
//! {
//!   "songs": [{ "id": "s1", "serverId": "local", "name": "...", "duration": 215.0, ... }],
//!   "playlists": { "morning": ["s1", "s4"] }
//! }
//! ```
use crate::error::{PlayerError, Result};
use async_trait::async_trait;
use fermata_core::{CoreError, MusicServer, Scrobble, Song, SongQuery, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDocument {
    #[serde(default)]
    pub songs: Vec<Song>,

    /// Playlist id to song ids, in playlist order
    #[serde(default)]
    pub playlists: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
pub struct JsonLibrary {
    document: RwLock<LibraryDocument>,
}

impl JsonLibrary {
    pub fn new(document: LibraryDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }

    /// Load a library document from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PlayerError::Library(format!("cannot read {}: {}", path.display(), e))
        })?;
        let document: LibraryDocument = serde_json::from_slice(&bytes)?;
        tracing::info!(
            songs = document.songs.len(),
            playlists = document.playlists.len(),
            "Loaded song library from {}",
            path.display()
        );
        Ok(Self::new(document))
    }

    pub async fn len(&self) -> usize {
        self.document.read().await.songs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn song(&self, id: &str) -> Option<Song> {
        self.document
            .read()
            .await
            .songs
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }
}

fn matches(song: &Song, query: &SongQuery) -> bool {
    if !query.album_ids.is_empty()
        && !song
            .album
            .as_ref()
            .is_some_and(|album| query.album_ids.contains(album))
    {
        return false;
    }

    if !query.artist_ids.is_empty() && !query.artist_ids.contains(&song.artist_name) {
        return false;
    }

    if let Some(term) = query.search_term.as_deref().filter(|t| !t.is_empty()) {
        let term = term.to_lowercase();
        let haystack = format!("{} {}", song.name, song.artist_name).to_lowercase();
        if !haystack.contains(&term) {
            return false;
        }
    }

    true
}

#[async_trait]
impl MusicServer for JsonLibrary {
    async fn fetch_songs_by_query(&self, query: SongQuery) -> fermata_core::Result<Vec<Song>> {
        let document = self.document.read().await;

        let candidates: Vec<&Song> = match &query.playlist_id {
            Some(playlist) => {
                let ids = document
                    .playlists
                    .get(playlist)
                    .ok_or_else(|| CoreError::not_found("Playlist", playlist.clone()))?;
                ids.iter()
                    .filter_map(|id| document.songs.iter().find(|s| &s.id == id))
                    .collect()
            }
            None => document.songs.iter().collect(),
        };

        let mut songs: Vec<Song> = candidates
            .into_iter()
            .filter(|song| matches(song, &query))
            .cloned()
            .collect();

        if query.sort == SortOrder::Desc {
            songs.reverse();
        }
        if let Some(limit) = query.limit {
            songs.truncate(limit);
        }

        tracing::debug!(count = songs.len(), "Resolved library query");
        Ok(songs)
    }

    async fn fetch_songs_by_id(&self, ids: &[String]) -> fermata_core::Result<Vec<Song>> {
        let document = self.document.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| document.songs.iter().find(|s| &s.id == id).cloned())
            .collect())
    }

    async fn scrobble(&self, scrobble: Scrobble) -> fermata_core::Result<()> {
        tracing::info!(
            song = %scrobble.id,
            event = ?scrobble.event,
            position = scrobble.position,
            submission = scrobble.submission,
            "Scrobble"
        );
        Ok(())
    }

    async fn set_favorite(&self, ids: &[String], favorite: bool) -> fermata_core::Result<()> {
        let mut document = self.document.write().await;
        for song in document.songs.iter_mut().filter(|s| ids.contains(&s.id)) {
            song.user_favorite = favorite;
        }
        Ok(())
    }

    async fn set_rating(&self, ids: &[String], rating: Option<u8>) -> fermata_core::Result<()> {
        if rating.is_some_and(|r| r > 5) {
            return Err(CoreError::invalid_input("rating must be between 0 and 5"));
        }
        let mut document = self.document.write().await;
        for song in document.songs.iter_mut().filter(|s| ids.contains(&s.id)) {
            song.user_rating = rating;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> JsonLibrary {
        let songs = vec![
            Song::new("s1", "local", "Morning Light", 200.0).with_artist("Aria"),
            Song::new("s2", "local", "Evening Tide", 180.0).with_artist("Aria"),
            Song::new("s3", "local", "Night Drive", 240.0).with_artist("Borealis"),
        ];
        let mut playlists = HashMap::new();
        playlists.insert("mix".to_string(), vec!["s3".to_string(), "s1".to_string()]);
        JsonLibrary::new(LibraryDocument { songs, playlists })
    }

    fn ids(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(|s| s.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_playlist_keeps_playlist_order() {
        let songs = library()
            .fetch_songs_by_query(SongQuery::playlist("mix"))
            .await
            .unwrap();
        assert_eq!(ids(&songs), vec!["s3", "s1"]);
    }

    #[tokio::test]
    async fn test_unknown_playlist_is_not_found() {
        let result = library()
            .fetch_songs_by_query(SongQuery::playlist("nope"))
            .await;
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_artist_search_sort_and_limit() {
        let lib = library();
        let query = SongQuery {
            artist_ids: vec!["Aria".to_string()],
            sort: SortOrder::Desc,
            ..SongQuery::default()
        };
        let songs = lib.fetch_songs_by_query(query).await.unwrap();
        assert_eq!(ids(&songs), vec!["s2", "s1"]);

        let query = SongQuery {
            search_term: Some("drive".to_string()),
            ..SongQuery::default()
        };
        let songs = lib.fetch_songs_by_query(query).await.unwrap();
        assert_eq!(ids(&songs), vec!["s3"]);

        let query = SongQuery {
            limit: Some(1),
            ..SongQuery::default()
        };
        assert_eq!(lib.fetch_songs_by_query(query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_by_id_follows_request_order() {
        let songs = library()
            .fetch_songs_by_id(&["s2".to_string(), "missing".to_string(), "s1".to_string()])
            .await
            .unwrap();
        assert_eq!(ids(&songs), vec!["s2", "s1"]);
    }

    #[tokio::test]
    async fn test_favorite_and_rating_are_stored() {
        let lib = library();
        lib.set_favorite(&["s1".to_string()], true).await.unwrap();
        lib.set_rating(&["s1".to_string()], Some(4)).await.unwrap();

        let song = lib.song("s1").await.unwrap();
        assert!(song.user_favorite);
        assert_eq!(song.user_rating, Some(4));

        assert!(lib.set_rating(&["s1".to_string()], Some(9)).await.is_err());
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        let document = LibraryDocument {
            songs: vec![Song::new("s1", "local", "Only", 60.0)],
            playlists: HashMap::new(),
        };
        std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

        let lib = JsonLibrary::load(&path).await.unwrap();
        assert_eq!(lib.len().await, 1);

        let missing = JsonLibrary::load(&dir.path().join("none.json")).await;
        assert!(matches!(missing, Err(PlayerError::Library(_))));
    }
}
