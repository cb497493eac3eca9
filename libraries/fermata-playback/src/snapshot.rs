//! Resume-on-restart snapshot
//!
//! The engine produces and consumes a [`QueueSnapshot`]; where the bytes
//! live is up to a [`SnapshotStore`]. On disk the snapshot is JSON,
//! zlib-compressed.

use crate::error::{PlaybackError, Result};
use crate::types::{QueueEntry, RepeatMode, ShuffleMode, UniqueId};
use async_trait::async_trait;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tokio::sync::Mutex;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable state of the queue engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub version: u32,

    /// Entries in insertion order
    pub entries: Vec<QueueEntry>,

    /// Shuffled order as unique ids, present while shuffle is on
    #[serde(default)]
    pub shuffled: Option<Vec<UniqueId>>,

    /// Index into the active ordering
    #[serde(default)]
    pub current_index: Option<usize>,

    #[serde(default)]
    pub repeat: RepeatMode,

    #[serde(default)]
    pub shuffle: ShuffleMode,

    /// Last known playhead in seconds
    #[serde(default)]
    pub position: f64,

    pub volume: u8,

    #[serde(default)]
    pub muted: bool,

    pub speed: f64,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serialize and compress a snapshot
pub fn encode(snapshot: &QueueSnapshot) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(snapshot)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decompress and parse a snapshot, rejecting unknown versions
pub fn decode(bytes: &[u8]) -> Result<QueueSnapshot> {
    let mut json = Vec::new();
    ZlibDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(|e| PlaybackError::InvalidSnapshot(format!("corrupt blob: {}", e)))?;

    let snapshot: QueueSnapshot = serde_json::from_slice(&json)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PlaybackError::UnsupportedSnapshotVersion(snapshot.version));
    }
    Ok(snapshot)
}

/// Blob store holding the persisted snapshot
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The last saved blob, if any
    async fn load(&self) -> Result<Option<Vec<u8>>>;

    async fn save(&self, blob: Vec<u8>) -> Result<()>;

    /// Remove the saved blob
    async fn clear(&self) -> Result<()>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().await.clone())
    }

    async fn save(&self, blob: Vec<u8>) -> Result<()> {
        *self.blob.lock().await = Some(blob);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.blob.lock().await = None;
        Ok(())
    }
}

/// Load and decode the stored snapshot
///
/// A missing blob is `Ok(None)`; a corrupt or outdated one is an error the
/// caller is expected to log and ignore.
pub async fn load_snapshot(store: &dyn SnapshotStore) -> Result<Option<QueueSnapshot>> {
    match store.load().await? {
        Some(blob) => decode(&blob).map(Some),
        None => Ok(None),
    }
}

/// Encode and store a snapshot
pub async fn save_snapshot(store: &dyn SnapshotStore, snapshot: &QueueSnapshot) -> Result<()> {
    store.save(encode(snapshot)?).await
}
