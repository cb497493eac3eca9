/// File-backed blob store for the resume snapshot
use async_trait::async_trait;
use fermata_playback::snapshot::SnapshotStore;
use fermata_playback::PlaybackError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "queue".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> fermata_playback::Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PlaybackError::Io(e)),
        }
    }

    async fn save(&self, blob: Vec<u8>) -> fermata_playback::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a crash never leaves a torn snapshot
        let temp = self.temp_path();
        tokio::fs::write(&temp, &blob).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        tracing::debug!(bytes = blob.len(), "Saved queue snapshot to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> fermata_playback::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PlaybackError::Io(e)),
        }
    }
}
