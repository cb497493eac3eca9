//! Process wiring
//!
//! Startup: library, backend, engine, resume snapshot, controller, remote.
//! Shutdown runs the other way round: remote sessions get 4000, the queue
//! is saved, the controller stops, the decode engine is sent `quit`.

use crate::config::{BackendKind, PlayerConfig};
use crate::decoder::DecoderProcess;
use crate::error::{PlayerError, Result};
use crate::library::JsonLibrary;
use crate::resume::FileSnapshotStore;
use fermata_core::Song;
use fermata_playback::backend::{
    transport_channel, ClockElement, DecoderLink, EmbeddedBackend, EventSink, LocalBackend,
    PlaybackBackend,
};
use fermata_playback::snapshot::{load_snapshot, save_snapshot, SnapshotStore};
use fermata_playback::{AddPosition, Controller, ControllerHandle, QueueEngine};
use fermata_remote::{RemoteAuth, RemoteServer};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const CONTROLLER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Read a `--queue` file: a JSON array of songs
pub async fn load_queue_file(path: &Path) -> Result<Vec<Song>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        PlayerError::Library(format!("cannot read queue {}: {}", path.display(), e))
    })?;
    let songs: Vec<Song> = serde_json::from_slice(&bytes)?;
    Ok(songs)
}

/// A running player
pub struct Player {
    controller: ControllerHandle,
    controller_task: JoinHandle<()>,
    remote: Option<RemoteServer>,
    decoder: Option<DecoderProcess>,
    store: Option<FileSnapshotStore>,
}

impl Player {
    /// Start everything; `queue` replaces any restored queue
    pub async fn start(config: PlayerConfig, queue: Option<Vec<Song>>) -> Result<Self> {
        let library = match &config.library.path {
            Some(path) => JsonLibrary::load(path).await?,
            None => {
                tracing::info!("No song library configured");
                JsonLibrary::default()
            }
        };

        let (sink, transport) = transport_channel(config.playback.tick_capacity);
        let (backend, decoder) = build_backend(&config, sink)?;
        let mut engine = QueueEngine::new(config.playback.clone(), backend);

        let store = config
            .resume
            .enabled
            .then(|| FileSnapshotStore::new(config.resume.path.clone()));
        if let Some(store) = &store {
            restore(&mut engine, store).await;
        }

        if let Some(songs) = queue {
            tracing::info!(count = songs.len(), "Loading queue from file");
            engine.enqueue(songs, AddPosition::Now, None);
        }
        engine.drain_events();

        let (controller, handle) = Controller::new(engine, Arc::new(library), transport);
        let controller_task = controller.spawn();

        let remote = if config.remote.enabled {
            let auth = RemoteAuth::from_config(&config.remote);
            match RemoteServer::start(&config.remote, auth, handle.clone()).await {
                Ok(server) => Some(server),
                Err(e) => {
                    // Nothing else is listening yet, so unwind what is running
                    let _ = handle.shutdown().await;
                    let _ = controller_task.await;
                    if let Some(decoder) = decoder {
                        decoder.shutdown().await;
                    }
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        Ok(Self {
            controller: handle,
            controller_task,
            remote,
            decoder,
            store,
        })
    }

    pub fn handle(&self) -> &ControllerHandle {
        &self.controller
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote.as_ref().map(RemoteServer::local_addr)
    }

    /// Stop in reverse start order, saving the queue on the way
    pub async fn shutdown(self) -> Result<()> {
        if let Some(remote) = self.remote {
            remote.shutdown().await;
        }

        if let Some(store) = &self.store {
            match self.controller.queue_snapshot().await {
                Ok(snapshot) if snapshot.is_empty() => store.clear().await?,
                Ok(snapshot) => {
                    save_snapshot(store, &snapshot).await?;
                    tracing::info!(
                        entries = snapshot.entries.len(),
                        "Saved queue to {}",
                        store.path().display()
                    );
                }
                Err(e) => tracing::warn!("Could not snapshot the queue: {}", e),
            }
        }

        if let Err(e) = self.controller.shutdown().await {
            tracing::debug!("Controller already stopped: {}", e);
        }
        if tokio::time::timeout(CONTROLLER_STOP_TIMEOUT, self.controller_task)
            .await
            .is_err()
        {
            tracing::warn!("Playback controller did not stop in time");
        }

        // Nothing drives the backend any more; tell the engine to quit
        if let Some(decoder) = self.decoder {
            decoder.shutdown().await;
        }

        tracing::info!("Player stopped");
        Ok(())
    }
}

fn build_backend(
    config: &PlayerConfig,
    sink: EventSink,
) -> Result<(Box<dyn PlaybackBackend>, Option<DecoderProcess>)> {
    match config.backend.kind {
        BackendKind::Embedded => {
            tracing::info!("Using the embedded backend");
            let backend = EmbeddedBackend::new(ClockElement::new(), ClockElement::new(), sink);
            Ok((Box::new(backend), None))
        }
        BackendKind::Local => {
            let program = config.backend.decoder.as_deref().ok_or_else(|| {
                PlayerError::Config("backend.decoder is not set".to_string())
            })?;
            let (backend, commands) = LocalBackend::new();
            let process = DecoderProcess::spawn(
                program,
                &config.backend.decoder_args,
                commands,
                backend.quit_handle(),
                DecoderLink::new(sink),
            )?;
            Ok((Box::new(backend), Some(process)))
        }
    }
}

/// Apply the saved snapshot; an unreadable one is logged and skipped
async fn restore(engine: &mut QueueEngine, store: &dyn SnapshotStore) {
    match load_snapshot(store).await {
        Ok(Some(snapshot)) => match engine.restore(snapshot) {
            Ok(()) => tracing::info!(
                entries = engine.queue().len(),
                "Restored queue from last session"
            ),
            Err(e) => tracing::warn!("Discarding saved queue: {}", e),
        },
        Ok(None) => tracing::debug!("No saved queue"),
        Err(e) => tracing::warn!("Discarding saved queue: {}", e),
    }
}
