//! Single-writer playback controller
//!
//! One tokio task owns the [`QueueEngine`]. Local UI input, remote commands,
//! and backend transport events all funnel into it, so mutations are applied
//! one at a time in a single observable order.
//!
//! Each wake-up drains every command already waiting and applies the lot as
//! one batch; the batch's events are coalesced before broadcast, so two
//! racing transport commands produce one `Song` event carrying the final
//! state.
//!
//! Calls to the music server (fetch, favorite, rating, scrobble) run in
//! spawned tasks and feed their outcome back as commands.

use crate::backend::{TransportReceiver, TransportTick};
use crate::engine::QueueEngine;
use crate::error::{PlaybackError, Result};
use crate::events::{coalesce, PlayerEvent, PlayerSnapshot};
use crate::scrobble::Scrobbler;
use crate::snapshot::QueueSnapshot;
use crate::types::{AddPosition, RepeatMode, ShuffleMode, UniqueId};
use fermata_core::{CoreError, MusicServer, Song, SongQuery};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Which fetched song should become current
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartAt {
    Index(usize),
    SongId(String),
}

/// Mutation requests accepted by the controller
#[derive(Debug)]
pub enum Command {
    Enqueue {
        songs: Vec<Song>,
        position: AddPosition,
        start: Option<usize>,
    },
    /// Resolve a query on the music server, then enqueue the result
    EnqueueQuery {
        query: SongQuery,
        position: AddPosition,
        start: Option<StartAt>,
    },
    Remove(Vec<UniqueId>),
    Move {
        id: UniqueId,
        from: usize,
        to: usize,
    },
    Clear,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    SetCurrentIndex(usize),
    Seek(f64),
    SeekBy(f64),
    SkipForward,
    SkipBackward,
    SetVolume(u8),
    ToggleMute,
    SetSpeed(f64),
    ToggleShuffle,
    SetShuffle(ShuffleMode),
    ToggleRepeat,
    SetRepeat(RepeatMode),
    /// Ask the server to (un)favorite, then apply locally
    SetFavorite {
        ids: Vec<String>,
        favorite: bool,
    },
    /// Ask the server to rate, then apply locally
    SetRating {
        ids: Vec<String>,
        rating: Option<u8>,
    },
    /// Server accepted a favorite change
    ApplyFavorite {
        ids: Vec<String>,
        favorite: bool,
    },
    /// Server accepted a rating change
    ApplyRating {
        ids: Vec<String>,
        rating: Option<u8>,
    },
    /// Surface an error raised outside the engine
    ReportError(String),
    Restore(QueueSnapshot),
    Snapshot(oneshot::Sender<QueueSnapshot>),
    Shutdown,
}

/// Cloneable handle to a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<PlayerEvent>,
    state: watch::Receiver<PlayerSnapshot>,
}

impl ControllerHandle {
    /// Queue a command, waiting if the controller is backed up
    pub async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::ControllerClosed)
    }

    /// Queue a command without waiting; fails when the queue is full
    pub fn try_send(&self, command: Command) -> Result<()> {
        self.commands
            .try_send(command)
            .map_err(|_| PlaybackError::ControllerClosed)
    }

    /// Subscribe to coalesced player events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Latest published player state
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state.borrow().clone()
    }

    /// Watch channel of the player state
    pub fn watch(&self) -> watch::Receiver<PlayerSnapshot> {
        self.state.clone()
    }

    /// Request the persistable queue snapshot
    pub async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx)).await?;
        rx.await.map_err(|_| PlaybackError::ControllerClosed)
    }

    /// Ask the controller to stop
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

pub struct Controller {
    engine: QueueEngine,
    server: Arc<dyn MusicServer>,
    commands: mpsc::Receiver<Command>,
    feedback: mpsc::WeakSender<Command>,
    transport: TransportReceiver,
    events: broadcast::Sender<PlayerEvent>,
    state: watch::Sender<PlayerSnapshot>,
    scrobbler: Option<Scrobbler>,
    poll_interval: Duration,
}

impl Controller {
    /// Wire a controller around `engine`
    ///
    /// Nothing runs until [`Controller::spawn`] or [`Controller::run`];
    /// commands sent before that are applied as the first batch.
    pub fn new(
        engine: QueueEngine,
        server: Arc<dyn MusicServer>,
        transport: TransportReceiver,
    ) -> (Self, ControllerHandle) {
        let config = engine.config().clone();
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(engine.player_snapshot());

        let controller = Self {
            feedback: command_tx.downgrade(),
            engine,
            server,
            commands: command_rx,
            transport,
            events: events_tx.clone(),
            state: state_tx,
            scrobbler: config.scrobble.then(Scrobbler::new),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        };
        let handle = ControllerHandle {
            commands: command_tx,
            events: events_tx,
            state: state_rx,
        };
        (controller, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(backend = self.engine.backend_name(), "Playback controller started");
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                Some(event) = self.transport.events.recv() => {
                    self.engine.handle_transport(event);
                }

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("All controller handles dropped");
                        break;
                    };
                    let mut batch = vec![command];
                    while let Ok(command) = self.commands.try_recv() {
                        batch.push(command);
                    }
                    if !self.apply_batch(batch) {
                        break;
                    }
                }

                Some(tick) = self.transport.ticks.recv() => {
                    let latest = self.latest_tick(tick);
                    self.engine.position_tick(latest);
                }

                _ = poll.tick() => {
                    self.engine.poll_backend();
                }
            }

            self.publish();
        }

        self.engine.stop();
        self.publish();
        tracing::info!("Playback controller stopped");
    }

    /// Only the newest queued tick matters
    fn latest_tick(&mut self, mut tick: TransportTick) -> TransportTick {
        while let Ok(newer) = self.transport.ticks.try_recv() {
            tick = newer;
        }
        tick
    }

    /// Apply commands in order; returns `false` on shutdown
    fn apply_batch(&mut self, batch: Vec<Command>) -> bool {
        for command in batch {
            if matches!(command, Command::Shutdown) {
                tracing::info!("Playback controller shutting down");
                return false;
            }
            self.apply(command);
        }
        true
    }

    fn apply(&mut self, command: Command) {
        let engine = &mut self.engine;
        match command {
            Command::Enqueue {
                songs,
                position,
                start,
            } => engine.enqueue(songs, position, start),
            Command::EnqueueQuery {
                query,
                position,
                start,
            } => self.fetch_and_enqueue(query, position, start),
            Command::Remove(ids) => engine.remove(&ids),
            Command::Move { id, from, to } => engine.move_entry(id, from, to),
            Command::Clear => engine.clear(),
            Command::Play => engine.play(),
            Command::Pause => engine.pause(),
            Command::PlayPause => engine.play_pause(),
            Command::Stop => engine.stop(),
            Command::Next => engine.next(),
            Command::Previous => engine.previous(),
            Command::SetCurrentIndex(index) => engine.set_current_index(index),
            Command::Seek(seconds) => engine.seek(seconds),
            Command::SeekBy(offset) => engine.seek_by(offset),
            Command::SkipForward => engine.skip_forward(),
            Command::SkipBackward => engine.skip_backward(),
            Command::SetVolume(level) => engine.set_volume(level),
            Command::ToggleMute => engine.toggle_mute(),
            Command::SetSpeed(speed) => engine.set_speed(speed),
            Command::ToggleShuffle => engine.toggle_shuffle(),
            Command::SetShuffle(mode) => engine.set_shuffle(mode),
            Command::ToggleRepeat => engine.toggle_repeat(),
            Command::SetRepeat(mode) => engine.set_repeat(mode),
            Command::SetFavorite { ids, favorite } => self.update_favorite(ids, favorite),
            Command::SetRating { ids, rating } => self.update_rating(ids, rating),
            Command::ApplyFavorite { ids, favorite } => engine.set_favorite(&ids, favorite),
            Command::ApplyRating { ids, rating } => engine.set_rating(&ids, rating),
            Command::ReportError(message) => engine.backend_error(message),
            Command::Restore(snapshot) => {
                if let Err(e) = engine.restore(snapshot) {
                    tracing::warn!("Discarding unusable queue snapshot: {}", e);
                }
            }
            Command::Snapshot(reply) => {
                // Receiver gone means the caller stopped waiting
                let _ = reply.send(engine.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn fetch_and_enqueue(&self, query: SongQuery, position: AddPosition, start: Option<StartAt>) {
        let server = Arc::clone(&self.server);
        self.spawn_server_call(async move {
            let songs = server.fetch_songs_by_query(query).await?;
            let start = match start {
                Some(StartAt::Index(index)) => Some(index),
                Some(StartAt::SongId(id)) => songs.iter().position(|s| s.id == id),
                None => None,
            };
            Ok::<_, CoreError>(Some(Command::Enqueue {
                songs,
                position,
                start,
            }))
        });
    }

    fn update_favorite(&self, ids: Vec<String>, favorite: bool) {
        let server = Arc::clone(&self.server);
        self.spawn_server_call(async move {
            server.set_favorite(&ids, favorite).await?;
            Ok::<_, CoreError>(Some(Command::ApplyFavorite { ids, favorite }))
        });
    }

    fn update_rating(&self, ids: Vec<String>, rating: Option<u8>) {
        let server = Arc::clone(&self.server);
        self.spawn_server_call(async move {
            server.set_rating(&ids, rating).await?;
            Ok::<_, CoreError>(Some(Command::ApplyRating { ids, rating }))
        });
    }

    /// Run a server call off the control path and feed the outcome back
    ///
    /// Cancellations are dropped silently; other failures come back as a
    /// user-visible error.
    fn spawn_server_call<F>(&self, call: F)
    where
        F: std::future::Future<Output = fermata_core::Result<Option<Command>>> + Send + 'static,
    {
        let Some(feedback) = self.feedback.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let follow_up = match call.await {
                Ok(command) => command,
                Err(e) if e.is_cancellation() => {
                    tracing::debug!("Music server request cancelled");
                    None
                }
                Err(e) => {
                    tracing::warn!("Music server request failed: {}", e);
                    Some(Command::ReportError(e.to_string()))
                }
            };
            if let Some(command) = follow_up {
                if feedback.send(command).await.is_err() {
                    tracing::debug!("Controller gone before server call finished");
                }
            }
        });
    }

    fn publish(&mut self) {
        let events = coalesce(self.engine.drain_events());

        for event in events {
            if let Some(scrobbler) = self.scrobbler.as_mut() {
                if let Some(scrobble) = scrobbler.observe(&event) {
                    let server = Arc::clone(&self.server);
                    tokio::spawn(async move {
                        if let Err(e) = server.scrobble(scrobble).await {
                            log_scrobble_failure(&e);
                        }
                    });
                }
            }
            // No subscribers is fine
            let _ = self.events.send(event);
        }

        let snapshot = self.engine.player_snapshot();
        self.state.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

fn log_scrobble_failure(error: &CoreError) {
    if !error.is_cancellation() {
        tracing::debug!("Scrobble failed: {}", error);
    }
}
