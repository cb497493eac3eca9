//! Controller integration tests
//!
//! Commands, transport events and server calls all go through the single
//! controller task; these tests observe it only through its handle.

use async_trait::async_trait;
use fermata_core::{CoreError, MusicServer, Scrobble, ScrobbleEvent, Song, SongQuery};
use fermata_playback::backend::{
    transport_channel, ClockElement, EmbeddedBackend, EventSink, RecordingBackend,
};
use fermata_playback::{
    AddPosition, Command, Controller, ControllerHandle, EngineState, PlaybackConfig, PlayerEvent,
    QueueEngine, StartAt,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ===== Test Helpers =====

#[derive(Default)]
struct StubServer {
    favorites: Mutex<Vec<(Vec<String>, bool)>>,
    scrobbles: Mutex<Vec<Scrobble>>,
}

fn library() -> Vec<Song> {
    ["A", "B", "C"]
        .iter()
        .map(|id| {
            Song::new(*id, "srv", format!("Song {}", id), 3.0)
                .with_stream_url(format!("http://srv/stream/{}", id))
        })
        .collect()
}

#[async_trait]
impl MusicServer for StubServer {
    async fn fetch_songs_by_query(&self, query: SongQuery) -> fermata_core::Result<Vec<Song>> {
        match query.playlist_id.as_deref() {
            Some("cancelled") => Err(CoreError::Cancelled),
            Some("broken") => Err(CoreError::network("connection reset")),
            _ => Ok(library()),
        }
    }

    async fn fetch_songs_by_id(&self, ids: &[String]) -> fermata_core::Result<Vec<Song>> {
        Ok(library()
            .into_iter()
            .filter(|s| ids.contains(&s.id))
            .collect())
    }

    async fn scrobble(&self, scrobble: Scrobble) -> fermata_core::Result<()> {
        self.scrobbles.lock().unwrap().push(scrobble);
        Ok(())
    }

    async fn set_favorite(&self, ids: &[String], favorite: bool) -> fermata_core::Result<()> {
        self.favorites.lock().unwrap().push((ids.to_vec(), favorite));
        Ok(())
    }

    async fn set_rating(&self, _ids: &[String], _rating: Option<u8>) -> fermata_core::Result<()> {
        Err(CoreError::server("ratings disabled"))
    }
}

fn recording_engine() -> QueueEngine {
    QueueEngine::new(PlaybackConfig::default(), Box::new(RecordingBackend::new()))
}

/// Wait for the first event matching `pred`
async fn wait_for<F>(events: &mut broadcast::Receiver<PlayerEvent>, pred: F) -> PlayerEvent
where
    F: Fn(&PlayerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("controller stopped"),
            }
        }
    })
    .await
    .expect("event did not arrive")
}

fn drain(events: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ===== Serialization =====

#[tokio::test]
async fn test_racing_next_and_previous_produce_one_song_event() {
    let mut engine = recording_engine();
    engine.enqueue(library(), AddPosition::Now, Some(1));
    engine.drain_events();

    let (_sink, transport) = transport_channel(4);
    let (controller, handle) = Controller::new(engine, Arc::new(StubServer::default()), transport);
    let mut events = handle.subscribe();

    // Both queued before the task runs, so they land in one batch
    handle.try_send(Command::Next).unwrap();
    handle.try_send(Command::Previous).unwrap();
    let task = controller.spawn();

    // Round trip to make sure the batch has been published
    handle.queue_snapshot().await.unwrap();

    let songs: Vec<PlayerEvent> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, PlayerEvent::Song(_)))
        .collect();
    assert_eq!(songs.len(), 1);

    let state = handle.snapshot();
    let index = state.current_index.unwrap();
    assert!((0..=2).contains(&index));
    match &songs[0] {
        PlayerEvent::Song(Some(entry)) => {
            assert_eq!(state.song.as_ref().map(|s| s.unique_id), Some(entry.unique_id));
        }
        other => panic!("unexpected event {:?}", other),
    }

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_commands_apply_in_send_order() {
    let (_sink, transport) = transport_channel(4);
    let (controller, handle) =
        Controller::new(recording_engine(), Arc::new(StubServer::default()), transport);
    let task = controller.spawn();

    handle
        .send(Command::Enqueue {
            songs: library(),
            position: AddPosition::Now,
            start: None,
        })
        .await
        .unwrap();
    handle.send(Command::Next).await.unwrap();
    handle.send(Command::Next).await.unwrap();
    handle.send(Command::Next).await.unwrap();
    handle.send(Command::Previous).await.unwrap();

    let snapshot = handle.queue_snapshot().await.unwrap();
    assert_eq!(snapshot.current_index, Some(1));
    assert_eq!(handle.snapshot().queue_length, 3);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

// ===== Server Calls =====

#[tokio::test]
async fn test_enqueue_query_starts_at_song_id() {
    let (_sink, transport) = transport_channel(4);
    let (controller, handle) =
        Controller::new(recording_engine(), Arc::new(StubServer::default()), transport);
    let mut events = handle.subscribe();
    let task = controller.spawn();

    handle
        .send(Command::EnqueueQuery {
            query: SongQuery::album("album-1"),
            position: AddPosition::Now,
            start: Some(StartAt::SongId("C".into())),
        })
        .await
        .unwrap();

    let event = wait_for(&mut events, |e| matches!(e, PlayerEvent::Song(Some(_)))).await;
    match event {
        PlayerEvent::Song(Some(entry)) => assert_eq!(entry.song.id, "C"),
        other => panic!("unexpected event {:?}", other),
    }

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_cancelled_fetch_is_silent_but_failure_is_reported() {
    let (_sink, transport) = transport_channel(4);
    let (controller, handle) =
        Controller::new(recording_engine(), Arc::new(StubServer::default()), transport);
    let mut events = handle.subscribe();
    let task = controller.spawn();

    handle
        .send(Command::EnqueueQuery {
            query: SongQuery::playlist("cancelled"),
            position: AddPosition::Last,
            start: None,
        })
        .await
        .unwrap();
    handle
        .send(Command::EnqueueQuery {
            query: SongQuery::playlist("broken"),
            position: AddPosition::Last,
            start: None,
        })
        .await
        .unwrap();

    let event = wait_for(&mut events, |e| matches!(e, PlayerEvent::Error(_))).await;
    match event {
        PlayerEvent::Error(message) => assert!(message.contains("connection reset")),
        other => panic!("unexpected event {:?}", other),
    }

    handle.queue_snapshot().await.unwrap();
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, PlayerEvent::Error(_))));
    assert_eq!(handle.snapshot().state, EngineState::Empty);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_favorite_applies_after_server_accepts() {
    let server = Arc::new(StubServer::default());
    let mut engine = recording_engine();
    engine.enqueue(library(), AddPosition::Now, None);
    engine.drain_events();

    let (_sink, transport) = transport_channel(4);
    let (controller, handle) = Controller::new(engine, server.clone(), transport);
    let mut events = handle.subscribe();
    let task = controller.spawn();

    handle
        .send(Command::SetFavorite {
            ids: vec!["A".into()],
            favorite: true,
        })
        .await
        .unwrap();

    let event = wait_for(&mut events, |e| matches!(e, PlayerEvent::Favorite { .. })).await;
    assert_eq!(
        event,
        PlayerEvent::Favorite {
            id: "A".into(),
            favorite: true
        }
    );
    assert_eq!(
        server.favorites.lock().unwrap().clone(),
        vec![(vec!["A".to_string()], true)]
    );
    let song = handle.snapshot().song.unwrap();
    assert!(song.song.user_favorite);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_rejected_rating_surfaces_error_and_leaves_song() {
    let mut engine = recording_engine();
    engine.enqueue(library(), AddPosition::Now, None);
    engine.drain_events();

    let (_sink, transport) = transport_channel(4);
    let (controller, handle) =
        Controller::new(engine, Arc::new(StubServer::default()), transport);
    let mut events = handle.subscribe();
    let task = controller.spawn();

    handle
        .send(Command::SetRating {
            ids: vec!["A".into()],
            rating: Some(4),
        })
        .await
        .unwrap();

    wait_for(&mut events, |e| matches!(e, PlayerEvent::Error(_))).await;
    assert_eq!(handle.snapshot().song.unwrap().song.user_rating, None);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

// ===== Transport =====

fn embedded_controller(server: Arc<StubServer>) -> (Controller, ControllerHandle, EventSink) {
    let mut config = PlaybackConfig::default();
    config.poll_interval_ms = 100;
    let (sink, transport) = transport_channel(config.tick_capacity);
    let backend = EmbeddedBackend::new(ClockElement::new(), ClockElement::new(), sink.clone());
    let engine = QueueEngine::new(config, Box::new(backend));
    let (controller, handle) = Controller::new(engine, server, transport);
    (controller, handle, sink)
}

#[tokio::test(start_paused = true)]
async fn test_embedded_backend_advances_through_queue() {
    let server = Arc::new(StubServer::default());
    let (controller, handle, _sink) = embedded_controller(server.clone());
    let mut events = handle.subscribe();
    let task = controller.spawn();

    handle
        .send(Command::Enqueue {
            songs: library(),
            position: AddPosition::Now,
            start: None,
        })
        .await
        .unwrap();

    let mut played = Vec::new();
    while played.len() < 4 {
        match wait_for(&mut events, |e| matches!(e, PlayerEvent::Song(_))).await {
            PlayerEvent::Song(Some(entry)) => played.push(entry.song.id),
            PlayerEvent::Song(None) => break,
            _ => unreachable!(),
        }
    }

    // A, B, C, then back to A and stopped
    assert_eq!(played, vec!["A", "B", "C", "A"]);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let state = handle.snapshot();
    assert_eq!(state.state, EngineState::Stopped);
    assert_eq!(state.current_index, Some(0));

    let scrobbles = server.scrobbles.lock().unwrap().clone();
    assert!(scrobbles
        .iter()
        .any(|s| s.id == "A" && s.event == ScrobbleEvent::Start));
    assert!(scrobbles.iter().any(|s| s.id == "A" && s.submission));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_pauses_playback() {
    let (controller, handle, sink) = embedded_controller(Arc::new(StubServer::default()));
    let mut events = handle.subscribe();
    let task = controller.spawn();

    handle
        .send(Command::Enqueue {
            songs: library(),
            position: AddPosition::Now,
            start: None,
        })
        .await
        .unwrap();
    wait_for(&mut events, |e| matches!(e, PlayerEvent::Song(Some(_)))).await;

    sink.failed("decoder crashed");
    let event = wait_for(&mut events, |e| matches!(e, PlayerEvent::Error(_))).await;
    assert_eq!(event, PlayerEvent::Error("decoder crashed".into()));

    handle.queue_snapshot().await.unwrap();
    let state = handle.snapshot();
    assert_eq!(state.state, EngineState::Paused);
    assert_eq!(state.queue_length, 3);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}
