//! Session registry and broadcast fan-out

use crate::outbound::OutboundQueue;
use crate::protocol::{ServerEvent, CLOSE_SHUTDOWN, CLOSE_SUPERSEDED};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SessionId = u64;

#[derive(Debug)]
struct Entry {
    id: SessionId,
    queue: Arc<OutboundQueue>,
    /// Activation order, set once authenticated
    active_since: Option<u64>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: Vec<Entry>,
    next_id: SessionId,
    activations: u64,
    shut_down: bool,
}

/// All live sessions; authenticated ones receive broadcasts
#[derive(Debug)]
pub struct Hub {
    inner: Mutex<Inner>,
    max_sessions: usize,
    outbound_capacity: usize,
}

impl Hub {
    pub fn new(max_sessions: usize, outbound_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_sessions: max_sessions.max(1),
            outbound_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a new connection; `None` once the hub is shut down
    pub fn register(&self) -> Option<(SessionId, Arc<OutboundQueue>)> {
        let mut inner = self.lock();
        if inner.shut_down {
            return None;
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let queue = Arc::new(OutboundQueue::new(self.outbound_capacity));
        inner.sessions.push(Entry {
            id,
            queue: Arc::clone(&queue),
            active_since: None,
        });
        Some((id, queue))
    }

    /// Start broadcasting to `id`
    ///
    /// Past `max_sessions` active sessions the oldest is superseded and
    /// closed with 4001.
    pub fn activate(&self, id: SessionId) -> bool {
        let mut inner = self.lock();
        inner.activations += 1;
        let seq = inner.activations;
        let Some(entry) = inner.sessions.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        entry.active_since = Some(seq);

        let active = inner
            .sessions
            .iter()
            .filter(|e| e.active_since.is_some())
            .count();
        if active > self.max_sessions {
            if let Some(oldest) = inner
                .sessions
                .iter_mut()
                .filter(|e| e.active_since.is_some())
                .min_by_key(|e| e.active_since)
            {
                tracing::info!(session = oldest.id, "Superseding oldest remote session");
                oldest.active_since = None;
                oldest.queue.close(CLOSE_SUPERSEDED, "superseded");
            }
        }
        true
    }

    /// Push to every authenticated session without waiting on any of them
    pub fn broadcast(&self, event: &ServerEvent) {
        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize remote event: {}", e);
                return;
            }
        };

        let inner = self.lock();
        for entry in inner.sessions.iter().filter(|e| e.active_since.is_some()) {
            entry.queue.push(text.clone());
        }
    }

    pub fn remove(&self, id: SessionId) {
        self.lock().sessions.retain(|e| e.id != id);
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .sessions
            .iter()
            .filter(|e| e.active_since.is_some())
            .count()
    }

    /// Close every session with 4000 and refuse new ones
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.shut_down = true;
        for entry in &mut inner.sessions {
            entry.active_since = None;
            entry.queue.close(CLOSE_SHUTDOWN, "server shutting down");
        }
        tracing::info!(sessions = inner.sessions.len(), "Closed remote sessions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::Outgoing;

    #[tokio::test]
    async fn test_broadcast_reaches_only_active_sessions() {
        let hub = Hub::new(4, 8);
        let (a, queue_a) = hub.register().unwrap();
        let (_b, queue_b) = hub.register().unwrap();
        hub.activate(a);

        hub.broadcast(&ServerEvent::Shuffle(true));

        assert_eq!(queue_a.len(), 1);
        assert!(queue_b.is_empty());
        assert_eq!(
            queue_a.next().await,
            Some(Outgoing::Text(r#"{"event":"shuffle","data":true}"#.into()))
        );
    }

    #[tokio::test]
    async fn test_oldest_session_superseded() {
        let hub = Hub::new(1, 8);
        let (a, queue_a) = hub.register().unwrap();
        let (b, queue_b) = hub.register().unwrap();
        hub.activate(a);
        hub.activate(b);

        assert_eq!(hub.active_count(), 1);
        assert!(queue_a.is_closing());
        assert!(!queue_b.is_closing());
        assert_eq!(
            queue_a.next().await,
            Some(Outgoing::Close {
                code: CLOSE_SUPERSEDED,
                reason: "superseded".into()
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_all_and_refuses_new() {
        let hub = Hub::new(4, 8);
        let (a, queue_a) = hub.register().unwrap();
        let (_, queue_b) = hub.register().unwrap();
        hub.activate(a);

        hub.shutdown();

        for queue in [queue_a, queue_b] {
            assert!(matches!(
                queue.next().await,
                Some(Outgoing::Close { code: CLOSE_SHUTDOWN, .. })
            ));
        }
        assert!(hub.register().is_none());
    }

    #[test]
    fn test_remove() {
        let hub = Hub::new(4, 8);
        let (a, _) = hub.register().unwrap();
        assert_eq!(hub.len(), 1);
        hub.remove(a);
        assert!(hub.is_empty());
        assert!(!hub.activate(a));
    }
}
