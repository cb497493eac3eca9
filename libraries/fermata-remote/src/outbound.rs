//! Per-session outbound queue
//!
//! Bounded, drop-oldest. Broadcasting pushes without ever waiting, so one
//! stalled socket cannot hold up state propagation to the others. A close
//! is delivered after everything already queued.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Next thing the writer should put on the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Debug, Default)]
struct Inner {
    messages: VecDeque<String>,
    close: Option<(u16, String)>,
    closing: bool,
    finished: bool,
    dropped: u64,
}

#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a message, evicting the oldest when full
    ///
    /// Returns `false` if the session is already closing.
    pub fn push(&self, text: String) -> bool {
        {
            let mut inner = self.lock();
            if inner.closing {
                return false;
            }
            if inner.messages.len() >= self.capacity {
                inner.messages.pop_front();
                inner.dropped += 1;
            }
            inner.messages.push_back(text);
        }
        self.notify.notify_one();
        true
    }

    /// Schedule a close after the queued messages; the first close wins
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        {
            let mut inner = self.lock();
            if inner.closing {
                return;
            }
            inner.closing = true;
            inner.close = Some((code, reason.into()));
        }
        self.notify.notify_one();
    }

    /// Stop without a close frame (the peer is already gone)
    pub fn abort(&self) {
        {
            let mut inner = self.lock();
            inner.closing = true;
            inner.finished = true;
            inner.messages.clear();
            inner.close = None;
        }
        self.notify.notify_one();
    }

    pub fn is_closing(&self) -> bool {
        self.lock().closing
    }

    /// Messages evicted so far
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for the next item; `None` once the close went out
    pub async fn next(&self) -> Option<Outgoing> {
        loop {
            {
                let mut inner = self.lock();
                if inner.finished {
                    return None;
                }
                if let Some(text) = inner.messages.pop_front() {
                    return Some(Outgoing::Text(text));
                }
                if let Some((code, reason)) = inner.close.take() {
                    inner.finished = true;
                    return Some(Outgoing::Close { code, reason });
                }
            }
            self.notify.notified().await;
        }
    }
}
