//! Scrobble tracking
//!
//! Watches the coalesced player events and decides when to report to the
//! music server: a now-playing `start` when a song becomes current, pause and
//! unpause transitions, and a single submission once the song has played
//! for half its length or four minutes, whichever comes first.

use crate::events::PlayerEvent;
use crate::types::PlaybackStatus;
use fermata_core::{Scrobble, ScrobbleEvent};

/// Submission threshold cap in seconds
const SUBMISSION_CAP: f64 = 240.0;

#[derive(Debug)]
struct Tracked {
    id: String,
    duration: f64,
    submitted: bool,
}

#[derive(Debug)]
pub struct Scrobbler {
    current: Option<Tracked>,
    status: PlaybackStatus,
    position: f64,
}

impl Scrobbler {
    pub fn new() -> Self {
        Self {
            current: None,
            status: PlaybackStatus::Paused,
            position: 0.0,
        }
    }

    /// Feed one event; returns a scrobble to report, if any
    pub fn observe(&mut self, event: &PlayerEvent) -> Option<Scrobble> {
        match event {
            PlayerEvent::Song(entry) => {
                self.position = 0.0;
                self.current = entry.as_ref().map(|e| Tracked {
                    id: e.song.id.clone(),
                    duration: e.song.duration,
                    submitted: false,
                });
                self.current
                    .as_ref()
                    .map(|t| scrobble(&t.id, ScrobbleEvent::Start, 0.0, false))
            }
            PlayerEvent::Playback(status) => {
                let previous = std::mem::replace(&mut self.status, *status);
                let tracked = self.current.as_ref()?;
                match (previous, *status) {
                    (PlaybackStatus::Playing, PlaybackStatus::Paused) => Some(scrobble(
                        &tracked.id,
                        ScrobbleEvent::Pause,
                        self.position,
                        false,
                    )),
                    (PlaybackStatus::Paused, PlaybackStatus::Playing) if self.position > 0.0 => {
                        Some(scrobble(
                            &tracked.id,
                            ScrobbleEvent::Unpause,
                            self.position,
                            false,
                        ))
                    }
                    _ => None,
                }
            }
            PlayerEvent::Position(position) => {
                self.position = *position;
                let tracked = self.current.as_mut()?;
                if tracked.submitted || tracked.duration <= 0.0 {
                    return None;
                }
                let threshold = (tracked.duration * 0.5).min(SUBMISSION_CAP);
                if *position >= threshold {
                    tracked.submitted = true;
                    Some(scrobble(&tracked.id, ScrobbleEvent::TimeUpdate, *position, true))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl Default for Scrobbler {
    fn default() -> Self {
        Self::new()
    }
}

fn scrobble(id: &str, event: ScrobbleEvent, position: f64, submission: bool) -> Scrobble {
    Scrobble {
        id: id.to_string(),
        event,
        position,
        submission,
    }
}
