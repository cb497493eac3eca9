//! Backend that records every call, for engine and controller tests

use super::PlaybackBackend;
use crate::error::{PlaybackError, Result};
use crate::types::{LoadId, Slot};
use fermata_core::Song;
use std::sync::{Arc, Mutex};

/// A call received by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// Prime with the song's domain id
    Prime(Slot, String),
    Activate(Slot),
    Release(Slot),
    Play,
    Pause,
    Stop,
    Seek(f64),
    Volume(u8),
    Speed(f64),
}

/// Records calls into a shared log; optionally fails the next `play()`
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    fail_play: Arc<Mutex<Option<String>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Return and forget everything recorded so far
    pub fn take_calls(&self) -> Vec<BackendCall> {
        self.calls
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default()
    }

    /// Make the next `play()` fail with `message`
    pub fn fail_next_play(&self, message: impl Into<String>) {
        if let Ok(mut slot) = self.fail_play.lock() {
            *slot = Some(message.into());
        }
    }

    fn record(&self, call: BackendCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl PlaybackBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn prime(&mut self, slot: Slot, _load: LoadId, song: &Song) -> Result<()> {
        self.record(BackendCall::Prime(slot, song.id.clone()));
        Ok(())
    }

    fn activate(&mut self, slot: Slot) -> Result<()> {
        self.record(BackendCall::Activate(slot));
        Ok(())
    }

    fn release(&mut self, slot: Slot) -> Result<()> {
        self.record(BackendCall::Release(slot));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.record(BackendCall::Play);
        let failure = self.fail_play.lock().ok().and_then(|mut f| f.take());
        match failure {
            Some(message) => Err(PlaybackError::Backend(message)),
            None => Ok(()),
        }
    }

    fn pause(&mut self) -> Result<()> {
        self.record(BackendCall::Pause);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.record(BackendCall::Stop);
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        self.record(BackendCall::Seek(seconds));
        Ok(())
    }

    fn set_volume(&mut self, level: u8) -> Result<()> {
        self.record(BackendCall::Volume(level));
        Ok(())
    }

    fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.record(BackendCall::Speed(speed));
        Ok(())
    }
}
