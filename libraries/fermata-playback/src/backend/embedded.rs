//! In-process backend over a pair of media elements
//!
//! One element per slot. `poll()` samples the active element, reports the
//! playhead, and on natural end starts the primed sibling before reporting
//! `ended` so there is no audible gap.

use super::{EventSink, PlaybackBackend};
use crate::error::{PlaybackError, Result};
use crate::types::{LoadId, Slot};
use crate::volume::level_to_gain;
use fermata_core::Song;
use tokio::time::Instant;

/// A single media handle (a browser `<audio>`-like element)
pub trait MediaElement: Send {
    /// Load a source; `duration` is the expected length in seconds
    fn load(&mut self, url: &str, duration: f64) -> Result<()>;

    fn unload(&mut self);

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Linear gain 0.0-1.0
    fn set_gain(&mut self, gain: f32);

    fn set_speed(&mut self, speed: f64);

    /// Playhead in seconds
    fn position(&self) -> f64;

    fn is_loaded(&self) -> bool;

    /// Reached the end of the loaded media
    fn has_ended(&self) -> bool;

    /// Error raised since the last call, if any
    fn take_error(&mut self) -> Option<String>;
}

/// Backend over two [`MediaElement`]s
pub struct EmbeddedBackend<E: MediaElement> {
    elements: [E; 2],
    loads: [Option<LoadId>; 2],
    active: Slot,
    playing: bool,
    gain: f32,
    speed: f64,
    sink: EventSink,
}

impl<E: MediaElement> EmbeddedBackend<E> {
    pub fn new(a: E, b: E, sink: EventSink) -> Self {
        Self {
            elements: [a, b],
            loads: [None, None],
            active: Slot::A,
            playing: false,
            gain: 1.0,
            speed: 1.0,
            sink,
        }
    }

    /// Slot this backend currently treats as audible
    pub fn active_slot(&self) -> Slot {
        self.active
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn element(&self, slot: Slot) -> &E {
        &self.elements[slot.index()]
    }

    fn active_element(&mut self) -> &mut E {
        &mut self.elements[self.active.index()]
    }

    fn unload(&mut self, slot: Slot) {
        let element = &mut self.elements[slot.index()];
        element.pause();
        element.unload();
        self.loads[slot.index()] = None;
    }

    fn hand_off(&mut self, ended: Slot) {
        let next = ended.other();
        self.unload(ended);

        if let Some(load) = self.loads[next.index()] {
            self.active = next;
            let gain = self.gain;
            let speed = self.speed;
            let element = self.active_element();
            element.set_gain(gain);
            element.set_speed(speed);
            if let Err(e) = element.play() {
                self.playing = false;
                self.sink.error(next, load, e.to_string());
            }
        } else {
            self.playing = false;
        }
    }
}

impl<E: MediaElement> PlaybackBackend for EmbeddedBackend<E> {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn prime(&mut self, slot: Slot, load: LoadId, song: &Song) -> Result<()> {
        let element = &mut self.elements[slot.index()];
        element.pause();
        self.loads[slot.index()] = None;
        element.load(&song.stream_url, song.duration)?;
        element.set_gain(self.gain);
        element.set_speed(self.speed);
        self.loads[slot.index()] = Some(load);
        Ok(())
    }

    fn activate(&mut self, slot: Slot) -> Result<()> {
        if self.loads[slot.index()].is_none() {
            return Err(PlaybackError::backend(format!("slot {:?} is not primed", slot)));
        }
        if slot != self.active {
            let previous = self.active;
            self.unload(previous);
            self.active = slot;
        }
        self.playing = false;
        Ok(())
    }

    fn release(&mut self, slot: Slot) -> Result<()> {
        self.unload(slot);
        if slot == self.active {
            self.playing = false;
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.active_element().play()?;
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.active_element().pause();
        self.playing = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let element = self.active_element();
        element.pause();
        if element.is_loaded() {
            element.seek(0.0)?;
        }
        self.playing = false;
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        self.active_element().seek(seconds)
    }

    fn set_volume(&mut self, level: u8) -> Result<()> {
        self.gain = level_to_gain(level);
        for element in &mut self.elements {
            element.set_gain(self.gain);
        }
        Ok(())
    }

    fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.speed = speed;
        for element in &mut self.elements {
            element.set_speed(speed);
        }
        Ok(())
    }

    fn poll(&mut self) {
        if !self.playing {
            return;
        }

        let slot = self.active;
        let Some(load) = self.loads[slot.index()] else {
            self.playing = false;
            return;
        };
        if let Some(message) = self.active_element().take_error() {
            self.playing = false;
            self.sink.error(slot, load, message);
            return;
        }

        if self.active_element().has_ended() {
            self.hand_off(slot);
            self.sink.ended(slot, load);
        } else {
            let position = self.active_element().position();
            self.sink.position(slot, load, position);
        }
    }
}

/// Headless media element with a virtual playhead
///
/// Advances with wall-clock time (scaled by speed) while playing. Uses the
/// tokio clock, so tests with a paused runtime can drive it deterministically.
#[derive(Debug, Default)]
pub struct ClockElement {
    url: Option<String>,
    duration: f64,
    offset: f64,
    started: Option<Instant>,
    speed: f64,
    gain: f32,
    error: Option<String>,
}

impl ClockElement {
    pub fn new() -> Self {
        Self {
            speed: 1.0,
            gain: 1.0,
            ..Self::default()
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Make the next poll report `message`
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    fn settle(&mut self) {
        self.offset = self.position();
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }
}

impl MediaElement for ClockElement {
    fn load(&mut self, url: &str, duration: f64) -> Result<()> {
        if url.is_empty() {
            return Err(PlaybackError::backend("empty stream url"));
        }
        self.url = Some(url.to_string());
        self.duration = duration.max(0.0);
        self.offset = 0.0;
        self.started = None;
        self.error = None;
        Ok(())
    }

    fn unload(&mut self) {
        self.url = None;
        self.duration = 0.0;
        self.offset = 0.0;
        self.started = None;
    }

    fn play(&mut self) -> Result<()> {
        if self.url.is_none() {
            return Err(PlaybackError::backend("nothing loaded"));
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.offset = self.position();
        self.started = None;
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        if self.url.is_none() {
            return Err(PlaybackError::backend("nothing loaded"));
        }
        self.offset = seconds.clamp(0.0, self.duration);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    fn set_speed(&mut self, speed: f64) {
        self.settle();
        self.speed = speed;
    }

    fn position(&self) -> f64 {
        let elapsed = self
            .started
            .map_or(0.0, |t| t.elapsed().as_secs_f64() * self.speed);
        (self.offset + elapsed).min(self.duration)
    }

    fn is_loaded(&self) -> bool {
        self.url.is_some()
    }

    fn has_ended(&self) -> bool {
        self.is_loaded() && self.position() >= self.duration
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{transport_channel, TransportEvent};
    use std::time::Duration;

    fn song(id: &str, duration: f64) -> Song {
        Song::new(id, "srv", id, duration).with_stream_url(format!("mem://{}", id))
    }

    fn backend() -> (EmbeddedBackend<ClockElement>, crate::backend::TransportReceiver) {
        let (sink, rx) = transport_channel(8);
        (
            EmbeddedBackend::new(ClockElement::new(), ClockElement::new(), sink),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn hands_off_to_primed_sibling() {
        let (mut backend, mut rx) = backend();
        backend.prime(Slot::A, LoadId::new(1), &song("a", 2.0)).unwrap();
        backend.prime(Slot::B, LoadId::new(2), &song("b", 5.0)).unwrap();
        backend.activate(Slot::A).unwrap();
        backend.play().unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        backend.poll();

        assert_eq!(
            rx.events.try_recv().unwrap(),
            TransportEvent::Ended {
                slot: Slot::A,
                load: LoadId::new(1)
            }
        );
        assert_eq!(backend.active_slot(), Slot::B);
        assert!(backend.is_playing());
        assert!(backend.element(Slot::B).is_running());
        assert!(!backend.element(Slot::A).is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_nothing_primed() {
        let (mut backend, mut rx) = backend();
        backend.prime(Slot::A, LoadId::new(1), &song("a", 1.0)).unwrap();
        backend.activate(Slot::A).unwrap();
        backend.play().unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        backend.poll();

        assert_eq!(
            rx.events.try_recv().unwrap(),
            TransportEvent::Ended {
                slot: Slot::A,
                load: LoadId::new(1)
            }
        );
        assert!(!backend.is_playing());
        assert_eq!(backend.active_slot(), Slot::A);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_position_while_playing() {
        let (mut backend, mut rx) = backend();
        backend.prime(Slot::A, LoadId::new(1), &song("a", 100.0)).unwrap();
        backend.activate(Slot::A).unwrap();
        backend.play().unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        backend.poll();

        let tick = rx.ticks.try_recv().unwrap();
        assert_eq!(tick.slot, Slot::A);
        assert_eq!(tick.load, LoadId::new(1));
        assert!((tick.position - 4.0).abs() < 0.01);

        backend.pause().unwrap();
        backend.poll();
        assert!(rx.ticks.try_recv().is_err());
    }

    #[test]
    fn activate_requires_prime() {
        let (mut backend, _rx) = backend();
        assert!(backend.activate(Slot::B).is_err());
    }

    #[test]
    fn volume_applies_gain_to_both_elements() {
        let (mut backend, _rx) = backend();
        backend.set_volume(0).unwrap();
        assert_eq!(backend.element(Slot::A).gain(), 0.0);
        assert_eq!(backend.element(Slot::B).gain(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn element_error_is_reported() {
        let (mut backend, mut rx) = backend();
        backend.prime(Slot::A, LoadId::new(1), &song("a", 10.0)).unwrap();
        backend.activate(Slot::A).unwrap();
        backend.play().unwrap();
        backend.elements[0].fail("decode failure");

        backend.poll();
        assert_eq!(
            rx.events.try_recv().unwrap(),
            TransportEvent::Error {
                slot: Slot::A,
                load: LoadId::new(1),
                message: "decode failure".into()
            }
        );
        assert!(!backend.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn clock_speed_scales_playhead() {
        let mut element = ClockElement::new();
        element.load("mem://x", 100.0).unwrap();
        element.set_speed(1.5);
        element.play().unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!((element.position() - 3.0).abs() < 0.01);
    }
}
