//! Queue engine state machine
//!
//! Owns the play queue, repeat/shuffle modes, the slot pair, and the
//! backend. Every operation is synchronous and infallible from the caller's
//! point of view: stale ids are logged no-ops, backend failures become
//! [`PlayerEvent::Error`] plus a pause. Observable changes are queued as
//! events and collected with [`QueueEngine::drain_events`].
//!
//! ```text
//!            enqueue                   play()
//!   EMPTY ───────────────► STOPPED ───────────► PLAYING
//!     ▲   (autoplay: PLAYING)  ▲    ◄───────────  │  ▲
//!     │                        │      stop()      │  │ play()
//!     │ clear / remove all     │                  ▼  │
//!     └────────────────────────┴─ auto-next ─── PAUSED
//!                           at end, repeat NONE
//! ```

use crate::backend::{PlaybackBackend, TransportEvent, TransportTick};
use crate::error::Result;
use crate::events::{PlayerEvent, PlayerSnapshot};
use crate::queue::PlayQueue;
use crate::slots::SlotPair;
use crate::snapshot::{QueueSnapshot, SNAPSHOT_VERSION};
use crate::types::{
    AddPosition, EngineState, LoadId, PlaybackConfig, RepeatMode, ShuffleMode, Slot, UniqueId,
    MAX_SPEED, MIN_SPEED,
};
use crate::volume::Volume;
use fermata_core::Song;

pub struct QueueEngine {
    queue: PlayQueue,
    repeat: RepeatMode,
    state: EngineState,
    slots: SlotPair,
    next_load: u64,

    /// Last known playhead in seconds
    current_time: f64,
    volume: Volume,
    speed: f64,
    config: PlaybackConfig,
    backend: Box<dyn PlaybackBackend>,
    pending: Vec<PlayerEvent>,
}

impl QueueEngine {
    pub fn new(config: PlaybackConfig, backend: Box<dyn PlaybackBackend>) -> Self {
        let mut engine = Self {
            queue: PlayQueue::new(),
            repeat: RepeatMode::None,
            state: EngineState::Empty,
            slots: SlotPair::new(),
            next_load: 0,
            current_time: 0.0,
            volume: Volume::new(config.volume),
            speed: config.speed.clamp(MIN_SPEED, MAX_SPEED),
            config,
            backend,
            pending: Vec::new(),
        };
        engine.apply_volume();
        let speed = engine.speed;
        engine.quiet(|b| b.set_speed(speed));
        engine
    }

    // ===== Accessors =====

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn shuffle(&self) -> ShuffleMode {
        if self.queue.is_shuffled() {
            ShuffleMode::Track
        } else {
            ShuffleMode::None
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.queue.current_index()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn slots(&self) -> &SlotPair {
        &self.slots
    }

    pub fn active_slot(&self) -> Slot {
        self.slots.active()
    }

    /// Load id the active slot was primed with; transport reports must carry it
    pub fn active_load(&self) -> Option<LoadId> {
        self.slots.load_id(self.slots.active())
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Take every event queued since the last call
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Read-only view for observers
    pub fn player_snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            song: self.queue.current().cloned(),
            status: self.state.status(),
            state: self.state,
            repeat: self.repeat,
            shuffle: self.queue.is_shuffled(),
            volume: self.volume.level(),
            muted: self.volume.is_muted(),
            speed: self.speed,
            position: self.current_time,
            current_index: self.queue.current_index(),
            queue_length: self.queue.len(),
            active_slot: self.slots.active(),
        }
    }

    // ===== Queue operations =====

    /// Add songs; `start` indexes into `songs` and picks the entry that
    /// becomes current when the queue is replaced or was empty
    pub fn enqueue(&mut self, songs: Vec<Song>, position: AddPosition, start: Option<usize>) {
        let was_empty = self.queue.is_empty();
        let added = self.queue.append(songs, position, start);
        if added.is_empty() {
            return;
        }
        tracing::debug!(count = added.len(), ?position, "Enqueued songs");

        if was_empty || position == AddPosition::Now {
            self.current_time = 0.0;
            let loaded = self.load_current();
            self.emit_song();
            self.emit(PlayerEvent::Position(0.0));

            if loaded && self.config.autoplay {
                self.start_playback();
            } else {
                self.set_state(EngineState::Stopped);
            }
        }

        self.refresh_sibling();
        self.emit(PlayerEvent::QueueChanged);
    }

    /// Remove entries; unknown ids are ignored
    pub fn remove(&mut self, ids: &[UniqueId]) {
        let outcome = self.queue.remove(ids);
        if outcome.removed == 0 {
            tracing::debug!("Remove matched no queued entries");
            return;
        }

        if self.queue.is_empty() {
            self.reset_to_empty();
        } else if outcome.current_changed {
            self.current_time = 0.0;
            let loaded = self.load_current();
            if loaded && self.state == EngineState::Playing {
                self.call(|b| b.play());
            }
            self.emit_song();
            self.emit(PlayerEvent::Position(0.0));
        }

        self.refresh_sibling();
        self.emit(PlayerEvent::QueueChanged);
    }

    /// Reorder within the active ordering
    pub fn move_entry(&mut self, id: UniqueId, from: usize, to: usize) {
        if self.queue.move_entry(id, from, to) {
            self.refresh_sibling();
            self.emit(PlayerEvent::QueueChanged);
        } else {
            tracing::debug!(%id, from, to, "Move was a no-op");
        }
    }

    pub fn clear(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.queue.clear();
        self.reset_to_empty();
        self.emit(PlayerEvent::QueueChanged);
    }

    // ===== Transport =====

    pub fn play(&mut self) {
        match self.state {
            EngineState::Empty => tracing::debug!("play() on an empty queue"),
            EngineState::Playing => {}
            EngineState::Stopped | EngineState::Paused => {
                let active = self.slots.active();
                if self.slots.loaded(active).is_none() && !self.load_current() {
                    return;
                }
                self.start_playback();
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state == EngineState::Playing {
            self.call(|b| b.pause());
            self.set_state(EngineState::Paused);
        }
    }

    pub fn play_pause(&mut self) {
        if self.state == EngineState::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Halt and rewind; entries and slots stay as they are
    pub fn stop(&mut self) {
        if self.state == EngineState::Empty {
            return;
        }
        self.call(|b| b.stop());
        self.current_time = 0.0;
        self.set_state(EngineState::Stopped);
        self.emit(PlayerEvent::Position(0.0));
    }

    /// Manual advance; never wraps unless repeat is ALL
    pub fn next(&mut self) {
        if let Some(target) = self.manual_next_target() {
            self.transition(target);
        }
    }

    /// Manual retreat, or restart when past the restart threshold
    pub fn previous(&mut self) {
        if self.state == EngineState::Empty {
            return;
        }
        if self.current_time >= self.config.previous_restart_threshold {
            self.seek(0.0);
            return;
        }
        if let Some(target) = self.manual_previous_target() {
            self.transition(target);
        }
    }

    /// Discontinuous jump; both slots are reset and playback starts
    pub fn set_current_index(&mut self, index: usize) {
        if !self.queue.set_current(index) {
            tracing::debug!(index, len = self.queue.len(), "Ignoring out-of-range jump");
            return;
        }

        self.current_time = 0.0;
        let loaded = self.load_current();
        self.emit_song();
        self.emit(PlayerEvent::Position(0.0));
        if loaded {
            self.start_playback();
        }
        self.refresh_sibling();
    }

    /// Absolute seek, clamped to the current song
    pub fn seek(&mut self, seconds: f64) {
        if self.state == EngineState::Empty || !seconds.is_finite() {
            return;
        }
        let target = seconds.clamp(0.0, self.current_duration());
        self.call(|b| b.seek(target));
        self.current_time = target;
        self.emit(PlayerEvent::Position(target));
    }

    /// Relative seek; past the end lands one second before it, before the
    /// start lands on zero
    pub fn seek_by(&mut self, offset: f64) {
        if self.state == EngineState::Empty || !offset.is_finite() {
            return;
        }
        let duration = self.current_duration();
        let mut target = self.current_time + offset;
        if target > duration {
            target = (duration - 1.0).max(0.0);
        }
        if target < 0.0 {
            target = 0.0;
        }
        self.seek(target);
    }

    pub fn skip_forward(&mut self) {
        self.seek_by(self.config.skip_forward_step);
    }

    pub fn skip_backward(&mut self) {
        self.seek_by(-self.config.skip_backward_step);
    }

    pub fn set_volume(&mut self, level: u8) {
        self.volume.set_level(level);
        self.apply_volume();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.volume.set_muted(muted);
        self.apply_volume();
    }

    pub fn toggle_mute(&mut self) {
        self.set_muted(!self.volume.is_muted());
    }

    /// Playback rate, clamped to 0.5..=1.5
    pub fn set_speed(&mut self, speed: f64) {
        if !speed.is_finite() {
            return;
        }
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        let speed = self.speed;
        self.quiet(|b| b.set_speed(speed));
    }

    // ===== Modes =====

    pub fn set_shuffle(&mut self, mode: ShuffleMode) {
        if !self.queue.set_shuffled(mode.is_on()) {
            return;
        }
        self.refresh_sibling();
        self.emit(PlayerEvent::Shuffle(mode.is_on()));
        self.emit(PlayerEvent::QueueChanged);
    }

    pub fn toggle_shuffle(&mut self) {
        self.set_shuffle(self.shuffle().toggled());
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        if mode == self.repeat {
            return;
        }
        self.repeat = mode;
        self.refresh_sibling();
        self.emit(PlayerEvent::Repeat(mode));
    }

    /// NONE -> ALL -> ONE -> NONE
    pub fn toggle_repeat(&mut self) {
        self.set_repeat(self.repeat.cycle());
    }

    // ===== Song metadata =====

    pub fn set_favorite(&mut self, ids: &[String], favorite: bool) {
        for id in ids {
            self.queue.update_song(id, |s| s.user_favorite = favorite);
            self.emit(PlayerEvent::Favorite {
                id: id.clone(),
                favorite,
            });
        }
    }

    pub fn set_rating(&mut self, ids: &[String], rating: Option<u8>) {
        let rating = rating.map(|r| r.min(5));
        for id in ids {
            self.queue.update_song(id, |s| s.user_rating = rating);
            self.emit(PlayerEvent::Rating {
                id: id.clone(),
                rating,
            });
        }
    }

    // ===== Backend input =====

    /// Funnel a transport event from the backend
    pub fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Ended { slot, load } => self.on_track_ended(slot, load),
            TransportEvent::Error {
                slot,
                load,
                message,
            } => {
                if !self.slots.holds_load(slot, load) {
                    tracing::debug!(?slot, %load, "Ignoring error for replaced media: {}", message);
                } else if slot == self.slots.active() {
                    self.backend_error(message);
                } else {
                    tracing::warn!(?slot, "Preloading next song failed: {}", message);
                    self.slots.clear(slot);
                }
            }
            TransportEvent::Failed { message } => self.backend_error(message),
        }
    }

    /// Advisory playhead report; only the media in the active slot counts
    pub fn position_tick(&mut self, tick: TransportTick) {
        if self.state == EngineState::Empty
            || tick.slot != self.slots.active()
            || !self.slots.holds_load(tick.slot, tick.load)
        {
            return;
        }
        self.current_time = tick.position;
        self.emit(PlayerEvent::Position(tick.position));
    }

    /// Automatic advance after the active slot finished naturally
    ///
    /// Reports from the inactive slot, or about media the active slot no
    /// longer holds, are stale and ignored. That keeps auto-advance
    /// exactly-once per track.
    pub fn on_track_ended(&mut self, slot: Slot, load: LoadId) {
        if self.state == EngineState::Empty {
            return;
        }
        if slot != self.slots.active() {
            tracing::debug!(?slot, "Ignoring ended event from inactive slot");
            return;
        }
        if !self.slots.holds_load(slot, load) {
            tracing::debug!(?slot, %load, "Ignoring ended event for replaced media");
            return;
        }

        let Some(target) = self.auto_target() else {
            self.finish_queue();
            return;
        };
        let Some(entry_id) = self.queue.get(target).map(|e| e.unique_id) else {
            return;
        };

        self.queue.set_current(target);
        self.current_time = 0.0;

        if self.slots.sibling_holds(entry_id) {
            // The backend already rolled over to the primed sibling
            self.slots.swap();
        } else {
            let loaded = self.load_current();
            if loaded && self.state == EngineState::Playing {
                self.call(|b| b.play());
            }
        }
        if self.state != EngineState::Playing {
            self.quiet(|b| b.pause());
        }

        self.emit_song();
        self.emit(PlayerEvent::Position(0.0));
        self.refresh_sibling();
    }

    /// Backend failure: pause, surface the error, leave the queue alone
    pub fn backend_error(&mut self, message: String) {
        tracing::warn!(backend = self.backend.name(), "Playback error: {}", message);
        if self.state == EngineState::Playing {
            self.quiet(|b| b.pause());
            self.set_state(EngineState::Paused);
        }
        self.emit(PlayerEvent::Error(message));
    }

    /// Let in-process backends sample their media
    pub fn poll_backend(&mut self) {
        self.backend.poll();
    }

    // ===== Persistence =====

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            version: SNAPSHOT_VERSION,
            entries: self.queue.default_order().to_vec(),
            shuffled: self.queue.shuffled_ids(),
            current_index: self.queue.current_index(),
            repeat: self.repeat,
            shuffle: self.shuffle(),
            position: self.current_time,
            volume: self.volume.level(),
            muted: self.volume.is_muted(),
            speed: self.speed,
        }
    }

    /// Replace all state with a persisted snapshot; ends STOPPED at the saved playhead
    pub fn restore(&mut self, snapshot: QueueSnapshot) -> Result<()> {
        let queue = PlayQueue::from_parts(
            snapshot.entries,
            snapshot.shuffled,
            snapshot.current_index,
        )?;

        if self.state != EngineState::Empty {
            self.quiet(|b| b.stop());
        }
        self.queue = queue;
        self.repeat = snapshot.repeat;
        self.volume.set_level(snapshot.volume);
        self.volume.set_muted(snapshot.muted);
        self.apply_volume();
        self.set_speed(snapshot.speed);

        if self.queue.is_empty() {
            self.reset_to_empty();
        } else {
            self.load_current();
            let position = snapshot.position.clamp(0.0, self.current_duration());
            if position > 0.0 {
                self.call(|b| b.seek(position));
            }
            self.current_time = position;
            self.set_state(EngineState::Stopped);
            self.emit_song();
            self.emit(PlayerEvent::Position(position));
            self.refresh_sibling();
        }

        self.emit(PlayerEvent::Repeat(self.repeat));
        self.emit(PlayerEvent::Shuffle(self.queue.is_shuffled()));
        self.emit(PlayerEvent::QueueChanged);
        tracing::info!(
            entries = self.queue.len(),
            index = ?self.queue.current_index(),
            "Restored queue snapshot"
        );
        Ok(())
    }

    // ===== Internals =====

    fn auto_target(&self) -> Option<usize> {
        let current = self.queue.current_index()?;
        let len = self.queue.len();
        match self.repeat {
            RepeatMode::One => Some(current),
            RepeatMode::All => Some((current + 1) % len),
            RepeatMode::None => (current + 1 < len).then_some(current + 1),
        }
    }

    fn manual_next_target(&self) -> Option<usize> {
        let current = self.queue.current_index()?;
        let len = self.queue.len();
        match self.repeat {
            RepeatMode::All => Some((current + 1) % len),
            RepeatMode::None | RepeatMode::One => (current + 1 < len).then_some(current + 1),
        }
    }

    fn manual_previous_target(&self) -> Option<usize> {
        let current = self.queue.current_index()?;
        let len = self.queue.len();
        match self.repeat {
            RepeatMode::All => Some((current + len - 1) % len),
            RepeatMode::None | RepeatMode::One => current.checked_sub(1),
        }
    }

    /// Manual move to an adjacent entry; O(1) swap when the sibling has it
    fn transition(&mut self, target: usize) {
        let Some(entry_id) = self.queue.get(target).map(|e| e.unique_id) else {
            return;
        };

        if Some(target) == self.queue.current_index() {
            self.seek(0.0);
            return;
        }

        self.queue.set_current(target);
        self.current_time = 0.0;

        let sibling = self.slots.sibling();
        let swapped = self.slots.sibling_holds(entry_id) && self.quiet(|b| b.activate(sibling));
        if swapped {
            self.slots.swap();
        } else {
            self.load_current();
        }
        if self.state == EngineState::Playing {
            self.call(|b| b.play());
        }

        self.emit_song();
        self.emit(PlayerEvent::Position(0.0));
        self.refresh_sibling();
    }

    /// Auto-advance ran off the end with repeat NONE
    fn finish_queue(&mut self) {
        tracing::debug!("Reached the end of the queue");
        self.queue.set_current(0);
        self.current_time = 0.0;
        self.load_current();
        self.set_state(EngineState::Stopped);
        self.emit_song();
        self.emit(PlayerEvent::Position(0.0));
        self.refresh_sibling();
    }

    /// Prime the current entry into the active slot from scratch
    fn load_current(&mut self) -> bool {
        let Some(entry) = self.queue.current().cloned() else {
            return false;
        };
        let active = self.slots.active();
        let sibling = self.slots.sibling();

        if self.slots.loaded(sibling).is_some() {
            self.quiet(|b| b.release(sibling));
        }
        self.slots.reset();

        let load = self.allocate_load();
        if !self.call(|b| b.prime(active, load, &entry.song)) {
            return false;
        }
        self.slots.set(active, entry.unique_id, load);
        self.call(|b| b.activate(active))
    }

    /// Keep the sibling primed with whatever auto-advance would play next
    fn refresh_sibling(&mut self) {
        let sibling = self.slots.sibling();
        let target = self
            .auto_target()
            .and_then(|i| self.queue.get(i).cloned());

        match target {
            Some(entry) if self.slots.loaded(sibling) == Some(entry.unique_id) => {}
            Some(entry) => {
                let load = self.allocate_load();
                if self.quiet(|b| b.prime(sibling, load, &entry.song)) {
                    self.slots.set(sibling, entry.unique_id, load);
                } else {
                    self.slots.clear(sibling);
                }
            }
            None => {
                if self.slots.loaded(sibling).is_some() {
                    self.quiet(|b| b.release(sibling));
                    self.slots.clear(sibling);
                }
            }
        }
    }

    fn allocate_load(&mut self) -> LoadId {
        self.next_load += 1;
        LoadId::new(self.next_load)
    }

    fn reset_to_empty(&mut self) {
        self.quiet(|b| b.stop());
        for slot in [Slot::A, Slot::B] {
            if self.slots.loaded(slot).is_some() {
                self.quiet(|b| b.release(slot));
            }
        }
        self.slots.reset();
        self.current_time = 0.0;
        self.set_state(EngineState::Empty);
        self.emit(PlayerEvent::Song(None));
        self.emit(PlayerEvent::Position(0.0));
    }

    fn start_playback(&mut self) {
        self.set_state(EngineState::Playing);
        self.call(|b| b.play());
    }

    fn apply_volume(&mut self) {
        let level = self.volume.effective_level();
        self.quiet(|b| b.set_volume(level));
        self.emit(PlayerEvent::Volume(level));
    }

    fn current_duration(&self) -> f64 {
        self.queue
            .current()
            .map_or(0.0, |e| e.song.duration.max(0.0))
    }

    fn set_state(&mut self, state: EngineState) {
        let before = self.state.status();
        self.state = state;
        if state.status() != before {
            self.emit(PlayerEvent::Playback(state.status()));
        }
    }

    fn emit_song(&mut self) {
        let entry = self.queue.current().cloned();
        self.emit(PlayerEvent::Song(entry));
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.pending.push(event);
    }

    /// Backend call on the playback path; a failure pauses and is surfaced
    fn call(&mut self, op: impl FnOnce(&mut Box<dyn PlaybackBackend>) -> Result<()>) -> bool {
        match op(&mut self.backend) {
            Ok(()) => true,
            Err(e) => {
                self.backend_error(e.to_string());
                false
            }
        }
    }

    /// Backend call whose failure only gets logged
    fn quiet(&mut self, op: impl FnOnce(&mut Box<dyn PlaybackBackend>) -> Result<()>) -> bool {
        match op(&mut self.backend) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), "Backend call failed: {}", e);
                false
            }
        }
    }
}

impl std::fmt::Debug for QueueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEngine")
            .field("state", &self.state)
            .field("current_index", &self.queue.current_index())
            .field("len", &self.queue.len())
            .field("repeat", &self.repeat)
            .field("shuffled", &self.queue.is_shuffled())
            .field("slots", &self.slots)
            .field("backend", &self.backend.name())
            .finish()
    }
}
