//! Two playback slots with a single active pointer
//!
//! The active slot is audible; its sibling holds the entry the engine will
//! advance into, so a handoff is a pointer flip rather than a reload.

use crate::types::{LoadId, Slot, UniqueId};

/// What a slot currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Loaded {
    entry: UniqueId,
    load: LoadId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPair {
    loaded: [Option<Loaded>; 2],
    active: Slot,
}

impl SlotPair {
    pub fn new() -> Self {
        Self {
            loaded: [None, None],
            active: Slot::A,
        }
    }

    pub fn active(&self) -> Slot {
        self.active
    }

    pub fn sibling(&self) -> Slot {
        self.active.other()
    }

    /// Entry primed into `slot`, if any
    pub fn loaded(&self, slot: Slot) -> Option<UniqueId> {
        self.loaded[slot.index()].map(|l| l.entry)
    }

    /// Load id of whatever `slot` holds
    pub fn load_id(&self, slot: Slot) -> Option<LoadId> {
        self.loaded[slot.index()].map(|l| l.load)
    }

    /// Whether a transport report tagged `load` is about what `slot` holds now
    pub fn holds_load(&self, slot: Slot, load: LoadId) -> bool {
        self.load_id(slot) == Some(load)
    }

    pub fn set(&mut self, slot: Slot, entry: UniqueId, load: LoadId) {
        self.loaded[slot.index()] = Some(Loaded { entry, load });
    }

    pub fn clear(&mut self, slot: Slot) {
        self.loaded[slot.index()] = None;
    }

    /// Whether the sibling already holds `id`
    pub fn sibling_holds(&self, id: UniqueId) -> bool {
        self.loaded(self.sibling()) == Some(id)
    }

    /// Flip the active pointer; the old active slot is considered released
    pub fn swap(&mut self) {
        self.loaded[self.active.index()] = None;
        self.active = self.active.other();
    }

    /// Forget both slots; the active pointer stays where it is
    pub fn reset(&mut self) {
        self.loaded = [None, None];
    }
}

impl Default for SlotPair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_flips_and_releases() {
        let mut slots = SlotPair::new();
        let current = UniqueId::generate();
        let next = UniqueId::generate();
        slots.set(Slot::A, current, LoadId::new(1));
        slots.set(Slot::B, next, LoadId::new(2));

        assert!(slots.sibling_holds(next));
        slots.swap();

        assert_eq!(slots.active(), Slot::B);
        assert_eq!(slots.loaded(Slot::B), Some(next));
        assert!(slots.holds_load(Slot::B, LoadId::new(2)));
        assert_eq!(slots.loaded(Slot::A), None);
    }

    #[test]
    fn reload_of_same_entry_gets_new_load() {
        let mut slots = SlotPair::new();
        let entry = UniqueId::generate();
        slots.set(Slot::A, entry, LoadId::new(1));
        slots.set(Slot::A, entry, LoadId::new(2));

        assert_eq!(slots.loaded(Slot::A), Some(entry));
        assert!(!slots.holds_load(Slot::A, LoadId::new(1)));
        assert!(slots.holds_load(Slot::A, LoadId::new(2)));
    }

    #[test]
    fn active_and_sibling_differ() {
        let mut slots = SlotPair::new();
        for _ in 0..3 {
            assert_ne!(slots.active(), slots.sibling());
            slots.swap();
        }
    }

    #[test]
    fn reset_keeps_pointer() {
        let mut slots = SlotPair::new();
        slots.swap();
        slots.set(Slot::B, UniqueId::generate(), LoadId::new(7));
        slots.reset();
        assert_eq!(slots.active(), Slot::B);
        assert_eq!(slots.loaded(Slot::B), None);
    }
}
