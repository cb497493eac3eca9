//! Play queue with parallel default and shuffled orderings
//!
//! ```text
//! default:   A B C D E      insertion order, never touched by shuffle
//! shuffled:  C A E B D      exists only while shuffle is on
//!                ^ current index points into whichever ordering is active
//! ```
//!
//! The queue has no playback side effects. The engine decides what the
//! index changes mean for the backend.

use crate::error::{PlaybackError, Result};
use crate::shuffle::{shuffle_entries, shuffled_with_first};
use crate::types::{AddPosition, QueueEntry, UniqueId};
use fermata_core::Song;
use std::collections::{HashMap, HashSet};

/// Result of a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoveOutcome {
    /// Entries actually removed (unknown ids do not count)
    pub removed: usize,

    /// The current entry was among the removed ones
    pub current_changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    /// Insertion order
    default: Vec<QueueEntry>,

    /// Frozen permutation of `default`, present while shuffle is on
    shuffled: Option<Vec<QueueEntry>>,

    /// Index into the active ordering, `None` iff the queue is empty
    current: Option<usize>,
}

impl PlayQueue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted parts
    ///
    /// `shuffled` lists unique ids and must be a permutation of `default`.
    /// An out-of-range `current` falls back to the first entry.
    pub fn from_parts(
        default: Vec<QueueEntry>,
        shuffled: Option<Vec<UniqueId>>,
        current: Option<usize>,
    ) -> Result<Self> {
        let shuffled = match shuffled {
            None => None,
            Some(ids) => {
                if ids.len() != default.len() {
                    return Err(PlaybackError::InvalidSnapshot(format!(
                        "shuffled order has {} entries, queue has {}",
                        ids.len(),
                        default.len()
                    )));
                }

                let mut by_id: HashMap<UniqueId, &QueueEntry> =
                    default.iter().map(|e| (e.unique_id, e)).collect();
                let mut order = Vec::with_capacity(ids.len());
                for id in ids {
                    let entry = by_id.remove(&id).ok_or_else(|| {
                        PlaybackError::InvalidSnapshot(format!("unknown or repeated entry {}", id))
                    })?;
                    order.push(entry.clone());
                }
                Some(order)
            }
        };

        let current = if default.is_empty() {
            None
        } else {
            Some(current.filter(|&i| i < default.len()).unwrap_or(0))
        };

        Ok(Self {
            default,
            shuffled,
            current,
        })
    }

    pub fn len(&self) -> usize {
        self.default.len()
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled.is_some()
    }

    /// Entries in the order currently in effect
    pub fn entries(&self) -> &[QueueEntry] {
        self.shuffled.as_deref().unwrap_or(&self.default)
    }

    /// Entries in insertion order, regardless of shuffle
    pub fn default_order(&self) -> &[QueueEntry] {
        &self.default
    }

    /// Unique ids of the shuffled ordering, if shuffle is on
    pub fn shuffled_ids(&self) -> Option<Vec<UniqueId>> {
        self.shuffled
            .as_ref()
            .map(|order| order.iter().map(|e| e.unique_id).collect())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.current.and_then(|i| self.entries().get(i))
    }

    pub fn current_id(&self) -> Option<UniqueId> {
        self.current().map(|e| e.unique_id)
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries().get(index)
    }

    /// Position of an entry in the active ordering
    pub fn position_of(&self, id: UniqueId) -> Option<usize> {
        self.entries().iter().position(|e| e.unique_id == id)
    }

    /// Insert songs, each under a fresh unique id
    ///
    /// - `Now` replaces the queue; `start` (an index into `songs`) becomes current.
    /// - `Next` inserts right after the current entry, in both orderings.
    /// - `Last` appends; while shuffled the batch is shuffled onto the tail.
    ///
    /// Adding to an empty queue makes the `start` song current. Returns the
    /// ids of the inserted entries in `songs` order.
    pub fn append(
        &mut self,
        songs: Vec<Song>,
        position: AddPosition,
        start: Option<usize>,
    ) -> Vec<UniqueId> {
        if songs.is_empty() {
            return Vec::new();
        }

        let batch: Vec<QueueEntry> = songs.into_iter().map(QueueEntry::new).collect();
        let ids: Vec<UniqueId> = batch.iter().map(|e| e.unique_id).collect();
        let start_id = start.and_then(|i| ids.get(i).copied()).unwrap_or(ids[0]);

        match position {
            AddPosition::Now => {
                self.default = batch;
                if self.shuffled.is_some() {
                    self.shuffled = Some(shuffled_with_first(&self.default, Some(start_id)));
                }
                self.current = self.position_of(start_id);
                return ids;
            }
            AddPosition::Next => match self.current {
                Some(current) => {
                    let current_id = self.current_id();
                    let at = current_id
                        .and_then(|id| self.default.iter().position(|e| e.unique_id == id))
                        .map_or(self.default.len(), |p| p + 1);
                    insert_at(&mut self.default, at, batch.clone());

                    if let Some(order) = self.shuffled.as_mut() {
                        let at = (current + 1).min(order.len());
                        insert_at(order, at, batch);
                    }
                }
                None => self.push_tail(batch),
            },
            AddPosition::Last => self.push_tail(batch),
        }

        if self.current.is_none() {
            self.current = self.position_of(start_id);
        }

        ids
    }

    fn push_tail(&mut self, batch: Vec<QueueEntry>) {
        self.default.extend(batch.iter().cloned());
        if let Some(order) = self.shuffled.as_mut() {
            let mut batch = batch;
            shuffle_entries(&mut batch);
            order.extend(batch);
        }
    }

    /// Remove entries by unique id
    ///
    /// Unknown ids are ignored. When the current entry goes, the next
    /// surviving entry becomes current, else the previous one, else none.
    pub fn remove(&mut self, ids: &[UniqueId]) -> RemoveOutcome {
        let doomed: HashSet<UniqueId> = ids.iter().copied().collect();
        let before = self.default.len();

        let current = self
            .current
            .and_then(|i| self.entries().get(i).map(|e| (i, e.unique_id)));

        let mut current_changed = false;
        let keep = match current {
            Some((index, id)) if doomed.contains(&id) => {
                current_changed = true;
                let active = self.entries();
                active[index + 1..]
                    .iter()
                    .find(|e| !doomed.contains(&e.unique_id))
                    .or_else(|| {
                        active[..index]
                            .iter()
                            .rev()
                            .find(|e| !doomed.contains(&e.unique_id))
                    })
                    .map(|e| e.unique_id)
            }
            Some((_, id)) => Some(id),
            None => None,
        };

        self.default.retain(|e| !doomed.contains(&e.unique_id));
        if let Some(order) = self.shuffled.as_mut() {
            order.retain(|e| !doomed.contains(&e.unique_id));
        }
        self.current = keep.and_then(|id| self.position_of(id));

        RemoveOutcome {
            removed: before - self.default.len(),
            current_changed,
        }
    }

    /// Move an entry within the active ordering
    ///
    /// While shuffled only the shuffled ordering changes, so switching
    /// shuffle off restores the insertion order. `from` is a hint; the entry
    /// is located by id when the hint is stale. Returns whether anything moved.
    pub fn move_entry(&mut self, id: UniqueId, from: usize, to: usize) -> bool {
        let len = self.len();
        if len == 0 {
            return false;
        }

        let from = if self.get(from).map(|e| e.unique_id) == Some(id) {
            from
        } else {
            match self.position_of(id) {
                Some(pos) => pos,
                None => return false,
            }
        };
        let to = to.min(len - 1);
        if from == to {
            return false;
        }

        let current_id = self.current_id();
        let order = self.active_mut();
        let entry = order.remove(from);
        order.insert(to, entry);
        self.current = current_id.and_then(|id| self.position_of(id));
        true
    }

    fn active_mut(&mut self) -> &mut Vec<QueueEntry> {
        match self.shuffled.as_mut() {
            Some(order) => order,
            None => &mut self.default,
        }
    }

    /// Empty the queue; the shuffle setting itself is kept
    pub fn clear(&mut self) {
        self.default.clear();
        if let Some(order) = self.shuffled.as_mut() {
            order.clear();
        }
        self.current = None;
    }

    /// Point the current index at `index`; out of range is rejected
    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    /// Switch between default and shuffled ordering, keeping the same entry current
    ///
    /// Turning shuffle on puts the current entry first in a fresh permutation.
    /// Returns whether the ordering changed.
    pub fn set_shuffled(&mut self, on: bool) -> bool {
        let current_id = self.current_id();
        match (on, self.shuffled.is_some()) {
            (true, false) => {
                self.shuffled = Some(shuffled_with_first(&self.default, current_id));
            }
            (false, true) => {
                self.shuffled = None;
            }
            _ => return false,
        }
        self.current = current_id.and_then(|id| self.position_of(id));
        true
    }

    /// Apply `update` to every queued copy of the song with domain id `song_id`
    ///
    /// Returns how many entries (in insertion order) were touched.
    pub fn update_song(&mut self, song_id: &str, update: impl Fn(&mut Song)) -> usize {
        let mut touched = 0;
        for entry in self.default.iter_mut().filter(|e| e.song.id == song_id) {
            update(&mut entry.song);
            touched += 1;
        }
        if let Some(order) = self.shuffled.as_mut() {
            for entry in order.iter_mut().filter(|e| e.song.id == song_id) {
                update(&mut entry.song);
            }
        }
        touched
    }
}

fn insert_at(order: &mut Vec<QueueEntry>, at: usize, batch: Vec<QueueEntry>) {
    let tail = order.split_off(at);
    order.extend(batch);
    order.extend(tail);
}
