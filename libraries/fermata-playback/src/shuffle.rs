//! Shuffle permutation for the queue
//!
//! Fisher-Yates over queue entries, optionally pinning one entry to the front
//! so the song that is playing stays current when shuffle is switched on.

use crate::types::{QueueEntry, UniqueId};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Shuffle entries in place with the thread-local RNG
pub fn shuffle_entries(entries: &mut [QueueEntry]) {
    let mut rng = thread_rng();
    entries.shuffle(&mut rng);
}

/// Produce a shuffled copy of `entries` with `first` (if present) at index 0
pub fn shuffled_with_first(entries: &[QueueEntry], first: Option<UniqueId>) -> Vec<QueueEntry> {
    shuffled_with_first_rng(entries, first, &mut thread_rng())
}

/// Same as [`shuffled_with_first`] but with a caller supplied RNG
pub fn shuffled_with_first_rng<R: Rng + ?Sized>(
    entries: &[QueueEntry],
    first: Option<UniqueId>,
    rng: &mut R,
) -> Vec<QueueEntry> {
    let mut result: Vec<QueueEntry> = entries.to_vec();

    let pinned = first.and_then(|id| result.iter().position(|e| e.unique_id == id));
    match pinned {
        Some(pos) => {
            result.swap(0, pos);
            result[1..].shuffle(rng);
        }
        None => result.shuffle(rng),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use fermata_core::Song;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn create_test_entries(count: usize) -> Vec<QueueEntry> {
        (0..count)
            .map(|i| QueueEntry::new(Song::new(format!("{}", i), "srv", format!("Song {}", i), 180.0)))
            .collect()
    }

    #[test]
    fn pinned_entry_comes_first() {
        let entries = create_test_entries(10);
        let pinned = entries[6].unique_id;

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffled_with_first_rng(&entries, Some(pinned), &mut rng);
            assert_eq!(shuffled[0].unique_id, pinned);
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let entries = create_test_entries(25);
        let shuffled = shuffled_with_first(&entries, None);

        let mut original: Vec<_> = entries.iter().map(|e| e.unique_id).collect();
        let mut permuted: Vec<_> = shuffled.iter().map(|e| e.unique_id).collect();
        original.sort();
        permuted.sort();
        assert_eq!(original, permuted);
    }

    #[test]
    fn unknown_pin_still_shuffles() {
        let entries = create_test_entries(5);
        let shuffled = shuffled_with_first(&entries, Some(UniqueId::generate()));
        assert_eq!(shuffled.len(), 5);
    }

    #[test]
    fn empty_and_single() {
        assert!(shuffled_with_first(&[], None).is_empty());

        let one = create_test_entries(1);
        let shuffled = shuffled_with_first(&one, Some(one[0].unique_id));
        assert_eq!(shuffled, one);
    }

    #[test]
    fn shuffle_in_place_changes_order_eventually() {
        let entries = create_test_entries(20);
        let mut changed = false;
        for _ in 0..10 {
            let mut copy = entries.clone();
            shuffle_entries(&mut copy);
            if copy != entries {
                changed = true;
                break;
            }
        }
        assert!(changed);
    }
}
