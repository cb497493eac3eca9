//! Property-based tests for the queue engine
//!
//! Random operation sequences must never break the queue invariants.

use fermata_core::Song;
use fermata_playback::backend::RecordingBackend;
use fermata_playback::{
    AddPosition, EngineState, PlaybackConfig, QueueEngine, RepeatMode, ShuffleMode, UniqueId,
};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Append(usize, u8),
    Remove(usize),
    RemoveUnknown,
    Move(usize, usize),
    Next,
    Previous,
    AutoNext,
    Jump(usize),
    ToggleShuffle,
    ToggleRepeat,
    PlayPause,
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1usize..4, 0u8..3).prop_map(|(n, p)| Op::Append(n, p)),
        2 => (0usize..16).prop_map(Op::Remove),
        1 => Just(Op::RemoveUnknown),
        2 => (0usize..16, 0usize..16).prop_map(|(a, b)| Op::Move(a, b)),
        3 => Just(Op::Next),
        3 => Just(Op::Previous),
        3 => Just(Op::AutoNext),
        1 => (0usize..16).prop_map(Op::Jump),
        2 => Just(Op::ToggleShuffle),
        2 => Just(Op::ToggleRepeat),
        1 => Just(Op::PlayPause),
        1 => Just(Op::Clear),
    ]
}

fn make_songs(n: usize, counter: &mut usize) -> Vec<Song> {
    (0..n)
        .map(|_| {
            *counter += 1;
            Song::new(format!("s{}", counter), "srv", "Song", 120.0)
        })
        .collect()
}

fn apply(engine: &mut QueueEngine, op: &Op, counter: &mut usize) {
    match *op {
        Op::Append(n, p) => {
            let position = match p {
                0 => AddPosition::Now,
                1 => AddPosition::Next,
                _ => AddPosition::Last,
            };
            engine.enqueue(make_songs(n, counter), position, None);
        }
        Op::Remove(i) => {
            if let Some(id) = engine.queue().get(i).map(|e| e.unique_id) {
                engine.remove(&[id]);
            }
        }
        Op::RemoveUnknown => engine.remove(&[UniqueId::generate()]),
        Op::Move(from, to) => {
            if let Some(id) = engine.queue().get(from).map(|e| e.unique_id) {
                engine.move_entry(id, from, to);
            }
        }
        Op::Next => engine.next(),
        Op::Previous => engine.previous(),
        Op::AutoNext => {
            let slot = engine.active_slot();
            if let Some(load) = engine.active_load() {
                engine.on_track_ended(slot, load);
            }
        }
        Op::Jump(i) => engine.set_current_index(i),
        Op::ToggleShuffle => engine.toggle_shuffle(),
        Op::ToggleRepeat => engine.toggle_repeat(),
        Op::PlayPause => engine.play_pause(),
        Op::Clear => engine.clear(),
    }
}

fn check_invariants(engine: &QueueEngine) -> Result<(), TestCaseError> {
    let queue = engine.queue();
    let len = queue.len();

    // Index is valid iff the queue has entries
    match queue.current_index() {
        None => prop_assert_eq!(len, 0),
        Some(i) => prop_assert!(i < len, "index {} out of range {}", i, len),
    }
    prop_assert_eq!(engine.state() == EngineState::Empty, len == 0);

    // Unique ids are unique and both orderings hold the same entries
    let default: HashSet<UniqueId> = queue.default_order().iter().map(|e| e.unique_id).collect();
    prop_assert_eq!(default.len(), len);
    let active: HashSet<UniqueId> = queue.entries().iter().map(|e| e.unique_id).collect();
    prop_assert_eq!(&active, &default);
    prop_assert_eq!(queue.is_shuffled(), engine.shuffle() == ShuffleMode::Track);

    // The active slot holds the current entry whenever one exists
    if let Some(current) = queue.current_id() {
        prop_assert_eq!(engine.slots().loaded(engine.active_slot()), Some(current));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut engine = QueueEngine::new(PlaybackConfig::default(), Box::new(RecordingBackend::new()));
        let mut counter = 0;
        for op in &ops {
            apply(&mut engine, op, &mut counter);
            check_invariants(&engine)?;
        }
    }

    #[test]
    fn prop_shuffle_round_trip_restores_default(
        n in 1usize..20,
        moves in prop::collection::vec((0usize..20, 0usize..20), 0..10),
    ) {
        let mut engine = QueueEngine::new(PlaybackConfig::default(), Box::new(RecordingBackend::new()));
        let mut counter = 0;
        engine.enqueue(make_songs(n, &mut counter), AddPosition::Last, None);
        let before: Vec<UniqueId> = engine.queue().entries().iter().map(|e| e.unique_id).collect();

        engine.toggle_shuffle();
        for (from, to) in moves {
            if let Some(id) = engine.queue().get(from).map(|e| e.unique_id) {
                engine.move_entry(id, from, to);
            }
        }
        engine.toggle_shuffle();

        let after: Vec<UniqueId> = engine.queue().entries().iter().map(|e| e.unique_id).collect();
        prop_assert_eq!(after, before);
    }

    #[test]
    fn prop_repeat_one_auto_next_keeps_index(n in 1usize..10, start in 0usize..10, rounds in 1usize..5) {
        let mut engine = QueueEngine::new(PlaybackConfig::default(), Box::new(RecordingBackend::new()));
        let mut counter = 0;
        engine.enqueue(make_songs(n, &mut counter), AddPosition::Now, Some(start % n));
        engine.set_repeat(RepeatMode::One);
        let index = engine.current_index();

        for _ in 0..rounds {
            let slot = engine.active_slot();
            engine.on_track_ended(slot, engine.active_load().unwrap());
            prop_assert_eq!(engine.current_index(), index);
            prop_assert_eq!(engine.state(), EngineState::Playing);
        }
    }

    #[test]
    fn prop_repeat_all_auto_next_cycles(n in 1usize..10) {
        let mut engine = QueueEngine::new(PlaybackConfig::default(), Box::new(RecordingBackend::new()));
        let mut counter = 0;
        engine.enqueue(make_songs(n, &mut counter), AddPosition::Now, None);
        engine.set_repeat(RepeatMode::All);

        for step in 1..=n {
            let slot = engine.active_slot();
            engine.on_track_ended(slot, engine.active_load().unwrap());
            prop_assert_eq!(engine.current_index(), Some(step % n));
            prop_assert_eq!(engine.state(), EngineState::Playing);
        }
    }

    #[test]
    fn prop_double_remove_is_noop(n in 1usize..10, pick in 0usize..10) {
        let mut engine = QueueEngine::new(PlaybackConfig::default(), Box::new(RecordingBackend::new()));
        let mut counter = 0;
        engine.enqueue(make_songs(n, &mut counter), AddPosition::Last, None);
        let id = engine.queue().entries()[pick % n].unique_id;

        engine.remove(&[id]);
        let len = engine.queue().len();
        let index = engine.current_index();
        engine.drain_events();

        engine.remove(&[id]);
        prop_assert_eq!(engine.queue().len(), len);
        prop_assert_eq!(engine.current_index(), index);
        prop_assert!(engine.drain_events().is_empty());
    }
}
