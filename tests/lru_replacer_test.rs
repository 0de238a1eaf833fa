//! Integration tests for the LRU replacer's pin semantics.

use strata::buffer::LruReplacer;
use strata::common::FrameId;

#[test]
fn test_victim_is_least_recently_unpinned() {
    let replacer = LruReplacer::new(8);

    for i in [1u32, 2, 3, 4] {
        replacer.unpin(FrameId::new(i));
    }
    assert_eq!(replacer.size(), 4);

    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.size(), 2);
}

#[test]
fn test_pin_removes_from_candidates() {
    let replacer = LruReplacer::new(8);

    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(2));
    replacer.unpin(FrameId::new(3));

    replacer.pin(FrameId::new(2));
    assert_eq!(replacer.size(), 2);

    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), Some(FrameId::new(3)));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_unpin_existing_pinned_entry_flips_in_place() {
    let replacer = LruReplacer::new(8);

    replacer.unpin(FrameId::new(1));
    replacer.pin(FrameId::new(1));
    assert_eq!(replacer.size(), 0);

    replacer.unpin(FrameId::new(1));
    assert_eq!(replacer.size(), 1);
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
}

#[test]
fn test_pin_unknown_frame_is_noop() {
    let replacer = LruReplacer::new(8);
    replacer.pin(FrameId::new(42));
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_duplicate_unpin_does_not_inflate_size() {
    let replacer = LruReplacer::new(8);
    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(1));
    assert_eq!(replacer.size(), 1);
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_remove_drops_entry() {
    let replacer = LruReplacer::new(8);
    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(2));

    replacer.remove(FrameId::new(1));
    assert_eq!(replacer.size(), 1);
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_interleaved_pin_unpin_order() {
    let replacer = LruReplacer::new(8);

    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(2));
    replacer.unpin(FrameId::new(3));

    // Pinning 1 moves it to the front; unpinning keeps that position.
    replacer.pin(FrameId::new(1));
    replacer.unpin(FrameId::new(1));

    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.victim(), Some(FrameId::new(3)));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
}
