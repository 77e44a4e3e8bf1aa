//! Unit tests for the load and store queues.

use riscv_hart_sim::core::lsq::{
    LoadInfo, LoadQueue, RegisterRevert, StoreInfo, StoreQueue, UndoError,
};

/// Tests a zero-capacity queue records nothing.
#[test]
fn test_store_queue_disabled() {
    let mut q = StoreQueue::new(0);
    assert!(!q.is_enabled());
    q.push(StoreInfo::new(4, 0x100, 1, 0));
    assert!(q.is_empty());
}

/// Tests the oldest entry is evicted when the queue is full.
#[test]
fn test_store_queue_eviction() {
    let mut q = StoreQueue::new(2);
    q.push(StoreInfo::new(4, 0x100, 1, 0));
    q.push(StoreInfo::new(4, 0x200, 2, 0));
    q.push(StoreInfo::new(4, 0x300, 3, 0));
    assert_eq!(q.len(), 2);
    let addrs: Vec<u64> = q.entries().map(|e| e.addr).collect();
    assert_eq!(addrs, vec![0x200, 0x300]);
}

/// Tests undoing a word store restores its previous bytes.
#[test]
fn test_store_queue_undo_word() {
    let mut q = StoreQueue::new(4);
    q.push(StoreInfo::new(4, 0x100, 0x1122_3344, 0xaabb_ccdd));
    let pokes = q.undo(0x100).unwrap();
    assert_eq!(
        pokes,
        vec![(0x100, 0xdd), (0x101, 0xcc), (0x102, 0xbb), (0x103, 0xaa)]
    );
    assert!(q.is_empty());
}

/// Tests undo starts at the error address, not the store address.
#[test]
fn test_store_queue_undo_from_middle() {
    let mut q = StoreQueue::new(4);
    q.push(StoreInfo::new(4, 0x100, 0x1122_3344, 0xaabb_ccdd));
    let pokes = q.undo(0x102).unwrap();
    assert_eq!(pokes, vec![(0x102, 0xbb), (0x103, 0xaa)]);
    assert!(q.is_empty());
}

/// Tests a store crossing a double-word boundary is trimmed, not removed.
#[test]
fn test_store_queue_undo_trims_at_boundary() {
    let mut q = StoreQueue::new(4);
    q.push(StoreInfo::new(8, 0x104, 0x8877_6655_4433_2211, 0));
    let pokes = q.undo(0x104).unwrap();
    assert_eq!(pokes.len(), 4);
    assert_eq!(pokes.last(), Some(&(0x107, 0)));

    let rest: Vec<StoreInfo> = q.entries().copied().collect();
    assert_eq!(rest, vec![StoreInfo::new(4, 0x108, 0x8877_6655, 0)]);
}

/// Tests younger stores replay their bytes over the undone range.
#[test]
fn test_store_queue_undo_replays_younger() {
    let mut q = StoreQueue::new(4);
    q.push(StoreInfo::new(4, 0x200, 0x1111_1111, 0));
    q.push(StoreInfo::new(1, 0x201, 0x22, 0x11));
    let pokes = q.undo(0x200).unwrap();
    assert_eq!(
        pokes,
        vec![(0x200, 0), (0x201, 0), (0x202, 0), (0x203, 0), (0x201, 0x22)]
    );
    assert_eq!(q.len(), 1);
}

/// Tests ambiguous and unknown error addresses leave the queue untouched.
#[test]
fn test_store_queue_undo_errors() {
    let mut q = StoreQueue::new(4);
    q.push(StoreInfo::new(4, 0x200, 0x1111_1111, 0));
    q.push(StoreInfo::new(1, 0x201, 0x22, 0x11));
    assert_eq!(q.undo(0x201), Err(UndoError::MultipleMatches(2)));
    assert_eq!(q.undo(0x300), Err(UndoError::NoMatch));
    assert_eq!(q.len(), 2);
}

/// Tests a failed load reverts its destination register.
#[test]
fn test_load_queue_undo_single() {
    let mut q = LoadQueue::new(4);
    q.push(LoadInfo::new(4, 0x100, 5, 7));
    assert_eq!(
        q.undo(0x100),
        Ok(Some(RegisterRevert {
            reg_ix: 5,
            value: 7
        }))
    );
    assert!(q.is_empty());
}

/// Tests the revert value is the oldest prior value for the register.
#[test]
fn test_load_queue_undo_uses_oldest_prior_value() {
    let mut q = LoadQueue::new(4);
    q.push(LoadInfo::new(4, 0x100, 5, 1));
    q.push(LoadInfo::new(4, 0x200, 5, 2));
    assert_eq!(
        q.undo(0x200),
        Ok(Some(RegisterRevert {
            reg_ix: 5,
            value: 1
        }))
    );
    assert_eq!(q.len(), 1);
    assert!(!q.entries().next().unwrap().valid);
}

/// Tests a younger load into the same register suppresses the revert and
/// inherits the prior value.
#[test]
fn test_load_queue_undo_with_younger_load() {
    let mut q = LoadQueue::new(4);
    q.push(LoadInfo::new(4, 0x100, 5, 1));
    q.push(LoadInfo::new(4, 0x200, 5, 2));
    assert_eq!(q.undo(0x100), Ok(None));
    let rest: Vec<&LoadInfo> = q.entries().collect();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].addr, 0x200);
    assert_eq!(rest[0].prev_data, 1);
}

/// Tests loads into register 0 are queued as invalid placeholders.
#[test]
fn test_load_queue_register_zero() {
    let mut q = LoadQueue::new(4);
    q.push(LoadInfo::new(4, 0x100, 0, 0));
    assert_eq!(q.len(), 1);
    assert_eq!(q.undo(0x100), Ok(None));
}

/// Tests consuming a register removes its newest entry and invalidates
/// older ones.
#[test]
fn test_load_queue_remove_for_reg() {
    let mut q = LoadQueue::new(4);
    q.push(LoadInfo::new(4, 0x100, 5, 0));
    q.push(LoadInfo::new(4, 0x200, 5, 0));
    q.push(LoadInfo::new(4, 0x300, 6, 0));
    q.remove_for_reg(5);
    let rest: Vec<(u64, bool)> = q.entries().map(|e| (e.addr, e.valid)).collect();
    assert_eq!(rest, vec![(0x100, false), (0x300, true)]);
}

/// Tests overwriting a register invalidates its entries.
#[test]
fn test_load_queue_invalidate() {
    let mut q = LoadQueue::new(4);
    q.push(LoadInfo::new(4, 0x100, 5, 0));
    q.invalidate(5);
    assert!(!q.entries().next().unwrap().valid);
    assert_eq!(q.undo(0x100), Ok(None));
}

/// Tests completion picks the oldest or newest entry at the address.
#[test]
fn test_load_queue_finish() {
    let mut q = LoadQueue::new(4);
    q.push(LoadInfo::new(4, 0x100, 5, 1));
    q.push(LoadInfo::new(4, 0x100, 6, 2));
    assert_eq!(q.finish(0x100, true), 2);
    let rest: Vec<usize> = q.entries().map(|e| e.reg_ix).collect();
    assert_eq!(rest, vec![6]);

    assert_eq!(q.finish(0x100, false), 1);
    assert!(q.is_empty());
    assert_eq!(q.finish(0x100, false), 0);
}
