//! # Container Scenario Tests
//!
//! End-to-end behavior of the four pooled containers through the public API,
//! including buffer traffic against a private pool.
//!
//! Run with: cargo test --test container_scenarios -- --nocapture

use oroboros_collections::{
    ArenaConfig, AsciiCaseInsensitiveComparer, CollectionError, DefaultComparer, FieldMapped,
    InsertionBehavior, PooledList, PooledMap, PooledQueue, PooledStack, SharedArena,
    UnpooledArena,
};

fn private_arena() -> SharedArena {
    SharedArena::with_config(ArenaConfig::default()).unwrap()
}

// ============================================================================
// HASH MAP
// ============================================================================

#[test]
fn map_basic_lookup() {
    let mut map: PooledMap<String, i32> = PooledMap::with_capacity(0);
    map.add("a".to_string(), 1).unwrap();
    map.add("b".to_string(), 2).unwrap();
    map.add("c".to_string(), 3).unwrap();

    assert_eq!(map.len(), 3);
    assert_eq!(map["b"], 2);
    assert!(!map.contains_key("z").unwrap());
}

#[test]
fn map_resize_keeps_every_value() {
    let mut map = PooledMap::with_capacity_in(4, DefaultComparer::default(), private_arena());
    for key in 0..100u64 {
        map.add(key, key * key).unwrap();
    }
    assert!(map.table_size() >= 100);
    for key in 0..100u64 {
        assert_eq!(map.value(&key).unwrap(), &(key * key));
    }
}

#[test]
fn map_duplicate_strict_insert() {
    let mut map: PooledMap<String, i32> = PooledMap::new();
    map.add("k".to_string(), 1).unwrap();
    let result = map.try_insert("k".to_string(), 2, InsertionBehavior::ThrowOnExisting);
    assert_eq!(result, Err(CollectionError::DuplicateKey));
    assert_eq!(map["k"], 1);
}

#[test]
fn map_case_insensitive_keys() {
    let mut map = PooledMap::with_comparer(AsciiCaseInsensitiveComparer::default());
    map.add("Veridia".to_string(), 1).unwrap();
    assert_eq!(map.get("VERIDIA").unwrap(), Some(&1));
    assert_eq!(
        map.add("veridia".to_string(), 2),
        Err(CollectionError::DuplicateKey)
    );

    let bytes = map.to_field_bytes();
    let loaded = PooledMap::<String, i32, AsciiCaseInsensitiveComparer>::from_field_bytes(
        &bytes,
        SharedArena::global(),
    )
    .unwrap();
    assert_eq!(loaded["veridia"], 1);
}

#[test]
fn map_returns_buffers_on_drop() {
    let arena = private_arena();
    {
        let mut map = PooledMap::with_capacity_in(20, DefaultComparer::default(), arena.clone());
        map.add(1u32, 1u32).unwrap();
    }
    // bucket array and slot array
    assert_eq!(arena.stats().returned, 2);
    assert_eq!(arena.retained(), 2);
}

// ============================================================================
// LIST
// ============================================================================

#[test]
fn list_remove_all_even() {
    let mut list: PooledList<i32> = PooledList::new();
    list.add_range([1, 2, 3, 4, 5, 6]);
    assert_eq!(list.remove_all(|x| x % 2 == 0), 3);
    assert_eq!(list.as_slice(), &[1, 3, 5]);
}

#[test]
fn list_for_each_with_detects_mutation() {
    let mut list = PooledList::new_in(UnpooledArena);
    list.add_range([1, 2, 3]);
    let result = list.for_each_with(|list, _| list.add(0));
    assert_eq!(result, Err(CollectionError::ConcurrentModification));
}

#[test]
fn list_buffers_are_reused_between_lists() {
    let arena = private_arena();
    let mut first = PooledList::with_capacity_in(100, arena.clone());
    first.add_range(0..100u32);
    drop(first);

    let second: PooledList<u32, _> = PooledList::with_capacity_in(100, arena.clone());
    assert!(second.is_empty());
    assert_eq!(arena.stats().reused, 1);
}

// ============================================================================
// QUEUE
// ============================================================================

#[test]
fn queue_wraps_then_grows() {
    let mut queue = PooledQueue::with_capacity_in(4, UnpooledArena);
    for item in [1, 2, 3, 4] {
        queue.enqueue(item);
    }
    assert_eq!(queue.dequeue().unwrap(), 1);
    assert_eq!(queue.dequeue().unwrap(), 2);
    for item in [5, 6, 7] {
        queue.enqueue(item);
    }
    assert_eq!(queue.to_vec(), vec![3, 4, 5, 6, 7]);
}

#[test]
fn queue_empty_variants() {
    let mut queue: PooledQueue<u8> = PooledQueue::new();
    assert_eq!(queue.try_dequeue(), None);
    assert_eq!(queue.dequeue(), Err(CollectionError::Empty));
    assert_eq!(queue.peek(), Err(CollectionError::Empty));
}

// ============================================================================
// STACK
// ============================================================================

#[test]
fn stack_pops_in_reverse() {
    let mut stack: PooledStack<i32> = PooledStack::new();
    stack.push(1);
    stack.push(2);
    stack.push(3);
    assert_eq!(stack.pop().unwrap(), 3);
    assert_eq!(stack.pop().unwrap(), 2);
    assert_eq!(stack.pop().unwrap(), 1);
    assert_eq!(stack.try_pop(), None);
    assert_eq!(stack.pop(), Err(CollectionError::Empty));
}

#[test]
fn stack_from_queue_contents() {
    let queue: PooledQueue<i32> = (1..=4).collect();
    let stack = PooledStack::from_iter_in(queue.iter().copied(), UnpooledArena);
    assert_eq!(stack.to_vec(), vec![4, 3, 2, 1]);
}

// ============================================================================
// CURSORS
// ============================================================================

#[test]
fn cursors_fail_fast_on_every_container() {
    let mut map = PooledMap::new_in(DefaultComparer::default(), UnpooledArena);
    map.add(1, 1).unwrap();
    let mut cursor = map.cursor();
    map.remove(&1).unwrap();
    assert_eq!(cursor.next(&map), Err(CollectionError::ConcurrentModification));

    let mut list = PooledList::new_in(UnpooledArena);
    list.add(1);
    let mut cursor = list.cursor();
    list.clear();
    assert_eq!(cursor.next(&list), Err(CollectionError::ConcurrentModification));

    let mut queue = PooledQueue::new_in(UnpooledArena);
    queue.enqueue(1);
    let mut cursor = queue.cursor();
    queue.try_dequeue();
    assert_eq!(cursor.next(&queue), Err(CollectionError::ConcurrentModification));

    let mut stack = PooledStack::new_in(UnpooledArena);
    stack.push(1);
    let mut cursor = stack.cursor();
    stack.try_pop();
    assert_eq!(cursor.next(&stack), Err(CollectionError::ConcurrentModification));
}
