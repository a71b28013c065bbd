//! # Pooled Ring-Buffer Queue
//!
//! FIFO queue over a rented circular buffer.
//!
//! ## Layout
//!
//! ```text
//!   buffer: [ e  f  .  .  .  a  b  c  d ]
//!                   ^tail       ^head
//! ```
//!
//! The live window is `count` slots starting at `head`, wrapping modulo the
//! buffer length; `tail` is the next write position. The whole rented
//! capacity is used as ring, so a pooled buffer larger than requested simply
//! delays the next growth. Growth relinearizes the window to index 0.

use std::fmt;
use std::mem;
use std::ops::Range;

use crate::codec::{FieldCodec, FieldMapped, FieldReader, FieldWriter};
use crate::cursor::{Cursor, Enumerable};
use crate::error::{CollectionError, CollectionResult};
use crate::list::PooledList;
use crate::memory::{release, Arena, SharedArena};

/// Minimum number of slots added by one growth.
pub const MINIMUM_GROW: usize = 4;

/// Capacity multiplier applied on growth.
pub const GROW_FACTOR: usize = 2;

/// A pooled FIFO queue.
///
/// # Example
///
/// ```rust,ignore
/// let mut queue: PooledQueue<u32> = PooledQueue::with_capacity(4);
/// queue.enqueue(1);
/// queue.enqueue(2);
/// assert_eq!(queue.dequeue()?, 1);
/// assert_eq!(queue.try_peek(), Some(&2));
/// ```
pub struct PooledQueue<T: Send + 'static, A: Arena = SharedArena> {
    /// Physical ring; every slot outside the live window is `None`.
    buffer: Vec<Option<T>>,
    head: usize,
    tail: usize,
    count: usize,
    version: u32,
    arena: A,
}

impl<T: Send + 'static> PooledQueue<T, SharedArena> {
    /// Creates an empty queue on the global arena.
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(SharedArena::global())
    }

    /// Creates a queue on the global arena with room for `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the arena's maximum array length.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, SharedArena::global())
    }
}

impl<T: Send + 'static> Default for PooledQueue<T, SharedArena> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static, A: Arena> PooledQueue<T, A> {
    /// Creates an empty queue renting from `arena`.
    #[must_use]
    pub const fn new_in(arena: A) -> Self {
        Self {
            buffer: Vec::new(),
            head: 0,
            tail: 0,
            count: 0,
            version: 0,
            arena,
        }
    }

    /// Creates a queue renting from `arena` with room for `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the arena's maximum array length.
    #[must_use]
    pub fn with_capacity_in(capacity: usize, arena: A) -> Self {
        let max = arena.max_array_length();
        assert!(capacity <= max, "queue capacity {capacity} exceeds maximum {max}");
        let buffer = rent_ring(&arena, capacity);
        Self {
            buffer,
            head: 0,
            tail: 0,
            count: 0,
            version: 0,
            arena,
        }
    }

    /// Builds a queue from any source, staging it through a [`PooledList`]
    /// so the ring is rented once at the final size.
    pub fn from_iter_in<I: IntoIterator<Item = T>>(items: I, arena: A) -> Self {
        let mut staged = PooledList::new_in(arena.clone());
        staged.add_range(items);
        let mut queue = Self::with_capacity_in(staged.len(), arena);
        for item in staged.drain() {
            queue.enqueue(item);
        }
        queue
    }

    /// Returns the number of queued items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the ring length.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Adds an item at the back.
    ///
    /// # Panics
    ///
    /// Panics if the queue is already at the maximum array length.
    pub fn enqueue(&mut self, item: T) {
        if self.count == self.buffer.len() {
            self.grow(self.count + 1);
        }
        self.buffer[self.tail] = Some(item);
        self.tail = self.advance(self.tail);
        self.count += 1;
        self.bump();
    }

    /// Removes the front item.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::Empty`] if nothing is queued.
    pub fn dequeue(&mut self) -> CollectionResult<T> {
        self.try_dequeue().ok_or(CollectionError::Empty)
    }

    /// Removes the front item, or `None` if nothing is queued.
    pub fn try_dequeue(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.buffer[self.head].take();
        self.head = self.advance(self.head);
        self.count -= 1;
        self.bump();
        item
    }

    /// Returns the front item.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::Empty`] if nothing is queued.
    pub fn peek(&self) -> CollectionResult<&T> {
        self.try_peek().ok_or(CollectionError::Empty)
    }

    /// Returns the front item, or `None` if nothing is queued.
    #[must_use]
    pub fn try_peek(&self) -> Option<&T> {
        if self.count == 0 {
            return None;
        }
        self.buffer[self.head].as_ref()
    }

    /// Returns the item `index` places behind the front.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.count {
            return None;
        }
        self.buffer[(self.head + index) % self.buffer.len()].as_ref()
    }

    /// Returns true if any queued item equals `item`.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let (front, back) = self.window();
        front.iter().flatten().any(|x| x == item) || back.iter().flatten().any(|x| x == item)
    }

    /// Iterates from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (front, back) = self.window();
        front.iter().chain(back).filter_map(Option::as_ref)
    }

    /// Starts a version-checked cursor.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    /// Copies the queue front-to-back into a vector, whatever the wrap.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Copies the queue front-to-back into the front of `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DestinationTooSmall`] if it cannot hold them.
    pub fn copy_to(&self, destination: &mut [T]) -> CollectionResult<()>
    where
        T: Clone,
    {
        if destination.len() < self.count {
            return Err(CollectionError::DestinationTooSmall {
                required: self.count,
                available: destination.len(),
            });
        }
        for (slot, item) in destination.iter_mut().zip(self.iter()) {
            slot.clone_from(item);
        }
        Ok(())
    }

    /// Removes every item matching `predicate`, keeping the order of the rest.
    ///
    /// Kept items move into a scratch ring starting at index 0; the old ring
    /// goes back to the arena.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        if self.count == 0 {
            return 0;
        }
        let mut scratch = rent_ring(&self.arena, self.buffer.len());
        let (front, back) = self.window_ranges();
        let mut kept = 0;
        for index in front.chain(back) {
            if let Some(item) = self.buffer[index].take() {
                if !predicate(&item) {
                    scratch[kept] = Some(item);
                    kept += 1;
                }
            }
        }
        let removed = self.count - kept;
        let old = mem::replace(&mut self.buffer, scratch);
        release(&self.arena, old);
        self.head = 0;
        self.count = kept;
        self.tail = if kept == self.buffer.len() { 0 } else { kept };
        if removed > 0 {
            self.bump();
        }
        removed
    }

    /// Removes every item. The ring is kept.
    pub fn clear(&mut self) {
        let (front, back) = self.window_ranges();
        for index in front.chain(back) {
            self.buffer[index] = None;
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
        self.bump();
    }

    /// Makes room for at least `capacity` items, returning the ring length.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::CapacityOverflow`] above the maximum length.
    pub fn ensure_capacity(&mut self, capacity: usize) -> CollectionResult<usize> {
        let max = self.arena.max_array_length();
        if capacity > max {
            return Err(CollectionError::CapacityOverflow {
                requested: capacity,
                max,
            });
        }
        if self.buffer.len() < capacity {
            self.grow(capacity);
        }
        Ok(self.buffer.len())
    }

    /// Shrinks the ring to the contents when less than 90% is in use.
    pub fn trim_excess(&mut self) {
        let len = self.buffer.len();
        if self.count < len - len / 10 {
            self.set_capacity(self.count);
        }
    }

    /// Returns the ring to the arena and empties the queue.
    ///
    /// Idempotent; the queue may be reused afterwards.
    pub fn dispose(&mut self) {
        release(&self.arena, mem::take(&mut self.buffer));
        self.head = 0;
        self.tail = 0;
        self.count = 0;
        self.bump();
    }

    fn grow(&mut self, min_capacity: usize) {
        let max = self.arena.max_array_length();
        assert!(
            min_capacity <= max,
            "queue capacity {min_capacity} exceeds maximum {max}"
        );
        let len = self.buffer.len();
        let grown = len
            .saturating_mul(GROW_FACTOR)
            .max(len.saturating_add(MINIMUM_GROW));
        self.set_capacity(grown.min(max).max(min_capacity));
    }

    /// Moves the live window to the front of a freshly rented ring.
    fn set_capacity(&mut self, capacity: usize) {
        let mut ring = rent_ring(&self.arena, capacity);
        let (front, back) = self.window_ranges();
        for (target, index) in front.chain(back).enumerate() {
            ring[target] = self.buffer[index].take();
        }
        let old = mem::replace(&mut self.buffer, ring);
        release(&self.arena, old);
        self.head = 0;
        self.tail = if self.count == self.buffer.len() { 0 } else { self.count };
        self.bump();
    }

    /// Physical index ranges of the live window, front part first.
    fn window_ranges(&self) -> (Range<usize>, Range<usize>) {
        if self.count == 0 {
            return (0..0, 0..0);
        }
        let front_end = (self.head + self.count).min(self.buffer.len());
        let wrapped = self.count - (front_end - self.head);
        (self.head..front_end, 0..wrapped)
    }

    fn window(&self) -> (&[Option<T>], &[Option<T>]) {
        let (front, back) = self.window_ranges();
        (&self.buffer[front], &self.buffer[back])
    }

    #[inline]
    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.buffer.len() {
            0
        } else {
            next
        }
    }

    #[inline]
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

/// Rents a ring and fills every rented slot with `None`.
fn rent_ring<T: Send + 'static, A: Arena>(arena: &A, capacity: usize) -> Vec<Option<T>> {
    let mut ring: Vec<Option<T>> = arena.rent(capacity);
    let len = ring.capacity().min(arena.max_array_length()).max(capacity);
    ring.resize_with(len, || None);
    ring
}

impl<T: Send + 'static, A: Arena> Drop for PooledQueue<T, A> {
    fn drop(&mut self) {
        release(&self.arena, mem::take(&mut self.buffer));
    }
}

impl<T: Clone + Send + 'static, A: Arena> Clone for PooledQueue<T, A> {
    fn clone(&self) -> Self {
        let mut copy = Self::with_capacity_in(self.count, self.arena.clone());
        for item in self.iter() {
            copy.enqueue(item.clone());
        }
        copy
    }
}

impl<T: fmt::Debug + Send + 'static, A: Arena> fmt::Debug for PooledQueue<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Send + 'static, A: Arena> Extend<T> for PooledQueue<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.enqueue(item);
        }
    }
}

impl<T: Send + 'static> FromIterator<T> for PooledQueue<T, SharedArena> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_iter_in(iter, SharedArena::global())
    }
}

impl<T: Send + 'static, A: Arena> Enumerable for PooledQueue<T, A> {
    type Item<'a> = &'a T where Self: 'a;

    fn version(&self) -> u32 {
        self.version
    }

    fn item_at(&self, position: usize) -> Option<(Self::Item<'_>, usize)> {
        self.get(position).map(|item| (item, position + 1))
    }
}

/// Layout: tail, head, raw ring, count, version.
///
/// On load the ring is taken as stored. Only the bounds of the
/// head/tail/count triple are checked; the window contents are trusted.
impl<T: FieldCodec + Send + 'static, A: Arena> FieldMapped<A> for PooledQueue<T, A> {
    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.write_len(self.tail);
        writer.write_len(self.head);
        writer.write_len(self.buffer.len());
        for slot in &self.buffer {
            slot.write_field(writer);
        }
        writer.write_len(self.count);
        writer.write_pod(&self.version);
    }

    fn read_fields(reader: &mut FieldReader<'_>, arena: A) -> CollectionResult<Self> {
        let max = arena.max_array_length();
        let tail = reader.read_len(max)?;
        let head = reader.read_len(max)?;
        let len = reader.read_count(max)?;
        let mut buffer: Vec<Option<T>> = arena.rent(len);
        for _ in 0..len {
            buffer.push(Option::<T>::read_field(reader)?);
        }
        let count = reader.read_len(len)?;
        let version: u32 = reader.read_pod()?;

        for index in [head, tail] {
            if (len > 0 && index >= len) || (len == 0 && index > 0) {
                release(&arena, buffer);
                return Err(CollectionError::InvalidLength(
                    i64::try_from(index).unwrap_or(i64::MAX),
                ));
            }
        }

        Ok(Self {
            buffer,
            head,
            tail,
            count,
            version,
            arena,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::memory::UnpooledArena;

    fn exact(capacity: usize) -> PooledQueue<i32, UnpooledArena> {
        PooledQueue::with_capacity_in(capacity, UnpooledArena)
    }

    #[test]
    fn test_wraparound_then_growth() {
        let mut queue = exact(4);
        for i in 1..=4 {
            queue.enqueue(i);
        }
        assert_eq!(queue.dequeue().unwrap(), 1);
        assert_eq!(queue.dequeue().unwrap(), 2);
        for i in 5..=7 {
            queue.enqueue(i);
        }
        assert_eq!(queue.to_vec(), vec![3, 4, 5, 6, 7]);
        assert!(queue.capacity() >= 5);
    }

    #[test]
    fn test_growth_policy() {
        let mut queue = exact(4);
        for i in 0..5 {
            queue.enqueue(i);
        }
        // 4 * 2 beats the +4 floor
        assert_eq!(queue.capacity(), 8);

        let mut tiny = exact(1);
        tiny.enqueue(0);
        tiny.enqueue(1);
        assert_eq!(tiny.capacity(), 5);
    }

    #[test]
    fn test_try_variants_on_empty() {
        let mut queue = exact(0);
        assert_eq!(queue.try_dequeue(), None);
        assert_eq!(queue.try_peek(), None);
        assert_eq!(queue.dequeue(), Err(CollectionError::Empty));
        assert_eq!(queue.peek(), Err(CollectionError::Empty));
    }

    #[test]
    fn test_contains_across_wrap() {
        let mut queue = exact(4);
        queue.extend([1, 2, 3, 4]);
        queue.dequeue().unwrap();
        queue.dequeue().unwrap();
        queue.enqueue(5);
        assert!(queue.contains(&5));
        assert!(queue.contains(&3));
        assert!(!queue.contains(&1));
        assert_eq!(queue.get(2), Some(&5));
        assert_eq!(queue.get(3), None);
    }

    #[test]
    fn test_remove_where_keeps_order_across_wrap() {
        let mut queue = exact(5);
        queue.extend([1, 2, 3, 4, 5]);
        queue.dequeue().unwrap();
        queue.dequeue().unwrap();
        queue.extend([6, 7]);

        let removed = queue.remove_where(|x| x % 2 == 0);
        assert_eq!(removed, 2);
        assert_eq!(queue.to_vec(), vec![3, 5, 7]);

        queue.enqueue(9);
        assert_eq!(queue.dequeue().unwrap(), 3);
        assert_eq!(queue.to_vec(), vec![5, 7, 9]);
    }

    #[test]
    fn test_cursor_fails_fast() {
        let mut queue = exact(4);
        queue.extend([1, 2]);
        let mut cursor = queue.cursor();
        assert_eq!(cursor.next(&queue).unwrap(), Some(&1));
        queue.enqueue(3);
        assert_eq!(cursor.next(&queue), Err(CollectionError::ConcurrentModification));
    }

    #[test]
    fn test_trim_excess_and_clear() {
        let mut queue = exact(64);
        queue.extend([1, 2, 3]);
        queue.trim_excess();
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.to_vec(), vec![1, 2, 3]);

        queue.clear();
        assert!(queue.is_empty());
        queue.enqueue(4);
        assert_eq!(queue.to_vec(), vec![4]);
    }

    #[test]
    fn test_dispose_is_idempotent_and_reusable() {
        let mut queue = exact(4);
        queue.extend([1, 2, 3, 4]);
        queue.try_dequeue();
        queue.try_dequeue();
        queue.extend([5, 6]);
        queue.dispose();
        queue.dispose();
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 0);

        queue.enqueue(9);
        queue.enqueue(10);
        assert_eq!(queue.to_vec(), vec![9, 10]);
        assert_eq!(queue.dequeue().unwrap(), 9);
    }

    #[test]
    fn test_from_iter_stages_through_list() {
        let arena = SharedArena::with_config(ArenaConfig::default()).unwrap();
        let queue = PooledQueue::from_iter_in((0..10).filter(|x| x % 3 == 0), arena.clone());
        assert_eq!(queue.to_vec(), vec![0, 3, 6, 9]);
        // staging buffer went back to the arena
        assert_eq!(arena.retained(), 1);
    }

    #[test]
    fn test_field_mapping_keeps_physical_layout() {
        let mut queue = exact(4);
        queue.extend([1, 2, 3, 4]);
        queue.dequeue().unwrap();
        queue.enqueue(5);

        let bytes = queue.to_field_bytes();
        let mut loaded = PooledQueue::<i32, _>::from_field_bytes(&bytes, UnpooledArena).unwrap();
        assert_eq!(loaded.capacity(), 4);
        assert_eq!(loaded.to_vec(), vec![2, 3, 4, 5]);
        loaded.enqueue(6);
        assert_eq!(loaded.to_vec(), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_field_mapping_rejects_bad_head() {
        let mut writer = FieldWriter::new();
        writer.write_len(0);
        writer.write_len(9);
        writer.write_len(1);
        None::<i32>.write_field(&mut writer);
        writer.write_len(0);
        writer.write_pod(&0u32);
        let result = PooledQueue::<i32, _>::from_field_bytes(writer.as_slice(), UnpooledArena);
        assert!(matches!(result, Err(CollectionError::InvalidLength(9))));
    }
}
