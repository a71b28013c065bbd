//! # Pooled Array Stack
//!
//! LIFO stack over a rented contiguous buffer. The top of the stack is the
//! last live element; growth doubles (minimum 4).

use std::fmt;
use std::mem;

use crate::codec::{FieldCodec, FieldMapped, FieldReader, FieldWriter};
use crate::cursor::{Cursor, Enumerable};
use crate::error::{CollectionError, CollectionResult};
use crate::list::{PooledList, DEFAULT_CAPACITY};
use crate::memory::{release, relocate, Arena, SharedArena};

/// A pooled LIFO stack.
///
/// # Example
///
/// ```rust,ignore
/// let mut stack: PooledStack<u32> = PooledStack::new();
/// stack.push(1);
/// stack.push(2);
/// assert_eq!(stack.pop()?, 2);
/// assert_eq!(stack.try_peek(), Some(&1));
/// ```
pub struct PooledStack<T: Send + 'static, A: Arena = SharedArena> {
    /// Rented buffer; the last element is the top.
    items: Vec<T>,
    version: u32,
    arena: A,
}

impl<T: Send + 'static> PooledStack<T, SharedArena> {
    /// Creates an empty stack on the global arena.
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(SharedArena::global())
    }

    /// Creates a stack on the global arena with room for `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the arena's maximum array length.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, SharedArena::global())
    }
}

impl<T: Send + 'static> Default for PooledStack<T, SharedArena> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static, A: Arena> PooledStack<T, A> {
    /// Creates an empty stack renting from `arena`.
    #[must_use]
    pub const fn new_in(arena: A) -> Self {
        Self {
            items: Vec::new(),
            version: 0,
            arena,
        }
    }

    /// Creates a stack renting from `arena` with room for `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the arena's maximum array length.
    #[must_use]
    pub fn with_capacity_in(capacity: usize, arena: A) -> Self {
        let max = arena.max_array_length();
        assert!(capacity <= max, "stack capacity {capacity} exceeds maximum {max}");
        Self {
            items: arena.rent(capacity),
            version: 0,
            arena,
        }
    }

    /// Builds a stack from any source, staging it through a [`PooledList`].
    /// The last item of the source ends on top.
    pub fn from_iter_in<I: IntoIterator<Item = T>>(items: I, arena: A) -> Self {
        let mut staged = PooledList::new_in(arena.clone());
        staged.add_range(items);
        let mut stack = Self::with_capacity_in(staged.len(), arena);
        stack.items.extend(staged.drain());
        stack
    }

    /// Returns the number of items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the stack is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the capacity of the rented buffer.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Pushes an item on top.
    ///
    /// # Panics
    ///
    /// Panics if the stack is already at the maximum array length.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.items.capacity() {
            self.grow(self.items.len() + 1);
        }
        self.items.push(item);
        self.bump();
    }

    /// Removes the top item.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::Empty`] if the stack is empty.
    pub fn pop(&mut self) -> CollectionResult<T> {
        self.try_pop().ok_or(CollectionError::Empty)
    }

    /// Removes the top item, or `None` if the stack is empty.
    pub fn try_pop(&mut self) -> Option<T> {
        let item = self.items.pop()?;
        self.bump();
        Some(item)
    }

    /// Returns the top item.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::Empty`] if the stack is empty.
    pub fn peek(&self) -> CollectionResult<&T> {
        self.try_peek().ok_or(CollectionError::Empty)
    }

    /// Returns the top item, or `None` if the stack is empty.
    #[inline]
    #[must_use]
    pub fn try_peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// Returns true if any item equals `item`.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.contains(item)
    }

    /// Iterates from the top down.
    pub fn iter(&self) -> std::iter::Rev<std::slice::Iter<'_, T>> {
        self.items.iter().rev()
    }

    /// Starts a version-checked cursor (top down).
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    /// Copies the items top-first into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Copies the items top-first into the front of `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DestinationTooSmall`] if it cannot hold them.
    pub fn copy_to(&self, destination: &mut [T]) -> CollectionResult<()>
    where
        T: Clone,
    {
        let required = self.items.len();
        if destination.len() < required {
            return Err(CollectionError::DestinationTooSmall {
                required,
                available: destination.len(),
            });
        }
        for (slot, item) in destination.iter_mut().zip(self.iter()) {
            slot.clone_from(item);
        }
        Ok(())
    }

    /// Removes every item matching `predicate`, compacting in place.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let len = self.items.len();
        let Some(mut free) = self.items.iter().position(|item| predicate(item)) else {
            return 0;
        };
        for current in free + 1..len {
            if !predicate(&self.items[current]) {
                self.items.swap(free, current);
                free += 1;
            }
        }
        self.items.truncate(free);
        self.bump();
        len - free
    }

    /// Removes every item. The buffer is kept.
    pub fn clear(&mut self) {
        self.items.clear();
        self.bump();
    }

    /// Makes room for at least `capacity` items, returning the new capacity.
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
        if self.items.capacity() < capacity {
            self.grow(capacity);
        }
        Ok(self.items.capacity())
    }

    /// Re-rents a smaller buffer when less than 90% is in use.
    ///
    /// The arena may answer with a buffer no smaller than the current one;
    /// that candidate is handed straight back and nothing changes.
    pub fn trim_excess(&mut self) {
        let capacity = self.items.capacity();
        let len = self.items.len();
        if len >= capacity - capacity / 10 {
            return;
        }
        if len == 0 {
            release(&self.arena, mem::take(&mut self.items));
            self.bump();
            return;
        }
        let mut candidate: Vec<T> = self.arena.rent(len);
        if candidate.capacity() < capacity {
            candidate.extend(self.items.drain(..));
            let old = mem::replace(&mut self.items, candidate);
            release(&self.arena, old);
            self.bump();
        } else {
            release(&self.arena, candidate);
        }
    }

    /// Returns the buffer to the arena and empties the stack.
    ///
    /// Idempotent; the stack may be reused afterwards.
    pub fn dispose(&mut self) {
        release(&self.arena, mem::take(&mut self.items));
        self.bump();
    }

    fn grow(&mut self, min_capacity: usize) {
        let max = self.arena.max_array_length();
        assert!(
            min_capacity <= max,
            "stack capacity {min_capacity} exceeds maximum {max}"
        );
        let capacity = self.items.capacity();
        let doubled = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity.saturating_mul(2)
        };
        relocate(&self.arena, &mut self.items, doubled.min(max).max(min_capacity));
        self.bump();
    }

    #[inline]
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

impl<T: Send + 'static, A: Arena> Drop for PooledStack<T, A> {
    fn drop(&mut self) {
        release(&self.arena, mem::take(&mut self.items));
    }
}

impl<T: Clone + Send + 'static, A: Arena> Clone for PooledStack<T, A> {
    fn clone(&self) -> Self {
        let mut copy = Self::with_capacity_in(self.items.len(), self.arena.clone());
        copy.items.extend_from_slice(&self.items);
        copy
    }
}

impl<T: fmt::Debug + Send + 'static, A: Arena> fmt::Debug for PooledStack<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Send + 'static, A: Arena> Extend<T> for PooledStack<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<T: Send + 'static> FromIterator<T> for PooledStack<T, SharedArena> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_iter_in(iter, SharedArena::global())
    }
}

impl<T: Send + 'static, A: Arena> Enumerable for PooledStack<T, A> {
    type Item<'a> = &'a T where Self: 'a;

    fn version(&self) -> u32 {
        self.version
    }

    fn item_at(&self, position: usize) -> Option<(Self::Item<'_>, usize)> {
        let index = self.items.len().checked_sub(position + 1)?;
        Some((&self.items[index], position + 1))
    }
}

/// Layout: count, then each item bottom to top.
impl<T: FieldCodec + Send + 'static, A: Arena> FieldMapped<A> for PooledStack<T, A> {
    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.write_len(self.items.len());
        for item in &self.items {
            item.write_field(writer);
        }
    }

    fn read_fields(reader: &mut FieldReader<'_>, arena: A) -> CollectionResult<Self> {
        let count = reader.read_count(arena.max_array_length())?;
        let mut stack = Self::with_capacity_in(count, arena);
        for _ in 0..count {
            stack.items.push(T::read_field(reader)?);
        }
        Ok(stack)
    }
}
