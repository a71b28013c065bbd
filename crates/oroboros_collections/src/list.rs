//! # Pooled Dynamic Array
//!
//! A growable, index-addressable list whose backing buffer is rented from an
//! [`Arena`] instead of owned.
//!
//! The buffer may be larger than the list: elements `[0, len)` are the
//! contents, the rest is spare capacity. Growth doubles (minimum 4) up to the
//! arena's maximum array length; the old buffer goes back to the arena.

use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};

use crate::codec::{FieldCodec, FieldMapped, FieldReader, FieldWriter};
use crate::cursor::{Cursor, Enumerable};
use crate::error::{CollectionError, CollectionResult};
use crate::memory::{release, relocate, Arena, SharedArena};

/// Capacity of the first rented buffer.
pub const DEFAULT_CAPACITY: usize = 4;

/// A pooled, growable array.
///
/// # Thread Safety
///
/// Single writer. Readers may share `&PooledList` freely; a detached
/// [`Cursor`] detects structural mutation through the version stamp.
///
/// # Example
///
/// ```rust,ignore
/// let mut list: PooledList<u32> = PooledList::new();
/// list.add_range([1, 2, 3, 4, 5, 6]);
/// let removed = list.remove_all(|x| x % 2 == 0);
/// assert_eq!(removed, 3);
/// assert_eq!(list.as_slice(), &[1, 3, 5]);
/// ```
pub struct PooledList<T: Send + 'static, A: Arena = SharedArena> {
    /// Rented buffer; `len()` is the logical count.
    items: Vec<T>,
    version: u32,
    arena: A,
}

impl<T: Send + 'static> PooledList<T, SharedArena> {
    /// Creates an empty list on the global arena. Nothing is rented yet.
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(SharedArena::global())
    }

    /// Creates a list on the global arena with room for `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the arena's maximum array length.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, SharedArena::global())
    }
}

impl<T: Send + 'static> Default for PooledList<T, SharedArena> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static, A: Arena> PooledList<T, A> {
    /// Creates an empty list renting from `arena`.
    #[must_use]
    pub const fn new_in(arena: A) -> Self {
        Self {
            items: Vec::new(),
            version: 0,
            arena,
        }
    }

    /// Creates a list renting from `arena` with room for `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the arena's maximum array length.
    #[must_use]
    pub fn with_capacity_in(capacity: usize, arena: A) -> Self {
        let max = arena.max_array_length();
        assert!(capacity <= max, "list capacity {capacity} exceeds maximum {max}");
        Self {
            items: arena.rent(capacity),
            version: 0,
            arena,
        }
    }

    /// Returns the number of items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list holds no items.
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

    /// Returns the arena this list rents from.
    #[inline]
    #[must_use]
    pub fn arena(&self) -> &A {
        &self.arena
    }

    /// Returns the live contents.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Returns the live contents for in-place writes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Iterates over the items in order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Starts a version-checked cursor.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }

    /// Gets an item by index.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Gets a mutable item by index.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Replaces the item at `index`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index >= len`.
    pub fn set(&mut self, index: usize, item: T) -> CollectionResult<T> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(CollectionError::IndexOutOfRange { index, len })?;
        let previous = mem::replace(slot, item);
        self.bump();
        Ok(previous)
    }

    /// Re-rents the buffer with exactly `capacity` requested slots.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::CapacityBelowLength`] if `capacity < len`,
    /// or [`CollectionError::CapacityOverflow`] above the maximum length.
    pub fn set_capacity(&mut self, capacity: usize) -> CollectionResult<()> {
        let len = self.items.len();
        if capacity < len {
            return Err(CollectionError::CapacityBelowLength {
                requested: capacity,
                len,
            });
        }
        let max = self.arena.max_array_length();
        if capacity > max {
            return Err(CollectionError::CapacityOverflow {
                requested: capacity,
                max,
            });
        }
        if capacity == self.items.capacity() {
            return Ok(());
        }
        if capacity == 0 {
            release(&self.arena, mem::take(&mut self.items));
        } else {
            relocate(&self.arena, &mut self.items, capacity);
        }
        Ok(())
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

    /// Shrinks the buffer to the contents when less than 90% is in use.
    pub fn trim_excess(&mut self) {
        let capacity = self.items.capacity();
        let threshold = capacity - capacity / 10;
        if self.items.len() < threshold {
            // len is always a valid capacity request
            let _ = self.set_capacity(self.items.len());
        }
    }

    /// Appends an item.
    ///
    /// # Panics
    ///
    /// Panics if the list is already at the maximum array length.
    pub fn add(&mut self, item: T) {
        if self.items.len() == self.items.capacity() {
            self.grow(self.items.len() + 1);
        }
        self.items.push(item);
        self.bump();
    }

    /// Appends every item of `items`, pre-sizing from the size hint.
    ///
    /// # Panics
    ///
    /// Panics if the list would exceed the maximum array length.
    pub fn add_range<I: IntoIterator<Item = T>>(&mut self, items: I) {
        let items = items.into_iter();
        let (lower, _) = items.size_hint();
        let needed = self.items.len().saturating_add(lower);
        if needed > self.items.capacity() {
            self.grow(needed);
        }
        for item in items {
            self.add(item);
        }
    }

    /// Appends clones of a contiguous run.
    pub fn add_slice(&mut self, items: &[T])
    where
        T: Clone,
    {
        self.add_range(items.iter().cloned());
    }

    /// Appends `count` default items and returns them for direct writes.
    ///
    /// # Panics
    ///
    /// Panics if the list would exceed the maximum array length.
    pub fn add_span(&mut self, count: usize) -> &mut [T]
    where
        T: Default,
    {
        let start = self.items.len();
        let needed = start.saturating_add(count);
        if needed > self.items.capacity() {
            self.grow(needed);
        }
        self.items.resize_with(needed, T::default);
        self.bump();
        &mut self.items[start..]
    }

    /// Inserts an item at `index`, shifting later items up.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index > len`.
    pub fn insert(&mut self, index: usize, item: T) -> CollectionResult<()> {
        self.check_insert_index(index)?;
        if self.items.len() == self.items.capacity() {
            self.grow(self.items.len() + 1);
        }
        self.items.insert(index, item);
        self.bump();
        Ok(())
    }

    /// Inserts every item of `items` at `index`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index > len`.
    pub fn insert_range<I: IntoIterator<Item = T>>(
        &mut self,
        index: usize,
        items: I,
    ) -> CollectionResult<()> {
        self.check_insert_index(index)?;
        let old_len = self.items.len();
        self.add_range(items);
        self.items[index..].rotate_left(old_len - index);
        Ok(())
    }

    /// Inserts clones of a contiguous run at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index > len`.
    pub fn insert_slice(&mut self, index: usize, items: &[T]) -> CollectionResult<()>
    where
        T: Clone,
    {
        self.insert_range(index, items.iter().cloned())
    }

    /// Opens a gap of `count` default items at `index` and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index > len`.
    pub fn insert_span(&mut self, index: usize, count: usize) -> CollectionResult<&mut [T]>
    where
        T: Default,
    {
        self.check_insert_index(index)?;
        self.add_span(count);
        let tail = &mut self.items[index..];
        tail.rotate_right(count);
        Ok(&mut tail[..count])
    }

    /// Removes and returns the item at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfRange`] if `index >= len`.
    pub fn remove_at(&mut self, index: usize) -> CollectionResult<T> {
        let len = self.items.len();
        if index >= len {
            return Err(CollectionError::IndexOutOfRange { index, len });
        }
        let item = self.items.remove(index);
        self.bump();
        Ok(item)
    }

    /// Removes the first item equal to `item`.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        match self.index_of(item) {
            Some(index) => {
                self.items.remove(index);
                self.bump();
                true
            }
            None => false,
        }
    }

    /// Removes `count` items starting at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::RangeOutOfBounds`] for a bad range.
    pub fn remove_range(&mut self, index: usize, count: usize) -> CollectionResult<()> {
        self.check_range(index, count)?;
        if count > 0 {
            self.items.drain(index..index + count);
            self.bump();
        }
        Ok(())
    }

    /// Removes every item matching `predicate`, returning how many went.
    ///
    /// Single pass: find the first match, then shift each kept item down
    /// over the gap.
    pub fn remove_all<F>(&mut self, mut predicate: F) -> usize
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

    /// Removes every item, yielding them in order. The buffer is kept.
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.bump();
        self.items.drain(..)
    }

    /// Removes every item. The buffer is kept.
    pub fn clear(&mut self) {
        self.items.clear();
        self.bump();
    }

    /// Returns true if any item equals `item`.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.contains(item)
    }

    /// Index of the first item equal to `item`.
    #[must_use]
    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.items.iter().position(|x| x == item)
    }

    /// Index of the first item equal to `item` within `[index, index + count)`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::RangeOutOfBounds`] for a bad range.
    pub fn index_of_in(&self, item: &T, index: usize, count: usize) -> CollectionResult<Option<usize>>
    where
        T: PartialEq,
    {
        self.check_range(index, count)?;
        Ok(self.items[index..index + count]
            .iter()
            .position(|x| x == item)
            .map(|offset| index + offset))
    }

    /// Index of the last item equal to `item`.
    #[must_use]
    pub fn last_index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.items.iter().rposition(|x| x == item)
    }

    /// Index of the last item equal to `item` within `[index, index + count)`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::RangeOutOfBounds`] for a bad range.
    pub fn last_index_of_in(
        &self,
        item: &T,
        index: usize,
        count: usize,
    ) -> CollectionResult<Option<usize>>
    where
        T: PartialEq,
    {
        self.check_range(index, count)?;
        Ok(self.items[index..index + count]
            .iter()
            .rposition(|x| x == item)
            .map(|offset| index + offset))
    }

    /// Binary search over the whole list. The list must already be sorted;
    /// the result on unsorted contents is unspecified.
    ///
    /// `Ok(i)` is a match, `Err(i)` the insertion point.
    #[must_use]
    pub fn binary_search(&self, item: &T) -> Result<usize, usize>
    where
        T: Ord,
    {
        self.items.binary_search(item)
    }

    /// Binary search with a comparison function over the whole list.
    pub fn binary_search_by<F>(&self, compare: F) -> Result<usize, usize>
    where
        F: FnMut(&T) -> Ordering,
    {
        self.items.binary_search_by(compare)
    }

    /// Binary search within `[index, index + count)`, which must be sorted.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::RangeOutOfBounds`] for a bad range.
    pub fn binary_search_in(
        &self,
        index: usize,
        count: usize,
        item: &T,
    ) -> CollectionResult<Result<usize, usize>>
    where
        T: Ord,
    {
        self.check_range(index, count)?;
        Ok(self.items[index..index + count]
            .binary_search(item)
            .map(|i| i + index)
            .map_err(|i| i + index))
    }

    /// Sorts by the natural ordering.
    pub fn sort(&mut self)
    where
        T: Ord,
    {
        self.items.sort();
        self.bump();
    }

    /// Sorts with a two-argument comparison function.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_by(compare);
        self.bump();
    }

    /// Sorts `[index, index + count)` with a comparison function.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::RangeOutOfBounds`] for a bad range.
    pub fn sort_range_by<F>(&mut self, index: usize, count: usize, compare: F) -> CollectionResult<()>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.check_range(index, count)?;
        self.items[index..index + count].sort_by(compare);
        self.bump();
        Ok(())
    }

    /// Reverses the order of all items.
    pub fn reverse(&mut self) {
        self.items.reverse();
        self.bump();
    }

    /// Reverses `[index, index + count)`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::RangeOutOfBounds`] for a bad range.
    pub fn reverse_range(&mut self, index: usize, count: usize) -> CollectionResult<()> {
        self.check_range(index, count)?;
        self.items[index..index + count].reverse();
        self.bump();
        Ok(())
    }

    /// First item matching `predicate`.
    pub fn find<F: FnMut(&T) -> bool>(&self, mut predicate: F) -> Option<&T> {
        self.items.iter().find(|item| predicate(item))
    }

    /// Index of the first item matching `predicate`.
    pub fn find_index<F: FnMut(&T) -> bool>(&self, predicate: F) -> Option<usize> {
        self.items.iter().position(predicate)
    }

    /// Last item matching `predicate`.
    pub fn find_last<F: FnMut(&T) -> bool>(&self, mut predicate: F) -> Option<&T> {
        self.items.iter().rev().find(|item| predicate(item))
    }

    /// Index of the last item matching `predicate`.
    pub fn find_last_index<F: FnMut(&T) -> bool>(&self, predicate: F) -> Option<usize> {
        self.items.iter().rposition(predicate)
    }

    /// Every item matching `predicate`, in a new list on the same arena.
    pub fn find_all<F: FnMut(&T) -> bool>(&self, mut predicate: F) -> Self
    where
        T: Clone,
    {
        let mut found = Self::new_in(self.arena.clone());
        found.add_range(self.items.iter().filter(|item| predicate(item)).cloned());
        found
    }

    /// Returns true if any item matches `predicate`.
    pub fn exists<F: FnMut(&T) -> bool>(&self, predicate: F) -> bool {
        self.items.iter().any(predicate)
    }

    /// Returns true if every item matches `predicate` (vacuously for empty).
    pub fn true_for_all<F: FnMut(&T) -> bool>(&self, predicate: F) -> bool {
        self.items.iter().all(predicate)
    }

    /// Runs `action` on every item.
    pub fn for_each<F: FnMut(&T)>(&self, action: F) {
        self.items.iter().for_each(action);
    }

    /// Runs `action` on a clone of every item, giving it the list itself.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::ConcurrentModification`] as soon as the
    /// action mutates the list structurally.
    pub fn for_each_with<F>(&mut self, mut action: F) -> CollectionResult<()>
    where
        T: Clone,
        F: FnMut(&mut Self, T),
    {
        let version = self.version;
        let mut index = 0;
        while index < self.items.len() {
            let item = self.items[index].clone();
            action(self, item);
            if self.version != version {
                return Err(CollectionError::ConcurrentModification);
            }
            index += 1;
        }
        Ok(())
    }

    /// Maps every item into a new list on the same arena.
    pub fn convert_all<U, F>(&self, convert: F) -> PooledList<U, A>
    where
        U: Send + 'static,
        F: FnMut(&T) -> U,
    {
        let mut converted = PooledList::with_capacity_in(self.items.len(), self.arena.clone());
        converted.items.extend(self.items.iter().map(convert));
        converted
    }

    /// Copies `[index, index + count)` into a new list on the same arena.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::RangeOutOfBounds`] for a bad range.
    pub fn get_range(&self, index: usize, count: usize) -> CollectionResult<Self>
    where
        T: Clone,
    {
        self.check_range(index, count)?;
        let mut range = Self::with_capacity_in(count, self.arena.clone());
        range.items.extend_from_slice(&self.items[index..index + count]);
        Ok(range)
    }

    /// Copies the items into the front of `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DestinationTooSmall`] if it cannot hold them.
    pub fn copy_to(&self, destination: &mut [T]) -> CollectionResult<()>
    where
        T: Clone,
    {
        let required = self.items.len();
        let available = destination.len();
        let target = destination
            .get_mut(..required)
            .ok_or(CollectionError::DestinationTooSmall {
                required,
                available,
            })?;
        target.clone_from_slice(&self.items);
        Ok(())
    }

    /// Copies the items into an ordinary vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.clone()
    }

    /// Returns the buffer to the arena and empties the list.
    ///
    /// Idempotent; the list may be reused afterwards.
    pub fn dispose(&mut self) {
        release(&self.arena, mem::take(&mut self.items));
        self.bump();
    }

    /// Doubling growth, clamped to the maximum array length.
    fn grow(&mut self, min_capacity: usize) {
        let max = self.arena.max_array_length();
        assert!(
            min_capacity <= max,
            "list capacity {min_capacity} exceeds maximum {max}"
        );
        let capacity = self.items.capacity();
        let doubled = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity.saturating_mul(2)
        };
        relocate(&self.arena, &mut self.items, doubled.min(max).max(min_capacity));
    }

    #[inline]
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    fn check_insert_index(&self, index: usize) -> CollectionResult<()> {
        let len = self.items.len();
        if index > len {
            return Err(CollectionError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    fn check_range(&self, start: usize, count: usize) -> CollectionResult<()> {
        let len = self.items.len();
        match start.checked_add(count) {
            Some(end) if end <= len => Ok(()),
            _ => Err(CollectionError::RangeOutOfBounds { start, count, len }),
        }
    }
}

impl<T: Send + 'static, A: Arena> Drop for PooledList<T, A> {
    fn drop(&mut self) {
        release(&self.arena, mem::take(&mut self.items));
    }
}

impl<T: Clone + Send + 'static, A: Arena> Clone for PooledList<T, A> {
    fn clone(&self) -> Self {
        let mut copy = Self::with_capacity_in(self.items.len(), self.arena.clone());
        copy.items.extend_from_slice(&self.items);
        copy
    }
}

impl<T: fmt::Debug + Send + 'static, A: Arena> fmt::Debug for PooledList<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T, A, B> PartialEq<PooledList<T, B>> for PooledList<T, A>
where
    T: PartialEq + Send + 'static,
    A: Arena,
    B: Arena,
{
    fn eq(&self, other: &PooledList<T, B>) -> bool {
        self.items == other.items
    }
}

impl<T: Send + 'static, A: Arena> Index<usize> for PooledList<T, A> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T: Send + 'static, A: Arena> IndexMut<usize> for PooledList<T, A> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}

impl<T: Send + 'static, A: Arena> Extend<T> for PooledList<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.add_range(iter);
    }
}

impl<T: Send + 'static> FromIterator<T> for PooledList<T, SharedArena> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.add_range(iter);
        list
    }
}

impl<'a, T: Send + 'static, A: Arena> IntoIterator for &'a PooledList<T, A> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Send + 'static, A: Arena> Enumerable for PooledList<T, A> {
    type Item<'a> = &'a T where Self: 'a;

    fn version(&self) -> u32 {
        self.version
    }

    fn item_at(&self, position: usize) -> Option<(Self::Item<'_>, usize)> {
        self.items.get(position).map(|item| (item, position + 1))
    }
}

/// Layout: count, then each item in order.
impl<T: FieldCodec + Send + 'static, A: Arena> FieldMapped<A> for PooledList<T, A> {
    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.write_len(self.items.len());
        for item in &self.items {
            item.write_field(writer);
        }
    }

    fn read_fields(reader: &mut FieldReader<'_>, arena: A) -> CollectionResult<Self> {
        let count = reader.read_count(arena.max_array_length())?;
        let mut list = Self::with_capacity_in(count, arena);
        for _ in 0..count {
            list.items.push(T::read_field(reader)?);
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;

    fn arena() -> SharedArena {
        SharedArena::with_config(ArenaConfig::default()).unwrap()
    }

    fn list_of(items: &[i32]) -> PooledList<i32> {
        let mut list = PooledList::new_in(arena());
        list.add_slice(items);
        list
    }

    #[test]
    fn test_lazy_rent_and_doubling() {
        let mut list: PooledList<u64> = PooledList::new_in(arena());
        assert_eq!(list.capacity(), 0);

        list.add(1);
        assert!(list.capacity() >= DEFAULT_CAPACITY);

        for i in 0..100 {
            list.add(i);
        }
        assert_eq!(list.len(), 101);
        assert!(list.capacity() >= 101);
    }

    #[test]
    fn test_remove_all_compacts_in_order() {
        let mut list = list_of(&[1, 2, 3, 4, 5, 6]);
        let removed = list.remove_all(|x| x % 2 == 0);
        assert_eq!(removed, 3);
        assert_eq!(list.as_slice(), &[1, 3, 5]);

        assert_eq!(list.remove_all(|x| *x > 100), 0);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_insert_and_remove_at() {
        let mut list = list_of(&[1, 3]);
        list.insert(1, 2).unwrap();
        list.insert(3, 4).unwrap();
        assert_eq!(list.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(
            list.insert(9, 0),
            Err(CollectionError::IndexOutOfRange { index: 9, len: 4 })
        );

        assert_eq!(list.remove_at(0).unwrap(), 1);
        assert_eq!(list.as_slice(), &[2, 3, 4]);
        assert!(list.remove_at(3).is_err());
    }

    #[test]
    fn test_insert_range_keeps_order() {
        let mut list = list_of(&[1, 5]);
        list.insert_range(1, vec![2, 3, 4]).unwrap();
        assert_eq!(list.as_slice(), &[1, 2, 3, 4, 5]);

        list.insert_slice(0, &[-1, 0]).unwrap();
        assert_eq!(list.as_slice(), &[-1, 0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_spans_expose_live_region() {
        let mut list = list_of(&[1, 2]);
        let span = list.add_span(3);
        span.copy_from_slice(&[7, 8, 9]);
        assert_eq!(list.as_slice(), &[1, 2, 7, 8, 9]);

        let gap = list.insert_span(1, 2).unwrap();
        assert_eq!(gap, &[0, 0]);
        gap[0] = 5;
        gap[1] = 6;
        assert_eq!(list.as_slice(), &[1, 5, 6, 2, 7, 8, 9]);
    }

    #[test]
    fn test_search_helpers() {
        let list = list_of(&[4, 1, 4, 9]);
        assert_eq!(list.index_of(&4), Some(0));
        assert_eq!(list.last_index_of(&4), Some(2));
        assert_eq!(list.index_of_in(&4, 1, 3).unwrap(), Some(2));
        assert_eq!(list.last_index_of_in(&4, 0, 2).unwrap(), Some(0));
        assert!(list.index_of_in(&4, 3, 5).is_err());
        assert_eq!(list.find(|x| *x > 4), Some(&9));
        assert_eq!(list.find_last_index(|x| *x == 4), Some(2));
        assert!(list.exists(|x| *x == 1));
        assert!(list.true_for_all(|x| *x > 0));
        assert_eq!(list.find_all(|x| *x == 4).as_slice(), &[4, 4]);
    }

    #[test]
    fn test_sort_and_binary_search() {
        let mut list = list_of(&[5, 3, 9, 1]);
        list.sort();
        assert_eq!(list.as_slice(), &[1, 3, 5, 9]);
        assert_eq!(list.binary_search(&5), Ok(2));
        assert_eq!(list.binary_search(&4), Err(2));
        assert_eq!(list.binary_search_in(2, 2, &9).unwrap(), Ok(3));

        list.sort_by(|a, b| b.cmp(a));
        assert_eq!(list.as_slice(), &[9, 5, 3, 1]);

        list.sort_range_by(1, 3, Ord::cmp).unwrap();
        assert_eq!(list.as_slice(), &[9, 1, 3, 5]);

        list.reverse_range(0, 2).unwrap();
        assert_eq!(list.as_slice(), &[1, 9, 3, 5]);
        list.reverse();
        assert_eq!(list.as_slice(), &[5, 3, 9, 1]);
    }

    #[test]
    fn test_convert_all_and_get_range() {
        let list = list_of(&[1, 2, 3]);
        let strings = list.convert_all(|x| format!("#{x}"));
        assert_eq!(strings.as_slice(), &["#1", "#2", "#3"]);

        let range = list.get_range(1, 2).unwrap();
        assert_eq!(range.as_slice(), &[2, 3]);
        assert!(list.get_range(2, 2).is_err());
    }

    #[test]
    fn test_for_each_with_detects_mutation() {
        let mut list = list_of(&[1, 2, 3]);
        let mut seen = Vec::new();
        list.for_each_with(|_, item| seen.push(item)).unwrap();
        assert_eq!(seen, vec![1, 2, 3]);

        let result = list.for_each_with(|list, item| list.add(item));
        assert_eq!(result, Err(CollectionError::ConcurrentModification));
    }

    #[test]
    fn test_cursor_fails_fast() {
        let mut list = list_of(&[1, 2, 3]);
        let mut cursor = list.cursor();
        assert_eq!(cursor.next(&list).unwrap(), Some(&1));
        list.add(4);
        assert_eq!(cursor.next(&list), Err(CollectionError::ConcurrentModification));

        cursor.reset(&list);
        let mut count = 0;
        while cursor.next(&list).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, list.len());
    }

    #[test]
    fn test_trim_excess_and_set_capacity() {
        let mut list: PooledList<u32> = PooledList::with_capacity_in(256, arena());
        list.add_range(0..10);
        list.trim_excess();
        assert!(list.capacity() < 256);
        assert_eq!(list.len(), 10);

        assert_eq!(
            list.set_capacity(5),
            Err(CollectionError::CapacityBelowLength { requested: 5, len: 10 })
        );
        list.clear();
        list.set_capacity(0).unwrap();
        assert_eq!(list.capacity(), 0);
    }

    #[test]
    fn test_dispose_returns_buffer_and_allows_reuse() {
        let arena = arena();
        let mut list: PooledList<u32> = PooledList::with_capacity_in(64, arena.clone());
        list.add(1);
        list.dispose();
        list.dispose();
        assert!(list.is_empty());
        assert_eq!(list.capacity(), 0);
        assert_eq!(arena.retained(), 1);

        list.ensure_capacity(64).unwrap();
        list.add(2);
        assert_eq!(list.as_slice(), &[2]);
        assert_eq!(arena.stats().reused, 1);
    }

    #[test]
    fn test_copy_to_checks_destination() {
        let list = list_of(&[1, 2, 3]);
        let mut big = [0; 4];
        list.copy_to(&mut big).unwrap();
        assert_eq!(big, [1, 2, 3, 0]);

        let mut small = [0; 2];
        assert_eq!(
            list.copy_to(&mut small),
            Err(CollectionError::DestinationTooSmall { required: 3, available: 2 })
        );
    }

    #[test]
    fn test_field_mapping() {
        let list = list_of(&[3, 1, 2]);
        let bytes = list.to_field_bytes();
        let loaded = PooledList::<i32>::from_field_bytes(&bytes, arena()).unwrap();
        assert_eq!(loaded, list);
    }
}
