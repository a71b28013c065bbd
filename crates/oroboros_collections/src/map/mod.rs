//! # Pooled Hash Map
//!
//! Chained hash table over two rented buffers:
//!
//! - `buckets`: one `i32` per table slot, `0` for empty or `index + 1`
//!   of the chain head. The table size is always prime.
//! - `slots`: entries with their cached 31-bit hash and the index of the
//!   next entry in the chain. Removed entries stay in place with
//!   `hash_code == -1` and thread the free list through `next`.
//!
//! Every chain walk is bounded by the number of slots; a longer walk means
//! the links are corrupt and is reported as
//! [`CollectionError::ConcurrentModification`] instead of looping.
//!
//! ## Hash flooding
//!
//! An insert that walks more than the arena's `hash_collision_threshold`
//! colliding entries asks the comparer for a
//! [`randomized`](KeyComparer::randomized) variant. If one is offered the
//! map switches to it and rehashes every entry.

mod comparer;
mod primes;

use std::borrow::Borrow;
use std::fmt;
use std::mem;
use std::ops::Index;

pub use comparer::{
    AsciiCaseInsensitiveComparer, DefaultComparer, KeyComparer, PersistentComparer,
    ASCII_CASE_INSENSITIVE_TAG, DEFAULT_COMPARER_TAG,
};

use crate::codec::{FieldCodec, FieldMapped, FieldReader, FieldWriter};
use crate::cursor::{Cursor, Enumerable};
use crate::error::{CollectionError, CollectionResult};
use crate::memory::{release, relocate, Arena, SharedArena};
use primes::{clamp_prime, expand_prime, get_prime};

/// End of a chain or of the free list.
const END: i32 = -1;

/// `hash_code` of a slot on the free list.
const FREE: i32 = -1;

/// What an insert does when the key is already present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InsertionBehavior {
    /// Keep the existing value.
    #[default]
    None,
    /// Replace the existing value.
    OverwriteExisting,
    /// Fail with [`CollectionError::DuplicateKey`].
    ThrowOnExisting,
}

enum InsertOutcome<V> {
    Added(usize),
    Replaced(usize, V),
    Kept(usize),
}

impl<V> InsertOutcome<V> {
    fn index(&self) -> usize {
        match self {
            Self::Added(index) | Self::Replaced(index, _) | Self::Kept(index) => *index,
        }
    }
}

struct Slot<K, V> {
    hash_code: i32,
    next: i32,
    pair: Option<(K, V)>,
}

impl<K, V> Slot<K, V> {
    const fn vacant() -> Self {
        Self {
            hash_code: FREE,
            next: END,
            pair: None,
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
#[inline]
fn hash_code<Q: ?Sized, C: KeyComparer<Q>>(comparer: &C, key: &Q) -> i32 {
    (comparer.hash(key) & 0x7FFF_FFFF) as i32
}

#[allow(clippy::cast_sign_loss)]
#[inline]
fn bucket_of(hash: i32, size: usize) -> usize {
    hash as usize % size
}

/// Slot indices never exceed the maximum array length, which fits in `i32`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
#[inline]
fn link(index: usize) -> i32 {
    index as i32
}

#[inline]
fn unlink(link: i32) -> Option<usize> {
    usize::try_from(link).ok()
}

/// A pooled, unordered hash map with a pluggable comparer.
///
/// # Thread Safety
///
/// Single writer. Any number of readers may share `&PooledMap` while no
/// writer is active; detached [`Cursor`]s detect structural mutation.
///
/// # Example
///
/// ```rust,ignore
/// let mut map: PooledMap<String, u32> = PooledMap::new();
/// map.add("a".to_string(), 1)?;
/// map.insert("a".to_string(), 2)?;
/// assert_eq!(map.get("a")?, Some(&2));
/// assert_eq!(map.add("a".to_string(), 3), Err(CollectionError::DuplicateKey));
/// ```
pub struct PooledMap<K, V, C = DefaultComparer, A = SharedArena>
where
    K: Send + 'static,
    V: Send + 'static,
    A: Arena,
{
    buckets: Vec<i32>,
    slots: Vec<Slot<K, V>>,
    free_list: i32,
    free_count: usize,
    version: u32,
    comparer: C,
    arena: A,
}

impl<K, V> PooledMap<K, V, DefaultComparer, SharedArena>
where
    K: std::hash::Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    /// Creates an empty map on the global arena. Nothing is rented until
    /// the first insert.
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(DefaultComparer::default(), SharedArena::global())
    }

    /// Creates a map on the global arena sized for `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the arena's maximum array length.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, DefaultComparer::default(), SharedArena::global())
    }
}

impl<K, V> Default for PooledMap<K, V, DefaultComparer, SharedArena>
where
    K: std::hash::Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> PooledMap<K, V, C, SharedArena>
where
    K: Send + 'static,
    V: Send + 'static,
    C: KeyComparer<K>,
{
    /// Creates an empty map on the global arena using `comparer`.
    #[must_use]
    pub fn with_comparer(comparer: C) -> Self {
        Self::new_in(comparer, SharedArena::global())
    }
}

impl<K, V, C, A> PooledMap<K, V, C, A>
where
    K: Send + 'static,
    V: Send + 'static,
    C: KeyComparer<K>,
    A: Arena,
{
    /// Creates an empty map renting from `arena`.
    #[must_use]
    pub fn new_in(comparer: C, arena: A) -> Self {
        Self {
            buckets: Vec::new(),
            slots: Vec::new(),
            free_list: END,
            free_count: 0,
            version: 0,
            comparer,
            arena,
        }
    }

    /// Creates a map renting from `arena`, sized for `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the arena's maximum array length.
    #[must_use]
    pub fn with_capacity_in(capacity: usize, comparer: C, arena: A) -> Self {
        let max = arena.max_array_length();
        assert!(capacity <= max, "map capacity {capacity} exceeds maximum {max}");
        let mut map = Self::new_in(comparer, arena);
        if capacity > 0 {
            map.initialize(capacity);
        }
        map
    }

    /// Copies `source` into a new map with the same comparer and arena.
    ///
    /// Stored hashes are reused, so no key is hashed again. Free slots are
    /// not carried over.
    #[must_use]
    pub fn from_map(source: &Self) -> Self
    where
        K: Clone,
        V: Clone,
    {
        let mut map =
            Self::with_capacity_in(source.len(), source.comparer.clone(), source.arena.clone());
        for slot in &source.slots {
            if let Some(pair) = &slot.pair {
                map.slots.push(Slot {
                    hash_code: slot.hash_code,
                    next: END,
                    pair: Some(pair.clone()),
                });
            }
        }
        map.relink();
        map
    }

    /// Builds a map from pairs, failing on the first duplicate key.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`] if a key repeats.
    pub fn from_pairs_in<I>(pairs: I, comparer: C, arena: A) -> CollectionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs = pairs.into_iter();
        let hint = pairs.size_hint().0.min(arena.max_array_length());
        let mut map = Self::with_capacity_in(hint, comparer, arena);
        for (key, value) in pairs {
            map.add(key, value)?;
        }
        Ok(map)
    }

    /// Returns the number of live entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_count
    }

    /// Returns true if the map holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current table size (a prime, or zero before the first insert).
    #[inline]
    #[must_use]
    pub fn table_size(&self) -> usize {
        self.buckets.len()
    }

    /// Current version stamp.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The comparer in use. It changes once if hash flooding is detected.
    #[inline]
    #[must_use]
    pub fn comparer(&self) -> &C {
        &self.comparer
    }

    /// The arena backing this map.
    #[inline]
    #[must_use]
    pub fn arena(&self) -> &A {
        &self.arena
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn find_slot<Q>(&self, key: &Q) -> CollectionResult<Option<usize>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: KeyComparer<Q>,
    {
        if self.buckets.is_empty() {
            return Ok(None);
        }
        let hash = hash_code(&self.comparer, key);
        let mut next = self.buckets[bucket_of(hash, self.buckets.len())] - 1;
        let mut hops = 0;
        while let Some(index) = unlink(next) {
            let slot = self
                .slots
                .get(index)
                .ok_or(CollectionError::ConcurrentModification)?;
            if slot.hash_code == hash {
                if let Some((existing, _)) = &slot.pair {
                    if <C as KeyComparer<Q>>::equals(&self.comparer, existing.borrow(), key) {
                        return Ok(Some(index));
                    }
                }
            }
            next = slot.next;
            hops += 1;
            if hops > self.slots.len() {
                return Err(CollectionError::ConcurrentModification);
            }
        }
        Ok(None)
    }

    /// Returns the value for `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::ConcurrentModification`] if the bucket
    /// chain is corrupt.
    pub fn get<Q>(&self, key: &Q) -> CollectionResult<Option<&V>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: KeyComparer<Q>,
    {
        Ok(self
            .find_slot(key)?
            .and_then(|index| self.slots[index].pair.as_ref())
            .map(|(_, value)| value))
    }

    /// Returns the value for `key` mutably, if present.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::get`].
    pub fn get_mut<Q>(&mut self, key: &Q) -> CollectionResult<Option<&mut V>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: KeyComparer<Q>,
    {
        Ok(self
            .find_slot(key)?
            .and_then(|index| self.slots[index].pair.as_mut())
            .map(|(_, value)| value))
    }

    /// Returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::KeyNotFound`] if the key is absent.
    pub fn value<Q>(&self, key: &Q) -> CollectionResult<&V>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: KeyComparer<Q>,
    {
        self.get(key)?.ok_or(CollectionError::KeyNotFound)
    }

    /// Returns true if `key` is present.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::get`].
    pub fn contains_key<Q>(&self, key: &Q) -> CollectionResult<bool>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: KeyComparer<Q>,
    {
        Ok(self.find_slot(key)?.is_some())
    }

    /// Returns true if any entry holds `value`. Linear scan.
    #[must_use]
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|candidate| candidate == value)
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    fn insert_entry(
        &mut self,
        key: K,
        value: V,
        behavior: InsertionBehavior,
    ) -> CollectionResult<InsertOutcome<V>> {
        if self.buckets.is_empty() {
            self.initialize(0);
        }
        let hash = hash_code(&self.comparer, &key);
        let mut bucket = bucket_of(hash, self.buckets.len());
        let mut next = self.buckets[bucket] - 1;
        let mut collisions = 0;
        while let Some(index) = unlink(next) {
            let slot = self
                .slots
                .get_mut(index)
                .ok_or(CollectionError::ConcurrentModification)?;
            if slot.hash_code == hash {
                if let Some((existing, current)) = slot.pair.as_mut() {
                    if self.comparer.equals(existing, &key) {
                        return match behavior {
                            InsertionBehavior::OverwriteExisting => {
                                Ok(InsertOutcome::Replaced(index, mem::replace(current, value)))
                            }
                            InsertionBehavior::ThrowOnExisting => {
                                Err(CollectionError::DuplicateKey)
                            }
                            InsertionBehavior::None => Ok(InsertOutcome::Kept(index)),
                        };
                    }
                }
            }
            next = slot.next;
            collisions += 1;
            if collisions > self.slots.len() {
                return Err(CollectionError::ConcurrentModification);
            }
        }

        let index = if let Some(free) = unlink(self.free_list) {
            self.free_list = self
                .slots
                .get(free)
                .ok_or(CollectionError::ConcurrentModification)?
                .next;
            self.free_count -= 1;
            free
        } else {
            if self.slots.len() == self.buckets.len() {
                self.grow();
                bucket = bucket_of(hash, self.buckets.len());
            }
            self.slots.push(Slot::vacant());
            self.slots.len() - 1
        };

        self.slots[index] = Slot {
            hash_code: hash,
            next: self.buckets[bucket] - 1,
            pair: Some((key, value)),
        };
        self.buckets[bucket] = link(index) + 1;
        self.bump();

        if collisions > self.arena.hash_collision_threshold() {
            self.randomize_hashing(collisions);
        }
        Ok(InsertOutcome::Added(index))
    }

    /// Inserts with the given duplicate-key behavior.
    ///
    /// Returns true if the map now holds `value` for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`] for
    /// [`InsertionBehavior::ThrowOnExisting`] on an existing key, or
    /// [`CollectionError::ConcurrentModification`] on a corrupt chain.
    ///
    /// # Panics
    ///
    /// Panics if the table would grow past the arena's maximum array length.
    pub fn try_insert(
        &mut self,
        key: K,
        value: V,
        behavior: InsertionBehavior,
    ) -> CollectionResult<bool> {
        Ok(!matches!(
            self.insert_entry(key, value, behavior)?,
            InsertOutcome::Kept(_)
        ))
    }

    /// Inserts or overwrites, returning the previous value.
    ///
    /// Overwriting an existing key is not a structural change and leaves
    /// the version stamp alone.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::try_insert`].
    pub fn insert(&mut self, key: K, value: V) -> CollectionResult<Option<V>> {
        match self.insert_entry(key, value, InsertionBehavior::OverwriteExisting)? {
            InsertOutcome::Replaced(_, old) => Ok(Some(old)),
            InsertOutcome::Added(_) | InsertOutcome::Kept(_) => Ok(None),
        }
    }

    /// Indexer-style upsert.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::try_insert`].
    pub fn set(&mut self, key: K, value: V) -> CollectionResult<()> {
        self.insert(key, value).map(drop)
    }

    /// Adds a new entry; an existing key is an error.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`] if `key` is present.
    pub fn add(&mut self, key: K, value: V) -> CollectionResult<()> {
        self.insert_entry(key, value, InsertionBehavior::ThrowOnExisting)
            .map(drop)
    }

    /// Adds a new entry unless `key` is present. Returns true if added.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::try_insert`].
    pub fn try_add(&mut self, key: K, value: V) -> CollectionResult<bool> {
        self.try_insert(key, value, InsertionBehavior::None)
    }

    /// Adds `add_value`, or applies `update` to the existing value.
    ///
    /// Check-then-act; not atomic with respect to other writers.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::try_insert`].
    pub fn add_or_update<F>(&mut self, key: K, add_value: V, update: F) -> CollectionResult<&mut V>
    where
        F: FnOnce(&K, &mut V),
    {
        self.add_or_update_with(key, |_| add_value, update)
    }

    /// Adds `add(&key)`, or applies `update` to the existing value.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::try_insert`].
    pub fn add_or_update_with<F, G>(
        &mut self,
        key: K,
        add: G,
        update: F,
    ) -> CollectionResult<&mut V>
    where
        G: FnOnce(&K) -> V,
        F: FnOnce(&K, &mut V),
    {
        let index = match self.find_slot(&key)? {
            Some(index) => {
                if let Some((existing, value)) = self.slots[index].pair.as_mut() {
                    update(&*existing, value);
                }
                index
            }
            None => {
                let value = add(&key);
                self.insert_entry(key, value, InsertionBehavior::ThrowOnExisting)?
                    .index()
            }
        };
        self.value_at_mut(index)
    }

    /// Returns the value for `key`, inserting `make()` first if absent.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::try_insert`].
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> CollectionResult<&mut V>
    where
        F: FnOnce() -> V,
    {
        let index = match self.find_slot(&key)? {
            Some(index) => index,
            None => self
                .insert_entry(key, make(), InsertionBehavior::ThrowOnExisting)?
                .index(),
        };
        self.value_at_mut(index)
    }

    /// Inserts every pair, overwriting existing keys.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::try_insert`]; pairs before the failing one stay
    /// inserted.
    pub fn try_extend<I>(&mut self, pairs: I) -> CollectionResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in pairs {
            self.insert(key, value)?;
        }
        Ok(())
    }

    fn value_at_mut(&mut self, index: usize) -> CollectionResult<&mut V> {
        self.slots
            .get_mut(index)
            .and_then(|slot| slot.pair.as_mut())
            .map(|(_, value)| value)
            .ok_or(CollectionError::ConcurrentModification)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Removes `key`, returning the stored pair.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::ConcurrentModification`] if the bucket
    /// chain is corrupt.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> CollectionResult<Option<(K, V)>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: KeyComparer<Q>,
    {
        if self.buckets.is_empty() {
            return Ok(None);
        }
        let hash = hash_code(&self.comparer, key);
        let bucket = bucket_of(hash, self.buckets.len());
        let mut previous: Option<usize> = None;
        let mut next = self.buckets[bucket] - 1;
        let mut hops = 0;
        while let Some(index) = unlink(next) {
            let slot = self
                .slots
                .get(index)
                .ok_or(CollectionError::ConcurrentModification)?;
            let matched = slot.hash_code == hash
                && slot.pair.as_ref().is_some_and(|(existing, _)| {
                    <C as KeyComparer<Q>>::equals(&self.comparer, existing.borrow(), key)
                });
            if matched {
                let successor = slot.next;
                match previous {
                    Some(previous) => self.slots[previous].next = successor,
                    None => self.buckets[bucket] = successor + 1,
                }
                let slot = &mut self.slots[index];
                slot.hash_code = FREE;
                slot.next = self.free_list;
                let pair = slot.pair.take();
                self.free_list = link(index);
                self.free_count += 1;
                self.bump();
                return Ok(pair);
            }
            previous = Some(index);
            next = slot.next;
            hops += 1;
            if hops > self.slots.len() {
                return Err(CollectionError::ConcurrentModification);
            }
        }
        Ok(None)
    }

    /// Removes `key`, returning its value.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::remove_entry`].
    pub fn take<Q>(&mut self, key: &Q) -> CollectionResult<Option<V>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: KeyComparer<Q>,
    {
        Ok(self.remove_entry(key)?.map(|(_, value)| value))
    }

    /// Removes `key`. Returns true if it was present.
    ///
    /// # Errors
    ///
    /// As [`PooledMap::remove_entry`].
    pub fn remove<Q>(&mut self, key: &Q) -> CollectionResult<bool>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: KeyComparer<Q>,
    {
        Ok(self.remove_entry(key)?.is_some())
    }

    /// Removes every entry. Both buffers are kept.
    pub fn clear(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        self.buckets.fill(0);
        self.slots.clear();
        self.free_list = END;
        self.free_count = 0;
        self.bump();
    }

    /// Returns both buffers to the arena and empties the map.
    ///
    /// Idempotent; the map may be reused afterwards.
    pub fn dispose(&mut self) {
        release(&self.arena, mem::take(&mut self.buckets));
        release(&self.arena, mem::take(&mut self.slots));
        self.free_list = END;
        self.free_count = 0;
        self.bump();
    }

    // =========================================================================
    // Sizing
    // =========================================================================

    /// Grows the table to hold at least `capacity` entries without further
    /// resizing. Returns the new table size.
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
        let current = self.buckets.len();
        if current >= capacity {
            return Ok(current);
        }
        if current == 0 {
            self.initialize(capacity);
        } else {
            let size = clamp_prime(get_prime(capacity), max);
            if size > current {
                self.rehash(size, false);
            }
        }
        Ok(self.buckets.len())
    }

    /// Shrinks the table to fit the live entries.
    pub fn trim_excess(&mut self) {
        let len = self.len();
        if let Err(error) = self.trim_excess_to(len) {
            tracing::debug!(%error, "trim skipped");
        }
    }

    /// Shrinks the table to fit `capacity` entries, compacting live entries
    /// to the front of the slot buffer and dropping the free list.
    ///
    /// Does nothing if the table is already that small.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::CapacityBelowLength`] if `capacity` is
    /// smaller than the number of live entries, or
    /// [`CollectionError::CapacityOverflow`] above the maximum length.
    pub fn trim_excess_to(&mut self, capacity: usize) -> CollectionResult<()> {
        let len = self.len();
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
        let size = clamp_prime(get_prime(capacity), max);
        if size >= self.buckets.len() {
            return Ok(());
        }

        tracing::debug!(from = self.buckets.len(), to = size, len, "map table trimmed");
        let mut old_slots = mem::replace(&mut self.slots, self.arena.rent(size));
        let fresh = self.zeroed_buckets(size);
        release(&self.arena, mem::replace(&mut self.buckets, fresh));
        self.slots.extend(old_slots.drain(..).filter(|slot| slot.pair.is_some()));
        release(&self.arena, old_slots);
        self.free_list = END;
        self.free_count = 0;
        self.relink();
        self.bump();
        Ok(())
    }

    fn initialize(&mut self, capacity: usize) {
        let size = clamp_prime(get_prime(capacity), self.arena.max_array_length());
        let buckets = self.zeroed_buckets(size);
        release(&self.arena, mem::replace(&mut self.buckets, buckets));
        let slots = self.arena.rent(size);
        release(&self.arena, mem::replace(&mut self.slots, slots));
        self.free_list = END;
        self.free_count = 0;
        self.bump();
    }

    fn zeroed_buckets(&self, size: usize) -> Vec<i32> {
        let mut buckets = self.arena.rent(size);
        buckets.resize(size, 0);
        buckets
    }

    fn grow(&mut self) {
        let size = self.buckets.len();
        let max = self.arena.max_array_length();
        let target = clamp_prime(expand_prime(size), max);
        assert!(target > size, "map capacity exceeds maximum {max}");
        tracing::debug!(from = size, to = target, "map table grows");
        self.rehash(target, false);
    }

    /// Rebuilds every chain for a table of `size`, reusing the current
    /// buffers when they are already large enough.
    fn rehash(&mut self, size: usize, new_hashes: bool) {
        if new_hashes {
            for slot in &mut self.slots {
                if let Some((key, _)) = &slot.pair {
                    slot.hash_code = hash_code(&self.comparer, key);
                }
            }
        }
        if self.buckets.capacity() >= size {
            self.buckets.clear();
            self.buckets.resize(size, 0);
        } else {
            let fresh = self.zeroed_buckets(size);
            release(&self.arena, mem::replace(&mut self.buckets, fresh));
        }
        if self.slots.capacity() < size {
            relocate(&self.arena, &mut self.slots, size);
        }
        self.relink();
        self.bump();
    }

    /// Threads every live slot onto its bucket chain. Buckets must be zero.
    fn relink(&mut self) {
        let size = self.buckets.len();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.hash_code >= 0 {
                let bucket = bucket_of(slot.hash_code, size);
                slot.next = self.buckets[bucket] - 1;
                self.buckets[bucket] = link(index) + 1;
            }
        }
    }

    fn randomize_hashing(&mut self, collisions: usize) {
        let Some(randomized) = self.comparer.randomized() else {
            return;
        };
        tracing::warn!(
            collisions,
            table_size = self.buckets.len(),
            "collision threshold exceeded, switching to randomized hashing"
        );
        self.comparer = randomized;
        self.rehash(self.buckets.len(), true);
    }

    #[inline]
    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Iterates live entries in slot order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.len(),
        }
    }

    /// Iterates live keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterates live values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Iterates live values mutably.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.pair.as_mut().map(|(_, value)| value))
    }

    /// Starts a version-checked cursor over the live entries.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self)
    }
}

/// Borrowing iterator over a map's live entries.
pub struct Iter<'a, K, V> {
    slots: std::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            if let Some((key, value)) = &slot.pair {
                self.remaining -= 1;
                return Some((key, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<'a, K, V, C, A> IntoIterator for &'a PooledMap<K, V, C, A>
where
    K: Send + 'static,
    V: Send + 'static,
    C: KeyComparer<K>,
    A: Arena,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, C, A> Drop for PooledMap<K, V, C, A>
where
    K: Send + 'static,
    V: Send + 'static,
    A: Arena,
{
    fn drop(&mut self) {
        release(&self.arena, mem::take(&mut self.buckets));
        release(&self.arena, mem::take(&mut self.slots));
    }
}

impl<K, V, C, A> Clone for PooledMap<K, V, C, A>
where
    K: Clone + Send + 'static,
    V: Clone + Send + 'static,
    C: KeyComparer<K>,
    A: Arena,
{
    fn clone(&self) -> Self {
        Self::from_map(self)
    }
}

impl<K, V, C, A> fmt::Debug for PooledMap<K, V, C, A>
where
    K: fmt::Debug + Send + 'static,
    V: fmt::Debug + Send + 'static,
    C: KeyComparer<K>,
    A: Arena,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C, A, B> PartialEq<PooledMap<K, V, C, B>> for PooledMap<K, V, C, A>
where
    K: Send + 'static,
    V: PartialEq + Send + 'static,
    C: KeyComparer<K>,
    A: Arena,
    B: Arena,
{
    fn eq(&self, other: &PooledMap<K, V, C, B>) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| matches!(other.get(key), Ok(Some(found)) if found == value))
    }
}

impl<K, V, C, A, Q> Index<&Q> for PooledMap<K, V, C, A>
where
    K: Borrow<Q> + Send + 'static,
    V: Send + 'static,
    C: KeyComparer<K> + KeyComparer<Q>,
    A: Arena,
    Q: ?Sized,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if `key` is absent.
    fn index(&self, key: &Q) -> &V {
        match self.value(key) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }
}

impl<K, V, C, A> Enumerable for PooledMap<K, V, C, A>
where
    K: Send + 'static,
    V: Send + 'static,
    C: KeyComparer<K>,
    A: Arena,
{
    type Item<'a> = (&'a K, &'a V) where Self: 'a;

    fn version(&self) -> u32 {
        self.version
    }

    fn item_at(&self, position: usize) -> Option<(Self::Item<'_>, usize)> {
        self.slots
            .get(position..)?
            .iter()
            .enumerate()
            .find_map(|(offset, slot)| {
                slot.pair
                    .as_ref()
                    .map(|(key, value)| ((key, value), position + offset + 1))
            })
    }
}

/// Layout: table size, comparer tag, live count, then each live pair in
/// slot order. Chains are rebuilt on load, and the stored table size is
/// honored only as far as the remaining input can back it.
impl<K, V, C, A> FieldMapped<A> for PooledMap<K, V, C, A>
where
    K: FieldCodec + Send + 'static,
    V: FieldCodec + Send + 'static,
    C: PersistentComparer<K>,
    A: Arena,
{
    fn write_fields(&self, writer: &mut FieldWriter) {
        writer.write_len(self.buckets.len());
        writer.write_pod(&self.comparer.tag());
        writer.write_len(self.len());
        for (key, value) in self.iter() {
            key.write_field(writer);
            value.write_field(writer);
        }
    }

    fn read_fields(reader: &mut FieldReader<'_>, arena: A) -> CollectionResult<Self> {
        let max = arena.max_array_length();
        let size = reader.read_len(max)?;
        let tag: u32 = reader.read_pod()?;
        let comparer = <C as PersistentComparer<K>>::from_tag(tag)?;
        let count = reader.read_count(max)?;
        // stored size is a hint; never pre-size past what the input can hold
        let presize = size.min(reader.remaining()).max(count);
        let mut map = Self::with_capacity_in(presize, comparer, arena);
        for _ in 0..count {
            let key = K::read_field(reader)?;
            let value = V::read_field(reader)?;
            map.add(key, value)?;
        }
        Ok(map)
    }
}
