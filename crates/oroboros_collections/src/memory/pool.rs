//! # Shared Buffer Pool
//!
//! The default [`Arena`]: power-of-two size classes per element type,
//! retained across unrelated containers.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::arena::Arena;
use crate::config::{ArenaConfig, MIN_POOLED_LENGTH};
use crate::error::{CollectionError, CollectionResult};

type BucketKey = (TypeId, u32);

/// A pool of reusable buffers shared by any number of containers.
///
/// Requests are rounded up to a power-of-two size class (at least 16
/// elements). Buffers larger than `max_pooled_length` bypass the pool:
/// they are allocated exactly and dropped on return.
///
/// Cloning the handle shares the same pool.
///
/// # Thread Safety
///
/// Rent and return take a short `parking_lot` lock; the handle is
/// `Send + Sync` and may be used from any thread.
///
/// # Example
///
/// ```rust,ignore
/// let arena = SharedArena::with_config(ArenaConfig::default())?;
/// let mut list = PooledList::with_capacity_in(100, arena.clone());
/// list.add(1);
/// drop(list); // buffer goes back to `arena`
/// assert_eq!(arena.stats().returned, 1);
/// ```
#[derive(Clone)]
pub struct SharedArena {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: ArenaConfig,
    buckets: Mutex<HashMap<BucketKey, Vec<Box<dyn Any + Send>>>>,
    counters: PoolCounters,
}

#[derive(Default)]
struct PoolCounters {
    rented: AtomicU64,
    reused: AtomicU64,
    returned: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of a pool's lifetime counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Buffers handed out, fresh or reused.
    pub rented: u64,
    /// Rents served from a retained buffer.
    pub reused: u64,
    /// Buffers accepted back into a bucket.
    pub returned: u64,
    /// Returns refused because the buffer is not a size-class buffer.
    pub rejected: u64,
    /// Returns accepted but dropped (oversized or bucket full).
    pub dropped: u64,
}

static GLOBAL: OnceLock<SharedArena> = OnceLock::new();

impl SharedArena {
    /// Creates an independent pool.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidConfig`] if `config` fails validation.
    pub fn with_config(config: ArenaConfig) -> CollectionResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: ArenaConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                buckets: Mutex::new(HashMap::new()),
                counters: PoolCounters::default(),
            }),
        }
    }

    /// Returns the process-wide default pool.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL
            .get_or_init(|| Self::from_valid(ArenaConfig::default()))
            .clone()
    }

    /// Returns the pool's configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.inner.config
    }

    /// Returns a snapshot of the lifetime counters.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let counters = &self.inner.counters;
        ArenaStats {
            rented: counters.rented.load(Ordering::Relaxed),
            reused: counters.reused.load(Ordering::Relaxed),
            returned: counters.returned.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Number of buffers currently retained across all buckets.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.inner.buckets.lock().values().map(Vec::len).sum()
    }

    /// Drops every retained buffer.
    pub fn trim(&self) {
        self.inner.buckets.lock().clear();
    }

    /// Returns the pooled size class for a request, or `None` if the
    /// request bypasses the pool.
    fn size_class(&self, min_len: usize) -> Option<usize> {
        let class = min_len.max(MIN_POOLED_LENGTH).checked_next_power_of_two()?;
        (class <= self.inner.config.max_pooled_length).then_some(class)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bucket_key<T: 'static>(class: usize) -> BucketKey {
        (TypeId::of::<T>(), class.trailing_zeros())
    }
}

impl Default for SharedArena {
    fn default() -> Self {
        Self::global()
    }
}

impl std::fmt::Debug for SharedArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedArena")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Arena for SharedArena {
    fn rent<T: Send + 'static>(&self, min_len: usize) -> Vec<T> {
        if min_len == 0 || mem::size_of::<T>() == 0 {
            return Vec::new();
        }
        let counters = &self.inner.counters;
        counters.rented.fetch_add(1, Ordering::Relaxed);

        let Some(class) = self.size_class(min_len) else {
            tracing::trace!(min_len, "rent bypasses pool");
            return Vec::with_capacity(min_len);
        };

        let pooled = self
            .inner
            .buckets
            .lock()
            .get_mut(&Self::bucket_key::<T>(class))
            .and_then(Vec::pop);
        if let Some(buffer) = pooled.and_then(|b| b.downcast::<Vec<T>>().ok()) {
            counters.reused.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(min_len, class, "rent reused pooled buffer");
            return *buffer;
        }

        tracing::trace!(min_len, class, "rent allocated fresh buffer");
        Vec::with_capacity(class)
    }

    fn give_back<T: Send + 'static>(&self, mut buffer: Vec<T>) -> CollectionResult<()> {
        let capacity = buffer.capacity();
        if capacity == 0 || mem::size_of::<T>() == 0 {
            return Ok(());
        }
        let counters = &self.inner.counters;
        let config = &self.inner.config;

        if capacity > config.max_pooled_length {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        if !capacity.is_power_of_two() || capacity < MIN_POOLED_LENGTH {
            counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(CollectionError::BufferRejected { capacity });
        }

        buffer.clear();
        let mut buckets = self.inner.buckets.lock();
        let bucket = buckets.entry(Self::bucket_key::<T>(capacity)).or_default();
        if bucket.len() >= config.max_buffers_per_bucket {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        bucket.push(Box::new(buffer));
        counters.returned.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(capacity, "buffer returned to pool");
        Ok(())
    }

    fn max_array_length(&self) -> usize {
        self.inner.config.max_array_length
    }

    fn hash_collision_threshold(&self) -> usize {
        self.inner.config.hash_collision_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private_arena() -> SharedArena {
        SharedArena::with_config(ArenaConfig::default()).unwrap()
    }

    #[test]
    fn test_rent_rounds_up_to_size_class() {
        let arena = private_arena();
        let buffer: Vec<u32> = arena.rent(5);
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= MIN_POOLED_LENGTH);

        let buffer: Vec<u32> = arena.rent(100);
        assert!(buffer.capacity() >= 128);
    }

    #[test]
    fn test_zero_rent_does_not_allocate() {
        let arena = private_arena();
        let buffer: Vec<u64> = arena.rent(0);
        assert_eq!(buffer.capacity(), 0);
        assert_eq!(arena.stats().rented, 0);
    }

    #[test]
    fn test_returned_buffer_is_reused() {
        let arena = private_arena();
        let mut buffer: Vec<u32> = arena.rent(32);
        buffer.extend([1, 2, 3]);
        arena.give_back(buffer).unwrap();
        assert_eq!(arena.retained(), 1);

        let again: Vec<u32> = arena.rent(20);
        assert!(again.is_empty());
        assert_eq!(arena.stats().reused, 1);
        assert_eq!(arena.retained(), 0);
    }

    #[test]
    fn test_buckets_are_keyed_by_type() {
        let arena = private_arena();
        let buffer: Vec<u32> = arena.rent(32);
        arena.give_back(buffer).unwrap();

        let other: Vec<u64> = arena.rent(32);
        assert_eq!(other.capacity(), 32);
        assert_eq!(arena.stats().reused, 0);
    }

    #[test]
    fn test_foreign_buffer_is_rejected() {
        let arena = private_arena();
        let foreign: Vec<u8> = Vec::with_capacity(33);
        let result = arena.give_back(foreign);
        assert!(matches!(result, Err(CollectionError::BufferRejected { .. })));
        assert_eq!(arena.stats().rejected, 1);
    }

    #[test]
    fn test_oversized_requests_bypass_pool() {
        let config = ArenaConfig {
            max_pooled_length: 64,
            ..ArenaConfig::default()
        };
        let arena = SharedArena::with_config(config).unwrap();
        let buffer: Vec<u16> = arena.rent(100);
        assert!(buffer.capacity() >= 100);
        arena.give_back(buffer).unwrap();
        assert_eq!(arena.retained(), 0);
        assert_eq!(arena.stats().dropped, 1);
    }

    #[test]
    fn test_bucket_retention_is_bounded() {
        let config = ArenaConfig {
            max_buffers_per_bucket: 1,
            ..ArenaConfig::default()
        };
        let arena = SharedArena::with_config(config).unwrap();
        let a: Vec<u8> = arena.rent(16);
        let b: Vec<u8> = arena.rent(16);
        arena.give_back(a).unwrap();
        arena.give_back(b).unwrap();
        assert_eq!(arena.retained(), 1);
        assert_eq!(arena.stats().dropped, 1);
    }

    #[test]
    fn test_global_is_shared() {
        let a = SharedArena::global();
        let b = SharedArena::default();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }
}
