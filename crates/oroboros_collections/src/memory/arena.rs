//! # Arena Contract
//!
//! The rent/return contract every pooled container is written against.

use crate::config::{DEFAULT_HASH_COLLISION_THRESHOLD, DEFAULT_MAX_ARRAY_LENGTH};
use crate::error::CollectionResult;

/// A shared lender of backing buffers.
///
/// Buffers are keyed by element type and minimum size. A rented buffer is
/// always empty (`len() == 0`) but its capacity may exceed the request;
/// containers track their logical length themselves and may use the slack
/// as scratch space.
///
/// # Thread Safety
///
/// Implementations must tolerate concurrent rent/return from unrelated
/// containers. The containers themselves are single-writer.
///
/// # Example
///
/// ```rust,ignore
/// let arena = SharedArena::global();
/// let buffer: Vec<u32> = arena.rent(100);
/// assert!(buffer.capacity() >= 100);
/// arena.give_back(buffer)?;
/// ```
pub trait Arena: Clone {
    /// Rents an empty buffer with capacity of at least `min_len`.
    ///
    /// A request for zero elements returns an unallocated buffer.
    fn rent<T: Send + 'static>(&self, min_len: usize) -> Vec<T>;

    /// Returns a buffer to the arena. Live values are dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::BufferRejected`](crate::CollectionError::BufferRejected)
    /// if the buffer did not come from this arena's size classes.
    fn give_back<T: Send + 'static>(&self, buffer: Vec<T>) -> CollectionResult<()>;

    /// Upper bound for any container capacity.
    fn max_array_length(&self) -> usize {
        DEFAULT_MAX_ARRAY_LENGTH
    }

    /// Collision hops during one map insert that trigger randomized hashing.
    fn hash_collision_threshold(&self) -> usize {
        DEFAULT_HASH_COLLISION_THRESHOLD
    }
}

/// Best-effort return of a buffer; a refusal only costs pool efficiency.
pub(crate) fn release<T: Send + 'static, A: Arena>(arena: &A, buffer: Vec<T>) {
    let capacity = buffer.capacity();
    if capacity == 0 {
        return;
    }
    if let Err(error) = arena.give_back(buffer) {
        tracing::debug!(capacity, %error, "arena declined returned buffer");
    }
}

/// Moves `source` into a freshly rented buffer and releases the old one.
pub(crate) fn relocate<T: Send + 'static, A: Arena>(
    arena: &A,
    source: &mut Vec<T>,
    new_capacity: usize,
) {
    let mut fresh = arena.rent(new_capacity);
    fresh.extend(source.drain(..));
    let old = std::mem::replace(source, fresh);
    release(arena, old);
}

/// An arena that allocates exactly what is asked and frees on return.
///
/// Useful where exact capacities matter (tests, one-shot tools) or where
/// sharing buffers between owners is undesirable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnpooledArena;

impl Arena for UnpooledArena {
    fn rent<T: Send + 'static>(&self, min_len: usize) -> Vec<T> {
        Vec::with_capacity(min_len)
    }

    fn give_back<T: Send + 'static>(&self, buffer: Vec<T>) -> CollectionResult<()> {
        drop(buffer);
        Ok(())
    }
}
