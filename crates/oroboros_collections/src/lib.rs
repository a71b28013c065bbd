//! # OROBOROS Pooled Collections
//!
//! Standard container shapes whose backing storage is rented from a shared
//! arena instead of owned:
//! - [`PooledMap`]: chained hash table with prime sizing and a free list
//! - [`PooledList`]: growable contiguous array
//! - [`PooledQueue`]: ring-buffer FIFO
//! - [`PooledStack`]: array-backed LIFO
//!
//! ## Architecture Rules
//!
//! 1. **Rent, never own** - Buffers come from an [`Arena`] and go back on
//!    growth, trim, dispose and drop
//! 2. **Logical length is tracked apart** - Rented buffers may be larger
//!    than requested; the slack is never read as content
//! 3. **Fail fast** - A structural mutation invalidates every outstanding
//!    [`Cursor`]; a corrupt hash chain is an error, not a hang
//!
//! ## Example
//!
//! ```rust,ignore
//! use oroboros_collections::{PooledMap, PooledQueue};
//!
//! let mut map: PooledMap<String, u32> = PooledMap::with_capacity(64);
//! map.add("spawn".to_string(), 1)?;
//!
//! let mut queue: PooledQueue<u32> = PooledQueue::new();
//! queue.enqueue(7);
//! assert_eq!(queue.dequeue()?, 7);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod config;
pub mod cursor;
pub mod error;
pub mod list;
pub mod map;
pub mod memory;
pub mod queue;
pub mod stack;

pub use codec::{FieldCodec, FieldMapped, FieldReader, FieldWriter};
pub use config::ArenaConfig;
pub use cursor::{Cursor, Enumerable};
pub use error::{CollectionError, CollectionResult};
pub use list::PooledList;
pub use map::{
    AsciiCaseInsensitiveComparer, DefaultComparer, InsertionBehavior, KeyComparer,
    PersistentComparer, PooledMap,
};
pub use memory::{Arena, ArenaStats, SharedArena, UnpooledArena};
pub use queue::PooledQueue;
pub use stack::PooledStack;
