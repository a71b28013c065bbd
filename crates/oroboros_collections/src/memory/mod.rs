//! # Memory Management
//!
//! Rented backing storage for every pooled container.
//!
//! ## Design Philosophy
//!
//! Containers never own their allocations outright. They borrow buffers
//! from an [`Arena`] and hand them back on growth, trim or drop:
//! - No allocation once the pool is warm
//! - Buffers may be larger than requested; logical length is tracked apart
//! - A refused return is logged and forgotten, never an error for the caller

mod arena;
mod pool;

pub use arena::{Arena, UnpooledArena};
pub(crate) use arena::{release, relocate};
pub use pool::{ArenaStats, SharedArena};
