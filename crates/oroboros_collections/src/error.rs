//! # Collection Error Types
//!
//! All errors that can occur in the pooled collections.
//!
//! Three families share the enum:
//! - **Usage errors** (bad capacity, index or range) are raised at the call
//!   that violates the precondition.
//! - **State errors** (missing key, duplicate key, empty container) have a
//!   non-failing `try_*` twin on every container.
//! - **Integrity errors** are always [`CollectionError::ConcurrentModification`].

use thiserror::Error;

/// Errors that can occur in the pooled collections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// Requested capacity exceeds the maximum array length.
    #[error("capacity {requested} exceeds the maximum array length {max}")]
    CapacityOverflow {
        /// The requested capacity.
        requested: usize,
        /// The configured maximum.
        max: usize,
    },

    /// Requested capacity is smaller than the number of stored items.
    #[error("capacity {requested} is smaller than the current length {len}")]
    CapacityBelowLength {
        /// The requested capacity.
        requested: usize,
        /// Number of live items.
        len: usize,
    },

    /// Index outside the logical contents.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Logical length at the time of the call.
        len: usize,
    },

    /// Sub-range outside the logical contents.
    #[error("range starting at {start} with {count} items is out of bounds for length {len}")]
    RangeOutOfBounds {
        /// First index of the range.
        start: usize,
        /// Number of items in the range.
        count: usize,
        /// Logical length at the time of the call.
        len: usize,
    },

    /// Destination slice cannot hold the copied items.
    #[error("destination too small: need {required}, have {available}")]
    DestinationTooSmall {
        /// Slots required.
        required: usize,
        /// Slots available.
        available: usize,
    },

    /// Strict insert found the key already present.
    #[error("an item with the same key has already been added")]
    DuplicateKey,

    /// Strict lookup did not find the key.
    #[error("the given key was not present in the map")]
    KeyNotFound,

    /// Pop, peek or dequeue on an empty container.
    #[error("collection is empty")]
    Empty,

    /// The container changed under an enumerator, or a bucket chain is
    /// longer than the table (corrupted by an unsynchronized writer).
    #[error("collection was modified during the operation; it cannot continue")]
    ConcurrentModification,

    /// The arena refused a returned buffer.
    #[error("arena rejected a buffer of capacity {capacity}")]
    BufferRejected {
        /// Capacity of the refused buffer.
        capacity: usize,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Field stream ended before a field was complete.
    #[error("unexpected end of field data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the field needs.
        needed: usize,
        /// Bytes left in the stream.
        remaining: usize,
    },

    /// Stored comparer tag has no known strategy.
    #[error("unknown key comparer tag {0}")]
    UnknownComparer(u32),

    /// Stored length or index is negative or exceeds the limits.
    #[error("invalid stored length or index {0}")]
    InvalidLength(i64),

    /// A string field is not valid UTF-8.
    #[error("string field is not valid utf-8")]
    InvalidUtf8,
}

/// Result type for collection operations.
pub type CollectionResult<T> = Result<T, CollectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let error = CollectionError::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(error.to_string(), "index 7 out of range for length 3");

        let error = CollectionError::BufferRejected { capacity: 33 };
        assert!(error.to_string().contains("33"));
    }
}
