//! # Arena Configuration
//!
//! Tuning knobs for the shared arena and the container growth policy.
//! Loaded once at startup from TOML; every field has a default so a partial
//! file only overrides what it names.
//!
//! ```toml
//! max_pooled_length = 1048576
//! max_buffers_per_bucket = 32
//! hash_collision_threshold = 100
//! max_array_length = 2147483591
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CollectionError, CollectionResult};

/// Largest element count any backing buffer may hold.
///
/// Kept below `i32::MAX` so slot and bucket indices fit the map's `i32` links.
pub const DEFAULT_MAX_ARRAY_LENGTH: usize = 0x7FFF_FFC7;

/// Chain hops during one insert that trigger the randomized hash strategy.
pub const DEFAULT_HASH_COLLISION_THRESHOLD: usize = 100;

/// Largest buffer the shared arena retains for reuse.
pub const DEFAULT_MAX_POOLED_LENGTH: usize = 1 << 20;

/// Buffers kept per (element type, size class) bucket.
pub const DEFAULT_MAX_BUFFERS_PER_BUCKET: usize = 32;

/// Smallest size class handed out by the shared arena.
pub const MIN_POOLED_LENGTH: usize = 16;

/// Configuration for a [`SharedArena`](crate::memory::SharedArena).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Buffers above this element count are allocated exactly and dropped on
    /// return. Must be a power of two.
    pub max_pooled_length: usize,
    /// Retained buffers per bucket; extra returns are dropped.
    pub max_buffers_per_bucket: usize,
    /// Collision hops before the map switches to randomized hashing.
    pub hash_collision_threshold: usize,
    /// Upper bound for any container capacity.
    pub max_array_length: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_pooled_length: DEFAULT_MAX_POOLED_LENGTH,
            max_buffers_per_bucket: DEFAULT_MAX_BUFFERS_PER_BUCKET,
            hash_collision_threshold: DEFAULT_HASH_COLLISION_THRESHOLD,
            max_array_length: DEFAULT_MAX_ARRAY_LENGTH,
        }
    }
}

impl ArenaConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidConfig`] on syntax errors or values
    /// rejected by [`ArenaConfig::validate`].
    pub fn from_toml_str(text: &str) -> CollectionResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CollectionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidConfig`] if the file cannot be read
    /// or its contents are invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> CollectionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CollectionError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks the invariants the arena and containers rely on.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> CollectionResult<()> {
        if self.max_array_length == 0 || self.max_array_length > DEFAULT_MAX_ARRAY_LENGTH {
            return Err(CollectionError::InvalidConfig(format!(
                "max_array_length must be in 1..={DEFAULT_MAX_ARRAY_LENGTH}, got {}",
                self.max_array_length
            )));
        }
        if !self.max_pooled_length.is_power_of_two() || self.max_pooled_length < MIN_POOLED_LENGTH
        {
            return Err(CollectionError::InvalidConfig(format!(
                "max_pooled_length must be a power of two >= {MIN_POOLED_LENGTH}, got {}",
                self.max_pooled_length
            )));
        }
        if self.max_pooled_length > self.max_array_length {
            return Err(CollectionError::InvalidConfig(
                "max_pooled_length exceeds max_array_length".to_string(),
            ));
        }
        if self.max_buffers_per_bucket == 0 {
            return Err(CollectionError::InvalidConfig(
                "max_buffers_per_bucket must be positive".to_string(),
            ));
        }
        if self.hash_collision_threshold == 0 {
            return Err(CollectionError::InvalidConfig(
                "hash_collision_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
