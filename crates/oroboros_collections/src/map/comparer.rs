//! Pluggable key equality and hashing for [`PooledMap`](super::PooledMap).
//!
//! A comparer is part of a map's persisted state: its [`tag`](KeyComparer::tag)
//! is written with the map and resolved again on load.

use std::hash::{Hash, Hasher};

use rand::Rng;
use siphasher::sip::SipHasher13;

use crate::error::{CollectionError, CollectionResult};

/// Equality and hashing strategy for keys of type `K`.
///
/// `hash` must agree with `equals`: equal keys hash equally.
pub trait KeyComparer<K: ?Sized>: Clone {
    /// Returns true if the two keys are equal.
    fn equals(&self, left: &K, right: &K) -> bool;

    /// Hashes a key. Only the low 31 bits are used by the map.
    fn hash(&self, key: &K) -> u32;

    /// Persisted identifier of this strategy.
    fn tag(&self) -> u32;

    /// Returns a seeded variant used once an insert walks too many
    /// colliding entries, or `None` if this strategy cannot be reseeded.
    fn randomized(&self) -> Option<Self> {
        None
    }
}

/// A comparer that can be rebuilt from its persisted tag.
pub trait PersistentComparer<K: ?Sized>: KeyComparer<K> {
    /// Rebuilds the comparer for `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::UnknownComparer`] if `tag` names another
    /// strategy.
    fn from_tag(tag: u32) -> CollectionResult<Self>;
}

/// Tag of [`DefaultComparer`].
pub const DEFAULT_COMPARER_TAG: u32 = 0;

/// Tag of [`AsciiCaseInsensitiveComparer`].
pub const ASCII_CASE_INSENSITIVE_TAG: u32 = 1;

type SipKeys = Option<(u64, u64)>;

fn sip_hasher(keys: SipKeys) -> SipHasher13 {
    let (k0, k1) = keys.unwrap_or((0, 0));
    SipHasher13::new_with_keys(k0, k1)
}

#[allow(clippy::cast_possible_truncation)]
fn fold(hash: u64) -> u32 {
    (hash ^ (hash >> 32)) as u32
}

fn random_keys() -> SipKeys {
    let mut rng = rand::thread_rng();
    Some((rng.gen(), rng.gen()))
}

/// Natural equality with SipHash-1-3.
///
/// Unseeded by default so hashes are stable across runs. The randomized
/// variant keeps the same tag; its seed is never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultComparer {
    keys: SipKeys,
}

impl DefaultComparer {
    /// Returns true if this comparer uses a random seed.
    #[must_use]
    pub const fn is_randomized(&self) -> bool {
        self.keys.is_some()
    }
}

impl<K: Hash + Eq + ?Sized> KeyComparer<K> for DefaultComparer {
    #[inline]
    fn equals(&self, left: &K, right: &K) -> bool {
        left == right
    }

    #[inline]
    fn hash(&self, key: &K) -> u32 {
        let mut hasher = sip_hasher(self.keys);
        key.hash(&mut hasher);
        fold(hasher.finish())
    }

    fn tag(&self) -> u32 {
        DEFAULT_COMPARER_TAG
    }

    fn randomized(&self) -> Option<Self> {
        if self.is_randomized() {
            return None;
        }
        Some(Self {
            keys: random_keys(),
        })
    }
}

impl<K: Hash + Eq + ?Sized> PersistentComparer<K> for DefaultComparer {
    fn from_tag(tag: u32) -> CollectionResult<Self> {
        match tag {
            DEFAULT_COMPARER_TAG => Ok(Self::default()),
            other => Err(CollectionError::UnknownComparer(other)),
        }
    }
}

/// String keys compared without regard to ASCII case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AsciiCaseInsensitiveComparer {
    keys: SipKeys,
}

impl<K: AsRef<str> + ?Sized> KeyComparer<K> for AsciiCaseInsensitiveComparer {
    #[inline]
    fn equals(&self, left: &K, right: &K) -> bool {
        left.as_ref().eq_ignore_ascii_case(right.as_ref())
    }

    fn hash(&self, key: &K) -> u32 {
        let mut hasher = sip_hasher(self.keys);
        for byte in key.as_ref().bytes() {
            hasher.write_u8(byte.to_ascii_lowercase());
        }
        fold(hasher.finish())
    }

    fn tag(&self) -> u32 {
        ASCII_CASE_INSENSITIVE_TAG
    }

    fn randomized(&self) -> Option<Self> {
        if self.keys.is_some() {
            return None;
        }
        Some(Self {
            keys: random_keys(),
        })
    }
}

impl<K: AsRef<str> + ?Sized> PersistentComparer<K> for AsciiCaseInsensitiveComparer {
    fn from_tag(tag: u32) -> CollectionResult<Self> {
        match tag {
            ASCII_CASE_INSENSITIVE_TAG => Ok(Self::default()),
            other => Err(CollectionError::UnknownComparer(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_comparer_is_stable() {
        let comparer = DefaultComparer::default();
        assert_eq!(
            KeyComparer::<str>::hash(&comparer, "neon"),
            KeyComparer::<str>::hash(&comparer, "neon")
        );
        assert!(KeyComparer::<u32>::equals(&comparer, &4, &4));
    }

    #[test]
    fn test_randomized_only_once() {
        let comparer = DefaultComparer::default();
        let seeded = KeyComparer::<u32>::randomized(&comparer).unwrap();
        assert!(seeded.is_randomized());
        assert!(KeyComparer::<u32>::randomized(&seeded).is_none());
        assert_eq!(KeyComparer::<u32>::tag(&seeded), DEFAULT_COMPARER_TAG);
    }

    #[test]
    fn test_case_insensitive_agrees_with_hash() {
        let comparer = AsciiCaseInsensitiveComparer::default();
        assert!(KeyComparer::<str>::equals(&comparer, "Neon", "nEON"));
        assert_eq!(
            KeyComparer::<str>::hash(&comparer, "Neon"),
            KeyComparer::<str>::hash(&comparer, "nEON")
        );
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            <DefaultComparer as PersistentComparer<u32>>::from_tag(7),
            Err(CollectionError::UnknownComparer(7))
        );
        assert!(<AsciiCaseInsensitiveComparer as PersistentComparer<str>>::from_tag(1).is_ok());
    }
}
