//! # Version-Stamped Cursors
//!
//! Borrowing iterators (`iter()`) are checked by the compiler. A [`Cursor`]
//! is the detached alternative: it holds only a position and the version
//! stamp taken at creation, so the owner may mutate the container between
//! steps. The next step after any structural mutation fails with
//! [`CollectionError::ConcurrentModification`].
//!
//! This is a cooperative check, not a synchronization mechanism.
//!
//! ```rust,ignore
//! let mut cursor = list.cursor();
//! while let Some(item) = cursor.next(&list)? {
//!     println!("{item}");
//! }
//! ```

use crate::error::{CollectionError, CollectionResult};

/// A container that can be walked by a [`Cursor`].
pub trait Enumerable {
    /// Item produced per step.
    type Item<'a>
    where
        Self: 'a;

    /// Current version stamp; bumped on every structural mutation.
    fn version(&self) -> u32;

    /// Returns the item at or after `position` together with the position
    /// to resume from, or `None` once the contents are exhausted.
    fn item_at(&self, position: usize) -> Option<(Self::Item<'_>, usize)>;
}

/// Detached enumerator over an [`Enumerable`] container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor {
    position: usize,
    version: u32,
    finished: bool,
}

impl Cursor {
    /// Starts a cursor at the beginning of `source`.
    #[must_use]
    pub fn new<E: Enumerable + ?Sized>(source: &E) -> Self {
        Self {
            position: 0,
            version: source.version(),
            finished: false,
        }
    }

    /// Advances the cursor.
    ///
    /// Once exhausted, the cursor keeps returning `Ok(None)` as long as the
    /// container is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::ConcurrentModification`] if `source` was
    /// structurally modified since the cursor was created.
    pub fn next<'a, E: Enumerable + ?Sized>(
        &mut self,
        source: &'a E,
    ) -> CollectionResult<Option<E::Item<'a>>> {
        if source.version() != self.version {
            return Err(CollectionError::ConcurrentModification);
        }
        if self.finished {
            return Ok(None);
        }
        match source.item_at(self.position) {
            Some((item, resume)) => {
                self.position = resume;
                Ok(Some(item))
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Rewinds to the start and re-captures the version stamp.
    pub fn reset<E: Enumerable + ?Sized>(&mut self, source: &E) {
        *self = Self::new(source);
    }
}
