//! # Binary Field Mapping
//!
//! The field-by-field contract the save/load subsystem drives. Every pooled
//! container writes and reads the same sequence of fields, so one layout
//! serves both directions.
//!
//! ## Design
//!
//! - Pod scalars are copied with `bytemuck` in native byte order; the stream
//!   is an in-process save format, not a wire protocol
//! - Lengths and indices are `i32`, matching the containers' link width
//! - Truncated input is an error, never a panic

use bytemuck::Pod;

use crate::error::{CollectionError, CollectionResult};
use crate::memory::Arena;

/// Append-only field sink.
#[derive(Debug, Default, Clone)]
pub struct FieldWriter {
    bytes: Vec<u8>,
}

impl FieldWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the writer, returning the encoded fields.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Writes a Pod value directly.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.bytes.extend_from_slice(bytemuck::bytes_of(value));
    }

    /// Writes a length or index field.
    ///
    /// Container lengths never exceed the arena's maximum array length, which
    /// fits in an `i32`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    #[inline]
    pub fn write_len(&mut self, value: usize) {
        self.write_pod(&(value as i32));
    }

    /// Writes raw bytes with no length prefix.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}

/// Cursor over encoded fields.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> FieldReader<'a> {
    /// Creates a reader at the start of `bytes`.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Bytes not yet consumed.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Consumes `count` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::UnexpectedEof`] if fewer remain.
    pub fn read_bytes(&mut self, count: usize) -> CollectionResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(CollectionError::UnexpectedEof {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    /// Reads a Pod value.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::UnexpectedEof`] on truncated input.
    pub fn read_pod<T: Pod>(&mut self) -> CollectionResult<T> {
        let bytes = self.read_bytes(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Reads a length or index field and checks it against `max`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidLength`] if the stored value is
    /// negative or above `max`.
    pub fn read_len(&mut self, max: usize) -> CollectionResult<usize> {
        let raw: i32 = self.read_pod()?;
        usize::try_from(raw)
            .ok()
            .filter(|&value| value <= max)
            .ok_or(CollectionError::InvalidLength(i64::from(raw)))
    }

    /// Reads an element count for items that each take at least one byte.
    ///
    /// # Errors
    ///
    /// As [`FieldReader::read_len`], plus [`CollectionError::UnexpectedEof`]
    /// if the count cannot fit in the remaining input.
    pub fn read_count(&mut self, max: usize) -> CollectionResult<usize> {
        let count = self.read_len(max)?;
        if count > self.remaining() {
            return Err(CollectionError::UnexpectedEof {
                needed: count,
                remaining: self.remaining(),
            });
        }
        Ok(count)
    }
}

/// An element type that can be stored inside a mapped container.
///
/// Every encoding takes at least one byte.
pub trait FieldCodec: Sized {
    /// Appends the value.
    fn write_field(&self, writer: &mut FieldWriter);

    /// Reads one value.
    ///
    /// # Errors
    ///
    /// Returns a codec error on truncated or malformed input.
    fn read_field(reader: &mut FieldReader<'_>) -> CollectionResult<Self>;
}

macro_rules! impl_pod_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldCodec for $ty {
                #[inline]
                fn write_field(&self, writer: &mut FieldWriter) {
                    writer.write_pod(self);
                }

                #[inline]
                fn read_field(reader: &mut FieldReader<'_>) -> CollectionResult<Self> {
                    reader.read_pod()
                }
            }
        )*
    };
}

impl_pod_codec!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl FieldCodec for bool {
    fn write_field(&self, writer: &mut FieldWriter) {
        writer.write_pod(&u8::from(*self));
    }

    fn read_field(reader: &mut FieldReader<'_>) -> CollectionResult<Self> {
        match reader.read_pod::<u8>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CollectionError::InvalidLength(i64::from(other))),
        }
    }
}

impl FieldCodec for String {
    fn write_field(&self, writer: &mut FieldWriter) {
        writer.write_len(self.len());
        writer.write_bytes(self.as_bytes());
    }

    fn read_field(reader: &mut FieldReader<'_>) -> CollectionResult<Self> {
        let len = reader.read_count(usize::MAX)?;
        let bytes = reader.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CollectionError::InvalidUtf8)
    }
}

impl<T: FieldCodec> FieldCodec for Option<T> {
    fn write_field(&self, writer: &mut FieldWriter) {
        match self {
            Some(value) => {
                true.write_field(writer);
                value.write_field(writer);
            }
            None => false.write_field(writer),
        }
    }

    fn read_field(reader: &mut FieldReader<'_>) -> CollectionResult<Self> {
        if bool::read_field(reader)? {
            T::read_field(reader).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// A container with a save/load field layout.
pub trait FieldMapped<A: Arena>: Sized {
    /// Writes every field in layout order.
    fn write_fields(&self, writer: &mut FieldWriter);

    /// Rebuilds a container from fields, renting storage from `arena`.
    ///
    /// # Errors
    ///
    /// Returns a codec error on truncated or malformed input, or a container
    /// error if the decoded contents violate its invariants.
    fn read_fields(reader: &mut FieldReader<'_>, arena: A) -> CollectionResult<Self>;

    /// Encodes the container into a fresh byte vector.
    #[must_use]
    fn to_field_bytes(&self) -> Vec<u8> {
        let mut writer = FieldWriter::new();
        self.write_fields(&mut writer);
        writer.into_bytes()
    }

    /// Decodes a container from `bytes`.
    ///
    /// # Errors
    ///
    /// As [`FieldMapped::read_fields`].
    fn from_field_bytes(bytes: &[u8], arena: A) -> CollectionResult<Self> {
        Self::read_fields(&mut FieldReader::new(bytes), arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_fields() {
        let mut writer = FieldWriter::new();
        42u32.write_field(&mut writer);
        (-7i64).write_field(&mut writer);
        1.5f32.write_field(&mut writer);
        true.write_field(&mut writer);
        assert_eq!(writer.len(), 4 + 8 + 4 + 1);

        let bytes = writer.into_bytes();
        let mut reader = FieldReader::new(&bytes);
        assert_eq!(u32::read_field(&mut reader).unwrap(), 42);
        assert_eq!(i64::read_field(&mut reader).unwrap(), -7);
        assert!((f32::read_field(&mut reader).unwrap() - 1.5).abs() < f32::EPSILON);
        assert!(bool::read_field(&mut reader).unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_string_and_option_fields() {
        let mut writer = FieldWriter::new();
        "neon".to_string().write_field(&mut writer);
        Some(9u16).write_field(&mut writer);
        None::<u16>.write_field(&mut writer);

        let bytes = writer.into_bytes();
        let mut reader = FieldReader::new(&bytes);
        assert_eq!(String::read_field(&mut reader).unwrap(), "neon");
        assert_eq!(Option::<u16>::read_field(&mut reader).unwrap(), Some(9));
        assert_eq!(Option::<u16>::read_field(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_truncated_input() {
        let bytes = [1u8, 2];
        let mut reader = FieldReader::new(&bytes);
        assert_eq!(
            u32::read_field(&mut reader),
            Err(CollectionError::UnexpectedEof { needed: 4, remaining: 2 })
        );
    }

    #[test]
    fn test_negative_length_is_rejected() {
        let mut writer = FieldWriter::new();
        writer.write_pod(&-1i32);
        let bytes = writer.into_bytes();
        let mut reader = FieldReader::new(&bytes);
        assert_eq!(reader.read_len(100), Err(CollectionError::InvalidLength(-1)));
    }

    #[test]
    fn test_count_larger_than_input_is_rejected() {
        let mut writer = FieldWriter::new();
        writer.write_len(1000);
        let bytes = writer.into_bytes();
        let mut reader = FieldReader::new(&bytes);
        assert!(matches!(
            reader.read_count(usize::MAX),
            Err(CollectionError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = FieldWriter::new();
        writer.write_len(2);
        writer.write_bytes(&[0xff, 0xfe]);
        let bytes = writer.into_bytes();
        let mut reader = FieldReader::new(&bytes);
        assert_eq!(String::read_field(&mut reader), Err(CollectionError::InvalidUtf8));
    }
}
