//! Bounds-checked reads over advertisement payloads.
//!
//! Payloads come straight from an untrusted radio peer. Every fixed-offset
//! read goes through [`ByteReader`], which reports [`DecodeError`] instead of
//! reading past the end.

use thiserror::Error;

/// Failure to read a field from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The requested range lies (partly) outside the payload.
    #[error("read of {len} bytes at offset {offset} exceeds payload of {available} bytes")]
    OutOfBounds {
        /// Start of the requested range.
        offset: usize,
        /// Length of the requested range.
        len: usize,
        /// Bytes actually available.
        available: usize,
    },
}

/// Result alias for payload reads.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Read-only view over a payload with fixed-width accessors.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    /// Wraps a payload.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Payload length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for an empty payload.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrows `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfBounds`] if the range does not fit.
    pub fn slice(&self, offset: usize, len: usize) -> DecodeResult<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(DecodeError::OutOfBounds {
                offset,
                len,
                available: self.bytes.len(),
            })
    }

    /// Copies `N` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfBounds`] if the range does not fit.
    pub fn array<const N: usize>(&self, offset: usize) -> DecodeResult<[u8; N]> {
        let slice = self.slice(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Reads one unsigned byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfBounds`] past the end of the payload.
    pub fn u8_at(&self, offset: usize) -> DecodeResult<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    /// Reads one signed byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfBounds`] past the end of the payload.
    pub fn i8_at(&self, offset: usize) -> DecodeResult<i8> {
        Ok(i8::from_le_bytes(self.array::<1>(offset)?))
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfBounds`] past the end of the payload.
    pub fn u16_le_at(&self, offset: usize) -> DecodeResult<u16> {
        Ok(u16::from_le_bytes(self.array(offset)?))
    }

    /// Reads a big-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfBounds`] past the end of the payload.
    pub fn u16_be_at(&self, offset: usize) -> DecodeResult<u16> {
        Ok(u16::from_be_bytes(self.array(offset)?))
    }

    /// Reads a little-endian `i16`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfBounds`] past the end of the payload.
    pub fn i16_le_at(&self, offset: usize) -> DecodeResult<i16> {
        Ok(i16::from_le_bytes(self.array(offset)?))
    }

    /// Reads a big-endian `i16`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfBounds`] past the end of the payload.
    pub fn i16_be_at(&self, offset: usize) -> DecodeResult<i16> {
        Ok(i16::from_be_bytes(self.array(offset)?))
    }
}
