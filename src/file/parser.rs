//! Low-level byte stream parser for DEX structures.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser for reading DEX headers, index tables and data items. It offers bounds-checked access
//! with support for both byte orders a DEX file may declare, the LEB128 encodings used
//! throughout the data section, and variable width integer reads used by encoded values.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//! - [`crate::file::parser::Parser::align`] - Align to byte boundaries
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read`] - Read primitive types in the active byte order
//! - [`crate::file::parser::Parser::read_le`] / [`crate::file::parser::Parser::read_be`] - Fixed byte order
//! - [`crate::file::parser::Parser::read_fixed`] - 1 to 8 byte integers, signed or unsigned
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a slice of the underlying data
//!
//! ## Variable Length Methods
//! - [`crate::file::parser::Parser::read_uleb128`] - Unsigned LEB128
//! - [`crate::file::parser::Parser::read_sleb128`] - Signed LEB128
//! - [`crate::file::parser::Parser::read_uleb128p1`] - Unsigned LEB128 biased by one
//!
//! # Usage Examples
//!
//! ```rust
//! use dexscope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x80, 0x01, 0x7F];
//! let mut parser = Parser::new(&data);
//!
//! let value = parser.read::<u32>()?;
//! assert_eq!(value, 0x04030201);
//!
//! assert_eq!(parser.read_uleb128()?, 128);
//! assert_eq!(parser.read_sleb128()?, -1);
//! assert!(!parser.has_more_data());
//! # Ok::<(), dexscope::Error>(())
//! ```

use crate::{
    file::{
        io::{read_at, read_be_at, read_le_at, read_sized_at, sign_extend, DexIO, Endian},
        leb128,
    },
    Result,
};

/// A generic binary data parser for reading DEX structures.
///
/// `Parser` provides a cursor-based interface for reading binary data in the byte order
/// declared by a DEX header. It maintains an internal position cursor and provides bounds
/// checking to prevent buffer overruns when reading malformed or truncated data. Every error
/// it produces carries the absolute offset within the wrapped buffer.
///
/// Parsers are cheap to create; the data heap creates a fresh one positioned at each item it
/// decodes, so no cursor state is shared between unrelated items.
///
/// # Examples
///
/// ```rust
/// use dexscope::{Endian, Parser};
///
/// let data = [0x12, 0x34, 0x56, 0x78];
/// let mut parser = Parser::with_endian(&data, Endian::Big);
/// assert_eq!(parser.read::<u32>()?, 0x12345678);
/// # Ok::<(), dexscope::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
    /// Byte order applied by [`Parser::read`] and [`Parser::read_fixed`]
    endian: Endian,
}

impl<'a> Parser<'a> {
    /// Create a new little-endian [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dexscope::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04];
    /// let parser = Parser::new(&data);
    /// assert_eq!(parser.len(), 4);
    /// ```
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endian(data, Endian::Little)
    }

    /// Create a new parser reading in the given byte order.
    #[must_use]
    pub fn with_endian(data: &'a [u8], endian: Endian) -> Self {
        Parser {
            data,
            position: 0,
            endian,
        }
    }

    /// Create a new parser positioned at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OffsetOutOfRange`] if `offset` is not within the data.
    pub fn at(data: &'a [u8], offset: usize, endian: Endian) -> Result<Self> {
        let mut parser = Self::with_endian(data, endian);
        parser.seek(offset)?;
        Ok(parser)
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// The byte order used by [`Parser::read`] and [`Parser::read_fixed`].
    #[must_use]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OffsetOutOfRange`] if position is at or beyond the data length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dexscope::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04];
    /// let mut parser = Parser::new(&data);
    ///
    /// parser.seek(2)?;
    /// assert_eq!(parser.read::<u8>()?, 0x03);
    /// assert!(parser.seek(4).is_err());
    /// # Ok::<(), dexscope::Error>(())
    /// ```
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(crate::Error::OffsetOutOfRange {
                value: pos as u64,
                limit: self.data.len(),
                offset: self.position,
            });
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        self.calc_end_position(step)?;
        self.position += step;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the number of bytes between the cursor and the end of the data.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(truncated_error!(self.position, 1))
    }

    /// Execute a closure transactionally, rolling back the position on failure.
    ///
    /// # Errors
    /// Returns whatever error the closure produced.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }

    /// Align the position to a multiple of `alignment` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if the padding would exceed the data length.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a value of type `T` in the parser's byte order.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if there are insufficient bytes.
    pub fn read<T: DexIO>(&mut self) -> Result<T> {
        read_at::<T>(self.data, &mut self.position, self.endian)
    }

    /// Read a value of type `T` in little-endian byte order, regardless of the parser's order.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if there are insufficient bytes.
    pub fn read_le<T: DexIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a value of type `T` in big-endian byte order, regardless of the parser's order.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if there are insufficient bytes.
    pub fn read_be<T: DexIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Read an integer of `width` bytes (1 to 8) in the parser's byte order.
    ///
    /// Unsigned reads are zero-extended; signed reads are sign-extended from the most
    /// significant bit of the value, and returned as the two's complement bit pattern.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for widths outside `1..=8` and
    /// [`crate::Error::TruncatedStream`] if there are insufficient bytes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dexscope::Parser;
    /// let data = [0xFE, 0xFF, 0xFF, 0x34, 0x12];
    /// let mut parser = Parser::new(&data);
    ///
    /// assert_eq!(parser.read_fixed(3, true)? as i64, -2);
    /// assert_eq!(parser.read_fixed(2, false)?, 0x1234);
    /// # Ok::<(), dexscope::Error>(())
    /// ```
    pub fn read_fixed(&mut self, width: usize, signed: bool) -> Result<u64> {
        let value = read_sized_at(self.data, &mut self.position, width, self.endian)?;
        if signed {
            #[allow(clippy::cast_sign_loss)]
            return Ok(sign_extend(value, width) as u64);
        }

        Ok(value)
    }

    /// Read a signed integer of `width` bytes, sign-extended to 64 bits.
    ///
    /// # Errors
    /// See [`Parser::read_fixed`].
    pub fn read_sized_int(&mut self, width: usize) -> Result<i64> {
        #[allow(clippy::cast_possible_wrap)]
        Ok(self.read_fixed(width, true)? as i64)
    }

    /// Read an unsigned integer of `width` bytes, zero-extended to 64 bits.
    ///
    /// # Errors
    /// See [`Parser::read_fixed`].
    pub fn read_sized_uint(&mut self, width: usize) -> Result<u64> {
        self.read_fixed(width, false)
    }

    /// Read an unsigned LEB128 value.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidVarint`] if the value does not terminate within 5 bytes,
    /// [`crate::Error::TruncatedStream`] if the data ends first.
    pub fn read_uleb128(&mut self) -> Result<u32> {
        let (value, len) = leb128::uleb128(self.data, self.position)?;
        self.position += len;
        Ok(value)
    }

    /// Read a signed LEB128 value.
    ///
    /// # Errors
    /// See [`Parser::read_uleb128`].
    pub fn read_sleb128(&mut self) -> Result<i32> {
        let (value, len) = leb128::sleb128(self.data, self.position)?;
        self.position += len;
        Ok(value)
    }

    /// Read a `uleb128p1` value; a stored `0` decodes to `None`, a stored `n` to `Some(n - 1)`.
    ///
    /// # Errors
    /// See [`Parser::read_uleb128`].
    pub fn read_uleb128p1(&mut self) -> Result<Option<u32>> {
        let (value, len) = leb128::uleb128p1(self.data, self.position)?;
        self.position += len;
        Ok(value)
    }

    /// Check that `length` more bytes are available and return the resulting end position.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if the data is too short.
    pub fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(truncated_error!(self.position, length))?;

        if end > self.data.len() {
            return Err(truncated_error!(self.position, length));
        }

        Ok(end)
    }

    /// Read `length` raw bytes, borrowing them from the underlying data.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if the data is too short.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read bytes up to (not including) the next NUL byte, and consume the terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if no terminator is found.
    pub fn read_until_nul(&mut self) -> Result<&'a [u8]> {
        let start = self.position;
        let Some(len) = self.data[start.min(self.data.len())..]
            .iter()
            .position(|&byte| byte == 0)
        else {
            return Err(truncated_error!(start, self.remaining() + 1));
        };

        let bytes = &self.data[start..start + len];
        self.position = start + len + 1;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn navigation() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.pos(), 0);
        parser.advance_by(3).unwrap();
        assert_eq!(parser.pos(), 3);
        assert_eq!(parser.remaining(), 2);
        assert!(parser.advance_by(3).is_err());

        parser.seek(1).unwrap();
        assert_eq!(parser.peek_byte().unwrap(), 0x02);
        assert!(matches!(
            parser.seek(5),
            Err(Error::OffsetOutOfRange { value: 5, .. })
        ));
    }

    #[test]
    fn align() {
        let data = [0u8; 9];
        let mut parser = Parser::new(&data);
        parser.advance_by(1).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
        parser.advance_by(3).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 8);
    }

    #[test]
    fn endian_selection() {
        let data = [0x12, 0x34, 0x56, 0x78];

        let mut parser = Parser::new(&data);
        assert_eq!(parser.read::<u32>().unwrap(), 0x7856_3412);

        let mut parser = Parser::with_endian(&data, Endian::Big);
        assert_eq!(parser.read::<u32>().unwrap(), 0x1234_5678);

        let mut parser = Parser::with_endian(&data, Endian::Big);
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x3412);
        assert_eq!(parser.read_fixed(2, false).unwrap(), 0x5678);
    }

    #[test]
    fn fixed_width_reads() {
        let data = [0xFF, 0x80, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_sized_int(1).unwrap(), -1);
        assert_eq!(parser.read_sized_uint(3).unwrap(), 0x80);
        assert_eq!(parser.read_sized_int(5).unwrap(), 0x05_0403_0201);
        assert!(matches!(
            parser.read_sized_int(1),
            Err(Error::TruncatedStream { offset: 9, .. })
        ));
    }

    #[test]
    fn leb128_reads() {
        let data = [0x80, 0x01, 0x7F, 0x00, 0x05];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_uleb128().unwrap(), 128);
        assert_eq!(parser.read_sleb128().unwrap(), -1);
        assert_eq!(parser.read_uleb128p1().unwrap(), None);
        assert_eq!(parser.read_uleb128p1().unwrap(), Some(4));
        assert_eq!(parser.pos(), 5);
    }

    #[test]
    fn invalid_varint_keeps_position() {
        let data = [0x01, 0x80, 0x80, 0x80, 0x80, 0x80];
        let mut parser = Parser::new(&data);
        parser.advance_by(1).unwrap();

        assert!(matches!(
            parser.read_uleb128(),
            Err(Error::InvalidVarint { offset: 1 })
        ));
        assert_eq!(parser.pos(), 1);
    }

    #[test]
    fn transactional_rollback() {
        let data = [0x01, 0x02];
        let mut parser = Parser::new(&data);

        let result = parser.transactional(|p| {
            p.read::<u8>()?;
            p.read::<u32>()
        });
        assert!(result.is_err());
        assert_eq!(parser.pos(), 0);

        let result = parser.transactional(|p| p.read::<u16>());
        assert_eq!(result.unwrap(), 0x0201);
        assert_eq!(parser.pos(), 2);
    }

    #[test]
    fn bytes_and_nul() {
        let data = [b'a', b'b', 0x00, b'c', 0x01];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_until_nul().unwrap(), b"ab");
        assert_eq!(parser.pos(), 3);
        assert_eq!(parser.read_bytes(1).unwrap(), b"c");
        assert!(matches!(
            parser.read_until_nul(),
            Err(Error::TruncatedStream { offset: 4, .. })
        ));
        assert!(parser.read_bytes(2).is_err());
    }
}
