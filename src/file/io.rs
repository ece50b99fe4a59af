//! Low-level byte order and safe reading utilities for DEX parsing.
//!
//! This module provides endian-aware, bounds-checked reads of primitive types from byte
//! buffers. It is the foundation every other reader in the crate builds on.
//!
//! # Key Components
//!
//! - [`crate::file::io::DexIO`] - Trait for primitive types that can be decoded from bytes
//! - [`crate::file::io::Endian`] - The byte order a DEX file declares in its header
//! - [`crate::file::io::read_le_at`] / [`crate::file::io::read_be_at`] - Typed reads with auto-advance
//! - [`crate::file::io::read_at`] - Typed read in a runtime-selected byte order
//! - [`crate::file::io::read_sized_at`] - Variable width (1-8 byte) reads used by encoded values
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use dexscope::file::io::{read_le_at, read_sized_at, Endian};
//!
//! let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x7F];
//! let mut offset = 0;
//!
//! let first: u16 = read_le_at(&data, &mut offset)?;  // offset: 0 -> 2
//! let second: u32 = read_le_at(&data, &mut offset)?; // offset: 2 -> 6
//! assert_eq!((first, second), (1, 2));
//!
//! // 3-byte read, as used by encoded values
//! let value = read_sized_at(&data, &mut offset, 3, Endian::Little)?;
//! assert_eq!(value, 0x7F_FFFF);
//! # Ok::<(), dexscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::TruncatedStream`] carrying the start offset of the
//! read when there are insufficient bytes left in the buffer.

use crate::Result;

/// Byte order of a DEX file, selected by the header's endian tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    /// Standard order, endian tag `0x12345678`
    #[default]
    Little,
    /// Byte-swapped order, endian tag `0x78563412`
    Big,
}

/// Trait for primitive types that can be decoded from a fixed number of bytes.
pub trait DexIO: Sized {
    /// Byte array type for this primitive
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Decode from big-endian bytes
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_dex_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl DexIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_dex_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Safely reads a value of type `T` in little-endian byte order from a data buffer at a
/// specific offset, advancing the offset past it.
///
/// # Errors
/// Returns [`crate::Error::TruncatedStream`] if there are insufficient bytes.
pub fn read_le_at<T: DexIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_le_bytes(bytes))
}

/// Safely reads a value of type `T` in big-endian byte order from a data buffer at a specific
/// offset, advancing the offset past it.
///
/// # Errors
/// Returns [`crate::Error::TruncatedStream`] if there are insufficient bytes.
pub fn read_be_at<T: DexIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_be_bytes(bytes))
}

/// Reads a value of type `T` in the given byte order.
///
/// # Errors
/// Returns [`crate::Error::TruncatedStream`] if there are insufficient bytes.
pub fn read_at<T: DexIO>(data: &[u8], offset: &mut usize, endian: Endian) -> Result<T> {
    match endian {
        Endian::Little => read_le_at(data, offset),
        Endian::Big => read_be_at(data, offset),
    }
}

/// Reads an unsigned integer of `width` bytes (1 to 8) in the given byte order and
/// zero-extends it to 64 bits.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for a width outside `1..=8` and
/// [`crate::Error::TruncatedStream`] if there are insufficient bytes.
pub fn read_sized_at(data: &[u8], offset: &mut usize, width: usize, endian: Endian) -> Result<u64> {
    if width == 0 || width > 8 {
        return Err(malformed_error!(
            *offset,
            "Invalid integer width - {}",
            width
        ));
    }

    let start = *offset;
    let Some(end) = start.checked_add(width) else {
        return Err(truncated_error!(start, width));
    };
    if end > data.len() {
        return Err(truncated_error!(start, width));
    }

    let bytes = &data[start..end];
    let value = match endian {
        Endian::Little => bytes
            .iter()
            .rev()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)),
        Endian::Big => bytes
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)),
    };

    *offset = end;
    Ok(value)
}

/// Sign-extends the low `width` bytes of `value` to a 64-bit signed integer.
#[must_use]
pub fn sign_extend(value: u64, width: usize) -> i64 {
    if width == 0 || width >= 8 {
        #[allow(clippy::cast_possible_wrap)]
        return value as i64;
    }

    let shift = 64 - width * 8;
    #[allow(clippy::cast_possible_wrap)]
    let signed = (value << shift) as i64;
    signed >> shift
}

fn take<T: DexIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let start = *offset;
    let Some(end) = start.checked_add(type_len) else {
        return Err(truncated_error!(start, type_len));
    };
    if end > data.len() {
        return Err(truncated_error!(start, type_len));
    }

    let Ok(read) = data[start..end].try_into() else {
        return Err(truncated_error!(start, type_len));
    };

    *offset = end;
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let mut offset = 0;
        let result = read_le_at::<u8>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x01);
        assert_eq!(offset, 1);
    }

    #[test]
    fn read_le_u16() {
        let mut offset = 0;
        let result = read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x0201);
        assert_eq!(offset, 2);
    }

    #[test]
    fn read_be_u32() {
        let mut offset = 0;
        let result = read_be_at::<u32>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x0102_0304);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_le_i64() {
        let mut offset = 0;
        let result = read_le_at::<i64>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_selected_order() {
        let mut offset = 0;
        assert_eq!(
            read_at::<u16>(&TEST_BUFFER, &mut offset, Endian::Little).unwrap(),
            0x0201
        );
        assert_eq!(
            read_at::<u16>(&TEST_BUFFER, &mut offset, Endian::Big).unwrap(),
            0x0304
        );
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_sized_widths() {
        for width in 1..=8 {
            let mut offset = 0;
            let value = read_sized_at(&TEST_BUFFER, &mut offset, width, Endian::Little).unwrap();
            let mut expected = [0u8; 8];
            expected[..width].copy_from_slice(&TEST_BUFFER[..width]);
            assert_eq!(value, u64::from_le_bytes(expected));
            assert_eq!(offset, width);
        }

        let mut offset = 0;
        let value = read_sized_at(&TEST_BUFFER, &mut offset, 3, Endian::Big).unwrap();
        assert_eq!(value, 0x01_0203);
    }

    #[test]
    fn read_sized_invalid() {
        let mut offset = 0;
        assert!(matches!(
            read_sized_at(&TEST_BUFFER, &mut offset, 0, Endian::Little),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            read_sized_at(&TEST_BUFFER, &mut offset, 9, Endian::Little),
            Err(Error::Malformed { .. })
        ));

        let mut offset = 6;
        assert!(matches!(
            read_sized_at(&TEST_BUFFER, &mut offset, 3, Endian::Little),
            Err(Error::TruncatedStream {
                offset: 6,
                needed: 3
            })
        ));
        assert_eq!(offset, 6);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0xFF, 1), -1);
        assert_eq!(sign_extend(0x7F, 1), 127);
        assert_eq!(sign_extend(0x80_0000, 3), -0x80_0000);
        assert_eq!(sign_extend(0x7F_FFFF, 3), 0x7F_FFFF);
        assert_eq!(sign_extend(0xFF_FFFF_FFFF, 5), -1);
        assert_eq!(sign_extend(u64::MAX, 8), -1);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF, 0xFF];

        let mut offset = 0;
        let result = read_le_at::<u64>(&buffer, &mut offset);
        assert!(matches!(
            result,
            Err(Error::TruncatedStream {
                offset: 0,
                needed: 8
            })
        ));

        let mut offset = usize::MAX;
        assert!(read_le_at::<u8>(&buffer, &mut offset).is_err());
    }
}
