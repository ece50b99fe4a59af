//! LEB128 variable-length integer codecs.
//!
//! DEX stores most counts, deltas and in-item offsets as little-endian base 128 values:
//! seven payload bits per byte, low groups first, with the high bit of each byte signalling
//! that another byte follows. A 32-bit value needs at most 5 bytes.
//!
//! The free functions in this module decode at an explicit offset and report both the value
//! and the number of bytes consumed; [`crate::file::parser::Parser`] wraps them for cursor
//! based reading.
//!
//! # Examples
//!
//! ```rust,ignore
//! use dexscope::file::leb128::{sleb128, uleb128};
//!
//! assert_eq!(uleb128(&[0x80, 0x01], 0)?, (128, 2));
//! assert_eq!(sleb128(&[0x7F], 0)?, (-1, 1));
//! # Ok::<(), dexscope::Error>(())
//! ```

use crate::{Error, Result};

/// Maximum number of bytes a 32-bit LEB128 value may occupy.
pub const MAX_LEB128_LEN: usize = 5;

/// Decodes an unsigned LEB128 value starting at `offset`.
///
/// Returns the value and the number of bytes consumed (1 to 5). Bits beyond the 32nd in the
/// fifth byte are ignored.
///
/// # Errors
/// - [`crate::Error::InvalidVarint`] if the fifth byte still has its continuation bit set
/// - [`crate::Error::TruncatedStream`] if the buffer ends before the value terminates
pub fn uleb128(data: &[u8], offset: usize) -> Result<(u32, usize)> {
    let mut value = 0u32;

    for index in 0..MAX_LEB128_LEN {
        let Some(&byte) = data.get(offset.saturating_add(index)) else {
            return Err(truncated_error!(offset.saturating_add(index), 1));
        };

        value |= u32::from(byte & 0x7F).wrapping_shl(7 * index as u32);

        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }

    Err(Error::InvalidVarint { offset })
}

/// Decodes a signed LEB128 value starting at `offset`.
///
/// The value is sign-extended from bit 6 of the last byte read. Returns the value and the
/// number of bytes consumed (1 to 5).
///
/// # Errors
/// - [`crate::Error::InvalidVarint`] if the fifth byte still has its continuation bit set
/// - [`crate::Error::TruncatedStream`] if the buffer ends before the value terminates
pub fn sleb128(data: &[u8], offset: usize) -> Result<(i32, usize)> {
    let mut value = 0u32;

    for index in 0..MAX_LEB128_LEN {
        let Some(&byte) = data.get(offset.saturating_add(index)) else {
            return Err(truncated_error!(offset.saturating_add(index), 1));
        };

        let shift = 7 * index as u32;
        value |= u32::from(byte & 0x7F).wrapping_shl(shift);

        if byte & 0x80 == 0 {
            let used = shift + 7;
            if used < 32 && byte & 0x40 != 0 {
                value |= u32::MAX << used;
            }

            #[allow(clippy::cast_possible_wrap)]
            return Ok((value as i32, index + 1));
        }
    }

    Err(Error::InvalidVarint { offset })
}

/// Decodes a `uleb128p1` value: the stored value minus one, where a stored `0` means absent.
///
/// Returns `None` for the absent marker and the number of bytes consumed.
///
/// # Errors
/// Same as [`uleb128`].
pub fn uleb128p1(data: &[u8], offset: usize) -> Result<(Option<u32>, usize)> {
    let (value, len) = uleb128(data, offset)?;
    Ok((value.checked_sub(1), len))
}
