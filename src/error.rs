use thiserror::Error;

use crate::dex::{tables::TableId, typecode::TypeCode};

macro_rules! malformed_error {
    // Single string version
    ($offset:expr, $msg:expr) => {
        crate::Error::Malformed {
            offset: $offset,
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($offset:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            offset: $offset,
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! truncated_error {
    ($offset:expr, $needed:expr) => {
        crate::Error::TruncatedStream {
            offset: $offset,
            needed: $needed,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every structural variant carries the absolute byte offset (within the input buffer) at which
/// the problem was detected. For offset fields this is the position of the field itself, not the
/// location the field points to. Use [`Error::offset`] to retrieve it uniformly.
///
/// # Error Categories
///
/// ## Container errors
/// - [`Error::MalformedMagic`] - The file does not start with a DEX magic
/// - [`Error::UnsupportedEndianTag`] - The header endian tag is neither known constant
/// - [`Error::SectionSizeMismatch`] - A section does not fit the buffer, or header and map disagree
///
/// ## Primitive reader errors
/// - [`Error::TruncatedStream`] - Read past the end of the buffer
/// - [`Error::InvalidVarint`] - A LEB128 value did not terminate within 5 bytes
///
/// ## Cross-reference errors
/// - [`Error::IndexOutOfRange`] - An index field does not name a row of its target table
/// - [`Error::OffsetOutOfRange`] - An offset field points outside the buffer
/// - [`Error::HeapTypeMismatch`] - A heap offset was requested as two different item types
/// - [`Error::ReentrantHeapParse`] - A heap item (transitively) references itself
/// - [`Error::UnknownTypeCode`] - A type code has no known shape
///
/// # Examples
///
/// ```rust
/// use dexscope::{DexFile, Error};
///
/// match DexFile::decode(b"not a dex file at all") {
///     Err(Error::MalformedMagic { offset }) => assert_eq!(offset, 0),
///     Err(e) => panic!("unexpected error: {e}"),
///     Ok(_) => panic!("should not decode"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer does not start with the `dex\n` magic followed by a supported version.
    #[error("Malformed magic at offset 0x{offset:08x}")]
    MalformedMagic {
        /// Offset of the offending magic sequence
        offset: usize,
    },

    /// The header endian tag is neither the little-endian constant nor its byte-swapped form.
    #[error("Unsupported endian tag 0x{tag:08x} at offset 0x{offset:08x}")]
    UnsupportedEndianTag {
        /// The tag as read in little-endian order
        tag: u32,
        /// Offset of the endian tag field
        offset: usize,
    },

    /// A read would have run past the end of the buffer.
    #[error("Truncated stream - {needed} byte(s) needed at offset 0x{offset:08x}")]
    TruncatedStream {
        /// Offset at which the read started
        offset: usize,
        /// Number of bytes the read required
        needed: usize,
    },

    /// A LEB128 encoded value did not terminate within 5 bytes.
    #[error("Invalid LEB128 value at offset 0x{offset:08x}")]
    InvalidVarint {
        /// Offset of the first byte of the value
        offset: usize,
    },

    /// An index field does not reference a valid row of its target table.
    #[error("Index {index} out of range for {table} table ({len} rows) at offset 0x{offset:08x}")]
    IndexOutOfRange {
        /// The table the index points into
        table: TableId,
        /// The offending index
        index: u32,
        /// Number of rows in the target table
        len: u32,
        /// Offset of the index field
        offset: usize,
    },

    /// An offset field points outside of the buffer.
    #[error("Offset 0x{value:08x} exceeds buffer length {limit} at offset 0x{offset:08x}")]
    OffsetOutOfRange {
        /// The offending offset value
        value: u64,
        /// Length of the buffer
        limit: usize,
        /// Offset of the offset field
        offset: usize,
    },

    /// A section's declared extent does not fit, or the header and map list disagree on it.
    #[error("Section size mismatch for {section} at offset 0x{offset:08x}: {message}")]
    SectionSizeMismatch {
        /// Name of the affected section
        section: &'static str,
        /// Details on the mismatch
        message: String,
        /// Offset of the field that declared the section
        offset: usize,
    },

    /// A heap offset was already decoded as a different item type.
    #[error("Heap item at 0x{target:08x} is {found}, expected {expected} (referenced at offset 0x{offset:08x})")]
    HeapTypeMismatch {
        /// Offset of the heap item
        target: u32,
        /// Type the caller expected
        expected: TypeCode,
        /// Type recorded for the heap item
        found: TypeCode,
        /// Offset of the field holding the reference
        offset: usize,
    },

    /// A heap item was referenced again while it was still being decoded.
    #[error("Re-entrant parse of heap item at 0x{target:08x} (referenced at offset 0x{offset:08x})")]
    ReentrantHeapParse {
        /// Offset of the heap item
        target: u32,
        /// Offset of the field holding the reference
        offset: usize,
    },

    /// A type code that is not known, or that has no data heap shape.
    #[error("Unknown type code 0x{code:04x} at offset 0x{offset:08x}")]
    UnknownTypeCode {
        /// The raw type code
        code: u16,
        /// Offset at which the code was encountered
        offset: usize,
    },

    /// A heap offset was looked up that was never decoded.
    #[error("No heap item has been decoded at offset 0x{offset:08x}")]
    UnresolvedOffset {
        /// The requested heap offset
        offset: usize,
    },

    /// The file is damaged and could not be parsed.
    ///
    /// Covers well-formedness violations that have no dedicated variant (invalid MUTF-8,
    /// unknown encoded value kinds, overflowing delta sums). The error includes the source
    /// location where the malformation was detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message} (offset 0x{offset:08x})")]
    Malformed {
        /// Offset at which the malformation was detected
        offset: usize,
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Nested encoded values exceeded the configured depth.
    #[error("Reach the maximum recursion level allowed - {limit} (offset 0x{offset:08x})")]
    RecursionLimit {
        /// The configured limit
        limit: usize,
        /// Offset of the value that exceeded it
        offset: usize,
    },

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while opening or mapping an input file.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

impl Error {
    /// Returns the absolute byte offset at which this error was detected.
    ///
    /// Returns `None` for errors that are not tied to a buffer position (I/O, empty input).
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::MalformedMagic { offset }
            | Error::UnsupportedEndianTag { offset, .. }
            | Error::TruncatedStream { offset, .. }
            | Error::InvalidVarint { offset }
            | Error::IndexOutOfRange { offset, .. }
            | Error::OffsetOutOfRange { offset, .. }
            | Error::SectionSizeMismatch { offset, .. }
            | Error::HeapTypeMismatch { offset, .. }
            | Error::ReentrantHeapParse { offset, .. }
            | Error::UnknownTypeCode { offset, .. }
            | Error::UnresolvedOffset { offset }
            | Error::Malformed { offset, .. }
            | Error::RecursionLimit { offset, .. } => Some(*offset),
            Error::Empty | Error::FileError(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_reported() {
        let err = Error::InvalidVarint { offset: 0x40 };
        assert_eq!(err.offset(), Some(0x40));

        let err = malformed_error!(0x10, "bad value - {}", 7);
        assert_eq!(err.offset(), Some(0x10));
        assert!(err.to_string().contains("bad value - 7"));

        assert_eq!(Error::Empty.offset(), None);
    }

    #[test]
    fn display() {
        let err = Error::IndexOutOfRange {
            table: TableId::Strings,
            index: 9,
            len: 2,
            offset: 0x70,
        };
        assert_eq!(
            err.to_string(),
            "Index 9 out of range for strings table (2 rows) at offset 0x00000070"
        );

        let err = Error::HeapTypeMismatch {
            target: 0x200,
            expected: TypeCode::EncodedArrayItem,
            found: TypeCode::StringDataItem,
            offset: 0x9c,
        };
        assert!(err.to_string().contains("string_data_item"));
        assert!(err.to_string().contains("encoded_array_item"));
    }
}
