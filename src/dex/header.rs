//! The DEX file header.
//!
//! The header occupies the first `0x70` bytes of every DEX file. Besides the magic and the
//! integrity fields it holds an `(size, offset)` pair for each index table and for the data
//! section, which is everything the decoder needs to locate the rest of the file.
//!
//! # Layout
//!
//! | Offset | Field | Notes |
//! |--------|-------|-------|
//! | 0x00 | magic | `dex\n` + 3 digit version + NUL |
//! | 0x08 | checksum | Adler-32 of bytes `0x0C..` |
//! | 0x0C | signature | SHA-1 of bytes `0x20..` |
//! | 0x20 | file_size | |
//! | 0x24 | header_size | `0x70` |
//! | 0x28 | endian_tag | `0x12345678`, byte swapped for big-endian files |
//! | 0x2C | link | size, offset |
//! | 0x34 | map_off | |
//! | 0x38 | string_ids | size, offset |
//! | 0x40 | type_ids | size, offset |
//! | 0x48 | proto_ids | size, offset |
//! | 0x50 | field_ids | size, offset |
//! | 0x58 | method_ids | size, offset |
//! | 0x60 | class_defs | size, offset |
//! | 0x68 | data | size, offset |

use sha1::{Digest, Sha1};

use crate::{
    file::{io::Endian, parser::Parser},
    Error, Result,
};

/// Size of the header as defined by the format.
pub const HEADER_SIZE: usize = 0x70;

/// Endian tag of files in little-endian byte order.
pub const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// Endian tag of files in big-endian byte order, as read in little-endian order.
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x7856_3412;

/// Sentinel for absent 32-bit index fields.
pub const NO_INDEX: u32 = 0xFFFF_FFFF;

/// The DEX format versions this crate decodes.
pub const SUPPORTED_VERSIONS: [u32; 6] = [35, 37, 38, 39, 40, 41];

const DEX_MAGIC: &[u8; 4] = b"dex\n";

pub(crate) const CHECKSUM_OFFSET: usize = 0x08;
pub(crate) const SIGNATURE_OFFSET: usize = 0x0C;
pub(crate) const FILE_SIZE_OFFSET: usize = 0x20;
pub(crate) const HEADER_SIZE_OFFSET: usize = 0x24;
pub(crate) const ENDIAN_TAG_OFFSET: usize = 0x28;
pub(crate) const MAP_OFF_OFFSET: usize = 0x34;
pub(crate) const STRING_IDS_OFFSET: usize = 0x38;
pub(crate) const TYPE_IDS_OFFSET: usize = 0x40;
pub(crate) const PROTO_IDS_OFFSET: usize = 0x48;
pub(crate) const FIELD_IDS_OFFSET: usize = 0x50;
pub(crate) const METHOD_IDS_OFFSET: usize = 0x58;
pub(crate) const CLASS_DEFS_OFFSET: usize = 0x60;
pub(crate) const DATA_OFFSET: usize = 0x68;

/// A `(size, offset)` pair describing a region of the file.
///
/// For index tables `size` counts entries, for the link and data sections it counts bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Section {
    /// Number of entries (or bytes)
    pub size: u32,
    /// Absolute offset of the first entry
    pub offset: u32,
}

impl Section {
    /// `true` if the section has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of bytes covered by the section when each entry is `stride` bytes long.
    #[must_use]
    pub fn byte_len(&self, stride: usize) -> Option<usize> {
        (self.size as usize).checked_mul(stride)
    }

    /// `true` if `offset` lies within a byte sized section.
    #[must_use]
    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.offset && u64::from(offset) < u64::from(self.offset) + u64::from(self.size)
    }

    /// Checks that the section fits into a buffer of `limit` bytes.
    ///
    /// `field_pos` is the position of the `size` field; the `offset` field follows it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OffsetOutOfRange`] if the section starts outside the buffer and
    /// [`crate::Error::SectionSizeMismatch`] if it runs past its end.
    pub fn validate(
        &self,
        name: &'static str,
        stride: usize,
        field_pos: usize,
        limit: usize,
    ) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let start = self.offset as usize;
        if start >= limit {
            return Err(Error::OffsetOutOfRange {
                value: u64::from(self.offset),
                limit,
                offset: field_pos + 4,
            });
        }

        match self.byte_len(stride).and_then(|len| start.checked_add(len)) {
            Some(end) if end <= limit => Ok(()),
            _ => Err(Error::SectionSizeMismatch {
                section: name,
                message: format!(
                    "{} entries of {} bytes at 0x{:08x} exceed the buffer length {}",
                    self.size, stride, self.offset, limit
                ),
                offset: field_pos,
            }),
        }
    }
}

/// The decoded DEX header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// The raw magic, `dex\n0NN\0`
    pub magic: [u8; 8],
    /// Format version taken from the magic (e.g. `35`, `39`)
    pub version: u32,
    /// Adler-32 checksum of the file, excluding the magic and this field
    pub checksum: u32,
    /// SHA-1 signature of the file, excluding magic, checksum and this field
    pub signature: [u8; 20],
    /// Size of the entire file in bytes
    pub file_size: u32,
    /// Size of the header in bytes
    pub header_size: u32,
    /// The endian tag as stored
    pub endian_tag: u32,
    /// Byte order selected by the endian tag
    pub endian: Endian,
    /// Link section, unused by the format itself
    pub link: Section,
    /// Offset of the map list
    pub map_off: u32,
    /// String identifiers
    pub string_ids: Section,
    /// Type identifiers
    pub type_ids: Section,
    /// Method prototype identifiers
    pub proto_ids: Section,
    /// Field identifiers
    pub field_ids: Section,
    /// Method identifiers
    pub method_ids: Section,
    /// Class definitions
    pub class_defs: Section,
    /// Data section, in bytes
    pub data: Section,
}

impl Header {
    /// Decodes the header at the start of `data` and checks every section against the
    /// buffer length.
    ///
    /// # Errors
    /// - [`crate::Error::MalformedMagic`] if the magic or version is wrong
    /// - [`crate::Error::TruncatedStream`] if the buffer is shorter than a header
    /// - [`crate::Error::UnsupportedEndianTag`] for an unknown endian tag
    /// - [`crate::Error::SectionSizeMismatch`] / [`crate::Error::OffsetOutOfRange`] for
    ///   sections that do not fit the buffer
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dexscope::{dex::header::Header, Error};
    ///
    /// let result = Header::read(b"PK\x03\x04 this is a zip");
    /// assert!(matches!(result, Err(Error::MalformedMagic { offset: 0 })));
    /// ```
    pub fn read(data: &[u8]) -> Result<Header> {
        let (magic, version) = Self::read_magic(data)?;
        if data.len() < HEADER_SIZE {
            return Err(truncated_error!(0, HEADER_SIZE));
        }

        let mut parser = Parser::new(data);
        parser.seek(ENDIAN_TAG_OFFSET)?;
        let endian_tag = parser.read_le::<u32>()?;
        let endian = match endian_tag {
            ENDIAN_CONSTANT => Endian::Little,
            REVERSE_ENDIAN_CONSTANT => Endian::Big,
            tag => {
                return Err(Error::UnsupportedEndianTag {
                    tag,
                    offset: ENDIAN_TAG_OFFSET,
                })
            }
        };

        let mut parser = Parser::at(data, CHECKSUM_OFFSET, endian)?;
        let checksum = parser.read::<u32>()?;

        let mut signature = [0u8; 20];
        signature.copy_from_slice(parser.read_bytes(20)?);

        let file_size = parser.read::<u32>()?;
        let header_size = parser.read::<u32>()?;
        parser.advance_by(4)?;

        let link = Self::read_section(&mut parser)?;
        let map_off = parser.read::<u32>()?;
        let string_ids = Self::read_section(&mut parser)?;
        let type_ids = Self::read_section(&mut parser)?;
        let proto_ids = Self::read_section(&mut parser)?;
        let field_ids = Self::read_section(&mut parser)?;
        let method_ids = Self::read_section(&mut parser)?;
        let class_defs = Self::read_section(&mut parser)?;
        let data_section = Self::read_section(&mut parser)?;

        if (header_size as usize) < HEADER_SIZE {
            return Err(Error::SectionSizeMismatch {
                section: "header",
                message: format!("header_size {header_size} is smaller than 0x70"),
                offset: HEADER_SIZE_OFFSET,
            });
        }

        if file_size as usize > data.len() {
            return Err(Error::SectionSizeMismatch {
                section: "file",
                message: format!(
                    "file_size {} exceeds the buffer length {}",
                    file_size,
                    data.len()
                ),
                offset: FILE_SIZE_OFFSET,
            });
        }

        let limit = data.len();
        link.validate("link", 1, 0x2C, limit)?;
        string_ids.validate("string_ids", 4, STRING_IDS_OFFSET, limit)?;
        type_ids.validate("type_ids", 4, TYPE_IDS_OFFSET, limit)?;
        proto_ids.validate("proto_ids", 12, PROTO_IDS_OFFSET, limit)?;
        field_ids.validate("field_ids", 8, FIELD_IDS_OFFSET, limit)?;
        method_ids.validate("method_ids", 8, METHOD_IDS_OFFSET, limit)?;
        class_defs.validate("class_defs", 32, CLASS_DEFS_OFFSET, limit)?;
        data_section.validate("data", 1, DATA_OFFSET, limit)?;

        if map_off as usize >= limit {
            return Err(Error::OffsetOutOfRange {
                value: u64::from(map_off),
                limit,
                offset: MAP_OFF_OFFSET,
            });
        }

        Ok(Header {
            magic,
            version,
            checksum,
            signature,
            file_size,
            header_size,
            endian_tag,
            endian,
            link,
            map_off,
            string_ids,
            type_ids,
            proto_ids,
            field_ids,
            method_ids,
            class_defs,
            data: data_section,
        })
    }

    fn read_magic(data: &[u8]) -> Result<([u8; 8], u32)> {
        let prefix = &data[..data.len().min(4)];
        if prefix != &DEX_MAGIC[..prefix.len()] {
            return Err(Error::MalformedMagic { offset: 0 });
        }

        if data.len() < 8 {
            return Err(truncated_error!(0, 8));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&data[..8]);
        if magic[7] != 0 || !magic[4..7].iter().all(u8::is_ascii_digit) {
            return Err(Error::MalformedMagic { offset: 0 });
        }

        let version = magic[4..7]
            .iter()
            .fold(0u32, |acc, digit| acc * 10 + u32::from(digit - b'0'));
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(Error::MalformedMagic { offset: 0 });
        }

        Ok((magic, version))
    }

    fn read_section(parser: &mut Parser<'_>) -> Result<Section> {
        Ok(Section {
            size: parser.read::<u32>()?,
            offset: parser.read::<u32>()?,
        })
    }

    /// The checksum computed over `data`, to compare against [`Header::checksum`].
    #[must_use]
    pub fn compute_checksum(&self, data: &[u8]) -> u32 {
        let end = (self.file_size as usize).min(data.len());
        adler32(data.get(SIGNATURE_OFFSET..end).unwrap_or_default())
    }

    /// The signature computed over `data`, to compare against [`Header::signature`].
    #[must_use]
    pub fn compute_signature(&self, data: &[u8]) -> [u8; 20] {
        let end = (self.file_size as usize).min(data.len());
        sha1_signature(data.get(FILE_SIZE_OFFSET..end).unwrap_or_default())
    }
}

/// Adler-32 as used by the DEX checksum.
#[must_use]
pub fn adler32(bytes: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    // Largest n such that 255n(n+1)/2 + (n+1)(MOD_ADLER-1) fits in u32
    const NMAX: usize = 5552;

    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in bytes.chunks(NMAX) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }

    (b << 16) | a
}

/// SHA-1 digest as used by the DEX signature.
#[must_use]
pub fn sha1_signature(bytes: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::DexBuilder;

    #[test]
    fn adler() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);

        let long: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8 ^ 0xA5).collect();
        let (mut a, mut b) = (1u64, 0u64);
        for &byte in &long {
            a = (a + u64::from(byte)) % 65521;
            b = (b + a) % 65521;
        }
        assert_eq!(u64::from(adler32(&long)), (b << 16) | a);
    }

    #[test]
    fn sha1() {
        assert_eq!(
            sha1_signature(b"abc"),
            [
                0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78,
                0x50, 0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d
            ]
        );
    }

    #[test]
    fn magic() {
        assert!(matches!(
            Header::read(b"dey\n035\0"),
            Err(Error::MalformedMagic { offset: 0 })
        ));
        assert!(matches!(
            Header::read(b"dex\n0x5\0"),
            Err(Error::MalformedMagic { offset: 0 })
        ));
        assert!(matches!(
            Header::read(b"dex\n036\0"),
            Err(Error::MalformedMagic { offset: 0 })
        ));
        assert!(matches!(
            Header::read(b"dex\n035"),
            Err(Error::TruncatedStream { offset: 0, needed: 8 })
        ));
        assert!(matches!(
            Header::read(b"dex\n035\0 too short"),
            Err(Error::TruncatedStream {
                needed: HEADER_SIZE,
                ..
            })
        ));
    }

    #[test]
    fn little_endian() {
        let image = DexBuilder::new().class("LFoo;").build();
        let header = Header::read(&image).unwrap();

        assert_eq!(header.version, 35);
        assert_eq!(header.endian, Endian::Little);
        assert_eq!(header.endian_tag, ENDIAN_CONSTANT);
        assert_eq!(header.file_size as usize, image.len());
        assert_eq!(header.header_size as usize, HEADER_SIZE);
        assert_eq!(header.string_ids.size, 1);
        assert_eq!(header.string_ids.offset, 0x70);
        assert_eq!(header.class_defs.size, 1);
        assert_eq!(header.compute_checksum(&image), header.checksum);
        assert_eq!(header.compute_signature(&image), header.signature);
    }

    #[test]
    fn big_endian() {
        let image = DexBuilder::new()
            .endian(Endian::Big)
            .class("LFoo;")
            .build();
        let header = Header::read(&image).unwrap();

        assert_eq!(header.endian, Endian::Big);
        assert_eq!(header.endian_tag, REVERSE_ENDIAN_CONSTANT);
        assert_eq!(header.file_size as usize, image.len());
        assert_eq!(header.string_ids.size, 1);
        assert_eq!(header.string_ids.offset, 0x70);
    }

    #[test]
    fn endian_tag() {
        let mut image = DexBuilder::new().class("LFoo;").build();
        image[ENDIAN_TAG_OFFSET..ENDIAN_TAG_OFFSET + 4].copy_from_slice(&[1, 2, 3, 4]);

        assert!(matches!(
            Header::read(&image),
            Err(Error::UnsupportedEndianTag {
                tag: 0x0403_0201,
                offset: ENDIAN_TAG_OFFSET
            })
        ));
    }

    #[test]
    fn sections() {
        let mut image = DexBuilder::new().class("LFoo;").build();
        let len = image.len() as u32;

        image[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 4].copy_from_slice(&(len + 1).to_le_bytes());
        assert!(matches!(
            Header::read(&image),
            Err(Error::SectionSizeMismatch {
                section: "file",
                offset: FILE_SIZE_OFFSET,
                ..
            })
        ));
        image[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 4].copy_from_slice(&len.to_le_bytes());

        image[TYPE_IDS_OFFSET..TYPE_IDS_OFFSET + 4].copy_from_slice(&0x4000_0000u32.to_le_bytes());
        assert!(matches!(
            Header::read(&image),
            Err(Error::SectionSizeMismatch {
                section: "type_ids",
                offset: TYPE_IDS_OFFSET,
                ..
            })
        ));
        image[TYPE_IDS_OFFSET..TYPE_IDS_OFFSET + 4].copy_from_slice(&1u32.to_le_bytes());

        image[PROTO_IDS_OFFSET..PROTO_IDS_OFFSET + 8]
            .copy_from_slice(&[1, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0x00]);
        assert!(matches!(
            Header::read(&image),
            Err(Error::OffsetOutOfRange {
                value: 0x00FF_FFFF,
                offset: 0x4C,
                ..
            })
        ));
    }

    #[test]
    fn section_helpers() {
        let section = Section {
            size: 0x10,
            offset: 0x100,
        };
        assert!(section.contains(0x100));
        assert!(section.contains(0x10F));
        assert!(!section.contains(0x110));
        assert!(!section.contains(0xFF));
        assert_eq!(section.byte_len(8), Some(0x80));
        assert!(section.validate("data", 1, DATA_OFFSET, 0x110).is_ok());
        assert!(section.validate("data", 1, DATA_OFFSET, 0x10F).is_err());
        assert!(Section::default().validate("data", 1, DATA_OFFSET, 0).is_ok());
    }
}
