use crate::{
    dex::{
        diagnostics::DiagnosticCategory,
        heap::{HeapBuilder, HeapValue},
    },
    file::parser::Parser,
    Result,
};

/// A `string_data_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringData {
    /// Length of the string in UTF-16 code units, as declared
    pub utf16_size: u32,
    /// The decoded string; unpaired surrogates are replaced by U+FFFD
    pub value: String,
}

impl std::fmt::Display for StringData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

pub(crate) fn decode(heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let start = parser.pos();
    let utf16_size = parser.read_uleb128()?;
    let bytes_pos = parser.pos();
    let bytes = parser.read_until_nul()?;
    let units = mutf8_units(bytes, bytes_pos)?;

    if units.len() != utf16_size as usize {
        heap.diagnostics().warning_at(
            DiagnosticCategory::String,
            start,
            format!(
                "String declares {} UTF-16 code units but holds {}",
                utf16_size,
                units.len()
            ),
        );
    }

    Ok(HeapValue::StringData(StringData {
        utf16_size,
        value: String::from_utf16_lossy(&units),
    }))
}

/// Decodes Modified UTF-8 (without the terminating NUL), `offset` being the position of the
/// first byte for error reporting.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid or truncated byte sequences.
///
/// # Examples
///
/// ```rust
/// use dexscope::dex::heap::decode_mutf8;
///
/// // NUL is encoded in two bytes, supplementary characters as surrogate pairs
/// assert_eq!(decode_mutf8(&[0x61, 0xC0, 0x80, 0x62], 0)?, "a\0b");
/// assert_eq!(decode_mutf8(&[0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80], 0)?, "\u{1F600}");
/// # Ok::<(), dexscope::Error>(())
/// ```
pub fn decode_mutf8(bytes: &[u8], offset: usize) -> Result<String> {
    Ok(String::from_utf16_lossy(&mutf8_units(bytes, offset)?))
}

fn mutf8_units(bytes: &[u8], offset: usize) -> Result<Vec<u16>> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut index = 0;

    let continuation = |index: usize| -> Result<u16> {
        match bytes.get(index) {
            Some(&byte) if byte & 0xC0 == 0x80 => Ok(u16::from(byte & 0x3F)),
            Some(_) => Err(malformed_error!(
                offset + index,
                "Invalid MUTF-8 continuation byte"
            )),
            None => Err(malformed_error!(
                offset + index,
                "Truncated MUTF-8 sequence"
            )),
        }
    };

    while index < bytes.len() {
        let lead = bytes[index];
        match lead >> 4 {
            0x0..=0x7 => {
                if lead == 0 {
                    return Err(malformed_error!(offset + index, "NUL byte inside MUTF-8 string"));
                }
                units.push(u16::from(lead));
                index += 1;
            }
            0xC | 0xD => {
                let second = continuation(index + 1)?;
                units.push((u16::from(lead & 0x1F) << 6) | second);
                index += 2;
            }
            0xE => {
                let second = continuation(index + 1)?;
                let third = continuation(index + 2)?;
                units.push((u16::from(lead & 0x0F) << 12) | (second << 6) | third);
                index += 3;
            }
            _ => {
                return Err(malformed_error!(
                    offset + index,
                    "Invalid MUTF-8 lead byte 0x{:02x}",
                    lead
                ))
            }
        }
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dex::{diagnostics::Diagnostics, typecode::TypeCode},
        test::HeapFixture,
        Error,
    };

    #[test]
    fn mutf8() {
        assert_eq!(decode_mutf8(b"", 0).unwrap(), "");
        assert_eq!(decode_mutf8(b"LFoo;", 0).unwrap(), "LFoo;");
        assert_eq!(decode_mutf8(&[0xC3, 0xA9], 0).unwrap(), "\u{e9}");
        assert_eq!(decode_mutf8(&[0xE2, 0x82, 0xAC], 0).unwrap(), "\u{20ac}");
        // Unpaired high surrogate
        assert_eq!(decode_mutf8(&[0xED, 0xA0, 0xBD], 0).unwrap(), "\u{fffd}");

        assert!(matches!(
            decode_mutf8(&[0x61, 0xE2, 0x82], 0x100),
            Err(Error::Malformed { offset: 0x103, .. })
        ));
        assert!(matches!(
            decode_mutf8(&[0x61, 0xC3, 0x41], 0x100),
            Err(Error::Malformed { offset: 0x102, .. })
        ));
        assert!(matches!(
            decode_mutf8(&[0x80], 0x10),
            Err(Error::Malformed { offset: 0x10, .. })
        ));
        assert!(matches!(
            decode_mutf8(&[0xF0, 0x9F, 0x98, 0x80], 0),
            Err(Error::Malformed { offset: 0, .. })
        ));
    }

    #[test]
    fn crafted() {
        let mut fixture = HeapFixture::new(0x20);
        fixture.put(0x04, &[0x03, 0x61, 0xC0, 0x80, 0x62, 0x00]);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        let index = heap.resolve(0, 0x04, TypeCode::StringDataItem).unwrap();
        assert_eq!(heap.end_of(index), Some(0x0A));
        let heap = heap.finish().unwrap();
        let string: &StringData = heap.item(index).unwrap();
        assert_eq!(string.utf16_size, 3);
        assert_eq!(string.value, "a\0b");
        assert_eq!(string.to_string(), "a\0b");
        assert!(!diagnostics.has_any());
    }

    #[test]
    fn declared_length_mismatch() {
        let mut fixture = HeapFixture::new(0x20);
        fixture.put(0x04, &[0x05, 0x61, 0x62, 0x00]);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        heap.resolve(0, 0x04, TypeCode::StringDataItem).unwrap();
        let warnings = diagnostics.by_category(DiagnosticCategory::String);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].offset, Some(0x04));
    }

    #[test]
    fn unterminated() {
        let mut fixture = HeapFixture::new(0x08);
        fixture.put(0x04, &[0x03, 0x61, 0x62, 0x63]);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        assert!(matches!(
            heap.resolve(0, 0x04, TypeCode::StringDataItem),
            Err(Error::TruncatedStream { offset: 0x05, .. })
        ));
    }
}
