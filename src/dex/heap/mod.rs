//! # Data Heap
//!
//! The data section of a DEX file is addressed by byte offset from many unrelated places:
//! index table rows, class definitions, and other data items. This module decodes each such
//! item exactly once and stores it in an arena, so every holder of an offset observes the
//! same value through a [`HeapIndex`].
//!
//! ## Key Components
//!
//! - [`HeapBuilder`]: Resolves `(field position, offset, type code)` requests while a file is
//!   being decoded, memoizing every decoded item by offset
//! - [`DataHeap`]: The finished, immutable arena with offset and index based lookups
//! - [`HeapValue`]: Closed set of the twelve data item shapes
//! - [`HeapItem`]: Typed access to a single shape
//!
//! ## Resolution
//!
//! A request for an offset
//! 1. fails with [`crate::Error::OffsetOutOfRange`], reported at the field's own position, if
//!    the offset lies outside the buffer,
//! 2. fails with [`crate::Error::ReentrantHeapParse`] if the offset is still being decoded,
//!    with [`crate::Error::HeapTypeMismatch`] if it was decoded as another type, and
//!    otherwise returns the existing [`HeapIndex`],
//! 3. otherwise looks up the decoder for the type code, reserves the arena slot, decodes the
//!    item with a fresh [`crate::file::parser::Parser`] and records where the item ended.
//!
//! References that do not point past the item holding them, items outside the declared data
//! section, and misaligned items are reported through [`crate::dex::diagnostics`] but do not
//! fail the decode.

mod annotations;
mod classdata;
mod code;
mod debuginfo;
mod encoded;
mod hiddenapi;
mod maplist;
mod stringdata;
mod typelist;
mod value;

pub use annotations::{
    AnnotationItem, AnnotationSet, AnnotationSetRefList, AnnotationsDirectory, FieldAnnotation,
    MethodAnnotation, ParameterAnnotation, Visibility,
};
pub use classdata::{ClassData, EncodedField, EncodedMethod};
pub use code::{CatchHandler, CodeItem, TryItem, TypeAddrPair};
pub use debuginfo::{DebugInfo, DebugOp, PositionEntry};
pub use encoded::{AnnotationElement, EncodedAnnotation, EncodedArray, EncodedValue};
pub use hiddenapi::{ApiRestriction, HiddenApiClassData, HiddenApiFlags};
pub use maplist::{MapItem, MapList};
pub use stringdata::{decode_mutf8, StringData};
pub use typelist::TypeList;
pub use value::{HeapItem, HeapValue};

use std::collections::HashMap;

use crate::{
    dex::{
        config::LoaderConfig,
        diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
        header::Section,
        tables::TableSizes,
        typecode::TypeCode,
    },
    file::{io::Endian, parser::Parser},
    Error, Result,
};

/// Decoder of one data item shape, called with the parser positioned at the item.
pub type DecodeFn = fn(&mut HeapBuilder<'_>, &mut Parser<'_>) -> Result<HeapValue>;

/// Returns the decoder for items of type `code`, `None` for codes without a data item shape.
#[must_use]
pub fn decoder(code: TypeCode) -> Option<DecodeFn> {
    match code {
        TypeCode::HeaderItem
        | TypeCode::StringIdItem
        | TypeCode::TypeIdItem
        | TypeCode::ProtoIdItem
        | TypeCode::FieldIdItem
        | TypeCode::MethodIdItem
        | TypeCode::ClassDefItem
        | TypeCode::CallSiteIdItem
        | TypeCode::MethodHandleItem => None,
        TypeCode::MapList => Some(maplist::decode),
        TypeCode::TypeList => Some(typelist::decode),
        TypeCode::AnnotationSetRefList => Some(annotations::decode_set_ref_list),
        TypeCode::AnnotationSetItem => Some(annotations::decode_set),
        TypeCode::ClassDataItem => Some(classdata::decode),
        TypeCode::CodeItem => Some(code::decode),
        TypeCode::StringDataItem => Some(stringdata::decode),
        TypeCode::DebugInfoItem => Some(debuginfo::decode),
        TypeCode::AnnotationItem => Some(annotations::decode_item),
        TypeCode::EncodedArrayItem => Some(encoded::decode_array_item),
        TypeCode::AnnotationsDirectoryItem => Some(annotations::decode_directory),
        TypeCode::HiddenapiClassDataItem => Some(hiddenapi::decode),
    }
}

/// Position of a decoded item in the [`DataHeap`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapIndex(u32);

impl HeapIndex {
    /// The arena position as `usize`.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One decoded data item.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapEntry {
    /// Offset of the item
    pub offset: u32,
    /// Offset of the first byte after the item
    pub end: u32,
    /// Type code the item was decoded as
    pub type_code: TypeCode,
    /// The decoded item
    pub value: HeapValue,
}

/// The decoded data section.
///
/// Entries are stored in the order their decode finished; nested items therefore precede
/// the items referencing them.
#[derive(Debug, Default)]
pub struct DataHeap {
    entries: Vec<HeapEntry>,
    by_offset: HashMap<u32, HeapIndex>,
    decode_calls: usize,
}

impl DataHeap {
    /// Returns the item at `offset`, which must have been decoded as `expected`.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedOffset`] if no item was decoded at `offset` and
    /// [`crate::Error::HeapTypeMismatch`] if it was decoded as another type.
    pub fn get(&self, offset: u32, expected: TypeCode) -> Result<&HeapValue> {
        let entry = self
            .index_of(offset)
            .and_then(|index| self.entry(index))
            .ok_or(Error::UnresolvedOffset {
                offset: offset as usize,
            })?;

        if entry.type_code != expected {
            return Err(Error::HeapTypeMismatch {
                target: offset,
                expected,
                found: entry.type_code,
                offset: offset as usize,
            });
        }

        Ok(&entry.value)
    }

    /// The arena position of the item at `offset`.
    #[must_use]
    pub fn index_of(&self, offset: u32) -> Option<HeapIndex> {
        self.by_offset.get(&offset).copied()
    }

    /// The entry at `index`.
    #[must_use]
    pub fn entry(&self, index: HeapIndex) -> Option<&HeapEntry> {
        self.entries.get(index.index())
    }

    /// The item at `index`.
    #[must_use]
    pub fn value(&self, index: HeapIndex) -> Option<&HeapValue> {
        self.entry(index).map(|entry| &entry.value)
    }

    /// The item at `index` as shape `T`.
    ///
    /// # Errors
    /// Returns [`crate::Error::HeapTypeMismatch`] if the item has another shape, and
    /// [`crate::Error::Malformed`] if `index` does not belong to this heap.
    pub fn item<T: HeapItem>(&self, index: HeapIndex) -> Result<&T> {
        let entry = self
            .entry(index)
            .ok_or_else(|| malformed_error!(0, "Heap index {} out of range", index.0))?;

        T::from_value(&entry.value).ok_or(Error::HeapTypeMismatch {
            target: entry.offset,
            expected: T::TYPE_CODE,
            found: entry.type_code,
            offset: entry.offset as usize,
        })
    }

    /// The item at `offset` as shape `T`.
    ///
    /// # Errors
    /// See [`DataHeap::get`].
    pub fn item_at<T: HeapItem>(&self, offset: u32) -> Result<&T> {
        let index = self.index_of(offset).ok_or(Error::UnresolvedOffset {
            offset: offset as usize,
        })?;
        self.item(index)
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> std::slice::Iter<'_, HeapEntry> {
        self.entries.iter()
    }

    /// Iterates over all entries of type `code`, ordered by offset.
    pub fn iter_type(&self, code: TypeCode) -> impl Iterator<Item = &HeapEntry> {
        let mut entries: Vec<&HeapEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.type_code == code)
            .collect();
        entries.sort_by_key(|entry| entry.offset);
        entries.into_iter()
    }

    /// Number of decoded items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no item was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of times a decoder ran; equals the number of distinct offsets.
    #[must_use]
    pub fn decode_calls(&self) -> usize {
        self.decode_calls
    }
}

struct Slot {
    offset: u32,
    end: u32,
    type_code: TypeCode,
    value: Option<HeapValue>,
}

/// Builds the [`DataHeap`] while a file is decoded.
///
/// Holds everything a decoder needs besides its parser: the buffer, the byte order, the row
/// counts of the index tables for index checks, the loader configuration and the diagnostics
/// sink.
pub struct HeapBuilder<'a> {
    data: &'a [u8],
    endian: Endian,
    config: LoaderConfig,
    diagnostics: &'a Diagnostics,
    sizes: TableSizes,
    data_section: Section,
    member_counts: Option<Vec<u32>>,
    slots: Vec<Slot>,
    by_offset: HashMap<u32, HeapIndex>,
    referrers: Vec<u32>,
    decode_calls: usize,
}

impl<'a> HeapBuilder<'a> {
    /// Creates a builder over `data`.
    #[must_use]
    pub fn new(
        data: &'a [u8],
        endian: Endian,
        config: LoaderConfig,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        HeapBuilder {
            data,
            endian,
            config,
            diagnostics,
            sizes: TableSizes::default(),
            data_section: Section::default(),
            member_counts: None,
            slots: Vec::new(),
            by_offset: HashMap::new(),
            referrers: Vec::new(),
            decode_calls: 0,
        }
    }

    /// Sets the row counts index fields are checked against.
    pub fn set_sizes(&mut self, sizes: TableSizes) {
        self.sizes = sizes;
    }

    /// Sets the data section items are expected in.
    pub fn set_data_section(&mut self, section: Section) {
        self.data_section = section;
    }

    /// Sets the number of fields and methods of every class definition, in class definition
    /// order, as needed by the hidden API data.
    pub fn set_member_counts(&mut self, counts: Vec<u32>) {
        self.member_counts = Some(counts);
    }

    /// The buffer being decoded.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Byte order of the file.
    #[must_use]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Row counts of the index tables.
    #[must_use]
    pub fn sizes(&self) -> TableSizes {
        self.sizes
    }

    /// The loader configuration.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The diagnostics sink.
    #[must_use]
    pub fn diagnostics(&self) -> &'a Diagnostics {
        self.diagnostics
    }

    /// Fields and methods of each class definition, if known yet.
    #[must_use]
    pub fn member_counts(&self) -> Option<&[u32]> {
        self.member_counts.as_deref()
    }

    /// Offset of the first byte after the item at `index`.
    #[must_use]
    pub fn end_of(&self, index: HeapIndex) -> Option<u32> {
        self.slots.get(index.index()).map(|slot| slot.end)
    }

    /// The completed item at `index`; `None` while it is still being decoded.
    #[must_use]
    pub fn value(&self, index: HeapIndex) -> Option<&HeapValue> {
        self.slots
            .get(index.index())
            .and_then(|slot| slot.value.as_ref())
    }

    /// Number of items decoded so far.
    #[must_use]
    pub fn decode_calls(&self) -> usize {
        self.decode_calls
    }

    /// Resolves the item of type `expected` at `offset`, decoding it on first use.
    ///
    /// `field_pos` is the position of the field holding `offset`; errors about the reference
    /// itself are reported there.
    ///
    /// # Errors
    /// - [`crate::Error::OffsetOutOfRange`] if `offset` lies outside the buffer
    /// - [`crate::Error::ReentrantHeapParse`] if `offset` is still being decoded
    /// - [`crate::Error::HeapTypeMismatch`] if `offset` was decoded as another type
    /// - [`crate::Error::UnknownTypeCode`] if `expected` has no data item shape
    /// - any error of the item's decoder
    pub fn resolve(&mut self, field_pos: usize, offset: u32, expected: TypeCode) -> Result<HeapIndex> {
        if offset as usize >= self.data.len() {
            return Err(Error::OffsetOutOfRange {
                value: u64::from(offset),
                limit: self.data.len(),
                offset: field_pos,
            });
        }

        if let Some(&index) = self.by_offset.get(&offset) {
            let slot = &self.slots[index.index()];
            if slot.value.is_none() {
                return Err(Error::ReentrantHeapParse {
                    target: offset,
                    offset: field_pos,
                });
            }
            if slot.type_code != expected {
                return Err(Error::HeapTypeMismatch {
                    target: offset,
                    expected,
                    found: slot.type_code,
                    offset: field_pos,
                });
            }

            return Ok(index);
        }

        let Some(decode) = decoder(expected) else {
            return Err(Error::UnknownTypeCode {
                code: expected.raw(),
                offset: field_pos,
            });
        };

        self.check_placement(field_pos, offset, expected);

        let Ok(position) = u32::try_from(self.slots.len()) else {
            return Err(malformed_error!(field_pos, "Too many data items"));
        };
        let index = HeapIndex(position);
        self.slots.push(Slot {
            offset,
            end: offset,
            type_code: expected,
            value: None,
        });
        self.by_offset.insert(offset, index);

        let mut parser = Parser::at(self.data, offset as usize, self.endian)?;
        self.referrers.push(offset);
        let result = decode(self, &mut parser);
        self.referrers.pop();
        let value = result?;

        #[allow(clippy::cast_possible_truncation)]
        let end = parser.pos() as u32;
        let slot = &mut self.slots[index.index()];
        slot.value = Some(value);
        slot.end = end;
        self.decode_calls += 1;

        log::trace!("decoded {expected} at 0x{offset:08x}..0x{end:08x}");
        Ok(index)
    }

    /// Like [`HeapBuilder::resolve`], treating an offset of `0` as absent.
    ///
    /// # Errors
    /// See [`HeapBuilder::resolve`].
    pub fn resolve_optional(
        &mut self,
        field_pos: usize,
        offset: u32,
        expected: TypeCode,
    ) -> Result<Option<HeapIndex>> {
        if offset == 0 {
            return Ok(None);
        }

        self.resolve(field_pos, offset, expected).map(Some)
    }

    fn check_placement(&self, field_pos: usize, offset: u32, expected: TypeCode) {
        if let Some(&referrer) = self.referrers.last() {
            if offset <= referrer {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticSeverity::Info,
                        DiagnosticCategory::Heap,
                        format!(
                            "{expected} at 0x{offset:08x} does not follow the item at 0x{referrer:08x} referencing it"
                        ),
                    )
                    .with_offset(field_pos),
                );
            }
        }

        if !self.data_section.is_empty() && !self.data_section.contains(offset) {
            self.diagnostics.warning_at(
                DiagnosticCategory::Heap,
                field_pos,
                format!("{expected} at 0x{offset:08x} lies outside the data section"),
            );
        }

        if offset as usize % expected.alignment() != 0 {
            self.diagnostics.warning_at(
                DiagnosticCategory::Heap,
                field_pos,
                format!(
                    "{expected} at 0x{offset:08x} is not aligned to {} bytes",
                    expected.alignment()
                ),
            );
        }
    }

    /// Freezes the builder into a [`DataHeap`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an item is still being decoded.
    pub fn finish(self) -> Result<DataHeap> {
        let mut entries = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            let Some(value) = slot.value else {
                return Err(malformed_error!(
                    slot.offset as usize,
                    "Data item at 0x{:08x} was never completed",
                    slot.offset
                ));
            };
            entries.push(HeapEntry {
                offset: slot.offset,
                end: slot.end,
                type_code: slot.type_code,
                value,
            });
        }

        Ok(DataHeap {
            entries,
            by_offset: self.by_offset,
            decode_calls: self.decode_calls,
        })
    }
}

/// Checks that `count` entries of `stride` bytes fit the rest of the buffer, before anything
/// is allocated for them.
pub(crate) fn checked_count(parser: &Parser<'_>, count: u32, stride: usize) -> Result<usize> {
    let count = count as usize;
    match count.checked_mul(stride) {
        Some(needed) if needed <= parser.remaining() => Ok(count),
        _ => Err(truncated_error!(
            parser.pos(),
            count.saturating_mul(stride)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{encode_uleb128, HeapFixture};

    #[test]
    fn registry() {
        assert!(decoder(TypeCode::ClassDefItem).is_none());
        assert!(decoder(TypeCode::HeaderItem).is_none());
        assert!(decoder(TypeCode::TypeList).is_some());
        assert!(decoder(TypeCode::HiddenapiClassDataItem).is_some());
    }

    #[test]
    fn identity() {
        // Two type lists at 0x10 and 0x20, the second requested twice
        let mut fixture = HeapFixture::new(0x40);
        fixture.put(0x10, &[1, 0, 0, 0, 0, 0]);
        fixture.put(0x20, &[2, 0, 0, 0, 0, 0, 0, 0]);
        fixture.sizes(&[(crate::dex::tables::TableId::Types, 1)]);

        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        let first = heap.resolve(0x00, 0x20, TypeCode::TypeList).unwrap();
        let second = heap.resolve(0x04, 0x20, TypeCode::TypeList).unwrap();
        let other = heap.resolve(0x08, 0x10, TypeCode::TypeList).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(heap.end_of(first), Some(0x28));
        assert_eq!(heap.decode_calls(), 2);

        let heap = heap.finish().unwrap();
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.decode_calls(), 2);
        assert!(std::ptr::eq(
            heap.value(first).unwrap(),
            heap.value(second).unwrap()
        ));
        assert!(std::ptr::eq(
            heap.get(0x20, TypeCode::TypeList).unwrap(),
            heap.value(first).unwrap()
        ));

        let list: &TypeList = heap.item(first).unwrap();
        assert_eq!(list.type_idx, vec![0, 0]);
    }

    #[test]
    fn offset_out_of_range() {
        let fixture = HeapFixture::new(0x20);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        assert!(matches!(
            heap.resolve(0x0C, 0x20, TypeCode::TypeList),
            Err(Error::OffsetOutOfRange {
                value: 0x20,
                limit: 0x20,
                offset: 0x0C
            })
        ));
        assert_eq!(heap.resolve_optional(0x0C, 0, TypeCode::TypeList).unwrap(), None);
    }

    #[test]
    fn type_mismatch() {
        let mut fixture = HeapFixture::new(0x20);
        fixture.put(0x10, &[0, 0, 0, 0]);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        heap.resolve(0x00, 0x10, TypeCode::TypeList).unwrap();
        assert!(matches!(
            heap.resolve(0x04, 0x10, TypeCode::AnnotationSetItem),
            Err(Error::HeapTypeMismatch {
                target: 0x10,
                expected: TypeCode::AnnotationSetItem,
                found: TypeCode::TypeList,
                offset: 0x04
            })
        ));

        let heap = heap.finish().unwrap();
        assert!(matches!(
            heap.get(0x10, TypeCode::EncodedArrayItem),
            Err(Error::HeapTypeMismatch { .. })
        ));
        assert!(matches!(
            heap.get(0x14, TypeCode::TypeList),
            Err(Error::UnresolvedOffset { offset: 0x14 })
        ));
        assert!(matches!(
            heap.item_at::<AnnotationSet>(0x10),
            Err(Error::HeapTypeMismatch { .. })
        ));
    }

    #[test]
    fn reentrant() {
        // An annotation set ref list whose single entry points back at itself
        let mut fixture = HeapFixture::new(0x20);
        fixture.put(0x10, &[1, 0, 0, 0, 0x10, 0, 0, 0]);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        assert!(matches!(
            heap.resolve(0x00, 0x10, TypeCode::AnnotationSetRefList),
            Err(Error::ReentrantHeapParse {
                target: 0x10,
                offset: 0x14
            })
        ));
    }

    #[test]
    fn reentrant_through_nesting() {
        // Class data with one direct method whose code_off points at the class data
        let mut class_data = Vec::new();
        for count in [0, 0, 1, 0] {
            class_data.extend(encode_uleb128(count));
        }
        class_data.extend(encode_uleb128(0)); // method_idx delta
        class_data.extend(encode_uleb128(1)); // access flags
        class_data.extend(encode_uleb128(0x10)); // code_off

        let mut fixture = HeapFixture::new(0x40);
        fixture.put(0x10, &class_data);
        fixture.sizes(&[(crate::dex::tables::TableId::Methods, 1)]);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        assert!(matches!(
            heap.resolve(0x00, 0x10, TypeCode::ClassDataItem),
            Err(Error::ReentrantHeapParse {
                target: 0x10,
                offset: 0x16
            })
        ));
    }

    #[test]
    fn unknown_type_code() {
        let fixture = HeapFixture::new(0x20);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        assert!(matches!(
            heap.resolve(0x08, 0x10, TypeCode::ClassDefItem),
            Err(Error::UnknownTypeCode {
                code: 0x0006,
                offset: 0x08
            })
        ));
    }

    #[test]
    fn placement_diagnostics() {
        let mut fixture = HeapFixture::new(0x40);
        // Annotation set ref list at 0x20 referencing a set at 0x11 (backward, misaligned)
        fixture.put(0x20, &[1, 0, 0, 0, 0x11, 0, 0, 0]);
        fixture.put(0x11, &[0, 0, 0, 0]);
        fixture.data_section(0x18, 0x28);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        heap.resolve(0x00, 0x20, TypeCode::AnnotationSetRefList).unwrap();

        let heap_diagnostics = diagnostics.by_category(DiagnosticCategory::Heap);
        assert_eq!(heap_diagnostics.len(), 3);
        assert_eq!(diagnostics.info_count(), 1);
        assert_eq!(diagnostics.warning_count(), 2);
        assert!(heap_diagnostics
            .iter()
            .any(|d| d.message.contains("outside the data section") && d.offset == Some(0x24)));
        assert!(heap_diagnostics
            .iter()
            .any(|d| d.message.contains("not aligned")));
    }

    #[test]
    fn backward_reference_is_info() {
        let mut fixture = HeapFixture::new(0x40);
        fixture.put(0x20, &[1, 0, 0, 0, 0x10, 0, 0, 0]);
        fixture.put(0x10, &[0, 0, 0, 0]);
        fixture.data_section(0x10, 0x30);
        let diagnostics = Diagnostics::new();
        let mut heap = fixture.builder(&diagnostics);

        let index = heap
            .resolve(0x00, 0x20, TypeCode::AnnotationSetRefList)
            .unwrap();
        let heap = heap.finish().unwrap();
        assert!(heap.value(index).is_some());
        assert!(heap.index_of(0x10).is_some());

        assert_eq!(diagnostics.info_count(), 1);
        assert!(!diagnostics.has_warnings());
        let found = diagnostics.by_category(DiagnosticCategory::Heap);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, DiagnosticSeverity::Info);
        assert_eq!(found[0].offset, Some(0x24));
    }

    #[test]
    fn count_checks() {
        let data = [0u8; 8];
        let parser = Parser::new(&data);
        assert_eq!(checked_count(&parser, 2, 4).unwrap(), 2);
        assert!(matches!(
            checked_count(&parser, u32::MAX, 4),
            Err(Error::TruncatedStream { offset: 0, .. })
        ));
    }
}
