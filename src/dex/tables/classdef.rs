use crate::{
    dex::{
        access::AccessFlags,
        header::NO_INDEX,
        heap::{HeapBuilder, HeapIndex},
        tables::{RowReadable, TableId},
        typecode::TypeCode,
    },
    file::parser::Parser,
    Result,
};

/// A `class_def_item`, the definition of one class.
///
/// Every offset field is either `0` (absent) or resolved to a data item, decoding the class
/// data, code, annotations and static values reachable from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDef {
    /// Zero-based index of this row
    pub rid: u32,
    /// Offset of this row in the file
    pub offset: usize,
    /// Index into the type table of this class
    pub class_idx: u32,
    /// Access flags of the class
    pub access_flags: AccessFlags,
    /// Index into the type table of the superclass, `None` for root classes
    pub superclass_idx: Option<u32>,
    /// Offset of the implemented interfaces (`type_list`)
    pub interfaces_off: u32,
    /// The decoded interface list
    pub interfaces: Option<HeapIndex>,
    /// Index into the string table of the source file name
    pub source_file_idx: Option<u32>,
    /// Offset of the `annotations_directory_item`
    pub annotations_off: u32,
    /// The decoded annotations directory
    pub annotations: Option<HeapIndex>,
    /// Offset of the `class_data_item`
    pub class_data_off: u32,
    /// The decoded class data
    pub class_data: Option<HeapIndex>,
    /// Offset of the static field initial values (`encoded_array_item`)
    pub static_values_off: u32,
    /// The decoded static values
    pub static_values: Option<HeapIndex>,
}

impl RowReadable for ClassDef {
    const TABLE: TableId = TableId::ClassDefs;

    fn row_size() -> usize {
        32
    }

    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let offset = parser.pos();
        let class_idx = parser.read::<u32>()?;
        let access_flags = AccessFlags::from_raw(parser.read::<u32>()?);
        let superclass_idx = parser.read::<u32>()?;
        let interfaces_off = parser.read::<u32>()?;
        let source_file_idx = parser.read::<u32>()?;
        let annotations_off = parser.read::<u32>()?;
        let class_data_off = parser.read::<u32>()?;
        let static_values_off = parser.read::<u32>()?;

        let sizes = heap.sizes();
        sizes.check(TableId::Types, class_idx, offset)?;
        let superclass_idx = match superclass_idx {
            NO_INDEX => None,
            index => Some(sizes.check(TableId::Types, index, offset + 8)?),
        };
        let source_file_idx = match source_file_idx {
            NO_INDEX => None,
            index => Some(sizes.check(TableId::Strings, index, offset + 16)?),
        };

        Ok(ClassDef {
            rid,
            offset,
            class_idx,
            access_flags,
            superclass_idx,
            interfaces_off,
            interfaces: heap.resolve_optional(offset + 12, interfaces_off, TypeCode::TypeList)?,
            source_file_idx,
            annotations_off,
            annotations: heap.resolve_optional(
                offset + 20,
                annotations_off,
                TypeCode::AnnotationsDirectoryItem,
            )?,
            class_data_off,
            class_data: heap.resolve_optional(
                offset + 24,
                class_data_off,
                TypeCode::ClassDataItem,
            )?,
            static_values_off,
            static_values: heap.resolve_optional(
                offset + 28,
                static_values_off,
                TypeCode::EncodedArrayItem,
            )?,
        })
    }
}
