use crate::{
    dex::{
        heap::{HeapBuilder, HeapIndex},
        tables::{RowReadable, TableId},
        typecode::TypeCode,
    },
    file::parser::Parser,
    Result,
};

/// A `string_id_item`, pointing at the string's data in the data section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringId {
    /// Zero-based index of this row
    pub rid: u32,
    /// Offset of this row in the file
    pub offset: usize,
    /// Offset of the `string_data_item`
    pub string_data_off: u32,
    /// The decoded `string_data_item`
    pub data: HeapIndex,
}

impl RowReadable for StringId {
    const TABLE: TableId = TableId::Strings;

    fn row_size() -> usize {
        4
    }

    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let offset = parser.pos();
        let string_data_off = parser.read::<u32>()?;

        Ok(StringId {
            rid,
            offset,
            string_data_off,
            data: heap.resolve(offset, string_data_off, TypeCode::StringDataItem)?,
        })
    }
}
