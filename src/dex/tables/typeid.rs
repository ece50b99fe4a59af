use crate::{
    dex::{
        heap::HeapBuilder,
        tables::{RowReadable, TableId},
    },
    file::parser::Parser,
    Result,
};

/// A `type_id_item`, naming a type by its descriptor string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeId {
    /// Zero-based index of this row
    pub rid: u32,
    /// Offset of this row in the file
    pub offset: usize,
    /// Index into the string table of the type descriptor
    pub descriptor_idx: u32,
}

impl RowReadable for TypeId {
    const TABLE: TableId = TableId::Types;

    fn row_size() -> usize {
        4
    }

    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let offset = parser.pos();
        let descriptor_idx = parser.read::<u32>()?;

        Ok(TypeId {
            rid,
            offset,
            descriptor_idx: heap.sizes().check(TableId::Strings, descriptor_idx, offset)?,
        })
    }
}
