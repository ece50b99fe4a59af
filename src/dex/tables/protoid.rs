use crate::{
    dex::{
        heap::{HeapBuilder, HeapIndex},
        tables::{RowReadable, TableId},
        typecode::TypeCode,
    },
    file::parser::Parser,
    Result,
};

/// A `proto_id_item`, describing a method prototype.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtoId {
    /// Zero-based index of this row
    pub rid: u32,
    /// Offset of this row in the file
    pub offset: usize,
    /// Index into the string table of the short-form descriptor (e.g. `VIL`)
    pub shorty_idx: u32,
    /// Index into the type table of the return type
    pub return_type_idx: u32,
    /// Offset of the parameter `type_list`, `0` for no parameters
    pub parameters_off: u32,
    /// The decoded parameter list
    pub parameters: Option<HeapIndex>,
}

impl RowReadable for ProtoId {
    const TABLE: TableId = TableId::Protos;

    fn row_size() -> usize {
        12
    }

    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let offset = parser.pos();
        let shorty_idx = parser.read::<u32>()?;
        let return_type_idx = parser.read::<u32>()?;
        let parameters_pos = parser.pos();
        let parameters_off = parser.read::<u32>()?;

        Ok(ProtoId {
            rid,
            offset,
            shorty_idx: heap.sizes().check(TableId::Strings, shorty_idx, offset)?,
            return_type_idx: heap
                .sizes()
                .check(TableId::Types, return_type_idx, offset + 4)?,
            parameters_off,
            parameters: heap.resolve_optional(parameters_pos, parameters_off, TypeCode::TypeList)?,
        })
    }
}
