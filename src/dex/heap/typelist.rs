use crate::{
    dex::{
        heap::{checked_count, HeapBuilder, HeapValue},
        tables::TableId,
    },
    file::parser::Parser,
    Result,
};

/// A `type_list`, used for method parameters and implemented interfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeList {
    /// Indices into the type table
    pub type_idx: Vec<u16>,
}

pub(crate) fn decode(heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let size = parser.read::<u32>()?;
    let count = checked_count(parser, size, 2)?;
    let sizes = heap.sizes();

    let mut type_idx = Vec::with_capacity(count);
    for _ in 0..count {
        let position = parser.pos();
        let index = parser.read::<u16>()?;
        sizes.check(TableId::Types, u32::from(index), position)?;
        type_idx.push(index);
    }

    Ok(HeapValue::TypeList(TypeList { type_idx }))
}
