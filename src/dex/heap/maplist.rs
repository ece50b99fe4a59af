use crate::{
    dex::{
        heap::{checked_count, HeapBuilder, HeapValue},
        typecode::TypeCode,
    },
    file::parser::Parser,
    Result,
};

/// One `map_item`, describing a run of items of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapItem {
    /// Position of this entry in the file
    pub position: usize,
    /// Type of the items
    pub type_code: TypeCode,
    /// Number of items
    pub size: u32,
    /// Offset of the first item
    pub offset: u32,
}

/// The `map_list`, listing every section of the file in offset order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapList {
    /// The entries, in file order
    pub items: Vec<MapItem>,
}

impl MapList {
    /// The entry for items of type `code`.
    #[must_use]
    pub fn find(&self, code: TypeCode) -> Option<&MapItem> {
        self.items.iter().find(|item| item.type_code == code)
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> std::slice::Iter<'_, MapItem> {
        self.items.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub(crate) fn decode(_heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let size = parser.read::<u32>()?;
    let count = checked_count(parser, size, 12)?;

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let position = parser.pos();
        let type_code = TypeCode::from_raw(parser.read::<u16>()?, position)?;
        parser.advance_by(2)?;
        let size = parser.read::<u32>()?;
        let offset = parser.read::<u32>()?;

        items.push(MapItem {
            position,
            type_code,
            size,
            offset,
        });
    }

    Ok(HeapValue::MapList(MapList { items }))
}
