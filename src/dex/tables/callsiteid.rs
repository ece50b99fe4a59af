use crate::{
    dex::{
        heap::{HeapBuilder, HeapIndex},
        tables::{RowReadable, TableId},
        typecode::TypeCode,
    },
    file::parser::Parser,
    Result,
};

/// A `call_site_id_item`, pointing at the call site's bootstrap arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSiteId {
    /// Zero-based index of this row
    pub rid: u32,
    /// Offset of this row in the file
    pub offset: usize,
    /// Offset of the `encoded_array_item` holding the call site
    pub call_site_off: u32,
    /// The decoded call site arguments
    pub call_site: HeapIndex,
}

impl RowReadable for CallSiteId {
    const TABLE: TableId = TableId::CallSites;

    fn row_size() -> usize {
        4
    }

    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let offset = parser.pos();
        let call_site_off = parser.read::<u32>()?;

        Ok(CallSiteId {
            rid,
            offset,
            call_site_off,
            call_site: heap.resolve(offset, call_site_off, TypeCode::EncodedArrayItem)?,
        })
    }
}
