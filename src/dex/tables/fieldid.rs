use crate::{
    dex::{
        heap::HeapBuilder,
        tables::{RowReadable, TableId},
    },
    file::parser::Parser,
    Result,
};

/// A `field_id_item`, identifying a field by class, type and name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldId {
    /// Zero-based index of this row
    pub rid: u32,
    /// Offset of this row in the file
    pub offset: usize,
    /// Index into the type table of the defining class
    pub class_idx: u16,
    /// Index into the type table of the field's type
    pub type_idx: u16,
    /// Index into the string table of the field's name
    pub name_idx: u32,
}

impl RowReadable for FieldId {
    const TABLE: TableId = TableId::Fields;

    fn row_size() -> usize {
        8
    }

    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let offset = parser.pos();
        let class_idx = parser.read::<u16>()?;
        let type_idx = parser.read::<u16>()?;
        let name_idx = parser.read::<u32>()?;

        let sizes = heap.sizes();
        sizes.check(TableId::Types, u32::from(class_idx), offset)?;
        sizes.check(TableId::Types, u32::from(type_idx), offset + 2)?;

        Ok(FieldId {
            rid,
            offset,
            class_idx,
            type_idx,
            name_idx: sizes.check(TableId::Strings, name_idx, offset + 4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{dex::tables::TableId, test::DexBuilder, DexFile, Error};

    #[test]
    fn crafted() {
        let mut builder = DexBuilder::new();
        let field = builder.field("Lcom/example/Foo;", "I", "count");
        let dex = DexFile::decode(&builder.build()).unwrap();

        let row = dex.fields().get(field).unwrap();
        assert_eq!(dex.type_descriptor(u32::from(row.class_idx)).unwrap(), "Lcom/example/Foo;");
        assert_eq!(dex.string(row.name_idx).unwrap(), "count");
        assert_eq!(
            &*dex.field_reference(field).unwrap(),
            "Lcom/example/Foo;->count:I"
        );
    }

    #[test]
    fn class_out_of_range() {
        let mut builder = DexBuilder::new();
        builder.field("LFoo;", "I", "x");
        let mut image = builder.build();
        let header = crate::dex::header::Header::read(&image).unwrap();
        let row = header.field_ids.offset as usize;
        image[row..row + 2].copy_from_slice(&0x7777u16.to_le_bytes());

        assert!(matches!(
            DexFile::decode(&image),
            Err(Error::IndexOutOfRange {
                table: TableId::Types,
                index: 0x7777,
                offset,
                ..
            }) if offset == row
        ));
    }
}
