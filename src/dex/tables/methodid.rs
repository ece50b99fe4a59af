use crate::{
    dex::{
        heap::HeapBuilder,
        tables::{RowReadable, TableId},
    },
    file::parser::Parser,
    Result,
};

/// A `method_id_item`, identifying a method by class, prototype and name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodId {
    /// Zero-based index of this row
    pub rid: u32,
    /// Offset of this row in the file
    pub offset: usize,
    /// Index into the type table of the defining class
    pub class_idx: u16,
    /// Index into the proto table of the method's prototype
    pub proto_idx: u16,
    /// Index into the string table of the method's name
    pub name_idx: u32,
}

impl RowReadable for MethodId {
    const TABLE: TableId = TableId::Methods;

    fn row_size() -> usize {
        8
    }

    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let offset = parser.pos();
        let class_idx = parser.read::<u16>()?;
        let proto_idx = parser.read::<u16>()?;
        let name_idx = parser.read::<u32>()?;

        let sizes = heap.sizes();
        sizes.check(TableId::Types, u32::from(class_idx), offset)?;
        sizes.check(TableId::Protos, u32::from(proto_idx), offset + 2)?;

        Ok(MethodId {
            rid,
            offset,
            class_idx,
            proto_idx,
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
        let method = builder.method("Lcom/example/Foo;", "run", "V", &["I", "J"]);
        let dex = DexFile::decode(&builder.build()).unwrap();

        let row = dex.methods().get(method).unwrap();
        assert_eq!(dex.string(row.name_idx).unwrap(), "run");
        assert_eq!(&*dex.method_class_name(method).unwrap(), "Lcom/example/Foo;");
        assert_eq!(
            &*dex.method_reference(method).unwrap(),
            "Lcom/example/Foo;->run(IJ)V"
        );
    }

    #[test]
    fn proto_out_of_range() {
        let mut builder = DexBuilder::new();
        builder.method("LFoo;", "run", "V", &[]);
        let mut image = builder.build();
        let header = crate::dex::header::Header::read(&image).unwrap();
        let row = header.method_ids.offset as usize;
        image[row + 2..row + 4].copy_from_slice(&3u16.to_le_bytes());

        assert!(matches!(
            DexFile::decode(&image),
            Err(Error::IndexOutOfRange {
                table: TableId::Protos,
                index: 3,
                len: 1,
                offset,
            }) if offset == row + 2
        ));
    }
}
