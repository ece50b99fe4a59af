use strum::Display;

use crate::{
    dex::{
        heap::HeapBuilder,
        tables::{RowReadable, TableId},
    },
    file::parser::Parser,
    Result,
};

/// Kind of a method handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum MethodHandleKind {
    /// Static field setter
    StaticPut,
    /// Static field getter
    StaticGet,
    /// Instance field setter
    InstancePut,
    /// Instance field getter
    InstanceGet,
    /// Static method invoker
    InvokeStatic,
    /// Instance method invoker
    InvokeInstance,
    /// Constructor invoker
    InvokeConstructor,
    /// Direct method invoker
    InvokeDirect,
    /// Interface method invoker
    InvokeInterface,
}

impl MethodHandleKind {
    /// Decodes a raw kind, `offset` being the position it was read from.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown kinds.
    pub fn from_raw(kind: u16, offset: usize) -> Result<Self> {
        Ok(match kind {
            0x00 => MethodHandleKind::StaticPut,
            0x01 => MethodHandleKind::StaticGet,
            0x02 => MethodHandleKind::InstancePut,
            0x03 => MethodHandleKind::InstanceGet,
            0x04 => MethodHandleKind::InvokeStatic,
            0x05 => MethodHandleKind::InvokeInstance,
            0x06 => MethodHandleKind::InvokeConstructor,
            0x07 => MethodHandleKind::InvokeDirect,
            0x08 => MethodHandleKind::InvokeInterface,
            _ => return Err(malformed_error!(offset, "Unknown method handle kind - {}", kind)),
        })
    }

    /// `true` if the handle's target is a field, `false` if it is a method.
    #[must_use]
    pub fn is_field_accessor(self) -> bool {
        matches!(
            self,
            MethodHandleKind::StaticPut
                | MethodHandleKind::StaticGet
                | MethodHandleKind::InstancePut
                | MethodHandleKind::InstanceGet
        )
    }

    /// The table the handle's target index points into.
    #[must_use]
    pub fn target_table(self) -> TableId {
        if self.is_field_accessor() {
            TableId::Fields
        } else {
            TableId::Methods
        }
    }
}

/// A `method_handle_item`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodHandle {
    /// Zero-based index of this row
    pub rid: u32,
    /// Offset of this row in the file
    pub offset: usize,
    /// Kind of the handle
    pub kind: MethodHandleKind,
    /// Index into the field or method table, depending on `kind`
    pub field_or_method_idx: u16,
}

impl RowReadable for MethodHandle {
    const TABLE: TableId = TableId::MethodHandles;

    fn row_size() -> usize {
        8
    }

    fn row_read(parser: &mut Parser<'_>, rid: u32, heap: &mut HeapBuilder<'_>) -> Result<Self> {
        let offset = parser.pos();
        let kind = MethodHandleKind::from_raw(parser.read::<u16>()?, offset)?;
        parser.advance_by(2)?;
        let field_or_method_idx = parser.read::<u16>()?;
        parser.advance_by(2)?;

        heap.sizes().check(
            kind.target_table(),
            u32::from(field_or_method_idx),
            offset + 4,
        )?;

        Ok(MethodHandle {
            rid,
            offset,
            kind,
            field_or_method_idx,
        })
    }
}
