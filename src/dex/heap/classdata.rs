//! The `class_data_item`: fields and methods declared by a class.
//!
//! Member indices are delta-encoded; each list (static fields, instance fields, direct
//! methods, virtual methods) starts from zero again, and an entry's index is the sum of its
//! own delta and every delta before it in the same list.

use crate::{
    dex::{
        access::AccessFlags,
        heap::{checked_count, HeapBuilder, HeapIndex, HeapValue},
        tables::TableId,
        typecode::TypeCode,
    },
    file::parser::Parser,
    Result,
};

/// A field declared in a [`ClassData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedField {
    /// Index into the field table
    pub field_idx: u32,
    /// Access flags of the field
    pub access_flags: AccessFlags,
}

/// A method declared in a [`ClassData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedMethod {
    /// Index into the method table
    pub method_idx: u32,
    /// Access flags of the method
    pub access_flags: AccessFlags,
    /// Offset of the method's code, `0` for abstract and native methods
    pub code_off: u32,
    /// The method's [`crate::dex::heap::CodeItem`]
    pub code: Option<HeapIndex>,
}

/// A `class_data_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassData {
    /// Static fields
    pub static_fields: Vec<EncodedField>,
    /// Instance fields
    pub instance_fields: Vec<EncodedField>,
    /// Static, private and constructor methods
    pub direct_methods: Vec<EncodedMethod>,
    /// Virtual methods
    pub virtual_methods: Vec<EncodedMethod>,
}

impl ClassData {
    /// All fields, static ones first.
    pub fn fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.static_fields.iter().chain(self.instance_fields.iter())
    }

    /// All methods, direct ones first.
    pub fn methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.direct_methods.iter().chain(self.virtual_methods.iter())
    }

    /// Number of fields and methods.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.static_fields.len()
            + self.instance_fields.len()
            + self.direct_methods.len()
            + self.virtual_methods.len()
    }

    /// `true` if the class declares no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.member_count() == 0
    }
}

/// Running sum of delta-encoded indices within one list.
struct DeltaIndex {
    table: TableId,
    current: Option<u32>,
}

impl DeltaIndex {
    fn new(table: TableId) -> Self {
        DeltaIndex {
            table,
            current: None,
        }
    }

    fn next(&mut self, parser: &mut Parser<'_>, heap: &HeapBuilder<'_>) -> Result<u32> {
        let position = parser.pos();
        let delta = parser.read_uleb128()?;
        let index = self
            .current
            .unwrap_or(0)
            .checked_add(delta)
            .ok_or_else(|| malformed_error!(position, "{} index delta overflows", self.table))?;

        self.current = Some(heap.sizes().check(self.table, index, position)?);
        Ok(index)
    }
}

fn read_fields(
    parser: &mut Parser<'_>,
    heap: &HeapBuilder<'_>,
    count: usize,
) -> Result<Vec<EncodedField>> {
    let mut delta = DeltaIndex::new(TableId::Fields);
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let field_idx = delta.next(parser, heap)?;
        fields.push(EncodedField {
            field_idx,
            access_flags: AccessFlags::from_raw(parser.read_uleb128()?),
        });
    }

    Ok(fields)
}

fn read_methods(
    parser: &mut Parser<'_>,
    heap: &mut HeapBuilder<'_>,
    count: usize,
) -> Result<Vec<EncodedMethod>> {
    let mut delta = DeltaIndex::new(TableId::Methods);
    let mut methods = Vec::with_capacity(count);
    for _ in 0..count {
        let method_idx = delta.next(parser, heap)?;
        let access_flags = AccessFlags::from_raw(parser.read_uleb128()?);
        let code_pos = parser.pos();
        let code_off = parser.read_uleb128()?;

        methods.push(EncodedMethod {
            method_idx,
            access_flags,
            code_off,
            code: heap.resolve_optional(code_pos, code_off, TypeCode::CodeItem)?,
        });
    }

    Ok(methods)
}

pub(crate) fn decode(heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let static_fields_size = parser.read_uleb128()?;
    let instance_fields_size = parser.read_uleb128()?;
    let direct_methods_size = parser.read_uleb128()?;
    let virtual_methods_size = parser.read_uleb128()?;

    let count = checked_count(parser, static_fields_size, 2)?;
    let static_fields = read_fields(parser, heap, count)?;
    let count = checked_count(parser, instance_fields_size, 2)?;
    let instance_fields = read_fields(parser, heap, count)?;
    let count = checked_count(parser, direct_methods_size, 3)?;
    let direct_methods = read_methods(parser, heap, count)?;
    let count = checked_count(parser, virtual_methods_size, 3)?;
    let virtual_methods = read_methods(parser, heap, count)?;

    Ok(HeapValue::ClassData(ClassData {
        static_fields,
        instance_fields,
        direct_methods,
        virtual_methods,
    }))
}
