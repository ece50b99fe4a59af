//! Annotation structures of the data section.
//!
//! A class's [`AnnotationsDirectory`] points at [`AnnotationSet`]s (and, for method
//! parameters, at [`AnnotationSetRefList`]s), which in turn point at individual
//! [`AnnotationItem`]s. Sets are commonly shared between members, so every level is resolved
//! through the heap and held as a [`HeapIndex`].

use strum::{Display, EnumIter};

use crate::{
    dex::{
        heap::{checked_count, EncodedAnnotation, HeapBuilder, HeapIndex, HeapValue},
        tables::TableId,
        typecode::TypeCode,
    },
    file::parser::Parser,
    Result,
};

/// Visibility of an [`AnnotationItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    /// Visible at build time only
    Build,
    /// Visible at runtime
    Runtime,
    /// Visible to the system only
    System,
}

impl Visibility {
    /// Converts the stored byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for values other than 0, 1 and 2.
    pub fn from_raw(value: u8, offset: usize) -> Result<Self> {
        match value {
            0x00 => Ok(Visibility::Build),
            0x01 => Ok(Visibility::Runtime),
            0x02 => Ok(Visibility::System),
            _ => Err(malformed_error!(
                offset,
                "Invalid annotation visibility 0x{:02x}",
                value
            )),
        }
    }
}

/// An `annotation_item`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationItem {
    /// Visibility of the annotation
    pub visibility: Visibility,
    /// The annotation itself
    pub annotation: EncodedAnnotation,
}

/// An `annotation_set_item`: the annotations of one class, member or parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSet {
    /// The annotation items, in file order
    pub entries: Vec<HeapIndex>,
}

/// An `annotation_set_ref_list`: one annotation set per method parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSetRefList {
    /// Annotation set of each parameter; `None` for parameters without annotations
    pub entries: Vec<Option<HeapIndex>>,
}

/// Annotations of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAnnotation {
    /// Index into the field table
    pub field_idx: u32,
    /// The field's [`AnnotationSet`]
    pub annotations: HeapIndex,
}

/// Annotations of one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodAnnotation {
    /// Index into the method table
    pub method_idx: u32,
    /// The method's [`AnnotationSet`]
    pub annotations: HeapIndex,
}

/// Annotations of the parameters of one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterAnnotation {
    /// Index into the method table
    pub method_idx: u32,
    /// The parameters' [`AnnotationSetRefList`]
    pub annotations: HeapIndex,
}

/// An `annotations_directory_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationsDirectory {
    /// Annotations of the class itself
    pub class_annotations: Option<HeapIndex>,
    /// Annotated fields
    pub fields: Vec<FieldAnnotation>,
    /// Annotated methods
    pub methods: Vec<MethodAnnotation>,
    /// Methods with annotated parameters
    pub parameters: Vec<ParameterAnnotation>,
}

impl AnnotationsDirectory {
    /// The annotation set of field `field_idx`, if it is annotated.
    #[must_use]
    pub fn field(&self, field_idx: u32) -> Option<HeapIndex> {
        self.fields
            .iter()
            .find(|entry| entry.field_idx == field_idx)
            .map(|entry| entry.annotations)
    }

    /// The annotation set of method `method_idx`, if it is annotated.
    #[must_use]
    pub fn method(&self, method_idx: u32) -> Option<HeapIndex> {
        self.methods
            .iter()
            .find(|entry| entry.method_idx == method_idx)
            .map(|entry| entry.annotations)
    }

    /// The parameter annotations of method `method_idx`, if any.
    #[must_use]
    pub fn parameter(&self, method_idx: u32) -> Option<HeapIndex> {
        self.parameters
            .iter()
            .find(|entry| entry.method_idx == method_idx)
            .map(|entry| entry.annotations)
    }
}

fn resolve_required(
    heap: &mut HeapBuilder<'_>,
    field_pos: usize,
    offset: u32,
    expected: TypeCode,
) -> Result<HeapIndex> {
    if offset == 0 {
        return Err(malformed_error!(
            field_pos,
            "Missing {} offset",
            expected
        ));
    }

    heap.resolve(field_pos, offset, expected)
}

pub(crate) fn decode_set_ref_list(
    heap: &mut HeapBuilder<'_>,
    parser: &mut Parser<'_>,
) -> Result<HeapValue> {
    let size = parser.read::<u32>()?;
    let count = checked_count(parser, size, 4)?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let field_pos = parser.pos();
        let offset = parser.read::<u32>()?;
        entries.push(heap.resolve_optional(field_pos, offset, TypeCode::AnnotationSetItem)?);
    }

    Ok(HeapValue::AnnotationSetRefList(AnnotationSetRefList {
        entries,
    }))
}

pub(crate) fn decode_set(heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let size = parser.read::<u32>()?;
    let count = checked_count(parser, size, 4)?;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let field_pos = parser.pos();
        let offset = parser.read::<u32>()?;
        entries.push(resolve_required(
            heap,
            field_pos,
            offset,
            TypeCode::AnnotationItem,
        )?);
    }

    Ok(HeapValue::AnnotationSet(AnnotationSet { entries }))
}

pub(crate) fn decode_item(heap: &mut HeapBuilder<'_>, parser: &mut Parser<'_>) -> Result<HeapValue> {
    let position = parser.pos();
    let visibility = Visibility::from_raw(parser.read::<u8>()?, position)?;
    let annotation = EncodedAnnotation::read(parser, heap, 0)?;

    Ok(HeapValue::Annotation(AnnotationItem {
        visibility,
        annotation,
    }))
}

pub(crate) fn decode_directory(
    heap: &mut HeapBuilder<'_>,
    parser: &mut Parser<'_>,
) -> Result<HeapValue> {
    let class_pos = parser.pos();
    let class_annotations_off = parser.read::<u32>()?;
    let fields_size = parser.read::<u32>()?;
    let methods_size = parser.read::<u32>()?;
    let parameters_size = parser.read::<u32>()?;

    let class_annotations =
        heap.resolve_optional(class_pos, class_annotations_off, TypeCode::AnnotationSetItem)?;
    let sizes = heap.sizes();

    let count = checked_count(parser, fields_size, 8)?;
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let index_pos = parser.pos();
        let field_idx = sizes.check(TableId::Fields, parser.read::<u32>()?, index_pos)?;
        let offset = parser.read::<u32>()?;
        fields.push(FieldAnnotation {
            field_idx,
            annotations: resolve_required(heap, index_pos + 4, offset, TypeCode::AnnotationSetItem)?,
        });
    }

    let count = checked_count(parser, methods_size, 8)?;
    let mut methods = Vec::with_capacity(count);
    for _ in 0..count {
        let index_pos = parser.pos();
        let method_idx = sizes.check(TableId::Methods, parser.read::<u32>()?, index_pos)?;
        let offset = parser.read::<u32>()?;
        methods.push(MethodAnnotation {
            method_idx,
            annotations: resolve_required(heap, index_pos + 4, offset, TypeCode::AnnotationSetItem)?,
        });
    }

    let count = checked_count(parser, parameters_size, 8)?;
    let mut parameters = Vec::with_capacity(count);
    for _ in 0..count {
        let index_pos = parser.pos();
        let method_idx = sizes.check(TableId::Methods, parser.read::<u32>()?, index_pos)?;
        let offset = parser.read::<u32>()?;
        parameters.push(ParameterAnnotation {
            method_idx,
            annotations: resolve_required(
                heap,
                index_pos + 4,
                offset,
                TypeCode::AnnotationSetRefList,
            )?,
        });
    }

    Ok(HeapValue::AnnotationsDirectory(AnnotationsDirectory {
        class_annotations,
        fields,
        methods,
        parameters,
    }))
}
