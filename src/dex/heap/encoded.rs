//! Encoded values, arrays and annotations.
//!
//! Every encoded value starts with a header byte `(value_arg << 5) | value_type`. For the
//! numeric kinds `value_arg + 1` is the payload width; signed kinds are sign-extended, `char`
//! and indices are zero-extended, and floating point values are zero-extended to the right
//! (the stored bytes are the most significant ones).

use crate::{
    dex::{
        heap::{checked_count, HeapBuilder, HeapValue},
        tables::TableId,
    },
    file::parser::Parser,
    Error, Result,
};

const VALUE_BYTE: u8 = 0x00;
const VALUE_SHORT: u8 = 0x02;
const VALUE_CHAR: u8 = 0x03;
const VALUE_INT: u8 = 0x04;
const VALUE_LONG: u8 = 0x06;
const VALUE_FLOAT: u8 = 0x10;
const VALUE_DOUBLE: u8 = 0x11;
const VALUE_METHOD_TYPE: u8 = 0x15;
const VALUE_METHOD_HANDLE: u8 = 0x16;
const VALUE_STRING: u8 = 0x17;
const VALUE_TYPE: u8 = 0x18;
const VALUE_FIELD: u8 = 0x19;
const VALUE_METHOD: u8 = 0x1a;
const VALUE_ENUM: u8 = 0x1b;
const VALUE_ARRAY: u8 = 0x1c;
const VALUE_ANNOTATION: u8 = 0x1d;
const VALUE_NULL: u8 = 0x1e;
const VALUE_BOOLEAN: u8 = 0x1f;

/// A single `encoded_value`.
///
/// Index kinds hold the index into their table, already checked against its row count.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedValue {
    /// Signed one-byte integer
    Byte(i8),
    /// Signed two-byte integer
    Short(i16),
    /// Unsigned two-byte integer
    Char(u16),
    /// Signed four-byte integer
    Int(i32),
    /// Signed eight-byte integer
    Long(i64),
    /// IEEE754 32-bit float
    Float(f32),
    /// IEEE754 64-bit float
    Double(f64),
    /// Index into the proto table
    MethodType(u32),
    /// Index into the method handle table
    MethodHandle(u32),
    /// Index into the string table
    String(u32),
    /// Index into the type table
    Type(u32),
    /// Index into the field table
    Field(u32),
    /// Index into the method table
    Method(u32),
    /// Index into the field table of an enum constant
    Enum(u32),
    /// Nested array
    Array(EncodedArray),
    /// Nested annotation
    Annotation(EncodedAnnotation),
    /// The `null` reference
    Null,
    /// Boolean, stored in `value_arg`
    Boolean(bool),
}

/// An `encoded_array`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedArray {
    /// The elements
    pub values: Vec<EncodedValue>,
}

/// An `encoded_annotation`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedAnnotation {
    /// Index into the type table of the annotation type
    pub type_idx: u32,
    /// Name-value pairs, in the order stored
    pub elements: Vec<AnnotationElement>,
}

/// One `annotation_element`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationElement {
    /// Index into the string table of the element name
    pub name_idx: u32,
    /// The element value
    pub value: EncodedValue,
}

fn payload_width(position: usize, value_type: u8, value_arg: u8, max: usize) -> Result<usize> {
    let width = usize::from(value_arg) + 1;
    if width > max {
        return Err(malformed_error!(
            position,
            "Invalid width {} for encoded value type 0x{:02x}",
            width,
            value_type
        ));
    }

    Ok(width)
}

fn no_value_arg(position: usize, value_type: u8, value_arg: u8) -> Result<()> {
    if value_arg != 0 {
        return Err(malformed_error!(
            position,
            "Encoded value type 0x{:02x} does not take an argument ({})",
            value_type,
            value_arg
        ));
    }

    Ok(())
}

fn check_depth(parser: &Parser<'_>, heap: &HeapBuilder<'_>, depth: usize) -> Result<()> {
    let limit = heap.config().max_encoded_depth;
    if depth > limit {
        return Err(Error::RecursionLimit {
            limit,
            offset: parser.pos(),
        });
    }

    Ok(())
}

impl EncodedValue {
    /// Reads one value; `depth` is the nesting level of the enclosing array or annotation.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown kinds and invalid widths,
    /// [`crate::Error::IndexOutOfRange`] for index kinds naming a missing row and
    /// [`crate::Error::RecursionLimit`] if nesting exceeds the configured depth.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn read(parser: &mut Parser<'_>, heap: &HeapBuilder<'_>, depth: usize) -> Result<Self> {
        let position = parser.pos();
        let header = parser.read::<u8>()?;
        let value_type = header & 0x1F;
        let value_arg = header >> 5;
        let payload = parser.pos();

        let index = |parser: &mut Parser<'_>, table: TableId| -> Result<u32> {
            let width = payload_width(position, value_type, value_arg, 4)?;
            let index = parser.read_sized_uint(width)? as u32;
            heap.sizes().check(table, index, payload)
        };

        Ok(match value_type {
            VALUE_BYTE => {
                let width = payload_width(position, value_type, value_arg, 1)?;
                EncodedValue::Byte(parser.read_sized_int(width)? as i8)
            }
            VALUE_SHORT => {
                let width = payload_width(position, value_type, value_arg, 2)?;
                EncodedValue::Short(parser.read_sized_int(width)? as i16)
            }
            VALUE_CHAR => {
                let width = payload_width(position, value_type, value_arg, 2)?;
                EncodedValue::Char(parser.read_sized_uint(width)? as u16)
            }
            VALUE_INT => {
                let width = payload_width(position, value_type, value_arg, 4)?;
                EncodedValue::Int(parser.read_sized_int(width)? as i32)
            }
            VALUE_LONG => {
                let width = payload_width(position, value_type, value_arg, 8)?;
                EncodedValue::Long(parser.read_sized_int(width)?)
            }
            VALUE_FLOAT => {
                let width = payload_width(position, value_type, value_arg, 4)?;
                let bits = parser.read_sized_uint(width)? << ((4 - width) * 8);
                EncodedValue::Float(f32::from_bits(bits as u32))
            }
            VALUE_DOUBLE => {
                let width = payload_width(position, value_type, value_arg, 8)?;
                let bits = parser.read_sized_uint(width)? << ((8 - width) * 8);
                EncodedValue::Double(f64::from_bits(bits))
            }
            VALUE_METHOD_TYPE => EncodedValue::MethodType(index(parser, TableId::Protos)?),
            VALUE_METHOD_HANDLE => {
                EncodedValue::MethodHandle(index(parser, TableId::MethodHandles)?)
            }
            VALUE_STRING => EncodedValue::String(index(parser, TableId::Strings)?),
            VALUE_TYPE => EncodedValue::Type(index(parser, TableId::Types)?),
            VALUE_FIELD => EncodedValue::Field(index(parser, TableId::Fields)?),
            VALUE_METHOD => EncodedValue::Method(index(parser, TableId::Methods)?),
            VALUE_ENUM => EncodedValue::Enum(index(parser, TableId::Fields)?),
            VALUE_ARRAY => {
                no_value_arg(position, value_type, value_arg)?;
                EncodedValue::Array(EncodedArray::read(parser, heap, depth + 1)?)
            }
            VALUE_ANNOTATION => {
                no_value_arg(position, value_type, value_arg)?;
                EncodedValue::Annotation(EncodedAnnotation::read(parser, heap, depth + 1)?)
            }
            VALUE_NULL => {
                no_value_arg(position, value_type, value_arg)?;
                EncodedValue::Null
            }
            VALUE_BOOLEAN => match value_arg {
                0 => EncodedValue::Boolean(false),
                1 => EncodedValue::Boolean(true),
                _ => {
                    return Err(malformed_error!(
                        position,
                        "Invalid boolean encoded value - {}",
                        value_arg
                    ))
                }
            },
            _ => {
                return Err(malformed_error!(
                    position,
                    "Unknown encoded value type 0x{:02x}",
                    value_type
                ))
            }
        })
    }
}

impl EncodedArray {
    /// Reads an array at nesting level `depth`.
    ///
    /// # Errors
    /// See [`EncodedValue::read`].
    pub fn read(parser: &mut Parser<'_>, heap: &HeapBuilder<'_>, depth: usize) -> Result<Self> {
        check_depth(parser, heap, depth)?;

        let size = parser.read_uleb128()?;
        let count = checked_count(parser, size, 1)?;

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(EncodedValue::read(parser, heap, depth)?);
        }

        Ok(EncodedArray { values })
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl EncodedAnnotation {
    /// Reads an annotation at nesting level `depth`.
    ///
    /// # Errors
    /// See [`EncodedValue::read`].
    pub fn read(parser: &mut Parser<'_>, heap: &HeapBuilder<'_>, depth: usize) -> Result<Self> {
        check_depth(parser, heap, depth)?;
        let sizes = heap.sizes();

        let type_pos = parser.pos();
        let type_idx = sizes.check(TableId::Types, parser.read_uleb128()?, type_pos)?;
        let size = parser.read_uleb128()?;
        let count = checked_count(parser, size, 2)?;

        let mut elements = Vec::with_capacity(count);
        for _ in 0..count {
            let name_pos = parser.pos();
            let name_idx = sizes.check(TableId::Strings, parser.read_uleb128()?, name_pos)?;
            elements.push(AnnotationElement {
                name_idx,
                value: EncodedValue::read(parser, heap, depth)?,
            });
        }

        Ok(EncodedAnnotation { type_idx, elements })
    }

    /// The value of the element named by string index `name_idx`.
    #[must_use]
    pub fn element(&self, name_idx: u32) -> Option<&EncodedValue> {
        self.elements
            .iter()
            .find(|element| element.name_idx == name_idx)
            .map(|element| &element.value)
    }
}

pub(crate) fn decode_array_item(
    heap: &mut HeapBuilder<'_>,
    parser: &mut Parser<'_>,
) -> Result<HeapValue> {
    Ok(HeapValue::EncodedArray(EncodedArray::read(parser, heap, 0)?))
}
