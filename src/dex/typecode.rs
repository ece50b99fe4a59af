//! Type codes of the DEX map list.
//!
//! Every section of a DEX file is described in the map list by a 16-bit type code. The codes
//! `0x0000..=0x0008` name the header and the fixed-stride index tables; the remaining codes
//! name the variable-layout items that live in the data section and are decoded through the
//! [`crate::dex::heap`].

use strum::{Display, EnumCount, EnumIter};

use crate::{Error, Result};

/// A DEX map list type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "snake_case")]
#[repr(u16)]
pub enum TypeCode {
    /// `header_item`
    HeaderItem = 0x0000,
    /// `string_id_item`
    StringIdItem = 0x0001,
    /// `type_id_item`
    TypeIdItem = 0x0002,
    /// `proto_id_item`
    ProtoIdItem = 0x0003,
    /// `field_id_item`
    FieldIdItem = 0x0004,
    /// `method_id_item`
    MethodIdItem = 0x0005,
    /// `class_def_item`
    ClassDefItem = 0x0006,
    /// `call_site_id_item`
    CallSiteIdItem = 0x0007,
    /// `method_handle_item`
    MethodHandleItem = 0x0008,
    /// `map_list`
    MapList = 0x1000,
    /// `type_list`
    TypeList = 0x1001,
    /// `annotation_set_ref_list`
    AnnotationSetRefList = 0x1002,
    /// `annotation_set_item`
    AnnotationSetItem = 0x1003,
    /// `class_data_item`
    ClassDataItem = 0x2000,
    /// `code_item`
    CodeItem = 0x2001,
    /// `string_data_item`
    StringDataItem = 0x2002,
    /// `debug_info_item`
    DebugInfoItem = 0x2003,
    /// `annotation_item`
    AnnotationItem = 0x2004,
    /// `encoded_array_item`
    EncodedArrayItem = 0x2005,
    /// `annotations_directory_item`
    AnnotationsDirectoryItem = 0x2006,
    /// `hiddenapi_class_data_item`
    HiddenapiClassDataItem = 0xF000,
}

impl TypeCode {
    /// Decodes a raw type code, `offset` being the position it was read from.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownTypeCode`] for codes the format does not define.
    pub fn from_raw(code: u16, offset: usize) -> Result<TypeCode> {
        Ok(match code {
            0x0000 => TypeCode::HeaderItem,
            0x0001 => TypeCode::StringIdItem,
            0x0002 => TypeCode::TypeIdItem,
            0x0003 => TypeCode::ProtoIdItem,
            0x0004 => TypeCode::FieldIdItem,
            0x0005 => TypeCode::MethodIdItem,
            0x0006 => TypeCode::ClassDefItem,
            0x0007 => TypeCode::CallSiteIdItem,
            0x0008 => TypeCode::MethodHandleItem,
            0x1000 => TypeCode::MapList,
            0x1001 => TypeCode::TypeList,
            0x1002 => TypeCode::AnnotationSetRefList,
            0x1003 => TypeCode::AnnotationSetItem,
            0x2000 => TypeCode::ClassDataItem,
            0x2001 => TypeCode::CodeItem,
            0x2002 => TypeCode::StringDataItem,
            0x2003 => TypeCode::DebugInfoItem,
            0x2004 => TypeCode::AnnotationItem,
            0x2005 => TypeCode::EncodedArrayItem,
            0x2006 => TypeCode::AnnotationsDirectoryItem,
            0xF000 => TypeCode::HiddenapiClassDataItem,
            _ => return Err(Error::UnknownTypeCode { code, offset }),
        })
    }

    /// The raw 16-bit value.
    #[must_use]
    pub fn raw(self) -> u16 {
        self as u16
    }

    /// `true` for item types that live in the data section and are decoded by the heap.
    #[must_use]
    pub fn is_data_item(self) -> bool {
        self.raw() >= 0x1000
    }

    /// Required alignment of items of this type.
    #[must_use]
    pub fn alignment(self) -> usize {
        match self {
            TypeCode::ClassDataItem
            | TypeCode::StringDataItem
            | TypeCode::DebugInfoItem
            | TypeCode::AnnotationItem
            | TypeCode::EncodedArrayItem => 1,
            _ => 4,
        }
    }

    /// Size of one entry for the fixed-stride index tables, `None` for everything else.
    #[must_use]
    pub fn stride(self) -> Option<usize> {
        match self {
            TypeCode::HeaderItem => Some(0x70),
            TypeCode::StringIdItem | TypeCode::TypeIdItem | TypeCode::CallSiteIdItem => Some(4),
            TypeCode::ProtoIdItem => Some(12),
            TypeCode::FieldIdItem | TypeCode::MethodIdItem | TypeCode::MethodHandleItem => {
                Some(8)
            }
            TypeCode::ClassDefItem => Some(32),
            _ => None,
        }
    }
}
