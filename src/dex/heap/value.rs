use crate::dex::{
    heap::{
        AnnotationItem, AnnotationSet, AnnotationSetRefList, AnnotationsDirectory, ClassData,
        CodeItem, DebugInfo, EncodedArray, HiddenApiClassData, MapList, StringData, TypeList,
    },
    typecode::TypeCode,
};

/// Typed access to one data item shape stored in a [`HeapValue`].
pub trait HeapItem: Sized {
    /// Type code items of this shape are decoded as.
    const TYPE_CODE: TypeCode;

    /// Returns the item if `value` holds this shape.
    fn from_value(value: &HeapValue) -> Option<&Self>;
}

macro_rules! heap_values {
    ($($variant:ident($ty:ty) = $code:ident, $accessor:ident;)*) => {
        /// A decoded data item, one variant per data item type code.
        #[derive(Debug, Clone, PartialEq)]
        pub enum HeapValue {
            $(
                #[doc = concat!("A `", stringify!($ty), "`")]
                $variant($ty),
            )*
        }

        impl HeapValue {
            /// The type code this value was decoded as.
            #[must_use]
            pub fn type_code(&self) -> TypeCode {
                match self {
                    $(HeapValue::$variant(_) => TypeCode::$code,)*
                }
            }

            $(
                #[doc = concat!("Returns the `", stringify!($ty), "` if this value holds one.")]
                #[must_use]
                pub fn $accessor(&self) -> Option<&$ty> {
                    match self {
                        HeapValue::$variant(value) => Some(value),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            )*
        }

        $(
            impl HeapItem for $ty {
                const TYPE_CODE: TypeCode = TypeCode::$code;

                fn from_value(value: &HeapValue) -> Option<&Self> {
                    value.$accessor()
                }
            }

            impl From<$ty> for HeapValue {
                fn from(value: $ty) -> Self {
                    HeapValue::$variant(value)
                }
            }
        )*
    };
}

heap_values! {
    MapList(MapList) = MapList, as_map_list;
    TypeList(TypeList) = TypeList, as_type_list;
    AnnotationSetRefList(AnnotationSetRefList) = AnnotationSetRefList, as_annotation_set_ref_list;
    AnnotationSet(AnnotationSet) = AnnotationSetItem, as_annotation_set;
    ClassData(ClassData) = ClassDataItem, as_class_data;
    Code(CodeItem) = CodeItem, as_code;
    StringData(StringData) = StringDataItem, as_string_data;
    DebugInfo(DebugInfo) = DebugInfoItem, as_debug_info;
    Annotation(AnnotationItem) = AnnotationItem, as_annotation;
    EncodedArray(EncodedArray) = EncodedArrayItem, as_encoded_array;
    AnnotationsDirectory(AnnotationsDirectory) = AnnotationsDirectoryItem, as_annotations_directory;
    HiddenApiClassData(HiddenApiClassData) = HiddenapiClassDataItem, as_hidden_api_class_data;
}
