//! # dexscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dexscope library. Import this module to get quick access to the essential
//! types for DEX file analysis.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dexscope operations
pub use crate::Error;

/// The result type used throughout dexscope
pub use crate::Result;

/// Configuration of the checks run while decoding
pub use crate::LoaderConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Main entry point for DEX file analysis
pub use crate::DexFile;

/// Low-level file parsing utilities
pub use crate::{Endian, File, Parser};

// ================================================================================================
// Header, Tables and Type Codes
// ================================================================================================

/// The file header and its sections
pub use crate::dex::header::{Header, Section, NO_INDEX};

/// Index table rows and table access
pub use crate::dex::tables::{
    CallSiteId, ClassDef, FieldId, IndexTable, MethodHandle, MethodHandleKind, MethodId, ProtoId,
    StringId, TableId, TypeId,
};

/// Section and item type codes
pub use crate::dex::typecode::TypeCode;

/// Access flags of classes, fields and methods
pub use crate::dex::access::AccessFlags;

// ================================================================================================
// Data Items
// ================================================================================================

/// The decoded data section and its item shapes
pub use crate::dex::heap::{
    AnnotationItem, AnnotationSet, AnnotationsDirectory, ClassData, CodeItem, DataHeap,
    DebugInfo, EncodedAnnotation, EncodedArray, EncodedField, EncodedMethod, EncodedValue,
    HeapIndex, HeapValue, HiddenApiClassData, MapList, TypeList, Visibility,
};

/// Hidden API restrictions
pub use crate::dex::heap::{ApiRestriction, HiddenApiFlags};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Non-fatal findings collected while decoding
pub use crate::dex::diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics,
};
