//! Access flags of classes, fields and methods.

use bitflags::bitflags;

bitflags! {
    /// Access flags as stored in `class_def_item`, `encoded_field` and `encoded_method`.
    ///
    /// Some bits carry a different meaning depending on the kind of member they are attached
    /// to (`0x40` is `volatile` on fields and `bridge` on methods, `0x80` is `transient` on
    /// fields and `varargs` on methods), so both names are defined for the same bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        /// Visible everywhere
        const PUBLIC = 0x0001;
        /// Only visible to the defining class
        const PRIVATE = 0x0002;
        /// Visible to package and subclasses
        const PROTECTED = 0x0004;
        /// Not constructed with an outer `this` reference / not bound to an instance
        const STATIC = 0x0008;
        /// Not subclassable / immutable / not overridable
        const FINAL = 0x0010;
        /// Associated lock acquired around calls (methods only)
        const SYNCHRONIZED = 0x0020;
        /// Special access rules for thread safety (fields only)
        const VOLATILE = 0x0040;
        /// Compiler generated bridge method (methods only)
        const BRIDGE = 0x0040;
        /// Not saved by default serialization (fields only)
        const TRANSIENT = 0x0080;
        /// Last argument is a rest argument (methods only)
        const VARARGS = 0x0080;
        /// Implemented in native code (methods only)
        const NATIVE = 0x0100;
        /// Multiply-implementable abstract class (classes only)
        const INTERFACE = 0x0200;
        /// Not directly instantiable / unimplemented
        const ABSTRACT = 0x0400;
        /// Strict floating point rules (methods only)
        const STRICT = 0x0800;
        /// Not directly defined in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation class (classes only)
        const ANNOTATION = 0x2000;
        /// Declared as an enumerated type or value
        const ENUM = 0x4000;
        /// Constructor method
        const CONSTRUCTOR = 0x1_0000;
        /// Declared `synchronized` (methods only)
        const DECLARED_SYNCHRONIZED = 0x2_0000;
    }
}

impl AccessFlags {
    /// Builds flags from a raw value, keeping bits without a name.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        AccessFlags::from_bits_retain(raw)
    }
}
