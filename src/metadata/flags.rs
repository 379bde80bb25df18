//! Attribute flags for types and members, following the ECMA-335 bit layout.
//!
//! The loader boundary hands these through unchanged from the binary metadata, so the
//! constants keep their on-disk values. Only the bits the rename and string-hiding passes
//! actually consult are modelled; unknown bits are preserved by `from_bits_retain` style
//! construction on the loader side.

use bitflags::bitflags;

/// Bitmask for the visibility portion of [`TypeAttributes`]
pub const TYPE_VISIBILITY_MASK: u32 = 0x0000_0007;
/// Bitmask for the access portion of [`MethodAttributes`]
pub const METHOD_ACCESS_MASK: u32 = 0x0007;
/// Bitmask for the access portion of [`FieldAttributes`]
pub const FIELD_ACCESS_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Type definition attributes
    pub struct TypeAttributes: u32 {
        /// Type is not visible outside the module
        const NOT_PUBLIC = 0x0000_0000;
        /// Type is visible outside the module
        const PUBLIC = 0x0000_0001;
        /// Nested type with private visibility
        const NESTED_PRIVATE = 0x0000_0003;
        /// Class layout is specified explicitly
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Name is special, the name records how
        const SPECIAL_NAME = 0x0000_0400;
        /// Strings are interpreted as ANSI
        const ANSI_CLASS = 0x0000_0000;
        /// Automatic string interpretation
        const AUTO_CLASS = 0x0002_0000;
        /// Initialize the class before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
        /// Runtime shall treat the name as special
        const RT_SPECIAL_NAME = 0x0000_0800;
    }
}

impl TypeAttributes {
    /// Whether the type is visible outside its assembly (top-level public)
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.bits() & TYPE_VISIBILITY_MASK == Self::PUBLIC.bits()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Method definition attributes
    pub struct MethodAttributes: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name and signature, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Name is special, the name records how
        const SPECIAL_NAME = 0x0800;
        /// Runtime shall treat the name as special
        const RT_SPECIAL_NAME = 0x1000;
    }
}

impl MethodAttributes {
    /// Whether the access bits mark the method public
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.bits() & METHOD_ACCESS_MASK == Self::PUBLIC.bits()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Field definition attributes
    pub struct FieldAttributes: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field cannot be changed after initialization
        const INIT_ONLY = 0x0020;
        /// Value is a compile-time constant
        const LITERAL = 0x0040;
        /// Name is special, the name records how
        const SPECIAL_NAME = 0x0200;
        /// Runtime shall treat the name as special
        const RT_SPECIAL_NAME = 0x0400;
        /// Field has an RVA-addressed initial value blob
        const HAS_FIELD_RVA = 0x0100;
    }
}

impl FieldAttributes {
    /// Whether the access bits mark the field public
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.bits() & FIELD_ACCESS_MASK == Self::PUBLIC.bits()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Property definition attributes
    pub struct PropertyAttributes: u32 {
        /// Name is special, the name records how
        const SPECIAL_NAME = 0x0200;
        /// Runtime shall treat the name as special
        const RT_SPECIAL_NAME = 0x0400;
        /// Property has a default value
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Event definition attributes
    pub struct EventAttributes: u32 {
        /// Name is special, the name records how
        const SPECIAL_NAME = 0x0200;
        /// Runtime shall treat the name as special
        const RT_SPECIAL_NAME = 0x0400;
    }
}

/// Method implementation attributes, reduced to the distinction the rename pass needs:
/// whether the body is provided by the runtime rather than as IL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodImplKind {
    /// Method body is CIL
    #[default]
    Il,
    /// Method implementation is provided by the runtime
    Runtime,
    /// Method implementation is native code
    Native,
}

/// Accessor role a method plays for a property or event, from the method-semantics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodSemantics {
    /// Not an accessor
    #[default]
    None,
    /// Property getter
    Getter,
    /// Property setter
    Setter,
    /// Event subscribe accessor
    AddOn,
    /// Event unsubscribe accessor
    RemoveOn,
    /// Event raise accessor
    Fire,
    /// Other association (e.g. indexer helper)
    Other,
}
