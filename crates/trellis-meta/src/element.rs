//! Taggable program elements
//!
//! Tags attach to classes, methods, and fields. [`Element`] identifies one of
//! those attachment points by its registry id, and is the key under which
//! declared tag instances are stored and hierarchy searches are deduplicated.

use std::fmt;

use trellis_types::{FieldId, MethodId, RawTypeId};

/// A program element that tag instances can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    /// A registered class, interface, or tag type
    Class(RawTypeId),
    /// A method of a registered type
    Method(MethodId),
    /// A field of a registered type
    Field(FieldId),
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Class(id) => write!(f, "class#{}", id.as_u32()),
            Element::Method(id) => write!(f, "method#{}", id.as_u32()),
            Element::Field(id) => write!(f, "field#{}", id.as_u32()),
        }
    }
}
