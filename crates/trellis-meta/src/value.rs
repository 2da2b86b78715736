//! Tag attribute values
//!
//! [`TagValue`] is the value domain for tag attributes: primitives, strings,
//! type references, nested tag instances, and arrays of any of these.
//! Equality is structural; floats compare by bit pattern so that values can
//! sit in hash-backed alias groups and instance maps without surprises.

use std::fmt;

use trellis_types::RawTypeId;

use crate::tag::TagInstance;

/// A single attribute value carried by a tag instance.
#[derive(Debug, Clone)]
pub enum TagValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
    /// Reference to a registered raw type
    TypeRef(RawTypeId),
    /// Nested tag instance
    Tag(TagInstance),
    /// Homogeneous array of values
    Array(Vec<TagValue>),
}

impl TagValue {
    /// Convenience constructor for string values.
    pub fn str(value: impl Into<String>) -> Self {
        TagValue::Str(value.into())
    }

    /// Convenience constructor for string arrays.
    pub fn str_array<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TagValue::Array(values.into_iter().map(|v| TagValue::Str(v.into())).collect())
    }

    /// A short name for the value's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TagValue::Bool(_) => "bool",
            TagValue::Int(_) => "int",
            TagValue::Float(_) => "float",
            TagValue::Str(_) => "string",
            TagValue::TypeRef(_) => "type reference",
            TagValue::Tag(_) => "nested tag",
            TagValue::Array(_) => "array",
        }
    }
}

impl PartialEq for TagValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TagValue::Bool(a), TagValue::Bool(b)) => a == b,
            (TagValue::Int(a), TagValue::Int(b)) => a == b,
            (TagValue::Float(a), TagValue::Float(b)) => a.to_bits() == b.to_bits(),
            (TagValue::Str(a), TagValue::Str(b)) => a == b,
            (TagValue::TypeRef(a), TagValue::TypeRef(b)) => a == b,
            (TagValue::Tag(a), TagValue::Tag(b)) => a == b,
            (TagValue::Array(a), TagValue::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TagValue {}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(v) => write!(f, "{v}"),
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::Float(v) => write!(f, "{v}"),
            TagValue::Str(v) => write!(f, "\"{v}\""),
            TagValue::TypeRef(id) => write!(f, "type#{}", id.as_u32()),
            TagValue::Tag(instance) => write!(f, "@tag#{}", instance.tag_type.as_u32()),
            TagValue::Array(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}
