//! Merged tag views
//!
//! A [`MergedTagView`] is the end product of a merge: every attribute of
//! the tag type mapped to its effective value, with meta-level overrides
//! applied, alias groups reconciled, and defaults substituted. Views are
//! plain data; the typed accessors fail with [`MetaError`] when an
//! attribute is missing or holds a different shape than asked for.

use trellis_types::RawTypeId;

use crate::error::MetaError;
use crate::tag::TagInstance;
use crate::value::TagValue;

/// The fully merged attributes of one tag occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTagView {
    tag_type: RawTypeId,
    tag_name: String,
    values: Vec<(String, TagValue)>,
    validated: bool,
}

impl MergedTagView {
    pub(crate) fn new(
        tag_type: RawTypeId,
        tag_name: String,
        values: Vec<(String, TagValue)>,
        validated: bool,
    ) -> Self {
        MergedTagView {
            tag_type,
            tag_name,
            values,
            validated,
        }
    }

    /// The merged tag's type.
    pub fn tag_type(&self) -> RawTypeId {
        self.tag_type
    }

    /// The merged tag's registered name.
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Whether alias reconciliation ran over these values.
    pub fn validated(&self) -> bool {
        self.validated
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the tag declares no attributes.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate attributes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Look up a value by attribute name.
    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// The merged values as a plain instance with every attribute written
    /// out, ready to nest inside another tag value.
    pub fn to_instance(&self) -> TagInstance {
        TagInstance {
            tag_type: self.tag_type,
            values: self.values.clone(),
        }
    }

    fn required(&self, name: &str) -> Result<&TagValue, MetaError> {
        self.get(name).ok_or_else(|| MetaError::UnknownAttribute {
            tag: self.tag_name.clone(),
            attribute: name.to_string(),
        })
    }

    fn shape_error(&self, name: &str, expected: &str, found: &TagValue) -> MetaError {
        MetaError::ValueShape {
            tag: self.tag_name.clone(),
            attribute: name.to_string(),
            expected: expected.to_string(),
            found: found.kind_name().to_string(),
        }
    }

    /// Read a boolean attribute.
    pub fn get_bool(&self, name: &str) -> Result<bool, MetaError> {
        match self.required(name)? {
            TagValue::Bool(value) => Ok(*value),
            other => Err(self.shape_error(name, "bool", other)),
        }
    }

    /// Read an integer attribute.
    pub fn get_int(&self, name: &str) -> Result<i64, MetaError> {
        match self.required(name)? {
            TagValue::Int(value) => Ok(*value),
            other => Err(self.shape_error(name, "int", other)),
        }
    }

    /// Read a floating point attribute.
    pub fn get_float(&self, name: &str) -> Result<f64, MetaError> {
        match self.required(name)? {
            TagValue::Float(value) => Ok(*value),
            other => Err(self.shape_error(name, "float", other)),
        }
    }

    /// Read a string attribute.
    pub fn get_str(&self, name: &str) -> Result<&str, MetaError> {
        match self.required(name)? {
            TagValue::Str(value) => Ok(value),
            other => Err(self.shape_error(name, "string", other)),
        }
    }

    /// Read a type-reference attribute.
    pub fn get_type(&self, name: &str) -> Result<RawTypeId, MetaError> {
        match self.required(name)? {
            TagValue::TypeRef(id) => Ok(*id),
            other => Err(self.shape_error(name, "type reference", other)),
        }
    }

    /// Read a nested tag attribute. The instance carries its fully merged
    /// values; pass it to `MetaContext::merge_instance` for a typed view.
    pub fn get_tag(&self, name: &str) -> Result<&TagInstance, MetaError> {
        match self.required(name)? {
            TagValue::Tag(instance) => Ok(instance),
            other => Err(self.shape_error(name, "nested tag", other)),
        }
    }

    /// Read an array attribute.
    pub fn get_array(&self, name: &str) -> Result<&[TagValue], MetaError> {
        match self.required(name)? {
            TagValue::Array(items) => Ok(items),
            other => Err(self.shape_error(name, "array", other)),
        }
    }

    /// Read a string array attribute. A lone string is returned as a
    /// singleton.
    pub fn get_str_array(&self, name: &str) -> Result<Vec<&str>, MetaError> {
        match self.required(name)? {
            TagValue::Str(value) => Ok(vec![value.as_str()]),
            TagValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    TagValue::Str(value) => Ok(value.as_str()),
                    other => Err(self.shape_error(name, "string array", other)),
                })
                .collect(),
            other => Err(self.shape_error(name, "string array", other)),
        }
    }

    /// Read a type-reference array attribute. A lone reference is returned
    /// as a singleton.
    pub fn get_type_array(&self, name: &str) -> Result<Vec<RawTypeId>, MetaError> {
        match self.required(name)? {
            TagValue::TypeRef(id) => Ok(vec![*id]),
            TagValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    TagValue::TypeRef(id) => Ok(*id),
                    other => Err(self.shape_error(name, "type array", other)),
                })
                .collect(),
            other => Err(self.shape_error(name, "type array", other)),
        }
    }

    /// Read a nested tag array attribute.
    pub fn get_tag_array(&self, name: &str) -> Result<Vec<&TagInstance>, MetaError> {
        match self.required(name)? {
            TagValue::Tag(instance) => Ok(vec![instance]),
            TagValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    TagValue::Tag(instance) => Ok(instance),
                    other => Err(self.shape_error(name, "tag array", other)),
                })
                .collect(),
            other => Err(self.shape_error(name, "tag array", other)),
        }
    }
}
