//! Attribute tables
//!
//! An [`AttributeTable`] is the resolved view of one tag type's declared
//! attributes: names in declaration order, value types resolved to
//! descriptors through the type context, and defaults shape-checked against
//! their declarations. Tables are built once per tag type and cached on the
//! merge context.

use std::sync::Arc;

use trellis_types::{RawTypeId, TypeContext, TypeDescriptor, TypeExpr};

use crate::error::MetaError;
use crate::tag::{AliasDecl, TagRegistry, ValueTypes};
use crate::value::TagValue;

/// One resolved attribute declaration.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    /// Attribute name
    pub name: String,
    /// Declared value type, resolved to a descriptor
    pub value_type: Arc<TypeDescriptor>,
    /// Declared default, shape-adapted to the declared type
    pub default: Option<TagValue>,
    /// Alias declaration carried over from the definition
    pub alias: Option<AliasDecl>,
    /// The declaring tag type
    pub declared_by: RawTypeId,
}

/// The resolved attribute declarations of one tag type, in declaration
/// order.
#[derive(Debug)]
pub struct AttributeTable {
    tag_type: RawTypeId,
    tag_name: String,
    attributes: Vec<AttributeDescriptor>,
}

impl AttributeTable {
    /// Resolve the declared attributes of `tag_type` against the type
    /// context. Fails when the type is not a registered tag or a declared
    /// default does not fit its attribute's value type.
    pub(crate) fn build(
        types: &TypeContext,
        tags: &TagRegistry,
        tag_type: RawTypeId,
    ) -> Result<AttributeTable, MetaError> {
        let tag_name = types.registry().get(tag_type).name.clone();
        let def = tags.tag_def(tag_type).ok_or(MetaError::UnknownTagType {
            name: tag_name.clone(),
        })?;

        let mut attributes = Vec::with_capacity(def.attributes.len());
        for attribute in &def.attributes {
            let value_type = types.for_expr(attribute.value_type.clone(), None);
            let default = match &attribute.default {
                Some(default) => Some(
                    adapt_value(tags.value_types(), &attribute.value_type, default).ok_or_else(
                        || MetaError::ValueShape {
                            tag: tag_name.clone(),
                            attribute: attribute.name.clone(),
                            expected: types.display(&value_type),
                            found: default.kind_name().to_string(),
                        },
                    )?,
                ),
                None => None,
            };
            attributes.push(AttributeDescriptor {
                name: attribute.name.clone(),
                value_type,
                default,
                alias: attribute.alias.clone(),
                declared_by: tag_type,
            });
        }

        Ok(AttributeTable {
            tag_type,
            tag_name,
            attributes,
        })
    }

    /// The described tag type.
    pub fn tag_type(&self) -> RawTypeId {
        self.tag_type
    }

    /// The described tag's registered name.
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Iterate attributes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter()
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check whether the tag declares no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Check a value against a declared type expression.
///
/// Primitive shapes match through the registered marker types, any other
/// raw type expects a nested instance of that tag type, and arrays match
/// element-wise.
pub(crate) fn value_matches(value_types: &ValueTypes, expected: &TypeExpr, value: &TagValue) -> bool {
    match (expected, value) {
        (TypeExpr::Array(inner), TagValue::Array(items)) => {
            items.iter().all(|item| value_matches(value_types, inner, item))
        }
        (TypeExpr::Raw(id), value) => {
            if *id == value_types.boolean {
                matches!(value, TagValue::Bool(_))
            } else if *id == value_types.int {
                matches!(value, TagValue::Int(_))
            } else if *id == value_types.float {
                matches!(value, TagValue::Float(_))
            } else if *id == value_types.string {
                matches!(value, TagValue::Str(_))
            } else if *id == value_types.type_ref {
                matches!(value, TagValue::TypeRef(_))
            } else {
                matches!(value, TagValue::Tag(instance) if instance.tag_type == *id)
            }
        }
        _ => false,
    }
}

/// Fit a value to a declared type, wrapping a lone scalar into a singleton
/// array when the declaration expects an array of that scalar. Returns
/// `None` when the value cannot fit.
pub(crate) fn adapt_value(
    value_types: &ValueTypes,
    expected: &TypeExpr,
    value: &TagValue,
) -> Option<TagValue> {
    if value_matches(value_types, expected, value) {
        return Some(value.clone());
    }
    if let TypeExpr::Array(inner) = expected {
        if value_matches(value_types, inner, value) {
            return Some(TagValue::Array(vec![value.clone()]));
        }
    }
    None
}
