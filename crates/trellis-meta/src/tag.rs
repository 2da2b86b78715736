//! Tag declarations and attachments
//!
//! The embedding environment declares its tag types here: each [`TagDef`]
//! lists the attributes a tag carries (name, declared value type, optional
//! default, optional alias declaration) and the tag-level flags that drive
//! hierarchy searches. [`TagRegistry`] holds the declarations plus the tag
//! instances attached to program elements, and is treated as immutable once
//! populated.
//!
//! Attribute value types are ordinary [`TypeExpr`]s over the raw-type
//! registry. [`ValueTypes`] names the marker types the embedder registered
//! for the primitive value shapes, so that instance values can be checked
//! against declarations.

use rustc_hash::FxHashMap;

use trellis_types::{RawTypeId, TypeExpr};

use crate::element::Element;
use crate::value::TagValue;

/// The marker raw types that stand for primitive attribute value shapes.
///
/// The embedder registers these in the raw-type registry once and hands
/// their ids to [`TagRegistry::new`]; attribute declarations then refer to
/// them through ordinary type expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueTypes {
    /// Marker type for boolean values
    pub boolean: RawTypeId,
    /// Marker type for integer values
    pub int: RawTypeId,
    /// Marker type for floating point values
    pub float: RawTypeId,
    /// Marker type for string values
    pub string: RawTypeId,
    /// Marker type for type-reference values
    pub type_ref: RawTypeId,
}

/// An alias declaration on an attribute.
///
/// The target attribute name can be given through either of two slots, and
/// the target tag type defaults to the declaring tag itself. An empty or
/// whitespace-only slot counts as unset; setting both slots is a
/// configuration error caught during validation, even when the two names
/// agree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasDecl {
    /// Target attribute name via the positional slot
    pub value: Option<String>,
    /// Target attribute name via the named slot
    pub attribute: Option<String>,
    /// Target tag type; `None` means the declaring tag
    pub tag_type: Option<RawTypeId>,
}

impl AliasDecl {
    /// Alias another attribute of the same tag (a mirror pair).
    pub fn to(attribute: impl Into<String>) -> Self {
        AliasDecl {
            value: None,
            attribute: Some(attribute.into()),
            tag_type: None,
        }
    }

    /// Override the same-named attribute of a meta-present tag.
    pub fn meta(tag_type: RawTypeId) -> Self {
        AliasDecl {
            value: None,
            attribute: None,
            tag_type: Some(tag_type),
        }
    }

    /// Override a named attribute of a meta-present tag.
    pub fn meta_attribute(tag_type: RawTypeId, attribute: impl Into<String>) -> Self {
        AliasDecl {
            value: None,
            attribute: Some(attribute.into()),
            tag_type: Some(tag_type),
        }
    }
}

/// A declared tag attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    /// Attribute name, unique within the tag
    pub name: String,
    /// Declared value type expression
    pub value_type: TypeExpr,
    /// Declared default; `None` makes the attribute required
    pub default: Option<TagValue>,
    /// Alias declaration, if any
    pub alias: Option<AliasDecl>,
}

impl AttributeDef {
    /// Declare an attribute with the given name and value type.
    pub fn new(name: impl Into<String>, value_type: TypeExpr) -> Self {
        AttributeDef {
            name: name.into(),
            value_type,
            default: None,
            alias: None,
        }
    }

    /// Set the declared default value.
    pub fn with_default(mut self, default: TagValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Attach an alias declaration.
    pub fn with_alias(mut self, alias: AliasDecl) -> Self {
        self.alias = Some(alias);
        self
    }
}

/// A tag type declaration: its attributes and search-relevant flags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagDef {
    /// Declared attributes, in declaration order
    pub attributes: Vec<AttributeDef>,
    /// The container tag that holds repeated instances of this tag
    pub repeatable_container: Option<RawTypeId>,
    /// Whether class-level instances are visible on subclasses
    pub inherited: bool,
    /// Whether this tag is intrinsic plumbing that searches skip over
    pub intrinsic: bool,
}

impl TagDef {
    /// Start an empty declaration.
    pub fn new() -> Self {
        TagDef::default()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Designate the container tag for repeated instances.
    pub fn with_repeatable_container(mut self, container: RawTypeId) -> Self {
        self.repeatable_container = Some(container);
        self
    }

    /// Mark class-level instances as visible on subclasses.
    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    /// Mark this tag as intrinsic plumbing.
    pub fn intrinsic(mut self) -> Self {
        self.intrinsic = true;
        self
    }

    /// Find a declared attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A tag instance: a tag type plus the attribute values that were written
/// out explicitly. Omitted attributes fall back to their declared defaults
/// during merging, and the distinction between an explicit value and an
/// omitted one is what alias reconciliation keys on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInstance {
    /// The instantiated tag type
    pub tag_type: RawTypeId,
    /// Explicitly written attribute values, in written order
    pub values: Vec<(String, TagValue)>,
}

impl TagInstance {
    /// Start an instance with no explicit values.
    pub fn new(tag_type: RawTypeId) -> Self {
        TagInstance {
            tag_type,
            values: Vec::new(),
        }
    }

    /// Set an attribute value.
    pub fn with(mut self, name: impl Into<String>, value: TagValue) -> Self {
        self.values.push((name.into(), value));
        self
    }

    /// Look up an explicitly written value by attribute name.
    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// The registry of tag declarations and element attachments.
#[derive(Debug)]
pub struct TagRegistry {
    defs: FxHashMap<RawTypeId, TagDef>,
    attached: FxHashMap<Element, Vec<TagInstance>>,
    value_types: ValueTypes,
}

impl TagRegistry {
    /// Create an empty registry over the given primitive marker types.
    pub fn new(value_types: ValueTypes) -> Self {
        TagRegistry {
            defs: FxHashMap::default(),
            attached: FxHashMap::default(),
            value_types,
        }
    }

    /// Register a tag type declaration.
    ///
    /// # Panics
    ///
    /// Panics if the tag type is already registered or declares two
    /// attributes with the same name.
    pub fn register_tag(&mut self, tag_type: RawTypeId, def: TagDef) {
        for (index, attribute) in def.attributes.iter().enumerate() {
            let clash = def.attributes[..index]
                .iter()
                .any(|earlier| earlier.name == attribute.name);
            assert!(
                !clash,
                "tag type #{} declares attribute '{}' twice",
                tag_type.as_u32(),
                attribute.name
            );
        }
        let previous = self.defs.insert(tag_type, def);
        assert!(
            previous.is_none(),
            "tag type #{} is already registered",
            tag_type.as_u32()
        );
    }

    /// Attach a tag instance to an element. Instances accumulate in
    /// attachment order.
    pub fn attach(&mut self, element: Element, instance: TagInstance) {
        self.attached.entry(element).or_default().push(instance);
    }

    /// Look up a tag type declaration.
    pub fn tag_def(&self, tag_type: RawTypeId) -> Option<&TagDef> {
        self.defs.get(&tag_type)
    }

    /// Check whether a raw type is a registered tag type.
    pub fn is_tag(&self, tag_type: RawTypeId) -> bool {
        self.defs.contains_key(&tag_type)
    }

    /// The tag instances declared directly on an element, in attachment
    /// order.
    pub fn declared(&self, element: Element) -> &[TagInstance] {
        self.attached
            .get(&element)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The primitive marker types this registry was built over.
    pub fn value_types(&self) -> &ValueTypes {
        &self.value_types
    }
}
