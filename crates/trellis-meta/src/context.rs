//! Merge context
//!
//! [`MetaContext`] ties the three inputs of the merge engine together: the
//! type context (for attribute value types and hierarchy navigation), the
//! tag registry (declarations and attachments), and a failure sink for
//! recoverable introspection errors. It owns the per-tag-type caches:
//! attribute tables, validated alias maps, and meta-presence answers.
//!
//! The hierarchy searches and the synthesis pipeline are implemented in
//! `search` and `merge` as further `impl` blocks on this type.

use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use trellis_types::{RawTypeId, TypeContext, TypeExpr};

use crate::attributes::AttributeTable;
use crate::element::Element;
use crate::error::{FailureSink, MetaError, StderrSink};
use crate::tag::{TagInstance, TagRegistry};
use crate::value::TagValue;

static STDERR_SINK: StderrSink = StderrSink;

/// Shared state for tag searches and merges.
///
/// Borrows the type context and tag registry; queries take `&self`, so one
/// context can serve concurrent readers.
pub struct MetaContext<'a> {
    types: &'a TypeContext,
    tags: &'a TagRegistry,
    sink: &'a dyn FailureSink,
    attribute_tables: DashMap<RawTypeId, Arc<AttributeTable>>,
    alias_maps: DashMap<RawTypeId, Arc<FxHashMap<String, Vec<String>>>>,
    meta_present: DashMap<(RawTypeId, RawTypeId), bool>,
}

impl<'a> MetaContext<'a> {
    /// Create a context reporting recoverable failures to stderr.
    pub fn new(types: &'a TypeContext, tags: &'a TagRegistry) -> Self {
        MetaContext::with_sink(types, tags, &STDERR_SINK)
    }

    /// Create a context reporting recoverable failures to `sink`.
    pub fn with_sink(
        types: &'a TypeContext,
        tags: &'a TagRegistry,
        sink: &'a dyn FailureSink,
    ) -> Self {
        MetaContext {
            types,
            tags,
            sink,
            attribute_tables: DashMap::new(),
            alias_maps: DashMap::new(),
            meta_present: DashMap::new(),
        }
    }

    /// The underlying type context.
    pub fn types(&self) -> &TypeContext {
        self.types
    }

    /// The underlying tag registry.
    pub fn tags(&self) -> &TagRegistry {
        self.tags
    }

    pub(crate) fn report(&self, error: &MetaError) {
        self.sink.report(error);
    }

    pub(crate) fn type_name(&self, id: RawTypeId) -> String {
        self.types.registry().get(id).name.clone()
    }

    /// A readable description of an element for error messages.
    pub(crate) fn describe(&self, element: Element) -> String {
        match element {
            Element::Class(id) => self.type_name(id),
            Element::Method(id) => {
                let method = self.types.registry().method(id);
                format!("{}.{}()", self.type_name(method.owner), method.name)
            }
            Element::Field(id) => {
                let field = self.types.registry().field(id);
                format!("{}.{}", self.type_name(field.owner), field.name)
            }
        }
    }

    /// The resolved attribute table of a tag type, built once and cached.
    pub fn attribute_table(&self, tag_type: RawTypeId) -> Result<Arc<AttributeTable>, MetaError> {
        if let Some(hit) = self.attribute_tables.get(&tag_type) {
            return Ok(hit.value().clone());
        }
        let table = Arc::new(AttributeTable::build(self.types, self.tags, tag_type)?);
        self.attribute_tables.insert(tag_type, table.clone());
        Ok(table)
    }

    /// The declared default of one attribute; `None` when the attribute is
    /// required.
    pub fn default_of(
        &self,
        tag_type: RawTypeId,
        attribute: &str,
    ) -> Result<Option<TagValue>, MetaError> {
        let table = self.attribute_table(tag_type)?;
        let descriptor = table
            .get(attribute)
            .ok_or_else(|| MetaError::UnknownAttribute {
                tag: table.tag_name().to_string(),
                attribute: attribute.to_string(),
            })?;
        Ok(descriptor.default.clone())
    }

    /// The validated alias map of a tag type: each aliased attribute mapped
    /// to the attributes it is aliased with. Building the map runs the full
    /// alias validation chain, so the first query against a broken tag type
    /// surfaces the configuration error.
    pub fn alias_map(
        &self,
        tag_type: RawTypeId,
    ) -> Result<Arc<FxHashMap<String, Vec<String>>>, MetaError> {
        if let Some(hit) = self.alias_maps.get(&tag_type) {
            return Ok(hit.value().clone());
        }
        let map = Arc::new(self.build_alias_map(tag_type)?);
        self.alias_maps.insert(tag_type, map.clone());
        Ok(map)
    }

    /// Whether `target` is reachable from `tag_type` through declared tag
    /// instances, skipping intrinsic plumbing tags.
    pub fn is_meta_present(&self, tag_type: RawTypeId, target: RawTypeId) -> bool {
        if let Some(hit) = self.meta_present.get(&(tag_type, target)) {
            return *hit;
        }
        let mut visited = FxHashSet::default();
        let result = self.meta_present_walk(tag_type, target, &mut visited);
        self.meta_present.insert((tag_type, target), result);
        result
    }

    fn meta_present_walk(
        &self,
        current: RawTypeId,
        target: RawTypeId,
        visited: &mut FxHashSet<RawTypeId>,
    ) -> bool {
        if !visited.insert(current) {
            return false;
        }
        for instance in self.tags.declared(Element::Class(current)) {
            if instance.tag_type == target {
                return true;
            }
            if self.is_intrinsic(instance.tag_type) {
                continue;
            }
            if self.meta_present_walk(instance.tag_type, target, visited) {
                return true;
            }
        }
        false
    }

    pub(crate) fn is_intrinsic(&self, tag_type: RawTypeId) -> bool {
        self.tags
            .tag_def(tag_type)
            .map(|def| def.intrinsic)
            .unwrap_or(false)
    }

    /// Tag instances present on an element: everything declared directly,
    /// plus, for classes, instances of inheritance-visible tags declared on
    /// the nearest superclass that are not redeclared locally.
    pub fn present_instances(&self, element: Element) -> Vec<TagInstance> {
        let mut present = self.tags.declared(element).to_vec();
        if let Element::Class(class_id) = element {
            present.extend(self.inherited_instances(class_id));
        }
        present
    }

    /// Inherited class-level instances: for each inheritance-visible tag
    /// type, the instance from the nearest superclass declaring it, unless
    /// the class redeclares that tag itself.
    pub(crate) fn inherited_instances(&self, class_id: RawTypeId) -> Vec<TagInstance> {
        let mut seen: FxHashSet<RawTypeId> = self
            .tags
            .declared(Element::Class(class_id))
            .iter()
            .map(|instance| instance.tag_type)
            .collect();
        let mut inherited = Vec::new();
        let mut current = self.types.registry().superclass_id(class_id);
        while let Some(superclass) = current {
            for instance in self.tags.declared(Element::Class(superclass)) {
                let visible = self
                    .tags
                    .tag_def(instance.tag_type)
                    .map(|def| def.inherited)
                    .unwrap_or(false);
                if visible && seen.insert(instance.tag_type) {
                    inherited.push(instance.clone());
                }
            }
            current = self.types.registry().superclass_id(superclass);
        }
        inherited
    }

    /// Resolve the container type for a repeatable query: the explicit
    /// argument if given, otherwise the container the tag designates. The
    /// container's shape is validated either way.
    pub(crate) fn resolve_container(
        &self,
        tag_type: RawTypeId,
        container: Option<RawTypeId>,
    ) -> Result<RawTypeId, MetaError> {
        let def = self
            .tags
            .tag_def(tag_type)
            .ok_or_else(|| MetaError::UnknownTagType {
                name: self.type_name(tag_type),
            })?;
        let container = match container {
            Some(container) => container,
            None => def
                .repeatable_container
                .ok_or_else(|| MetaError::NotRepeatable {
                    tag: self.type_name(tag_type),
                })?,
        };
        self.validate_container(container, tag_type)?;
        Ok(container)
    }

    /// Check that `container` declares a `value` attribute typed exactly as
    /// an array of `repeatable`.
    pub(crate) fn validate_container(
        &self,
        container: RawTypeId,
        repeatable: RawTypeId,
    ) -> Result<(), MetaError> {
        let malformed = || MetaError::MalformedContainer {
            container: self.type_name(container),
            repeatable: self.type_name(repeatable),
        };
        let def = self.tags.tag_def(container).ok_or_else(malformed)?;
        let value = def.attribute("value").ok_or_else(malformed)?;
        if value.value_type != TypeExpr::array(TypeExpr::Raw(repeatable)) {
            return Err(malformed());
        }
        Ok(())
    }

    /// Validate one tag type's declarations: attribute table construction,
    /// the alias graph, and the designated container's shape.
    pub fn validate(&self, tag_type: RawTypeId) -> Result<(), MetaError> {
        self.attribute_table(tag_type)?;
        self.alias_map(tag_type)?;
        if let Some(container) = self
            .tags
            .tag_def(tag_type)
            .and_then(|def| def.repeatable_container)
        {
            self.validate_container(container, tag_type)?;
        }
        Ok(())
    }

    /// Drop every cached table, alias map, and presence answer.
    pub fn clear_caches(&self) {
        self.attribute_tables.clear();
        self.alias_maps.clear();
        self.meta_present.clear();
    }
}
