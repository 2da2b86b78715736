//! Merged view synthesis
//!
//! The synthesis pipeline sits on top of the hierarchy searches. Each
//! matched instance becomes a working attribute map: explicit values
//! shape-checked against the declarations, omitted attributes holding
//! default markers. As the search unwinds through composing instances,
//! nearer tags override the farther ones, explicitly through alias chains
//! and implicitly by the same-name convention. The final reconciliation
//! propagates non-default values across alias groups and substitutes
//! declared defaults; nested tag values are merged recursively on the way
//! out. The result is an immutable [`MergedTagView`].

use rustc_hash::FxHashSet;
use trellis_types::RawTypeId;

use crate::attributes::{adapt_value, AttributeTable};
use crate::context::MetaContext;
use crate::element::Element;
use crate::error::MetaError;
use crate::search::{Processor, SearchSpec};
use crate::tag::TagInstance;
use crate::value::TagValue;
use crate::view::MergedTagView;

/// A value slot mid-merge. The marker keeps "omitted, use the default"
/// distinguishable from "explicitly set to the default value" until alias
/// reconciliation has run.
#[derive(Debug, Clone)]
enum WorkingValue {
    Explicit(TagValue),
    Marker(TagValue),
}

/// One instance's attributes mid-merge, in declaration order.
#[derive(Debug, Clone)]
struct WorkingAttributes {
    tag_type: RawTypeId,
    values: Vec<(String, WorkingValue)>,
}

impl WorkingAttributes {
    fn get(&self, name: &str) -> Option<&WorkingValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn set_explicit(&mut self, name: &str, value: TagValue) {
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| n == name) {
            slot.1 = WorkingValue::Explicit(value);
        }
    }
}

/// Builds working maps for matched instances and cascades overrides as the
/// search unwinds.
struct MergedAttributesProcessor {
    aggregating: bool,
}

impl MergedAttributesProcessor {
    fn single() -> Self {
        MergedAttributesProcessor { aggregating: false }
    }

    fn aggregating() -> Self {
        MergedAttributesProcessor { aggregating: true }
    }
}

impl Processor for MergedAttributesProcessor {
    type Output = WorkingAttributes;

    fn process(
        &mut self,
        ctx: &MetaContext<'_>,
        _element: Element,
        instance: &TagInstance,
        _meta_depth: usize,
    ) -> Result<Option<WorkingAttributes>, MetaError> {
        ctx.working_map(instance).map(Some)
    }

    fn post_process(
        &mut self,
        ctx: &MetaContext<'_>,
        element: Element,
        instance: &TagInstance,
        result: &mut WorkingAttributes,
    ) -> Result<(), MetaError> {
        ctx.apply_overrides(instance, element, result)
    }

    fn aggregates(&self) -> bool {
        self.aggregating
    }
}

/// Answers presence without ever validating declarations.
struct PresenceProcessor;

impl Processor for PresenceProcessor {
    type Output = ();

    fn process(
        &mut self,
        _ctx: &MetaContext<'_>,
        _element: Element,
        _instance: &TagInstance,
        _meta_depth: usize,
    ) -> Result<Option<()>, MetaError> {
        Ok(Some(()))
    }
}

/// Records every tag type the search walks over, in discovery order.
#[derive(Default)]
struct CollectTypesProcessor {
    seen: FxHashSet<RawTypeId>,
    types: Vec<RawTypeId>,
}

impl Processor for CollectTypesProcessor {
    type Output = ();

    fn process(
        &mut self,
        _ctx: &MetaContext<'_>,
        _element: Element,
        instance: &TagInstance,
        _meta_depth: usize,
    ) -> Result<Option<()>, MetaError> {
        if self.seen.insert(instance.tag_type) {
            self.types.push(instance.tag_type);
        }
        Ok(None)
    }

    fn always_processes(&self) -> bool {
        true
    }
}

impl MetaContext<'_> {
    /// The merged view of `tag_type` on `element`: the element's declared
    /// and inherited instances plus their meta tags, searched with get
    /// semantics. `None` when the tag is nowhere present.
    pub fn get_merged(
        &self,
        element: Element,
        tag_type: RawTypeId,
    ) -> Result<Option<MergedTagView>, MetaError> {
        let mut processor = MergedAttributesProcessor::single();
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        let found = self.search_get(
            element,
            SearchSpec::for_tag(tag_type),
            &mut processor,
            &mut aggregate,
            &mut visited,
            0,
        )?;
        match found {
            Some(working) => self.finalize(working, Some(element)).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`MetaContext::get_merged`], but with find semantics: bridged
    /// and overridden method declarations, interfaces, and superclasses
    /// are searched too.
    pub fn find_merged(
        &self,
        element: Element,
        tag_type: RawTypeId,
    ) -> Result<Option<MergedTagView>, MetaError> {
        let mut processor = MergedAttributesProcessor::single();
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        let found = self.search_find(
            element,
            SearchSpec::for_tag(tag_type),
            &mut processor,
            &mut aggregate,
            &mut visited,
            0,
        )?;
        match found {
            Some(working) => self.finalize(working, Some(element)).map(Some),
            None => Ok(None),
        }
    }

    /// Every instance of a repeatable `tag_type` on `element`, standalone
    /// and container-held alike, merged in declaration order. Passing
    /// `container` overrides the tag's designated container type. An
    /// element without instances yields an empty vector.
    pub fn get_repeatable(
        &self,
        element: Element,
        tag_type: RawTypeId,
        container: Option<RawTypeId>,
    ) -> Result<Vec<MergedTagView>, MetaError> {
        let container = self.resolve_container(tag_type, container)?;
        let mut processor = MergedAttributesProcessor::aggregating();
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        if let Some(extra) = self.search_get(
            element,
            SearchSpec::repeatable(tag_type, container),
            &mut processor,
            &mut aggregate,
            &mut visited,
            0,
        )? {
            aggregate.push(extra);
        }
        aggregate
            .into_iter()
            .map(|working| self.finalize(working, Some(element)))
            .collect()
    }

    /// The find-semantics twin of [`MetaContext::get_repeatable`].
    /// Hierarchy levels are ordered top down: a superclass's instances
    /// come before the subclass's own.
    pub fn find_repeatable(
        &self,
        element: Element,
        tag_type: RawTypeId,
        container: Option<RawTypeId>,
    ) -> Result<Vec<MergedTagView>, MetaError> {
        let container = self.resolve_container(tag_type, container)?;
        let mut processor = MergedAttributesProcessor::aggregating();
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        if let Some(extra) = self.search_find(
            element,
            SearchSpec::repeatable(tag_type, container),
            &mut processor,
            &mut aggregate,
            &mut visited,
            0,
        )? {
            aggregate.push(extra);
        }
        aggregate
            .into_iter()
            .map(|working| self.finalize(working, Some(element)))
            .collect()
    }

    /// Every occurrence of `tag_type` a get search can reach from
    /// `element`, each merged separately, in discovery order.
    pub fn get_all_merged(
        &self,
        element: Element,
        tag_type: RawTypeId,
    ) -> Result<Vec<MergedTagView>, MetaError> {
        let mut processor = MergedAttributesProcessor::aggregating();
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        if let Some(extra) = self.search_get(
            element,
            SearchSpec::for_tag(tag_type),
            &mut processor,
            &mut aggregate,
            &mut visited,
            0,
        )? {
            aggregate.push(extra);
        }
        aggregate
            .into_iter()
            .map(|working| self.finalize(working, Some(element)))
            .collect()
    }

    /// Merge a detached instance directly, without any hierarchy search.
    /// Alias groups are reconciled and defaults substituted exactly as for
    /// searched instances.
    pub fn merge_instance(&self, instance: &TagInstance) -> Result<MergedTagView, MetaError> {
        self.merge_instance_on(instance, None)
    }

    /// Whether `tag_type` is present on `element`, directly, inherited, or
    /// as a meta tag. Presence never validates declarations; a broken
    /// alias graph still answers.
    pub fn is_tagged(&self, element: Element, tag_type: RawTypeId) -> bool {
        let mut processor = PresenceProcessor;
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        matches!(
            self.search_get(
                element,
                SearchSpec::for_tag(tag_type),
                &mut processor,
                &mut aggregate,
                &mut visited,
                0,
            ),
            Ok(Some(()))
        )
    }

    /// The tag types reachable from `element`'s `tag_type` instance
    /// through meta recursion alone, in discovery order. Empty when the
    /// element does not carry `tag_type`.
    pub fn meta_tag_types(&self, element: Element, tag_type: RawTypeId) -> Vec<RawTypeId> {
        let present = self
            .present_instances(element)
            .iter()
            .any(|instance| instance.tag_type == tag_type);
        if !present {
            return Vec::new();
        }
        let mut processor = CollectTypesProcessor::default();
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        let _ = self.search_get(
            Element::Class(tag_type),
            SearchSpec::everything(),
            &mut processor,
            &mut aggregate,
            &mut visited,
            1,
        );
        processor.types
    }

    /// Whether `element`'s `tag_type` instance composes any meta tags.
    pub fn has_meta_tag_types(&self, element: Element, tag_type: RawTypeId) -> bool {
        !self.meta_tag_types(element, tag_type).is_empty()
    }

    fn merge_instance_on(
        &self,
        instance: &TagInstance,
        element: Option<Element>,
    ) -> Result<MergedTagView, MetaError> {
        let working = self.working_map(instance)?;
        self.finalize(working, element)
    }

    /// Expand an instance into a working map: every declared attribute
    /// present, explicit values shape-adapted, omissions marked with their
    /// defaults.
    fn working_map(
        &self,
        instance: &TagInstance,
    ) -> Result<WorkingAttributes, MetaError> {
        let table = self.attribute_table(instance.tag_type)?;
        for (name, _) in &instance.values {
            if table.get(name).is_none() {
                return Err(MetaError::UnknownAttribute {
                    tag: table.tag_name().to_string(),
                    attribute: name.clone(),
                });
            }
        }
        let mut values = Vec::with_capacity(table.len());
        for attribute in table.iter() {
            let slot = match instance.get(&attribute.name) {
                Some(explicit) => {
                    let adapted = adapt_value(
                        self.tags().value_types(),
                        attribute.value_type.expr(),
                        explicit,
                    )
                    .ok_or_else(|| MetaError::ValueShape {
                        tag: table.tag_name().to_string(),
                        attribute: attribute.name.clone(),
                        expected: self.types().display(&attribute.value_type),
                        found: explicit.kind_name().to_string(),
                    })?;
                    WorkingValue::Explicit(adapted)
                }
                None => match &attribute.default {
                    Some(default) => WorkingValue::Marker(default.clone()),
                    None => {
                        return Err(MetaError::MissingRequiredAttribute {
                            tag: table.tag_name().to_string(),
                            attribute: attribute.name.clone(),
                        })
                    }
                },
            };
            values.push((attribute.name.clone(), slot));
        }
        Ok(WorkingAttributes {
            tag_type: instance.tag_type,
            values,
        })
    }

    /// Cascade one composing instance's values onto the working map of a
    /// tag found behind it. Explicit alias overrides write the target and
    /// all of the target's alias partners; attributes without an alias
    /// fall back to the same-name convention, which never touches `value`.
    /// The composing instance contributes its own merged values, so its
    /// declared defaults override too.
    fn apply_overrides(
        &self,
        lower: &TagInstance,
        element: Element,
        working: &mut WorkingAttributes,
    ) -> Result<(), MetaError> {
        let lower_table = self.attribute_table(lower.tag_type)?;
        let working_table = self.attribute_table(working.tag_type)?;
        let alias_map = self.alias_map(working.tag_type)?;
        let lower_view = self.merge_instance_on(lower, Some(element))?;

        let mut replaced: FxHashSet<String> = FxHashSet::default();
        for attribute in lower_table.iter() {
            let target =
                self.override_name_for(lower.tag_type, &attribute.name, working.tag_type)?;
            if let Some(target) = target {
                if replaced.contains(&target) {
                    continue;
                }
                let mut targets = vec![target.clone()];
                replaced.insert(target);
                if let Some(partners) = alias_map.get(&targets[0]) {
                    for partner in partners {
                        if replaced.insert(partner.clone()) {
                            targets.push(partner.clone());
                        }
                    }
                }
                if let Some(value) = lower_view.get(&attribute.name) {
                    for name in &targets {
                        self.write_override(&working_table, working, name, value)?;
                    }
                }
            } else if attribute.name != "value" && working.contains(&attribute.name) {
                if let Some(value) = lower_view.get(&attribute.name) {
                    self.write_override(&working_table, working, &attribute.name, value)?;
                }
            }
        }
        Ok(())
    }

    fn write_override(
        &self,
        table: &AttributeTable,
        working: &mut WorkingAttributes,
        name: &str,
        value: &TagValue,
    ) -> Result<(), MetaError> {
        if let Some(attribute) = table.get(name) {
            let adapted = adapt_value(
                self.tags().value_types(),
                attribute.value_type.expr(),
                value,
            )
            .ok_or_else(|| MetaError::ValueShape {
                tag: table.tag_name().to_string(),
                attribute: attribute.name.clone(),
                expected: self.types().display(&attribute.value_type),
                found: value.kind_name().to_string(),
            })?;
            working.set_explicit(name, adapted);
        }
        Ok(())
    }

    /// Reconcile alias groups, substitute remaining defaults, and merge
    /// nested tag values into the final view.
    fn finalize(
        &self,
        mut working: WorkingAttributes,
        element: Option<Element>,
    ) -> Result<MergedTagView, MetaError> {
        let table = self.attribute_table(working.tag_type)?;
        let alias_map = self.alias_map(working.tag_type)?;

        let mut done: FxHashSet<String> = FxHashSet::default();
        for attribute in table.iter() {
            let partners = match alias_map.get(&attribute.name) {
                Some(partners) => partners,
                None => continue,
            };
            if !done.insert(attribute.name.clone()) {
                continue;
            }
            let mut group = vec![attribute.name.clone()];
            for partner in partners {
                if done.insert(partner.clone()) {
                    group.push(partner.clone());
                }
            }
            self.reconcile_group(&table, &group, &mut working, element)?;
        }

        let mut values = Vec::with_capacity(working.values.len());
        for (name, slot) in working.values {
            let value = match slot {
                WorkingValue::Explicit(value) => value,
                WorkingValue::Marker(default) => default,
            };
            values.push((name, self.merge_nested(value, element)?));
        }
        Ok(MergedTagView::new(
            table.tag_type(),
            table.tag_name().to_string(),
            values,
            true,
        ))
    }

    /// One alias group: at most one distinct non-default explicit value is
    /// allowed, and it wins the whole group. An attribute explicitly set
    /// to its own declared default neither conflicts nor propagates.
    fn reconcile_group(
        &self,
        table: &AttributeTable,
        group: &[String],
        working: &mut WorkingAttributes,
        element: Option<Element>,
    ) -> Result<(), MetaError> {
        let mut winner: Option<(&str, TagValue)> = None;
        for name in group {
            let value = match working.get(name) {
                Some(WorkingValue::Explicit(value)) => value,
                _ => continue,
            };
            let declared_default = table.get(name).and_then(|a| a.default.as_ref());
            if declared_default == Some(value) {
                continue;
            }
            match &winner {
                None => winner = Some((name, value.clone())),
                Some((first, first_value)) => {
                    if first_value != value {
                        return Err(MetaError::ConflictingAliasValues {
                            tag: table.tag_name().to_string(),
                            element: self.describe_merge_site(element),
                            first: (*first).to_string(),
                            second: name.clone(),
                            first_value: first_value.to_string(),
                            second_value: value.to_string(),
                        });
                    }
                }
            }
        }
        if let Some((_, value)) = winner {
            for name in group {
                working.set_explicit(name, value.clone());
            }
        }
        Ok(())
    }

    fn merge_nested(
        &self,
        value: TagValue,
        element: Option<Element>,
    ) -> Result<TagValue, MetaError> {
        match value {
            TagValue::Tag(instance) => {
                let merged = self.merge_instance_on(&instance, element)?;
                Ok(TagValue::Tag(merged.to_instance()))
            }
            TagValue::Array(items) => {
                let mut merged = Vec::with_capacity(items.len());
                for item in items {
                    merged.push(self.merge_nested(item, element)?);
                }
                Ok(TagValue::Array(merged))
            }
            other => Ok(other),
        }
    }

    fn describe_merge_site(&self, element: Option<Element>) -> String {
        match element {
            Some(element) => self.describe(element),
            None => "a detached instance".to_string(),
        }
    }
}
