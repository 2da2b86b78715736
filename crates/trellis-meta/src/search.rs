//! Hierarchy searches
//!
//! Two search disciplines walk the tag graph. Get semantics stays close to
//! the element: instances declared on it, inheritance-visible instances
//! from superclasses, and the meta tags of both. Find semantics widens the
//! net for methods (bridged declarations, overridden methods on interfaces
//! and superclasses) and classes (full interface and superclass recursion).
//!
//! Both run the same two passes per element: first direct target matches
//! and container unpacking, then recursion into meta tags, one meta level
//! deeper per hop. Intrinsic plumbing tags are invisible to both passes. A
//! shared visited set makes cyclic tag graphs safe. A [`Processor`] turns
//! matched instances into results; whether results short-circuit the
//! search or aggregate is the processor's call.
//!
//! Recoverable failures raised while scanning one element are routed to
//! the failure sink and that element contributes nothing; configuration
//! errors abort the whole search.

use rustc_hash::FxHashSet;
use trellis_types::{MemberRef, MethodId, RawTypeId};

use crate::context::MetaContext;
use crate::element::Element;
use crate::error::MetaError;
use crate::tag::TagInstance;
use crate::value::TagValue;

/// What a search is looking for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchSpec {
    /// The tag type direct matches are checked against
    pub target: Option<RawTypeId>,
    /// A container tag whose instances are unpacked into repeated targets
    pub container: Option<RawTypeId>,
}

impl SearchSpec {
    pub(crate) fn for_tag(target: RawTypeId) -> Self {
        SearchSpec {
            target: Some(target),
            container: None,
        }
    }

    pub(crate) fn repeatable(target: RawTypeId, container: RawTypeId) -> Self {
        SearchSpec {
            target: Some(target),
            container: Some(container),
        }
    }

    pub(crate) fn everything() -> Self {
        SearchSpec {
            target: None,
            container: None,
        }
    }
}

/// Turns matched tag instances into search results.
pub(crate) trait Processor {
    /// Result type produced per match.
    type Output;

    /// Handle one matched instance. `None` means no result here, keep
    /// searching.
    fn process(
        &mut self,
        ctx: &MetaContext<'_>,
        element: Element,
        instance: &TagInstance,
        meta_depth: usize,
    ) -> Result<Option<Self::Output>, MetaError>;

    /// Refine a result found behind `instance` as the recursion unwinds
    /// through it. `element` is where `instance` sits.
    fn post_process(
        &mut self,
        _ctx: &MetaContext<'_>,
        _element: Element,
        _instance: &TagInstance,
        _result: &mut Self::Output,
    ) -> Result<(), MetaError> {
        Ok(())
    }

    /// Process every instance regardless of the search target.
    fn always_processes(&self) -> bool {
        false
    }

    /// Collect every depth-zero result instead of stopping at the first.
    fn aggregates(&self) -> bool {
        false
    }
}

impl MetaContext<'_> {
    /// Search with get semantics: the element's own instances, then
    /// inherited ones, each pass recursing into meta tags.
    pub(crate) fn search_get<P: Processor>(
        &self,
        element: Element,
        spec: SearchSpec,
        processor: &mut P,
        aggregate: &mut Vec<P::Output>,
        visited: &mut FxHashSet<Element>,
        meta_depth: usize,
    ) -> Result<Option<P::Output>, MetaError> {
        if !visited.insert(element) {
            return Ok(None);
        }
        let scan = self.search_get_guarded(element, spec, processor, aggregate, visited, meta_depth);
        self.absorb_recoverable(scan)
    }

    fn search_get_guarded<P: Processor>(
        &self,
        element: Element,
        spec: SearchSpec,
        processor: &mut P,
        aggregate: &mut Vec<P::Output>,
        visited: &mut FxHashSet<Element>,
        meta_depth: usize,
    ) -> Result<Option<P::Output>, MetaError> {
        let declared = self.tags().declared(element);
        if let Some(result) =
            self.scan_get(element, declared, spec, processor, aggregate, visited, meta_depth)?
        {
            return Ok(Some(result));
        }
        if let Element::Class(class_id) = element {
            let inherited = self.inherited_instances(class_id);
            if !inherited.is_empty() {
                if let Some(result) = self.scan_get(
                    element, &inherited, spec, processor, aggregate, visited, meta_depth,
                )? {
                    return Ok(Some(result));
                }
            }
        }
        Ok(None)
    }

    fn scan_get<P: Processor>(
        &self,
        element: Element,
        instances: &[TagInstance],
        spec: SearchSpec,
        processor: &mut P,
        aggregate: &mut Vec<P::Output>,
        visited: &mut FxHashSet<Element>,
        meta_depth: usize,
    ) -> Result<Option<P::Output>, MetaError> {
        for instance in instances {
            if self.is_intrinsic(instance.tag_type) {
                continue;
            }
            if spec.target == Some(instance.tag_type) || processor.always_processes() {
                if let Some(result) = processor.process(self, element, instance, meta_depth)? {
                    if processor.aggregates() && meta_depth == 0 {
                        aggregate.push(result);
                    } else {
                        return Ok(Some(result));
                    }
                }
            } else if spec.container == Some(instance.tag_type) {
                for contained in self.unpack_container(instance)? {
                    if let Some(result) = processor.process(self, element, &contained, meta_depth)? {
                        aggregate.push(result);
                    }
                }
            }
        }

        for instance in instances {
            if self.is_intrinsic(instance.tag_type) {
                continue;
            }
            if let Some(mut result) = self.search_get(
                Element::Class(instance.tag_type),
                spec,
                processor,
                aggregate,
                visited,
                meta_depth + 1,
            )? {
                processor.post_process(self, element, instance, &mut result)?;
                if processor.aggregates() && meta_depth == 0 {
                    aggregate.push(result);
                } else {
                    return Ok(Some(result));
                }
            }
        }
        Ok(None)
    }

    /// Search with find semantics: the element's own instances plus, for
    /// methods and classes, the wider declaration hierarchy.
    pub(crate) fn search_find<P: Processor>(
        &self,
        element: Element,
        spec: SearchSpec,
        processor: &mut P,
        aggregate: &mut Vec<P::Output>,
        visited: &mut FxHashSet<Element>,
        meta_depth: usize,
    ) -> Result<Option<P::Output>, MetaError> {
        if !visited.insert(element) {
            return Ok(None);
        }
        let scan =
            self.search_find_guarded(element, spec, processor, aggregate, visited, meta_depth);
        self.absorb_recoverable(scan)
    }

    fn search_find_guarded<P: Processor>(
        &self,
        element: Element,
        spec: SearchSpec,
        processor: &mut P,
        aggregate: &mut Vec<P::Output>,
        visited: &mut FxHashSet<Element>,
        meta_depth: usize,
    ) -> Result<Option<P::Output>, MetaError> {
        let declared = self.tags().declared(element);
        if !declared.is_empty() {
            let mut local: Vec<P::Output> = Vec::new();

            for instance in declared {
                if self.is_intrinsic(instance.tag_type) {
                    continue;
                }
                if spec.target == Some(instance.tag_type) || processor.always_processes() {
                    if let Some(result) = processor.process(self, element, instance, meta_depth)? {
                        if processor.aggregates() && meta_depth == 0 {
                            local.push(result);
                        } else {
                            return Ok(Some(result));
                        }
                    }
                } else if spec.container == Some(instance.tag_type) {
                    for contained in self.unpack_container(instance)? {
                        if let Some(result) =
                            processor.process(self, element, &contained, meta_depth)?
                        {
                            if processor.aggregates() {
                                local.push(result);
                            }
                        }
                    }
                }
            }

            for instance in declared {
                if self.is_intrinsic(instance.tag_type) {
                    continue;
                }
                if let Some(mut result) = self.search_find(
                    Element::Class(instance.tag_type),
                    spec,
                    processor,
                    aggregate,
                    visited,
                    meta_depth + 1,
                )? {
                    processor.post_process(self, element, instance, &mut result)?;
                    if processor.aggregates() && meta_depth == 0 {
                        local.push(result);
                    } else {
                        return Ok(Some(result));
                    }
                }
            }

            if !local.is_empty() {
                // Deeper hierarchy levels prepend later, which yields
                // top-down ordering across levels.
                aggregate.splice(0..0, local);
            }
        }

        match element {
            Element::Method(method_id) => self.search_find_method(
                method_id, spec, processor, aggregate, visited, meta_depth,
            ),
            Element::Class(class_id) => {
                self.search_find_class(class_id, spec, processor, aggregate, visited, meta_depth)
            }
            Element::Field(_) => Ok(None),
        }
    }

    fn search_find_method<P: Processor>(
        &self,
        method_id: MethodId,
        spec: SearchSpec,
        processor: &mut P,
        aggregate: &mut Vec<P::Output>,
        visited: &mut FxHashSet<Element>,
        meta_depth: usize,
    ) -> Result<Option<P::Output>, MetaError> {
        let registry = self.types().registry();
        let method = registry.method(method_id);
        let owner = method.owner;

        // A bridge method inherits whatever its bridged declaration carries.
        if let Some(bridged) = method.bridge_of {
            if let Some(result) = self.search_find(
                Element::Method(bridged),
                spec,
                processor,
                aggregate,
                visited,
                meta_depth,
            )? {
                return Ok(Some(result));
            }
        }

        // Matching declarations on the owning class's own interfaces.
        if let Some(result) = self.search_find_on_interfaces(
            method_id,
            &registry.interface_ids(owner),
            spec,
            processor,
            aggregate,
            visited,
            meta_depth,
        )? {
            return Ok(Some(result));
        }

        // Walk up the superclass chain: overridden declarations first,
        // then that level's interfaces.
        let mut current = registry.superclass_id(owner);
        while let Some(superclass) = current {
            if superclass == registry.object() {
                break;
            }
            for candidate in self.tagged_methods(superclass) {
                if self.is_override(method_id, candidate) {
                    let resolved = registry.method(candidate).bridge_of.unwrap_or(candidate);
                    if let Some(result) = self.search_find(
                        Element::Method(resolved),
                        spec,
                        processor,
                        aggregate,
                        visited,
                        meta_depth,
                    )? {
                        return Ok(Some(result));
                    }
                }
            }
            if let Some(result) = self.search_find_on_interfaces(
                method_id,
                &registry.interface_ids(superclass),
                spec,
                processor,
                aggregate,
                visited,
                meta_depth,
            )? {
                return Ok(Some(result));
            }
            current = registry.superclass_id(superclass);
        }
        Ok(None)
    }

    fn search_find_on_interfaces<P: Processor>(
        &self,
        method_id: MethodId,
        interfaces: &[RawTypeId],
        spec: SearchSpec,
        processor: &mut P,
        aggregate: &mut Vec<P::Output>,
        visited: &mut FxHashSet<Element>,
        meta_depth: usize,
    ) -> Result<Option<P::Output>, MetaError> {
        for &interface in interfaces {
            for candidate in self.tagged_methods(interface) {
                if self.is_override(method_id, candidate) {
                    if let Some(result) = self.search_find(
                        Element::Method(candidate),
                        spec,
                        processor,
                        aggregate,
                        visited,
                        meta_depth,
                    )? {
                        return Ok(Some(result));
                    }
                }
            }
        }
        Ok(None)
    }

    fn search_find_class<P: Processor>(
        &self,
        class_id: RawTypeId,
        spec: SearchSpec,
        processor: &mut P,
        aggregate: &mut Vec<P::Output>,
        visited: &mut FxHashSet<Element>,
        meta_depth: usize,
    ) -> Result<Option<P::Output>, MetaError> {
        let registry = self.types().registry();
        for interface in registry.interface_ids(class_id) {
            if let Some(result) = self.search_find(
                Element::Class(interface),
                spec,
                processor,
                aggregate,
                visited,
                meta_depth,
            )? {
                return Ok(Some(result));
            }
        }
        if let Some(superclass) = registry.superclass_id(class_id) {
            if superclass != registry.object() {
                if let Some(result) = self.search_find(
                    Element::Class(superclass),
                    spec,
                    processor,
                    aggregate,
                    visited,
                    meta_depth,
                )? {
                    return Ok(Some(result));
                }
            }
        }
        Ok(None)
    }

    /// Methods declared on `owner` that carry at least one tag.
    fn tagged_methods(&self, owner: RawTypeId) -> Vec<MethodId> {
        self.types()
            .registry()
            .methods_of(owner)
            .iter()
            .copied()
            .filter(|&id| !self.tags().declared(Element::Method(id)).is_empty())
            .collect()
    }

    /// Whether `method` overrides `candidate`: same name and arity, and
    /// parameter erasures agree once the candidate's declaration is
    /// resolved against the overriding method's class.
    pub(crate) fn is_override(&self, method_id: MethodId, candidate_id: MethodId) -> bool {
        let registry = self.types().registry();
        let method = registry.method(method_id);
        let candidate = registry.method(candidate_id);
        if method.name != candidate.name || method.params.len() != candidate.params.len() {
            return false;
        }
        if method.params == candidate.params {
            return true;
        }
        let owner = self.types().for_raw(method.owner);
        for index in 0..method.params.len() {
            let declared = self
                .types()
                .resolve_member(MemberRef::Param(method_id, index), None);
            let declared_handle = self.types().resolve_or_root(&declared);
            let candidate_param = self
                .types()
                .resolve_member(MemberRef::Param(candidate_id, index), Some(&owner));
            match self.types().resolve(&candidate_param) {
                Some(handle) if handle == declared_handle => {}
                _ => return false,
            }
        }
        true
    }

    /// The repeated instances held by a container instance's `value`
    /// attribute, explicit or defaulted.
    pub(crate) fn unpack_container(
        &self,
        instance: &TagInstance,
    ) -> Result<Vec<TagInstance>, MetaError> {
        let table = self.attribute_table(instance.tag_type)?;
        let value = match instance.get("value") {
            Some(value) => value.clone(),
            None => table
                .get("value")
                .and_then(|attr| attr.default.clone())
                .ok_or_else(|| MetaError::MissingRequiredAttribute {
                    tag: table.tag_name().to_string(),
                    attribute: "value".to_string(),
                })?,
        };
        let shape_error = |found: &TagValue| MetaError::ValueShape {
            tag: table.tag_name().to_string(),
            attribute: "value".to_string(),
            expected: "an array of tag instances".to_string(),
            found: found.kind_name().to_string(),
        };
        match value {
            TagValue::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    TagValue::Tag(contained) => Ok(contained),
                    other => Err(shape_error(&other)),
                })
                .collect(),
            TagValue::Tag(single) => Ok(vec![single]),
            other => Err(shape_error(&other)),
        }
    }

    fn absorb_recoverable<T>(
        &self,
        scan: Result<Option<T>, MetaError>,
    ) -> Result<Option<T>, MetaError> {
        match scan {
            Err(error) if !error.is_configuration() => {
                self.report(&error);
                Ok(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectingSink;
    use crate::tag::{AttributeDef, TagDef, TagRegistry, ValueTypes};
    use trellis_types::{RawTypeDef, RawTypeRegistry, TypeContext, TypeExpr};

    /// Returns the matched instance's tag type.
    struct FirstMatch;

    impl Processor for FirstMatch {
        type Output = RawTypeId;

        fn process(
            &mut self,
            _ctx: &MetaContext<'_>,
            _element: Element,
            instance: &TagInstance,
            _meta_depth: usize,
        ) -> Result<Option<RawTypeId>, MetaError> {
            Ok(Some(instance.tag_type))
        }
    }

    /// Aggregates every matched instance's explicit `pattern` value.
    struct CollectPatterns;

    impl Processor for CollectPatterns {
        type Output = String;

        fn process(
            &mut self,
            _ctx: &MetaContext<'_>,
            _element: Element,
            instance: &TagInstance,
            _meta_depth: usize,
        ) -> Result<Option<String>, MetaError> {
            Ok(instance.get("pattern").map(|value| value.to_string()))
        }

        fn aggregates(&self) -> bool {
            true
        }
    }

    struct Failing(MetaError);

    impl Processor for Failing {
        type Output = ();

        fn process(
            &mut self,
            _ctx: &MetaContext<'_>,
            _element: Element,
            _instance: &TagInstance,
            _meta_depth: usize,
        ) -> Result<Option<()>, MetaError> {
            Err(self.0.clone())
        }

        fn always_processes(&self) -> bool {
            true
        }
    }

    struct Fixture {
        types: TypeContext,
        tags: TagRegistry,
        marker: RawTypeId,
        composed: RawTypeId,
        intrinsic: RawTypeId,
        repeatable: RawTypeId,
        container: RawTypeId,
        service: RawTypeId,
        api_list: MethodId,
        impl_list: MethodId,
        base: RawTypeId,
        base_run: MethodId,
        sub: RawTypeId,
        sub_run: MethodId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = RawTypeRegistry::new();
            let value_types = ValueTypes {
                boolean: registry.register(RawTypeDef::class("boolean")),
                int: registry.register(RawTypeDef::class("int")),
                float: registry.register(RawTypeDef::class("float")),
                string: registry.register(RawTypeDef::class("String")),
                type_ref: registry.register(RawTypeDef::class("Type")),
            };
            let marker = registry.register(RawTypeDef::tag("Marker"));
            let composed = registry.register(RawTypeDef::tag("Composed"));
            let intrinsic = registry.register(RawTypeDef::tag("Intrinsic"));
            let repeatable = registry.register(RawTypeDef::tag("Filter"));
            let container = registry.register(RawTypeDef::tag("Filters"));
            let service = registry.register(RawTypeDef::class("Service"));

            let api = registry.register(RawTypeDef::interface("Api"));
            let impl_class =
                registry.register(RawTypeDef::class("ApiImpl").implementing(TypeExpr::Raw(api)));
            let api_list =
                registry.register_method(api, "list", Vec::new(), TypeExpr::Raw(registry.object()));
            let impl_list = registry.register_method(
                impl_class,
                "list",
                Vec::new(),
                TypeExpr::Raw(registry.object()),
            );

            let base = registry.register(RawTypeDef::class("Base"));
            let sub = registry.register(RawTypeDef::class("Sub").extending(TypeExpr::Raw(base)));
            let base_run = registry.register_method(
                base,
                "run",
                vec![TypeExpr::Raw(value_types.string)],
                TypeExpr::Raw(registry.object()),
            );
            let sub_run = registry.register_method(
                sub,
                "run",
                vec![TypeExpr::Raw(value_types.string)],
                TypeExpr::Raw(registry.object()),
            );

            let mut tags = TagRegistry::new(value_types);
            tags.register_tag(marker, TagDef::new());
            tags.register_tag(composed, TagDef::new());
            tags.register_tag(intrinsic, TagDef::new().intrinsic());
            tags.register_tag(
                repeatable,
                TagDef::new()
                    .with_attribute(AttributeDef::new(
                        "pattern",
                        TypeExpr::Raw(value_types.string),
                    ))
                    .with_repeatable_container(container),
            );
            tags.register_tag(
                container,
                TagDef::new().with_attribute(AttributeDef::new(
                    "value",
                    TypeExpr::array(TypeExpr::Raw(repeatable)),
                )),
            );
            tags.attach(Element::Class(composed), TagInstance::new(marker));

            Fixture {
                types: TypeContext::new(registry),
                tags,
                marker,
                composed,
                intrinsic,
                repeatable,
                container,
                service,
                api_list,
                impl_list,
                base,
                base_run,
                sub,
                sub_run,
            }
        }

        fn get(&self, ctx: &MetaContext<'_>, element: Element, target: RawTypeId) -> Option<RawTypeId> {
            let mut processor = FirstMatch;
            let mut aggregate = Vec::new();
            let mut visited = FxHashSet::default();
            ctx.search_get(
                element,
                SearchSpec::for_tag(target),
                &mut processor,
                &mut aggregate,
                &mut visited,
                0,
            )
            .unwrap()
        }

        fn find(&self, ctx: &MetaContext<'_>, element: Element, target: RawTypeId) -> Option<RawTypeId> {
            let mut processor = FirstMatch;
            let mut aggregate = Vec::new();
            let mut visited = FxHashSet::default();
            ctx.search_find(
                element,
                SearchSpec::for_tag(target),
                &mut processor,
                &mut aggregate,
                &mut visited,
                0,
            )
            .unwrap()
        }
    }

    #[test]
    fn test_get_direct_and_meta_matches() {
        let mut fx = Fixture::new();
        fx.tags
            .attach(Element::Class(fx.service), TagInstance::new(fx.composed));
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        assert_eq!(
            fx.get(&ctx, Element::Class(fx.service), fx.composed),
            Some(fx.composed)
        );
        assert_eq!(
            fx.get(&ctx, Element::Class(fx.service), fx.marker),
            Some(fx.marker)
        );
        assert_eq!(fx.get(&ctx, Element::Class(fx.service), fx.repeatable), None);
    }

    #[test]
    fn test_get_does_not_walk_class_hierarchy_for_plain_tags() {
        let mut fx = Fixture::new();
        // Marker is not inheritance-visible, so Sub must not see it.
        fx.tags
            .attach(Element::Class(fx.base), TagInstance::new(fx.marker));
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        assert_eq!(fx.get(&ctx, Element::Class(fx.base), fx.marker), Some(fx.marker));
        assert_eq!(fx.get(&ctx, Element::Class(fx.sub), fx.marker), None);
        // Find semantics does walk the hierarchy.
        assert_eq!(fx.find(&ctx, Element::Class(fx.sub), fx.marker), Some(fx.marker));
    }

    #[test]
    fn test_search_survives_cyclic_tag_graphs() {
        let mut fx = Fixture::new();
        fx.tags
            .attach(Element::Class(fx.marker), TagInstance::new(fx.composed));
        fx.tags
            .attach(Element::Class(fx.service), TagInstance::new(fx.composed));
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        assert_eq!(fx.get(&ctx, Element::Class(fx.service), fx.repeatable), None);
        assert_eq!(fx.find(&ctx, Element::Class(fx.service), fx.repeatable), None);
    }

    #[test]
    fn test_intrinsic_tags_are_invisible_to_searches() {
        let mut fx = Fixture::new();
        fx.tags
            .attach(Element::Class(fx.intrinsic), TagInstance::new(fx.marker));
        fx.tags
            .attach(Element::Class(fx.service), TagInstance::new(fx.intrinsic));
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        // Neither the intrinsic instance itself nor anything behind it is
        // reachable, with either semantics.
        assert_eq!(fx.get(&ctx, Element::Class(fx.service), fx.intrinsic), None);
        assert_eq!(fx.get(&ctx, Element::Class(fx.service), fx.marker), None);
        assert_eq!(fx.find(&ctx, Element::Class(fx.service), fx.intrinsic), None);
        assert_eq!(fx.find(&ctx, Element::Class(fx.service), fx.marker), None);
    }

    #[test]
    fn test_container_unpacking_aggregates_in_order() {
        let mut fx = Fixture::new();
        let filters = TagInstance::new(fx.container).with(
            "value",
            TagValue::Array(vec![
                TagValue::Tag(TagInstance::new(fx.repeatable).with("pattern", TagValue::str("a"))),
                TagValue::Tag(TagInstance::new(fx.repeatable).with("pattern", TagValue::str("b"))),
            ]),
        );
        fx.tags.attach(Element::Class(fx.service), filters);
        fx.tags.attach(
            Element::Class(fx.service),
            TagInstance::new(fx.repeatable).with("pattern", TagValue::str("c")),
        );
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        let mut processor = CollectPatterns;
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        let result = ctx
            .search_get(
                Element::Class(fx.service),
                SearchSpec::repeatable(fx.repeatable, fx.container),
                &mut processor,
                &mut aggregate,
                &mut visited,
                0,
            )
            .unwrap();

        assert!(result.is_none());
        assert_eq!(aggregate, ["\"a\"", "\"b\"", "\"c\""]);
    }

    #[test]
    fn test_unpack_rejects_non_tag_items() {
        let fx = Fixture::new();
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        let broken = TagInstance::new(fx.container)
            .with("value", TagValue::Array(vec![TagValue::Int(3)]));
        let err = ctx.unpack_container(&broken).unwrap_err();
        assert!(matches!(err, MetaError::ValueShape { .. }));

        let single = TagInstance::new(fx.container).with(
            "value",
            TagValue::Tag(TagInstance::new(fx.repeatable).with("pattern", TagValue::str("x"))),
        );
        assert_eq!(ctx.unpack_container(&single).unwrap().len(), 1);
    }

    #[test]
    fn test_find_discovers_interface_method_declarations() {
        let mut fx = Fixture::new();
        fx.tags
            .attach(Element::Method(fx.api_list), TagInstance::new(fx.marker));
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        assert_eq!(fx.get(&ctx, Element::Method(fx.impl_list), fx.marker), None);
        assert_eq!(
            fx.find(&ctx, Element::Method(fx.impl_list), fx.marker),
            Some(fx.marker)
        );
    }

    #[test]
    fn test_find_discovers_overridden_superclass_methods() {
        let mut fx = Fixture::new();
        fx.tags
            .attach(Element::Method(fx.base_run), TagInstance::new(fx.marker));
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        assert_eq!(
            fx.find(&ctx, Element::Method(fx.sub_run), fx.marker),
            Some(fx.marker)
        );
        assert_eq!(fx.get(&ctx, Element::Method(fx.sub_run), fx.marker), None);
    }

    #[test]
    fn test_is_override_resolves_generic_parameters() {
        let mut registry = RawTypeRegistry::new();
        let user = registry.register(RawTypeDef::class("User"));
        let other = registry.register(RawTypeDef::class("Other"));
        let repo = registry.register(RawTypeDef::interface("Repo").with_param("T"));
        let user_repo = registry.register(RawTypeDef::class("UserRepo").implementing(
            TypeExpr::parameterized(repo, vec![TypeExpr::Raw(user)]),
        ));
        let save_generic = registry.register_method(
            repo,
            "save",
            vec![TypeExpr::variable(repo, "T")],
            TypeExpr::Raw(registry.object()),
        );
        let save_user = registry.register_method(
            user_repo,
            "save",
            vec![TypeExpr::Raw(user)],
            TypeExpr::Raw(registry.object()),
        );
        let save_other = registry.register_method(
            user_repo,
            "save",
            vec![TypeExpr::Raw(other)],
            TypeExpr::Raw(registry.object()),
        );
        let rename = registry.register_method(
            user_repo,
            "rename",
            vec![TypeExpr::Raw(user)],
            TypeExpr::Raw(registry.object()),
        );
        let types = TypeContext::new(registry);
        let value_types = ValueTypes {
            boolean: user,
            int: user,
            float: user,
            string: user,
            type_ref: user,
        };
        let tags = TagRegistry::new(value_types);
        let ctx = MetaContext::new(&types, &tags);

        assert!(ctx.is_override(save_user, save_generic));
        assert!(!ctx.is_override(save_other, save_generic));
        assert!(!ctx.is_override(rename, save_generic));
    }

    #[test]
    fn test_bridge_methods_route_to_bridged_declaration() {
        let mut registry = RawTypeRegistry::new();
        let value_types = ValueTypes {
            boolean: registry.register(RawTypeDef::class("boolean")),
            int: registry.register(RawTypeDef::class("int")),
            float: registry.register(RawTypeDef::class("float")),
            string: registry.register(RawTypeDef::class("String")),
            type_ref: registry.register(RawTypeDef::class("Type")),
        };
        let marker = registry.register(RawTypeDef::tag("Marker"));
        let holder = registry.register(RawTypeDef::class("Holder"));
        let original = registry.register_method(
            holder,
            "accept",
            vec![TypeExpr::Raw(value_types.string)],
            TypeExpr::Raw(registry.object()),
        );
        let bridge = registry.register_bridge_method(
            holder,
            "accept",
            vec![TypeExpr::Raw(registry.object())],
            TypeExpr::Raw(registry.object()),
            original,
        );
        let types = TypeContext::new(registry);
        let mut tags = TagRegistry::new(value_types);
        tags.register_tag(marker, TagDef::new());
        tags.attach(Element::Method(original), TagInstance::new(marker));
        let ctx = MetaContext::new(&types, &tags);

        let mut processor = FirstMatch;
        let mut aggregate = Vec::new();
        let mut visited = FxHashSet::default();
        let found = ctx
            .search_find(
                Element::Method(bridge),
                SearchSpec::for_tag(marker),
                &mut processor,
                &mut aggregate,
                &mut visited,
                0,
            )
            .unwrap();
        assert_eq!(found, Some(marker));
    }

    #[test]
    fn test_recoverable_failures_go_to_the_sink() {
        let mut fx = Fixture::new();
        fx.tags
            .attach(Element::Class(fx.service), TagInstance::new(fx.marker));
        let sink = CollectingSink::new();
        let ctx = MetaContext::with_sink(&fx.types, &fx.tags, &sink);

        let mut processor = Failing(MetaError::Introspection {
            element: "class#x".to_string(),
            message: "boom".to_string(),
        });
        let mut aggregate: Vec<()> = Vec::new();
        let mut visited = FxHashSet::default();
        let result = ctx
            .search_get(
                Element::Class(fx.service),
                SearchSpec::everything(),
                &mut processor,
                &mut aggregate,
                &mut visited,
                0,
            )
            .unwrap();

        assert!(result.is_none());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_configuration_failures_propagate() {
        let mut fx = Fixture::new();
        fx.tags
            .attach(Element::Class(fx.service), TagInstance::new(fx.marker));
        let ctx = MetaContext::new(&fx.types, &fx.tags);

        let mut processor = Failing(MetaError::AliasSelfReference {
            tag: "Marker".to_string(),
            attribute: "x".to_string(),
        });
        let mut aggregate: Vec<()> = Vec::new();
        let mut visited = FxHashSet::default();
        let err = ctx
            .search_get(
                Element::Class(fx.service),
                SearchSpec::everything(),
                &mut processor,
                &mut aggregate,
                &mut visited,
                0,
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::AliasSelfReference { .. }));
    }
}
