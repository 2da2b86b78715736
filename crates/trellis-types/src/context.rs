//! Type resolution context
//!
//! [`TypeContext`] owns the frozen [`RawTypeRegistry`] plus the descriptor
//! interning cache, and exposes every factory and navigation operation over
//! descriptors:
//!
//! - construction: [`for_raw`](TypeContext::for_raw),
//!   [`for_expr`](TypeContext::for_expr),
//!   [`resolve_member`](TypeContext::resolve_member),
//!   [`with_generics`](TypeContext::with_generics),
//!   [`array_of`](TypeContext::array_of)
//! - resolution: [`resolve`](TypeContext::resolve),
//!   [`resolve_or_root`](TypeContext::resolve_or_root)
//! - navigation: [`generics_of`](TypeContext::generics_of),
//!   [`generic`](TypeContext::generic), [`nested`](TypeContext::nested),
//!   [`as_raw`](TypeContext::as_raw),
//!   [`supertype_of`](TypeContext::supertype_of),
//!   [`interfaces_of`](TypeContext::interfaces_of)
//!
//! Construction of the registry happens before the context exists; once a
//! registry is handed to [`TypeContext::new`] it is frozen and every
//! operation here takes `&self`, so a context can be shared freely across
//! threads.
//!
//! Unresolvable variables and wildcards are not errors: they resolve to the
//! none descriptor (or `None` raw handle) and callers treat that as
//! "unknown".

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::assignable::AssignabilityContext;
use crate::cache::{DescriptorCache, DEFAULT_CACHE_CAPACITY};
use crate::descriptor::{RawTypeHandle, TypeDescriptor, VariableResolver};
use crate::error::TypeError;
use crate::expr::TypeExpr;
use crate::registry::{MemberRef, RawTypeId, RawTypeKind, RawTypeRegistry};

/// The shared resolution context: frozen registry + descriptor cache.
#[derive(Debug)]
pub struct TypeContext {
    registry: RawTypeRegistry,
    cache: DescriptorCache,
    none: Arc<TypeDescriptor>,
    raws: Vec<Arc<TypeDescriptor>>,
}

impl TypeContext {
    /// Freeze `registry` into a context with the default cache capacity.
    pub fn new(registry: RawTypeRegistry) -> Self {
        TypeContext::with_cache_capacity(registry, DEFAULT_CACHE_CAPACITY)
    }

    /// Freeze `registry` into a context whose descriptor cache flushes at
    /// `capacity` entries.
    pub fn with_cache_capacity(registry: RawTypeRegistry, capacity: usize) -> Self {
        let raws = (0..registry.len())
            .map(|index| {
                let id = RawTypeId::new(index as u32);
                let descriptor = TypeDescriptor::new(TypeExpr::Raw(id), None);
                let _ = descriptor.resolved.set(Some(RawTypeHandle::plain(id)));
                Arc::new(descriptor)
            })
            .collect();
        TypeContext {
            registry,
            cache: DescriptorCache::with_capacity(capacity),
            none: Arc::new(TypeDescriptor::none()),
            raws,
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &RawTypeRegistry {
        &self.registry
    }

    /// The none descriptor: the sentinel for "no type".
    pub fn none(&self) -> Arc<TypeDescriptor> {
        self.none.clone()
    }

    // ====== Factories ======

    /// The descriptor for a raw registered type.
    ///
    /// # Panics
    ///
    /// Panics if the id was not issued by this context's registry.
    pub fn for_raw(&self, id: RawTypeId) -> Arc<TypeDescriptor> {
        self.raws[id.as_u32() as usize].clone()
    }

    /// The descriptor for an arbitrary type expression, optionally resolved
    /// through `resolver`.
    ///
    /// Raw-type expressions bypass the interning cache; everything else is
    /// interned by (expression, resolver source, explicit component).
    pub fn for_expr(
        &self,
        expr: TypeExpr,
        resolver: Option<VariableResolver>,
    ) -> Arc<TypeDescriptor> {
        match &expr {
            TypeExpr::None => self.none(),
            TypeExpr::Raw(id) => {
                if resolver.is_none() {
                    self.for_raw(*id)
                } else {
                    Arc::new(TypeDescriptor::new(expr, resolver))
                }
            }
            _ => self.cache.intern(Arc::new(TypeDescriptor::new(expr, resolver))),
        }
    }

    /// The effective type of a declared member slot, given an optional
    /// owning context.
    ///
    /// The owning descriptor is first projected onto the member's declaring
    /// type with [`as_raw`](TypeContext::as_raw); the projection then serves
    /// as the variable resolver for the member's declared expression. With
    /// no owning context the expression is taken as declared and its
    /// variables stay unresolved.
    ///
    /// # Panics
    ///
    /// Panics if the member id was not issued by this context's registry,
    /// or a parameter index is out of range.
    pub fn resolve_member(
        &self,
        member: MemberRef,
        owning: Option<&Arc<TypeDescriptor>>,
    ) -> Arc<TypeDescriptor> {
        let (declaring, expr) = match member {
            MemberRef::Field(id) => {
                let field = self.registry.field(id);
                (field.owner, field.ty.clone())
            }
            MemberRef::Param(id, index) => {
                let method = self.registry.method(id);
                (method.owner, method.params[index].clone())
            }
            MemberRef::Return(id) => {
                let method = self.registry.method(id);
                (method.owner, method.return_type.clone())
            }
        };
        let owner = match owning {
            Some(context) => self.as_raw(context, declaring),
            None => self.none(),
        };
        self.for_expr(expr, self.as_variable_resolver(&owner))
    }

    /// A parameterized descriptor for `raw` with explicit generic bindings.
    ///
    /// The bindings double as the descriptor's variable resolver, so nested
    /// references to the raw type's parameters resolve to the supplied
    /// descriptors.
    pub fn with_generics(
        &self,
        raw: RawTypeId,
        generics: &[Arc<TypeDescriptor>],
    ) -> Result<Arc<TypeDescriptor>, TypeError> {
        let def = self.registry.get(raw);
        if def.type_params.len() != generics.len() {
            return Err(TypeError::GenericArityMismatch {
                type_name: def.name.clone(),
                expected: def.type_params.len(),
                supplied: generics.len(),
            });
        }
        let vars = def
            .type_params
            .iter()
            .map(|param| (raw, param.name.clone()))
            .collect();
        let args = generics.iter().map(|generic| generic.expr.clone()).collect();
        let expr = TypeExpr::Parameterized { raw, args };
        Ok(self.for_expr(
            expr,
            Some(VariableResolver::Bound {
                vars,
                generics: generics.to_vec(),
            }),
        ))
    }

    /// An array descriptor synthesized from an explicit component. The
    /// component descriptor is retained verbatim, resolver included, and
    /// participates in the array descriptor's identity.
    pub fn array_of(&self, component: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        let expr = TypeExpr::array(component.expr.clone());
        self.cache.intern(Arc::new(TypeDescriptor::with_component(
            expr,
            None,
            Some(component.clone()),
        )))
    }

    /// Adapt a descriptor into a variable resolver for its members. The
    /// none descriptor adapts to no resolver.
    pub fn as_variable_resolver(&self, d: &Arc<TypeDescriptor>) -> Option<VariableResolver> {
        if d.is_none() {
            None
        } else {
            Some(VariableResolver::Owner(d.clone()))
        }
    }

    // ====== Resolution ======

    /// Resolve the descriptor to a raw-type handle, memoized per
    /// descriptor.
    ///
    /// Raw references resolve to themselves; parameterized applications to
    /// their base; arrays fabricate an array handle from their resolved
    /// component; variables and wildcards resolve through the one-step
    /// resolved form. `None` means unresolvable, which is not an error.
    pub fn resolve(&self, d: &Arc<TypeDescriptor>) -> Option<RawTypeHandle> {
        *d.resolved.get_or_init(|| self.compute_resolved(d))
    }

    /// Resolve, falling back to the registry's root type.
    pub fn resolve_or_root(&self, d: &Arc<TypeDescriptor>) -> RawTypeHandle {
        self.resolve(d)
            .unwrap_or(RawTypeHandle::plain(self.registry.object()))
    }

    fn compute_resolved(&self, d: &Arc<TypeDescriptor>) -> Option<RawTypeHandle> {
        match &d.expr {
            TypeExpr::None => None,
            TypeExpr::Raw(id) => Some(RawTypeHandle::plain(*id)),
            TypeExpr::Array(_) => {
                let component = self.component_of(d);
                self.resolve(&component).map(RawTypeHandle::array_of)
            }
            _ => {
                let next = self.resolved_form(d);
                if next.is_none() {
                    None
                } else {
                    self.resolve(&next)
                }
            }
        }
    }

    /// One-step resolution: parameterized to its raw form, wildcard to its
    /// first bound (upper preferred), variable through the attached
    /// resolver or its declared bounds. A sole root-type bound counts as
    /// absent. Raw and none descriptors have no further form.
    pub(crate) fn resolved_form(&self, d: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        match &d.expr {
            TypeExpr::Parameterized { raw, .. } => {
                self.for_expr(TypeExpr::Raw(*raw), d.resolver.clone())
            }
            TypeExpr::Wildcard { upper, lower } => {
                let bound = self.resolve_bounds(upper).or_else(|| self.resolve_bounds(lower));
                match bound {
                    Some(bound) => self.for_expr(bound.clone(), d.resolver.clone()),
                    None => self.none(),
                }
            }
            TypeExpr::Variable { declared_by, name } => {
                if let Some(resolver) = &d.resolver {
                    if let Some(resolved) = self.resolver_resolve(resolver, *declared_by, name) {
                        return resolved;
                    }
                }
                let def = self.registry.get(*declared_by);
                let bound = def.param(name).and_then(|param| self.resolve_bounds(&param.bounds));
                match bound {
                    Some(bound) => self.for_expr(bound.clone(), d.resolver.clone()),
                    None => self.none(),
                }
            }
            _ => self.none(),
        }
    }

    fn resolve_bounds<'a>(&self, bounds: &'a [TypeExpr]) -> Option<&'a TypeExpr> {
        let first = bounds.first()?;
        if *first == TypeExpr::Raw(self.registry.object()) {
            None
        } else {
            Some(first)
        }
    }

    /// Resolve a variable reference against this descriptor: variables
    /// defer to their one-step form, parameterized applications match the
    /// variable by name against the resolved raw type's parameter list and
    /// answer with the actual argument, everything else delegates to the
    /// attached resolver.
    pub(crate) fn resolve_variable(
        &self,
        d: &Arc<TypeDescriptor>,
        declared_by: RawTypeId,
        name: &str,
    ) -> Option<Arc<TypeDescriptor>> {
        match &d.expr {
            TypeExpr::Variable { .. } => {
                let next = self.resolved_form(d);
                if next.is_none() {
                    return None;
                }
                self.resolve_variable(&next, declared_by, name)
            }
            TypeExpr::Parameterized { args, .. } => {
                if let Some(handle) = self.resolve(d) {
                    if !handle.is_array() {
                        let def = self.registry.get(handle.id);
                        for (index, param) in def.type_params.iter().enumerate() {
                            if param.name == name {
                                if let Some(actual) = args.get(index) {
                                    return Some(self.for_expr(actual.clone(), d.resolver.clone()));
                                }
                            }
                        }
                    }
                }
                d.resolver
                    .as_ref()
                    .and_then(|resolver| self.resolver_resolve(resolver, declared_by, name))
            }
            _ => d
                .resolver
                .as_ref()
                .and_then(|resolver| self.resolver_resolve(resolver, declared_by, name)),
        }
    }

    /// Resolve a variable through a resolver value directly.
    pub(crate) fn resolver_resolve(
        &self,
        resolver: &VariableResolver,
        declared_by: RawTypeId,
        name: &str,
    ) -> Option<Arc<TypeDescriptor>> {
        match resolver {
            VariableResolver::Owner(source) => self.resolve_variable(source, declared_by, name),
            VariableResolver::Bound { vars, generics } => vars
                .iter()
                .position(|(owner, var_name)| *owner == declared_by && var_name == name)
                .and_then(|index| generics.get(index).cloned()),
        }
    }

    // ====== Navigation ======

    /// Check if the descriptor denotes an array, either through its
    /// expression, an explicit component, or its resolved form.
    pub fn is_array(&self, d: &Arc<TypeDescriptor>) -> bool {
        if d.component.is_some() {
            return true;
        }
        match &d.expr {
            TypeExpr::Array(_) => true,
            TypeExpr::Raw(_) | TypeExpr::None => false,
            _ => {
                let next = self.resolved_form(d);
                !next.is_none() && self.is_array(&next)
            }
        }
    }

    /// The component descriptor of an array: the explicit component when
    /// present, otherwise derived from the array expression, otherwise the
    /// one-step resolved form's component. Non-arrays yield the none
    /// descriptor.
    pub fn component_of(&self, d: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        if d.is_none() {
            return self.none();
        }
        if let Some(component) = &d.component {
            return component.clone();
        }
        match &d.expr {
            TypeExpr::Array(inner) => self.for_expr((**inner).clone(), d.resolver.clone()),
            TypeExpr::Raw(_) => self.none(),
            _ => {
                let next = self.resolved_form(d);
                if next.is_none() {
                    self.none()
                } else {
                    self.component_of(&next)
                }
            }
        }
    }

    /// The generic arguments of the descriptor. A parameterized descriptor
    /// answers its stored arguments; a raw descriptor answers its declared
    /// type-parameter slots, each wrapped as an unresolved variable;
    /// everything else delegates to the one-step resolved form. Arrays have
    /// no generics of their own: generic queries route to the component.
    pub fn generics_of(&self, d: &Arc<TypeDescriptor>) -> Vec<Arc<TypeDescriptor>> {
        if d.is_none() {
            return Vec::new();
        }
        match &d.expr {
            TypeExpr::Raw(id) => {
                let id = *id;
                self.registry
                    .get(id)
                    .type_params
                    .iter()
                    .map(|param| {
                        self.for_expr(
                            TypeExpr::variable(id, param.name.clone()),
                            Some(VariableResolver::Owner(d.clone())),
                        )
                    })
                    .collect()
            }
            TypeExpr::Parameterized { args, .. } => args
                .iter()
                .map(|arg| self.for_expr(arg.clone(), d.resolver.clone()))
                .collect(),
            _ => {
                let next = self.resolved_form(d);
                if next.is_none() {
                    Vec::new()
                } else {
                    self.generics_of(&next)
                }
            }
        }
    }

    /// Check if the descriptor carries at least one generic argument.
    pub fn has_generics(&self, d: &Arc<TypeDescriptor>) -> bool {
        !self.generics_of(d).is_empty()
    }

    /// Navigate into generic arguments by index path. An empty path yields
    /// the first generic; any out-of-range index yields the none
    /// descriptor.
    pub fn generic(&self, d: &Arc<TypeDescriptor>, indexes: &[usize]) -> Arc<TypeDescriptor> {
        if indexes.is_empty() {
            let generics = self.generics_of(d);
            return generics.into_iter().next().unwrap_or_else(|| self.none());
        }
        let mut current = d.clone();
        for &index in indexes {
            let generics = self.generics_of(&current);
            match generics.into_iter().nth(index) {
                Some(generic) => current = generic,
                None => return self.none(),
            }
        }
        current
    }

    /// Navigate to a nesting level, starting at level 2. At each level an
    /// array descends into its component; anything else ascends through
    /// supertypes until a descriptor with generics is found and then
    /// descends into the argument chosen for that level (`indexes` maps
    /// level to argument index; the default is the last argument).
    pub fn nested(
        &self,
        d: &Arc<TypeDescriptor>,
        level: usize,
        indexes: Option<&FxHashMap<usize, usize>>,
    ) -> Arc<TypeDescriptor> {
        let mut result = d.clone();
        for current_level in 2..=level {
            if self.is_array(&result) {
                result = self.component_of(&result);
            } else {
                while !result.is_none() && !self.has_generics(&result) {
                    result = self.supertype_of(&result);
                }
                let generics = self.generics_of(&result);
                let index = indexes
                    .and_then(|map| map.get(&current_level).copied())
                    .unwrap_or_else(|| generics.len().saturating_sub(1));
                result = match generics.into_iter().nth(index) {
                    Some(generic) => generic,
                    None => self.none(),
                };
            }
        }
        result
    }

    /// Project the descriptor onto a supertype: identity if it already
    /// resolves to `target`, otherwise the first reachable projection
    /// through direct interfaces (searched before the superclass chain).
    /// Unreachable targets yield the none descriptor; unresolvable
    /// descriptors are returned unchanged.
    pub fn as_raw(&self, d: &Arc<TypeDescriptor>, target: RawTypeId) -> Arc<TypeDescriptor> {
        if d.is_none() {
            return self.none();
        }
        match self.resolve(d) {
            None => return d.clone(),
            Some(handle) if !handle.is_array() && handle.id == target => return d.clone(),
            Some(_) => {}
        }
        for interface in self.interfaces_of(d) {
            let projected = self.as_raw(&interface, target);
            if !projected.is_none() {
                return projected;
            }
        }
        self.as_raw(&self.supertype_of(d), target)
    }

    /// The generic superclass binding of the resolved raw type, resolved
    /// through this descriptor. Arrays answer the root type; the root
    /// itself, interfaces, and tags answer the none descriptor.
    pub fn supertype_of(&self, d: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        let Some(handle) = self.resolve(d) else {
            return self.none();
        };
        if handle.is_array() {
            return self.for_expr(
                TypeExpr::Raw(self.registry.object()),
                Some(VariableResolver::Owner(d.clone())),
            );
        }
        let def = self.registry.get(handle.id);
        let expr = match &def.superclass {
            Some(expr) => expr.clone(),
            None if def.kind == RawTypeKind::Class && handle.id != self.registry.object() => {
                TypeExpr::Raw(self.registry.object())
            }
            None => return self.none(),
        };
        self.for_expr(expr, Some(VariableResolver::Owner(d.clone())))
    }

    /// The generic interface bindings of the resolved raw type, resolved
    /// through this descriptor.
    pub fn interfaces_of(&self, d: &Arc<TypeDescriptor>) -> Vec<Arc<TypeDescriptor>> {
        let Some(handle) = self.resolve(d) else {
            return Vec::new();
        };
        if handle.is_array() {
            return Vec::new();
        }
        self.registry
            .get(handle.id)
            .interfaces
            .iter()
            .map(|expr| {
                self.for_expr(expr.clone(), Some(VariableResolver::Owner(d.clone())))
            })
            .collect()
    }

    // ====== Assignability ======

    /// Check whether a value of the candidate's type can be assigned to
    /// the target's. See [`AssignabilityContext`] for the full rules.
    pub fn is_assignable(
        &self,
        target: &Arc<TypeDescriptor>,
        candidate: &Arc<TypeDescriptor>,
    ) -> bool {
        AssignabilityContext::new(self).is_assignable(target, candidate)
    }

    // ====== Cache ======

    /// Drop every interned descriptor and start a new cache generation.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The number of interned descriptors.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// The cache generation, incremented on every flush.
    pub fn cache_generation(&self) -> u64 {
        self.cache.generation()
    }

    // ====== Display ======

    /// Render the descriptor for diagnostics: resolved name plus rendered
    /// generics, `[]` suffixes for arrays, `?` for anything unresolved.
    pub fn display(&self, d: &Arc<TypeDescriptor>) -> String {
        if self.is_array(d) {
            return format!("{}[]", self.display(&self.component_of(d)));
        }
        let Some(handle) = self.resolve(d) else {
            return "?".to_string();
        };
        if let TypeExpr::Variable { declared_by, name } = &d.expr {
            let through_resolver = d
                .resolver
                .as_ref()
                .and_then(|resolver| self.resolver_resolve(resolver, *declared_by, name));
            if through_resolver.is_none() {
                return "?".to_string();
            }
        }
        let mut out = self.registry.get(handle.id).name.clone();
        let generics = self.generics_of(d);
        if !generics.is_empty() {
            out.push('<');
            for (index, generic) in generics.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                out.push_str(&self.display(generic));
            }
            out.push('>');
        }
        out
    }
}
