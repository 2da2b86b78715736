//! Generic-aware assignability
//!
//! [`AssignabilityContext`] decides whether a value of one descriptor's type
//! can be assigned to another's, honoring generics, wildcards, variables,
//! and arrays:
//!
//! - generic arguments are invariant: `List<Number>` is not assignable from
//!   `List<Integer>`, while `List<? extends Number>` is
//! - upper wildcard bounds check covariantly, lower bounds
//!   contravariantly, and a bounded candidate only matches a bounded
//!   target of the same kind
//! - unresolved variables match loosely at the top level and fall back to
//!   resolution through the candidate's own bindings before giving up
//! - arrays are covariant and check component against component
//! - the none sentinel is assignable in neither direction
//!
//! Nested generic checks record each visited (target, candidate)
//! expression pair; revisiting a pair short-circuits to true, which keeps
//! self-referential declarations such as `T extends Comparable<T>` from
//! recursing forever.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::context::TypeContext;
use crate::descriptor::{RawTypeHandle, TypeDescriptor};
use crate::expr::TypeExpr;

/// Borrowing context for assignability checks.
pub struct AssignabilityContext<'a> {
    types: &'a TypeContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundKind {
    Upper,
    Lower,
}

/// The effective bounds behind a (possibly indirect) wildcard: variables
/// and parameterized forms are stepped through until a wildcard or a dead
/// end is found.
struct WildcardBounds {
    kind: BoundKind,
    bounds: Vec<Arc<TypeDescriptor>>,
}

impl<'a> AssignabilityContext<'a> {
    /// Create an assignability context over `types`.
    pub fn new(types: &'a TypeContext) -> Self {
        AssignabilityContext { types }
    }

    /// Check whether `target` is assignable from `candidate`.
    pub fn is_assignable(
        &self,
        target: &Arc<TypeDescriptor>,
        candidate: &Arc<TypeDescriptor>,
    ) -> bool {
        let mut matched = FxHashSet::default();
        self.assignable(target, candidate, &mut matched, false)
    }

    fn assignable(
        &self,
        target: &Arc<TypeDescriptor>,
        candidate: &Arc<TypeDescriptor>,
        matched: &mut FxHashSet<(TypeExpr, TypeExpr)>,
        nested: bool,
    ) -> bool {
        // The none sentinel is assignable in neither direction, not even
        // from itself.
        if target.is_none() || candidate.is_none() {
            return false;
        }

        // Arrays delegate to their components.
        if self.types.is_array(target) {
            return self.types.is_array(candidate)
                && self.is_assignable(
                    &self.types.component_of(target),
                    &self.types.component_of(candidate),
                );
        }

        if nested && matched.contains(&(target.expr.clone(), candidate.expr.clone())) {
            return true;
        }

        let our_bounds = self.wildcard_bounds(target);
        let candidate_bounds = self.wildcard_bounds(candidate);

        // X is assignable to <? extends Number> only from a same-kind
        // bounded target.
        if let Some(candidate_bounds) = &candidate_bounds {
            return match &our_bounds {
                Some(ours) => {
                    ours.kind == candidate_bounds.kind
                        && self.bounds_accept(ours, &candidate_bounds.bounds)
                }
                None => false,
            };
        }

        // <? extends Number> accepts any conforming candidate.
        if let Some(ours) = &our_bounds {
            return self.bounds_accept(ours, std::slice::from_ref(candidate));
        }

        let mut exact_match = nested;
        let mut check_generics = true;
        let mut our_resolved: Option<RawTypeHandle> = None;
        if let TypeExpr::Variable { declared_by, name } = &target.expr {
            if let Some(resolver) = &target.resolver {
                if let Some(resolved) = self.types.resolver_resolve(resolver, *declared_by, name) {
                    our_resolved = self.types.resolve(&resolved);
                }
            }
            if our_resolved.is_none() {
                // Try resolving through the candidate's own bindings; a hit
                // there already fixes the generics, so skip re-checking them.
                if let Some(resolver) = &candidate.resolver {
                    if let Some(resolved) =
                        self.types.resolver_resolve(resolver, *declared_by, name)
                    {
                        our_resolved = self.types.resolve(&resolved);
                        check_generics = false;
                    }
                }
            }
            if our_resolved.is_none() {
                // Unresolved variable: never insist on an exact match.
                exact_match = false;
            }
        }
        let our_resolved = our_resolved.unwrap_or_else(|| self.types.resolve_or_root(target));
        let candidate_resolved = self.types.resolve_or_root(candidate);

        let raw_match = if exact_match {
            our_resolved == candidate_resolved
        } else {
            self.handle_assignable(our_resolved, candidate_resolved)
        };
        if !raw_match {
            return false;
        }

        if check_generics {
            let our_generics = self.types.generics_of(target);
            let candidate_generics = if our_resolved.is_array() {
                Vec::new()
            } else {
                self.types
                    .generics_of(&self.types.as_raw(candidate, our_resolved.id))
            };
            if our_generics.len() != candidate_generics.len() {
                return false;
            }
            matched.insert((target.expr.clone(), candidate.expr.clone()));
            for (ours, theirs) in our_generics.iter().zip(&candidate_generics) {
                if !self.assignable(ours, theirs, matched, true) {
                    return false;
                }
            }
        }

        true
    }

    /// Raw-handle assignability: subtype walk at depth zero, the root type
    /// accepts everything, arrays strip one dimension per step.
    fn handle_assignable(&self, target: RawTypeHandle, candidate: RawTypeHandle) -> bool {
        let registry = self.types.registry();
        if target.dims == 0 {
            return target.id == registry.object()
                || (candidate.dims == 0 && registry.is_subtype_of(candidate.id, target.id));
        }
        if candidate.dims == 0 {
            return false;
        }
        self.handle_assignable(
            RawTypeHandle {
                id: target.id,
                dims: target.dims - 1,
            },
            RawTypeHandle {
                id: candidate.id,
                dims: candidate.dims - 1,
            },
        )
    }

    fn wildcard_bounds(&self, d: &Arc<TypeDescriptor>) -> Option<WildcardBounds> {
        let mut current = d.clone();
        loop {
            match &current.expr {
                TypeExpr::Wildcard { upper, lower } => {
                    let kind = if lower.is_empty() {
                        BoundKind::Upper
                    } else {
                        BoundKind::Lower
                    };
                    let exprs = if lower.is_empty() { upper } else { lower };
                    // An unbounded wildcard carries the implicit root upper
                    // bound; its bound set is never empty.
                    let bounds = if exprs.is_empty() {
                        vec![self.types.for_raw(self.types.registry().object())]
                    } else {
                        exprs
                            .iter()
                            .map(|bound| self.types.for_expr(bound.clone(), d.resolver.clone()))
                            .collect()
                    };
                    return Some(WildcardBounds { kind, bounds });
                }
                TypeExpr::None => return None,
                _ => current = self.types.resolved_form(&current),
            }
        }
    }

    /// Every declared bound must accept every candidate: covariantly for
    /// upper bounds, contravariantly for lower ones.
    fn bounds_accept(&self, ours: &WildcardBounds, candidates: &[Arc<TypeDescriptor>]) -> bool {
        for bound in &ours.bounds {
            for candidate in candidates {
                let accepted = match ours.kind {
                    BoundKind::Upper => self.is_assignable(bound, candidate),
                    BoundKind::Lower => self.is_assignable(candidate, bound),
                };
                if !accepted {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RawTypeDef, RawTypeId, RawTypeRegistry};

    struct Fixture {
        ctx: TypeContext,
        char_sequence: RawTypeId,
        string: RawTypeId,
        number: RawTypeId,
        integer: RawTypeId,
        list: RawTypeId,
        array_list: RawTypeId,
    }

    fn fixture() -> Fixture {
        let mut registry = RawTypeRegistry::new();
        let char_sequence = registry.register(RawTypeDef::interface("CharSequence"));
        let string = registry
            .register(RawTypeDef::class("String").implementing(TypeExpr::Raw(char_sequence)));
        let number = registry.register(RawTypeDef::class("Number"));
        let integer =
            registry.register(RawTypeDef::class("Integer").extending(TypeExpr::Raw(number)));
        let list = registry.register(RawTypeDef::interface("List").with_param("E"));
        let array_list = registry.register(RawTypeDef::class("ArrayList").with_param("E"));
        registry.add_interface(
            array_list,
            TypeExpr::parameterized(list, vec![TypeExpr::variable(array_list, "E")]),
        );
        Fixture {
            ctx: TypeContext::new(registry),
            char_sequence,
            string,
            number,
            integer,
            list,
            array_list,
        }
    }

    fn list_of(f: &Fixture, element: TypeExpr) -> Arc<TypeDescriptor> {
        f.ctx
            .for_expr(TypeExpr::parameterized(f.list, vec![element]), None)
    }

    #[test]
    fn test_raw_reflexive_and_subtype() {
        let f = fixture();
        let number = f.ctx.for_raw(f.number);
        let integer = f.ctx.for_raw(f.integer);
        let string = f.ctx.for_raw(f.string);

        assert!(f.ctx.is_assignable(&number, &number));
        assert!(f.ctx.is_assignable(&number, &integer));
        assert!(!f.ctx.is_assignable(&integer, &number));
        assert!(!f.ctx.is_assignable(&number, &string));
    }

    #[test]
    fn test_root_accepts_everything() {
        let f = fixture();
        let root = f.ctx.for_raw(f.ctx.registry().object());
        let string = f.ctx.for_raw(f.string);
        let string_array = f.ctx.array_of(&string);
        let list_of_string = list_of(&f, TypeExpr::Raw(f.string));

        assert!(f.ctx.is_assignable(&root, &string));
        assert!(f.ctx.is_assignable(&root, &string_array));
        assert!(f.ctx.is_assignable(&root, &list_of_string));
    }

    #[test]
    fn test_generics_are_invariant() {
        let f = fixture();
        let list_of_char_sequence = list_of(&f, TypeExpr::Raw(f.char_sequence));
        let list_of_string = list_of(&f, TypeExpr::Raw(f.string));

        assert!(f.ctx.is_assignable(&list_of_string, &list_of_string));
        assert!(!f.ctx.is_assignable(&list_of_char_sequence, &list_of_string));
        assert!(!f.ctx.is_assignable(&list_of_string, &list_of_char_sequence));
    }

    #[test]
    fn test_raw_target_accepts_parameterized_candidate() {
        let f = fixture();
        let raw_list = f.ctx.for_raw(f.list);
        let list_of_string = list_of(&f, TypeExpr::Raw(f.string));

        assert!(f.ctx.is_assignable(&raw_list, &list_of_string));
        assert!(!f.ctx.is_assignable(&list_of_string, &raw_list));
    }

    #[test]
    fn test_candidate_projected_through_hierarchy() {
        let f = fixture();
        let list_of_string = list_of(&f, TypeExpr::Raw(f.string));
        let array_list_of_string = f.ctx.for_expr(
            TypeExpr::parameterized(f.array_list, vec![TypeExpr::Raw(f.string)]),
            None,
        );
        let array_list_of_integer = f.ctx.for_expr(
            TypeExpr::parameterized(f.array_list, vec![TypeExpr::Raw(f.integer)]),
            None,
        );

        assert!(f.ctx.is_assignable(&list_of_string, &array_list_of_string));
        assert!(!f.ctx.is_assignable(&list_of_string, &array_list_of_integer));
    }

    #[test]
    fn test_upper_wildcard() {
        let f = fixture();
        let extends_number = list_of(&f, TypeExpr::wildcard_extending(TypeExpr::Raw(f.number)));
        let list_of_integer = list_of(&f, TypeExpr::Raw(f.integer));
        let list_of_number = list_of(&f, TypeExpr::Raw(f.number));
        let list_of_string = list_of(&f, TypeExpr::Raw(f.string));

        assert!(f.ctx.is_assignable(&extends_number, &list_of_integer));
        assert!(f.ctx.is_assignable(&extends_number, &list_of_number));
        assert!(!f.ctx.is_assignable(&extends_number, &list_of_string));
    }

    #[test]
    fn test_lower_wildcard() {
        let f = fixture();
        let super_integer = list_of(&f, TypeExpr::wildcard_super(TypeExpr::Raw(f.integer)));
        let list_of_number = list_of(&f, TypeExpr::Raw(f.number));
        let list_of_integer = list_of(&f, TypeExpr::Raw(f.integer));
        let list_of_string = list_of(&f, TypeExpr::Raw(f.string));

        assert!(f.ctx.is_assignable(&super_integer, &list_of_number));
        assert!(f.ctx.is_assignable(&super_integer, &list_of_integer));
        assert!(!f.ctx.is_assignable(&super_integer, &list_of_string));
    }

    #[test]
    fn test_bounded_candidate_needs_same_kind_target() {
        let f = fixture();
        let extends_number = list_of(&f, TypeExpr::wildcard_extending(TypeExpr::Raw(f.number)));
        let super_number = list_of(&f, TypeExpr::wildcard_super(TypeExpr::Raw(f.number)));
        let list_of_number = list_of(&f, TypeExpr::Raw(f.number));

        assert!(!f.ctx.is_assignable(&list_of_number, &extends_number));
        assert!(!f.ctx.is_assignable(&extends_number, &super_number));
        assert!(f.ctx.is_assignable(&extends_number, &extends_number));
    }

    #[test]
    fn test_unbounded_wildcard_accepts_any_argument() {
        let f = fixture();
        let list_of_any = list_of(&f, TypeExpr::wildcard());
        let list_of_string = list_of(&f, TypeExpr::Raw(f.string));
        let list_of_integer = list_of(&f, TypeExpr::Raw(f.integer));

        assert!(f.ctx.is_assignable(&list_of_any, &list_of_string));
        assert!(f.ctx.is_assignable(&list_of_any, &list_of_integer));
        assert!(!f.ctx.is_assignable(&list_of_string, &list_of_any));
    }

    #[test]
    fn test_bounded_target_rejects_unbounded_candidate() {
        let f = fixture();
        let extends_number = list_of(&f, TypeExpr::wildcard_extending(TypeExpr::Raw(f.number)));
        let list_of_any = list_of(&f, TypeExpr::wildcard());

        // The unbounded argument carries the implicit root bound, which a
        // Number bound cannot take.
        assert!(!f.ctx.is_assignable(&extends_number, &list_of_any));
        assert!(f.ctx.is_assignable(&list_of_any, &list_of_any));
    }

    #[test]
    fn test_arrays_are_covariant() {
        let f = fixture();
        let number_array = f.ctx.array_of(&f.ctx.for_raw(f.number));
        let integer_array = f.ctx.array_of(&f.ctx.for_raw(f.integer));
        let string_array = f.ctx.array_of(&f.ctx.for_raw(f.string));
        let string = f.ctx.for_raw(f.string);

        assert!(f.ctx.is_assignable(&number_array, &integer_array));
        assert!(!f.ctx.is_assignable(&integer_array, &number_array));
        assert!(!f.ctx.is_assignable(&number_array, &string_array));
        assert!(!f.ctx.is_assignable(&string_array, &string));
        assert!(!f.ctx.is_assignable(&string, &string_array));
    }

    #[test]
    fn test_generic_array_components() {
        let f = fixture();
        let list_of_string_array = f.ctx.array_of(&list_of(&f, TypeExpr::Raw(f.string)));
        let list_of_integer_array = f.ctx.array_of(&list_of(&f, TypeExpr::Raw(f.integer)));

        assert!(f.ctx.is_assignable(&list_of_string_array, &list_of_string_array));
        assert!(!f.ctx.is_assignable(&list_of_string_array, &list_of_integer_array));
    }

    #[test]
    fn test_variable_resolved_through_candidate_bindings() {
        let f = fixture();
        // List<E> as declared on ArrayList<E>, checked against an
        // ArrayList<String> candidate: E resolves through the candidate.
        let declared = f.ctx.for_expr(
            TypeExpr::parameterized(f.list, vec![TypeExpr::variable(f.array_list, "E")]),
            None,
        );
        let bound = f
            .ctx
            .with_generics(f.array_list, &[f.ctx.for_raw(f.string)])
            .unwrap();

        assert!(f.ctx.is_assignable(&declared, &bound));
    }

    #[test]
    fn test_self_referential_bound_converges() {
        let mut registry = RawTypeRegistry::new();
        let comparable = registry.register(RawTypeDef::interface("Comparable").with_param("T"));
        let holder = registry.register(RawTypeDef::class("Holder").with_param("T"));
        registry.set_param_bounds(
            holder,
            "T",
            vec![TypeExpr::parameterized(
                comparable,
                vec![TypeExpr::variable(holder, "T")],
            )],
        );
        let ctx = TypeContext::new(registry);
        // T extends Comparable<T>, checked against itself: must terminate.
        let variable = ctx.for_expr(TypeExpr::variable(holder, "T"), None);

        assert!(ctx.is_assignable(&variable, &variable));
    }

    #[test]
    fn test_none_is_never_assignable() {
        let f = fixture();
        let none = f.ctx.none();
        let string = f.ctx.for_raw(f.string);

        assert!(!f.ctx.is_assignable(&none, &none));
        assert!(!f.ctx.is_assignable(&none, &string));
        assert!(!f.ctx.is_assignable(&string, &none));
    }
}
