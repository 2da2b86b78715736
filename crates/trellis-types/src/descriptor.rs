//! Resolved type descriptors
//!
//! A [`TypeDescriptor`] wraps a [`TypeExpr`] together with the state needed
//! to resolve it: an optional [`VariableResolver`] identifying the enclosing
//! descriptor that can bind type variables, and an optional explicit
//! component descriptor for arrays synthesized from a component rather than
//! derived from an array expression.
//!
//! Descriptors are immutable, shared as `Arc<TypeDescriptor>`, and compare
//! structurally: two descriptors are equal iff their expressions are equal,
//! their variable-resolver *sources* are equal (structurally, not by
//! pointer), and their explicit components are equal. The structural hash is
//! precomputed at construction so descriptors can key the interning cache.
//!
//! All navigation and resolution operations live on
//! [`TypeContext`](crate::context::TypeContext), which owns the registry the
//! descriptors resolve against.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rustc_hash::FxHasher;

use crate::expr::TypeExpr;
use crate::registry::RawTypeId;

/// A resolved raw-type handle: a registry id plus an array depth.
///
/// The registry stores no array types; array handles are fabricated by
/// incrementing the depth of the component's handle. A depth of zero is a
/// plain class, interface, or tag reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawTypeHandle {
    /// The underlying raw type
    pub id: RawTypeId,
    /// Array depth; `String[][]` resolves to `String` at depth 2
    pub dims: u8,
}

impl RawTypeHandle {
    /// A non-array handle for `id`.
    pub const fn plain(id: RawTypeId) -> Self {
        RawTypeHandle { id, dims: 0 }
    }

    /// Check if this handle denotes an array type.
    pub const fn is_array(&self) -> bool {
        self.dims > 0
    }

    /// Fabricate the array-of handle.
    pub fn array_of(self) -> Self {
        RawTypeHandle {
            id: self.id,
            dims: self.dims + 1,
        }
    }

    /// The component handle of an array handle.
    ///
    /// # Panics
    ///
    /// Panics if this handle is not an array.
    pub fn component(self) -> Self {
        assert!(self.dims > 0, "handle is not an array");
        RawTypeHandle {
            id: self.id,
            dims: self.dims - 1,
        }
    }
}

/// Resolves type-variable references on behalf of a descriptor.
///
/// The resolver's *source* participates in descriptor equality, so two
/// descriptors for the same expression resolved against different owners
/// stay distinct in the cache.
#[derive(Debug, Clone)]
pub enum VariableResolver {
    /// Delegate to an enclosing descriptor: the variable is looked up
    /// through the owner's expression and, transitively, its own resolver.
    Owner(Arc<TypeDescriptor>),

    /// Resolve from explicit parallel lists, as built by
    /// [`TypeContext::with_generics`](crate::context::TypeContext::with_generics):
    /// variable `vars[i]` binds to `generics[i]`.
    Bound {
        /// Variable identities as `(declaring type, name)` pairs
        vars: Vec<(RawTypeId, String)>,
        /// The bound descriptors, parallel to `vars`
        generics: Vec<Arc<TypeDescriptor>>,
    },
}

impl VariableResolver {
    /// Compare resolver sources structurally. `Owner` sources compare as
    /// descriptors; `Bound` sources compare as their generics lists.
    pub(crate) fn source_eq(&self, other: &VariableResolver) -> bool {
        match (self, other) {
            (VariableResolver::Owner(a), VariableResolver::Owner(b)) => {
                Arc::ptr_eq(a, b) || a == b
            }
            (
                VariableResolver::Bound { generics: a, .. },
                VariableResolver::Bound { generics: b, .. },
            ) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y) || x == y),
            _ => false,
        }
    }

    fn hash_source<H: Hasher>(&self, state: &mut H) {
        match self {
            VariableResolver::Owner(source) => {
                state.write_u8(1);
                state.write_u64(source.structural_hash());
            }
            VariableResolver::Bound { generics, .. } => {
                state.write_u8(2);
                for generic in generics {
                    state.write_u64(generic.structural_hash());
                }
            }
        }
    }
}

/// An immutable resolved type descriptor. See the module docs for the
/// equality contract; see [`TypeContext`](crate::context::TypeContext) for
/// construction and navigation.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub(crate) expr: TypeExpr,
    pub(crate) resolver: Option<VariableResolver>,
    pub(crate) component: Option<Arc<TypeDescriptor>>,
    hash: u64,
    pub(crate) resolved: OnceCell<Option<RawTypeHandle>>,
}

impl TypeDescriptor {
    pub(crate) fn new(expr: TypeExpr, resolver: Option<VariableResolver>) -> Self {
        TypeDescriptor::with_component(expr, resolver, None)
    }

    pub(crate) fn with_component(
        expr: TypeExpr,
        resolver: Option<VariableResolver>,
        component: Option<Arc<TypeDescriptor>>,
    ) -> Self {
        let hash = structural_hash(&expr, resolver.as_ref(), component.as_deref());
        TypeDescriptor {
            expr,
            resolver,
            component,
            hash,
            resolved: OnceCell::new(),
        }
    }

    /// The none sentinel, pre-resolved to nothing.
    pub(crate) fn none() -> Self {
        let descriptor = TypeDescriptor::new(TypeExpr::None, None);
        let _ = descriptor.resolved.set(None);
        descriptor
    }

    /// The underlying type expression.
    pub fn expr(&self) -> &TypeExpr {
        &self.expr
    }

    /// The attached variable resolver, if any.
    pub fn resolver(&self) -> Option<&VariableResolver> {
        self.resolver.as_ref()
    }

    /// The explicit component descriptor, when this array was synthesized
    /// from a component rather than derived from an array expression.
    pub fn explicit_component(&self) -> Option<&Arc<TypeDescriptor>> {
        self.component.as_ref()
    }

    /// Check if this is the none sentinel.
    pub fn is_none(&self) -> bool {
        self.expr.is_none()
    }

    /// The precomputed structural hash.
    pub fn structural_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        if self.hash != other.hash {
            return false;
        }
        if self.expr != other.expr {
            return false;
        }
        let resolvers_match = match (&self.resolver, &other.resolver) {
            (None, None) => true,
            (Some(a), Some(b)) => a.source_eq(b),
            _ => false,
        };
        resolvers_match && self.component == other.component
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

fn structural_hash(
    expr: &TypeExpr,
    resolver: Option<&VariableResolver>,
    component: Option<&TypeDescriptor>,
) -> u64 {
    let mut hasher = FxHasher::default();
    expr.hash(&mut hasher);
    if let Some(resolver) = resolver {
        resolver.hash_source(&mut hasher);
    }
    if let Some(component) = component {
        hasher.write_u64(component.structural_hash());
    }
    hasher.finish()
}
