//! Source-level type expressions
//!
//! A [`TypeExpr`] is the declared form of a type as it appears on a field,
//! method parameter, supertype clause, or type-parameter bound: a raw type
//! reference, a parameterized application, an array, a type variable, or a
//! wildcard. Expressions carry no resolution state; resolving them against
//! an owning context is the job of [`crate::context::TypeContext`], which
//! wraps them in descriptors.

use std::fmt;

use crate::registry::RawTypeId;

/// A declared type expression.
///
/// Expressions are plain data: cheap to clone, structurally comparable and
/// hashable. Raw type references are ids into the
/// [`RawTypeRegistry`](crate::registry::RawTypeRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// The absent type. Used as the expression of the none descriptor and
    /// never written in declarations.
    None,

    /// A reference to a raw (non-generic or erased) declared type.
    Raw(RawTypeId),

    /// A generic type application, e.g. `List<String>`.
    Parameterized {
        /// The raw type being applied
        raw: RawTypeId,
        /// The type arguments, one per declared parameter
        args: Vec<TypeExpr>,
    },

    /// An array of the component expression, e.g. `String[]`.
    Array(Box<TypeExpr>),

    /// A reference to a type variable, e.g. the `E` in `List<E>`.
    Variable {
        /// The raw type whose parameter list declares this variable
        declared_by: RawTypeId,
        /// The declared variable name
        name: String,
    },

    /// A bounded or unbounded wildcard, e.g. `?`, `? extends Number`,
    /// `? super Integer`. At most one of the bound lists is non-empty in
    /// well-formed declarations.
    Wildcard {
        /// Upper bounds (`extends`); empty means unbounded
        upper: Vec<TypeExpr>,
        /// Lower bounds (`super`)
        lower: Vec<TypeExpr>,
    },
}

impl TypeExpr {
    /// Shorthand for a parameterized application.
    pub fn parameterized(raw: RawTypeId, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Parameterized { raw, args }
    }

    /// Shorthand for an array of `component`.
    pub fn array(component: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(component))
    }

    /// Shorthand for a variable reference.
    pub fn variable(declared_by: RawTypeId, name: impl Into<String>) -> Self {
        TypeExpr::Variable {
            declared_by,
            name: name.into(),
        }
    }

    /// An unbounded wildcard (`?`).
    pub fn wildcard() -> Self {
        TypeExpr::Wildcard {
            upper: Vec::new(),
            lower: Vec::new(),
        }
    }

    /// A wildcard with a single upper bound (`? extends bound`).
    pub fn wildcard_extending(bound: TypeExpr) -> Self {
        TypeExpr::Wildcard {
            upper: vec![bound],
            lower: Vec::new(),
        }
    }

    /// A wildcard with a single lower bound (`? super bound`).
    pub fn wildcard_super(bound: TypeExpr) -> Self {
        TypeExpr::Wildcard {
            upper: Vec::new(),
            lower: vec![bound],
        }
    }

    /// Check if this is the absent-type sentinel.
    pub fn is_none(&self) -> bool {
        matches!(self, TypeExpr::None)
    }

    /// Check if this is a raw type reference.
    pub fn is_raw(&self) -> bool {
        matches!(self, TypeExpr::Raw(_))
    }

    /// Check if this is a parameterized application.
    pub fn is_parameterized(&self) -> bool {
        matches!(self, TypeExpr::Parameterized { .. })
    }

    /// Check if this is an array expression.
    pub fn is_array(&self) -> bool {
        matches!(self, TypeExpr::Array(_))
    }

    /// Check if this is a variable reference.
    pub fn is_variable(&self) -> bool {
        matches!(self, TypeExpr::Variable { .. })
    }

    /// Check if this is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, TypeExpr::Wildcard { .. })
    }

    /// The raw type id behind this expression, if it has one directly:
    /// the id of a raw reference or of a parameterized application's base.
    pub fn raw_id(&self) -> Option<RawTypeId> {
        match self {
            TypeExpr::Raw(id) => Some(*id),
            TypeExpr::Parameterized { raw, .. } => Some(*raw),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::None => write!(f, "(none)"),
            TypeExpr::Raw(id) => write!(f, "#{}", id.as_u32()),
            TypeExpr::Parameterized { raw, args } => {
                write!(f, "#{}<", raw.as_u32())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeExpr::Array(component) => write!(f, "{}[]", component),
            TypeExpr::Variable { name, .. } => write!(f, "{}", name),
            TypeExpr::Wildcard { upper, lower } => {
                if !lower.is_empty() {
                    write!(f, "? super {}", lower[0])
                } else if !upper.is_empty() {
                    write!(f, "? extends {}", upper[0])
                } else {
                    write!(f, "?")
                }
            }
        }
    }
}
