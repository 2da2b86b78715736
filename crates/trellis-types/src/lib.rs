//! Trellis Type Descriptor Model
//!
//! Generic type descriptor resolution for the Trellis metadata engine:
//! - **Registry**: raw types, members, and generic declarations (`registry` module)
//! - **Expressions**: structural type expressions (`expr` module)
//! - **Descriptors**: interned descriptors with variable resolvers (`descriptor`, `cache` modules)
//! - **Context**: factories, navigation, and memoized resolution (`context` module)
//! - **Assignability**: generic-aware assignability checks (`assignable` module)

#![warn(missing_docs)]

pub mod expr;
pub mod registry;
pub mod descriptor;
pub mod cache;
pub mod context;
pub mod assignable;
pub mod error;

pub use expr::TypeExpr;
pub use registry::{
    FieldDef, FieldId, MemberRef, MethodDef, MethodId, RawTypeDef, RawTypeId, RawTypeKind,
    RawTypeRegistry, TypeParamDef,
};
pub use descriptor::{RawTypeHandle, TypeDescriptor, VariableResolver};
pub use cache::{DescriptorCache, DEFAULT_CACHE_CAPACITY};
pub use context::TypeContext;
pub use assignable::AssignabilityContext;
pub use error::TypeError;
