//! Error types for the type descriptor engine

use thiserror::Error;

/// Errors raised by descriptor construction.
///
/// Unresolvable variables and wildcards are not errors; they surface as the
/// none descriptor (see [`crate::context::TypeContext`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A parameterized descriptor was requested with the wrong number of
    /// type arguments for the raw type's declared parameter list.
    #[error("type '{type_name}' declares {expected} type parameter(s) but {supplied} argument(s) were supplied")]
    GenericArityMismatch {
        /// Name of the raw type being parameterized
        type_name: String,
        /// Number of declared type parameters
        expected: usize,
        /// Number of arguments supplied by the caller
        supplied: usize,
    },
}
