//! Merge engine errors
//!
//! Two families share one enum. Configuration errors mean the tag
//! declarations themselves are wrong (broken alias graphs, malformed
//! containers) and always propagate to the caller. Recoverable errors mean
//! one attachment could not be introspected; searches report those to the
//! [`FailureSink`] and carry on as if the element held nothing, matching
//! the engine's fail-soft contract.

use parking_lot::Mutex;
use thiserror::Error;

/// An error raised while validating tag declarations or merging instances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaError {
    /// An attribute declares an alias pointing back at itself.
    #[error("attribute '{attribute}' in tag '{tag}' cannot alias itself; point it at a different attribute or at a meta-present tag")]
    AliasSelfReference {
        /// Declaring tag name
        tag: String,
        /// Declaring attribute name
        attribute: String,
    },

    /// An alias names a target attribute that does not exist.
    #[error("attribute '{attribute}' in tag '{tag}' aliases '{target}', which is not declared by tag '{target_tag}'")]
    AliasTargetMissing {
        /// Declaring tag name
        tag: String,
        /// Declaring attribute name
        attribute: String,
        /// Missing target attribute name
        target: String,
        /// Tag the target was expected on
        target_tag: String,
    },

    /// An alias overrides an attribute of a tag that is not meta-present on
    /// the declaring tag.
    #[error("attribute '{attribute}' in tag '{tag}' overrides an attribute of '{target_tag}', which is not meta-present on '{tag}'")]
    AliasNotMetaPresent {
        /// Declaring tag name
        tag: String,
        /// Declaring attribute name
        attribute: String,
        /// The tag the alias points at
        target_tag: String,
    },

    /// A same-tag alias whose target does not alias back.
    #[error("attribute '{attribute}' in tag '{tag}' aliases '{target}', but '{target}' declares no alias back")]
    AliasNotReciprocal {
        /// Declaring tag name
        tag: String,
        /// Declaring attribute name
        attribute: String,
        /// The non-reciprocating attribute
        target: String,
    },

    /// Aliased attributes with incompatible declared value types.
    #[error("aliased attributes '{attribute}' and '{target}' in tag '{tag}' must declare compatible value types")]
    AliasTypeMismatch {
        /// Declaring tag name
        tag: String,
        /// Declaring attribute name
        attribute: String,
        /// Target attribute name
        target: String,
    },

    /// Mirrored attributes where one side lacks a default value.
    #[error("mirrored attributes '{attribute}' and '{target}' in tag '{tag}' must both declare a default value")]
    AliasDefaultMissing {
        /// Declaring tag name
        tag: String,
        /// Declaring attribute name
        attribute: String,
        /// Target attribute name
        target: String,
    },

    /// Mirrored attributes with different default values.
    #[error("mirrored attributes '{attribute}' and '{target}' in tag '{tag}' must declare the same default value")]
    AliasDefaultMismatch {
        /// Declaring tag name
        tag: String,
        /// Declaring attribute name
        attribute: String,
        /// Target attribute name
        target: String,
    },

    /// An alias declaration fills both target slots.
    #[error("alias on attribute '{attribute}' in tag '{tag}' sets both target slots ('{value_slot}' and '{attribute_slot}'), but only one is permitted")]
    AmbiguousAliasTarget {
        /// Declaring tag name
        tag: String,
        /// Declaring attribute name
        attribute: String,
        /// Name given through the positional slot
        value_slot: String,
        /// Name given through the named slot
        attribute_slot: String,
    },

    /// Two aliased attributes of one instance hold different explicit
    /// values.
    #[error("in tag '{tag}' on {element}, attribute '{first}' and its alias '{second}' are declared with different values ({first_value} and {second_value})")]
    ConflictingAliasValues {
        /// Tag name
        tag: String,
        /// Element the instance sits on
        element: String,
        /// First group member
        first: String,
        /// Conflicting group member
        second: String,
        /// Rendered value of the first member
        first_value: String,
        /// Rendered value of the second member
        second_value: String,
    },

    /// A container tag whose `value` attribute is not an array of the
    /// repeatable tag type.
    #[error("container tag '{container}' must declare a 'value' attribute holding an array of '{repeatable}'")]
    MalformedContainer {
        /// Container tag name
        container: String,
        /// Repeatable tag name
        repeatable: String,
    },

    /// A repeatable query on a tag that designates no container.
    #[error("tag '{tag}' designates no repeatable container")]
    NotRepeatable {
        /// Tag name
        tag: String,
    },

    /// A query named a raw type that is not a registered tag type.
    #[error("type '{name}' is not a registered tag type")]
    UnknownTagType {
        /// Raw type name
        name: String,
    },

    /// An instance sets an attribute its tag does not declare.
    #[error("tag '{tag}' declares no attribute '{attribute}'")]
    UnknownAttribute {
        /// Tag name
        tag: String,
        /// Unknown attribute name
        attribute: String,
    },

    /// An attribute without a default was not given a value.
    #[error("attribute '{attribute}' of tag '{tag}' has no default and was not set")]
    MissingRequiredAttribute {
        /// Tag name
        tag: String,
        /// Attribute name
        attribute: String,
    },

    /// A value whose shape does not match the declared attribute type.
    #[error("attribute '{attribute}' of tag '{tag}' expects {expected}, found {found}")]
    ValueShape {
        /// Tag name
        tag: String,
        /// Attribute name
        attribute: String,
        /// Rendered declared type
        expected: String,
        /// Shape of the offending value
        found: String,
    },

    /// An element could not be introspected.
    #[error("failed to introspect {element}: {message}")]
    Introspection {
        /// Element description
        element: String,
        /// Underlying failure
        message: String,
    },
}

impl MetaError {
    /// Whether this error signals broken tag declarations. Configuration
    /// errors always propagate; everything else is reported to the sink
    /// and the affected element is treated as carrying no tags.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            MetaError::UnknownAttribute { .. }
                | MetaError::MissingRequiredAttribute { .. }
                | MetaError::ValueShape { .. }
                | MetaError::Introspection { .. }
        )
    }
}

/// Destination for recoverable introspection failures.
pub trait FailureSink: Send + Sync {
    /// Record one failure.
    fn report(&self, error: &MetaError);
}

/// Sink that writes failures to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl FailureSink for StderrSink {
    fn report(&self, error: &MetaError) {
        eprintln!("trellis-meta: {error}");
    }
}

/// Sink that collects failures for later inspection, mainly in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<MetaError>>,
}

impl CollectingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        CollectingSink::default()
    }

    /// Take every collected failure, leaving the sink empty.
    pub fn drain(&self) -> Vec<MetaError> {
        std::mem::take(&mut *self.reports.lock())
    }

    /// Number of collected failures.
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Check whether anything was reported.
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl FailureSink for CollectingSink {
    fn report(&self, error: &MetaError) {
        self.reports.lock().push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_split() {
        let config = MetaError::AliasSelfReference {
            tag: "Route".to_string(),
            attribute: "path".to_string(),
        };
        let recoverable = MetaError::ValueShape {
            tag: "Route".to_string(),
            attribute: "path".to_string(),
            expected: "String".to_string(),
            found: "int".to_string(),
        };
        assert!(config.is_configuration());
        assert!(!recoverable.is_configuration());
        assert!(!MetaError::Introspection {
            element: "class#1".to_string(),
            message: "cycle".to_string(),
        }
        .is_configuration());
    }

    #[test]
    fn test_messages_name_the_parties() {
        let err = MetaError::ConflictingAliasValues {
            tag: "Route".to_string(),
            element: "class#4".to_string(),
            first: "path".to_string(),
            second: "value".to_string(),
            first_value: "\"/a\"".to_string(),
            second_value: "\"/b\"".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("path"));
        assert!(message.contains("value"));
        assert!(message.contains("/a"));
        assert!(message.contains("/b"));
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        assert!(sink.is_empty());
        sink.report(&MetaError::NotRepeatable {
            tag: "Route".to_string(),
        });
        assert_eq!(sink.len(), 1);
        let drained = sink.drain();
        assert_eq!(drained.len(), 1);
        assert!(sink.is_empty());
    }
}
