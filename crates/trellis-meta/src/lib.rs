//! Trellis Metadata Tag Engine
//!
//! Tag composition and merging for the Trellis metadata engine:
//! - **Declarations**: tag types, attribute values, and attachments (`tag`, `value`, `element` modules)
//! - **Tables**: per-tag-type resolved attribute tables (`attributes` module)
//! - **Queries**: hierarchy searches and merged view synthesis on [`MetaContext`] (`context`, `view` modules)
//! - **Failures**: configuration errors and the recoverable failure sink (`error` module)

#![warn(missing_docs)]

pub mod value;
pub mod element;
pub mod tag;
pub mod attributes;
mod alias;
pub mod view;
pub mod error;
pub mod context;
mod search;
mod merge;

pub use value::TagValue;
pub use element::Element;
pub use tag::{AliasDecl, AttributeDef, TagDef, TagInstance, TagRegistry, ValueTypes};
pub use attributes::{AttributeDescriptor, AttributeTable};
pub use view::MergedTagView;
pub use error::{CollectingSink, FailureSink, MetaError, StderrSink};
pub use context::MetaContext;
