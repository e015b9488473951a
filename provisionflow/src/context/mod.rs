//! Execution context and path addressing.
//!
//! This module provides:
//! - Typed path expressions with field, index and find-first segments
//! - The JSON document passed between steps
//! - Templates that project new values out of a document
//! - Conditions used by gates and status rules

mod condition;
mod document;
mod path;
mod template;

pub use condition::Condition;
pub use document::ExecutionContext;
pub use path::{JsonPath, PathSegment, ResultPath};
pub use template::ValueTemplate;
