//! Resource kinds and the descriptors that drive their lifecycles.
//!
//! Every kind follows the same create-or-find, poll, notify lifecycle. What
//! differs between kinds is data: which paths gate the step, which calls
//! probe and describe the resource, and how its status is read. That data
//! lives in a [`ResourceDescriptor`], and the [`ResourceCatalog`] holds one
//! per kind.

mod catalog;
mod descriptor;
mod kind;

pub use catalog::ResourceCatalog;
pub use descriptor::{
    AlreadyExistsPolicy, ApiCall, CreateSpec, CreateVia, Existence, InvocationSpec, ListSpec,
    ResourceDescriptor, StatusRule, SuccessNotice, UpdateSpec,
};
pub use kind::ResourceKind;
