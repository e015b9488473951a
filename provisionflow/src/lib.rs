//! # Provisionflow
//!
//! Orchestration core for provisioning the resources of a personalization
//! ML pipeline: dataset groups, schemas, datasets and their import jobs,
//! filters, event trackers, solutions and solution versions, campaigns,
//! recommenders, and batch jobs.
//!
//! Every resource kind shares one lifecycle state machine, parameterized by a
//! [`ResourceDescriptor`](resources::ResourceDescriptor):
//!
//! - **Gate** on the presence of configuration, skipping otherwise
//! - **Create** (or adopt an existing resource) through the control plane
//! - **Poll** its status with a bounded wait loop
//! - **Notify** status changes to an event sink
//!
//! Lifecycles are composed into a pipeline with branches, maps and parallels.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use provisionflow::prelude::*;
//!
//! let config = PipelineConfiguration::from_json_file("pipeline.json")?;
//! let settings = PipelineSettings::from_env()?;
//! let pipeline = PipelineAssembler::new(config, settings.clone()).build()?;
//!
//! let runtime = settings.runtime(control_plane, sink);
//! let result = pipeline.run(&runtime, document).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod control_plane;
pub mod errors;
pub mod events;
pub mod flow;
pub mod observability;
pub mod pipeline;
pub mod resources;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{Condition, ExecutionContext, JsonPath, ResultPath, ValueTemplate};
    pub use crate::control_plane::{ApiError, ApiErrorKind, ControlPlane};
    pub use crate::errors::{FlowError, ValidationError};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, Notifier,
    };
    pub use crate::flow::{
        Branch, FailureMode, Flow, FlowOutput, FlowRegistry, FlowRuntime, FlowStatus,
        LifecycleFlow, MapFlow, ParallelFlow, PollPolicy, RetryPolicy,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        InferenceOption, Pipeline, PipelineAssembler, PipelineConfiguration, PipelineRunResult,
        PipelineSettings,
    };
    pub use crate::resources::{ResourceCatalog, ResourceDescriptor, ResourceKind};
}
