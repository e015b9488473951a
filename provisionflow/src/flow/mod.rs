//! Flows: the lifecycle state machine and the combinators that compose it.
//!
//! Every flow takes an [`ExecutionContext`] by value and returns either a
//! [`FlowOutput`] (succeeded or skipped) or a [`FlowError`]. Because every
//! combinator is itself a [`Flow`], fragments nest freely:
//!
//! ```text
//! ParallelFlow (catch -> NotifyFlow -> FailFlow)
//! └── Branch
//!     ├── ChildInvocation -> LifecycleFlow(DatasetGroup)
//!     ├── MapFlow(datasets) -> Branch[Schema, Dataset, DatasetImportJob]
//!     └── ...
//! ```

mod branch;
mod invoke;
mod lifecycle;
mod map;
mod parallel;
mod registry;
mod retry;
mod runtime;
mod scoped;
mod terminal;

#[cfg(test)]
mod integration_tests;

pub use branch::Branch;
pub use invoke::ChildInvocation;
pub use lifecycle::LifecycleFlow;
pub use map::{FailureMode, MapFlow};
pub use parallel::{Catch, ParallelFlow};
pub use registry::FlowRegistry;
pub use retry::{should_retry, with_retry, JitterStrategy, RetryDecision, RetryPolicy};
pub use runtime::{FlowRuntime, PollPolicy, Timer, TokioTimer};
pub use terminal::{FailFlow, NotifyFlow, PassFlow};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::ExecutionContext;
use crate::errors::FlowError;

/// Successful terminal of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    /// The flow did its work.
    Succeeded,
    /// The flow's gate was false; nothing was done.
    Skipped,
}

impl FlowStatus {
    /// Upper-case name, as exposed to result selectors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The document a flow hands back, with its terminal status.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowOutput {
    /// Output document.
    pub context: ExecutionContext,
    /// Terminal status.
    pub status: FlowStatus,
    /// Reason attached to a skip.
    pub message: Option<String>,
}

impl FlowOutput {
    /// A succeeded output.
    #[must_use]
    pub fn succeeded(context: ExecutionContext) -> Self {
        Self {
            context,
            status: FlowStatus::Succeeded,
            message: None,
        }
    }

    /// A skipped output carrying its reason.
    #[must_use]
    pub fn skipped(context: ExecutionContext, message: impl Into<String>) -> Self {
        Self {
            context,
            status: FlowStatus::Skipped,
            message: Some(message.into()),
        }
    }

    /// Returns true for a skip.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.status == FlowStatus::Skipped
    }
}

/// A step with one entry point and a success or failure terminal.
#[async_trait]
pub trait Flow: Send + Sync + fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs the flow on its own copy of the document.
    async fn run(
        &self,
        ctx: ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError>;
}
