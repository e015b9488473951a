//! Pipeline assembly and execution.
//!
//! A [`PipelineConfiguration`] decides which stages exist, the
//! [`PipelineAssembler`] turns it into a flow tree once, and [`Pipeline::run`]
//! executes that tree against one input document.

mod assembler;
mod config;

pub use assembler::{PipelineAssembler, MANAGED_EXECUTION};
pub use config::{InferenceOption, PipelineConfiguration, PipelineSettings, RecommendationConfig};

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::errors::FlowError;
use crate::flow::{Flow, FlowRuntime};
use crate::observability::run_summary;

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunResult {
    /// Run identifier, taken from the runtime.
    pub run_id: Uuid,
    /// Whether the pipeline reached its end.
    pub success: bool,
    /// Final document of the pipeline branch.
    pub output: Option<Value>,
    /// Error name of a failed run.
    pub error: Option<String>,
    /// Cause of a failed run.
    pub cause: Option<String>,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

impl PipelineRunResult {
    fn failed(run_id: Uuid, error: String, cause: String, started: Instant) -> Self {
        Self {
            run_id,
            success: false,
            output: None,
            error: Some(error),
            cause: Some(cause),
            duration_ms: elapsed_ms(started),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// An assembled pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    root: Arc<dyn Flow>,
    stages: Vec<String>,
}

impl Pipeline {
    pub(crate) fn new(root: Arc<dyn Flow>, stages: Vec<String>) -> Self {
        Self { root, stages }
    }

    /// Names of the top-level stages, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// The root flow.
    #[must_use]
    pub fn root(&self) -> &Arc<dyn Flow> {
        &self.root
    }

    /// Runs the pipeline on `document`.
    ///
    /// Failures never escape as `Err`: a failed run has already sent its
    /// pipeline-failure notification and is reported through the result.
    pub async fn run(&self, runtime: &FlowRuntime, document: Value) -> PipelineRunResult {
        let run_id = runtime.run_id();
        let started = Instant::now();
        if !document.is_object() {
            let err = FlowError::InvalidInput("pipeline input must be a JSON object".to_string());
            return PipelineRunResult::failed(run_id, err.error_name(), err.to_string(), started);
        }

        let span = tracing::info_span!("pipeline", run_id = %run_id);
        let outcome = self
            .root
            .run(ExecutionContext::from_value(document), runtime)
            .instrument(span)
            .await;

        let result = match outcome {
            Ok(output) => {
                let mut document = output.context.into_value();
                let output = document
                    .get_mut(MANAGED_EXECUTION)
                    .and_then(|v| v.get_mut(0))
                    .map(Value::take);
                let duration_ms = elapsed_ms(started);
                info!(run_id = %run_id, duration_ms, "pipeline succeeded");
                PipelineRunResult {
                    run_id,
                    success: true,
                    output,
                    error: None,
                    cause: None,
                    duration_ms,
                }
            }
            Err(FlowError::PipelineFailed { error, cause }) => {
                error!(run_id = %run_id, error = %error, cause = %cause, "pipeline failed");
                PipelineRunResult::failed(run_id, error, cause, started)
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "pipeline aborted");
                PipelineRunResult::failed(run_id, e.error_name(), e.to_string(), started)
            }
        };
        debug!(summary = %run_summary(&result, &self.stages), "run summary");
        result
    }
}
