//! Small leaf flows: pass-through, failure notification and the failure terminal.

use async_trait::async_trait;
use serde_json::Value;

use super::{Flow, FlowOutput, FlowRuntime};
use crate::context::{ExecutionContext, JsonPath, ResultPath, ValueTemplate};
use crate::errors::FlowError;

fn text_at(ctx: &ExecutionContext, path: &JsonPath) -> String {
    match ctx.lookup(path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Succeeds, optionally merging a rendered value into the document.
#[derive(Debug, Clone)]
pub struct PassFlow {
    name: String,
    result: Option<(ValueTemplate, ResultPath)>,
}

impl PassFlow {
    /// A pass that leaves the document unchanged.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: None,
        }
    }

    /// Renders `template` and deep-merges it at `path`.
    #[must_use]
    pub fn with_result(mut self, template: ValueTemplate, path: ResultPath) -> Self {
        self.result = Some((template, path));
        self
    }
}

#[async_trait]
impl Flow for PassFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: ExecutionContext,
        _runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError> {
        let mut ctx = ctx;
        if let Some((template, path)) = &self.result {
            let value = template.render(&ctx)?;
            ctx.merge(value, path)?;
        }
        Ok(FlowOutput::succeeded(ctx))
    }
}

/// Sends the pipeline failure notification for an `{Error, Cause}` record.
#[derive(Debug, Clone)]
pub struct NotifyFlow {
    name: String,
    error: JsonPath,
}

impl NotifyFlow {
    /// Reads the `{Error, Cause}` record at the dotted `error_path`.
    #[must_use]
    pub fn new(name: impl Into<String>, error_path: &str) -> Self {
        Self {
            name: name.into(),
            error: JsonPath::fields(error_path),
        }
    }
}

#[async_trait]
impl Flow for NotifyFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError> {
        let error = text_at(&ctx, &self.error.clone().field("Error"));
        let cause = text_at(&ctx, &self.error.clone().field("Cause"));
        runtime.notifier().notify_pipeline_failure(&error, &cause).await;
        Ok(FlowOutput::succeeded(ctx))
    }
}

/// Ends the run in failure with the `{Error, Cause}` record found in the document.
#[derive(Debug, Clone)]
pub struct FailFlow {
    name: String,
    error: JsonPath,
}

impl FailFlow {
    /// Reads the `{Error, Cause}` record at the dotted `error_path`.
    #[must_use]
    pub fn new(name: impl Into<String>, error_path: &str) -> Self {
        Self {
            name: name.into(),
            error: JsonPath::fields(error_path),
        }
    }
}

#[async_trait]
impl Flow for FailFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: ExecutionContext,
        _runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError> {
        Err(FlowError::PipelineFailed {
            error: text_at(&ctx, &self.error.clone().field("Error")),
            cause: text_at(&ctx, &self.error.clone().field("Cause")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CollectingEventSink, PIPELINE_FAILURE_DETAIL_TYPE};
    use crate::testing::{test_runtime, MockControlPlane};
    use serde_json::json;
    use std::sync::Arc;

    fn failed_document() -> ExecutionContext {
        ExecutionContext::from_value(json!({
            "error": {"Error": "Failure", "Cause": "Dataset reached status CREATE FAILED: Failure"}
        }))
    }

    #[tokio::test]
    async fn test_pass_merges_result() {
        let runtime = test_runtime(
            &Arc::new(MockControlPlane::new()),
            &Arc::new(CollectingEventSink::new()),
        );
        let pass = PassFlow::new("inject").with_result(
            ValueTemplate::literal(json!({"Region": "eu-west-1"})),
            ResultPath::At(JsonPath::root()),
        );

        let output = pass
            .run(ExecutionContext::from_value(json!({"datasetGroup": {}})), &runtime)
            .await
            .unwrap();

        assert_eq!(
            output.context.into_value(),
            json!({"datasetGroup": {}, "Region": "eu-west-1"})
        );
    }

    #[tokio::test]
    async fn test_notify_sends_failure_notification() {
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = test_runtime(&Arc::new(MockControlPlane::new()), &sink);

        NotifyFlow::new("NotifyFailure", "error")
            .run(failed_document(), &runtime)
            .await
            .unwrap();

        let events = sink.events_of_type(PIPELINE_FAILURE_DETAIL_TYPE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].detail_str("Error"), Some("Failure"));
    }

    #[tokio::test]
    async fn test_fail_surfaces_error_and_cause() {
        let runtime = test_runtime(
            &Arc::new(MockControlPlane::new()),
            &Arc::new(CollectingEventSink::new()),
        );

        let err = FailFlow::new("Fail", "error")
            .run(failed_document(), &runtime)
            .await
            .unwrap_err();

        match err {
            FlowError::PipelineFailed { error, cause } => {
                assert_eq!(error, "Failure");
                assert!(cause.contains("CREATE FAILED"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
