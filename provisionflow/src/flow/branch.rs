//! Sequential composition.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{Flow, FlowOutput, FlowRuntime};
use crate::context::ExecutionContext;
use crate::errors::FlowError;

/// Runs flows one after another, feeding each the previous output.
///
/// An empty branch succeeds with its input unchanged.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    name: String,
    steps: Vec<Arc<dyn Flow>>,
}

impl Branch {
    /// Creates an empty branch.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a step.
    #[must_use]
    pub fn then(mut self, step: Arc<dyn Flow>) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends a step when `step` is `Some`.
    #[must_use]
    pub fn then_some(self, step: Option<Arc<dyn Flow>>) -> Self {
        match step {
            Some(step) => self.then(step),
            None => self,
        }
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true for an empty branch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names, in order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Finishes the branch as a shareable flow.
    #[must_use]
    pub fn build(self) -> Arc<dyn Flow> {
        Arc::new(self)
    }
}

#[async_trait]
impl Flow for Branch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError> {
        let mut ctx = ctx;
        for step in &self.steps {
            debug!(branch = %self.name, step = %step.name(), "running step");
            ctx = step.run(ctx, runtime).await?.context;
        }
        Ok(FlowOutput::succeeded(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ResultPath, ValueTemplate};
    use crate::events::CollectingEventSink;
    use crate::flow::PassFlow;
    use crate::testing::{test_runtime, FailingFlow, MockControlPlane};
    use serde_json::json;

    fn runtime() -> FlowRuntime {
        test_runtime(
            &Arc::new(MockControlPlane::new()),
            &Arc::new(CollectingEventSink::new()),
        )
    }

    #[tokio::test]
    async fn test_empty_branch_is_a_no_op() {
        let input = ExecutionContext::from_value(json!({"a": 1}));
        let output = Branch::new("empty").run(input.clone(), &runtime()).await.unwrap();
        assert_eq!(output.context, input);
    }

    #[tokio::test]
    async fn test_steps_see_previous_output() {
        let branch = Branch::new("seq")
            .then(Arc::new(
                PassFlow::new("first").with_result(ValueTemplate::literal(1), ResultPath::at("a")),
            ))
            .then(Arc::new(
                PassFlow::new("second").with_result(ValueTemplate::path("a"), ResultPath::at("b")),
            ));

        assert_eq!(branch.step_names(), vec!["first", "second"]);
        let output = branch.run(ExecutionContext::new(), &runtime()).await.unwrap();
        assert_eq!(output.context.into_value(), json!({"a": 1, "b": 1}));
    }

    #[tokio::test]
    async fn test_failure_stops_the_branch() {
        let branch = Branch::new("seq")
            .then(Arc::new(FailingFlow::new("boom", "Failure")))
            .then(Arc::new(
                PassFlow::new("never")
                    .with_result(ValueTemplate::literal(true), ResultPath::at("ran")),
            ));

        let result = branch
            .run(ExecutionContext::from_value(json!({"fail": true})), &runtime())
            .await;
        assert!(result.is_err());
    }
}
