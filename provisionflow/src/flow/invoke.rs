//! Parent-side invocation of a child flow.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use super::{Flow, FlowOutput, FlowRuntime, FlowStatus, LifecycleFlow};
use crate::context::ExecutionContext;
use crate::errors::FlowError;
use crate::resources::InvocationSpec;

/// Runs a child flow on a projection of the parent document and writes a
/// projection of the child's result back.
///
/// The child input is rendered from the parent with `spec.input` and the
/// child runs once; a lifecycle child retries its own control-plane requests.
/// `spec.result_selector` is then rendered over
/// `{"Input": .., "Output": .., "Status": "SUCCEEDED" | "SKIPPED"}` and
/// written at `spec.result_path`, or replaces the parent document when
/// `spec.output_only` is set.
#[derive(Debug, Clone)]
pub struct ChildInvocation {
    name: String,
    child: Arc<dyn Flow>,
    spec: InvocationSpec,
}

impl ChildInvocation {
    /// Creates an invocation of `child`.
    #[must_use]
    pub fn new(name: impl Into<String>, child: Arc<dyn Flow>, spec: InvocationSpec) -> Self {
        Self {
            name: name.into(),
            child,
            spec,
        }
    }

    /// Invokes a lifecycle with its descriptor's invocation spec and step name.
    #[must_use]
    pub fn lifecycle(flow: Arc<LifecycleFlow>) -> Self {
        let descriptor = flow.descriptor();
        let name = descriptor.step_name.clone();
        let spec = descriptor.invocation.clone();
        Self::new(name, flow, spec)
    }

    /// The invocation spec.
    #[must_use]
    pub fn spec(&self) -> &InvocationSpec {
        &self.spec
    }
}

#[async_trait]
impl Flow for ChildInvocation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError> {
        let input = self.spec.input.render(&ctx)?;
        debug!(step = %self.name, child = %self.child.name(), "invoking child flow");

        let child_output = self
            .child
            .run(ExecutionContext::from_value(input.clone()), runtime)
            .await?;

        let status = child_output.status;
        let message = child_output.message;
        let selection = ExecutionContext::from_value(json!({
            "Input": input,
            "Output": child_output.context.into_value(),
            "Status": status.as_str(),
        }));
        let projected = self.spec.result_selector.render(&selection)?;

        let context = if self.spec.output_only {
            ExecutionContext::from_value(projected)
        } else {
            let mut ctx = ctx;
            ctx.set(&self.spec.result_path, projected)?;
            ctx
        };

        Ok(FlowOutput {
            context,
            status: FlowStatus::Succeeded,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ResultPath, ValueTemplate};
    use crate::control_plane::{ApiError, ApiErrorKind, ApiOutcome};
    use crate::events::CollectingEventSink;
    use crate::resources::{ResourceCatalog, ResourceKind};
    use crate::testing::{
        describe_response, script_create_success, script_describes, success_status, test_runtime,
        FailingFlow, MockControlPlane, TEST_ACCOUNT, TEST_REGION,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn lifecycle(kind: ResourceKind) -> Arc<LifecycleFlow> {
        Arc::new(LifecycleFlow::new(
            ResourceCatalog::standard().get(kind).unwrap().clone(),
        ))
    }

    fn parent_document() -> ExecutionContext {
        ExecutionContext::from_value(json!({
            "Region": TEST_REGION,
            "AccountID": TEST_ACCOUNT,
            "datasetGroup": {"serviceConfig": {"name": "retail"}}
        }))
    }

    #[tokio::test]
    async fn test_dataset_group_projection() {
        let mock = Arc::new(MockControlPlane::new());
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = test_runtime(&mock, &sink);
        let flow = lifecycle(ResourceKind::DatasetGroup);
        script_describes(&mock, flow.descriptor(), &["ACTIVE"]);

        let output = ChildInvocation::lifecycle(flow)
            .run(parent_document(), &runtime)
            .await
            .unwrap();

        let task = &output.context.as_value()["DatasetGroupTask"];
        assert_eq!(task["DatasetGroupStatus"], "ACTIVE");
        assert_eq!(task["Status"], "SUCCEEDED");
        assert!(task["DatasetGroupArn"].is_string());
        assert_eq!(output.context.as_value()["datasetGroup"]["serviceConfig"]["name"], "retail");
    }

    #[tokio::test]
    async fn test_skipped_child_is_projected_as_skipped() {
        let mock = Arc::new(MockControlPlane::new());
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = test_runtime(&mock, &sink);

        let output = ChildInvocation::lifecycle(lifecycle(ResourceKind::DatasetGroup))
            .run(ExecutionContext::from_value(json!({"Region": "r", "AccountID": "a"})), &runtime)
            .await
            .unwrap();

        assert_eq!(output.context.as_value()["DatasetGroupTask"], json!({"Status": "SKIPPED"}));
        assert!(output.message.is_some());
    }

    #[tokio::test]
    async fn test_transient_existence_check_is_retried_in_place() {
        let mock = Arc::new(MockControlPlane::new());
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = test_runtime(&mock, &sink);
        let flow = lifecycle(ResourceKind::DatasetGroup);
        mock.script_call(
            "describeDatasetGroup",
            [
                ApiOutcome::Error(ApiError::new(ApiErrorKind::LimitExceeded, "limit")),
                ApiOutcome::NotFound("missing".to_string()),
                ApiOutcome::Ok(describe_response(ResourceKind::DatasetGroup, "ACTIVE")),
            ],
        );
        script_create_success(&mock, flow.descriptor());

        ChildInvocation::lifecycle(flow)
            .run(parent_document(), &runtime)
            .await
            .unwrap();

        assert_eq!(
            mock.journal().labels(),
            vec![
                "describeDatasetGroup",
                "wait",
                "describeDatasetGroup",
                "createDatasetGroup",
                "wait",
                "describeDatasetGroup"
            ]
        );
    }

    #[tokio::test]
    async fn test_throttled_describe_never_repeats_the_create() {
        let mock = Arc::new(MockControlPlane::new());
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = test_runtime(&mock, &sink);
        let flow = lifecycle(ResourceKind::SolutionVersion);
        script_create_success(&mock, flow.descriptor());
        mock.script_call(
            "describeSolutionVersion",
            [
                ApiOutcome::Error(ApiError::new(ApiErrorKind::LimitExceeded, "slow down")),
                ApiOutcome::Ok(describe_response(
                    ResourceKind::SolutionVersion,
                    success_status(ResourceKind::SolutionVersion),
                )),
            ],
        );
        let parent = ExecutionContext::from_value(json!({
            "Region": TEST_REGION,
            "AccountID": TEST_ACCOUNT,
            "Solution": {"solutionVersion": {"createNewSolutionVersion": true}}
        }));

        let output = ChildInvocation::lifecycle(flow)
            .run(parent, &runtime)
            .await
            .unwrap();

        assert_eq!(mock.journal().count("createSolutionVersion"), 1);
        assert_eq!(mock.journal().count("describeSolutionVersion"), 2);
        assert_eq!(output.context.as_value()["SolutionVersionTask"]["Status"], "SUCCEEDED");
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates() {
        let mock = Arc::new(MockControlPlane::new());
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = test_runtime(&mock, &sink);
        let failing: Arc<dyn Flow> = Arc::new(FailingFlow::new("Child", "Failure"));
        let spec = InvocationSpec {
            input: ValueTemplate::literal(json!({"fail": true})),
            result_selector: ValueTemplate::literal(json!({})),
            result_path: ResultPath::Discard,
            output_only: false,
            retry_on: vec![ApiErrorKind::LimitExceeded],
        };

        let err = ChildInvocation::new("ChildTask", failing, spec)
            .run(ExecutionContext::new(), &runtime)
            .await
            .unwrap_err();

        assert_eq!(err.error_name(), "Failure");
        assert_eq!(mock.journal().count("wait"), 0);
    }

    #[tokio::test]
    async fn test_output_only_replaces_document() {
        let mock = Arc::new(MockControlPlane::new());
        let sink = Arc::new(CollectingEventSink::new());
        let runtime = test_runtime(&mock, &sink);
        let passthrough: Arc<dyn Flow> = Arc::new(FailingFlow::new("Child", "Failure"));
        let spec = InvocationSpec {
            input: ValueTemplate::object([("Item", ValueTemplate::path("Item"))]),
            result_selector: ValueTemplate::object([
                ("Item", ValueTemplate::path("Output.Item")),
                ("Status", ValueTemplate::path("Status")),
            ]),
            result_path: ResultPath::Discard,
            output_only: true,
            retry_on: Vec::new(),
        };

        let output = ChildInvocation::new("ItemTask", passthrough, spec)
            .run(
                ExecutionContext::from_value(json!({"Item": {"type": "USERS"}, "Other": 1})),
                &runtime,
            )
            .await
            .unwrap();

        assert_eq!(
            output.context.into_value(),
            json!({"Item": {"type": "USERS"}, "Status": "SUCCEEDED"})
        );
    }
}
