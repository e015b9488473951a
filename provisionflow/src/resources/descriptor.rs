//! Per-kind lifecycle descriptors.
//!
//! A [`ResourceDescriptor`] is pure data. The lifecycle algorithm lives in
//! [`LifecycleFlow`](crate::flow::LifecycleFlow); the descriptor only tells it
//! which paths to read, which calls to make and how to read the status.

use std::collections::HashSet;

use crate::context::{Condition, JsonPath, ResultPath, ValueTemplate};
use crate::control_plane::ApiErrorKind;
use crate::events::NotificationTemplate;

use super::ResourceKind;

/// A direct service action with a parameter template.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    /// Action name, e.g. `describeDatasetGroup`.
    pub action: String,
    /// Parameters rendered against the flow's document.
    pub params: ValueTemplate,
    /// Where the call result is written.
    pub result_path: ResultPath,
}

impl ApiCall {
    /// Creates a call writing its result at the dotted `result_path`.
    #[must_use]
    pub fn new(action: impl Into<String>, params: ValueTemplate, result_path: &str) -> Self {
        Self {
            action: action.into(),
            params,
            result_path: ResultPath::at(result_path),
        }
    }
}

/// How the lifecycle checks for an existing resource before creating one.
#[derive(Debug, Clone, PartialEq)]
pub enum Existence {
    /// Always create first.
    None,
    /// Describe first; not found means create.
    Describe,
    /// List first and adopt the first entry found.
    ListFirst(ListSpec),
}

/// Find-or-create through a list call.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSpec {
    /// The list call.
    pub call: ApiCall,
    /// Path of the first entry's ARN after the list result is written.
    pub first_arn: JsonPath,
    /// Where an adopted ARN is written.
    pub adopt_into: ResultPath,
}

/// How the create step reaches the control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateVia {
    /// The resource-creation adapter, which receives the whole document.
    Adapter,
    /// A direct service action.
    Service(ApiCall),
}

/// What to do when create reports that the resource already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlreadyExistsPolicy {
    /// Treat as any other control-plane error.
    #[default]
    Fail,
    /// Go straight to describe.
    Poll,
}

/// The create step of a lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSpec {
    /// Adapter or service action.
    pub via: CreateVia,
    /// Create output is written at `{result_path}.response`.
    pub result_path: JsonPath,
    /// Field of the create response that carries the new ARN.
    pub arn_field: String,
    /// Reaction to `ResourceAlreadyExists`.
    pub already_exists: AlreadyExistsPolicy,
    /// When this resolves to a non-empty value, the domain-flavored create is issued.
    pub domain_path: Option<JsonPath>,
    /// Whether to wait before the first describe.
    pub wait_after: bool,
    /// Copy the new ARN here after create.
    pub adopt_arn_into: Option<ResultPath>,
}

impl CreateSpec {
    /// An adapter create writing to `result_path`, waiting before describe.
    #[must_use]
    pub fn adapter(result_path: &str, arn_field: impl Into<String>) -> Self {
        Self {
            via: CreateVia::Adapter,
            result_path: JsonPath::fields(result_path),
            arn_field: arn_field.into(),
            already_exists: AlreadyExistsPolicy::Fail,
            domain_path: None,
            wait_after: true,
            adopt_arn_into: None,
        }
    }

    /// A create issued as a direct service action. The call result is
    /// written at `{result_path}.response`, like an adapter reply.
    #[must_use]
    pub fn service(
        action: impl Into<String>,
        params: ValueTemplate,
        result_path: &str,
        arn_field: impl Into<String>,
    ) -> Self {
        let response = format!("{result_path}.response");
        Self {
            via: CreateVia::Service(ApiCall::new(action, params, &response)),
            ..Self::adapter(result_path, arn_field)
        }
    }

    /// Polls instead of failing when the resource already exists.
    #[must_use]
    pub fn poll_if_exists(mut self) -> Self {
        self.already_exists = AlreadyExistsPolicy::Poll;
        self
    }

    /// Enables the domain variant.
    #[must_use]
    pub fn with_domain_path(mut self, dotted: &str) -> Self {
        self.domain_path = Some(JsonPath::fields(dotted));
        self
    }

    /// Describes immediately after create.
    #[must_use]
    pub fn without_wait(mut self) -> Self {
        self.wait_after = false;
        self
    }

    /// Copies the created ARN to `dotted`.
    #[must_use]
    pub fn adopt_arn_into(mut self, dotted: &str) -> Self {
        self.adopt_arn_into = Some(ResultPath::at(dotted));
        self
    }

    /// Path of the create response.
    #[must_use]
    pub fn response_path(&self) -> JsonPath {
        self.result_path.clone().field("response")
    }

    /// Path of the ARN inside the create response.
    #[must_use]
    pub fn arn_path(&self) -> JsonPath {
        self.response_path().field(self.arn_field.clone())
    }
}

/// Reads the status of a described resource.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRule {
    /// Where the status value lives, if the kind has one.
    pub status_path: Option<JsonPath>,
    /// Terminal success.
    pub success: Condition,
    /// Terminal failure.
    pub failure: Condition,
}

impl StatusRule {
    /// Exact string match on a status field.
    #[must_use]
    pub fn status_field(dotted: &str, success: &str, failure: &str) -> Self {
        Self {
            status_path: Some(JsonPath::fields(dotted)),
            success: Condition::string_equals(dotted, success),
            failure: Condition::string_equals(dotted, failure),
        }
    }
}

/// Update issued when the existence probe finds a resource that already
/// satisfies the success condition.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    /// The update call.
    pub call: ApiCall,
    /// Extra condition on the document; the update is skipped when false.
    pub when: Condition,
}

/// When a successful resource gets a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuccessNotice {
    /// Every time.
    #[default]
    Always,
    /// Only when this run created the resource.
    CreatedThisRun,
}

/// How a parent flow invokes the lifecycle as a child.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationSpec {
    /// Child input, rendered against the parent document.
    pub input: ValueTemplate,
    /// Projection over `{Input, Output, Status}` of the finished child.
    pub result_selector: ValueTemplate,
    /// Where the projection lands in the parent.
    pub result_path: ResultPath,
    /// When set, the projection replaces the parent document instead of
    /// being written into it.
    pub output_only: bool,
    /// Control-plane errors retried on each of the lifecycle's requests.
    pub retry_on: Vec<ApiErrorKind>,
}

/// Everything that distinguishes one resource kind's lifecycle from another's.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Kind tag.
    pub kind: ResourceKind,
    /// Name of the parent step invoking this lifecycle.
    pub step_name: String,
    /// Entry gate; false means skip.
    pub gate: Condition,
    /// Reason recorded when the gate skips.
    pub skip_message: String,
    /// Existence probe.
    pub existence: Existence,
    /// Create step.
    pub create: CreateSpec,
    /// Describe call.
    pub describe: ApiCall,
    /// Status interpretation.
    pub status: StatusRule,
    /// Update issued when the probe finds an already successful resource.
    pub update: Option<UpdateSpec>,
    /// Status notification.
    pub notification: NotificationTemplate,
    /// When success is notified.
    pub success_notice: SuccessNotice,
    /// Notify on every pending describe as well.
    pub notify_pending: bool,
    /// Error label of the failure terminal.
    pub failure_error: String,
    /// Parent-side invocation.
    pub invocation: InvocationSpec,
}

impl ResourceDescriptor {
    /// Every path the lifecycle reads from its own document.
    #[must_use]
    pub fn declared_reads(&self) -> HashSet<String> {
        let mut reads: Vec<&JsonPath> = self.gate.reads();
        reads.extend(self.describe.params.reads());
        reads.extend(self.status.success.reads());
        reads.extend(self.status.failure.reads());
        if let CreateVia::Service(call) = &self.create.via {
            reads.extend(call.params.reads());
        }
        if let Existence::ListFirst(list) = &self.existence {
            reads.extend(list.call.params.reads());
        }
        if let Some(update) = &self.update {
            reads.extend(update.call.params.reads());
            reads.extend(update.when.reads());
        }
        reads.into_iter().map(ToString::to_string).collect()
    }

    /// Every path the lifecycle writes in its own document.
    #[must_use]
    pub fn declared_writes(&self) -> Vec<ResultPath> {
        let mut writes = vec![
            ResultPath::At(self.create.result_path.clone()),
            self.describe.result_path.clone(),
        ];
        if let Some(adopt) = &self.create.adopt_arn_into {
            writes.push(adopt.clone());
        }
        if let Existence::ListFirst(list) = &self.existence {
            writes.push(list.call.result_path.clone());
            writes.push(list.adopt_into.clone());
        }
        if let Some(update) = &self.update {
            writes.push(update.call.result_path.clone());
        }
        writes
    }

    /// Whether retry applies to an error kind.
    #[must_use]
    pub fn retries(&self, kind: ApiErrorKind) -> bool {
        self.invocation.retry_on.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_spec_paths() {
        let spec = CreateSpec::adapter("CreateDataset", "datasetArn");
        assert_eq!(spec.response_path().to_string(), "$.CreateDataset.response");
        assert_eq!(spec.arn_path().to_string(), "$.CreateDataset.response.datasetArn");
        assert!(spec.wait_after);
        assert_eq!(spec.already_exists, AlreadyExistsPolicy::Fail);
    }

    #[test]
    fn test_create_spec_builders() {
        let spec = CreateSpec::adapter("CreateEventTracker", "eventTrackerArn")
            .poll_if_exists()
            .without_wait()
            .adopt_arn_into("EventTracker.EventTrackerArn");

        assert_eq!(spec.already_exists, AlreadyExistsPolicy::Poll);
        assert!(!spec.wait_after);
        assert_eq!(
            spec.adopt_arn_into,
            Some(ResultPath::at("EventTracker.EventTrackerArn"))
        );
    }

    #[test]
    fn test_status_rule_exact_match() {
        let rule =
            StatusRule::status_field("DescribeFilter.Filter.Status", "ACTIVE", "CREATE FAILED");
        let ctx = crate::context::ExecutionContext::from_value(
            serde_json::json!({"DescribeFilter": {"Filter": {"Status": "active"}}}),
        );
        assert!(!rule.success.evaluate(&ctx));
        assert!(!rule.failure.evaluate(&ctx));
    }
}
