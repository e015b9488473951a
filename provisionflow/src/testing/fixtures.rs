//! Documents and control-plane replies for flow tests.

use serde_json::{json, Value};
use std::sync::Arc;

use super::mocks::MockControlPlane;
use crate::control_plane::{AdapterReply, ApiOutcome};
use crate::events::{CollectingEventSink, Notifier};
use crate::flow::{FlowRuntime, RetryPolicy};
use crate::resources::{CreateVia, ResourceDescriptor, ResourceKind};

/// Region used by fixtures.
pub const TEST_REGION: &str = "us-east-1";

/// Account used by fixtures.
pub const TEST_ACCOUNT: &str = "123456789012";

/// A runtime wired to a mock control plane, a collecting sink and the
/// mock's recording timer. Retries wait zero milliseconds.
#[must_use]
pub fn test_runtime(mock: &Arc<MockControlPlane>, sink: &Arc<CollectingEventSink>) -> FlowRuntime {
    let notifier = Notifier::new(sink.clone(), "mlops-event-bus", "solutions.aws.personalize");
    FlowRuntime::new(mock.clone(), notifier)
        .with_timer(Arc::new(mock.recording_timer()))
        .with_retry_policy(RetryPolicy::default().with_interval_ms(0))
}

/// An ARN for a fixture resource.
#[must_use]
pub fn arn_for(kind: ResourceKind, name: &str) -> String {
    format!(
        "arn:aws:personalize:{TEST_REGION}:{TEST_ACCOUNT}:{}/{name}",
        kind.object_type().to_lowercase()
    )
}

/// Status that ends a kind's lifecycle successfully.
#[must_use]
pub fn success_status(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::PreprocessingJob => "SUCCEEDED",
        _ => "ACTIVE",
    }
}

/// Status that fails a kind's lifecycle.
#[must_use]
pub fn failure_status(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::PreprocessingJob => "FAILED",
        _ => "CREATE FAILED",
    }
}

/// A status that is neither success nor failure.
#[must_use]
pub fn pending_status(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::PreprocessingJob => "RUNNING",
        _ => "CREATE IN_PROGRESS",
    }
}

/// A describe response reporting `status`.
///
/// Schemas have no status field: any status other than the failure status
/// yields a described schema, the failure status yields a null ARN.
#[must_use]
pub fn describe_response(kind: ResourceKind, status: &str) -> Value {
    let object = kind.object_type();
    match kind {
        ResourceKind::PreprocessingJob => json!({
            "JobRun": {"Id": "jr_1", "JobName": "prep", "JobRunState": status}
        }),
        ResourceKind::Schema => {
            let arn = if status == failure_status(kind) {
                Value::Null
            } else {
                Value::from(arn_for(kind, "users"))
            };
            json!({"Schema": {"SchemaArn": arn, "Name": "users"}})
        }
        _ => json!({
            object: {
                format!("{object}Arn"): arn_for(kind, "fixture"),
                "Name": "fixture",
                "Status": status,
            }
        }),
    }
}

/// A successful create reply carrying the descriptor's ARN field.
#[must_use]
pub fn create_response(descriptor: &ResourceDescriptor) -> Value {
    json!({ descriptor.create.arn_field.clone(): arn_for(descriptor.kind, "fixture") })
}

/// Scripts a successful create, through the adapter or the service action
/// the descriptor uses.
pub fn script_create_success(mock: &MockControlPlane, descriptor: &ResourceDescriptor) {
    let response = create_response(descriptor);
    match &descriptor.create.via {
        CreateVia::Adapter => {
            mock.script_create(
                descriptor.kind,
                [ApiOutcome::Ok(AdapterReply::succeeded(response))],
            );
        }
        CreateVia::Service(call) => {
            mock.script_call(call.action.clone(), [ApiOutcome::Ok(response)]);
        }
    }
}

/// Scripts the describe call with one outcome per status.
pub fn script_describes(
    mock: &MockControlPlane,
    descriptor: &ResourceDescriptor,
    statuses: &[&str],
) {
    mock.script_call(
        descriptor.describe.action.clone(),
        statuses
            .iter()
            .map(|s| ApiOutcome::Ok(describe_response(descriptor.kind, s))),
    );
}

/// A lifecycle document that opens every kind's gate.
#[must_use]
pub fn lifecycle_input() -> Value {
    json!({
        "Region": TEST_REGION,
        "AccountID": TEST_ACCOUNT,
        "Type": "fixture",
        "JobName": "prep",
        "Run": true,
        "ServiceConfig": {"name": "fixture", "solutionVersionArn": "arn:sv/fixture"},
        "DatasetGroup": {"serviceConfig": {"name": "retail"}},
        "Item": {
            "type": "INTERACTIONS",
            "schema": {"serviceConfig": {"name": "users"}, "schemaVersion": "v1"},
            "dataset": {"serviceConfig": {"name": "interactions"}},
            "datasetImportJob": {"createNewJob": true},
            "serviceConfig": {"name": "filter"}
        },
        "CreateNewSolutionVersion": true,
        "SolutionVersionArn": "arn:sv/fixture",
        "CreateCampaign": true,
        "CreateRecommender": true,
        "CreateBatchInferenceJob": true,
        "CreateBatchSegmentJob": true
    })
}

/// A lifecycle document that closes every kind's gate.
#[must_use]
pub fn empty_lifecycle_input() -> Value {
    json!({"Region": TEST_REGION, "AccountID": TEST_ACCOUNT})
}

/// A pipeline document with one dataset group, one interactions dataset, an
/// event tracker and one solution with a campaign.
#[must_use]
pub fn sample_pipeline_document() -> Value {
    json!({
        "datasetGroup": {
            "serviceConfig": {"name": "retail"},
            "datasets": [{
                "type": "INTERACTIONS",
                "schema": {"serviceConfig": {"name": "interactions-schema"}, "schemaVersion": "v1"},
                "dataset": {"serviceConfig": {"name": "interactions"}},
                "datasetImportJob": {
                    "createNewJob": true,
                    "serviceConfig": {"jobName": "import-1"}
                }
            }]
        },
        "eventTracker": {"serviceConfig": {"name": "tracker"}},
        "solutions": [{
            "serviceConfig": {"name": "sims"},
            "solutionVersion": {"createNewSolutionVersion": true},
            "campaigns": [{"serviceConfig": {"name": "sims-campaign"}, "createCampaign": true}]
        }]
    })
}
