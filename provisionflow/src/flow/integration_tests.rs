//! Multi-step scenarios composed from registry lifecycles.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    Branch, Catch, FailFlow, Flow, FlowRegistry, LifecycleFlow, MapFlow, NotifyFlow, ParallelFlow,
};
use crate::context::{ExecutionContext, JsonPath, ResultPath, ValueTemplate};
use crate::control_plane::{AdapterReply, ApiOutcome};
use crate::errors::FlowError;
use crate::events::{CollectingEventSink, PIPELINE_FAILURE_DETAIL_TYPE};
use crate::resources::{ResourceCatalog, ResourceKind};
use crate::testing::{
    arn_for, assert_journal, assert_notification_count, assert_notified, create_response,
    describe_response, sample_pipeline_document, script_create_success, script_describes,
    test_runtime, MockControlPlane, TEST_ACCOUNT, TEST_REGION,
};

struct Scenario {
    mock: Arc<MockControlPlane>,
    sink: Arc<CollectingEventSink>,
    registry: FlowRegistry,
}

impl Scenario {
    fn new() -> Self {
        Self {
            mock: Arc::new(MockControlPlane::new()),
            sink: Arc::new(CollectingEventSink::new()),
            registry: FlowRegistry::new(ResourceCatalog::standard()),
        }
    }

    fn lifecycle(&self, kind: ResourceKind) -> Arc<LifecycleFlow> {
        self.registry.lifecycle(kind).unwrap()
    }

    fn script_create(&self, kind: ResourceKind) {
        script_create_success(&self.mock, self.lifecycle(kind).descriptor());
    }

    fn script_describes(&self, kind: ResourceKind, statuses: &[&str]) {
        script_describes(&self.mock, self.lifecycle(kind).descriptor(), statuses);
    }

    fn dataset_map(&self) -> MapFlow {
        let item = Branch::new("DatasetItem")
            .then(self.registry.invocation(ResourceKind::Schema).unwrap())
            .then(self.registry.invocation(ResourceKind::Dataset).unwrap())
            .then(self.registry.invocation(ResourceKind::DatasetImportJob).unwrap())
            .build();
        MapFlow::new("Create and Import Datasets", "datasetGroup.datasets", item)
            .with_item_selector(ValueTemplate::object([
                ("Item", ValueTemplate::MapItem),
                ("DatasetGroup", ValueTemplate::path("datasetGroup")),
                ("Region", ValueTemplate::path("Region")),
                ("AccountID", ValueTemplate::path("AccountID")),
            ]))
            .with_max_concurrency(3)
            .with_result_path(ResultPath::at("DatasetMapOutput"))
    }

    async fn run(&self, flow: &dyn Flow, document: Value) -> Result<ExecutionContext, FlowError> {
        let runtime = test_runtime(&self.mock, &self.sink);
        flow.run(ExecutionContext::from_value(document), &runtime)
            .await
            .map(|output| output.context)
    }
}

fn pipeline_document() -> Value {
    let mut document = sample_pipeline_document();
    document["Region"] = json!(TEST_REGION);
    document["AccountID"] = json!(TEST_ACCOUNT);
    document
}

#[tokio::test]
async fn test_dataset_group_then_dataset_map() {
    let s = Scenario::new();
    s.mock.script_call(
        "describeDatasetGroup",
        [
            ApiOutcome::NotFound("dataset group not found".to_string()),
            ApiOutcome::Ok(describe_response(ResourceKind::DatasetGroup, "ACTIVE")),
        ],
    );
    s.script_create(ResourceKind::DatasetGroup);
    s.script_create(ResourceKind::Schema);
    s.script_describes(ResourceKind::Schema, &["ACTIVE"]);
    s.script_create(ResourceKind::Dataset);
    s.script_describes(ResourceKind::Dataset, &["ACTIVE"]);
    s.script_create(ResourceKind::DatasetImportJob);
    s.script_describes(ResourceKind::DatasetImportJob, &["CREATE IN_PROGRESS", "ACTIVE"]);

    let pipeline = Branch::new("Pipeline")
        .then(s.registry.invocation(ResourceKind::DatasetGroup).unwrap())
        .then(Arc::new(s.dataset_map()));
    let ctx = s.run(&pipeline, pipeline_document()).await.unwrap();

    assert_journal(
        s.mock.journal(),
        &[
            "describeDatasetGroup",
            "createDatasetGroup",
            "wait",
            "describeDatasetGroup",
            "createSchema",
            "wait",
            "describeSchema",
            "createDataset",
            "wait",
            "describeDataset",
            "createDatasetImportJob",
            "wait",
            "describeDatasetImportJob",
            "wait",
            "describeDatasetImportJob",
        ],
    );
    assert_notified(&s.sink, ResourceKind::DatasetGroup, "ACTIVE", 1);
    assert_notification_count(&s.sink, ResourceKind::Schema, 1);
    assert_notified(&s.sink, ResourceKind::Dataset, "ACTIVE", 1);
    assert_notified(&s.sink, ResourceKind::DatasetImportJob, "ACTIVE", 1);

    let doc = ctx.as_value();
    assert_eq!(doc["DatasetGroupTask"]["DatasetGroupStatus"], "ACTIVE");
    assert_eq!(
        doc["DatasetMapOutput"][0]["DatasetCreateImportJobArn"],
        json!(arn_for(ResourceKind::DatasetImportJob, "fixture"))
    );
    assert_eq!(doc["DatasetMapOutput"][0]["DatasetImportJobStatus"], "ACTIVE");
}

#[tokio::test]
async fn test_existing_dataset_is_polled_not_recreated() {
    let s = Scenario::new();
    s.script_create(ResourceKind::Schema);
    s.script_describes(ResourceKind::Schema, &["ACTIVE"]);
    s.mock.script_create(
        ResourceKind::Dataset,
        [ApiOutcome::Error(crate::control_plane::ApiError::from_code(
            "ResourceAlreadyExistsException",
            "dataset exists",
        ))],
    );
    s.script_describes(ResourceKind::Dataset, &["ACTIVE"]);

    let mut document = pipeline_document();
    document["datasetGroup"]["datasets"][0]["datasetImportJob"]["createNewJob"] = json!(false);
    let ctx = s.run(&s.dataset_map(), document).await.unwrap();

    assert_journal(
        s.mock.journal(),
        &["createSchema", "wait", "describeSchema", "createDataset", "describeDataset"],
    );
    let item = &ctx.as_value()["DatasetMapOutput"][0];
    assert_eq!(item["DatasetImportJobStatus"], Value::Null);
    assert!(item.get("DatasetCreateImportJobArn").is_none());
}

#[tokio::test]
async fn test_event_tracker_created_when_none_exist() {
    let s = Scenario::new();
    s.mock
        .script_call("listEventTrackers", [ApiOutcome::Ok(json!({"EventTrackers": []}))]);
    s.script_create(ResourceKind::EventTracker);
    s.script_describes(ResourceKind::EventTracker, &["ACTIVE"]);

    let step = s.registry.invocation(ResourceKind::EventTracker).unwrap();
    let ctx = s.run(step.as_ref(), pipeline_document()).await.unwrap();

    assert_journal(
        s.mock.journal(),
        &["listEventTrackers", "createEventTracker", "describeEventTracker"],
    );
    assert_notified(&s.sink, ResourceKind::EventTracker, "ACTIVE", 1);
    assert_eq!(
        ctx.as_value()["EventTrackerTask"]["EventTrackerArn"],
        json!(arn_for(ResourceKind::EventTracker, "fixture"))
    );
}

#[tokio::test]
async fn test_event_tracker_adopts_existing() {
    let s = Scenario::new();
    let existing = "arn:aws:personalize:us-east-1:123456789012:event-tracker/existing";
    s.mock.script_call(
        "listEventTrackers",
        [ApiOutcome::Ok(json!({"EventTrackers": [{"EventTrackerArn": existing}]}))],
    );
    s.script_describes(ResourceKind::EventTracker, &["ACTIVE"]);

    let step = s.registry.invocation(ResourceKind::EventTracker).unwrap();
    s.run(step.as_ref(), pipeline_document()).await.unwrap();

    assert_journal(s.mock.journal(), &["listEventTrackers", "describeEventTracker"]);
    assert_notification_count(&s.sink, ResourceKind::EventTracker, 0);
    let entries = s.mock.journal().entries();
    match &entries[1] {
        crate::testing::JournalEntry::Call { params, .. } => {
            assert_eq!(params["EventTrackerArn"], existing);
        }
        other => panic!("unexpected entry: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_import_job_reaches_catch_handler() {
    let s = Scenario::new();
    s.script_create(ResourceKind::Schema);
    s.script_describes(ResourceKind::Schema, &["ACTIVE"]);
    s.script_create(ResourceKind::Dataset);
    s.script_describes(ResourceKind::Dataset, &["ACTIVE"]);
    s.mock.script_create(
        ResourceKind::DatasetImportJob,
        [ApiOutcome::Ok(AdapterReply::succeeded(create_response(
            s.lifecycle(ResourceKind::DatasetImportJob).descriptor(),
        )))],
    );
    s.script_describes(ResourceKind::DatasetImportJob, &["CREATE FAILED"]);

    let on_failure = Branch::new("OnFailure")
        .then(Arc::new(NotifyFlow::new("PutEvent-Failure-Notification", "")))
        .then(Arc::new(FailFlow::new("FailState", "")))
        .build();
    let top = ParallelFlow::new("ManagedExecution")
        .with_branch(Arc::new(s.dataset_map()))
        .with_catch(Catch::new(on_failure, ResultPath::At(JsonPath::root())));

    let err = s.run(&top, pipeline_document()).await.unwrap_err();

    match err {
        FlowError::PipelineFailed { error, cause } => {
            assert_eq!(error, "Failure");
            assert!(cause.contains("CREATE FAILED"), "cause: {cause}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_notified(&s.sink, ResourceKind::DatasetImportJob, "CREATE FAILED", 1);
    assert_eq!(s.sink.events_of_type(PIPELINE_FAILURE_DETAIL_TYPE).len(), 1);
    assert_eq!(s.mock.journal().count("describeDatasetImportJob"), 1);
}
