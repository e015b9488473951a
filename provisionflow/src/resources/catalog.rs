//! The standard descriptor table.

use std::collections::BTreeMap;

use crate::context::{Condition, JsonPath, ResultPath, ValueTemplate};
use crate::control_plane::ApiErrorKind;
use crate::errors::{FlowError, ValidationError};
use crate::events::NotificationTemplate;

use super::descriptor::{
    ApiCall, CreateSpec, Existence, InvocationSpec, ListSpec, ResourceDescriptor, StatusRule,
    SuccessNotice, UpdateSpec,
};
use super::ResourceKind;

const ACTIVE: &str = "ACTIVE";
const CREATE_FAILED: &str = "CREATE FAILED";
const DEFAULT_FAILURE: &str = "Failure";

/// One descriptor per resource kind.
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    descriptors: BTreeMap<ResourceKind, ResourceDescriptor>,
}

impl ResourceCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The catalog with every kind the pipeline provisions.
    #[must_use]
    pub fn standard() -> Self {
        [
            preprocessing_job(),
            dataset_group(),
            schema(),
            dataset(),
            dataset_import_job(),
            filter(),
            event_tracker(),
            solution(),
            solution_version(),
            campaign(),
            recommender(),
            batch_inference_job(),
            batch_segment_job(),
        ]
        .into_iter()
        .fold(Self::empty(), Self::with_descriptor)
    }

    /// Adds or replaces a descriptor.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: ResourceDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// Adds or replaces a descriptor, returning the previous one.
    pub fn insert(&mut self, descriptor: ResourceDescriptor) -> Option<ResourceDescriptor> {
        self.descriptors.insert(descriptor.kind, descriptor)
    }

    /// Looks up a kind.
    pub fn get(&self, kind: ResourceKind) -> Result<&ResourceDescriptor, FlowError> {
        self.descriptors.get(&kind).ok_or_else(|| {
            ValidationError::new(
                "CATALOG-001-MISSING-KIND",
                format!("No descriptor registered for {kind}"),
            )
            .with_fix_hint("Register the kind with ResourceCatalog::with_descriptor")
            .into()
        })
    }

    /// Registered kinds in pipeline order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(|k| self.descriptors.contains_key(k))
            .collect()
    }

    /// Number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true when no descriptor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Checks every descriptor for problems that would only surface at run time.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for descriptor in self.descriptors.values() {
            validate_descriptor(descriptor)?;
        }
        Ok(())
    }
}

fn validate_descriptor(d: &ResourceDescriptor) -> Result<(), ValidationError> {
    if d.step_name.trim().is_empty() {
        return Err(ValidationError::new(
            "CATALOG-002-EMPTY-STEP-NAME",
            format!("{} descriptor has an empty step name", d.kind),
        )
        .with_context_entry("kind", d.kind.to_string()));
    }

    for write in d.declared_writes() {
        if let ResultPath::At(path) = &write {
            if !path.is_writable() {
                return Err(ValidationError::new(
                    "CATALOG-003-UNWRITABLE-PATH",
                    format!("{} descriptor writes through a search path: {path}", d.kind),
                )
                .with_fix_hint("Write targets may only contain field and index segments")
                .with_context_entry("kind", d.kind.to_string()));
            }
        }
    }

    if d.failure_error.is_empty() {
        return Err(ValidationError::new(
            "CATALOG-004-EMPTY-ERROR-LABEL",
            format!("{} descriptor has no failure error label", d.kind),
        )
        .with_context_entry("kind", d.kind.to_string()));
    }
    Ok(())
}

fn skip_message(kind: ResourceKind) -> String {
    format!("{kind} step data not present, skipping step")
}

fn arn_format(resource: &str, name_args: &[&str]) -> ValueTemplate {
    let placeholders = vec!["{}"; name_args.len()].join("-");
    let pattern = format!("arn:aws:personalize:{{}}:{{}}:{resource}/{placeholders}");
    let mut args = vec!["Region", "AccountID"];
    args.extend_from_slice(name_args);
    ValueTemplate::format(pattern, &args)
}

fn param(key: &str, value: ValueTemplate) -> ValueTemplate {
    ValueTemplate::object([(key, value)])
}

fn child_input(kind: ResourceKind) -> ValueTemplate {
    ValueTemplate::object([
        ("Region", ValueTemplate::path("Region")),
        ("AccountID", ValueTemplate::path("AccountID")),
        ("Type", ValueTemplate::literal(kind.object_type())),
    ])
}

fn status_notification(kind: ResourceKind, describe_root: &str) -> NotificationTemplate {
    let object = format!("{describe_root}.{}", kind.object_type());
    NotificationTemplate::new(
        format!("Personalize {kind} status change"),
        JsonPath::fields(&format!("{object}.{}Arn", kind.object_type())),
    )
    .with_status_path(JsonPath::fields(&format!("{object}.Status")))
}

fn status_rule(kind: ResourceKind, describe_root: &str) -> StatusRule {
    StatusRule::status_field(
        &format!("{describe_root}.{}.Status", kind.object_type()),
        ACTIVE,
        CREATE_FAILED,
    )
}

fn retry_limit() -> Vec<ApiErrorKind> {
    vec![ApiErrorKind::LimitExceeded]
}

fn retry_limit_in_use() -> Vec<ApiErrorKind> {
    vec![ApiErrorKind::LimitExceeded, ApiErrorKind::ResourceInUse]
}

fn solution_version_available() -> Condition {
    Condition::or(vec![
        Condition::is_present("SolutionVersionArn"),
        Condition::is_present("ServiceConfig.solutionVersionArn"),
    ])
}

fn preprocessing_job() -> ResourceDescriptor {
    let kind = ResourceKind::PreprocessingJob;
    let search = |field: &str| {
        ValueTemplate::OptionalPath(
            JsonPath::root()
                .find_first("preprocessing")
                .field("preprocessing")
                .field(field),
        )
    };

    ResourceDescriptor {
        kind,
        step_name: "PreprocessingTask".to_string(),
        gate: Condition::and(vec![
            Condition::is_present("JobName"),
            Condition::boolean_equals("Run", true),
        ]),
        skip_message: skip_message(kind),
        existence: Existence::None,
        create: CreateSpec::service(
            "startJobRun",
            param("JobName", ValueTemplate::path("JobName")),
            "StartJobRun",
            "JobRunId",
        ),
        describe: ApiCall::new(
            "getJobRun",
            ValueTemplate::object([
                ("JobName", ValueTemplate::path("JobName")),
                ("RunId", ValueTemplate::path("StartJobRun.response.JobRunId")),
            ]),
            "GetJobRun",
        ),
        status: StatusRule::status_field("GetJobRun.JobRun.JobRunState", "SUCCEEDED", "FAILED"),
        update: None,
        notification: NotificationTemplate::new(
            "Personalize JobRun status change",
            JsonPath::fields("GetJobRun.JobRun.Id"),
        )
        .with_status_path(JsonPath::fields("GetJobRun.JobRun.JobRunState"))
        .with_detail("JobName", "GetJobRun.JobRun.JobName")
        .with_detail("LogGroupName", "GetJobRun.JobRun.LogGroupName"),
        success_notice: SuccessNotice::Always,
        notify_pending: false,
        failure_error: "Glue Job failed".to_string(),
        invocation: InvocationSpec {
            input: ValueTemplate::object([
                ("Region", ValueTemplate::path("Region")),
                ("AccountID", ValueTemplate::path("AccountID")),
                ("JobName", search("jobName")),
                ("Run", search("run")),
            ]),
            result_selector: ValueTemplate::object([
                ("JobRunId", ValueTemplate::optional("Output.GetJobRun.JobRun.Id")),
                ("JobRunState", ValueTemplate::optional("Output.GetJobRun.JobRun.JobRunState")),
                ("Status", ValueTemplate::path("Status")),
            ]),
            result_path: ResultPath::at("PreprocessingTask"),
            output_only: false,
            retry_on: vec![
                ApiErrorKind::InternalService,
                ApiErrorKind::OperationTimeout,
                ApiErrorKind::LimitExceeded,
            ],
        },
    }
}

fn dataset_group() -> ResourceDescriptor {
    let kind = ResourceKind::DatasetGroup;
    ResourceDescriptor {
        kind,
        step_name: "DatasetGroupTask".to_string(),
        gate: Condition::is_present("ServiceConfig.name"),
        skip_message: skip_message(kind),
        existence: Existence::Describe,
        create: CreateSpec::adapter("CreateDatasetGroup", "datasetGroupArn")
            .with_domain_path("ServiceConfig.domain"),
        describe: ApiCall::new(
            "describeDatasetGroup",
            param("DatasetGroupArn", arn_format("dataset-group", &["ServiceConfig.name"])),
            "DescribeDatasetGroup",
        ),
        status: status_rule(kind, "DescribeDatasetGroup"),
        update: None,
        notification: status_notification(kind, "DescribeDatasetGroup")
            .with_detail("Name", "DescribeDatasetGroup.DatasetGroup.Name"),
        success_notice: SuccessNotice::Always,
        notify_pending: true,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("ServiceConfig", ValueTemplate::optional("datasetGroup.serviceConfig")),
            result_selector: ValueTemplate::object([
                (
                    "DatasetGroupArn",
                    ValueTemplate::optional(
                        "Output.DescribeDatasetGroup.DatasetGroup.DatasetGroupArn",
                    ),
                ),
                (
                    "DatasetGroupStatus",
                    ValueTemplate::optional("Output.DescribeDatasetGroup.DatasetGroup.Status"),
                ),
                ("Status", ValueTemplate::path("Status")),
            ]),
            result_path: ResultPath::at("DatasetGroupTask"),
            output_only: false,
            retry_on: retry_limit(),
        },
    }
}

fn schema() -> ResourceDescriptor {
    let kind = ResourceKind::Schema;
    let schema_arn = "DescribeSchema.Schema.SchemaArn";
    ResourceDescriptor {
        kind,
        step_name: "SchemaTask".to_string(),
        gate: Condition::is_present("Item.schema"),
        skip_message: skip_message(kind),
        existence: Existence::None,
        create: CreateSpec::adapter("CreateSchema", "schemaArn").poll_if_exists(),
        describe: ApiCall::new(
            "describeSchema",
            param(
                "SchemaArn",
                arn_format(
                    "schema",
                    &[
                        "DatasetGroup.serviceConfig.name",
                        "Item.schema.serviceConfig.name",
                        "Item.schema.schemaVersion",
                    ],
                ),
            ),
            "DescribeSchema",
        ),
        status: StatusRule {
            status_path: None,
            success: Condition::IsNotNull(JsonPath::fields(schema_arn)),
            failure: Condition::IsNull(JsonPath::fields(schema_arn)),
        },
        update: None,
        notification: NotificationTemplate::new(
            "Personalize Schema status change",
            JsonPath::fields(schema_arn),
        )
        .with_detail("Schema", "DescribeSchema.Schema.Schema")
        .with_detail("Name", "DescribeSchema.Schema.Name"),
        success_notice: SuccessNotice::Always,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("DatasetGroup", ValueTemplate::optional("DatasetGroup"))
                .with_entry("Item", ValueTemplate::optional("Item")),
            result_selector: ValueTemplate::object([
                ("Region", ValueTemplate::path("Input.Region")),
                ("AccountID", ValueTemplate::path("Input.AccountID")),
                ("SchemaArn", ValueTemplate::optional("Output.DescribeSchema.Schema.SchemaArn")),
                ("DatasetGroup", ValueTemplate::optional("Input.DatasetGroup")),
                ("Item", ValueTemplate::optional("Input.Item")),
            ]),
            result_path: ResultPath::at("SchemaTask"),
            output_only: true,
            retry_on: retry_limit(),
        },
    }
}

fn dataset() -> ResourceDescriptor {
    let kind = ResourceKind::Dataset;
    ResourceDescriptor {
        kind,
        step_name: "DatasetTask".to_string(),
        gate: Condition::is_present("Item.dataset"),
        skip_message: skip_message(kind),
        existence: Existence::None,
        create: CreateSpec::adapter("CreateDataset", "datasetArn").poll_if_exists(),
        describe: ApiCall::new(
            "describeDataset",
            param(
                "DatasetArn",
                ValueTemplate::format(
                    "arn:aws:personalize:{}:{}:dataset/{}/{}",
                    &["Region", "AccountID", "DatasetGroup.serviceConfig.name", "Item.type"],
                ),
            ),
            "DescribeDataset",
        ),
        status: status_rule(kind, "DescribeDataset"),
        update: None,
        notification: status_notification(kind, "DescribeDataset")
            .with_detail("DatasetGroupArn", "DescribeDataset.Dataset.DatasetGroupArn")
            .with_detail("DatasetType", "DescribeDataset.Dataset.DatasetType")
            .with_detail("SchemaArn", "DescribeDataset.Dataset.SchemaArn")
            .with_detail("Name", "DescribeDataset.Dataset.Name"),
        success_notice: SuccessNotice::Always,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("SchemaArn", ValueTemplate::optional("SchemaArn"))
                .with_entry("DatasetGroup", ValueTemplate::optional("DatasetGroup"))
                .with_entry("Item", ValueTemplate::optional("Item")),
            result_selector: ValueTemplate::object([
                ("Region", ValueTemplate::path("Input.Region")),
                ("AccountID", ValueTemplate::path("Input.AccountID")),
                ("Item", ValueTemplate::optional("Input.Item")),
                ("DatasetStatus", ValueTemplate::optional("Output.DescribeDataset.Dataset.Status")),
                (
                    "CreateDatasetArn",
                    ValueTemplate::optional("Output.CreateDataset.response.datasetArn"),
                ),
                ("DatasetGroup", ValueTemplate::optional("Input.DatasetGroup")),
            ]),
            result_path: ResultPath::at("DatasetTask"),
            output_only: true,
            retry_on: retry_limit_in_use(),
        },
    }
}

fn dataset_import_job() -> ResourceDescriptor {
    let kind = ResourceKind::DatasetImportJob;
    let describe_root = "DescribeDatasetImportJob.DatasetImportJob";
    ResourceDescriptor {
        kind,
        step_name: "DatasetImportJobTask".to_string(),
        gate: Condition::and(vec![
            Condition::is_present("Item.datasetImportJob"),
            Condition::or(vec![
                Condition::boolean_equals("Item.datasetImportJob.createNewJob", true),
                Condition::is_present("UpdateDatasetArn"),
                Condition::is_present("CreateDatasetArn"),
            ]),
        ]),
        skip_message: skip_message(kind),
        existence: Existence::None,
        create: CreateSpec::adapter("CreateDatasetImportJob", "datasetImportJobArn"),
        describe: ApiCall::new(
            "describeDatasetImportJob",
            param(
                "DatasetImportJobArn",
                ValueTemplate::path("CreateDatasetImportJob.response.datasetImportJobArn"),
            ),
            "DescribeDatasetImportJob",
        ),
        status: status_rule(kind, "DescribeDatasetImportJob"),
        update: None,
        notification: status_notification(kind, "DescribeDatasetImportJob")
            .with_detail("DatasetArn", &format!("{describe_root}.DatasetArn"))
            .with_detail("DataLocation", &format!("{describe_root}.DataSource.DataLocation"))
            .with_detail("ImportMode", &format!("{describe_root}.ImportMode"))
            .with_detail("JobName", &format!("{describe_root}.JobName")),
        success_notice: SuccessNotice::Always,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("Item", ValueTemplate::optional("Item"))
                .with_entry("DatasetGroup", ValueTemplate::optional("DatasetGroup"))
                .with_entry("UpdateDatasetArn", ValueTemplate::optional("UpdateDatasetArn"))
                .with_entry("CreateDatasetArn", ValueTemplate::optional("CreateDatasetArn")),
            result_selector: ValueTemplate::object([
                (
                    "DatasetImportJobStatus",
                    ValueTemplate::optional(&format!("Output.{describe_root}.Status")),
                ),
                (
                    "DatasetDescribeImportJobArn",
                    ValueTemplate::optional(&format!("Output.{describe_root}.DatasetImportJobArn")),
                ),
                (
                    "DatasetCreateImportJobArn",
                    ValueTemplate::optional(
                        "Output.CreateDatasetImportJob.response.datasetImportJobArn",
                    ),
                ),
                (
                    "ImportMode",
                    ValueTemplate::optional(&format!("Output.{describe_root}.ImportMode")),
                ),
                ("DatasetGroup", ValueTemplate::optional("Input.DatasetGroup")),
            ]),
            result_path: ResultPath::at("DatasetImportJobTask"),
            output_only: true,
            retry_on: retry_limit_in_use(),
        },
    }
}

fn filter() -> ResourceDescriptor {
    let kind = ResourceKind::Filter;
    ResourceDescriptor {
        kind,
        step_name: "FilterTask".to_string(),
        gate: Condition::is_present("Item.serviceConfig"),
        skip_message: skip_message(kind),
        existence: Existence::None,
        create: CreateSpec::adapter("CreateFilter", "filterArn").poll_if_exists(),
        describe: ApiCall::new(
            "describeFilter",
            param("FilterArn", arn_format("filter", &["Item.serviceConfig.name"])),
            "DescribeFilter",
        ),
        status: status_rule(kind, "DescribeFilter"),
        update: None,
        notification: status_notification(kind, "DescribeFilter")
            .with_detail("DatasetGroupArn", "DescribeFilter.Filter.DatasetGroupArn")
            .with_detail("Name", "DescribeFilter.Filter.Name"),
        success_notice: SuccessNotice::Always,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("DatasetGroup", ValueTemplate::optional("DatasetGroup"))
                .with_entry("Item", ValueTemplate::optional("Item")),
            result_selector: ValueTemplate::object([
                ("FilterArn", ValueTemplate::optional("Output.DescribeFilter.Filter.FilterArn")),
                ("Status", ValueTemplate::path("Status")),
            ]),
            result_path: ResultPath::at("FilterTask"),
            output_only: false,
            retry_on: retry_limit(),
        },
    }
}

fn event_tracker() -> ResourceDescriptor {
    let kind = ResourceKind::EventTracker;
    ResourceDescriptor {
        kind,
        step_name: "EventTrackerTask".to_string(),
        gate: Condition::is_present("ServiceConfig"),
        skip_message: skip_message(kind),
        existence: Existence::ListFirst(ListSpec {
            call: ApiCall::new(
                "listEventTrackers",
                param(
                    "DatasetGroupArn",
                    arn_format("dataset-group", &["DatasetGroup.serviceConfig.name"]),
                ),
                "ListEventTrackers",
            ),
            first_arn: JsonPath::fields("ListEventTrackers.EventTrackers")
                .index(0)
                .field("EventTrackerArn"),
            adopt_into: ResultPath::at("EventTracker.EventTrackerArn"),
        }),
        create: CreateSpec::adapter("CreateEventTracker", "eventTrackerArn")
            .without_wait()
            .adopt_arn_into("EventTracker.EventTrackerArn"),
        describe: ApiCall::new(
            "describeEventTracker",
            param("EventTrackerArn", ValueTemplate::path("EventTracker.EventTrackerArn")),
            "DescribeEventTracker",
        ),
        status: status_rule(kind, "DescribeEventTracker"),
        update: None,
        notification: status_notification(kind, "DescribeEventTracker")
            .with_detail("TrackingId", "DescribeEventTracker.EventTracker.TrackingId")
            .with_detail("DatasetGroupArn", "DescribeEventTracker.EventTracker.DatasetGroupArn")
            .with_detail("Name", "DescribeEventTracker.EventTracker.Name"),
        success_notice: SuccessNotice::CreatedThisRun,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("DatasetGroup", ValueTemplate::optional("datasetGroup"))
                .with_entry(
                    "ServiceConfig",
                    ValueTemplate::OptionalPath(
                        JsonPath::root()
                            .find_first("eventTracker")
                            .field("eventTracker")
                            .field("serviceConfig"),
                    ),
                ),
            result_selector: ValueTemplate::object([
                (
                    "EventTrackerArn",
                    ValueTemplate::optional(
                        "Output.DescribeEventTracker.EventTracker.EventTrackerArn",
                    ),
                ),
                ("Status", ValueTemplate::path("Status")),
            ]),
            result_path: ResultPath::at("EventTrackerTask"),
            output_only: false,
            retry_on: retry_limit_in_use(),
        },
    }
}

fn solution() -> ResourceDescriptor {
    let kind = ResourceKind::Solution;
    ResourceDescriptor {
        kind,
        step_name: "SolutionTask".to_string(),
        gate: Condition::is_present("ServiceConfig"),
        skip_message: skip_message(kind),
        existence: Existence::Describe,
        create: CreateSpec::adapter("CreateSolution", "solutionArn"),
        describe: ApiCall::new(
            "describeSolution",
            param("SolutionArn", arn_format("solution", &["ServiceConfig.name"])),
            "DescribeSolution",
        ),
        status: status_rule(kind, "DescribeSolution"),
        update: None,
        notification: status_notification(kind, "DescribeSolution")
            .with_detail("DatasetGroupArn", "DescribeSolution.Solution.DatasetGroupArn")
            .with_detail("RecipeArn", "DescribeSolution.Solution.RecipeArn")
            .with_detail("Name", "DescribeSolution.Solution.Name"),
        success_notice: SuccessNotice::CreatedThisRun,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("DatasetGroup", ValueTemplate::optional("DatasetGroup"))
                .with_entry("ServiceConfig", ValueTemplate::optional("Solution.serviceConfig"))
                .with_entry(
                    "DatasetCreateImportJobArn",
                    ValueTemplate::optional("DatasetCreateImportJobArn"),
                ),
            result_selector: ValueTemplate::object([
                (
                    "SolutionArn",
                    ValueTemplate::optional("Output.DescribeSolution.Solution.SolutionArn"),
                ),
                ("Status", ValueTemplate::path("Status")),
            ]),
            result_path: ResultPath::at("SolutionTask"),
            output_only: false,
            retry_on: retry_limit_in_use(),
        },
    }
}

fn solution_version() -> ResourceDescriptor {
    let kind = ResourceKind::SolutionVersion;
    let describe_root = "DescribeSolutionVersion.SolutionVersion";
    ResourceDescriptor {
        kind,
        step_name: "SolutionVersionTask".to_string(),
        gate: Condition::or(vec![
            Condition::boolean_equals("CreateNewSolutionVersion", true),
            Condition::array_not_empty("DatasetCreateImportJobArn"),
        ]),
        skip_message: "Training mode not specified, skipping generating new version".to_string(),
        existence: Existence::None,
        create: CreateSpec::adapter("CreateSolutionVersion", "solutionVersionArn"),
        describe: ApiCall::new(
            "describeSolutionVersion",
            param(
                "SolutionVersionArn",
                ValueTemplate::path("CreateSolutionVersion.response.solutionVersionArn"),
            ),
            "DescribeSolutionVersion",
        ),
        status: status_rule(kind, "DescribeSolutionVersion"),
        update: None,
        notification: status_notification(kind, "DescribeSolutionVersion")
            .with_detail("DatasetGroupArn", &format!("{describe_root}.DatasetGroupArn"))
            .with_detail("RecipeArn", &format!("{describe_root}.RecipeArn"))
            .with_detail("Name", &format!("{describe_root}.Name"))
            .with_detail("SolutionArn", &format!("{describe_root}.SolutionArn"))
            .with_detail("TrainingHours", &format!("{describe_root}.TrainingHours"))
            .with_detail("TrainingMode", &format!("{describe_root}.TrainingMode")),
        success_notice: SuccessNotice::Always,
        notify_pending: false,
        failure_error: "Creation failed".to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry(
                    "SolutionServiceConfig",
                    ValueTemplate::optional("Solution.serviceConfig"),
                )
                .with_entry(
                    "SolutionVersionServiceConfig",
                    ValueTemplate::optional("Solution.solutionVersion.serviceConfig"),
                )
                .with_entry(
                    "CreateNewSolutionVersion",
                    ValueTemplate::optional("Solution.solutionVersion.createNewSolutionVersion"),
                )
                .with_entry(
                    "DatasetCreateImportJobArn",
                    ValueTemplate::optional("DatasetCreateImportJobArn"),
                ),
            result_selector: ValueTemplate::object([
                (
                    "SolutionVersionArn",
                    ValueTemplate::optional(
                        "Output.CreateSolutionVersion.response.solutionVersionArn",
                    ),
                ),
                ("Status", ValueTemplate::path("Status")),
            ]),
            result_path: ResultPath::at("SolutionVersionTask"),
            output_only: false,
            retry_on: retry_limit_in_use(),
        },
    }
}

fn campaign() -> ResourceDescriptor {
    let kind = ResourceKind::Campaign;
    let campaign_arn = || arn_format("campaign", &["ServiceConfig.name"]);
    ResourceDescriptor {
        kind,
        step_name: "CampaignTask".to_string(),
        gate: Condition::and(vec![
            solution_version_available(),
            Condition::boolean_equals("CreateCampaign", true),
        ]),
        skip_message: skip_message(kind),
        existence: Existence::Describe,
        create: CreateSpec::adapter("CreateCampaign", "campaignArn"),
        describe: ApiCall::new(
            "describeCampaign",
            param("CampaignArn", campaign_arn()),
            "DescribeCampaign",
        ),
        status: status_rule(kind, "DescribeCampaign"),
        update: Some(UpdateSpec {
            call: ApiCall::new(
                "updateCampaign",
                ValueTemplate::object([
                    ("CampaignArn", campaign_arn()),
                    (
                        "SolutionVersionArn",
                        ValueTemplate::first_of(&[
                            "ServiceConfig.solutionVersionArn",
                            "SolutionVersionArn",
                        ]),
                    ),
                ]),
                "CampaignMetaData",
            ),
            when: Condition::is_present("SolutionVersionArn"),
        }),
        notification: status_notification(kind, "DescribeCampaign")
            .with_detail("SolutionVersionArn", "DescribeCampaign.Campaign.SolutionVersionArn")
            .with_detail("Name", "DescribeCampaign.Campaign.Name"),
        success_notice: SuccessNotice::Always,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("SolutionVersionArn", ValueTemplate::optional("SolutionVersionArn"))
                .with_entry("ServiceConfig", ValueTemplate::optional("Campaign.serviceConfig"))
                .with_entry("CreateCampaign", ValueTemplate::optional("Campaign.createCampaign")),
            result_selector: ValueTemplate::object([(
                "CampaignArn",
                ValueTemplate::optional("Output.DescribeCampaign.Campaign.CampaignArn"),
            )]),
            result_path: ResultPath::at("CampaignTask"),
            output_only: false,
            retry_on: retry_limit_in_use(),
        },
    }
}

fn recommender() -> ResourceDescriptor {
    let kind = ResourceKind::Recommender;
    ResourceDescriptor {
        kind,
        step_name: "RecommenderTask".to_string(),
        gate: Condition::boolean_equals("CreateRecommender", true),
        skip_message: skip_message(kind),
        existence: Existence::Describe,
        create: CreateSpec::adapter("CreateRecommender", "recommenderArn"),
        describe: ApiCall::new(
            "describeRecommender",
            param("RecommenderArn", arn_format("recommender", &["ServiceConfig.name"])),
            "DescribeRecommender",
        ),
        status: status_rule(kind, "DescribeRecommender"),
        update: None,
        notification: status_notification(kind, "DescribeRecommender")
            .with_detail("DatasetGroupArn", "DescribeRecommender.Recommender.DatasetGroupArn")
            .with_detail("Name", "DescribeRecommender.Recommender.Name")
            .with_detail("RecipeArn", "DescribeRecommender.Recommender.RecipeArn"),
        success_notice: SuccessNotice::CreatedThisRun,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("DatasetGroup", ValueTemplate::optional("DatasetGroup"))
                .with_entry("ServiceConfig", ValueTemplate::optional("Recommender.serviceConfig"))
                .with_entry(
                    "CreateRecommender",
                    ValueTemplate::optional("Recommender.createRecommender"),
                ),
            result_selector: ValueTemplate::object([
                (
                    "RecommenderArn",
                    ValueTemplate::optional(
                        "Output.DescribeRecommender.Recommender.RecommenderArn",
                    ),
                ),
                ("Status", ValueTemplate::path("Status")),
            ]),
            result_path: ResultPath::at("RecommenderTask"),
            output_only: false,
            retry_on: retry_limit_in_use(),
        },
    }
}

fn batch_job(
    kind: ResourceKind,
    step_name: &str,
    item_key: &str,
    create_flag: &str,
    create_flag_source: &str,
) -> ResourceDescriptor {
    let object = kind.object_type();
    let create_root = format!("Create{object}");
    let describe_root = format!("Describe{object}");
    let arn_field = format!("{}{}Arn", object[..1].to_lowercase(), &object[1..]);
    let described = format!("{describe_root}.{object}");

    ResourceDescriptor {
        kind,
        step_name: step_name.to_string(),
        gate: Condition::and(vec![
            solution_version_available(),
            Condition::boolean_equals(create_flag, true),
        ]),
        skip_message: skip_message(kind),
        existence: Existence::None,
        create: CreateSpec::adapter(&create_root, arn_field.clone()),
        describe: ApiCall::new(
            format!("describe{object}"),
            param(
                &format!("{object}Arn"),
                ValueTemplate::path(&format!("{create_root}.response.{arn_field}")),
            ),
            &describe_root,
        ),
        status: status_rule(kind, &describe_root),
        update: None,
        notification: status_notification(kind, &describe_root)
            .with_detail("SolutionVersionArn", &format!("{described}.SolutionVersionArn"))
            .with_detail("JobName", &format!("{described}.JobName"))
            .with_detail("JobInput", &format!("{described}.JobInput.S3DataSource.Path"))
            .with_detail("JobOutput", &format!("{described}.JobOutput.S3DataDestination.Path")),
        success_notice: SuccessNotice::Always,
        notify_pending: false,
        failure_error: DEFAULT_FAILURE.to_string(),
        invocation: InvocationSpec {
            input: child_input(kind)
                .with_entry("SolutionVersionArn", ValueTemplate::optional("SolutionVersionArn"))
                .with_entry(
                    "ServiceConfig",
                    ValueTemplate::optional(&format!("{item_key}.serviceConfig")),
                )
                .with_entry(create_flag, ValueTemplate::optional(create_flag_source)),
            result_selector: ValueTemplate::object([(
                format!("{object}Arn"),
                ValueTemplate::optional(&format!("Output.{described}.{object}Arn")),
            )]),
            result_path: ResultPath::at(step_name),
            output_only: false,
            retry_on: retry_limit_in_use(),
        },
    }
}

fn batch_inference_job() -> ResourceDescriptor {
    batch_job(
        ResourceKind::BatchInferenceJob,
        "BatchInferenceTask",
        "BatchInferenceJob",
        "CreateBatchInferenceJob",
        "BatchInferenceJob.createBatchInferenceJob",
    )
}

fn batch_segment_job() -> ResourceDescriptor {
    batch_job(
        ResourceKind::BatchSegmentJob,
        "BatchSegmentTask",
        "BatchSegmentJob",
        "CreateBatchSegmentJob",
        "BatchSegmentJob.createBatchSegmentJob",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use serde_json::json;

    #[test]
    fn test_standard_catalog_covers_every_kind() {
        let catalog = ResourceCatalog::standard();
        assert_eq!(catalog.kinds(), ResourceKind::ALL.to_vec());
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn test_missing_kind_is_a_validation_error() {
        let catalog = ResourceCatalog::empty();
        let err = catalog.get(ResourceKind::Campaign).unwrap_err();
        match err {
            FlowError::Validation(v) => assert_eq!(v.info.code, "CATALOG-001-MISSING-KIND"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_search_write_path() {
        let mut descriptor = dataset_group();
        descriptor.describe.result_path =
            ResultPath::At(JsonPath::root().find_first("DatasetGroup").field("DatasetGroup"));
        let catalog = ResourceCatalog::empty().with_descriptor(descriptor);

        let err = catalog.validate().unwrap_err();
        assert_eq!(err.info.code, "CATALOG-003-UNWRITABLE-PATH");
    }

    #[test]
    fn test_arn_format_renders_with_region_and_account() {
        let template = arn_format("campaign", &["ServiceConfig.name"]);
        let ctx = ExecutionContext::from_value(json!({
            "Region": "eu-west-1",
            "AccountID": "123",
            "ServiceConfig": {"name": "top-picks"}
        }));
        assert_eq!(
            template.render(&ctx).unwrap(),
            json!("arn:aws:personalize:eu-west-1:123:campaign/top-picks")
        );
    }

    #[test]
    fn test_schema_arn_joins_name_parts() {
        let catalog = ResourceCatalog::standard();
        let schema = catalog.get(ResourceKind::Schema).unwrap();
        let ctx = ExecutionContext::from_value(json!({
            "Region": "us-east-1",
            "AccountID": "1",
            "DatasetGroup": {"serviceConfig": {"name": "retail"}},
            "Item": {"schema": {"serviceConfig": {"name": "users"}, "schemaVersion": "v1"}}
        }));
        assert_eq!(
            schema.describe.params.render(&ctx).unwrap(),
            json!({"SchemaArn": "arn:aws:personalize:us-east-1:1:schema/retail-users-v1"})
        );
    }

    #[test]
    fn test_batch_job_paths() {
        let d = batch_inference_job();
        assert_eq!(d.create.arn_field, "batchInferenceJobArn");
        assert_eq!(d.describe.action, "describeBatchInferenceJob");
        assert_eq!(
            d.create.arn_path().to_string(),
            "$.CreateBatchInferenceJob.response.batchInferenceJobArn"
        );
    }

    #[test]
    fn test_import_job_gate() {
        let d = dataset_import_job();
        let skip = ExecutionContext::from_value(json!({"Item": {"datasetImportJob": {}}}));
        let run = ExecutionContext::from_value(json!({
            "Item": {"datasetImportJob": {}},
            "CreateDatasetArn": "arn:ds"
        }));
        assert!(!d.gate.evaluate(&skip));
        assert!(d.gate.evaluate(&run));
    }

    #[test]
    fn test_preprocessing_input_searches_nested_config() {
        let d = preprocessing_job();
        let parent = ExecutionContext::from_value(json!({
            "Region": "r",
            "AccountID": "a",
            "config": {"preprocessing": {"jobName": "prep", "run": true}}
        }));
        let input = d.invocation.input.render(&parent).unwrap();
        assert_eq!(input["JobName"], "prep");
        assert_eq!(input["Run"], true);
        assert!(d.gate.evaluate(&ExecutionContext::from_value(input)));
    }
}
