//! Builds the pipeline flow tree from a [`PipelineConfiguration`].

use std::sync::Arc;
use tracing::info;

use super::config::{InferenceOption, PipelineConfiguration, PipelineSettings};
use super::Pipeline;
use crate::context::{JsonPath, ResultPath, ValueTemplate};
use crate::errors::FlowError;
use crate::flow::{
    Branch, Catch, FailFlow, Flow, FlowRegistry, MapFlow, NotifyFlow, ParallelFlow, PassFlow,
};
use crate::resources::{ResourceCatalog, ResourceKind};

/// Name of the top-level parallel wrapping the whole pipeline.
pub const MANAGED_EXECUTION: &str = "ManagedExecution";

/// Assembles a [`Pipeline`] once at load time.
///
/// Disabled stages are left out of the tree entirely rather than gated at
/// run time.
#[derive(Debug)]
pub struct PipelineAssembler {
    config: PipelineConfiguration,
    settings: PipelineSettings,
    registry: FlowRegistry,
}

impl PipelineAssembler {
    /// Creates an assembler over the standard catalog.
    #[must_use]
    pub fn new(config: PipelineConfiguration, settings: PipelineSettings) -> Self {
        Self {
            config,
            settings,
            registry: FlowRegistry::new(ResourceCatalog::standard()),
        }
    }

    /// Replaces the catalog lifecycles are built from.
    #[must_use]
    pub fn with_catalog(mut self, catalog: ResourceCatalog) -> Self {
        self.registry = FlowRegistry::new(catalog);
        self
    }

    /// Validates the configuration and catalog, then builds the flow tree.
    pub fn build(&self) -> Result<Pipeline, FlowError> {
        self.config.validate()?;
        self.registry.catalog().validate()?;

        let mut pipeline = Branch::new("Pipeline").then(Arc::new(self.inject_environment()));
        if self.config.enable_preprocessing {
            pipeline = pipeline.then(self.registry.invocation(ResourceKind::PreprocessingJob)?);
        }
        pipeline = pipeline
            .then(self.registry.invocation(ResourceKind::DatasetGroup)?)
            .then(Arc::new(self.dataset_map()?));
        if self.config.enable_filters {
            pipeline = pipeline.then(Arc::new(self.filter_map()?));
        }
        if self.config.enable_event_tracker {
            pipeline = pipeline.then(self.registry.invocation(ResourceKind::EventTracker)?);
        }
        pipeline = pipeline.then(self.recommendation_stage()?);

        let stages: Vec<String> = pipeline.step_names().into_iter().map(str::to_string).collect();
        info!(stages = ?stages, lifecycles = self.registry.built(), "pipeline assembled");

        let root = ParallelFlow::new(MANAGED_EXECUTION)
            .with_branch(pipeline.build())
            .with_result_path(ResultPath::at(MANAGED_EXECUTION))
            .with_catch(Catch::new(on_failure(), ResultPath::At(JsonPath::root())));

        Ok(Pipeline::new(Arc::new(root), stages))
    }

    fn inject_environment(&self) -> PassFlow {
        PassFlow::new("InjectEnvironment").with_result(
            ValueTemplate::literal(self.settings.environment()),
            ResultPath::At(JsonPath::root()),
        )
    }

    fn map(&self, name: &str, items_path: &str, iterator: Arc<dyn Flow>) -> MapFlow {
        MapFlow::new(name, items_path, iterator).with_failure_mode(self.settings.map_failure_mode)
    }

    fn dataset_map(&self) -> Result<MapFlow, FlowError> {
        let item = Branch::new("DatasetItem")
            .then(self.registry.invocation(ResourceKind::Schema)?)
            .then(self.registry.invocation(ResourceKind::Dataset)?)
            .then(self.registry.invocation(ResourceKind::DatasetImportJob)?)
            .build();
        Ok(self
            .map("Create and Import Datasets", "datasetGroup.datasets", item)
            .with_item_selector(item_with_dataset_group("Item"))
            .with_max_concurrency(self.settings.dataset_concurrency)
            .with_result_path(ResultPath::at("DatasetMapOutput")))
    }

    fn filter_map(&self) -> Result<MapFlow, FlowError> {
        Ok(self
            .map("Filters", "filters", self.registry.invocation(ResourceKind::Filter)?)
            .with_item_selector(item_with_dataset_group("Item"))
            .with_max_concurrency(self.settings.filter_concurrency)
            .with_result_path(ResultPath::at("FilterMapOutput")))
    }

    fn recommendation_stage(&self) -> Result<Arc<dyn Flow>, FlowError> {
        let mut parallel = ParallelFlow::new("Solution and Recommenders");
        if let Some(options) = self.config.solutions() {
            parallel = parallel.with_branch(Arc::new(self.solution_map(options)?));
        }
        if self.config.has_recommenders() {
            parallel = parallel.with_branch(Arc::new(self.recommender_map()?));
        }
        if parallel.branch_count() == 0 {
            return Ok(Arc::new(PassFlow::new("Pipeline End")));
        }
        Ok(Arc::new(parallel))
    }

    fn solution_map(&self, options: &[InferenceOption]) -> Result<MapFlow, FlowError> {
        let item = Branch::new("SolutionItem")
            .then(self.registry.invocation(ResourceKind::Solution)?)
            .then(self.registry.invocation(ResourceKind::SolutionVersion)?)
            .then(self.inference_stage(options)?)
            .build();
        Ok(self
            .map("SolutionFlowMap", "solutions", item)
            .with_item_selector(ValueTemplate::object([
                ("Region", ValueTemplate::path("Region")),
                ("AccountID", ValueTemplate::path("AccountID")),
                ("Solution", ValueTemplate::MapItem),
                ("DatasetGroup", ValueTemplate::optional("datasetGroup")),
                (
                    "DatasetCreateImportJobArn",
                    ValueTemplate::Pluck {
                        items: JsonPath::fields("DatasetMapOutput"),
                        field: "DatasetCreateImportJobArn".to_string(),
                    },
                ),
            ]))
            .with_max_concurrency(self.settings.resource_concurrency))
    }

    fn inference_stage(&self, options: &[InferenceOption]) -> Result<Arc<dyn Flow>, FlowError> {
        let mut parallel = ParallelFlow::new("InferenceTasks");
        for option in options {
            let (name, items, key, kind) = match option {
                InferenceOption::Campaigns => {
                    ("CampaignMap", "Solution.campaigns", "Campaign", ResourceKind::Campaign)
                }
                InferenceOption::BatchInferenceJobs => (
                    "BatchInferenceJobMap",
                    "Solution.batchInferenceJobs",
                    "BatchInferenceJob",
                    ResourceKind::BatchInferenceJob,
                ),
                InferenceOption::BatchSegmentJobs => (
                    "BatchSegmentJobMap",
                    "Solution.batchSegmentJobs",
                    "BatchSegmentJob",
                    ResourceKind::BatchSegmentJob,
                ),
            };
            let map = self
                .map(name, items, self.registry.invocation(kind)?)
                .with_item_selector(ValueTemplate::object([
                    (key, ValueTemplate::MapItem),
                    ("Region", ValueTemplate::path("Region")),
                    ("AccountID", ValueTemplate::path("AccountID")),
                    (
                        "SolutionVersionArn",
                        ValueTemplate::optional("SolutionVersionTask.SolutionVersionArn"),
                    ),
                ]))
                .with_max_concurrency(self.settings.resource_concurrency);
            parallel = parallel.with_branch(Arc::new(map));
        }
        if parallel.branch_count() == 0 {
            return Ok(Arc::new(PassFlow::new("Solutions End")));
        }
        Ok(Arc::new(parallel))
    }

    fn recommender_map(&self) -> Result<MapFlow, FlowError> {
        let invocation = self.registry.invocation(ResourceKind::Recommender)?;
        Ok(self
            .map("RecommenderMap", "recommenders", invocation)
            .with_item_selector(item_with_dataset_group("Recommender"))
            .with_max_concurrency(self.settings.resource_concurrency))
    }
}

fn item_with_dataset_group(item_key: &str) -> ValueTemplate {
    ValueTemplate::object([
        (item_key, ValueTemplate::MapItem),
        ("DatasetGroup", ValueTemplate::optional("datasetGroup")),
        ("Region", ValueTemplate::path("Region")),
        ("AccountID", ValueTemplate::path("AccountID")),
    ])
}

fn on_failure() -> Arc<dyn Flow> {
    Branch::new("OnFailure")
        .then(Arc::new(NotifyFlow::new("PutEvent-Failure-Notification", "")))
        .then(Arc::new(FailFlow::new("FailState", "")))
        .build()
}
