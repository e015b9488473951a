//! Resource kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::FlowError;

/// A resource kind the pipeline can provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Container for datasets and everything trained on them.
    DatasetGroup,
    /// Avro schema describing a dataset.
    Schema,
    /// Users, items or interactions dataset.
    Dataset,
    /// Bulk import of data into a dataset.
    DatasetImportJob,
    /// Recommendation filter expression.
    Filter,
    /// Real-time event ingestion endpoint.
    EventTracker,
    /// Recipe configuration.
    Solution,
    /// Trained model of a solution.
    SolutionVersion,
    /// Real-time inference deployment of a solution version.
    Campaign,
    /// Domain recommender.
    Recommender,
    /// Offline batch recommendations.
    BatchInferenceJob,
    /// Offline user segmentation.
    BatchSegmentJob,
    /// Data preparation job run before any dataset is created.
    PreprocessingJob,
}

impl ResourceKind {
    /// Every kind, in pipeline order.
    pub const ALL: [Self; 13] = [
        Self::PreprocessingJob,
        Self::DatasetGroup,
        Self::Schema,
        Self::Dataset,
        Self::DatasetImportJob,
        Self::Filter,
        Self::EventTracker,
        Self::Solution,
        Self::SolutionVersion,
        Self::Campaign,
        Self::BatchInferenceJob,
        Self::BatchSegmentJob,
        Self::Recommender,
    ];

    /// The kind tag sent to the creation adapter.
    #[must_use]
    pub const fn object_type(self) -> &'static str {
        match self {
            Self::DatasetGroup => "DatasetGroup",
            Self::Schema => "Schema",
            Self::Dataset => "Dataset",
            Self::DatasetImportJob => "DatasetImportJob",
            Self::Filter => "Filter",
            Self::EventTracker => "EventTracker",
            Self::Solution => "Solution",
            Self::SolutionVersion => "SolutionVersion",
            Self::Campaign => "Campaign",
            Self::Recommender => "Recommender",
            Self::BatchInferenceJob => "BatchInferenceJob",
            Self::BatchSegmentJob => "BatchSegmentJob",
            Self::PreprocessingJob => "PreprocessingJob",
        }
    }

    /// The control-plane service that owns the kind.
    #[must_use]
    pub const fn service(self) -> &'static str {
        match self {
            Self::PreprocessingJob => "glue",
            _ => "personalize",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_type())
    }
}

impl FromStr for ResourceKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.object_type() == s)
            .ok_or_else(|| FlowError::InvalidInput(format!("unknown resource kind '{s}'")))
    }
}
