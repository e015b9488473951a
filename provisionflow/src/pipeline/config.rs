//! Stage selection and runtime settings.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::control_plane::ControlPlane;
use crate::errors::{FlowError, ValidationError};
use crate::events::{EventSink, Notifier};
use crate::flow::{FailureMode, FlowRuntime, PollPolicy, RetryPolicy};

/// Inference resources built for every solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InferenceOption {
    /// One campaign map per solution.
    Campaigns,
    /// One batch-inference-job map per solution.
    BatchInferenceJobs,
    /// One batch-segment-job map per solution.
    BatchSegmentJobs,
}

/// One entry of the recommendation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecommendationConfig {
    /// Custom solutions, each followed by the listed inference resources.
    Solutions {
        /// Inference resources to build after each solution version.
        #[serde(default)]
        inference_options: Vec<InferenceOption>,
    },
    /// Domain recommenders.
    Recommenders,
}

/// Which optional stages a pipeline contains.
///
/// This is load-time configuration: it decides the shape of the assembled
/// flow, never the data it runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    /// Run the preprocessing job before the dataset group.
    #[serde(default)]
    pub enable_preprocessing: bool,
    /// Build the filter map.
    #[serde(default)]
    pub enable_filters: bool,
    /// Build the event tracker step.
    #[serde(default)]
    pub enable_event_tracker: bool,
    /// Solutions and/or recommenders to build.
    #[serde(default)]
    pub recommendation_config: Vec<RecommendationConfig>,
}

impl PipelineConfiguration {
    /// A configuration with only the mandatory stages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Enables the preprocessing stage.
    #[must_use]
    pub fn with_preprocessing(mut self) -> Self {
        self.enable_preprocessing = true;
        self
    }

    /// Enables the filter stage.
    #[must_use]
    pub fn with_filters(mut self) -> Self {
        self.enable_filters = true;
        self
    }

    /// Enables the event tracker stage.
    #[must_use]
    pub fn with_event_tracker(mut self) -> Self {
        self.enable_event_tracker = true;
        self
    }

    /// Adds solutions with the given inference options.
    #[must_use]
    pub fn with_solutions(mut self, inference_options: &[InferenceOption]) -> Self {
        self.recommendation_config.push(RecommendationConfig::Solutions {
            inference_options: inference_options.to_vec(),
        });
        self
    }

    /// Adds recommenders.
    #[must_use]
    pub fn with_recommenders(mut self) -> Self {
        self.recommendation_config.push(RecommendationConfig::Recommenders);
        self
    }

    /// Inference options of the first solutions entry, if solutions are configured.
    #[must_use]
    pub fn solutions(&self) -> Option<&[InferenceOption]> {
        self.recommendation_config.iter().find_map(|c| match c {
            RecommendationConfig::Solutions { inference_options } => {
                Some(inference_options.as_slice())
            }
            RecommendationConfig::Recommenders => None,
        })
    }

    /// Returns true when recommenders are configured.
    #[must_use]
    pub fn has_recommenders(&self) -> bool {
        self.recommendation_config
            .iter()
            .any(|c| matches!(c, RecommendationConfig::Recommenders))
    }

    /// Rejects duplicated recommendation entries and inference options.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let solutions = self
            .recommendation_config
            .iter()
            .filter(|c| matches!(c, RecommendationConfig::Solutions { .. }))
            .count();
        let recommenders = self.recommendation_config.len() - solutions;
        if solutions > 1 || recommenders > 1 {
            return Err(ValidationError::new(
                "CONFIG-001-DUPLICATE-RECOMMENDATION",
                "Each recommendation type may appear at most once",
            )
            .with_context_entry("solutions", solutions.to_string())
            .with_context_entry("recommenders", recommenders.to_string()));
        }

        if let Some(options) = self.solutions() {
            for (i, option) in options.iter().enumerate() {
                if options[..i].contains(option) {
                    return Err(ValidationError::new(
                        "CONFIG-002-DUPLICATE-INFERENCE-OPTION",
                        format!("Inference option {option:?} is listed twice"),
                    )
                    .with_fix_hint(
                        "List each of campaigns, batchInferenceJobs, batchSegmentJobs once",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_account_id() -> String {
    "000000000000".to_string()
}

fn default_event_bus() -> String {
    "mlops-event-bus".to_string()
}

fn default_source() -> String {
    "solutions.aws.personalize".to_string()
}

fn default_dataset_concurrency() -> usize {
    3
}

fn default_filter_concurrency() -> usize {
    1
}

fn default_resource_concurrency() -> usize {
    10
}

/// Runtime tunables: where resources live, where notifications go, and how
/// hard to poll and retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Region injected into the root document.
    #[serde(default = "default_region")]
    pub region: String,
    /// Account injected into the root document.
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// Event bus receiving notifications.
    #[serde(default = "default_event_bus")]
    pub event_bus_name: String,
    /// Notification source.
    #[serde(default = "default_source")]
    pub source: String,
    /// Status polling.
    #[serde(default)]
    pub poll: PollPolicy,
    /// Retry of transient control-plane errors.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Concurrency of the dataset map.
    #[serde(default = "default_dataset_concurrency")]
    pub dataset_concurrency: usize,
    /// Concurrency of the filter map.
    #[serde(default = "default_filter_concurrency")]
    pub filter_concurrency: usize,
    /// Concurrency of the solution, recommender and inference maps.
    #[serde(default = "default_resource_concurrency")]
    pub resource_concurrency: usize,
    /// Reaction of every map to a failed item.
    #[serde(default)]
    pub map_failure_mode: FailureMode,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            region: default_region(),
            account_id: default_account_id(),
            event_bus_name: default_event_bus(),
            source: default_source(),
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
            dataset_concurrency: default_dataset_concurrency(),
            filter_concurrency: default_filter_concurrency(),
            resource_concurrency: default_resource_concurrency(),
            map_failure_mode: FailureMode::default(),
        }
    }
}

impl PipelineSettings {
    /// Settings for a region and account, everything else defaulted.
    #[must_use]
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
            ..Self::default()
        }
    }

    /// Reads `PROVISIONFLOW_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, FlowError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// Recognised keys: `PROVISIONFLOW_REGION`, `PROVISIONFLOW_ACCOUNT_ID`,
    /// `PROVISIONFLOW_EVENT_BUS`, `PROVISIONFLOW_POLL_INTERVAL_SECS`,
    /// `PROVISIONFLOW_MAX_POLLS` (`0` for unbounded) and
    /// `PROVISIONFLOW_MAX_ATTEMPTS`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FlowError> {
        let mut settings = Self::default();
        if let Some(region) = lookup("PROVISIONFLOW_REGION") {
            settings.region = region;
        }
        if let Some(account) = lookup("PROVISIONFLOW_ACCOUNT_ID") {
            settings.account_id = account;
        }
        if let Some(bus) = lookup("PROVISIONFLOW_EVENT_BUS") {
            settings.event_bus_name = bus;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PROVISIONFLOW_POLL_INTERVAL_SECS")? {
            settings.poll = settings.poll.with_interval(Duration::from_secs(secs));
        }
        if let Some(max) = parse_var::<u32>(&lookup, "PROVISIONFLOW_MAX_POLLS")? {
            settings.poll = match max {
                0 => settings.poll.unbounded(),
                n => settings.poll.with_max_polls(n),
            };
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, "PROVISIONFLOW_MAX_ATTEMPTS")? {
            settings.retry = settings.retry.with_max_attempts(attempts);
        }
        Ok(settings)
    }

    /// Sets the poll policy.
    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the failure mode of every map.
    #[must_use]
    pub fn with_map_failure_mode(mut self, mode: FailureMode) -> Self {
        self.map_failure_mode = mode;
        self
    }

    /// The `{Region, AccountID}` fields merged into the root document.
    #[must_use]
    pub fn environment(&self) -> Value {
        json!({"Region": self.region, "AccountID": self.account_id})
    }

    /// A runtime wired to `control_plane` and `sink` with these settings.
    #[must_use]
    pub fn runtime(
        &self,
        control_plane: Arc<dyn ControlPlane>,
        sink: Arc<dyn EventSink>,
    ) -> FlowRuntime {
        let notifier = Notifier::new(sink, self.event_bus_name.clone(), self.source.clone());
        FlowRuntime::new(control_plane, notifier)
            .with_poll_policy(self.poll)
            .with_retry_policy(self.retry.clone())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, FlowError>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| FlowError::InvalidInput(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_configuration_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "enable_filters": true,
                "recommendation_config": [
                    {{"type": "solutions", "inference_options": ["campaigns", "batchSegmentJobs"]}},
                    {{"type": "recommenders"}}
                ]
            }}"#
        )
        .unwrap();

        let config = PipelineConfiguration::from_json_file(file.path()).unwrap();

        assert!(config.enable_filters);
        assert!(!config.enable_event_tracker);
        assert_eq!(
            config.solutions(),
            Some(&[InferenceOption::Campaigns, InferenceOption::BatchSegmentJobs][..])
        );
        assert!(config.has_recommenders());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_solutions_without_options_builds_no_inference() {
        let raw = r#"{"recommendation_config": [{"type": "solutions"}]}"#;
        let config = PipelineConfiguration::from_json_str(raw).unwrap();
        assert_eq!(config.solutions(), Some(&[][..]));
        assert!(!config.has_recommenders());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            PipelineConfiguration::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, FlowError::Io(_)));
    }

    #[test]
    fn test_duplicate_inference_option_rejected() {
        let config = PipelineConfiguration::new()
            .with_solutions(&[InferenceOption::Campaigns, InferenceOption::Campaigns]);
        let err = config.validate().unwrap_err();
        assert_eq!(err.info.code, "CONFIG-002-DUPLICATE-INFERENCE-OPTION");
    }

    #[test]
    fn test_duplicate_recommenders_rejected() {
        let config = PipelineConfiguration::new().with_recommenders().with_recommenders();
        let err = config.validate().unwrap_err();
        assert_eq!(err.info.code, "CONFIG-001-DUPLICATE-RECOMMENDATION");
    }

    #[test]
    fn test_settings_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PROVISIONFLOW_REGION", "eu-west-1"),
            ("PROVISIONFLOW_ACCOUNT_ID", "111122223333"),
            ("PROVISIONFLOW_POLL_INTERVAL_SECS", "30"),
            ("PROVISIONFLOW_MAX_POLLS", "0"),
        ]
        .into_iter()
        .collect();

        let settings =
            PipelineSettings::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap();

        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.account_id, "111122223333");
        assert_eq!(settings.poll.interval, Duration::from_secs(30));
        assert_eq!(settings.poll.max_polls, None);
        assert_eq!(settings.event_bus_name, "mlops-event-bus");
        assert_eq!(
            settings.environment(),
            json!({"Region": "eu-west-1", "AccountID": "111122223333"})
        );
    }

    #[test]
    fn test_settings_reject_bad_number() {
        let err = PipelineSettings::from_lookup(|key| {
            (key == "PROVISIONFLOW_MAX_POLLS").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, FlowError::InvalidInput(_)));
    }

    #[test]
    fn test_settings_defaults_deserialize_from_empty_object() {
        let settings: PipelineSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.dataset_concurrency, 3);
        assert_eq!(settings.filter_concurrency, 1);
        assert_eq!(settings.resource_concurrency, 10);
        assert_eq!(settings.map_failure_mode, FailureMode::ContinueOnFailure);
    }
}
