//! Error types for provisioning flows.
//!
//! Domain failures (a resource reporting a failed status), transient
//! control-plane errors and programming errors (a required path missing from
//! the execution context) are all distinct variants. "Resource not found" is
//! deliberately absent: it is an [`ApiOutcome`](crate::control_plane::ApiOutcome)
//! tag, not an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::control_plane::ApiError;

/// The main error type for flow execution.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A required path was absent from the execution context.
    #[error("Path not found: {path}")]
    PathNotFound {
        /// The rendered path.
        path: String,
    },

    /// A path expression could not be parsed or cannot be written through.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The context held a value of the wrong shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A control-plane call failed with a non not-found error.
    #[error("{0}")]
    ControlPlane(#[from] ApiError),

    /// The creation adapter answered with a `FAILED` status.
    #[error("{kind} creation rejected: {message}")]
    CreateRejected {
        /// Resource kind.
        kind: String,
        /// Adapter response rendered as text.
        message: String,
    },

    /// The resource itself reached its failure status.
    #[error("{kind} reached status {status}: {error}")]
    ResourceFailed {
        /// Resource kind.
        kind: String,
        /// The observed status value.
        status: String,
        /// Error label recorded for the failure terminal.
        error: String,
    },

    /// The poll loop exceeded its configured bound.
    #[error("{kind} still pending after {polls} polls")]
    PollLimitExceeded {
        /// Resource kind.
        kind: String,
        /// Number of wait cycles performed.
        polls: u32,
    },

    /// Terminal pipeline failure after the top-level catch ran.
    #[error("Pipeline failed with {error}: {cause}")]
    PipelineFailed {
        /// Error name of the original failure.
        error: String,
        /// Cause text of the original failure.
        cause: String,
    },

    /// The pipeline could not be assembled.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A flow was cancelled before completing.
    #[error("Flow cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// Creates a path-not-found error.
    #[must_use]
    pub fn path_not_found(path: impl std::fmt::Display) -> Self {
        Self::PathNotFound {
            path: path.to_string(),
        }
    }

    /// Creates an invalid-path error.
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable error name, recorded as `Error` when a catch handler runs.
    #[must_use]
    pub fn error_name(&self) -> String {
        match self {
            Self::PathNotFound { .. } => "PathNotFound".to_string(),
            Self::InvalidPath { .. } => "InvalidPath".to_string(),
            Self::InvalidInput(_) => "InvalidInput".to_string(),
            Self::ControlPlane(e) => e.code().to_string(),
            Self::CreateRejected { .. } => "CreateRejected".to_string(),
            Self::ResourceFailed { error, .. } => error.clone(),
            Self::PollLimitExceeded { .. } => "PollLimitExceeded".to_string(),
            Self::PipelineFailed { error, .. } => error.clone(),
            Self::Validation(_) => "ValidationError".to_string(),
            Self::Cancelled(_) => "Cancelled".to_string(),
            Self::Serialization(_) => "SerializationError".to_string(),
            Self::Io(_) => "IoError".to_string(),
            Self::Internal(_) => "InternalError".to_string(),
        }
    }

    /// Returns the control-plane error if this is one.
    #[must_use]
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Self::ControlPlane(e) => Some(e),
            _ => None,
        }
    }

    /// Renders the `{Error, Cause}` object a catch handler receives.
    #[must_use]
    pub fn to_catch_value(&self) -> serde_json::Value {
        serde_json::json!({
            "Error": self.error_name(),
            "Cause": self.to_string(),
        })
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Diagnostic metadata attached to assembly errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "ASSEMBLY-002-EMPTY-STEP-NAME").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert(
            "summary".to_string(),
            serde_json::Value::String(self.summary.clone()),
        );

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised while assembling a pipeline or validating a descriptor.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable message.
    pub message: String,
    /// Diagnostic metadata.
    pub info: ErrorInfo,
}

impl ValidationError {
    /// Creates a validation error from a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            info: ErrorInfo::new(code, message.clone()),
            message,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.info = self.info.with_fix_hint(hint);
        self
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info = self.info.with_context_entry(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::ApiErrorKind;

    #[test]
    fn test_error_info_builder() {
        let info = ErrorInfo::new("ASSEMBLY-001", "Empty step name")
            .with_fix_hint("Give every step a name")
            .with_context_entry("kind", "Dataset");

        assert_eq!(info.code, "ASSEMBLY-001");
        assert_eq!(info.fix_hint.as_deref(), Some("Give every step a name"));
        assert_eq!(info.context.get("kind").map(String::as_str), Some("Dataset"));
    }

    #[test]
    fn test_error_info_to_dict() {
        let info = ErrorInfo::new("CODE", "summary").with_fix_hint("hint");
        let dict = info.to_dict();

        assert_eq!(dict.get("code"), Some(&serde_json::json!("CODE")));
        assert_eq!(dict.get("fix_hint"), Some(&serde_json::json!("hint")));
        assert!(!dict.contains_key("context"));
    }

    #[test]
    fn test_resource_failed_error_name_uses_label() {
        let err = FlowError::ResourceFailed {
            kind: "Dataset".to_string(),
            status: "CREATE FAILED".to_string(),
            error: "Failure".to_string(),
        };

        assert_eq!(err.error_name(), "Failure");
        assert!(err.to_string().contains("CREATE FAILED"));
    }

    #[test]
    fn test_control_plane_error_name_is_code() {
        let err = FlowError::from(ApiError::new(
            ApiErrorKind::LimitExceeded,
            "too many datasets",
        ));

        assert_eq!(err.error_name(), "LimitExceededException");
        assert!(err.as_api_error().is_some());
    }

    #[test]
    fn test_catch_value_shape() {
        let err = FlowError::path_not_found("$.Item.schema");
        let value = err.to_catch_value();

        assert_eq!(value["Error"], "PathNotFound");
        assert_eq!(value["Cause"], "Path not found: $.Item.schema");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("ASSEMBLY-003", "Map concurrency must be positive")
            .with_context_entry("map", "Filters");

        assert_eq!(err.to_string(), "Map concurrency must be positive");
        assert_eq!(err.info.code, "ASSEMBLY-003");
    }
}
