//! Boundary to the ML platform's control plane.
//!
//! Two calls are needed by the flows:
//! - `create`: the resource-creation adapter, an opaque RPC taking a kind tag
//!   plus kind-specific configuration and answering `{response, status}`
//! - `call`: a direct service action such as `describeDataset` or
//!   `listEventTrackers`
//!
//! Both answer an [`ApiOutcome`], so "not found" is a tag to branch on rather
//! than an error to catch.

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::{ApiError, ApiErrorKind};
#[cfg(feature = "http")]
pub use http::HttpControlPlane;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resources::ResourceKind;

/// Result of a control-plane call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T = Value> {
    /// The call succeeded.
    Ok(T),
    /// The addressed resource does not exist.
    NotFound(String),
    /// Any other failure.
    Error(ApiError),
}

impl<T> ApiOutcome<T> {
    /// Returns true for `NotFound`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Maps the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
        match self {
            Self::Ok(v) => ApiOutcome::Ok(f(v)),
            Self::NotFound(msg) => ApiOutcome::NotFound(msg),
            Self::Error(e) => ApiOutcome::Error(e),
        }
    }

    /// Converts to a `Result`, with `None` for not found.
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        match self {
            Self::Ok(v) => Ok(Some(v)),
            Self::NotFound(_) => Ok(None),
            Self::Error(e) => Err(e),
        }
    }
}

/// Status reported by the creation adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterStatus {
    /// The create call went through.
    Succeeded,
    /// The adapter rejected or failed the create call.
    Failed,
}

/// Reply of the creation adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterReply {
    /// Raw response of the underlying create call.
    pub response: Value,
    /// Adapter status.
    pub status: AdapterStatus,
}

impl AdapterReply {
    /// A successful reply.
    #[must_use]
    pub fn succeeded(response: Value) -> Self {
        Self {
            response,
            status: AdapterStatus::Succeeded,
        }
    }

    /// A failed reply.
    #[must_use]
    pub fn failed(response: Value) -> Self {
        Self {
            response,
            status: AdapterStatus::Failed,
        }
    }
}

/// A request to the creation adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Kind tag.
    pub kind: ResourceKind,
    /// Whether to issue the domain-flavored create.
    pub domain: bool,
    /// The flow's document at the time of the call.
    pub input: Value,
}

/// A direct service action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Kind the action concerns.
    pub kind: ResourceKind,
    /// Action name, e.g. `describeDatasetGroup`.
    pub action: String,
    /// Rendered parameters.
    pub params: Value,
}

/// The control-plane collaborator.
#[async_trait]
pub trait ControlPlane: Send + Sync + std::fmt::Debug {
    /// Invokes the creation adapter.
    async fn create(&self, request: CreateRequest) -> ApiOutcome<AdapterReply>;

    /// Invokes a service action (describe, list, update, start).
    async fn call(&self, request: ServiceRequest) -> ApiOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_into_result() {
        let ok: ApiOutcome = ApiOutcome::Ok(serde_json::json!({"a": 1}));
        assert!(ok.into_result().unwrap().is_some());

        let missing: ApiOutcome = ApiOutcome::NotFound("gone".to_string());
        assert!(missing.is_not_found());
        assert!(missing.into_result().unwrap().is_none());

        let failed: ApiOutcome =
            ApiOutcome::Error(ApiError::new(ApiErrorKind::Throttling, "slow down"));
        assert_eq!(failed.into_result().unwrap_err().kind, ApiErrorKind::Throttling);
    }

    #[test]
    fn test_adapter_status_wire_format() {
        let reply = AdapterReply::succeeded(serde_json::json!({"datasetArn": "arn"}));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "SUCCEEDED");

        let parsed: AdapterReply =
            serde_json::from_value(serde_json::json!({"response": {}, "status": "FAILED"}))
                .unwrap();
        assert_eq!(parsed.status, AdapterStatus::Failed);
    }
}
