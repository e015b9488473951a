//! HTTP transport for the control plane.
//!
//! Posts JSON to `{endpoint}/create` and `{endpoint}/call`. Error bodies are
//! expected to carry the error code in `__type` (or `code`) and the text in
//! `message`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    AdapterReply, ApiError, ApiErrorKind, ApiOutcome, ControlPlane, CreateRequest, ServiceRequest,
};
use crate::errors::FlowError;

const NOT_FOUND_CODE: &str = "ResourceNotFoundException";

/// A [`ControlPlane`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpControlPlane {
    /// Creates a client for `endpoint` with the given request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FlowError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlowError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, route: &str, body: &Value) -> ApiOutcome {
        let url = format!("{}/{route}", self.endpoint);
        debug!(url = %url, "control plane request");

        let response = match self.client.post(&url).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "control plane transport error");
                let kind = if e.is_timeout() {
                    ApiErrorKind::OperationTimeout
                } else {
                    ApiErrorKind::InternalService
                };
                return ApiOutcome::Error(ApiError::new(kind, e.to_string()));
            }
        };

        let status = response.status();
        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                return ApiOutcome::Error(ApiError::new(
                    ApiErrorKind::Other,
                    format!("unreadable response body (HTTP {status}): {e}"),
                ));
            }
        };

        if status.is_success() {
            return ApiOutcome::Ok(payload);
        }
        classify_error_body(&payload, status.as_u16())
    }
}

fn classify_error_body(payload: &Value, status: u16) -> ApiOutcome {
    let code = payload
        .get("__type")
        .or_else(|| payload.get("code"))
        .and_then(Value::as_str)
        .unwrap_or("UnknownError");
    let message = payload
        .get("message")
        .or_else(|| payload.get("Message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if code.rsplit(|c: char| c == '.' || c == '#').next() == Some(NOT_FOUND_CODE) || status == 404 {
        return ApiOutcome::NotFound(message);
    }
    ApiOutcome::Error(ApiError::from_code(code, message))
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn create(&self, request: CreateRequest) -> ApiOutcome<AdapterReply> {
        let body = json!({
            "Type": request.kind.object_type(),
            "Domain": request.domain,
            "Input": request.input,
        });

        match self.post("create", &body).await {
            ApiOutcome::Ok(payload) => match serde_json::from_value::<AdapterReply>(payload) {
                Ok(reply) => ApiOutcome::Ok(reply),
                Err(e) => ApiOutcome::Error(ApiError::new(
                    ApiErrorKind::Other,
                    format!("malformed adapter reply: {e}"),
                )),
            },
            ApiOutcome::NotFound(msg) => ApiOutcome::NotFound(msg),
            ApiOutcome::Error(e) => ApiOutcome::Error(e),
        }
    }

    async fn call(&self, request: ServiceRequest) -> ApiOutcome {
        let body = json!({
            "service": request.kind.service(),
            "action": request.action,
            "params": request.params,
        });
        self.post("call", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let body = json!({
            "__type": "com.amazonaws.personalize#ResourceNotFoundException",
            "message": "no"
        });
        assert!(classify_error_body(&body, 400).is_not_found());
    }

    #[test]
    fn test_classify_limit() {
        let body = json!({"__type": "LimitExceededException", "message": "limit"});
        match classify_error_body(&body, 400) {
            ApiOutcome::Error(e) => assert_eq!(e.kind, ApiErrorKind::LimitExceeded),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let cp = HttpControlPlane::new("http://localhost:9000/", Duration::from_secs(5)).unwrap();
        assert_eq!(cp.endpoint(), "http://localhost:9000");
    }
}
