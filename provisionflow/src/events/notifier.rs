//! Rendering and delivery of status-change notifications.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use super::sink::{EventSink, Notification};
use crate::context::{ExecutionContext, JsonPath};
use crate::resources::ResourceKind;

/// Detail type of the notification sent when the whole pipeline fails.
pub const PIPELINE_FAILURE_DETAIL_TYPE: &str = "Personalize MLOps pipeline completed with errors";

/// Message of the pipeline failure notification.
pub const PIPELINE_FAILURE_MESSAGE: &str = "Personalize Pipeline completion status change";

/// Declares what a resource's status notification carries.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationTemplate {
    /// Event detail type.
    pub detail_type: String,
    /// Human-readable message placed in the detail.
    pub message: String,
    /// Path of the resource ARN.
    pub arn_path: JsonPath,
    /// Path of the status value; `None` for kinds without a status field.
    pub status_path: Option<JsonPath>,
    /// Extra detail fields and the paths they are read from.
    pub detail: Vec<(String, JsonPath)>,
}

impl NotificationTemplate {
    /// Creates a template with the given detail type, reusing it as the message.
    #[must_use]
    pub fn new(detail_type: impl Into<String>, arn_path: JsonPath) -> Self {
        let detail_type = detail_type.into();
        Self {
            message: detail_type.clone(),
            detail_type,
            arn_path,
            status_path: None,
            detail: Vec::new(),
        }
    }

    /// Sets the status path.
    #[must_use]
    pub fn with_status_path(mut self, path: JsonPath) -> Self {
        self.status_path = Some(path);
        self
    }

    /// Overrides the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Adds a detail field read from a dotted path.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, dotted: &str) -> Self {
        self.detail.push((key.into(), JsonPath::fields(dotted)));
        self
    }

    /// Renders the detail payload. Absent paths are left out.
    #[must_use]
    pub fn render(&self, kind: ResourceKind, ctx: &ExecutionContext) -> Value {
        let mut detail = Map::new();
        detail.insert("ResourceType".to_string(), Value::from(kind.object_type()));
        detail.insert("Message".to_string(), Value::from(self.message.clone()));
        if let Some(arn) = ctx.lookup(&self.arn_path) {
            detail.insert("Arn".to_string(), arn.clone());
        }
        if let Some(status) = self.status_path.as_ref().and_then(|p| ctx.lookup(p)) {
            detail.insert("Status".to_string(), status.clone());
        }
        for (key, path) in &self.detail {
            if let Some(value) = ctx.lookup(path) {
                detail.insert(key.clone(), value.clone());
            }
        }
        Value::Object(detail)
    }
}

/// Sends notifications to an [`EventSink`], never failing the caller.
#[derive(Debug, Clone)]
pub struct Notifier {
    sink: Arc<dyn EventSink>,
    event_bus_name: String,
    source: String,
}

impl Notifier {
    /// Creates a notifier.
    #[must_use]
    pub fn new(
        sink: Arc<dyn EventSink>,
        event_bus_name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            event_bus_name: event_bus_name.into(),
            source: source.into(),
        }
    }

    /// Returns the sink.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Renders and sends a resource status notification.
    pub async fn notify_status(
        &self,
        kind: ResourceKind,
        template: &NotificationTemplate,
        ctx: &ExecutionContext,
    ) {
        let detail = template.render(kind, ctx);
        self.deliver(template.detail_type.clone(), detail).await;
    }

    /// Sends the single notification that reports a failed pipeline.
    pub async fn notify_pipeline_failure(&self, error: &str, cause: &str) {
        let detail = serde_json::json!({
            "Error": error,
            "ErrorMessage": cause,
            "message": PIPELINE_FAILURE_MESSAGE,
        });
        self.deliver(PIPELINE_FAILURE_DETAIL_TYPE.to_string(), detail).await;
    }

    async fn deliver(&self, detail_type: String, detail: Value) {
        let event = Notification {
            source: self.source.clone(),
            event_bus_name: self.event_bus_name.clone(),
            detail_type,
            time: Utc::now(),
            detail,
        };
        let detail_type = event.detail_type.clone();
        if let Err(e) = self.sink.put_event(event).await {
            warn!(detail_type = %detail_type, error = %e, "notification delivery failed");
        }
    }
}
