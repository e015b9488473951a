//! Event sink trait and implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Level};

use crate::errors::FlowError;

/// One status-change event, shaped like an event-bus entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    /// Event source, e.g. `solutions.aws.personalize`.
    pub source: String,
    /// Target bus.
    pub event_bus_name: String,
    /// Detail type, e.g. `Personalize Dataset status change`.
    pub detail_type: String,
    /// Emission time.
    pub time: DateTime<Utc>,
    /// Structured detail payload.
    pub detail: serde_json::Value,
}

impl Notification {
    /// Returns a string field of the detail payload.
    #[must_use]
    pub fn detail_str(&self, field: &str) -> Option<&str> {
        self.detail.get(field).and_then(serde_json::Value::as_str)
    }

    /// The `Status` detail field, if any.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.detail_str("Status")
    }

    /// The `Arn` detail field, if any.
    #[must_use]
    pub fn arn(&self) -> Option<&str> {
        self.detail_str("Arn")
    }
}

/// Receiver of status-change notifications.
///
/// Delivery is fire-and-forget from a flow's point of view: the
/// [`Notifier`](super::Notifier) logs sink errors and carries on.
#[async_trait]
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Delivers a notification.
    async fn put_event(&self, event: Notification) -> Result<(), FlowError>;
}

/// A sink that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn put_event(&self, _event: Notification) -> Result<(), FlowError> {
        Ok(())
    }
}

/// A sink that writes notifications through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn put_event(&self, event: Notification) -> Result<(), FlowError> {
        if self.level == Level::DEBUG {
            debug!(
                detail_type = %event.detail_type,
                bus = %event.event_bus_name,
                detail = %event.detail,
                "notification"
            );
        } else {
            info!(
                detail_type = %event.detail_type,
                bus = %event.event_bus_name,
                detail = %event.detail,
                "notification"
            );
        }
        Ok(())
    }
}

/// A sink that keeps every notification in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<Notification>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected notifications.
    #[must_use]
    pub fn events(&self) -> Vec<Notification> {
        self.events.read().clone()
    }

    /// Returns the number of collected notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected notifications.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns notifications whose detail type starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<Notification> {
        self.events
            .read()
            .iter()
            .filter(|e| e.detail_type.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn put_event(&self, event: Notification) -> Result<(), FlowError> {
        self.events.write().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(detail_type: &str) -> Notification {
        Notification {
            source: "test".to_string(),
            event_bus_name: "bus".to_string(),
            detail_type: detail_type.to_string(),
            time: Utc::now(),
            detail: json!({"Arn": "arn:x", "Status": "ACTIVE"}),
        }
    }

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        assert!(NoOpEventSink.put_event(sample("a")).await.is_ok());
        assert!(LoggingEventSink::debug().put_event(sample("a")).await.is_ok());
        assert!(LoggingEventSink::default().put_event(sample("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.put_event(sample("Personalize Dataset status change")).await.unwrap();
        sink.put_event(sample("Personalize Schema status change")).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events_of_type("Personalize Dataset").len(), 1);
        assert_eq!(sink.events()[0].status(), Some("ACTIVE"));
        assert_eq!(sink.events()[0].arn(), Some("arn:x"));

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_notification_wire_shape() {
        let value = serde_json::to_value(sample("t")).unwrap();
        assert!(value.get("DetailType").is_some());
        assert!(value.get("EventBusName").is_some());
    }
}
