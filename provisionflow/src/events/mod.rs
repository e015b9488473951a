//! Status-change notifications.
//!
//! Flows emit one notification per status transition of interest through a
//! [`Notifier`], which renders a [`NotificationTemplate`] against the flow's
//! document and hands the result to an [`EventSink`].

mod notifier;
mod sink;

pub use notifier::{
    NotificationTemplate, Notifier, PIPELINE_FAILURE_DETAIL_TYPE, PIPELINE_FAILURE_MESSAGE,
};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, Notification};
