//! Test assertions for flow outputs, journals and notifications.

use super::mocks::Journal;
use crate::events::CollectingEventSink;
use crate::flow::{FlowOutput, FlowStatus};
use crate::resources::ResourceKind;

/// Asserts that the output succeeded.
pub fn assert_succeeded(output: &FlowOutput) {
    assert_eq!(
        output.status,
        FlowStatus::Succeeded,
        "Expected success, got {:?} ({:?})",
        output.status,
        output.message
    );
}

/// Asserts that the output was skipped.
pub fn assert_skipped(output: &FlowOutput) {
    assert!(
        output.is_skipped(),
        "Expected a skip, got status: {:?}",
        output.status
    );
}

/// Asserts the exact sequence of journal labels.
pub fn assert_journal(journal: &Journal, expected: &[&str]) {
    let labels = journal.labels();
    assert_eq!(
        labels.iter().map(String::as_str).collect::<Vec<_>>(),
        expected,
        "Unexpected call sequence"
    );
}

/// Asserts how many notifications of a kind carried the given status.
pub fn assert_notified(sink: &CollectingEventSink, kind: ResourceKind, status: &str, times: usize) {
    let matching = sink
        .events()
        .into_iter()
        .filter(|e| e.detail_str("ResourceType") == Some(kind.object_type()))
        .filter(|e| e.status() == Some(status))
        .count();
    assert_eq!(
        matching, times,
        "Expected {times} {kind} notification(s) with status {status}, got {matching}"
    );
}

/// Asserts how many notifications of a kind were sent in total.
pub fn assert_notification_count(sink: &CollectingEventSink, kind: ResourceKind, times: usize) {
    let count = sink
        .events()
        .into_iter()
        .filter(|e| e.detail_str("ResourceType") == Some(kind.object_type()))
        .count();
    assert_eq!(count, times, "Expected {times} {kind} notification(s), got {count}");
}
