//! Testing utilities for provisioning flows.
//!
//! This module provides:
//! - A scripted control plane that journals every call
//! - A timer that records waits instead of sleeping
//! - Fixture documents and describe responses per resource kind
//! - Assertions over outputs, call sequences and notifications

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_journal, assert_notification_count, assert_notified, assert_skipped, assert_succeeded,
};
pub use fixtures::{
    arn_for, create_response, describe_response, empty_lifecycle_input, failure_status,
    lifecycle_input, pending_status, sample_pipeline_document, script_create_success,
    script_describes, success_status, test_runtime, TEST_ACCOUNT, TEST_REGION,
};
pub use mocks::{
    FailingFlow, Journal, JournalEntry, MockControlPlane, RecordingTimer, SlowFlow,
};
