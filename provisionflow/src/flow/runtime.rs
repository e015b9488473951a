//! Collaborators shared by every flow of one pipeline run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::retry::RetryPolicy;
use crate::control_plane::ControlPlane;
use crate::events::Notifier;

/// Suspends a flow between polls.
///
/// Waiting goes through this trait so suspended flows park on the runtime's
/// timer instead of a worker thread, and so tests can skip the delay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Timer: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// The tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Poll cadence of the lifecycle's wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay of each wait.
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    /// Waits allowed before the flow gives up; `None` polls forever.
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            max_polls: Some(720),
        }
    }
}

impl PollPolicy {
    /// Sets the wait interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the poll bound.
    #[must_use]
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Removes the poll bound.
    #[must_use]
    pub fn unbounded(mut self) -> Self {
        self.max_polls = None;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Everything a flow needs besides its document.
///
/// Cheap to clone; parallel branches and map items each get a clone.
#[derive(Clone)]
pub struct FlowRuntime {
    control_plane: Arc<dyn ControlPlane>,
    notifier: Notifier,
    timer: Arc<dyn Timer>,
    poll: PollPolicy,
    retry: RetryPolicy,
    run_id: Uuid,
}

impl fmt::Debug for FlowRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRuntime")
            .field("control_plane", &self.control_plane)
            .field("notifier", &self.notifier)
            .field("poll", &self.poll)
            .field("retry", &self.retry)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl FlowRuntime {
    /// Creates a runtime on the tokio timer with default policies.
    #[must_use]
    pub fn new(control_plane: Arc<dyn ControlPlane>, notifier: Notifier) -> Self {
        Self {
            control_plane,
            notifier,
            timer: Arc::new(TokioTimer),
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Replaces the timer.
    #[must_use]
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
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

    /// Sets the run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// The control plane.
    #[must_use]
    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        &self.control_plane
    }

    /// The notifier.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// The timer.
    #[must_use]
    pub fn timer(&self) -> &dyn Timer {
        self.timer.as_ref()
    }

    /// The poll policy.
    #[must_use]
    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// The retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Id of the pipeline run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_poll_policy_defaults() {
        let poll = PollPolicy::default();
        assert_eq!(poll.interval, Duration::from_secs(120));
        assert_eq!(poll.max_polls, Some(720));
        assert_eq!(poll.unbounded().max_polls, None);
    }

    #[test]
    fn test_poll_policy_serde_in_seconds() {
        let poll: PollPolicy =
            serde_json::from_value(serde_json::json!({"interval": 30, "max_polls": 4})).unwrap();
        assert_eq!(poll.interval, Duration::from_secs(30));
        assert_eq!(poll.max_polls, Some(4));
    }

    #[tokio::test]
    async fn test_mock_timer_receives_interval() {
        let mut timer = MockTimer::new();
        timer
            .expect_sleep()
            .with(eq(Duration::from_secs(120)))
            .times(1)
            .returning(|_| ());

        timer.sleep(PollPolicy::default().interval).await;
    }

    #[tokio::test]
    async fn test_tokio_timer_sleeps() {
        let start = tokio::time::Instant::now();
        TokioTimer.sleep(Duration::from_millis(5)).await;
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
