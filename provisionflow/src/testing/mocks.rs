//! Scripted collaborators for exercising flows without a control plane.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::ExecutionContext;
use crate::control_plane::{
    AdapterReply, ApiError, ApiErrorKind, ApiOutcome, ControlPlane, CreateRequest, ServiceRequest,
};
use crate::errors::FlowError;
use crate::flow::{Flow, FlowOutput, FlowRuntime, Timer};
use crate::resources::ResourceKind;

/// One observed interaction, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    /// An adapter create.
    Create {
        /// Kind tag.
        kind: ResourceKind,
        /// Whether the domain variant was requested.
        domain: bool,
    },
    /// A service action.
    Call {
        /// Action name.
        action: String,
        /// Rendered parameters.
        params: Value,
    },
    /// A timer wait.
    Wait(Duration),
}

impl JournalEntry {
    /// Short label: `createDataset`, `describeDataset`, `wait`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Create { kind, .. } => format!("create{kind}"),
            Self::Call { action, .. } => action.clone(),
            Self::Wait(_) => "wait".to_string(),
        }
    }
}

/// Shared, ordered record of control-plane calls and waits.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: JournalEntry) {
        self.entries.lock().push(entry);
    }

    /// All entries.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    /// Entry labels, in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.entries.lock().iter().map(JournalEntry::label).collect()
    }

    /// Number of entries with the given label.
    #[must_use]
    pub fn count(&self, label: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.label() == label)
            .count()
    }

    /// Clears the journal.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// A control plane answering from per-action scripts.
///
/// Each action (and each kind's create) has a queue of outcomes. A call pops
/// the front of its queue, except that the last outcome is sticky and keeps
/// being returned. Unscripted calls fail with an `Other` error.
#[derive(Debug, Default)]
pub struct MockControlPlane {
    creates: DashMap<ResourceKind, VecDeque<ApiOutcome<AdapterReply>>>,
    calls: DashMap<String, VecDeque<ApiOutcome>>,
    journal: Journal,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockControlPlane {
    /// Creates an unscripted mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds every call open for `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Appends outcomes for a kind's adapter create.
    pub fn script_create(
        &self,
        kind: ResourceKind,
        outcomes: impl IntoIterator<Item = ApiOutcome<AdapterReply>>,
    ) -> &Self {
        self.creates.entry(kind).or_default().extend(outcomes);
        self
    }

    /// Appends outcomes for a service action.
    pub fn script_call(
        &self,
        action: impl Into<String>,
        outcomes: impl IntoIterator<Item = ApiOutcome>,
    ) -> &Self {
        self.calls.entry(action.into()).or_default().extend(outcomes);
        self
    }

    /// The journal this mock writes to.
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// A timer that records its waits in this mock's journal.
    #[must_use]
    pub fn recording_timer(&self) -> RecordingTimer {
        RecordingTimer::with_journal(self.journal.clone())
    }

    /// Highest number of calls observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn hold(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn next_scripted<T: Clone>(queue: Option<&mut VecDeque<T>>) -> Option<T> {
    let queue = queue?;
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn create(&self, request: CreateRequest) -> ApiOutcome<AdapterReply> {
        self.journal.push(JournalEntry::Create {
            kind: request.kind,
            domain: request.domain,
        });
        self.hold().await;
        let scripted = next_scripted(self.creates.get_mut(&request.kind).as_deref_mut());
        scripted.unwrap_or_else(|| {
            ApiOutcome::Error(ApiError::new(
                ApiErrorKind::Other,
                format!("no scripted create for {}", request.kind),
            ))
        })
    }

    async fn call(&self, request: ServiceRequest) -> ApiOutcome {
        self.journal.push(JournalEntry::Call {
            action: request.action.clone(),
            params: request.params,
        });
        self.hold().await;
        let scripted = next_scripted(self.calls.get_mut(&request.action).as_deref_mut());
        scripted.unwrap_or_else(|| {
            ApiOutcome::Error(ApiError::new(
                ApiErrorKind::Other,
                format!("no scripted response for {}", request.action),
            ))
        })
    }
}

/// A timer that returns at once and journals each wait.
#[derive(Debug, Clone, Default)]
pub struct RecordingTimer {
    journal: Journal,
}

impl RecordingTimer {
    /// Creates a timer with its own journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a timer writing to an existing journal.
    #[must_use]
    pub fn with_journal(journal: Journal) -> Self {
        Self { journal }
    }

    /// Durations waited, in order.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.journal
            .entries()
            .into_iter()
            .filter_map(|e| match e {
                JournalEntry::Wait(d) => Some(d),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Timer for RecordingTimer {
    async fn sleep(&self, duration: Duration) {
        self.journal.push(JournalEntry::Wait(duration));
        tokio::task::yield_now().await;
    }
}

/// A flow that sleeps, tracks how many copies of it run at once, and writes
/// its input back unchanged.
#[derive(Debug)]
pub struct SlowFlow {
    name: String,
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
    runs: AtomicUsize,
}

impl SlowFlow {
    /// Creates a slow flow.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        }
    }

    /// Creates a slow flow with a delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }

    /// Highest number of concurrent runs observed.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of runs started.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Flow for SlowFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: ExecutionContext, _rt: &FlowRuntime) -> Result<FlowOutput, FlowError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(FlowOutput::succeeded(ctx))
    }
}

/// A flow that fails when its document has a truthy `fail` field and
/// succeeds otherwise.
#[derive(Debug)]
pub struct FailingFlow {
    name: String,
    error: String,
    delay: Duration,
}

impl FailingFlow {
    /// Creates a failing flow.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
            delay: Duration::ZERO,
        }
    }

    /// Delays every run.
    #[must_use]
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

#[async_trait]
impl Flow for FailingFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: ExecutionContext, _rt: &FlowRuntime) -> Result<FlowOutput, FlowError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let fail = ctx
            .as_value()
            .get("fail")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if fail {
            Err(FlowError::ResourceFailed {
                kind: self.name.clone(),
                status: "CREATE FAILED".to_string(),
                error: self.error.clone(),
            })
        } else {
            Ok(FlowOutput::succeeded(ctx))
        }
    }
}
