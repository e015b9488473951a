//! The create-or-find, poll, notify state machine shared by every resource kind.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::retry::with_retry;
use super::{Flow, FlowOutput, FlowRuntime};
use crate::context::{ExecutionContext, ResultPath};
use crate::control_plane::{
    AdapterReply, AdapterStatus, ApiError, ApiErrorKind, ApiOutcome, CreateRequest, ServiceRequest,
};
use crate::errors::FlowError;
use crate::resources::{
    AlreadyExistsPolicy, ApiCall, CreateVia, Existence, ResourceDescriptor, SuccessNotice,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Gate,
    Probe,
    Create,
    Wait,
    Describe,
    Update,
    Evaluate,
}

enum Created {
    New,
    AlreadyExists,
}

/// Drives one resource through gate, probe, create, poll and notify.
///
/// The algorithm is the same for every kind; the [`ResourceDescriptor`]
/// supplies the paths, calls and status rule.
#[derive(Debug, Clone)]
pub struct LifecycleFlow {
    name: String,
    descriptor: Arc<ResourceDescriptor>,
}

impl LifecycleFlow {
    /// Compiles a lifecycle for a descriptor.
    #[must_use]
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            name: format!("{}Lifecycle", descriptor.kind),
            descriptor: Arc::new(descriptor),
        }
    }

    /// The descriptor this lifecycle runs.
    #[must_use]
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Sends one control-plane request, repeating it while it fails with one
    /// of the descriptor's transient error kinds.
    async fn send<T, F, Fut>(
        &self,
        runtime: &FlowRuntime,
        key: &str,
        mut request: F,
    ) -> Result<ApiOutcome<T>, FlowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiOutcome<T>>,
    {
        let retry_on = &self.descriptor.invocation.retry_on;
        with_retry(runtime.retry_policy(), runtime.timer(), retry_on, key, || {
            let pending = request();
            async move {
                match pending.await {
                    ApiOutcome::Error(e) => Err(FlowError::from(e)),
                    outcome => Ok(outcome),
                }
            }
        })
        .await
    }

    async fn call(
        &self,
        call: &ApiCall,
        doc: &mut ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<bool, FlowError> {
        let kind = self.descriptor.kind;
        let params = call.params.render(doc)?;
        debug!(kind = %kind, action = %call.action, "control-plane call");
        let outcome = self
            .send(runtime, &call.action, || {
                runtime.control_plane().call(ServiceRequest {
                    kind,
                    action: call.action.clone(),
                    params: params.clone(),
                })
            })
            .await?;

        match outcome {
            ApiOutcome::Ok(value) => {
                doc.set(&call.result_path, value)?;
                Ok(true)
            }
            ApiOutcome::NotFound(message) => {
                debug!(kind = %self.descriptor.kind, action = %call.action, %message, "not found");
                Ok(false)
            }
            ApiOutcome::Error(e) => Err(e.into()),
        }
    }

    async fn create(
        &self,
        doc: &mut ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<Created, FlowError> {
        let d = &*self.descriptor;
        let outcome = match &d.create.via {
            CreateVia::Adapter => {
                let domain = d
                    .create
                    .domain_path
                    .as_ref()
                    .and_then(|p| doc.lookup(p))
                    .is_some_and(is_non_empty);
                info!(kind = %d.kind, domain, "creating resource");
                let input = doc.as_value().clone();
                self.send(runtime, &d.step_name, || {
                    runtime.control_plane().create(CreateRequest {
                        kind: d.kind,
                        domain,
                        input: input.clone(),
                    })
                })
                .await
            }
            CreateVia::Service(call) => {
                let params = call.params.render(doc)?;
                info!(kind = %d.kind, action = %call.action, "creating resource");
                self.send(runtime, &call.action, || {
                    runtime.control_plane().call(ServiceRequest {
                        kind: d.kind,
                        action: call.action.clone(),
                        params: params.clone(),
                    })
                })
                .await
                .map(|outcome| outcome.map(AdapterReply::succeeded))
            }
        };

        let reply = match outcome {
            Ok(ApiOutcome::Ok(reply)) => reply,
            Err(e)
                if d.create.already_exists == AlreadyExistsPolicy::Poll
                    && e.as_api_error()
                        .is_some_and(|e| e.kind == ApiErrorKind::ResourceAlreadyExists) =>
            {
                info!(kind = %d.kind, "resource already exists, polling it");
                return Ok(Created::AlreadyExists);
            }
            Err(e) => return Err(e),
            Ok(ApiOutcome::Error(e)) => return Err(e.into()),
            Ok(ApiOutcome::NotFound(message)) => {
                return Err(ApiError::from_code("ResourceNotFoundException", message).into())
            }
        };

        if reply.status == AdapterStatus::Failed {
            return Err(FlowError::CreateRejected {
                kind: d.kind.to_string(),
                message: reply.response.to_string(),
            });
        }

        doc.set(&ResultPath::At(d.create.response_path()), reply.response)?;
        if let Some(adopt) = &d.create.adopt_arn_into {
            let arn = doc.get(&d.create.arn_path())?.clone();
            doc.set(adopt, arn)?;
        }
        Ok(Created::New)
    }

    fn wants_update(&self, doc: &ExecutionContext) -> bool {
        self.descriptor.update.as_ref().is_some_and(|update| {
            self.descriptor.status.success.evaluate(doc) && update.when.evaluate(doc)
        })
    }

    fn observed_status(&self, doc: &ExecutionContext) -> String {
        self.descriptor
            .status
            .status_path
            .as_ref()
            .and_then(|p| doc.lookup(p))
            .map_or_else(
                || "UNKNOWN".to_string(),
                |v| v.as_str().map_or_else(|| v.to_string(), str::to_string),
            )
    }

    async fn notify(&self, doc: &ExecutionContext, runtime: &FlowRuntime) {
        let d = &*self.descriptor;
        runtime
            .notifier()
            .notify_status(d.kind, &d.notification, doc)
            .await;
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[async_trait]
impl Flow for LifecycleFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError> {
        let d = &*self.descriptor;
        let mut doc = ctx;
        let mut polls: u32 = 0;
        let mut state = State::Gate;

        loop {
            debug!(kind = %d.kind, state = ?state, polls, "lifecycle state");
            state = match state {
                State::Gate => {
                    if !d.gate.evaluate(&doc) {
                        info!(kind = %d.kind, reason = %d.skip_message, "skipping step");
                        return Ok(FlowOutput::skipped(doc, d.skip_message.clone()));
                    }
                    State::Probe
                }
                State::Probe => match &d.existence {
                    Existence::None => State::Create,
                    Existence::Describe => {
                        if !self.call(&d.describe, &mut doc, runtime).await? {
                            State::Create
                        } else if self.wants_update(&doc) {
                            State::Update
                        } else {
                            State::Evaluate
                        }
                    }
                    Existence::ListFirst(list) => {
                        let first = if self.call(&list.call, &mut doc, runtime).await? {
                            doc.lookup(&list.first_arn).cloned()
                        } else {
                            None
                        };
                        match first {
                            Some(arn) => {
                                info!(kind = %d.kind, arn = %arn, "adopting existing resource");
                                doc.set(&list.adopt_into, arn)?;
                                State::Describe
                            }
                            None => State::Create,
                        }
                    }
                },
                State::Create => match self.create(&mut doc, runtime).await? {
                    Created::New if d.create.wait_after => State::Wait,
                    Created::New | Created::AlreadyExists => State::Describe,
                },
                State::Wait => {
                    let poll = runtime.poll_policy();
                    if let Some(max) = poll.max_polls {
                        if polls >= max {
                            warn!(kind = %d.kind, polls, "poll limit reached");
                            return Err(FlowError::PollLimitExceeded {
                                kind: d.kind.to_string(),
                                polls,
                            });
                        }
                    }
                    runtime.timer().sleep(poll.interval).await;
                    polls += 1;
                    State::Describe
                }
                State::Describe => {
                    if self.call(&d.describe, &mut doc, runtime).await? {
                        State::Evaluate
                    } else {
                        State::Wait
                    }
                }
                State::Update => {
                    if let Some(update) = &d.update {
                        info!(kind = %d.kind, action = %update.call.action, "updating resource");
                        self.call(&update.call, &mut doc, runtime).await?;
                    }
                    State::Describe
                }
                State::Evaluate => {
                    if d.status.failure.evaluate(&doc) {
                        let status = self.observed_status(&doc);
                        warn!(kind = %d.kind, %status, "resource failed");
                        self.notify(&doc, runtime).await;
                        return Err(FlowError::ResourceFailed {
                            kind: d.kind.to_string(),
                            status,
                            error: d.failure_error.clone(),
                        });
                    }
                    if d.status.success.evaluate(&doc) {
                        let notify = match d.success_notice {
                            SuccessNotice::Always => true,
                            SuccessNotice::CreatedThisRun => doc.is_present(&d.create.arn_path()),
                        };
                        if notify {
                            self.notify(&doc, runtime).await;
                        }
                        info!(kind = %d.kind, polls, "resource ready");
                        return Ok(FlowOutput::succeeded(doc));
                    }
                    if d.notify_pending {
                        self.notify(&doc, runtime).await;
                    }
                    State::Wait
                }
            };
        }
    }
}
