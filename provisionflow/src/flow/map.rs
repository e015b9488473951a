//! Bounded-concurrency iteration over a dynamic item list.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::scoped::ScopedTask;
use super::{Flow, FlowOutput, FlowRuntime};
use crate::context::{ExecutionContext, JsonPath, ResultPath, ValueTemplate};
use crate::errors::FlowError;

/// How a map reacts to a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FailureMode {
    /// Abort in-flight items and fail immediately.
    FailFast,
    /// Let started items finish, start no new ones, then fail with the first error.
    #[default]
    ContinueOnFailure,
    /// Run every item and record failures as `{Error, Cause}` entries.
    BestEffort,
}

/// `None` marks an item that never started because the map stopped admitting work.
type ItemTask = ScopedTask<(usize, Option<Result<FlowOutput, FlowError>>)>;

/// Runs an iterator flow once per element of an array in the document.
#[derive(Debug, Clone)]
pub struct MapFlow {
    name: String,
    items_path: JsonPath,
    item_selector: ValueTemplate,
    iterator: Arc<dyn Flow>,
    max_concurrency: usize,
    result_path: ResultPath,
    failure_mode: FailureMode,
}

impl MapFlow {
    /// Maps `iterator` over the array at the dotted `items_path`.
    ///
    /// Each item's document is the item itself until
    /// [`with_item_selector`](Self::with_item_selector) says otherwise.
    #[must_use]
    pub fn new(name: impl Into<String>, items_path: &str, iterator: Arc<dyn Flow>) -> Self {
        Self {
            name: name.into(),
            items_path: JsonPath::fields(items_path),
            item_selector: ValueTemplate::MapItem,
            iterator,
            max_concurrency: 0,
            result_path: ResultPath::Discard,
            failure_mode: FailureMode::default(),
        }
    }

    /// Template rendering each item's private document.
    #[must_use]
    pub fn with_item_selector(mut self, selector: ValueTemplate) -> Self {
        self.item_selector = selector;
        self
    }

    /// Caps concurrently running items; zero means unbounded.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Writes the per-item outputs at `path`.
    #[must_use]
    pub fn with_result_path(mut self, path: ResultPath) -> Self {
        self.result_path = path;
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Concurrency cap; zero means unbounded.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    fn items(&self, ctx: &ExecutionContext) -> Result<Vec<Value>, FlowError> {
        match ctx.lookup(&self.items_path) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(FlowError::InvalidInput(format!(
                "{}: items at {} must be an array, found {}",
                self.name,
                self.items_path,
                type_name(other)
            ))),
        }
    }

    fn spawn(
        &self,
        index: usize,
        input: Value,
        permits: &Arc<Semaphore>,
        runtime: &FlowRuntime,
    ) -> ItemTask {
        let iterator = Arc::clone(&self.iterator);
        let permits = Arc::clone(permits);
        let runtime = runtime.clone();
        let stop_on_failure = self.failure_mode != FailureMode::BestEffort;
        ScopedTask::spawn(async move {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                return (index, None);
            };
            let result = iterator
                .run(ExecutionContext::from_value(input), &runtime)
                .await;
            if result.is_err() && stop_on_failure {
                permits.close();
            }
            drop(permit);
            (index, Some(result))
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl Flow for MapFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError> {
        let items = self.items(&ctx)?;
        let inputs = items
            .iter()
            .map(|item| self.item_selector.render_with_item(&ctx, item))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            map = %self.name,
            items = inputs.len(),
            max_concurrency = self.max_concurrency,
            "starting map"
        );

        let cap = match self.max_concurrency {
            0 => Semaphore::MAX_PERMITS,
            n => n,
        };
        let permits = Arc::new(Semaphore::new(cap));
        let mut outputs: Vec<Value> = vec![Value::Null; inputs.len()];
        let mut active: FuturesUnordered<ItemTask> = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| self.spawn(index, input, &permits, runtime))
            .collect();

        let mut first_error: Option<FlowError> = None;
        while let Some(joined) = active.next().await {
            let (index, result) =
                joined.map_err(|e| FlowError::Internal(format!("map item join error: {e}")))?;
            match result {
                None => {}
                Some(Ok(output)) => outputs[index] = output.context.into_value(),
                Some(Err(e)) => {
                    warn!(map = %self.name, item = index, error = %e, "map item failed");
                    match self.failure_mode {
                        FailureMode::FailFast => {
                            // Dropping `active` aborts in-flight items and their subtasks.
                            permits.close();
                            return Err(e);
                        }
                        FailureMode::ContinueOnFailure => {
                            first_error.get_or_insert(e);
                        }
                        FailureMode::BestEffort => outputs[index] = e.to_catch_value(),
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        let mut ctx = ctx;
        ctx.set(&self.result_path, Value::Array(outputs))?;
        Ok(FlowOutput::succeeded(ctx))
    }
}
