//! Parallel composition with an optional catch handler.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::scoped::ScopedTask;
use super::{Flow, FlowOutput, FlowRuntime};
use crate::context::{ExecutionContext, ResultPath};
use crate::errors::FlowError;

type BranchTask = ScopedTask<(usize, Result<FlowOutput, FlowError>)>;

/// Handler run when any branch of a [`ParallelFlow`] fails.
#[derive(Debug, Clone)]
pub struct Catch {
    /// Flow receiving the document with the `{Error, Cause}` record attached.
    pub handler: Arc<dyn Flow>,
    /// Where the `{Error, Cause}` record is written.
    pub result_path: ResultPath,
}

impl Catch {
    /// Creates a catch writing the error record at `result_path`.
    #[must_use]
    pub fn new(handler: Arc<dyn Flow>, result_path: ResultPath) -> Self {
        Self {
            handler,
            result_path,
        }
    }
}

/// Runs every branch concurrently on its own copy of the input.
///
/// On success the branch outputs are written, in branch order, as an array at
/// the result path. The first failure aborts the remaining branches and either
/// propagates or, with a [`Catch`], is handed to the catch handler.
#[derive(Debug, Clone)]
pub struct ParallelFlow {
    name: String,
    branches: Vec<Arc<dyn Flow>>,
    result_path: ResultPath,
    catch: Option<Catch>,
}

impl ParallelFlow {
    /// Creates a parallel flow whose outputs are discarded.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
            result_path: ResultPath::Discard,
            catch: None,
        }
    }

    /// Adds a branch.
    #[must_use]
    pub fn with_branch(mut self, branch: Arc<dyn Flow>) -> Self {
        self.branches.push(branch);
        self
    }

    /// Writes the branch outputs at `path`.
    #[must_use]
    pub fn with_result_path(mut self, path: ResultPath) -> Self {
        self.result_path = path;
        self
    }

    /// Installs a catch handler.
    #[must_use]
    pub fn with_catch(mut self, catch: Catch) -> Self {
        self.catch = Some(catch);
        self
    }

    /// Number of branches.
    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    fn spawn(
        index: usize,
        branch: &Arc<dyn Flow>,
        ctx: &ExecutionContext,
        runtime: &FlowRuntime,
    ) -> BranchTask {
        let branch = Arc::clone(branch);
        let ctx = ctx.clone();
        let runtime = runtime.clone();
        ScopedTask::spawn(async move { (index, branch.run(ctx, &runtime).await) })
    }

    async fn run_branches(
        &self,
        ctx: &ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<Vec<Value>, FlowError> {
        let mut active: FuturesUnordered<BranchTask> = self
            .branches
            .iter()
            .enumerate()
            .map(|(index, branch)| Self::spawn(index, branch, ctx, runtime))
            .collect();

        let mut outputs: Vec<Option<Value>> = vec![None; self.branches.len()];
        while let Some(joined) = active.next().await {
            let failure = match joined {
                Ok((index, Ok(output))) => {
                    outputs[index] = Some(output.context.into_value());
                    continue;
                }
                Ok((index, Err(e))) => {
                    warn!(
                        parallel = %self.name,
                        branch = %self.branches[index].name(),
                        error = %e,
                        "branch failed, aborting siblings"
                    );
                    e
                }
                Err(e) => FlowError::Internal(format!("branch task join error: {e}")),
            };
            // Returning drops `active`, aborting the remaining branches and their subtasks.
            return Err(failure);
        }

        Ok(outputs.into_iter().map(Option::unwrap_or_default).collect())
    }
}

#[async_trait]
impl Flow for ParallelFlow {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(
        &self,
        ctx: ExecutionContext,
        runtime: &FlowRuntime,
    ) -> Result<FlowOutput, FlowError> {
        debug!(parallel = %self.name, branches = self.branches.len(), "starting branches");
        match self.run_branches(&ctx, runtime).await {
            Ok(outputs) => {
                let mut ctx = ctx;
                ctx.set(&self.result_path, Value::Array(outputs))?;
                Ok(FlowOutput::succeeded(ctx))
            }
            Err(e) => match &self.catch {
                Some(catch) => {
                    let mut ctx = ctx;
                    ctx.set(&catch.result_path, e.to_catch_value())?;
                    catch.handler.run(ctx, runtime).await
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{JsonPath, ValueTemplate};
    use crate::events::CollectingEventSink;
    use crate::flow::{Branch, FailFlow, MapFlow, PassFlow};
    use crate::testing::{test_runtime, FailingFlow, MockControlPlane, SlowFlow};
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn runtime() -> FlowRuntime {
        test_runtime(
            &Arc::new(MockControlPlane::new()),
            &Arc::new(CollectingEventSink::new()),
        )
    }

    fn tagging(name: &str, tag: i64) -> Arc<dyn Flow> {
        Arc::new(
            PassFlow::new(name).with_result(ValueTemplate::literal(tag), ResultPath::at("tag")),
        )
    }

    #[tokio::test]
    async fn test_outputs_are_in_branch_order() {
        let parallel = ParallelFlow::new("fanout")
            .with_branch(Arc::new(SlowFlow::with_delay_ms("slow", 20)))
            .with_branch(tagging("fast", 2))
            .with_result_path(ResultPath::at("results"));

        let output = parallel
            .run(ExecutionContext::from_value(json!({"tag": 1})), &runtime())
            .await
            .unwrap();

        assert_eq!(
            output.context.as_value()["results"],
            json!([{"tag": 1}, {"tag": 2}])
        );
    }

    #[tokio::test]
    async fn test_default_result_path_discards_outputs() {
        let parallel = ParallelFlow::new("fanout").with_branch(tagging("one", 5));
        let input = ExecutionContext::from_value(json!({"tag": 1}));

        let output = parallel.run(input.clone(), &runtime()).await.unwrap();

        assert_eq!(output.context, input);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_siblings() {
        let parallel = ParallelFlow::new("fanout")
            .with_branch(Arc::new(SlowFlow::with_delay_ms("slow", 5_000)))
            .with_branch(Arc::new(FailingFlow::new("boom", "Failure")));

        let started = Instant::now();
        let err = parallel
            .run(ExecutionContext::from_value(json!({"fail": true})), &runtime())
            .await
            .unwrap_err();

        assert_eq!(err.error_name(), "Failure");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_failure_cancels_nested_map_items() {
        let slow = Arc::new(SlowFlow::with_delay_ms("slow", 300));
        let parallel = ParallelFlow::new("fanout")
            .with_branch(Arc::new(
                MapFlow::new("solutions", "items", Arc::clone(&slow) as Arc<dyn Flow>)
                    .with_max_concurrency(1),
            ))
            .with_branch(Arc::new(FailingFlow::new("boom", "Failure").with_delay_ms(50)));
        let input = ExecutionContext::from_value(json!({
            "fail": true,
            "items": [{}, {}, {}, {}]
        }));

        let err = parallel.run(input, &runtime()).await.unwrap_err();
        let runs_at_failure = slow.runs();
        tokio::time::sleep(Duration::from_millis(1_400)).await;

        assert_eq!(err.error_name(), "Failure");
        assert_eq!(runs_at_failure, 1);
        assert_eq!(slow.runs(), runs_at_failure, "map items kept starting");
    }

    #[tokio::test]
    async fn test_failure_cancels_nested_parallel_branches() {
        let slow = Arc::new(SlowFlow::with_delay_ms("slow", 300));
        let nested = Branch::new("nested")
            .then(Arc::clone(&slow) as Arc<dyn Flow>)
            .then(Arc::clone(&slow) as Arc<dyn Flow>)
            .build();
        let parallel = ParallelFlow::new("outer")
            .with_branch(Arc::new(ParallelFlow::new("inner").with_branch(nested)))
            .with_branch(Arc::new(FailingFlow::new("boom", "Failure").with_delay_ms(50)));

        let err = parallel
            .run(ExecutionContext::from_value(json!({"fail": true})), &runtime())
            .await
            .unwrap_err();
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(err.error_name(), "Failure");
        assert_eq!(slow.runs(), 1, "nested branch kept running");
    }

    #[tokio::test]
    async fn test_catch_receives_error_record() {
        let parallel = ParallelFlow::new("fanout")
            .with_branch(Arc::new(FailingFlow::new("boom", "Failure")))
            .with_catch(Catch::new(
                Arc::new(PassFlow::new("handled")),
                ResultPath::At(JsonPath::fields("error")),
            ));

        let output = parallel
            .run(ExecutionContext::from_value(json!({"fail": true})), &runtime())
            .await
            .unwrap();

        assert_eq!(output.context.as_value()["error"]["Error"], "Failure");
        assert!(output.context.as_value()["error"]["Cause"].is_string());
    }

    #[tokio::test]
    async fn test_catch_handler_failure_propagates() {
        let parallel = ParallelFlow::new("fanout")
            .with_branch(Arc::new(FailingFlow::new("boom", "Failure")))
            .with_catch(Catch::new(
                Arc::new(FailFlow::new("Fail", "error")),
                ResultPath::at("error"),
            ));

        let err = parallel
            .run(ExecutionContext::from_value(json!({"fail": true})), &runtime())
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::PipelineFailed { ref error, .. } if error == "Failure"));
    }
}
