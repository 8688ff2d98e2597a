//! Batch-by-batch execution of an optimizer [`ExecutionPlan`].

use conductor_sdk::{OrchestratorEvent, StepResult, WorkflowKind};
use tracing::{info, warn};

use super::{last_successful_output, WorkflowDetails, WorkflowEngine, WorkflowResult};
use crate::optimizer::{BatchKind, ExecutionPlan};
use crate::workflow_utils::execute_batch;

#[derive(Debug, Clone, Default)]
pub struct PlanRunOptions {
    pub model: Option<String>,

    /// Do not start the next batch after a batch with failures
    pub stop_on_error: bool,
}

impl WorkflowEngine {
    /// Execute `plan` in batch order.
    ///
    /// Members of a parallel batch all see the code as it stood before the
    /// batch and run through the worker pool (`max_concurrency` wide). Their
    /// results are merged by original step index, and the running code then
    /// becomes the output of the highest-index successful member. A failing
    /// member never cancels its siblings.
    pub async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        code: &str,
        options: PlanRunOptions,
    ) -> WorkflowResult {
        let started = self.start(
            WorkflowKind::Plan,
            format!("{} steps in {} batches", plan.total_steps(), plan.batches.len()),
        );
        let model = self.resolve_model(options.model.as_deref());
        let total_batches = plan.batches.len();

        let mut current = code.to_string();
        let mut results: Vec<StepResult> = Vec::with_capacity(plan.total_steps());

        for (batch_index, batch) in plan.batches.iter().enumerate() {
            let parallel = batch.kind == BatchKind::Parallel;
            self.events.emit(OrchestratorEvent::BatchStarted {
                batch: batch_index + 1,
                total_batches,
                steps: batch.steps.len(),
                parallel,
            });

            let mut batch_results: Vec<(usize, StepResult)> = if parallel {
                let snapshot = current.as_str();
                execute_batch(
                    batch.steps.iter().collect::<Vec<_>>(),
                    self.config.max_concurrency,
                    |planned, _| async move {
                        let result = self
                            .run_step(&planned.step, snapshot, &planned.context, model)
                            .await;
                        (planned.step_index, result)
                    },
                )
                .await
            } else {
                let mut sequential = Vec::with_capacity(batch.steps.len());
                for planned in &batch.steps {
                    let result = self
                        .run_step(&planned.step, &current, &planned.context, model)
                        .await;
                    if let Some(output) = result.successful_output() {
                        current = output.to_string();
                    }
                    sequential.push((planned.step_index, result));
                }
                sequential
            };

            if parallel {
                batch_results.sort_by_key(|(index, _)| *index);
                if let Some(output) = batch_results
                    .iter()
                    .rev()
                    .find_map(|(_, r)| r.successful_output())
                {
                    current = output.to_string();
                }
            }

            let failures = batch_results.iter().filter(|(_, r)| !r.success).count();
            results.extend(batch_results.into_iter().map(|(_, r)| r));

            self.events.emit(OrchestratorEvent::BatchCompleted {
                batch: batch_index + 1,
                failures,
            });
            info!(batch = batch_index + 1, total_batches, failures, "Batch complete");

            if failures > 0 && options.stop_on_error {
                warn!(batch = batch_index + 1, "Stopping plan after failed batch");
                break;
            }
        }

        let success = results.iter().all(|r| r.success);
        let final_output = last_successful_output(&results).map(|_| current);

        self.finish(
            started,
            results,
            final_output,
            success,
            WorkflowDetails::Plan {
                batches: total_batches,
                parallel_batches: plan.parallel_batches(),
            },
        )
    }
}
