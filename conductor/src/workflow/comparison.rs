//! Side-by-side comparison: the same task against several models.

use conductor_sdk::{Step, StepContext, WorkflowKind};

use super::{WorkflowDetails, WorkflowEngine, WorkflowResult};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::workflow_utils::execute_batch;

#[derive(Debug, Clone, Default)]
pub struct ComparisonOptions {
    pub context: StepContext,
}

impl WorkflowEngine {
    /// Run `task` once per model on identical input.
    ///
    /// Models run through the worker pool (`max_concurrency` wide, strictly
    /// sequential by default). A model failure is recorded and the rest still
    /// run. No winner is picked, so `final_output` is always `None`; the run
    /// succeeds when at least one model did.
    pub async fn execute_comparison(
        &self,
        task: &str,
        code: &str,
        models: &[String],
        options: ComparisonOptions,
    ) -> OrchestratorResult<WorkflowResult> {
        if models.is_empty() {
            return Err(OrchestratorError::NoModels);
        }

        let started = self.start(WorkflowKind::Comparison, task);
        let action = self.classifier.classify(task);
        let context = &options.context;

        let results = execute_batch(
            models.to_vec(),
            self.config.max_concurrency,
            |model, slot| {
                let step = Step::new(format!("compare-{}", slot.index + 1), task)
                    .with_name(model.clone())
                    .with_action(action);
                async move { self.run_step(&step, code, context, &model).await }
            },
        )
        .await;

        let success = results.iter().any(|r| r.success);

        Ok(self.finish(
            started,
            results,
            None,
            success,
            WorkflowDetails::Comparison {
                models: models.to_vec(),
            },
        ))
    }
}
