//! Plan, execute, review and refine against a free-form goal.

use conductor_sdk::{
    ContextMetadata, ExecuteOptions, OrchestratorEvent, Plan, Planner, Review, StepContext,
    StepResult, WorkflowKind,
};
use serde_json::json;
use std::time::Instant;
use tracing::{info, warn};

use super::{WorkflowDetails, WorkflowEngine, WorkflowResult};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::optimizer::OptimizeOptions;
use crate::usage::{aggregate_phase_usage, aggregate_usage};

#[derive(Debug, Clone)]
pub struct CustomOptions {
    pub model: Option<String>,

    /// Falls back to the configured default when `None`
    pub stop_on_error: Option<bool>,

    /// Record outputs without adopting them as the running code
    pub read_only: bool,

    pub review: bool,

    /// Refine after a review that reported issues
    pub refine: bool,

    /// Compress large inputs through the context manager before planning
    pub optimize_context: bool,

    /// Drop redundant planned steps before execution
    pub optimize_steps: bool,

    pub context: StepContext,
}

impl Default for CustomOptions {
    fn default() -> Self {
        Self {
            model: None,
            stop_on_error: None,
            read_only: false,
            review: false,
            refine: false,
            optimize_context: true,
            optimize_steps: false,
            context: StepContext::new(),
        }
    }
}

impl WorkflowEngine {
    /// Run the full plan → execute → review → refine protocol.
    ///
    /// Only planning failures and executor errors abort the run. Context
    /// optimization, review and refinement problems are logged and skipped.
    /// `success` reflects execution alone.
    pub async fn execute_custom(
        &self,
        goal: &str,
        code: &str,
        options: CustomOptions,
    ) -> OrchestratorResult<WorkflowResult> {
        let planner = self
            .planner
            .as_ref()
            .ok_or(OrchestratorError::MissingCollaborator("planner"))?;
        let model = self.resolve_model(options.model.as_deref()).to_string();
        let started = self.start(WorkflowKind::Custom, goal);

        let outcome = self
            .run_custom(&**planner, goal, code, &model, options, started)
            .await;
        if outcome.is_err() {
            self.abort(started, WorkflowKind::Custom);
        }
        outcome
    }

    async fn run_custom(
        &self,
        planner: &dyn Planner,
        goal: &str,
        code: &str,
        model: &str,
        options: CustomOptions,
        started: Instant,
    ) -> OrchestratorResult<WorkflowResult> {
        // 1. Context pre-optimization
        let optimized = if options.optimize_context {
            self.optimize_input(goal, code).await
        } else {
            None
        };
        let planning_input = optimized
            .as_ref()
            .map_or(code, |(context, _)| context.as_str());

        // 2. Plan
        let mut plan: Plan = planner
            .create_plan(goal, planning_input, model)
            .await
            .map_err(|e| OrchestratorError::collaborator("Planning", e))?;

        if plan.steps.is_empty() {
            return Err(OrchestratorError::PlanningFailure(
                "planner returned no steps".to_string(),
            ));
        }

        let validation = planner.validate_plan(&plan);
        for issue in &validation.issues {
            warn!(issue = %issue, "Plan validation issue");
        }
        info!(
            steps = plan.steps.len(),
            strategy = %plan.strategy,
            "Plan created"
        );

        let mut skipped_steps = 0;
        if options.optimize_steps {
            let optimized_plan = self.optimizer.optimize_workflow(
                &plan.steps,
                &options.context,
                OptimizeOptions {
                    remove_redundant: true,
                },
            );
            skipped_steps = plan.steps.len() - optimized_plan.steps.len();
            if skipped_steps > 0 {
                info!(skipped = skipped_steps, "Dropped redundant planned steps");
            }
            plan.steps = optimized_plan.steps;
        }

        // 3. Execute
        let mut context = options.context.clone();
        if let Some((optimized_context, _)) = &optimized {
            context.insert("optimized_context".to_string(), json!(optimized_context));
        }
        let execute_options = ExecuteOptions {
            model: model.to_string(),
            stop_on_error: options.stop_on_error.unwrap_or(self.config.stop_on_error),
            read_only: options.read_only,
        };

        let outcome = self
            .executor
            .execute_steps(&plan.steps, code, &context, &execute_options)
            .await
            .map_err(|e| OrchestratorError::collaborator("Execution", e))?;
        self.report_step_outcomes(&outcome.results, model);

        let success = outcome.success_count == outcome.results.len();
        let execution_usage = aggregate_usage(&outcome.results);
        let mut final_code = outcome.final_code;

        // 4. Review
        let mut review: Option<Review> = None;
        let mut refined = false;
        if options.review {
            if let Some(reviewer) = &self.reviewer {
                match reviewer.review(goal, &final_code, &outcome.results, model).await {
                    Ok(found) => review = Some(found),
                    Err(e) => warn!(error = %e, "Review failed; keeping executed code"),
                }
            } else {
                warn!("Review requested but no reviewer is configured");
            }
        }

        // 5. Refine
        if options.refine {
            if let (Some(reviewer), Some(found)) = (&self.reviewer, &review) {
                if !found.issues.is_empty() {
                    match reviewer.refine(&final_code, &found.issues, model).await {
                        Ok(refinement) if refinement.improved => {
                            final_code = refinement.refined_code;
                            refined = true;
                        }
                        Ok(_) => info!("Refinement reported no improvement; keeping reviewed code"),
                        Err(e) => warn!(error = %e, "Refinement failed; keeping reviewed code"),
                    }
                }
            }
        }

        let total_usage = aggregate_phase_usage(
            Some(&plan.usage),
            Some(&execution_usage),
            review.as_ref().map(|r| &r.usage),
        );

        let mut result = self.finish(
            started,
            outcome.results,
            Some(final_code),
            success,
            WorkflowDetails::Custom {
                strategy: plan.strategy,
                plan_issues: validation.issues,
                context_optimization: optimized.map(|(_, metadata)| metadata),
                skipped_steps,
                review_issues: review.map(|r| r.issues).unwrap_or_default(),
                refined,
            },
        );
        result.total_usage = total_usage;
        Ok(result)
    }

    /// The executor owns the batch, so step events are emitted once it
    /// returns. No `StepStarted` is sent for these steps.
    fn report_step_outcomes(&self, results: &[StepResult], model: &str) {
        for result in results {
            let model = result.model.clone().unwrap_or_else(|| model.to_string());
            let event = if result.success {
                OrchestratorEvent::StepCompleted {
                    step_id: result.step_id.clone(),
                    model,
                    duration_ms: result.duration_ms,
                }
            } else {
                OrchestratorEvent::StepFailed {
                    step_id: result.step_id.clone(),
                    model,
                    error: result.error.clone().unwrap_or_default(),
                }
            };
            self.events.emit(event);
        }
    }

    /// Compress oversized input. Any failure falls back to the raw code.
    async fn optimize_input(&self, goal: &str, code: &str) -> Option<(String, ContextMetadata)> {
        if code.len() <= self.config.context_optimization_threshold {
            return None;
        }
        let context_manager = self.context_manager.as_ref()?;

        match context_manager
            .process_context(
                code,
                goal,
                self.classifier.classify(goal),
                self.config.max_context_tokens,
            )
            .await
        {
            Ok(processed) => {
                self.events.emit(OrchestratorEvent::ContextOptimized {
                    original_tokens: processed.metadata.original_tokens,
                    optimized_tokens: processed.metadata.optimized_tokens,
                    compression_ratio: processed.metadata.compression_ratio,
                });
                Some((processed.context, processed.metadata))
            }
            Err(e) => {
                warn!(error = %e, "Context optimization failed; using raw code");
                None
            }
        }
    }
}
