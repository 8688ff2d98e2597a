//! Sequential model chain: each model refines the previous model's output.

use conductor_sdk::{ChainContext, ChainStep, Step, StepContext, WorkflowKind};
use serde_json::json;
use tracing::{info, warn};

use super::{last_successful_output, WorkflowDetails, WorkflowEngine, WorkflowResult};
use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub stop_on_error: bool,

    /// Ask the context manager for per-step routing when the code is large
    pub route_context: bool,

    pub context: StepContext,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            stop_on_error: false,
            route_context: true,
            context: StepContext::new(),
        }
    }
}

impl WorkflowEngine {
    /// Apply `models` in order, piping each successful output into the next.
    ///
    /// A failed model leaves the running code unchanged, so the next model
    /// sees the last successful output rather than the failed attempt.
    pub async fn execute_chain(
        &self,
        task: &str,
        code: &str,
        models: &[String],
        options: ChainOptions,
    ) -> OrchestratorResult<WorkflowResult> {
        if models.is_empty() {
            return Err(OrchestratorError::NoModels);
        }

        let started = self.start(WorkflowKind::Chain, task);
        let action = self.classifier.classify(task);

        let steps: Vec<Step> = models
            .iter()
            .enumerate()
            .map(|(index, model)| {
                let step = Step::new(format!("step-{}", index), task)
                    .with_name(model.clone())
                    .with_action(action);
                if index == 0 {
                    step
                } else {
                    step.with_dependencies([format!("step-{}", index - 1)])
                }
            })
            .collect();

        let routing = if options.route_context {
            self.route_chain(code, &steps, models, &options.context).await
        } else {
            None
        };

        let mut current = code.to_string();
        let mut results = Vec::with_capacity(models.len());

        for (step, model) in steps.iter().zip(models) {
            let routed = routing
                .as_ref()
                .and_then(|r| r.context_map.get(&step.id).map(|ctx| (r, ctx)));

            let result = match routed {
                Some((routing, routed_code)) => {
                    let mut context = options.context.clone();
                    context.insert(
                        "routing".to_string(),
                        json!({
                            "step_id": step.id,
                            "total_chunks": routing.metadata.total_chunks,
                            "reuse_efficiency": routing.metadata.reuse_efficiency,
                        }),
                    );
                    context.insert("previous_output".to_string(), json!(current));
                    self.run_step(step, routed_code, &context, model).await
                }
                None => self.run_step(step, &current, &options.context, model).await,
            };

            let failed = !result.success;
            if !failed {
                current = result.output.clone();
            }
            results.push(result);

            if failed && options.stop_on_error {
                warn!(step = %step.id, model = %model, "Stopping chain after failed model");
                break;
            }
        }

        let success = results.iter().all(|r| r.success);
        let final_output = last_successful_output(&results);

        Ok(self.finish(
            started,
            results,
            final_output,
            success,
            WorkflowDetails::Chain {
                models: models.to_vec(),
                routing: routing.map(|r| r.metadata),
            },
        ))
    }

    /// Request a routing plan for large inputs. Failures fall back to raw code.
    async fn route_chain(
        &self,
        code: &str,
        steps: &[Step],
        models: &[String],
        global_context: &StepContext,
    ) -> Option<ChainContext> {
        if code.len() <= self.config.chain_routing_threshold {
            return None;
        }
        let context_manager = self.context_manager.as_ref()?;

        let chain_steps: Vec<ChainStep> = steps
            .iter()
            .zip(models)
            .map(|(step, model)| ChainStep {
                id: step.id.clone(),
                model: model.clone(),
                description: step.description.clone(),
                dependencies: step.dependencies.clone(),
            })
            .collect();

        match context_manager
            .process_chain_context(code, &chain_steps, global_context)
            .await
        {
            Ok(routing) => {
                info!(
                    chunks = routing.metadata.total_chunks,
                    reuse = routing.metadata.reuse_efficiency,
                    "Chain context routed"
                );
                Some(routing)
            }
            Err(e) => {
                warn!(error = %e, "Chain context routing failed; using raw code");
                None
            }
        }
    }
}
