//! Single-step execution with timing and lifecycle events

use conductor_sdk::{OrchestratorEvent, Step, StepContext, StepExecutor, StepResult};
use std::time::Instant;
use tracing::warn;

use crate::events::EventSink;

/// Run one step through the executor and always produce a [`StepResult`].
///
/// Wraps the call with:
/// - `StepStarted` before execution
/// - `StepCompleted` on success
/// - `StepFailed` on a reported failure or an executor error
///
/// The returned result carries the model and the elapsed wall-clock time.
pub async fn execute_step_logged(
    executor: &dyn StepExecutor,
    events: &EventSink,
    step: &Step,
    code: &str,
    context: &StepContext,
    model: &str,
) -> StepResult {
    events.emit(OrchestratorEvent::StepStarted {
        step_id: step.id.clone(),
        model: model.to_string(),
        description: step.description.clone(),
    });

    let started = Instant::now();
    let outcome = executor.execute_step(step, code, context, model).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let mut result = match outcome {
        Ok(result) => result,
        Err(e) => {
            warn!(step = %step.id, model, error = %e, "Step executor raised an error");
            StepResult::failure(&step.id, e.to_string())
        }
    };

    if result.model.is_none() {
        result.model = Some(model.to_string());
    }
    result.duration_ms = duration_ms;
    if !result.success && result.error.is_none() {
        result.error = Some("Step reported failure without an error message".to_string());
    }

    if result.success {
        events.emit(OrchestratorEvent::StepCompleted {
            step_id: step.id.clone(),
            model: model.to_string(),
            duration_ms,
        });
    } else {
        events.emit(OrchestratorEvent::StepFailed {
            step_id: step.id.clone(),
            model: model.to_string(),
            error: result.error.clone().unwrap_or_default(),
        });
    }

    result
}
