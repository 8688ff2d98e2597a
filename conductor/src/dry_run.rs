//! An executor that never calls a model.

use anyhow::Result;
use async_trait::async_trait;
use conductor_sdk::{Step, StepContext, StepExecutor, StepResult};
use tracing::debug;

/// Echoes the input code back as every step's output with zero usage.
///
/// Useful for checking how a workflow would be sequenced without spending
/// tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl StepExecutor for DryRunExecutor {
    async fn execute_step(
        &self,
        step: &Step,
        code: &str,
        _context: &StepContext,
        model: &str,
    ) -> Result<StepResult> {
        debug!(step = %step.id, action = %step.action, model, "Dry run step");
        Ok(StepResult::success(&step.id, code).with_model(model))
    }
}
