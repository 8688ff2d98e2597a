//! Sequential execution of a named preset.

use conductor_sdk::{Step, StepContext, WorkflowKind};
use tracing::warn;

use super::{last_successful_output, WorkflowDetails, WorkflowEngine, WorkflowResult};
use crate::error::OrchestratorResult;
use crate::presets::{self, Preset};

#[derive(Debug, Clone, Default)]
pub struct PresetOptions {
    /// Model for steps that do not name one
    pub model: Option<String>,

    pub stop_on_error: bool,

    pub context: StepContext,
}

impl WorkflowEngine {
    /// Run a built-in preset by id
    pub async fn execute_preset(
        &self,
        preset_id: &str,
        code: &str,
        options: PresetOptions,
    ) -> OrchestratorResult<WorkflowResult> {
        let preset = presets::get_preset(preset_id)?;
        Ok(self.run_preset(&preset, code, &options).await)
    }

    /// Run any preset definition.
    ///
    /// Step `i` receives the original code when it `requires_input`, otherwise
    /// the running output. Failed steps leave the running output untouched.
    pub async fn run_preset(
        &self,
        preset: &Preset,
        code: &str,
        options: &PresetOptions,
    ) -> WorkflowResult {
        let started = self.start(WorkflowKind::Preset, &preset.name);
        let mut current = code.to_string();
        let mut results = Vec::with_capacity(preset.steps.len());
        let mut previous_id: Option<String> = None;

        for (index, preset_step) in preset.steps.iter().enumerate() {
            let mut step = Step::new(format!("{}-{}", preset.id, index + 1), &preset_step.prompt)
                .with_name(&preset_step.name)
                .with_action(self.classifier.classify(&preset_step.prompt));
            if !preset_step.requires_input {
                step = step.with_dependencies(previous_id.take());
            }

            let model = self.resolve_model(
                preset_step
                    .model
                    .as_deref()
                    .or(options.model.as_deref()),
            );
            let input = if preset_step.requires_input { code } else { current.as_str() };

            let result = self.run_step(&step, input, &options.context, model).await;
            let failed = !result.success;
            if !failed {
                current = result.output.clone();
            }
            results.push(result);
            previous_id = Some(step.id);

            if failed && options.stop_on_error {
                warn!(preset = %preset.id, step = index + 1, "Stopping preset after failed step");
                break;
            }
        }

        let success = results.iter().all(|r| r.success);
        let final_output = last_successful_output(&results);

        self.finish(
            started,
            results,
            final_output,
            success,
            WorkflowDetails::Preset {
                preset_id: preset.id.clone(),
            },
        )
    }
}
