use anyhow::{Context, Result};
use clap::Parser;
use conductor::cli::{Args, Command, OutputFormat};
use conductor::optimizer::{context::context_from_value, OptimizeOptions};
use conductor::{
    get_preset, get_presets, logging, DryRunExecutor, OrchestratorConfig, PresetOptions,
    WorkflowEngine, WorkflowOptimizer,
};
use conductor_sdk::{Step, StepContext};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    let config = OrchestratorConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Presets { format } => {
            let presets = get_presets()?;
            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&presets)?,
                OutputFormat::Yaml => serde_yaml::to_string(&presets)?,
            };
            println!("{}", rendered);
        }

        Command::Optimize {
            steps,
            context,
            remove_redundant,
        } => {
            let steps = read_steps(&steps)?;
            let context = parse_context(context.as_deref())?;

            let optimized = WorkflowOptimizer::new().optimize_workflow(
                &steps,
                &context,
                OptimizeOptions { remove_redundant },
            );
            println!("{}", serde_json::to_string_pretty(&optimized)?);
        }

        Command::Simulate {
            preset,
            code,
            model,
        } => {
            let preset = get_preset(&preset)?;
            let code = std::fs::read_to_string(&code)
                .with_context(|| format!("Failed to read code file {}", code.display()))?;

            let engine = WorkflowEngine::new(Arc::new(DryRunExecutor), config);
            let result = engine
                .run_preset(
                    &preset,
                    &code,
                    &PresetOptions {
                        model,
                        ..Default::default()
                    },
                )
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

/// Steps may be written as JSON or YAML; YAML accepts both
fn read_steps(path: &Path) -> Result<Vec<Step>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read steps file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse steps file {}", path.display()))
}

fn parse_context(raw: Option<&str>) -> Result<StepContext> {
    let Some(raw) = raw else {
        return Ok(StepContext::new());
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).context("Failed to parse --context as JSON")?;
    context_from_value(value).context("--context must be a JSON object")
}
