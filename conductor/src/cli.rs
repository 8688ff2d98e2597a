//! Command-line interface definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Multi-model code transformation orchestrator
///
/// Inspect the built-in presets, optimize a step list into an execution plan,
/// or simulate a preset without calling any model.
#[derive(Parser, Debug, Clone)]
#[command(name = "conductor")]
#[command(about = "Multi-model code transformation orchestrator")]
#[command(version)]
pub struct Args {
    /// Path to a YAML config file
    ///
    /// Defaults to $CONDUCTOR_CONFIG, then the platform config directory.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the built-in presets
    Presets {
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Analyze a step list and print the optimized execution plan
    Optimize {
        /// JSON or YAML file holding a list of steps
        #[arg(long, value_name = "PATH")]
        steps: PathBuf,

        /// Shared context as a JSON object
        #[arg(long, value_name = "JSON")]
        context: Option<String>,

        /// Drop redundant steps before planning
        #[arg(long)]
        remove_redundant: bool,
    },

    /// Run a preset with the dry-run executor
    Simulate {
        #[arg(long, value_name = "ID")]
        preset: String,

        /// File holding the code to transform
        #[arg(long, value_name = "PATH")]
        code: PathBuf,

        /// Model for steps that do not name one
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}
