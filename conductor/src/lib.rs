//! Multi-model code transformation orchestrator.
//!
//! [`WorkflowEngine`] sequences steps across interchangeable model executors
//! using one of several topologies (preset, custom plan/execute/review/refine,
//! comparison, chain, mesh, optimizer plan, stepwise session).
//! [`WorkflowOptimizer`] restructures a step list into sequential and parallel
//! batches before execution.

// Text classifiers behind the runners and the optimizer
pub mod classify;

pub mod cli;

pub mod config;

pub mod dry_run;

pub mod error;

// Lifecycle event fan-out
pub mod events;

pub mod logging;

// Step list analysis and batch planning
pub mod optimizer;

pub mod presets;

pub mod usage;

// Topologies
pub mod workflow;

// Shared execution helpers
pub mod workflow_utils;

pub use classify::{ActionClassifier, ContextKeySelector, KeywordClassifier, SubstringKeySelector};
pub use config::OrchestratorConfig;
pub use dry_run::DryRunExecutor;
pub use error::{OrchestratorError, OrchestratorResult};
pub use optimizer::WorkflowOptimizer;
pub use presets::{get_preset, get_presets, Preset, PresetStep};
pub use usage::{aggregate_phase_usage, aggregate_usage};
pub use workflow::{
    ChainOptions, ComparisonOptions, CustomOptions, ExecutionStatus, MeshOptions, PlanRunOptions,
    PlanSession, PresetOptions, SessionOptions, WorkflowDetails, WorkflowEngine, WorkflowResult,
};
