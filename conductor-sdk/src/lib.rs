//! Shared contracts for conductor workflows.
//!
//! Executors, planners, reviewers and context managers implement the traits
//! in [`collaborators`]; the engine crate consumes them and reports progress
//! through [`OrchestratorEvent`].

pub mod collaborators;
pub mod types;

pub use collaborators::{
    ChainContext, ChainContextMetadata, ChainStep, ContextManager, ContextMetadata,
    ExecuteOptions, ExecutionOutcome, Plan, PlanValidation, Planner, ProcessedContext, Refinement,
    Review, Reviewer, StepExecutor,
};
pub use types::{
    BottleneckInfo, Complexity, Priority, Step, StepAction, StepContext, StepResult, TokenUsage,
};

// Re-export async trait for convenience
pub use async_trait::async_trait;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracing target used for structured lifecycle events
pub const EVENT_TARGET: &str = "conductor::events";

/// Execution topology of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Preset,
    Custom,
    Comparison,
    Chain,
    Mesh,
    Plan,
    Session,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowKind::Preset => "preset",
            WorkflowKind::Custom => "custom",
            WorkflowKind::Comparison => "comparison",
            WorkflowKind::Chain => "chain",
            WorkflowKind::Mesh => "mesh",
            WorkflowKind::Plan => "plan",
            WorkflowKind::Session => "session",
        };
        f.write_str(name)
    }
}

/// Structured lifecycle events emitted while workflows run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    WorkflowStarted {
        kind: WorkflowKind,
        description: String,
    },
    WorkflowCompleted {
        kind: WorkflowKind,
        success: bool,
        duration_ms: u64,
    },
    StepStarted {
        step_id: String,
        model: String,
        description: String,
    },
    StepCompleted {
        step_id: String,
        model: String,
        duration_ms: u64,
    },
    StepFailed {
        step_id: String,
        model: String,
        error: String,
    },
    BatchStarted {
        batch: usize,
        total_batches: usize,
        steps: usize,
        parallel: bool,
    },
    BatchCompleted {
        batch: usize,
        failures: usize,
    },
    RoundStarted {
        round: usize,
        total_rounds: usize,
    },
    /// A mesh participant had no peer output to react to
    ModelSkipped {
        model: String,
        round: usize,
        reason: String,
    },
    ContextOptimized {
        original_tokens: usize,
        optimized_tokens: usize,
        compression_ratio: f64,
    },
}

impl OrchestratorEvent {
    /// Emit this event as a JSON line through `tracing`
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            tracing::info!(target: EVENT_TARGET, "{}", json);
        }
    }
}
