//! Error taxonomy for the orchestration engine.
//!
//! Per-step failures never show up here: they are recorded as failed
//! [`StepResult`](conductor_sdk::StepResult) entries. Only conditions that
//! abort a whole operation become an `OrchestratorError`.

use thiserror::Error;

pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The planner returned no steps
    #[error("Planning failed: {0}")]
    PlanningFailure(String),

    /// A collaborator call failed in a phase that cannot recover locally
    #[error("{phase} failed: {source}")]
    Collaborator {
        phase: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("No {0} configured for this engine")]
    MissingCollaborator(&'static str),

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("At least one model is required")]
    NoModels,

    #[error("Step index {index} out of range (plan has {len} steps)")]
    StepIndexOutOfRange { index: usize, len: usize },

    #[error("Step '{step_id}' has unmet dependencies: {}", missing.join(", "))]
    UnmetDependencies { step_id: String, missing: Vec<String> },

    #[error("All plan steps have been executed")]
    PlanExhausted,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl OrchestratorError {
    pub fn collaborator(phase: &'static str, source: anyhow::Error) -> Self {
        OrchestratorError::Collaborator { phase, source }
    }
}
