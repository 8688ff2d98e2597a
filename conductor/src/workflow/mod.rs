//! Workflow engine and its execution topologies.
//!
//! Every topology returns the same [`WorkflowResult`] shape. Step execution is
//! always delegated to the configured [`StepExecutor`]; this layer only
//! sequences calls, records outcomes and aggregates usage.
//!
//! ## Module Structure
//!
//! - `preset` - Fixed, named step lists
//! - `custom` - Plan, execute, review, refine
//! - `comparison` - Same task against N models independently
//! - `chain` - N models in sequence, output piped to input
//! - `mesh` - N models over R rounds exchanging outputs
//! - `plan` - Batch-by-batch execution of an optimizer plan
//! - `session` - Stepwise execution through an explicit session handle

pub mod chain;
pub mod comparison;
pub mod custom;
pub mod mesh;
pub mod plan;
pub mod preset;
pub mod session;

use conductor_sdk::{
    ChainContextMetadata, ContextManager, ContextMetadata, OrchestratorEvent, Planner, Reviewer,
    Step, StepContext, StepExecutor, StepResult, TokenUsage, WorkflowKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::classify::{ActionClassifier, KeywordClassifier};
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorResult;
use crate::events::EventSink;
use crate::optimizer::WorkflowOptimizer;
use crate::presets::{self, Preset};
use crate::usage::aggregate_usage;
use crate::workflow_utils::execute_step_logged;

pub use chain::ChainOptions;
pub use comparison::ComparisonOptions;
pub use custom::CustomOptions;
pub use mesh::{MeshLog, MeshMessage, MeshOptions, ModelState};
pub use plan::PlanRunOptions;
pub use preset::PresetOptions;
pub use session::{ExecutionStatus, PlanSession, SessionOptions};

// ============================================================================
// Result Types
// ============================================================================

/// Topology-specific extras attached to a [`WorkflowResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowDetails {
    Preset {
        preset_id: String,
    },
    Custom {
        strategy: String,
        /// Non-fatal plan validation findings
        #[serde(default)]
        plan_issues: Vec<String>,
        /// Present when context pre-optimization ran
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_optimization: Option<ContextMetadata>,
        /// Redundant planned steps dropped before execution
        #[serde(default)]
        skipped_steps: usize,
        #[serde(default)]
        review_issues: Vec<String>,
        /// Whether refined code was adopted
        #[serde(default)]
        refined: bool,
    },
    Comparison {
        models: Vec<String>,
    },
    Chain {
        models: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        routing: Option<ChainContextMetadata>,
    },
    Mesh {
        iterations: usize,
        models: Vec<ModelState>,
        log: MeshLog,
    },
    Plan {
        batches: usize,
        parallel_batches: usize,
    },
}

impl WorkflowDetails {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            WorkflowDetails::Preset { .. } => WorkflowKind::Preset,
            WorkflowDetails::Custom { .. } => WorkflowKind::Custom,
            WorkflowDetails::Comparison { .. } => WorkflowKind::Comparison,
            WorkflowDetails::Chain { .. } => WorkflowKind::Chain,
            WorkflowDetails::Mesh { .. } => WorkflowKind::Mesh,
            WorkflowDetails::Plan { .. } => WorkflowKind::Plan,
        }
    }
}

/// Aggregate outcome of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Every attempted step, in execution order
    pub results: Vec<StepResult>,

    /// Output of the last successful step, if any
    pub final_output: Option<String>,

    pub success: bool,

    /// Wall-clock duration of the whole run
    pub duration_ms: u64,

    pub total_usage: TokenUsage,

    pub details: WorkflowDetails,
}

impl WorkflowResult {
    pub fn kind(&self) -> WorkflowKind {
        self.details.kind()
    }

    pub fn failed_results(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Output of the last successful result, carried forward across failures
pub fn last_successful_output(results: &[StepResult]) -> Option<String> {
    results
        .iter()
        .rev()
        .find_map(|r| r.successful_output().map(str::to_string))
}

// ============================================================================
// Engine
// ============================================================================

/// Orchestration engine. Holds collaborators and configuration only, so one
/// instance can serve concurrent workflows; stepwise state lives in
/// [`PlanSession`] handles owned by the caller.
pub struct WorkflowEngine {
    executor: Arc<dyn StepExecutor>,
    planner: Option<Arc<dyn Planner>>,
    reviewer: Option<Arc<dyn Reviewer>>,
    context_manager: Option<Arc<dyn ContextManager>>,
    optimizer: Arc<WorkflowOptimizer>,
    classifier: Arc<dyn ActionClassifier>,
    config: OrchestratorConfig,
    events: EventSink,
}

impl WorkflowEngine {
    pub fn new(executor: Arc<dyn StepExecutor>, config: OrchestratorConfig) -> Self {
        Self {
            executor,
            planner: None,
            reviewer: None,
            context_manager: None,
            optimizer: Arc::new(WorkflowOptimizer::new()),
            classifier: Arc::new(KeywordClassifier),
            config,
            events: EventSink::new(),
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn Reviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_context_manager(mut self, context_manager: Arc<dyn ContextManager>) -> Self {
        self.context_manager = Some(context_manager);
        self
    }

    /// Share an optimizer (and its metrics) with other engines
    pub fn with_optimizer(mut self, optimizer: Arc<WorkflowOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ActionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn optimizer(&self) -> &WorkflowOptimizer {
        &self.optimizer
    }

    /// Live lifecycle events from this engine
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Built-in named workflows
    pub fn get_presets(&self) -> OrchestratorResult<Vec<Preset>> {
        presets::get_presets()
    }

    fn resolve_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.config.default_model)
    }

    async fn run_step(
        &self,
        step: &Step,
        code: &str,
        context: &StepContext,
        model: &str,
    ) -> StepResult {
        execute_step_logged(
            self.executor.as_ref(),
            &self.events,
            step,
            code,
            context,
            model,
        )
        .await
    }

    fn start(&self, kind: WorkflowKind, description: impl Into<String>) -> Instant {
        self.events.emit(OrchestratorEvent::WorkflowStarted {
            kind,
            description: description.into(),
        });
        Instant::now()
    }

    fn finish(
        &self,
        started: Instant,
        results: Vec<StepResult>,
        final_output: Option<String>,
        success: bool,
        details: WorkflowDetails,
    ) -> WorkflowResult {
        let duration_ms = self.close(started, details.kind(), success);

        WorkflowResult {
            total_usage: aggregate_usage(&results),
            results,
            final_output,
            success,
            duration_ms,
            details,
        }
    }

    /// Close a workflow that ended with an error so every start is paired
    fn abort(&self, started: Instant, kind: WorkflowKind) {
        self.close(started, kind, false);
    }

    fn close(&self, started: Instant, kind: WorkflowKind, success: bool) -> u64 {
        let duration_ms = started.elapsed().as_millis() as u64;
        self.events.emit(OrchestratorEvent::WorkflowCompleted {
            kind,
            success,
            duration_ms,
        });
        duration_ms
    }
}
