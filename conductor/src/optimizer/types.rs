//! Data types produced by the workflow optimizer.
//!
//! 1. **Analysis** - redundancy, bottleneck, parallelism and context findings
//! 2. **Execution Plan** - ordered sequential/parallel batches
//! 3. **Summary** - headline numbers for a plan
//! 4. **Metrics** - cumulative optimizer counters

use conductor_sdk::{Step, StepContext};
use serde::{Deserialize, Serialize};

// ============================================================================
// Analysis Types
// ============================================================================

/// A step whose signature matches an earlier step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedundantStep {
    /// Index of the repeated step
    pub step_index: usize,

    /// Index of the first step with the same signature
    pub duplicate_of: usize,

    pub reason: String,
}

/// A step that gates too many later steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub step_index: usize,
    pub step_id: String,

    /// Number of later steps listing this one as a dependency
    pub dependent_count: usize,

    pub reason: String,
    pub suggestion: String,
}

/// Steps sharing an identical dependency set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelGroup {
    /// Member step indices, ascending
    pub steps: Vec<usize>,

    /// The shared dependency ids, sorted
    pub dependencies: Vec<String>,

    /// Upper bound on the speedup (group size)
    pub expected_speedup: f64,
}

/// Per-step context trimming recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecommendation {
    pub step_index: usize,

    /// Keys kept for this step that exist in the context
    pub essential_keys: Vec<String>,

    /// Keys dropped for this step
    pub removed_keys: Vec<String>,

    /// Serialized size of the full context in bytes
    pub original_size: usize,

    /// Serialized size of the reduced context in bytes
    pub reduced_size: usize,

    /// `1 - reduced/original`, 0 when the context is empty
    pub reduction: f64,
}

/// Complete analysis of a step list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizationAnalysis {
    #[serde(default)]
    pub redundancy: Vec<RedundantStep>,

    #[serde(default)]
    pub bottlenecks: Vec<Bottleneck>,

    #[serde(default)]
    pub parallel_groups: Vec<ParallelGroup>,

    #[serde(default)]
    pub context_optimization: Vec<ContextRecommendation>,
}

// ============================================================================
// Execution Plan Types
// ============================================================================

/// How a batch's steps run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Sequential,
    Parallel,
}

/// A step scheduled inside a batch, with its routed context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    /// Index in the caller's original step list
    pub step_index: usize,

    pub step: Step,

    pub context: StepContext,
}

/// Single batch of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(rename = "type")]
    pub kind: BatchKind,

    pub steps: Vec<PlannedStep>,
}

/// Ordered batches; a parallel batch executes as one unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    #[serde(default)]
    pub batches: Vec<Batch>,
}

impl ExecutionPlan {
    pub fn total_steps(&self) -> usize {
        self.batches.iter().map(|b| b.steps.len()).sum()
    }

    pub fn parallel_batches(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.kind == BatchKind::Parallel)
            .count()
    }
}

// ============================================================================
// Summary Types
// ============================================================================

/// Headline numbers for an optimized workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub original_steps: usize,
    pub optimized_steps: usize,
    pub total_batches: usize,
    pub parallel_batches: usize,

    /// Longest dependency chain, by step id
    #[serde(default)]
    pub critical_path: Vec<String>,

    /// Parallelization potential (low, medium, high)
    pub parallelization_potential: String,

    /// `optimized_steps / total_batches`
    pub estimated_speedup: f64,
}

/// Output of [`WorkflowOptimizer::optimize_workflow`](super::WorkflowOptimizer::optimize_workflow)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedWorkflow {
    /// Steps kept, in original order, with bottleneck flags set
    pub steps: Vec<Step>,

    /// Analysis of the original, unfiltered list
    pub analysis: OptimizationAnalysis,

    pub execution_plan: ExecutionPlan,

    pub summary: OptimizationSummary,
}

/// Caller choices for [`WorkflowOptimizer::optimize_workflow`](super::WorkflowOptimizer::optimize_workflow)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptimizeOptions {
    /// Drop steps reported as redundant before planning
    #[serde(default)]
    pub remove_redundant: bool,
}

/// Cumulative optimizer counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptimizerMetrics {
    pub redundancy_detections: u64,
    pub bottlenecks_identified: u64,
    pub async_optimizations: u64,
    pub context_reductions: u64,
}
