//! Pre-execution workflow optimizer.
//!
//! Pure analysis over a step list: nothing here performs I/O. The only state
//! is a set of monotonically increasing counters, reset by [`WorkflowOptimizer::clear_cache`].
//!
//! ## Module Structure
//!
//! - `types` - Analysis, plan and metrics data structures
//! - `redundancy` - Duplicate step detection
//! - `bottleneck` - Fan-out bottleneck detection
//! - `parallel` - Parallel group discovery and critical path
//! - `context` - Essential-context reduction
//! - `plan` - Batch plan construction

pub mod bottleneck;
pub mod context;
pub mod parallel;
pub mod plan;
pub mod redundancy;
pub mod types;

use conductor_sdk::{BottleneckInfo, Step, StepContext};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::classify::{ContextKeySelector, SubstringKeySelector};

pub use types::*;

#[derive(Debug, Default)]
struct Counters {
    redundancy_detections: AtomicU64,
    bottlenecks_identified: AtomicU64,
    async_optimizations: AtomicU64,
    context_reductions: AtomicU64,
}

/// Analyzes step lists and turns them into batched execution plans
pub struct WorkflowOptimizer {
    selector: Arc<dyn ContextKeySelector>,
    counters: Counters,
}

impl Default for WorkflowOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowOptimizer {
    pub fn new() -> Self {
        Self::with_selector(Arc::new(SubstringKeySelector))
    }

    pub fn with_selector(selector: Arc<dyn ContextKeySelector>) -> Self {
        Self {
            selector,
            counters: Counters::default(),
        }
    }

    /// Run every analysis over `steps`. Recomputed on each call.
    pub fn analyze(&self, steps: &[Step], context: &StepContext) -> OptimizationAnalysis {
        let redundancy = redundancy::detect_redundancy(steps);
        let bottlenecks = bottleneck::detect_bottlenecks(steps);
        let parallel_groups = parallel::find_parallel_groups(steps);
        let context_optimization: Vec<ContextRecommendation> = steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                context::reduce_context(index, step, context, self.selector.as_ref()).1
            })
            .collect();

        let reduced = context_optimization
            .iter()
            .filter(|rec| rec.reduction > 0.0)
            .count();

        self.bump(&self.counters.redundancy_detections, redundancy.len());
        self.bump(&self.counters.bottlenecks_identified, bottlenecks.len());
        self.bump(&self.counters.async_optimizations, parallel_groups.len());
        self.bump(&self.counters.context_reductions, reduced);

        debug!(
            steps = steps.len(),
            redundant = redundancy.len(),
            bottlenecks = bottlenecks.len(),
            groups = parallel_groups.len(),
            "Workflow analysis complete"
        );

        OptimizationAnalysis {
            redundancy,
            bottlenecks,
            parallel_groups,
            context_optimization,
        }
    }

    /// Analyze, optionally drop redundant steps, and build the batch plan.
    ///
    /// Plan step indices refer to positions in the original `steps`.
    pub fn optimize_workflow(
        &self,
        steps: &[Step],
        context: &StepContext,
        options: OptimizeOptions,
    ) -> OptimizedWorkflow {
        let analysis = self.analyze(steps, context);

        let dropped: HashSet<usize> = if options.remove_redundant {
            analysis.redundancy.iter().map(|r| r.step_index).collect()
        } else {
            HashSet::new()
        };

        let (original_indices, kept): (Vec<usize>, Vec<Step>) = steps
            .iter()
            .enumerate()
            .filter(|(index, _)| !dropped.contains(index))
            .map(|(index, step)| (index, flag_bottleneck(index, step, &analysis.bottlenecks)))
            .unzip();

        let groups = parallel::find_parallel_groups(&kept);
        let selector = self.selector.as_ref();
        // Route from the unflagged step: bottleneck suggestions must not
        // change which keys match.
        let execution_plan =
            plan::build_execution_plan(&kept, &original_indices, &groups, |index, _| {
                context::reduce_context(index, &steps[index], context, selector).0
            });

        let summary = plan::summarize(steps.len(), &execution_plan, parallel::critical_path(&kept));

        OptimizedWorkflow {
            steps: kept,
            analysis,
            execution_plan,
            summary,
        }
    }

    /// The reduced context a single step should receive
    pub fn essential_context(&self, step: &Step, context: &StepContext) -> StepContext {
        context::essential_context(step, context, self.selector.as_ref())
    }

    pub fn metrics(&self) -> OptimizerMetrics {
        OptimizerMetrics {
            redundancy_detections: self.counters.redundancy_detections.load(Ordering::Relaxed),
            bottlenecks_identified: self.counters.bottlenecks_identified.load(Ordering::Relaxed),
            async_optimizations: self.counters.async_optimizations.load(Ordering::Relaxed),
            context_reductions: self.counters.context_reductions.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn clear_cache(&self) {
        self.counters.redundancy_detections.store(0, Ordering::Relaxed);
        self.counters.bottlenecks_identified.store(0, Ordering::Relaxed);
        self.counters.async_optimizations.store(0, Ordering::Relaxed);
        self.counters.context_reductions.store(0, Ordering::Relaxed);
    }

    fn bump(&self, counter: &AtomicU64, by: usize) {
        counter.fetch_add(by as u64, Ordering::Relaxed);
    }
}

fn flag_bottleneck(index: usize, step: &Step, bottlenecks: &[Bottleneck]) -> Step {
    let mut step = step.clone();
    if let Some(found) = bottlenecks.iter().find(|b| b.step_index == index) {
        step.is_bottleneck = true;
        step.bottleneck_info = Some(BottleneckInfo {
            dependent_count: found.dependent_count,
            suggestion: found.suggestion.clone(),
        });
    }
    step
}
