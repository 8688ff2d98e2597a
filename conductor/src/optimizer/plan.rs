//! Execution plan construction from parallel groups.

use conductor_sdk::{Step, StepContext};
use std::collections::{HashMap, HashSet};

use super::types::{Batch, BatchKind, ExecutionPlan, OptimizationSummary, ParallelGroup, PlannedStep};

/// Build batches by walking `steps` in order.
///
/// `original_indices[i]` is the caller-visible index of `steps[i]`, and group
/// members index into `steps`. Ungrouped steps become singleton sequential
/// batches; the first member reached of a group emits one parallel batch for
/// the whole group.
pub fn build_execution_plan<F>(
    steps: &[Step],
    original_indices: &[usize],
    groups: &[ParallelGroup],
    mut route_context: F,
) -> ExecutionPlan
where
    F: FnMut(usize, &Step) -> StepContext,
{
    let mut group_of: HashMap<usize, usize> = HashMap::new();
    for (group_idx, group) in groups.iter().enumerate() {
        for &member in &group.steps {
            group_of.insert(member, group_idx);
        }
    }

    let mut planned = |position: usize| {
        let step = &steps[position];
        let step_index = original_indices.get(position).copied().unwrap_or(position);
        PlannedStep {
            step_index,
            step: step.clone(),
            context: route_context(step_index, step),
        }
    };

    let mut processed: HashSet<usize> = HashSet::new();
    let mut batches = Vec::new();

    for position in 0..steps.len() {
        if processed.contains(&position) {
            continue;
        }

        match group_of.get(&position) {
            Some(&group_idx) => {
                let members = &groups[group_idx].steps;
                processed.extend(members.iter().copied());
                batches.push(Batch {
                    kind: BatchKind::Parallel,
                    steps: members.iter().map(|&m| planned(m)).collect(),
                });
            }
            None => {
                processed.insert(position);
                batches.push(Batch {
                    kind: BatchKind::Sequential,
                    steps: vec![planned(position)],
                });
            }
        }
    }

    ExecutionPlan { batches }
}

/// Summarize a plan. Potential is "high" when at least half the steps sit in
/// parallel batches, "medium" when any do, "low" otherwise.
pub fn summarize(
    original_steps: usize,
    plan: &ExecutionPlan,
    critical_path: Vec<String>,
) -> OptimizationSummary {
    let optimized_steps = plan.total_steps();
    let total_batches = plan.batches.len();
    let parallel_steps: usize = plan
        .batches
        .iter()
        .filter(|b| b.kind == BatchKind::Parallel)
        .map(|b| b.steps.len())
        .sum();

    let parallelization_potential = if optimized_steps > 0 && parallel_steps * 2 >= optimized_steps
    {
        "high"
    } else if parallel_steps > 0 {
        "medium"
    } else {
        "low"
    };

    let estimated_speedup = if total_batches == 0 {
        1.0
    } else {
        optimized_steps as f64 / total_batches as f64
    };

    OptimizationSummary {
        original_steps,
        optimized_steps,
        total_batches,
        parallel_batches: plan.parallel_batches(),
        critical_path,
        parallelization_potential: parallelization_potential.to_string(),
        estimated_speedup,
    }
}
