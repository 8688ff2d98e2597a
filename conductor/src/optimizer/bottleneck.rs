//! Fan-out bottleneck detection.

use conductor_sdk::Step;

use super::types::Bottleneck;

/// Number of dependents at which a step is flagged
pub const BOTTLENECK_THRESHOLD: usize = 3;

/// Flag steps that three or more later steps depend on
pub fn detect_bottlenecks(steps: &[Step]) -> Vec<Bottleneck> {
    steps
        .iter()
        .enumerate()
        .filter_map(|(index, step)| {
            let dependent_count = steps[index + 1..]
                .iter()
                .filter(|later| later.dependencies.iter().any(|dep| dep == &step.id))
                .count();

            (dependent_count >= BOTTLENECK_THRESHOLD).then(|| Bottleneck {
                step_index: index,
                step_id: step.id.clone(),
                dependent_count,
                reason: format!("{} subsequent steps wait on '{}'", dependent_count, step.id),
                suggestion: format!(
                    "Split '{}' into smaller steps so dependents can start earlier",
                    step.id
                ),
            })
        })
        .collect()
}
