//! Duplicate step detection.

use conductor_sdk::Step;
use std::collections::HashMap;

use super::types::RedundantStep;

/// Normalized `(type, description, target)` triple identifying a step's work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepSignature {
    kind: String,
    description: String,
    target: String,
}

impl StepSignature {
    pub fn of(step: &Step) -> Self {
        Self {
            kind: step.type_or_action().to_string(),
            description: step.description.trim().to_lowercase(),
            target: step.target.clone().unwrap_or_default(),
        }
    }
}

/// Report every step whose signature was already seen. Nothing is removed.
pub fn detect_redundancy(steps: &[Step]) -> Vec<RedundantStep> {
    let mut first_seen: HashMap<StepSignature, usize> = HashMap::new();
    let mut redundant = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        let signature = StepSignature::of(step);
        match first_seen.get(&signature) {
            Some(&original) => redundant.push(RedundantStep {
                step_index: index,
                duplicate_of: original,
                reason: format!(
                    "Step '{}' repeats the work of step '{}'",
                    step.id, steps[original].id
                ),
            }),
            None => {
                first_seen.insert(signature, index);
            }
        }
    }

    redundant
}
