//! Essential-context reduction.

use conductor_sdk::{Step, StepContext};
use serde_json::Value;

use crate::classify::ContextKeySelector;

use super::types::ContextRecommendation;

fn serialized_len(context: &StepContext) -> usize {
    serde_json::to_string(context).map(|s| s.len()).unwrap_or(0)
}

/// Reduce `context` to the keys relevant to `step`.
///
/// Returns the reduced context together with the recommendation describing
/// what was kept and how much smaller the serialized form became.
pub fn reduce_context(
    step_index: usize,
    step: &Step,
    context: &StepContext,
    selector: &dyn ContextKeySelector,
) -> (StepContext, ContextRecommendation) {
    let step_text = serde_json::to_string(step).unwrap_or_else(|_| step.description.clone());
    let wanted = selector.essential_keys(&step_text, context);

    let mut reduced = StepContext::new();
    let mut removed_keys = Vec::new();
    for (key, value) in context {
        if wanted.contains(key) {
            reduced.insert(key.clone(), value.clone());
        } else {
            removed_keys.push(key.clone());
        }
    }

    let original_size = serialized_len(context);
    let reduced_size = serialized_len(&reduced);
    let reduction = if original_size == 0 {
        0.0
    } else {
        1.0 - reduced_size as f64 / original_size as f64
    };

    let recommendation = ContextRecommendation {
        step_index,
        essential_keys: reduced.keys().cloned().collect(),
        removed_keys,
        original_size,
        reduced_size,
        reduction,
    };

    (reduced, recommendation)
}

/// Convenience for callers that only want the reduced map
pub fn essential_context(
    step: &Step,
    context: &StepContext,
    selector: &dyn ContextKeySelector,
) -> StepContext {
    reduce_context(0, step, context, selector).0
}

/// Wrap a plain value map, used by callers building contexts from JSON
pub fn context_from_value(value: Value) -> Option<StepContext> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
