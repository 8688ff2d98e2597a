//! Text classifiers used by the runners and the optimizer.
//!
//! Both are keyword heuristics hidden behind traits so a real intent model can
//! replace them without touching orchestration code.

use conductor_sdk::{StepAction, StepContext};
use std::collections::BTreeSet;

/// Context keys every step keeps regardless of relevance
pub const ALWAYS_ESSENTIAL_KEYS: [&str; 3] = ["prompt", "task", "goal"];

/// Maps free-form task text to a [`StepAction`]
pub trait ActionClassifier: Send + Sync {
    fn classify(&self, text: &str) -> StepAction;
}

/// Case-insensitive substring match over the action names, first hit wins
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl ActionClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> StepAction {
        let lowered = text.to_lowercase();
        StepAction::ALL
            .into_iter()
            .find(|action| lowered.contains(action.as_str()))
            .unwrap_or_default()
    }
}

/// Picks the context keys a step actually needs
pub trait ContextKeySelector: Send + Sync {
    fn essential_keys(&self, step_text: &str, context: &StepContext) -> BTreeSet<String>;
}

/// Keeps the always-essential keys plus any key named somewhere in the step text
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringKeySelector;

impl ContextKeySelector for SubstringKeySelector {
    fn essential_keys(&self, step_text: &str, context: &StepContext) -> BTreeSet<String> {
        let haystack = step_text.to_lowercase();
        let mut keys: BTreeSet<String> = ALWAYS_ESSENTIAL_KEYS
            .iter()
            .map(|k| k.to_string())
            .collect();

        keys.extend(
            context
                .keys()
                .filter(|key| haystack.contains(&key.to_lowercase()))
                .cloned(),
        );
        keys
    }
}
