//! Token usage aggregation across steps and workflow phases.

use conductor_sdk::{StepResult, TokenUsage};

/// Anything that may report token usage
pub trait UsageSource {
    fn usage(&self) -> Option<&TokenUsage>;
}

impl UsageSource for StepResult {
    fn usage(&self) -> Option<&TokenUsage> {
        Some(&self.usage)
    }
}

impl UsageSource for TokenUsage {
    fn usage(&self) -> Option<&TokenUsage> {
        Some(self)
    }
}

impl<T: UsageSource> UsageSource for Option<T> {
    fn usage(&self) -> Option<&TokenUsage> {
        self.as_ref().and_then(UsageSource::usage)
    }
}

/// Sum usage over a list of results. An empty list yields all zeros.
pub fn aggregate_usage<T: UsageSource>(items: &[T]) -> TokenUsage {
    items.iter().filter_map(UsageSource::usage).sum()
}

/// Sum the plan, execution and review phases, skipping any that did not run
pub fn aggregate_phase_usage(
    plan: Option<&TokenUsage>,
    execution: Option<&TokenUsage>,
    review: Option<&TokenUsage>,
) -> TokenUsage {
    [plan, execution, review].into_iter().flatten().sum()
}
