//! Contracts for the external services the engine delegates to.
//!
//! The engine never talks to a model provider directly. Step execution,
//! planning, review and context shaping are all behind these traits so that
//! concrete clients can be swapped without touching orchestration logic.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::{Step, StepAction, StepContext, StepResult, TokenUsage};

// ============================================================================
// Step Executor
// ============================================================================

/// Options for [`StepExecutor::execute_steps`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteOptions {
    pub model: String,

    /// Stop at the first failed step
    pub stop_on_error: bool,

    /// Dry run: outputs are recorded but never adopted as the running code
    pub read_only: bool,
}

/// Aggregate returned by [`StepExecutor::execute_steps`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub results: Vec<StepResult>,
    pub final_code: String,
    pub success_count: usize,
}

/// Runs a single step against one model.
///
/// Returning `Ok` with `success == false` and returning `Err` are both treated
/// as a step failure by the runners; only the custom workflow propagates an
/// `Err` from `execute_steps`.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute_step(
        &self,
        step: &Step,
        code: &str,
        context: &StepContext,
        model: &str,
    ) -> Result<StepResult>;

    /// Execute steps in order, piping each successful output into the next.
    async fn execute_steps(
        &self,
        steps: &[Step],
        code: &str,
        context: &StepContext,
        options: &ExecuteOptions,
    ) -> Result<ExecutionOutcome> {
        let mut results = Vec::with_capacity(steps.len());
        let mut current = code.to_string();

        for step in steps {
            let result = match self
                .execute_step(step, &current, context, &options.model)
                .await
            {
                Ok(result) => result,
                Err(e) => StepResult::failure(&step.id, e.to_string()).with_model(&options.model),
            };

            let failed = !result.success;
            if result.success && !options.read_only {
                current = result.output.clone();
            }
            results.push(result);

            if failed && options.stop_on_error {
                break;
            }
        }

        let success_count = results.iter().filter(|r| r.success).count();
        Ok(ExecutionOutcome {
            results,
            final_code: current,
            success_count,
        })
    }
}

// ============================================================================
// Planner
// ============================================================================

/// Step list produced by a planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default)]
    pub strategy: String,

    #[serde(default)]
    pub usage: TokenUsage,
}

/// Structural checks over a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanValidation {
    pub valid: bool,

    #[serde(default)]
    pub issues: Vec<String>,

    pub step_count: usize,
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn create_plan(&self, goal: &str, code: &str, model: &str) -> Result<Plan>;

    /// Checks for an empty plan, duplicate ids and dangling dependencies.
    fn validate_plan(&self, plan: &Plan) -> PlanValidation {
        let mut issues = Vec::new();

        if plan.steps.is_empty() {
            issues.push("Plan contains no steps".to_string());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &plan.steps {
            if !seen.insert(step.id.as_str()) {
                issues.push(format!("Duplicate step id '{}'", step.id));
            }
        }

        for step in &plan.steps {
            for dep in &step.dependencies {
                if !seen.contains(dep.as_str()) {
                    issues.push(format!(
                        "Step '{}' depends on unknown step '{}'",
                        step.id, dep
                    ));
                }
                if dep == &step.id {
                    issues.push(format!("Step '{}' depends on itself", step.id));
                }
            }
        }

        PlanValidation {
            valid: issues.is_empty(),
            issues,
            step_count: plan.steps.len(),
        }
    }
}

// ============================================================================
// Reviewer
// ============================================================================

/// Issues found by a reviewer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub issues: Vec<String>,

    #[serde(default)]
    pub usage: TokenUsage,
}

/// Result of a refinement pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refinement {
    pub refined_code: String,

    /// Whether the refiner believes the code got better
    pub improved: bool,
}

#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(
        &self,
        goal: &str,
        code: &str,
        history: &[StepResult],
        model: &str,
    ) -> Result<Review>;

    async fn refine(&self, code: &str, issues: &[String], model: &str) -> Result<Refinement>;
}

// ============================================================================
// Context Manager
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextMetadata {
    #[serde(default)]
    pub compression_ratio: f64,

    #[serde(default)]
    pub original_tokens: usize,

    #[serde(default)]
    pub optimized_tokens: usize,

    #[serde(default)]
    pub chunks_used: usize,
}

/// Token-bounded context for a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedContext {
    pub context: String,

    #[serde(default)]
    pub metadata: ContextMetadata,
}

/// One link of a model chain, as seen by the context router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStep {
    pub id: String,
    pub model: String,
    pub description: String,

    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChainContextMetadata {
    #[serde(default)]
    pub total_chunks: usize,

    #[serde(default)]
    pub reuse_efficiency: f64,
}

/// Per-step routed context, keyed by chain step id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChainContext {
    #[serde(default)]
    pub context_map: HashMap<String, String>,

    #[serde(default)]
    pub metadata: ChainContextMetadata,
}

#[async_trait]
pub trait ContextManager: Send + Sync {
    async fn process_context(
        &self,
        raw_context: &str,
        task: &str,
        task_type: StepAction,
        max_tokens: usize,
    ) -> Result<ProcessedContext>;

    async fn process_chain_context(
        &self,
        raw_context: &str,
        chain_steps: &[ChainStep],
        global_context: &StepContext,
    ) -> Result<ChainContext>;
}
