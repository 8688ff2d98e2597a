//! Stepwise plan execution through a caller-owned session handle.
//!
//! [`WorkflowEngine::initialize_plan`] produces a [`PlanSession`]; every later
//! call takes that handle explicitly, so one engine can drive any number of
//! sessions at once without them observing each other.

use chrono::{DateTime, Utc};
use conductor_sdk::{Step, StepContext, StepResult, TokenUsage, WorkflowKind};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::WorkflowEngine;
use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub model: Option<String>,
    pub context: StepContext,
}

/// Snapshot taken before a step runs, consumed by [`PlanSession::undo`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct HistoryEntry {
    step_index: usize,
    code_before: String,
    previous_result: Option<StepResult>,
}

/// An initialized plan and everything executed against it so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSession {
    id: Uuid,
    goal: String,
    model: String,
    strategy: String,
    steps: Vec<Step>,
    plan_issues: Vec<String>,
    plan_usage: TokenUsage,
    original_code: String,
    current_code: String,
    context: StepContext,
    /// Latest result per step index
    results: Vec<Option<StepResult>>,
    history: Vec<HistoryEntry>,
    created_at: DateTime<Utc>,
}

/// Progress report for a [`PlanSession`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub session_id: Uuid,
    pub goal: String,
    pub total_steps: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,

    /// Index of the step `execute_next` would run
    pub next_step: Option<usize>,

    pub can_undo: bool,

    /// Planning plus every step result currently recorded
    pub usage: TokenUsage,
}

impl PlanSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Non-fatal findings from plan validation
    pub fn plan_issues(&self) -> &[String] {
        &self.plan_issues
    }

    pub fn current_code(&self) -> &str {
        &self.current_code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn result(&self, index: usize) -> Option<&StepResult> {
        self.results.get(index).and_then(Option::as_ref)
    }

    fn next_pending(&self) -> Option<usize> {
        self.results.iter().position(Option::is_none)
    }

    /// Ids of `step`'s dependencies that have not completed successfully.
    ///
    /// Ids that name no planned step are already reported in `plan_issues`
    /// and count as satisfied, the same way the critical path treats them.
    fn unmet_dependencies(&self, step: &Step) -> Vec<String> {
        step.dependencies
            .iter()
            .filter(|dep| match self.steps.iter().position(|s| &s.id == *dep) {
                Some(index) => !self.result(index).is_some_and(|r| r.success),
                None => false,
            })
            .cloned()
            .collect()
    }

    /// Revert the most recent step: restores the code it started from and
    /// whatever result that step held before. Returns the reverted index.
    pub fn undo(&mut self) -> OrchestratorResult<usize> {
        let entry = self.history.pop().ok_or(OrchestratorError::NothingToUndo)?;
        self.current_code = entry.code_before;
        self.results[entry.step_index] = entry.previous_result;
        info!(session = %self.id, step = entry.step_index, "Undid step");
        Ok(entry.step_index)
    }

    pub fn get_execution_status(&self) -> ExecutionStatus {
        let recorded: Vec<&StepResult> = self.results.iter().flatten().collect();
        let completed = recorded.iter().filter(|r| r.success).count();
        let failed = recorded.len() - completed;

        ExecutionStatus {
            session_id: self.id,
            goal: self.goal.clone(),
            total_steps: self.steps.len(),
            completed,
            failed,
            pending: self.steps.len() - recorded.len(),
            next_step: self.next_pending(),
            can_undo: !self.history.is_empty(),
            usage: self.plan_usage + recorded.iter().map(|r| r.usage).sum::<TokenUsage>(),
        }
    }

    /// Discard all progress and return to the original code
    pub fn reset(&mut self) {
        self.current_code = self.original_code.clone();
        self.results = vec![None; self.steps.len()];
        self.history.clear();
    }
}

impl WorkflowEngine {
    /// Plan `goal` against `code` and return a session ready to step through.
    ///
    /// The `Session` workflow events bracket planning only; stepping emits
    /// per-step events.
    pub async fn initialize_plan(
        &self,
        goal: &str,
        code: &str,
        options: SessionOptions,
    ) -> OrchestratorResult<PlanSession> {
        let planner = self
            .planner
            .as_ref()
            .ok_or(OrchestratorError::MissingCollaborator("planner"))?;
        let model = self.resolve_model(options.model.as_deref()).to_string();
        let started = self.start(WorkflowKind::Session, goal);

        let plan = match planner.create_plan(goal, code, &model).await {
            Ok(plan) if !plan.steps.is_empty() => plan,
            Ok(_) => {
                self.abort(started, WorkflowKind::Session);
                return Err(OrchestratorError::PlanningFailure(
                    "planner returned no steps".to_string(),
                ));
            }
            Err(e) => {
                self.abort(started, WorkflowKind::Session);
                return Err(OrchestratorError::collaborator("Planning", e));
            }
        };

        let validation = planner.validate_plan(&plan);
        for issue in &validation.issues {
            warn!(issue = %issue, "Plan validation issue");
        }

        let session = PlanSession {
            id: Uuid::new_v4(),
            goal: goal.to_string(),
            model,
            strategy: plan.strategy,
            results: vec![None; plan.steps.len()],
            steps: plan.steps,
            plan_issues: validation.issues,
            plan_usage: plan.usage,
            original_code: code.to_string(),
            current_code: code.to_string(),
            context: options.context,
            history: Vec::new(),
            created_at: Utc::now(),
        };

        info!(
            session = %session.id,
            steps = session.steps.len(),
            "Plan session initialized"
        );
        self.close(started, WorkflowKind::Session, true);
        Ok(session)
    }

    /// Run the first step that has not been attempted yet
    pub async fn execute_next(&self, session: &mut PlanSession) -> OrchestratorResult<StepResult> {
        let index = session
            .next_pending()
            .ok_or(OrchestratorError::PlanExhausted)?;
        self.execute_step_by_index(session, index).await
    }

    /// Run one step against the session's current code.
    ///
    /// Refused unless every dependency has a successful result. Re-running a
    /// step replaces its previous result; `undo` restores it.
    pub async fn execute_step_by_index(
        &self,
        session: &mut PlanSession,
        index: usize,
    ) -> OrchestratorResult<StepResult> {
        let step = session
            .steps
            .get(index)
            .ok_or(OrchestratorError::StepIndexOutOfRange {
                index,
                len: session.steps.len(),
            })?;

        let missing = session.unmet_dependencies(step);
        if !missing.is_empty() {
            return Err(OrchestratorError::UnmetDependencies {
                step_id: step.id.clone(),
                missing,
            });
        }

        let result = self
            .run_step(step, &session.current_code, &session.context, &session.model)
            .await;

        let code_before = if let Some(output) = result.successful_output() {
            std::mem::replace(&mut session.current_code, output.to_string())
        } else {
            session.current_code.clone()
        };
        session.history.push(HistoryEntry {
            step_index: index,
            code_before,
            previous_result: session.results[index].replace(result.clone()),
        });

        Ok(result)
    }
}
