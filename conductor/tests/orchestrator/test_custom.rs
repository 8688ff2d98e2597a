//! Tests for the plan → execute → review → refine workflow

use super::common::*;
use conductor::{CustomOptions, OrchestratorConfig, OrchestratorError, WorkflowDetails};
use conductor_sdk::{Step, TokenUsage};
use std::sync::Arc;

fn two_steps() -> Vec<Step> {
    vec![
        Step::new("s0", "Analyze structure"),
        Step::new("s1", "Refactor loops").with_dependencies(["s0"]),
    ]
}

fn reviewer(improved: bool) -> Arc<ScriptedReviewer> {
    Arc::new(ScriptedReviewer {
        issues: vec!["missing docs".to_string()],
        refined_code: "refined".to_string(),
        improved,
    })
}

#[tokio::test]
async fn test_custom_requires_planner() {
    let engine = engine(Arc::new(ScriptedExecutor::new()));
    let err = engine
        .execute_custom("goal", "code", CustomOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::MissingCollaborator("planner")));
}

#[tokio::test]
async fn test_empty_plan_is_planning_failure() {
    let executor = Arc::new(ScriptedExecutor::new());
    let engine = engine(executor.clone()).with_planner(Arc::new(ScriptedPlanner::with_steps(vec![])));

    let err = engine
        .execute_custom("goal", "code", CustomOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::PlanningFailure(_)));
    assert!(executor.calls().is_empty());
}

#[tokio::test]
async fn test_planner_error_propagates() {
    let engine = engine(Arc::new(ScriptedExecutor::new()))
        .with_planner(Arc::new(ScriptedPlanner::failing()));

    let err = engine
        .execute_custom("goal", "code", CustomOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Collaborator { phase: "Planning", .. }));
    assert!(err.to_string().contains("planner offline"));
}

#[tokio::test]
async fn test_full_protocol_adopts_improved_refinement() {
    let executor = Arc::new(ScriptedExecutor::new());
    let engine = engine(executor.clone())
        .with_planner(Arc::new(ScriptedPlanner::with_steps(two_steps())))
        .with_reviewer(reviewer(true));

    let result = engine
        .execute_custom(
            "Tidy up",
            "code",
            CustomOptions {
                review: true,
                refine: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.results.len(), 2);
    assert_eq!(executor.calls()[1].code, "code+default");
    assert_eq!(result.final_output.as_deref(), Some("refined"));
    // plan (100, 50) + two steps (20, 10) + review (20, 10)
    assert_eq!(result.total_usage, TokenUsage::new(140, 70));

    match result.details {
        WorkflowDetails::Custom {
            strategy,
            review_issues,
            refined,
            plan_issues,
            ..
        } => {
            assert_eq!(strategy, "sequential");
            assert_eq!(review_issues, vec!["missing docs".to_string()]);
            assert!(refined);
            assert!(plan_issues.is_empty());
        }
        other => panic!("unexpected details: {:?}", other),
    }
}

#[tokio::test]
async fn test_refinement_without_improvement_keeps_reviewed_code() {
    let engine = engine(Arc::new(ScriptedExecutor::new()))
        .with_planner(Arc::new(ScriptedPlanner::with_steps(two_steps())))
        .with_reviewer(reviewer(false));

    let result = engine
        .execute_custom(
            "Tidy up",
            "code",
            CustomOptions {
                review: true,
                refine: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.final_output.as_deref(), Some("code+default+default"));
}

#[tokio::test]
async fn test_review_skipped_when_not_requested() {
    let engine = engine(Arc::new(ScriptedExecutor::new()))
        .with_planner(Arc::new(ScriptedPlanner::with_steps(two_steps())))
        .with_reviewer(reviewer(true));

    let result = engine
        .execute_custom("Tidy up", "code", CustomOptions::default())
        .await
        .unwrap();

    // plan + execution only
    assert_eq!(result.total_usage, TokenUsage::new(120, 60));
    assert_eq!(result.final_output.as_deref(), Some("code+default+default"));
}

#[tokio::test]
async fn test_stops_on_first_failure_by_default() {
    let executor = Arc::new(ScriptedExecutor::new().failing_step("s0"));
    let engine = engine(executor.clone())
        .with_planner(Arc::new(ScriptedPlanner::with_steps(two_steps())));

    let result = engine
        .execute_custom("Tidy up", "code", CustomOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.results.len(), 1);
    assert_eq!(executor.calls().len(), 1);
}

#[tokio::test]
async fn test_continue_on_failure_when_requested() {
    let executor = Arc::new(ScriptedExecutor::new().failing_step("s0"));
    let engine = engine(executor.clone())
        .with_planner(Arc::new(ScriptedPlanner::with_steps(two_steps())));

    let result = engine
        .execute_custom(
            "Tidy up",
            "code",
            CustomOptions {
                stop_on_error: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.failed_results().count(), 1);
}

#[tokio::test]
async fn test_read_only_never_adopts_outputs() {
    let engine = engine(Arc::new(ScriptedExecutor::new()))
        .with_planner(Arc::new(ScriptedPlanner::with_steps(two_steps())));

    let result = engine
        .execute_custom(
            "Tidy up",
            "code",
            CustomOptions {
                read_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.final_output.as_deref(), Some("code"));
}

#[tokio::test]
async fn test_context_optimization_feeds_planner() {
    let planner = Arc::new(ScriptedPlanner::with_steps(two_steps()));
    let executor = Arc::new(ScriptedExecutor::new());
    let config = OrchestratorConfig {
        context_optimization_threshold: 3,
        ..Default::default()
    };
    let engine = engine_with_config(executor.clone(), config)
        .with_planner(planner.clone())
        .with_context_manager(Arc::new(ScriptedContextManager { fail: false }));

    let result = engine
        .execute_custom("Tidy up", "a long source file", CustomOptions::default())
        .await
        .unwrap();

    assert_eq!(planner.seen_code.lock().unwrap().as_deref(), Some("compressed"));
    let calls = executor.calls();
    assert_eq!(calls[0].code, "a long source file");
    assert_eq!(calls[0].context["optimized_context"], "compressed");

    match result.details {
        WorkflowDetails::Custom {
            context_optimization,
            ..
        } => assert_eq!(context_optimization.unwrap().chunks_used, 2),
        other => panic!("unexpected details: {:?}", other),
    }
}

#[tokio::test]
async fn test_context_optimization_failure_is_not_fatal() {
    let planner = Arc::new(ScriptedPlanner::with_steps(two_steps()));
    let config = OrchestratorConfig {
        context_optimization_threshold: 3,
        ..Default::default()
    };
    let engine = engine_with_config(Arc::new(ScriptedExecutor::new()), config)
        .with_planner(planner.clone())
        .with_context_manager(Arc::new(ScriptedContextManager { fail: true }));

    let result = engine
        .execute_custom("Tidy up", "a long source file", CustomOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(
        planner.seen_code.lock().unwrap().as_deref(),
        Some("a long source file")
    );
}

#[tokio::test]
async fn test_optimize_steps_drops_redundant_work() {
    let steps = vec![
        Step::new("s0", "Fix bug").with_kind("refactor").with_target("a.rs"),
        Step::new("s1", "fix bug ").with_kind("refactor").with_target("a.rs"),
    ];
    let executor = Arc::new(ScriptedExecutor::new());
    let engine = engine(executor.clone())
        .with_planner(Arc::new(ScriptedPlanner::with_steps(steps)));

    let result = engine
        .execute_custom(
            "Fix",
            "code",
            CustomOptions {
                optimize_steps: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.results.len(), 1);
    assert_eq!(executor.calls()[0].step_id, "s0");
    assert!(matches!(
        result.details,
        WorkflowDetails::Custom { skipped_steps: 1, .. }
    ));
}

#[tokio::test]
async fn test_plan_issues_are_reported_not_fatal() {
    let steps = vec![Step::new("s0", "Analyze").with_dependencies(["ghost"])];
    let engine = engine(Arc::new(ScriptedExecutor::new()))
        .with_planner(Arc::new(ScriptedPlanner::with_steps(steps)));

    let result = engine
        .execute_custom("Look", "code", CustomOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    match result.details {
        WorkflowDetails::Custom { plan_issues, .. } => {
            assert_eq!(plan_issues.len(), 1);
            assert!(plan_issues[0].contains("ghost"));
        }
        other => panic!("unexpected details: {:?}", other),
    }
}
