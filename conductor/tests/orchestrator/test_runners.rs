//! Tests for the preset, chain and comparison runners

use super::common::*;
use conductor::presets::{Preset, PresetStep};
use conductor::{
    ChainOptions, ComparisonOptions, CustomOptions, OrchestratorConfig, OrchestratorError,
    PresetOptions, SessionOptions, WorkflowDetails,
};
use conductor_sdk::{OrchestratorEvent, Step, StepAction, TokenUsage, WorkflowKind};
use tokio::sync::broadcast;
use std::sync::Arc;

fn two_step_preset() -> Preset {
    Preset {
        id: "mini".to_string(),
        name: "Mini".to_string(),
        description: "Analyze then refactor".to_string(),
        steps: vec![
            PresetStep {
                name: "Analyze".to_string(),
                prompt: "analyze".to_string(),
                model: None,
                requires_input: true,
            },
            PresetStep {
                name: "Refactor".to_string(),
                prompt: "refactor".to_string(),
                model: Some("fast".to_string()),
                requires_input: false,
            },
        ],
    }
}

// ============================================================================
// Preset Runner
// ============================================================================

#[tokio::test]
async fn test_preset_pipes_output_into_next_step() {
    let executor = Arc::new(ScriptedExecutor::new());
    let engine = engine(executor.clone());

    let result = engine
        .run_preset(&two_step_preset(), "code", &PresetOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.final_output.as_deref(), Some("code+default+fast"));
    assert_eq!(result.final_output.as_deref(), Some(result.results[1].output.as_str()));
    assert_eq!(result.total_usage, TokenUsage::new(20, 10));
    assert_eq!(result.kind(), WorkflowKind::Preset);

    let calls = executor.calls();
    assert_eq!(calls[0].code, "code");
    assert_eq!(calls[0].model, "default");
    assert_eq!(calls[1].code, "code+default");
    assert_eq!(calls[1].model, "fast");
}

#[tokio::test]
async fn test_preset_requires_input_uses_original_code() {
    let mut preset = two_step_preset();
    preset.steps[1].requires_input = true;

    let executor = Arc::new(ScriptedExecutor::new());
    let engine = engine(executor.clone());
    engine.run_preset(&preset, "code", &PresetOptions::default()).await;

    let calls = executor.calls();
    assert_eq!(calls[1].code, "code");
}

#[tokio::test]
async fn test_preset_stop_on_error_counts_only_attempted_steps() {
    let executor = Arc::new(ScriptedExecutor::new().failing_step("mini-1"));
    let engine = engine(executor.clone());

    let result = engine
        .run_preset(
            &two_step_preset(),
            "code",
            &PresetOptions {
                stop_on_error: true,
                ..Default::default()
            },
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.final_output, None);
    assert_eq!(executor.calls().len(), 1);
}

#[tokio::test]
async fn test_preset_continues_past_failure_without_stop() {
    let executor = Arc::new(ScriptedExecutor::new().failing_step("mini-1"));
    let engine = engine(executor.clone());

    let result = engine
        .run_preset(&two_step_preset(), "code", &PresetOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(result.results.len(), 2);
    // Second step saw the untouched input
    assert_eq!(executor.calls()[1].code, "code");
    assert_eq!(result.final_output.as_deref(), Some("code+fast"));
}

#[tokio::test]
async fn test_builtin_preset_by_id() {
    let executor = Arc::new(ScriptedExecutor::new());
    let engine = engine(executor.clone());

    let result = engine
        .execute_preset("code-review", "fn main() {}", PresetOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert!(matches!(
        result.details,
        WorkflowDetails::Preset { ref preset_id } if preset_id == "code-review"
    ));
    assert!(executor.calls()[0].step_id.starts_with("code-review-"));
}

#[tokio::test]
async fn test_unknown_preset_is_error() {
    let engine = engine(Arc::new(ScriptedExecutor::new()));
    let err = engine
        .execute_preset("nope", "", PresetOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownPreset(id) if id == "nope"));
}

// ============================================================================
// Chain Runner
// ============================================================================

#[tokio::test]
async fn test_chain_skips_failed_model_output() {
    let executor = Arc::new(ScriptedExecutor::new().failing_model("m2"));
    let engine = engine(executor.clone());

    let result = engine
        .execute_chain("Refactor it", "code", &models(&["m1", "m2", "m3"]), ChainOptions::default())
        .await
        .unwrap();

    assert_eq!(result.results.len(), 3);
    assert!(result.results[0].success);
    assert!(!result.results[1].success);
    assert!(result.results[1].error.as_deref().unwrap().contains("m2"));
    assert!(!result.success);

    let calls = executor.calls();
    assert_eq!(calls[2].model, "m3");
    assert_eq!(calls[2].code, "code+m1");
    assert_eq!(result.final_output.as_deref(), Some("code+m1+m3"));
    assert_eq!(result.failed_results().count(), 1);
}

#[tokio::test]
async fn test_chain_stop_on_error() {
    let executor = Arc::new(ScriptedExecutor::new().failing_model("m2"));
    let engine = engine(executor.clone());

    let result = engine
        .execute_chain(
            "Refactor it",
            "code",
            &models(&["m1", "m2", "m3"]),
            ChainOptions {
                stop_on_error: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.results.len(), 2);
    assert_eq!(executor.calls().len(), 2);
}

#[tokio::test]
async fn test_chain_step_ids_and_dependencies() {
    let executor = Arc::new(ScriptedExecutor::new());
    let engine = engine(executor.clone());

    engine
        .execute_chain("Document it", "x", &models(&["a", "b"]), ChainOptions::default())
        .await
        .unwrap();

    let ids: Vec<String> = executor.calls().into_iter().map(|c| c.step_id).collect();
    assert_eq!(ids, vec!["step-0", "step-1"]);
}

#[tokio::test]
async fn test_chain_routes_large_input() {
    let executor = Arc::new(ScriptedExecutor::new());
    let config = OrchestratorConfig {
        chain_routing_threshold: 4,
        ..Default::default()
    };
    let engine = engine_with_config(executor.clone(), config)
        .with_context_manager(Arc::new(ScriptedContextManager { fail: false }));

    let result = engine
        .execute_chain("Optimize it", "long input", &models(&["a", "b"]), ChainOptions::default())
        .await
        .unwrap();

    let calls = executor.calls();
    assert_eq!(calls[0].code, "routed:step-0");
    assert_eq!(calls[1].code, "routed:step-1");
    assert_eq!(calls[1].context["previous_output"], "routed:step-0+a");
    assert_eq!(calls[1].context["routing"]["step_id"], "step-1");

    match result.details {
        WorkflowDetails::Chain { routing, .. } => {
            assert_eq!(routing.unwrap().total_chunks, 2);
        }
        other => panic!("unexpected details: {:?}", other),
    }
}

#[tokio::test]
async fn test_chain_routing_failure_falls_back_to_raw_code() {
    let executor = Arc::new(ScriptedExecutor::new());
    let config = OrchestratorConfig {
        chain_routing_threshold: 4,
        ..Default::default()
    };
    let engine = engine_with_config(executor.clone(), config)
        .with_context_manager(Arc::new(ScriptedContextManager { fail: true }));

    let result = engine
        .execute_chain("Optimize it", "long input", &models(&["a"]), ChainOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(executor.calls()[0].code, "long input");
}

#[tokio::test]
async fn test_chain_requires_models() {
    let engine = engine(Arc::new(ScriptedExecutor::new()));
    let err = engine
        .execute_chain("x", "y", &[], ChainOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoModels));
}

// ============================================================================
// Comparison Runner
// ============================================================================

#[tokio::test]
async fn test_comparison_runs_every_model_on_same_input() {
    let executor = Arc::new(ScriptedExecutor::new().failing_model("b"));
    let engine = engine(executor.clone());

    let result = engine
        .execute_comparison("Review this", "code", &models(&["a", "b", "c"]), ComparisonOptions::default())
        .await
        .unwrap();

    assert_eq!(result.results.len(), 3);
    assert!(result.success);
    assert!(result.final_output.is_none());
    assert!(!result.results[1].success);
    assert_eq!(result.results[2].model.as_deref(), Some("c"));
    assert_eq!(result.total_usage, TokenUsage::new(20, 10));

    let calls = executor.calls();
    assert!(calls.iter().all(|c| c.code == "code"));
    assert_eq!(
        calls.iter().map(|c| c.model.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
}

#[tokio::test]
async fn test_comparison_concurrent_keeps_model_order() {
    let executor = Arc::new(ScriptedExecutor::new());
    let config = OrchestratorConfig {
        max_concurrency: 3,
        ..Default::default()
    };
    let engine = engine_with_config(executor, config);

    let result = engine
        .execute_comparison("Test it", "code", &models(&["a", "b", "c"]), ComparisonOptions::default())
        .await
        .unwrap();

    let outputs: Vec<&str> = result.results.iter().map(|r| r.output.as_str()).collect();
    assert_eq!(outputs, vec!["code+a", "code+b", "code+c"]);
    assert_eq!(result.results[0].step_id, "compare-1");
}

#[tokio::test]
async fn test_comparison_all_failed() {
    let executor = Arc::new(ScriptedExecutor::new().failing_model("a"));
    let engine = engine(executor);

    let result = engine
        .execute_comparison("x", "y", &models(&["a"]), ComparisonOptions::default())
        .await
        .unwrap();
    assert!(!result.success);
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_events_are_broadcast() {
    let engine = engine(Arc::new(ScriptedExecutor::new()));
    let mut rx = engine.subscribe();

    engine
        .execute_chain("Fix it", "code", &models(&["a"]), ChainOptions::default())
        .await
        .unwrap();

    let events = drain(&mut rx);

    assert_eq!(paired_completions(&events, WorkflowKind::Chain), vec![true]);
    assert!(matches!(
        events.first(),
        Some(OrchestratorEvent::WorkflowStarted { kind: WorkflowKind::Chain, .. })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::StepCompleted { step_id, .. } if step_id == "step-0")));
    assert!(matches!(
        events.last(),
        Some(OrchestratorEvent::WorkflowCompleted { success: true, .. })
    ));
}

fn drain(rx: &mut broadcast::Receiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Completion flags of every `WorkflowCompleted` for `kind`, after checking
/// each one follows a matching `WorkflowStarted`
fn paired_completions(events: &[OrchestratorEvent], kind: WorkflowKind) -> Vec<bool> {
    let mut open = 0;
    let mut completions = Vec::new();
    for event in events {
        match event {
            OrchestratorEvent::WorkflowStarted { kind: k, .. } if *k == kind => open += 1,
            OrchestratorEvent::WorkflowCompleted { kind: k, success, .. } if *k == kind => {
                assert!(open > 0, "{} completed without starting", kind);
                open -= 1;
                completions.push(*success);
            }
            _ => {}
        }
    }
    assert_eq!(open, 0, "{} workflow left open", kind);
    completions
}

#[tokio::test]
async fn test_failed_custom_run_closes_workflow() {
    let failing = engine(Arc::new(ScriptedExecutor::new()))
        .with_planner(Arc::new(ScriptedPlanner::failing()));
    let mut rx = failing.subscribe();
    assert!(failing
        .execute_custom("Fix it", "code", CustomOptions::default())
        .await
        .is_err());
    assert_eq!(paired_completions(&drain(&mut rx), WorkflowKind::Custom), vec![false]);

    let empty = engine(Arc::new(ScriptedExecutor::new()))
        .with_planner(Arc::new(ScriptedPlanner::with_steps(vec![])));
    let mut rx = empty.subscribe();
    let err = empty
        .execute_custom("Fix it", "code", CustomOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::PlanningFailure(_)));
    assert_eq!(paired_completions(&drain(&mut rx), WorkflowKind::Custom), vec![false]);
}

#[tokio::test]
async fn test_session_initialization_closes_workflow() {
    let engine = engine(Arc::new(ScriptedExecutor::new()))
        .with_planner(Arc::new(ScriptedPlanner::with_steps(diamond_steps())));
    let mut rx = engine.subscribe();

    let mut session = engine
        .initialize_plan("Clean up", "code", SessionOptions::default())
        .await
        .unwrap();
    engine.execute_next(&mut session).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(paired_completions(&events, WorkflowKind::Session), vec![true]);
    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::StepCompleted { step_id, .. } if step_id == "s0")));
}

#[tokio::test]
async fn test_custom_run_reports_step_outcomes() {
    let steps = vec![Step::new("p1", "Analyze"), Step::new("p2", "Refactor")];
    let engine = engine(Arc::new(ScriptedExecutor::new().failing_step("p2")))
        .with_planner(Arc::new(ScriptedPlanner::with_steps(steps)));
    let mut rx = engine.subscribe();

    engine
        .execute_custom(
            "Fix it",
            "code",
            CustomOptions {
                stop_on_error: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let events = drain(&mut rx);
    assert_eq!(paired_completions(&events, WorkflowKind::Custom), vec![false]);
    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::StepCompleted { step_id, .. } if step_id == "p1")));
    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::StepFailed { step_id, .. } if step_id == "p2")));
}

#[test]
fn test_default_classification_precedence() {
    use conductor::{ActionClassifier, KeywordClassifier};
    assert_eq!(KeywordClassifier.classify("Refactor and test"), StepAction::Refactor);
    assert_eq!(KeywordClassifier.classify("Make it nicer"), StepAction::Analyze);
}
