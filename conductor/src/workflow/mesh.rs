//! All-to-all mesh collaboration over several rounds.
//!
//! Round 1: every model works on the original task independently.
//! Rounds 2..R: every model sees its own last output plus the latest output of
//! each peer (as of the start of the round) and is asked to synthesize.
//! A model with no peer output to react to sits the round out.

use chrono::{DateTime, Utc};
use conductor_sdk::{OrchestratorEvent, Step, StepContext, StepResult, WorkflowKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{WorkflowDetails, WorkflowEngine, WorkflowResult};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::workflow_utils::execute_batch;

#[derive(Debug, Clone, Default)]
pub struct MeshOptions {
    /// Number of rounds; the configured default when `None`
    pub iterations: Option<usize>,

    pub context: StepContext,
}

/// One model's output forwarded to a peer during a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshMessage {
    pub round: usize,
    pub from: String,
    pub to: String,

    /// Size of the forwarded output in bytes
    pub output_len: usize,

    pub timestamp: DateTime<Utc>,
}

/// Append-only arena of every message exchanged during a mesh run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshLog {
    messages: Vec<MeshMessage>,
}

impl MeshLog {
    fn record(&mut self, message: MeshMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&MeshMessage> {
        self.messages.get(index)
    }

    pub fn messages(&self) -> &[MeshMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Per-model state for one mesh run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub model_id: String,

    pub current_output: Option<String>,

    /// Every successful output, oldest first
    pub history: Vec<String>,

    /// Indices into the run's [`MeshLog`]
    pub messages_received: Vec<usize>,
    pub messages_sent: Vec<usize>,
}

impl ModelState {
    fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            current_output: None,
            history: Vec::new(),
            messages_received: Vec::new(),
            messages_sent: Vec::new(),
        }
    }

    fn adopt(&mut self, result: &StepResult) {
        if let Some(output) = result.successful_output() {
            self.current_output = Some(output.to_string());
            self.history.push(output.to_string());
        }
    }
}

/// Work for one model in a collaboration round
struct MeshJob {
    model_index: usize,
    step: Step,
    code: String,
    peers: Vec<usize>,
}

fn mesh_prompt(task: &str, own: Option<&str>, peers: &[(&str, &str)]) -> String {
    let mut prompt = format!("{}\n\n## Your previous output\n", task);
    prompt.push_str(own.unwrap_or("(no previous output)"));
    prompt.push_str("\n\n## Latest outputs from other models\n");
    for (model, output) in peers {
        prompt.push_str(&format!("\n### {}\n{}\n", model, output));
    }
    prompt.push_str(
        "\nSynthesize the strongest ideas from all of the outputs above and \
         produce a single refined solution.",
    );
    prompt
}

impl WorkflowEngine {
    /// Run `models` for several rounds, exchanging outputs after round one.
    ///
    /// The final output is the last model's (in list order) current output
    /// with a note naming every contributing model.
    pub async fn execute_all_to_all(
        &self,
        task: &str,
        code: &str,
        models: &[String],
        options: MeshOptions,
    ) -> OrchestratorResult<WorkflowResult> {
        if models.is_empty() {
            return Err(OrchestratorError::NoModels);
        }

        let iterations = options
            .iterations
            .unwrap_or(self.config.mesh_iterations)
            .max(1);
        let started = self.start(WorkflowKind::Mesh, task);
        let action = self.classifier.classify(task);
        let context = &options.context;

        let mut states: Vec<ModelState> = models.iter().map(|m| ModelState::new(m)).collect();
        let mut log = MeshLog::default();
        let mut results: Vec<StepResult> = Vec::new();

        // Round 1: independent work on the original input
        self.events.emit(OrchestratorEvent::RoundStarted {
            round: 1,
            total_rounds: iterations,
        });
        let first_round = execute_batch(
            models.to_vec(),
            self.config.max_concurrency,
            |model, slot| {
                let step = Step::new(format!("mesh-r1-{}", slot.index + 1), task)
                    .with_name(model.clone())
                    .with_action(action);
                async move { self.run_step(&step, code, context, &model).await }
            },
        )
        .await;

        for (state, mut result) in states.iter_mut().zip(first_round) {
            result.round = Some(1);
            state.adopt(&result);
            results.push(result);
        }

        for round in 2..=iterations {
            self.events.emit(OrchestratorEvent::RoundStarted {
                round,
                total_rounds: iterations,
            });

            // Peers are read from the state as it stood when the round began
            let snapshot: Vec<Option<String>> =
                states.iter().map(|s| s.current_output.clone()).collect();

            let mut jobs = Vec::new();
            for (index, state) in states.iter().enumerate() {
                let peers: Vec<usize> = (0..states.len())
                    .filter(|&p| p != index && snapshot[p].is_some())
                    .collect();

                if peers.is_empty() {
                    info!(model = %state.model_id, round, "No peer outputs available; skipping model this round");
                    self.events.emit(OrchestratorEvent::ModelSkipped {
                        model: state.model_id.clone(),
                        round,
                        reason: "no peer outputs available".to_string(),
                    });
                    continue;
                }

                let peer_outputs: Vec<(&str, &str)> = peers
                    .iter()
                    .filter_map(|&p| {
                        snapshot[p]
                            .as_deref()
                            .map(|out| (states[p].model_id.as_str(), out))
                    })
                    .collect();
                let own = snapshot[index].as_deref();

                jobs.push(MeshJob {
                    model_index: index,
                    step: Step::new(
                        format!("mesh-r{}-{}", round, index + 1),
                        mesh_prompt(task, own, &peer_outputs),
                    )
                    .with_name(state.model_id.clone())
                    .with_action(action),
                    code: own.unwrap_or(code).to_string(),
                    peers,
                });
            }

            let states_ref = &states;
            let round_results = execute_batch(jobs, self.config.max_concurrency, |job, _| {
                async move {
                    let model = states_ref[job.model_index].model_id.as_str();
                    let result = self.run_step(&job.step, &job.code, context, model).await;
                    (job, result)
                }
            })
            .await;

            for (job, mut result) in round_results {
                let now = Utc::now();
                let mut collaborated_with = Vec::with_capacity(job.peers.len());

                for &peer in &job.peers {
                    let message = MeshMessage {
                        round,
                        from: states[peer].model_id.clone(),
                        to: states[job.model_index].model_id.clone(),
                        output_len: snapshot[peer].as_ref().map_or(0, String::len),
                        timestamp: now,
                    };
                    let id = log.record(message);
                    states[peer].messages_sent.push(id);
                    states[job.model_index].messages_received.push(id);
                    collaborated_with.push(states[peer].model_id.clone());
                }

                result.round = Some(round);
                result.collaborated_with = collaborated_with;
                states[job.model_index].adopt(&result);
                results.push(result);
            }
        }

        let contributors: Vec<&str> = states
            .iter()
            .filter(|s| !s.history.is_empty())
            .map(|s| s.model_id.as_str())
            .collect();

        let final_output = states
            .iter()
            .rev()
            .find_map(|s| s.current_output.as_deref())
            .map(|output| {
                format!(
                    "{}\n\n// Mesh synthesis: combined contributions from {}",
                    output,
                    contributors.join(", ")
                )
            });

        debug!(
            rounds = iterations,
            messages = log.len(),
            contributors = contributors.len(),
            "Mesh run complete"
        );

        let success = final_output.is_some();
        Ok(self.finish(
            started,
            results,
            final_output,
            success,
            WorkflowDetails::Mesh {
                iterations,
                models: states,
                log,
            },
        ))
    }
}
