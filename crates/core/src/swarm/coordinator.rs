//! # Swarm Coordinator
//!
//! Drives one mission from repository locator and objective to the final
//! prompt, then applies refinement feedback to it.
//!
//! The coordinator owns the [`MissionState`]. Stages run strictly in order and
//! each reads only the previous stage's output. The only fan-out is inside the
//! fetcher, which completes before the Scout starts.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::llm::ModelClient;
use crate::models::{LlmProvider, ModelConfig};
use crate::skills::{
    prompts, AgentStage, ArchitectInput, ArchitectSkill, RefinerInput, RefinerSkill, ScoutInput,
    ScoutSkill, StageError, TaskmasterInput, TaskmasterSkill,
};
use crate::state::{ImageError, ImageRef, MissionSnapshot, MissionState};
use crate::tools::chunk_parser::{audit_chunk_ids, parse_chunks};
use crate::tools::fetcher::{AutoFetcher, RepoFetcher};
use crate::tools::file_filter::FetchLimits;

use super::events::{SwarmEvent, SwarmEventKind};
use super::pipeline::PipelineStatus;

const COORDINATOR: &str = "coordinator";

/// Configuration for the coordinator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Global LLM provider (default: Gemini)
    pub global_provider: LlmProvider,
    /// Global model to use for all agents
    pub global_model: Option<String>,
    /// Base URL override for LLM API (for OpenAI-compatible endpoints)
    pub base_url: Option<String>,
    /// Per-agent model overrides (agent_id -> model name)
    pub per_agent_models: HashMap<String, String>,
    /// Per-agent provider overrides (agent_id -> provider)
    pub per_agent_providers: HashMap<String, LlmProvider>,
    /// Per-agent base URL overrides (agent_id -> base_url, for OpenAI)
    pub per_agent_base_urls: HashMap<String, String>,
    /// Per-agent temperature overrides (agent_id -> temperature)
    pub per_agent_temperatures: HashMap<String, f32>,
    pub fetch: FetchLimits,
}

impl CoordinatorConfig {
    /// Get model config for a specific stage
    pub fn get_model_config(&self, stage: AgentStage) -> ModelConfig {
        let agent_id = stage.id();

        // Get provider: per-agent override -> global -> default
        let provider = self
            .per_agent_providers
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| self.global_provider.clone());

        // Get model: per-agent override -> global -> default for provider
        let model = self
            .per_agent_models
            .get(agent_id)
            .or(self.global_model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        // Get base_url: per-agent override -> global (only for OpenAI)
        let base_url = if provider.supports_base_url() {
            self.per_agent_base_urls
                .get(agent_id)
                .or(self.base_url.as_ref())
                .cloned()
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }

    pub fn temperature(&self, stage: AgentStage) -> f32 {
        self.per_agent_temperatures
            .get(stage.id())
            .copied()
            .unwrap_or_else(|| stage.default_temperature())
    }
}

/// One model client per stage
#[derive(Clone)]
pub struct StageClients {
    pub scout: Arc<dyn ModelClient>,
    pub architect: Arc<dyn ModelClient>,
    pub taskmaster: Arc<dyn ModelClient>,
    pub refiner: Arc<dyn ModelClient>,
}

impl StageClients {
    /// Same client for every stage
    pub fn uniform(client: Arc<dyn ModelClient>) -> Self {
        Self {
            scout: client.clone(),
            architect: client.clone(),
            taskmaster: client.clone(),
            refiner: client,
        }
    }

    /// Resolve each stage's provider and model from config.
    ///
    /// API keys are looked up on first use, so this never fails.
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        let client = |stage| config.get_model_config(stage).deferred_client();
        Self {
            scout: client(AgentStage::Scout),
            architect: client(AgentStage::Architect),
            taskmaster: client(AgentStage::Taskmaster),
            refiner: client(AgentStage::Refiner),
        }
    }
}

/// A pipeline run request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub repo_locator: String,
    pub objective: String,
    /// Errors from a previous attempt at the same objective
    #[serde(default)]
    pub error_feedback: Option<String>,
}

impl PipelineRequest {
    pub fn new(repo_locator: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            repo_locator: repo_locator.into(),
            objective: objective.into(),
            error_feedback: None,
        }
    }

    pub fn with_error_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.error_feedback = Some(feedback.into());
        self
    }
}

/// How a coordinator operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Preconditions not met; nothing happened
    Skipped,
    Completed,
    /// Status is `error`; the message is in the state
    Failed,
}

struct Stages {
    scout: ScoutSkill,
    architect: ArchitectSkill,
    taskmaster: TaskmasterSkill,
    refiner: RefinerSkill,
}

impl Stages {
    fn new(clients: StageClients, config: &CoordinatorConfig) -> Self {
        Self {
            scout: ScoutSkill::new(clients.scout)
                .with_temperature(config.temperature(AgentStage::Scout)),
            architect: ArchitectSkill::new(clients.architect)
                .with_temperature(config.temperature(AgentStage::Architect)),
            taskmaster: TaskmasterSkill::new(clients.taskmaster)
                .with_temperature(config.temperature(AgentStage::Taskmaster)),
            refiner: RefinerSkill::new(clients.refiner)
                .with_temperature(config.temperature(AgentStage::Refiner)),
        }
    }
}

/// The swarm coordinator
pub struct Coordinator {
    config: CoordinatorConfig,
    fetcher: Arc<dyn RepoFetcher>,
    stages: Stages,
    state: MissionState,
    next_seq: u64,
    event_tx: Option<mpsc::Sender<SwarmEvent>>,
    snapshot_tx: Option<watch::Sender<MissionSnapshot>>,
}

impl Coordinator {
    /// Coordinator with real fetchers and provider clients resolved from `config`
    pub fn new(config: CoordinatorConfig) -> Self {
        let fetcher = Arc::new(AutoFetcher::new(config.fetch.clone()));
        let clients = StageClients::from_config(&config);
        Self::with_parts(config, fetcher, clients)
    }

    /// Coordinator over explicit collaborators
    pub fn with_parts(
        config: CoordinatorConfig,
        fetcher: Arc<dyn RepoFetcher>,
        clients: StageClients,
    ) -> Self {
        let stages = Stages::new(clients, &config);
        Self {
            config,
            fetcher,
            stages,
            state: MissionState::new(prompts::MANIFESTO),
            next_seq: 0,
            event_tx: None,
            snapshot_tx: None,
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<SwarmEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Publish a snapshot after every state mutation
    pub fn with_snapshot_channel(mut self, tx: watch::Sender<MissionSnapshot>) -> Self {
        tx.send_replace(self.state.snapshot());
        self.snapshot_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Swap in a new config, rebuilding stage clients and the fetcher from it.
    ///
    /// Mission state (including attached images) is kept.
    pub fn reconfigure(&mut self, config: CoordinatorConfig) {
        self.fetcher = Arc::new(AutoFetcher::new(config.fetch.clone()));
        self.stages = Stages::new(StageClients::from_config(&config), &config);
        self.config = config;
    }

    pub fn state(&self) -> &MissionState {
        &self.state
    }

    pub fn snapshot(&self) -> MissionSnapshot {
        self.state.snapshot()
    }

    pub fn status(&self) -> PipelineStatus {
        self.state.status
    }

    pub fn attach_image(&mut self, image: ImageRef) -> usize {
        let index = self.state.attach_image(image);
        self.publish();
        index
    }

    pub fn remove_image(&mut self, index: usize) -> Result<ImageRef, ImageError> {
        let removed = self.state.remove_image(index)?;
        self.publish();
        Ok(removed)
    }

    /// Emit an event
    async fn emit(&mut self, mut event: SwarmEvent) {
        self.next_seq += 1;
        event.seq = self.next_seq;
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    fn publish(&self) {
        if let Some(tx) = &self.snapshot_tx {
            tx.send_replace(self.state.snapshot());
        }
    }

    async fn set_status(&mut self, status: PipelineStatus) {
        if !self.state.status.can_transition_to(status) {
            tracing::warn!(from = %self.state.status, to = %status, "Unexpected status transition");
        }
        self.state.status = status;
        self.publish();
        self.emit(
            SwarmEvent::new(SwarmEventKind::StatusChanged, COORDINATOR)
                .with_data(serde_json::json!({ "status": status })),
        )
        .await;
    }

    /// Record a failure: status `error`, message stored, nothing rolled back
    async fn fail(&mut self, kind: SwarmEventKind, agent: &str, message: String) -> RunOutcome {
        tracing::warn!(agent, error = %message, "Mission failed");
        self.state.fail(message.clone());
        self.publish();
        self.emit(
            SwarmEvent::new(SwarmEventKind::StatusChanged, COORDINATOR)
                .with_data(serde_json::json!({ "status": PipelineStatus::Error })),
        )
        .await;
        self.emit(SwarmEvent::new(kind, agent).with_data(serde_json::json!({ "error": message })))
            .await;
        RunOutcome::Failed
    }

    async fn stage_started(&mut self, stage: AgentStage, status: PipelineStatus) {
        tracing::info!(stage = stage.id(), "Stage started");
        self.set_status(status).await;
        self.emit(SwarmEvent::new(SwarmEventKind::AgentStarted, stage.id()))
            .await;
    }

    async fn stage_completed(&mut self, stage: AgentStage, output: &str) {
        tracing::info!(stage = stage.id(), output_chars = output.len(), "Stage completed");
        self.emit(
            SwarmEvent::new(SwarmEventKind::AgentCompleted, stage.id())
                .with_data(serde_json::json!({ "output_chars": output.len() })),
        )
        .await;
    }

    /// Hand back the stage output, or record the failure and the outcome to return
    async fn accept(
        &mut self,
        result: Result<String, StageError>,
        failure: SwarmEventKind,
    ) -> Result<String, RunOutcome> {
        match result {
            Ok(output) => Ok(output),
            Err(err) => {
                let agent = err.stage.id();
                self.emit(SwarmEvent::new(SwarmEventKind::AgentFailed, agent))
                    .await;
                Err(self.fail(failure, agent, err.to_string()).await)
            }
        }
    }

    /// Parse the final prompt and log any chunk-id anomalies; returns the chunk count
    fn audit_final_prompt(&self) -> usize {
        let chunks = self
            .state
            .final_prompt
            .as_deref()
            .map(parse_chunks)
            .unwrap_or_default();
        for issue in audit_chunk_ids(&chunks) {
            tracing::warn!(?issue, "Chunk id anomaly in final prompt");
        }
        chunks.len()
    }

    /// Run the full pipeline: fetch, Scout, Architect, Taskmaster.
    ///
    /// A blank locator or objective is a no-op. Failures are recorded in the
    /// state (status `error` plus message) and stop the remaining stages.
    #[tracing::instrument(
        skip(self, request),
        fields(repo = %request.repo_locator, objective_preview = %request.objective.chars().take(50).collect::<String>())
    )]
    pub async fn execute_pipeline(&mut self, request: PipelineRequest) -> RunOutcome {
        let locator = request.repo_locator.trim();
        let objective = request.objective.trim();
        if locator.is_empty() || objective.is_empty() {
            tracing::debug!("Repository or objective missing, ignoring");
            return RunOutcome::Skipped;
        }
        let error_feedback = request
            .error_feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());

        self.state.reset_for_run(prompts::MANIFESTO);
        self.emit(
            SwarmEvent::new(SwarmEventKind::PipelineStarted, COORDINATOR).with_data(
                serde_json::json!({ "repo": locator, "objective": objective }),
            ),
        )
        .await;

        // Fetch (join barrier: every file resolves before the Scout starts)
        self.set_status(PipelineStatus::Fetching).await;
        match self.fetcher.fetch(locator).await {
            Ok(files) => {
                tracing::info!(count = files.len(), "Repository fetched");
                self.state.files = files;
                self.publish();
                let count = self.state.files.len();
                self.emit(
                    SwarmEvent::new(SwarmEventKind::FilesFetched, COORDINATOR)
                        .with_data(serde_json::json!({ "count": count })),
                )
                .await;
            }
            Err(e) => {
                return self
                    .fail(
                        SwarmEventKind::PipelineFailed,
                        COORDINATOR,
                        format!("Failed to fetch repository: {}", e),
                    )
                    .await;
            }
        }

        // Scout
        self.stage_started(AgentStage::Scout, PipelineStatus::ScoutWorking)
            .await;
        let result = self
            .stages
            .scout
            .run(ScoutInput {
                mission_log: &self.state.mission_log,
                objective,
                error_feedback,
                files: &self.state.files,
                images: &self.state.images,
            })
            .await;
        let scout_output = match self.accept(result, SwarmEventKind::PipelineFailed).await {
            Ok(output) => output,
            Err(outcome) => return outcome,
        };
        self.stage_completed(AgentStage::Scout, &scout_output).await;
        self.state.mission_log = scout_output;
        self.publish();

        // Architect
        self.stage_started(AgentStage::Architect, PipelineStatus::ArchitectWorking)
            .await;
        let result = self
            .stages
            .architect
            .run(ArchitectInput {
                scout_output: &self.state.mission_log,
                objective,
                error_feedback,
                images: &self.state.images,
            })
            .await;
        let architect_output = match self.accept(result, SwarmEventKind::PipelineFailed).await {
            Ok(output) => output,
            Err(outcome) => return outcome,
        };
        self.stage_completed(AgentStage::Architect, &architect_output)
            .await;
        self.state.mission_log = architect_output;
        self.publish();

        // Taskmaster
        self.stage_started(AgentStage::Taskmaster, PipelineStatus::TaskmasterWorking)
            .await;
        let result = self
            .stages
            .taskmaster
            .run(TaskmasterInput {
                architect_output: &self.state.mission_log,
                files: &self.state.files,
            })
            .await;
        let final_prompt = match self.accept(result, SwarmEventKind::PipelineFailed).await {
            Ok(output) => output,
            Err(outcome) => return outcome,
        };
        self.stage_completed(AgentStage::Taskmaster, &final_prompt)
            .await;
        self.state.final_prompt = Some(final_prompt);
        let chunks = self.audit_final_prompt();

        self.set_status(PipelineStatus::Completed).await;
        self.emit(
            SwarmEvent::new(SwarmEventKind::PipelineCompleted, COORDINATOR)
                .with_data(serde_json::json!({ "chunks": chunks })),
        )
        .await;
        tracing::info!(chunks, "Mission completed");
        RunOutcome::Completed
    }

    /// Apply feedback to the final prompt with one Refiner call.
    ///
    /// No-op without a final prompt or with blank feedback. The Refiner's
    /// reply replaces the final prompt wholesale; on failure it is untouched.
    /// Files come from the last fetch and are never refetched.
    #[tracing::instrument(skip(self, feedback), fields(feedback_chars = feedback.len()))]
    pub async fn execute_refinement(&mut self, feedback: String) -> RunOutcome {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            tracing::debug!("Empty refinement feedback, ignoring");
            return RunOutcome::Skipped;
        }
        let Some(current) = self.state.final_prompt.clone() else {
            tracing::debug!("No final prompt to refine, ignoring");
            return RunOutcome::Skipped;
        };

        self.emit(SwarmEvent::new(SwarmEventKind::RefinementStarted, COORDINATOR))
            .await;
        self.stage_started(AgentStage::Refiner, PipelineStatus::Refining)
            .await;
        let result = self
            .stages
            .refiner
            .run(RefinerInput {
                final_prompt: &current,
                feedback,
                mission_log: &self.state.mission_log,
                files: &self.state.files,
            })
            .await;
        let refined = match self.accept(result, SwarmEventKind::RefinementFailed).await {
            Ok(output) => output,
            Err(outcome) => return outcome,
        };
        self.stage_completed(AgentStage::Refiner, &refined).await;
        self.state.final_prompt = Some(refined);
        self.state.error = None;
        let chunks = self.audit_final_prompt();

        self.set_status(PipelineStatus::Completed).await;
        self.emit(
            SwarmEvent::new(SwarmEventKind::RefinementCompleted, COORDINATOR)
                .with_data(serde_json::json!({ "chunks": chunks })),
        )
        .await;
        RunOutcome::Completed
    }
}
