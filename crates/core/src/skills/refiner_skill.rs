//! # Refiner Skill
//!
//! Applies user feedback to the final prompt. Always receives and returns the
//! whole chunk sequence; the coordinator swaps it in without diffing.

use std::sync::Arc;

use crate::llm::{ModelClient, ModelRequest};
use crate::tools::fetcher::RepoFile;

use super::llm_helpers::{format_repository, invoke_stage};
use super::{AgentStage, StageError};

pub struct RefinerInput<'a> {
    pub final_prompt: &'a str,
    pub feedback: &'a str,
    pub mission_log: &'a str,
    /// Files retained from the original fetch
    pub files: &'a [RepoFile],
}

pub struct RefinerSkill {
    client: Arc<dyn ModelClient>,
    temperature: f32,
}

impl RefinerSkill {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            temperature: AgentStage::Refiner.default_temperature(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_request(&self, input: &RefinerInput<'_>) -> ModelRequest {
        ModelRequest::new(AgentStage::Refiner.system_prompt(), self.temperature)
            .with_text(format!("CURRENT PROMPTS:\n{}", input.final_prompt))
            .with_text(format!("FEEDBACK:\n{}", input.feedback.trim()))
            .with_text(format!("MISSION LOG:\n{}", input.mission_log))
            .with_text(format_repository(input.files))
    }

    pub async fn run(&self, input: RefinerInput<'_>) -> Result<String, StageError> {
        let request = self.build_request(&input);
        invoke_stage(AgentStage::Refiner, self.client.as_ref(), request).await
    }
}
