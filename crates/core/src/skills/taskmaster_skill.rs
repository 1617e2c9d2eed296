//! # Taskmaster Skill
//!
//! The bridge from planning to execution. Turns the full mission log into
//! `=== PROMPT n: title ===` chunks for a coding agent with no memory between
//! prompts. Its output becomes the final prompt, not the mission log.

use std::sync::Arc;

use crate::llm::{ModelClient, ModelRequest};
use crate::tools::fetcher::RepoFile;

use super::llm_helpers::{format_repository, invoke_stage};
use super::{AgentStage, StageError};

pub struct TaskmasterInput<'a> {
    /// Mission log as returned by the Architect
    pub architect_output: &'a str,
    pub files: &'a [RepoFile],
}

pub struct TaskmasterSkill {
    client: Arc<dyn ModelClient>,
    temperature: f32,
}

impl TaskmasterSkill {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            temperature: AgentStage::Taskmaster.default_temperature(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_request(&self, input: &TaskmasterInput<'_>) -> ModelRequest {
        ModelRequest::new(AgentStage::Taskmaster.system_prompt(), self.temperature)
            .with_text(format!("MISSION LOG:\n{}", input.architect_output))
            .with_text(format_repository(input.files))
    }

    pub async fn run(&self, input: TaskmasterInput<'_>) -> Result<String, StageError> {
        let request = self.build_request(&input);
        invoke_stage(AgentStage::Taskmaster, self.client.as_ref(), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    #[test]
    fn test_request_has_files_but_no_images() {
        let skill = TaskmasterSkill::new(Arc::new(ScriptedModel::new()));
        let files = vec![RepoFile::new("main.go", "package main")];
        let request = skill.build_request(&TaskmasterInput {
            architect_output: "LOG",
            files: &files,
        });

        assert!(request.text().starts_with("MISSION LOG:\nLOG"));
        assert!(request.text().contains("--- FILE: main.go ---"));
        assert_eq!(request.image_count(), 0);
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
    }
}
