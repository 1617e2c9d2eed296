//! # Scout Skill
//!
//! First stage. Maps the repository against the objective and returns the
//! mission log with a scout report appended under the manifesto.
//! Sees attached images.

use std::sync::Arc;

use crate::llm::{ModelClient, ModelRequest};
use crate::state::ImageRef;
use crate::tools::fetcher::RepoFile;

use super::llm_helpers::{format_error_feedback, format_repository, invoke_stage};
use super::{AgentStage, StageError};

pub struct ScoutInput<'a> {
    /// Current mission log (the manifesto at the start of a run)
    pub mission_log: &'a str,
    pub objective: &'a str,
    pub error_feedback: Option<&'a str>,
    pub files: &'a [RepoFile],
    pub images: &'a [ImageRef],
}

pub struct ScoutSkill {
    client: Arc<dyn ModelClient>,
    temperature: f32,
}

impl ScoutSkill {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            temperature: AgentStage::Scout.default_temperature(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_request(&self, input: &ScoutInput<'_>) -> ModelRequest {
        let mut request = ModelRequest::new(AgentStage::Scout.system_prompt(), self.temperature)
            .with_text(format!("CURRENT MISSION LOG:\n{}", input.mission_log))
            .with_text(format!("OBJECTIVE:\n{}", input.objective.trim()));
        if let Some(feedback) = format_error_feedback(input.error_feedback) {
            request = request.with_text(feedback);
        }
        request
            .with_text(format_repository(input.files))
            .with_images(input.images)
    }

    pub async fn run(&self, input: ScoutInput<'_>) -> Result<String, StageError> {
        let request = self.build_request(&input);
        invoke_stage(AgentStage::Scout, self.client.as_ref(), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::ContentPart;

    #[test]
    fn test_request_carries_log_objective_files_and_images() {
        let skill = ScoutSkill::new(Arc::new(ScriptedModel::new()));
        let files = vec![RepoFile::new("src/app.ts", "export const app = 1;")];
        let images = vec![ImageRef::new("AAAA", "image/png")];
        let request = skill.build_request(&ScoutInput {
            mission_log: "MANIFESTO",
            objective: "  Add dark mode  ",
            error_feedback: Some("TypeError: x is undefined"),
            files: &files,
            images: &images,
        });

        assert_eq!(request.system_instruction, AgentStage::Scout.system_prompt());
        assert!((request.temperature - 0.3).abs() < f32::EPSILON);
        let text = request.text();
        assert!(text.starts_with("CURRENT MISSION LOG:\nMANIFESTO"));
        assert!(text.contains("OBJECTIVE:\nAdd dark mode"));
        assert!(text.contains("TypeError: x is undefined"));
        assert!(text.contains("--- FILE: src/app.ts ---"));
        assert!(matches!(
            request.parts.last(),
            Some(ContentPart::Image { mime_type, .. }) if mime_type == "image/png"
        ));
    }

    #[test]
    fn test_no_feedback_section_without_feedback() {
        let skill = ScoutSkill::new(Arc::new(ScriptedModel::new())).with_temperature(0.9);
        let request = skill.build_request(&ScoutInput {
            mission_log: "M",
            objective: "o",
            error_feedback: None,
            files: &[],
            images: &[],
        });
        assert!(!request.text().contains("ERROR FEEDBACK"));
        assert!((request.temperature - 0.9).abs() < f32::EPSILON);
    }
}
