//! # Architect Skill
//!
//! Second stage. Takes the Scout's mission log and appends a concrete change
//! plan. Sees attached images; does not get the raw repository again.

use std::sync::Arc;

use crate::llm::{ModelClient, ModelRequest};
use crate::state::ImageRef;

use super::llm_helpers::{format_error_feedback, invoke_stage};
use super::{AgentStage, StageError};

pub struct ArchitectInput<'a> {
    /// Mission log as returned by the Scout
    pub scout_output: &'a str,
    pub objective: &'a str,
    pub error_feedback: Option<&'a str>,
    pub images: &'a [ImageRef],
}

pub struct ArchitectSkill {
    client: Arc<dyn ModelClient>,
    temperature: f32,
}

impl ArchitectSkill {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            temperature: AgentStage::Architect.default_temperature(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_request(&self, input: &ArchitectInput<'_>) -> ModelRequest {
        let mut request =
            ModelRequest::new(AgentStage::Architect.system_prompt(), self.temperature)
                .with_text(format!("CURRENT MISSION LOG:\n{}", input.scout_output))
                .with_text(format!("OBJECTIVE:\n{}", input.objective.trim()));
        if let Some(feedback) = format_error_feedback(input.error_feedback) {
            request = request.with_text(feedback);
        }
        request.with_images(input.images)
    }

    pub async fn run(&self, input: ArchitectInput<'_>) -> Result<String, StageError> {
        let request = self.build_request(&input);
        invoke_stage(AgentStage::Architect, self.client.as_ref(), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    #[tokio::test]
    async fn test_sends_scout_log_and_images() {
        let model = Arc::new(ScriptedModel::new().reply("MANIFESTO\n## SCOUT REPORT\n## ARCHITECTURE PLAN"));
        let skill = ArchitectSkill::new(model.clone());
        let images = vec![ImageRef::new("AAAA", "image/jpeg")];

        let out = skill
            .run(ArchitectInput {
                scout_output: "MANIFESTO\n## SCOUT REPORT",
                objective: "Add search",
                error_feedback: None,
                images: &images,
            })
            .await
            .unwrap();

        assert!(out.ends_with("## ARCHITECTURE PLAN"));
        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].text().contains("## SCOUT REPORT"));
        assert!(!calls[0].text().contains("REPOSITORY FILE"));
        assert_eq!(calls[0].image_count(), 1);
    }
}
