//! # LLM Helpers
//!
//! Shared input formatting and the single call path every skill goes through.

use crate::llm::{ModelClient, ModelRequest};
use crate::tools::fetcher::RepoFile;

use super::{AgentStage, StageError};

/// Make one model call for `stage`.
///
/// Rejections become [`StageError`]; an empty/whitespace reply is replaced
/// with the stage's placeholder rather than treated as a failure.
pub async fn invoke_stage(
    stage: AgentStage,
    client: &dyn ModelClient,
    request: ModelRequest,
) -> Result<String, StageError> {
    tracing::debug!(
        stage = stage.id(),
        model = %client.label(),
        prompt_chars = request.text().len(),
        images = request.image_count(),
        temperature = request.temperature,
        "Invoking stage"
    );

    let output = client
        .generate(request)
        .await
        .map_err(|source| StageError { stage, source })?;

    if output.trim().is_empty() {
        tracing::warn!(stage = stage.id(), "Stage returned empty output, using placeholder");
        return Ok(stage.empty_placeholder().to_string());
    }
    Ok(output)
}

/// Repository dump: a path index followed by every file body
pub fn format_repository(files: &[RepoFile]) -> String {
    if files.is_empty() {
        return "REPOSITORY FILES: (none)".to_string();
    }

    let mut out = String::from("REPOSITORY FILE INDEX:\n");
    for file in files {
        out.push_str(&format!("- {} ({} bytes)\n", file.path, file.size));
    }
    out.push_str("\nREPOSITORY FILE CONTENTS:\n");
    for file in files {
        out.push_str(&format!(
            "\n--- FILE: {} ---\n{}\n--- END FILE: {} ---\n",
            file.path,
            file.content.trim_end(),
            file.path
        ));
    }
    out
}

/// Optional error-feedback block; empty when no feedback was given
pub fn format_error_feedback(error_feedback: Option<&str>) -> Option<String> {
    error_feedback
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| format!("ERROR FEEDBACK FROM PREVIOUS ATTEMPT:\n{}", f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(anyhow::Result<String>);

    #[async_trait]
    impl ModelClient for Canned {
        fn label(&self) -> String {
            "canned".to_string()
        }

        async fn generate(&self, _request: ModelRequest) -> anyhow::Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_output_becomes_placeholder() {
        let client = Canned(Ok("  \n".to_string()));
        let out = invoke_stage(AgentStage::Scout, &client, ModelRequest::new("s", 0.1))
            .await
            .unwrap();
        assert_eq!(out, AgentStage::Scout.empty_placeholder());
    }

    #[tokio::test]
    async fn test_rejection_is_stage_error() {
        let client = Canned(Err(anyhow::anyhow!("quota exceeded")));
        let err = invoke_stage(AgentStage::Taskmaster, &client, ModelRequest::new("s", 0.1))
            .await
            .unwrap_err();
        assert_eq!(err.stage, AgentStage::Taskmaster);
        assert_eq!(err.to_string(), "Taskmaster agent failed: quota exceeded");
    }

    #[test]
    fn test_format_repository() {
        let files = vec![
            RepoFile::new("Cargo.toml", "[package]\n"),
            RepoFile::new("src/main.rs", "fn main() {}"),
        ];
        let dump = format_repository(&files);
        assert!(dump.starts_with("REPOSITORY FILE INDEX:\n- Cargo.toml (10 bytes)\n"));
        assert!(dump.contains("--- FILE: src/main.rs ---\nfn main() {}\n--- END FILE: src/main.rs ---"));
    }

    #[test]
    fn test_blank_feedback_is_omitted() {
        assert_eq!(format_error_feedback(None), None);
        assert_eq!(format_error_feedback(Some("   ")), None);
        assert!(format_error_feedback(Some("E0308 mismatched types"))
            .unwrap()
            .ends_with("E0308 mismatched types"));
    }
}
