//! # Model Invocation
//!
//! Provider-neutral request/response contract for the pipeline stages.
//! Stages only ever see [`ModelClient`]: text and images in, text or failure out.
//!
//! - `gemini` - Google `generateContent`
//! - `anthropic` - Anthropic Messages API
//! - `openai` - OpenAI-compatible chat completions (OpenAI, OpenRouter, Grok, DeepSeek)

pub mod anthropic;
pub mod gemini;
pub mod openai;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::ImageRef;

/// One piece of a (possibly multimodal) prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text { value: String },
    Image { mime_type: String, data: String },
}

impl ContentPart {
    pub fn text(value: impl Into<String>) -> Self {
        ContentPart::Text {
            value: value.into(),
        }
    }

    pub fn image(image: &ImageRef) -> Self {
        ContentPart::Image {
            mime_type: image.mime_type.clone(),
            data: image.data.clone(),
        }
    }
}

/// A single model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub parts: Vec<ContentPart>,
    pub temperature: f32,
}

impl ModelRequest {
    pub fn new(system_instruction: impl Into<String>, temperature: f32) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            parts: Vec::new(),
            temperature,
        }
    }

    pub fn with_text(mut self, value: impl Into<String>) -> Self {
        self.parts.push(ContentPart::text(value));
        self
    }

    pub fn with_images(mut self, images: &[ImageRef]) -> Self {
        self.parts.extend(images.iter().map(ContentPart::image));
        self
    }

    /// All text parts joined, in order
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { value } => Some(value.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::Image { .. }))
            .count()
    }
}

/// Opaque text-generation capability used by every stage
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider/model label for logs and error messages
    fn label(&self) -> String;

    async fn generate(&self, request: ModelRequest) -> anyhow::Result<String>;
}

/// Turn a non-2xx provider response into an error carrying the body
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("{} API error ({}): {}", provider, status, body))
}

/// In-process fakes shared by unit tests across the crate
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays queued replies in order and records every request
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        calls: Mutex<Vec<ModelRequest>>,
    }

    impl ScriptedModel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: &str) -> Self {
            self.replies.lock().unwrap().push_back(Ok(text.to_string()));
            self
        }

        pub fn fail(self, message: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
            self
        }

        pub fn calls(&self) -> Vec<ModelRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        fn label(&self) -> String {
            "scripted".to_string()
        }

        async fn generate(&self, request: ModelRequest) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(request);
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("no scripted reply left")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_part_tagging() {
        let part = ContentPart::Image {
            mime_type: "image/png".to_string(),
            data: "aGVsbG8=".to_string(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["mime_type"], "image/png");

        let text: ContentPart = serde_json::from_str(r#"{"kind":"text","value":"hi"}"#).unwrap();
        assert_eq!(text, ContentPart::text("hi"));
    }

    #[test]
    fn test_request_text_skips_images() {
        let image = ImageRef::new("aGVsbG8=", "image/png");
        let request = ModelRequest::new("sys", 0.2)
            .with_text("first")
            .with_images(&[image])
            .with_text("second");

        assert_eq!(request.text(), "first\n\nsecond");
        assert_eq!(request.image_count(), 1);
    }
}
