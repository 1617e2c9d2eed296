use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ensure_success, ContentPart, ModelClient, ModelRequest};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResContent>,
}

#[derive(Deserialize)]
struct GeminiResContent {
    #[serde(default)]
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            client: Client::new(),
        }
    }
}

fn to_gemini_part(part: ContentPart) -> GeminiPart {
    match part {
        ContentPart::Text { value } => GeminiPart::Text { text: value },
        ContentPart::Image { mime_type, data } => GeminiPart::Inline {
            inline_data: InlineData { mime_type, data },
        },
    }
}

fn build_request(request: ModelRequest) -> GeminiRequest {
    GeminiRequest {
        system_instruction: GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: request.system_instruction,
            }],
        },
        contents: vec![GeminiContent {
            role: Some("user"),
            parts: request.parts.into_iter().map(to_gemini_part).collect(),
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
        },
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn label(&self) -> String {
        format!("gemini/{}", self.model)
    }

    async fn generate(&self, request: ModelRequest) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            API_BASE,
            urlencoding::encode(&self.model)
        );
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(request))
            .send()
            .await
            .context("Gemini request failed")?;
        let parsed: GeminiResponse = ensure_success("Gemini", res)
            .await?
            .json()
            .await
            .context("Gemini returned an unreadable response")?;

        // Thinking models may split the answer over several parts.
        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}
