use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ensure_success, ContentPart, ModelClient, ModelRequest};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 16_000;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<Block>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicClient {
    api_key: String,
    model: String,
    client: Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: &str) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            client: Client::new(),
        }
    }

    fn build_request(&self, request: ModelRequest) -> MessagesRequest<'_> {
        let content = request
            .parts
            .into_iter()
            .map(|part| match part {
                ContentPart::Text { value } => Block::Text { text: value },
                ContentPart::Image { mime_type, data } => Block::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type: mime_type,
                        data,
                    },
                },
            })
            .collect();

        MessagesRequest {
            model: &self.model,
            system: request.system_instruction,
            max_tokens: MAX_TOKENS,
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content,
            }],
        }
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn label(&self) -> String {
        format!("anthropic/{}", self.model)
    }

    async fn generate(&self, request: ModelRequest) -> Result<String> {
        let body = self.build_request(request);
        let res = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Anthropic request failed")?;
        let parsed: MessagesResponse = ensure_success("Anthropic", res)
            .await?
            .json()
            .await
            .context("Anthropic returned an unreadable response")?;

        Ok(parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_blocks_are_base64_sources() {
        let client = AnthropicClient::new("key".to_string(), "claude-test");
        let request = ModelRequest::new("sys", 0.4)
            .with_images(&[crate::state::ImageRef::new("AAAA", "image/png")])
            .with_text("describe");

        let json = serde_json::to_value(client.build_request(request)).unwrap();
        assert_eq!(json["system"], "sys");
        let blocks = &json["messages"][0]["content"];
        assert_eq!(blocks[0]["type"], "image");
        assert_eq!(blocks[0]["source"]["type"], "base64");
        assert_eq!(blocks[0]["source"]["media_type"], "image/png");
        assert_eq!(blocks[1]["type"], "text");
    }
}
