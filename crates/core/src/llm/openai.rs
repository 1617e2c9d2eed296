use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ensure_success, ContentPart, ModelClient, ModelRequest};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Plain(String),
    Parts(Vec<ChatPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOwned,
}

#[derive(Deserialize)]
struct ChatMessageOwned {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any provider exposing `/chat/completions`
pub struct OpenAiCompatClient {
    provider: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(provider: &'static str, base_url: &str, api_key: String, model: &str) -> Self {
        Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            client: Client::new(),
        }
    }

    fn build_request(&self, request: ModelRequest) -> ChatRequest<'_> {
        let parts = request
            .parts
            .into_iter()
            .map(|part| match part {
                ContentPart::Text { value } => ChatPart::Text { text: value },
                ContentPart::Image { mime_type, data } => ChatPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", mime_type, data),
                    },
                },
            })
            .collect();

        ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Plain(request.system_instruction),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(parts),
                },
            ],
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn label(&self) -> String {
        format!("{}/{}", self.provider.to_lowercase(), self.model)
    }

    async fn generate(&self, request: ModelRequest) -> Result<String> {
        let body = self.build_request(request);
        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.provider))?;
        let parsed: ChatResponse = ensure_success(self.provider, res)
            .await?
            .json()
            .await
            .with_context(|| format!("{} returned an unreadable response", self.provider))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_become_data_urls() {
        let client = OpenAiCompatClient::new(
            "OpenAI",
            "https://api.openai.com/v1/",
            "key".to_string(),
            "gpt-4o",
        );
        assert_eq!(client.base_url, "https://api.openai.com/v1");

        let request = ModelRequest::new("sys", 0.2)
            .with_text("look")
            .with_images(&[crate::state::ImageRef::new("AAAA", "image/webp")]);
        let json = serde_json::to_value(client.build_request(request)).unwrap();

        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sys");
        let parts = &json["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/webp;base64,AAAA");
    }

    #[test]
    fn test_label_uses_provider_and_model() {
        let client = OpenAiCompatClient::new("DeepSeek", "https://x", "k".into(), "deepseek-chat");
        assert_eq!(client.label(), "deepseek/deepseek-chat");
    }
}
