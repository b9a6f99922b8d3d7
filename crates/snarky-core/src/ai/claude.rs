use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Collaborator;
use crate::error::{Error, Result};

#[derive(Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn query(&self, model: &str, prompt: &str) -> Result<String> {
        let request = ClaudeRequest {
            model: model.to_string(),
            max_tokens: 4096,
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self.client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider { provider: "Claude", status, body });
        }

        let claude_response: ClaudeResponse = response.json().await?;
        claude_response.content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or(Error::EmptyResponse { provider: "Claude" })
    }
}

#[async_trait]
impl Collaborator for ClaudeClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        self.query(model, prompt).await
    }

    async fn generate_image(&self, _model: &str, _prompt: &str) -> Result<String> {
        Err(Error::Unsupported {
            provider: "Claude",
            capability: "image generation",
        })
    }
}
