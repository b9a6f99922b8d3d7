use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Collaborator;
use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    response_format: String,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

/// Client for OpenAI and OpenAI-compatible endpoints
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn query(&self, model: &str, prompt: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self.client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider { provider: "OpenAI", status, body });
        }

        let openai_response: OpenAIResponse = response.json().await?;
        openai_response.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(Error::EmptyResponse { provider: "OpenAI" })
    }

    pub async fn create_image(&self, model: &str, prompt: &str) -> Result<String> {
        let request = ImageRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            n: 1,
            response_format: "url".to_string(),
        };

        let response = self.client
            .post(format!("{}/v1/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider { provider: "OpenAI", status, body });
        }

        let image_response: ImageResponse = response.json().await?;
        image_response.data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or(Error::EmptyResponse { provider: "OpenAI" })
    }
}

#[async_trait]
impl Collaborator for OpenAIClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        self.query(model, prompt).await
    }

    async fn generate_image(&self, model: &str, prompt: &str) -> Result<String> {
        self.create_image(model, prompt).await
    }
}
