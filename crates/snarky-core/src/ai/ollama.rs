use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Collaborator;
use crate::error::{Error, Result};

pub const DEFAULT_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn query(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Provider {
                provider: "Ollama",
                status: response.status().as_u16(),
                body: "make sure Ollama is running with: ollama serve".to_string(),
            });
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.response)
    }
}

#[async_trait]
impl Collaborator for OllamaClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        self.query(model, prompt).await
    }

    async fn generate_image(&self, _model: &str, _prompt: &str) -> Result<String> {
        Err(Error::Unsupported {
            provider: "Ollama",
            capability: "image generation",
        })
    }
}
