use async_trait::async_trait;

use crate::ai::{ClaudeClient, Collaborator, OllamaClient, OpenAIClient};
use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Ollama,
    Claude,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Ollama => "ollama",
            Provider::Claude => "claude",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAI),
            "ollama" => Some(Provider::Ollama),
            "claude" => Some(Provider::Claude),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::OpenAI, Provider::Ollama, Provider::Claude]
    }

    pub fn next(&self) -> Provider {
        match self {
            Provider::OpenAI => Provider::Ollama,
            Provider::Ollama => Provider::Claude,
            Provider::Claude => Provider::OpenAI,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI-compatible",
            Provider::Ollama => "Ollama (Local)",
            Provider::Claude => "Claude (Anthropic)",
        }
    }

    pub fn default_text_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Ollama => "llama3.2:latest",
            Provider::Claude => "claude-3-5-haiku-20241022",
        }
    }

    pub fn default_image_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "dall-e-3",
            Provider::Ollama | Provider::Claude => "",
        }
    }
}

/// A concrete provider client, selected at runtime
#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(OpenAIClient),
    Ollama(OllamaClient),
    Claude(ClaudeClient),
}

impl ProviderClient {
    /// Build the client for `provider`. API keys come from the environment first, then config.
    pub fn from_config(provider: Provider, config: &Config) -> Result<Self> {
        match provider {
            Provider::OpenAI => {
                let key = std::env::var("OPENAI_API_KEY").ok()
                    .or_else(|| config.openai_api_key.clone())
                    .unwrap_or_default();
                let base_url = config.openai_base_url.as_deref()
                    .unwrap_or(crate::ai::openai::DEFAULT_BASE_URL);
                Ok(ProviderClient::OpenAI(OpenAIClient::with_base_url(&key, base_url)))
            }
            Provider::Ollama => {
                let url = config.ollama_url.as_deref()
                    .unwrap_or(crate::ai::ollama::DEFAULT_URL);
                Ok(ProviderClient::Ollama(OllamaClient::new(url)))
            }
            Provider::Claude => {
                let key = std::env::var("ANTHROPIC_API_KEY").ok()
                    .or_else(|| config.claude_api_key.clone())
                    .ok_or_else(|| Error::Config(
                        "Claude API key not configured (set ANTHROPIC_API_KEY)".to_string(),
                    ))?;
                Ok(ProviderClient::Claude(ClaudeClient::new(&key)))
            }
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ProviderClient::OpenAI(_) => Provider::OpenAI,
            ProviderClient::Ollama(_) => Provider::Ollama,
            ProviderClient::Claude(_) => Provider::Claude,
        }
    }
}

#[async_trait]
impl Collaborator for ProviderClient {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        match self {
            ProviderClient::OpenAI(c) => c.complete(model, prompt).await,
            ProviderClient::Ollama(c) => c.complete(model, prompt).await,
            ProviderClient::Claude(c) => c.complete(model, prompt).await,
        }
    }

    async fn generate_image(&self, model: &str, prompt: &str) -> Result<String> {
        match self {
            ProviderClient::OpenAI(c) => c.generate_image(model, prompt).await,
            ProviderClient::Ollama(c) => c.generate_image(model, prompt).await,
            ProviderClient::Claude(c) => c.generate_image(model, prompt).await,
        }
    }
}
