pub mod claude;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;

use crate::error::Result;

pub use claude::ClaudeClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

/// External AI provider consumed by the session controller
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Text completion for a single user prompt
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;

    /// Generate an image and return its URL
    async fn generate_image(&self, model: &str, prompt: &str) -> Result<String>;
}
