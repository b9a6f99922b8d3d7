pub mod ai;
pub mod config;
pub mod error;
pub mod history;
pub mod opener;
pub mod provider;
pub mod session;

// Re-export main types for convenience
pub use ai::{ClaudeClient, Collaborator, OllamaClient, OpenAIClient};
pub use config::Config;
pub use error::{Error, Result};
pub use history::{Chat, ChatHistory, HistoryStore, Turn};
pub use opener::open_url;
pub use provider::{Provider, ProviderClient};
pub use session::{ui_message, GenerationError, GenerationResult, Lane, SessionController};
