use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::provider::Provider;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub provider: Option<String>,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub claude_api_key: Option<String>,
    pub ollama_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::OpenAI.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::OpenAI)
    }

    pub fn text_model_for(&self, provider: Provider) -> String {
        match &self.text_model {
            Some(model) if provider == self.provider() => model.clone(),
            _ => provider.default_text_model().to_string(),
        }
    }

    pub fn image_model_for(&self, provider: Provider) -> String {
        match &self.image_model {
            Some(model) if provider == self.provider() => model.clone(),
            _ => provider.default_image_model().to_string(),
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        Ok(config_dir.join("snarkyai").join("config.json"))
    }
}
