//! Chat history data model and its on-disk store
//!
//! The whole history is one JSON document. It is always rewritten in full,
//! through a sibling temp file that is renamed over the target so a reader
//! never sees a half-written file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const HISTORY_DIR: &str = "SnarkyAI";
const HISTORY_FILE: &str = "chat_history.json";

/// One message unit within a chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Turn {
    #[serde(rename = "user")]
    User(String),
    #[serde(rename = "ai")]
    Ai(String),
    #[serde(rename = "image")]
    Image(String),
}

/// A single conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Creation time in seconds since the Unix epoch
    pub timestamp: f64,
    pub messages: Vec<Turn>,
}

impl Chat {
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
            messages: Vec::new(),
        }
    }

    /// First user prompt, used as a title in chat lists
    pub fn title(&self) -> Option<&str> {
        self.messages.iter().find_map(|turn| match turn {
            Turn::User(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

/// All chats, in creation order
pub type ChatHistory = Vec<Chat>;

/// Owns the history file. The only component that touches the filesystem.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let store = Self { path: path.into() };
        store.ensure_dir();
        store
    }

    /// `~/SnarkyAI/chat_history.json`
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Self::default_dir()?.join(HISTORY_FILE)))
    }

    /// Directory holding the history file (and the log directory)
    pub fn default_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(HISTORY_DIR))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the history. Missing or unreadable files yield an empty history.
    pub fn load(&self) -> ChatHistory {
        self.ensure_dir();

        if !self.path.exists() {
            tracing::debug!("Chat history file not found at {}, starting empty", self.path.display());
            return ChatHistory::new();
        }

        match self.try_load() {
            Ok(history) => {
                tracing::debug!("Loaded {} chats from {}", history.len(), self.path.display());
                history
            }
            Err(e) => {
                tracing::error!("Error loading chat history from {}: {}", self.path.display(), e);
                ChatHistory::new()
            }
        }
    }

    pub fn try_load(&self) -> Result<ChatHistory> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the history. Failures are logged and swallowed; memory stays authoritative.
    pub fn save(&self, history: &[Chat]) {
        match self.try_save(history) {
            Ok(()) => tracing::debug!("Saved {} chats to {}", history.len(), self.path.display()),
            Err(e) => tracing::error!("Error saving chat history to {}: {}", self.path.display(), e),
        }
    }

    pub fn try_save(&self, history: &[Chat]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = to_pretty_json(history)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn ensure_dir(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::error!("Could not create history directory {}: {}", parent.display(), e);
            }
        }
    }
}

fn to_pretty_json(history: &[Chat]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    history.serialize(&mut ser)?;
    Ok(buf)
}
