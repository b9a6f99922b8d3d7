//! Session controller: the active chat and single-flight generation
//!
//! Each generation kind runs in its own lane. A lane admits one request at a
//! time; a second request arriving while the first is still running is
//! rejected immediately rather than queued. Text and image lanes are
//! independent of each other.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use thiserror::Error;

use crate::ai::Collaborator;
use crate::history::{Chat, ChatHistory, HistoryStore, Turn};

/// Sentinel shown to the UI when a lane is busy
pub const GENERATION_IN_PROGRESS: &str = "Generation in progress...";

/// Prefix marking a failed generation in UI-facing strings
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Text,
    Image,
}

impl Lane {
    fn result_turn(&self, output: String) -> Turn {
        match self {
            Lane::Text => Turn::Ai(output),
            Lane::Image => Turn::Image(output),
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Text => write!(f, "text"),
            Lane::Image => write!(f, "image"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// The lane already has a request in flight
    #[error("{0} generation already in progress")]
    InProgress(Lane),

    /// The collaborator failed; the detail is its error message
    #[error("{0}")]
    Collaborator(String),
}

pub type GenerationResult = std::result::Result<String, GenerationError>;

/// Render a generation result in the plain-string convention used by the UI
pub fn ui_message(result: &GenerationResult) -> String {
    match result {
        Ok(text) => text.clone(),
        Err(GenerationError::InProgress(_)) => GENERATION_IN_PROGRESS.to_string(),
        Err(GenerationError::Collaborator(detail)) => format!("{}{}", ERROR_PREFIX, detail),
    }
}

pub fn is_error_message(message: &str) -> bool {
    message.starts_with(ERROR_PREFIX)
}

#[derive(Debug, Default)]
struct SessionState {
    history: ChatHistory,
    active: Option<usize>,
}

pub struct SessionController {
    state: Mutex<SessionState>,
    text_lane: tokio::sync::Mutex<()>,
    image_lane: tokio::sync::Mutex<()>,
    store: HistoryStore,
    collaborator: RwLock<Arc<dyn Collaborator>>,
}

impl SessionController {
    /// Load history from `store` and start with no active chat
    pub fn new(store: HistoryStore, collaborator: Arc<dyn Collaborator>) -> Self {
        let history = store.load();
        Self {
            state: Mutex::new(SessionState { history, active: None }),
            text_lane: tokio::sync::Mutex::new(()),
            image_lane: tokio::sync::Mutex::new(()),
            store,
            collaborator: RwLock::new(collaborator),
        }
    }

    pub fn set_collaborator(&self, collaborator: Arc<dyn Collaborator>) {
        let mut current = self.collaborator.write().unwrap_or_else(|e| e.into_inner());
        *current = collaborator;
    }

    pub async fn generate_text(&self, model: &str, prompt: &str) -> GenerationResult {
        self.generate(Lane::Text, model, prompt).await
    }

    pub async fn generate_image(&self, model: &str, prompt: &str) -> GenerationResult {
        self.generate(Lane::Image, model, prompt).await
    }

    async fn generate(&self, lane: Lane, model: &str, prompt: &str) -> GenerationResult {
        let gate = match lane {
            Lane::Text => &self.text_lane,
            Lane::Image => &self.image_lane,
        };
        // Held until return, so the lane is released on every path.
        let Ok(_permit) = gate.try_lock() else {
            tracing::debug!("{} generation already in progress, skipping new request", lane);
            return Err(GenerationError::InProgress(lane));
        };

        let chat_idx = self.append_user_turn(prompt);
        let collaborator = self.collaborator();

        let result = match lane {
            Lane::Text => collaborator.complete(model, prompt).await,
            Lane::Image => collaborator.generate_image(model, prompt).await,
        };

        match result {
            Ok(output) => {
                let output = output.trim().to_string();
                tracing::debug!("Received {} result ({} chars)", lane, output.len());
                self.append_turn(chat_idx, lane.result_turn(output.clone()));
                Ok(output)
            }
            Err(e) => {
                tracing::error!("Error generating {}: {}", lane, e);
                Err(GenerationError::Collaborator(e.to_string()))
            }
        }
    }

    /// Snapshot of every chat for display
    pub fn get_history(&self) -> ChatHistory {
        self.state().history.clone()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.state().active
    }

    pub fn active_chat(&self) -> Option<Chat> {
        let state = self.state();
        state.active.and_then(|i| state.history.get(i).cloned())
    }

    /// End the current session. The chat stays in history.
    pub fn save_chat(&self) {
        let mut state = self.state();
        if state.active.is_none() {
            tracing::debug!("No active chat to save");
            return;
        }
        self.store.save(&state.history);
        state.active = None;
        tracing::debug!("Current chat cleared for a new session");
    }

    /// Make the chat at `index` active and persist. `None` or an index past the
    /// end of history clears the active chat instead.
    pub fn load_chat(&self, index: Option<usize>) {
        let mut state = self.state();
        let Some(idx) = index.filter(|&i| i < state.history.len()) else {
            tracing::debug!("No chat selected, clearing active chat");
            state.active = None;
            return;
        };

        state.active = Some(idx);
        self.store.save(&state.history);
        tracing::debug!("Selected chat {} loaded", idx);
    }

    fn append_user_turn(&self, prompt: &str) -> usize {
        let mut state = self.state();
        let idx = match state.active {
            Some(idx) => idx,
            None => {
                tracing::debug!("Creating a new chat");
                state.history.push(Chat::new());
                let idx = state.history.len() - 1;
                state.active = Some(idx);
                idx
            }
        };
        state.history[idx].messages.push(Turn::User(prompt.to_string()));
        self.store.save(&state.history);
        tracing::debug!("Added user message to chat {}", idx);
        idx
    }

    fn append_turn(&self, chat_idx: usize, turn: Turn) {
        let mut state = self.state();
        if let Some(chat) = state.history.get_mut(chat_idx) {
            chat.messages.push(turn);
            self.store.save(&state.history);
        }
    }

    fn collaborator(&self) -> Arc<dyn Collaborator> {
        self.collaborator.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Replies with fixed strings, or fails when a reply is `None`
    struct StubCollaborator {
        text: Option<String>,
        image: Option<String>,
    }

    impl StubCollaborator {
        fn replying(text: &str, image: &str) -> Arc<Self> {
            Arc::new(Self {
                text: Some(text.to_string()),
                image: Some(image.to_string()),
            })
        }
    }

    fn stub_failure() -> Error {
        Error::Provider {
            provider: "Stub",
            status: 500,
            body: "boom".to_string(),
        }
    }

    #[async_trait]
    impl Collaborator for StubCollaborator {
        async fn complete(&self, _model: &str, prompt: &str) -> Result<String> {
            self.text
                .as_ref()
                .map(|t| t.replace("{prompt}", prompt))
                .ok_or_else(stub_failure)
        }

        async fn generate_image(&self, _model: &str, _prompt: &str) -> Result<String> {
            self.image.clone().ok_or_else(stub_failure)
        }
    }

    /// Blocks text completions until released
    struct GatedCollaborator {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Collaborator for GatedCollaborator {
        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok("done".to_string())
        }

        async fn generate_image(&self, _model: &str, _prompt: &str) -> Result<String> {
            Ok("https://img/quick.png".to_string())
        }
    }

    /// Blocks image generations until released
    struct GatedImageCollaborator {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Collaborator for GatedImageCollaborator {
        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String> {
            Ok("quick".to_string())
        }

        async fn generate_image(&self, _model: &str, _prompt: &str) -> Result<String> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok("https://img/slow.png".to_string())
        }
    }

    fn controller(dir: &TempDir, collaborator: Arc<dyn Collaborator>) -> SessionController {
        let store = HistoryStore::new(dir.path().join("chat_history.json"));
        SessionController::new(store, collaborator)
    }

    fn user(text: &str) -> Turn {
        Turn::User(text.to_string())
    }

    fn ai(text: &str) -> Turn {
        Turn::Ai(text.to_string())
    }

    #[tokio::test]
    async fn test_first_generation_creates_chat() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("hi there", "u"));

        let result = session.generate_text("model-a", "hello").await;
        assert_eq!(result, Ok("hi there".to_string()));

        let history = session.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].messages, vec![user("hello"), ai("hi there")]);
        assert_eq!(session.active_index(), Some(0));
    }

    #[tokio::test]
    async fn test_sequential_calls_append_in_order() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("re: {prompt}", "u"));

        for prompt in ["one", "two", "three"] {
            session.generate_text("m", prompt).await.unwrap();
        }

        let history = session.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].messages,
            vec![
                user("one"), ai("re: one"),
                user("two"), ai("re: two"),
                user("three"), ai("re: three"),
            ]
        );
    }

    #[tokio::test]
    async fn test_response_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("  padded\n", " https://img/a.png \n"));

        assert_eq!(session.generate_text("m", "p").await, Ok("padded".to_string()));
        assert_eq!(
            session.generate_image("m", "p").await,
            Ok("https://img/a.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_busy_lane_rejects_second_request() {
        let dir = TempDir::new().unwrap();
        let gated = Arc::new(GatedCollaborator {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let session = Arc::new(controller(&dir, gated.clone()));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.generate_text("m", "first").await })
        };
        gated.entered.notified().await;

        let second = session.generate_text("m", "second").await;
        assert_eq!(second, Err(GenerationError::InProgress(Lane::Text)));
        assert_eq!(ui_message(&second), GENERATION_IN_PROGRESS);

        // The image lane is independent of the busy text lane
        let image = session.generate_image("m", "picture").await;
        assert_eq!(image, Ok("https://img/quick.png".to_string()));

        gated.release.notify_one();
        assert_eq!(first.await.unwrap(), Ok("done".to_string()));

        let messages = &session.get_history()[0].messages;
        assert_eq!(
            messages,
            &vec![
                user("first"),
                user("picture"),
                Turn::Image("https://img/quick.png".to_string()),
                ai("done"),
            ]
        );
        assert!(!messages.contains(&user("second")));

        // Lane is free again after completion
        gated.release.notify_one();
        assert_eq!(session.generate_text("m", "third").await, Ok("done".to_string()));
    }

    #[tokio::test]
    async fn test_busy_image_lane_rejects_second_request() {
        let dir = TempDir::new().unwrap();
        let gated = Arc::new(GatedImageCollaborator {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let session = Arc::new(controller(&dir, gated.clone()));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.generate_image("m", "slow cat").await })
        };
        gated.entered.notified().await;

        let second = session.generate_image("m", "another cat").await;
        assert_eq!(second, Err(GenerationError::InProgress(Lane::Image)));

        // Text still flows while the image lane is busy
        assert_eq!(session.generate_text("m", "hello").await, Ok("quick".to_string()));

        gated.release.notify_one();
        assert_eq!(first.await.unwrap(), Ok("https://img/slow.png".to_string()));

        let messages = &session.get_history()[0].messages;
        assert_eq!(
            messages,
            &vec![
                user("slow cat"),
                user("hello"),
                ai("quick"),
                Turn::Image("https://img/slow.png".to_string()),
            ]
        );
        assert!(!messages.contains(&user("another cat")));
    }

    #[tokio::test]
    async fn test_save_chat_ends_session() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("ok", "u"));

        session.generate_text("m", "first chat").await.unwrap();
        session.save_chat();

        let history = session.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(session.active_index(), None);

        session.generate_text("m", "second chat").await.unwrap();
        let history = session.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].messages, vec![user("first chat"), ai("ok")]);
        assert_eq!(history[1].messages, vec![user("second chat"), ai("ok")]);
        assert_eq!(session.active_index(), Some(1));
    }

    #[tokio::test]
    async fn test_save_chat_without_active_is_noop() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("ok", "u"));
        session.save_chat();
        assert!(session.get_history().is_empty());
        assert!(!dir.path().join("chat_history.json").exists());
    }

    #[tokio::test]
    async fn test_load_chat_continues_existing_chat() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("ok {prompt}", "u"));

        session.generate_text("m", "a").await.unwrap();
        session.save_chat();
        session.generate_text("m", "b").await.unwrap();
        session.save_chat();

        let first = session.get_history()[0].messages.clone();
        session.load_chat(Some(0));
        assert_eq!(session.active_index(), Some(0));
        assert_eq!(session.active_chat().unwrap().messages, first);

        session.generate_text("m", "c").await.unwrap();
        let history = session.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history[0].messages,
            vec![user("a"), ai("ok a"), user("c"), ai("ok c")]
        );
    }

    #[tokio::test]
    async fn test_load_chat_picks_selected_among_identical_transcripts() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("ok", "u"));

        session.generate_text("m", "hi").await.unwrap();
        session.save_chat();
        session.generate_text("m", "hi").await.unwrap();
        session.save_chat();
        let history = session.get_history();
        assert_eq!(history[0].messages, history[1].messages);

        session.load_chat(Some(0));
        assert_eq!(session.active_index(), Some(0));

        session.generate_text("m", "follow-up").await.unwrap();
        let history = session.get_history();
        assert_eq!(history[0].messages, vec![user("hi"), ai("ok"), user("follow-up"), ai("ok")]);
        assert_eq!(history[1].messages, vec![user("hi"), ai("ok")]);
    }

    #[tokio::test]
    async fn test_load_chat_out_of_range_clears_active() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("ok", "u"));

        session.generate_text("m", "hi").await.unwrap();
        session.load_chat(Some(5));
        assert_eq!(session.active_index(), None);
        assert_eq!(session.get_history().len(), 1);
    }

    #[tokio::test]
    async fn test_load_chat_none_clears_active() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("ok", "u"));

        session.generate_text("m", "hi").await.unwrap();
        session.load_chat(None);
        assert_eq!(session.active_index(), None);
        assert_eq!(session.get_history().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_image_keeps_only_user_turn() {
        let dir = TempDir::new().unwrap();
        let collaborator = Arc::new(StubCollaborator {
            text: Some("ok".to_string()),
            image: None,
        });
        let session = controller(&dir, collaborator);

        let result = session.generate_image("dall-e-3", "a snarky robot").await;
        let message = ui_message(&result);
        assert!(is_error_message(&message));
        assert!(message.contains("boom"));

        let chat = session.active_chat().unwrap();
        assert_eq!(chat.messages, vec![user("a snarky robot")]);

        // The chat created for the failed attempt is still usable
        session.generate_text("m", "again").await.unwrap();
        assert_eq!(session.get_history().len(), 1);
        assert_eq!(
            session.active_chat().unwrap().messages,
            vec![user("a snarky robot"), user("again"), ai("ok")]
        );
    }

    #[tokio::test]
    async fn test_history_is_persisted_and_reloaded() {
        let dir = TempDir::new().unwrap();
        {
            let session = controller(&dir, StubCollaborator::replying("hi there", "u"));
            session.generate_text("model-a", "hello").await.unwrap();
        }

        let reopened = controller(&dir, StubCollaborator::replying("x", "u"));
        let history = reopened.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].messages, vec![user("hello"), ai("hi there")]);
        assert_eq!(reopened.active_index(), None);
    }

    #[tokio::test]
    async fn test_set_collaborator_switches_provider() {
        let dir = TempDir::new().unwrap();
        let session = controller(&dir, StubCollaborator::replying("first", "u"));
        session.set_collaborator(StubCollaborator::replying("second", "u"));
        assert_eq!(session.generate_text("m", "p").await, Ok("second".to_string()));
    }

    #[test]
    fn test_ui_message_conventions() {
        assert_eq!(ui_message(&Ok("fine".to_string())), "fine");
        let err = Err(GenerationError::Collaborator("timeout".to_string()));
        assert_eq!(ui_message(&err), "Error: timeout");
        assert!(!is_error_message("fine"));
    }
}
