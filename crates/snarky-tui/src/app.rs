use std::sync::{Arc, OnceLock};

use ratatui::widgets::ListState;
use regex::Regex;
use snarky_core::{
    open_url, ui_message, Chat, ChatHistory, Collaborator, Config, GenerationError,
    GenerationResult, Lane, Provider, ProviderClient, SessionController, Turn,
};
use tokio::task::JoinHandle;

/// Prefix in the input line that routes a prompt to the image lane
pub const IMAGE_COMMAND: &str = "/image ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Chat,
}

/// A generation running on a background task
pub struct PendingGeneration {
    pub lane: Lane,
    pub task: JoinHandle<GenerationResult>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Input line
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Chat state, refreshed from the session controller
    pub session: Arc<SessionController>,
    pub history: ChatHistory,
    pub active: Option<usize>,
    pub sidebar_state: ListState,
    pub chat_scroll: u16, // lines scrolled up from the bottom

    // In-flight generations
    pub pending: Vec<PendingGeneration>,
    pub status: Option<String>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Provider state
    pub config: Config,
    pub provider: Provider,
    pub text_model: String,
    pub image_model: String,
}

impl App {
    pub fn new(session: Arc<SessionController>, config: Config, provider: Provider) -> Self {
        let text_model = config.text_model_for(provider);
        let image_model = config.image_model_for(provider);

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Chat,

            input: String::new(),
            input_cursor: 0,

            session,
            history: ChatHistory::new(),
            active: None,
            sidebar_state: ListState::default(),
            chat_scroll: 0,

            pending: Vec::new(),
            status: None,
            animation_frame: 0,

            config,
            provider,
            text_model,
            image_model,
        };
        app.refresh();
        if !app.history.is_empty() {
            app.sidebar_state.select(Some(app.history.len() - 1));
        }
        app
    }

    /// Pull the latest history snapshot from the session controller
    pub fn refresh(&mut self) {
        self.history = self.session.get_history();
        self.active = self.session.active_index();
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.active.and_then(|i| self.history.get(i))
    }

    pub fn is_busy(&self, lane: Lane) -> bool {
        self.pending.iter().any(|p| p.lane == lane && !p.task.is_finished())
    }

    /// Send the input line. A `/image ` prefix targets the image lane.
    pub fn submit_input(&mut self, lane: Lane) {
        let raw = std::mem::take(&mut self.input);
        self.input_cursor = 0;

        let (lane, prompt) = match raw.strip_prefix(IMAGE_COMMAND) {
            Some(rest) => (Lane::Image, rest.trim().to_string()),
            None => (lane, raw.trim().to_string()),
        };
        if prompt.is_empty() {
            return;
        }

        self.spawn_generation(lane, prompt);
    }

    pub fn spawn_generation(&mut self, lane: Lane, prompt: String) {
        let session = self.session.clone();
        let task = match lane {
            Lane::Text => {
                let model = self.text_model.clone();
                tokio::spawn(async move { session.generate_text(&model, &prompt).await })
            }
            Lane::Image => {
                let model = self.image_model.clone();
                tokio::spawn(async move { session.generate_image(&model, &prompt).await })
            }
        };
        self.pending.push(PendingGeneration { lane, task });
        self.status = None;
        self.chat_scroll = 0;
    }

    /// Reap finished generations and surface their outcome in the status line
    pub async fn collect_finished(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.task.is_finished());
        self.pending = running;
        if finished.is_empty() {
            return;
        }

        let mut first_error = None;
        for generation in finished {
            let result = match generation.task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("{} generation task failed: {}", generation.lane, e);
                    Err(GenerationError::Collaborator(e.to_string()))
                }
            };
            if result.is_err() && first_error.is_none() {
                first_error = Some(ui_message(&result));
            }
        }
        self.status = first_error;
    }

    /// Finish the current chat; the next prompt starts a new one
    pub fn new_chat(&mut self) {
        self.session.save_chat();
        self.refresh();
        self.chat_scroll = 0;
        self.status = Some("Started a new chat".to_string());
    }

    /// Make the chat selected in the sidebar the active chat
    pub fn load_selected_chat(&mut self) {
        if self.history.is_empty() {
            return;
        }
        self.session.load_chat(self.sidebar_state.selected());
        self.refresh();
        self.chat_scroll = 0;
        self.focus = FocusPane::Chat;
    }

    pub fn sidebar_down(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.sidebar_state.selected() {
            Some(i) => (i + 1).min(self.history.len() - 1),
            None => 0,
        };
        self.sidebar_state.select(Some(next));
    }

    pub fn sidebar_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let prev = self.sidebar_state.selected().map(|i| i.saturating_sub(1)).unwrap_or(0);
        self.sidebar_state.select(Some(prev));
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Open the most recent image or link in the active chat
    pub fn open_latest_link(&mut self) {
        match self.active_chat().and_then(latest_link) {
            Some(url) => {
                open_url(&url);
                self.status = Some(format!("Opened {}", url));
            }
            None => self.status = Some("No link in the current chat".to_string()),
        }
    }

    pub fn cycle_provider(&mut self) {
        let next = self.provider.next();
        match ProviderClient::from_config(next, &self.config) {
            Ok(client) => {
                let collaborator: Arc<dyn Collaborator> = Arc::new(client);
                self.session.set_collaborator(collaborator);
                self.provider = next;
                self.text_model = self.config.text_model_for(next);
                self.image_model = self.config.image_model_for(next);
                self.status = Some(format!("Using {}", next.display_name()));
            }
            Err(e) => {
                tracing::warn!("Cannot switch to {}: {}", next.as_str(), e);
                self.status = Some(format!("Error: {}", e));
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if !self.pending.is_empty() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

fn link_regex() -> &'static Regex {
    static LINK: OnceLock<Regex> = OnceLock::new();
    LINK.get_or_init(|| Regex::new(r#"https?://[^\s)\]>"']+"#).expect("link pattern is valid"))
}

/// Latest image URL, or latest link inside an AI reply
pub fn latest_link(chat: &Chat) -> Option<String> {
    chat.messages.iter().rev().find_map(|turn| match turn {
        Turn::Image(url) => Some(url.clone()),
        Turn::Ai(text) => link_regex()
            .find_iter(text)
            .last()
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']).to_string()),
        Turn::User(_) => None,
    })
}
