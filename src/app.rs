use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::controller::{ConversationController, Submission, TypingProgress};
use crate::conversation::{ChatRole, MessageStatus};
use crate::error::ChatError;
use crate::gemini::GeminiClient;
use crate::storage::Store;
use crate::theme::Theme;

/// How long the copy control shows its confirmation mark
pub const COPY_FEEDBACK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub theme: Theme,

    // Input line
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Conversation
    pub controller: ConversationController,
    pub client: GeminiClient,
    pub request_task: Option<JoinHandle<Result<String, ChatError>>>,
    pub suggestions: Vec<String>,

    // Chat view (dimensions updated during render)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub follow_bottom: bool,
    pub selected_message: Option<usize>,
    pub scroll_to_selection: bool,
    pub chat_area: Option<Rect>,

    // Popups and transient feedback
    pub show_clear_confirm: bool,
    pub copied: Option<(usize, Instant)>,
    pub status_line: Option<String>,

    // Animation state
    pub animation_frame: u8,

    store: Store,
}

impl App {
    pub fn new(config: &Config, store: Store) -> anyhow::Result<Self> {
        let theme = store.load_theme().unwrap_or_else(|e| {
            warn!(error = %e, "could not read theme, using default");
            Theme::default()
        });
        let controller = ConversationController::load(store.clone(), config.loading_delay())?;
        let client = GeminiClient::from_config(config)?;

        if config.api_key.is_none() {
            warn!("no API key configured; requests will fail until one is set");
        }

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            theme,

            input: String::new(),
            input_cursor: 0,

            controller,
            client,
            request_task: None,
            suggestions: config.suggestions(),

            chat_scroll: 0,
            chat_height: 0,
            follow_bottom: true,
            selected_message: None,
            scroll_to_selection: false,
            chat_area: None,

            show_clear_confirm: false,
            copied: None,
            status_line: None,

            animation_frame: 0,

            store,
        })
    }

    /// Submit whatever is in the input line.
    pub fn submit_input(&mut self, now: Instant) {
        let text = self.input.clone();
        if self.submit(&text, now) {
            self.input.clear();
            self.input_cursor = 0;
        }
    }

    /// Submit a suggestion chip. Chips are only on screen with the header.
    pub fn submit_suggestion(&mut self, idx: usize, now: Instant) {
        if !self.controller.is_header_visible() {
            return;
        }
        if let Some(text) = self.suggestions.get(idx).cloned() {
            self.submit(&text, now);
        }
    }

    fn submit(&mut self, text: &str, now: Instant) -> bool {
        match self.controller.submit(text, now) {
            Submission::Accepted => {
                self.status_line = None;
                self.selected_message = None;
                self.follow_bottom = true;
                true
            }
            Submission::Busy => {
                self.status_line = Some("Wait for the current reply to finish".to_string());
                false
            }
            Submission::Empty => false,
        }
    }

    /// Advance timers: loading placeholder, typing reveal, copy feedback.
    pub fn on_tick(&mut self, now: Instant) {
        if self.controller.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 12;
        }

        if let Some(prompt) = self.controller.take_due_request(now) {
            self.spawn_request(prompt);
        }

        if self.controller.tick_typing() == TypingProgress::Finished {
            debug!(messages = self.controller.conversation().len(), "reply finished");
        }

        if let Some((_, at)) = self.copied {
            if now.duration_since(at) >= COPY_FEEDBACK {
                self.copied = None;
            }
        }
    }

    fn spawn_request(&mut self, prompt: String) {
        debug!(model = %self.client.model(), "spawning chat request");
        let client = self.client.clone();
        self.request_task = Some(tokio::spawn(async move { client.generate(&prompt).await }));
    }

    /// Hand a finished request back to the controller.
    pub async fn poll_request(&mut self) {
        let finished = self
            .request_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.request_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(ChatError::Task(e.to_string())),
            };
            self.controller.finish_request(result);
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(e) = self.store.save_theme(self.theme) {
            warn!(error = %e, "failed to save theme");
        }
    }

    pub fn request_clear(&mut self) {
        if self.controller.is_in_flight() {
            self.status_line = Some("Wait for the current reply to finish".to_string());
        } else {
            self.show_clear_confirm = true;
        }
    }

    pub fn confirm_clear(&mut self) {
        self.show_clear_confirm = false;
        match self.controller.clear() {
            Ok(true) => {
                self.selected_message = None;
                self.copied = None;
                self.chat_scroll = 0;
                self.follow_bottom = true;
                self.status_line = None;
            }
            Ok(false) => {
                self.status_line = Some("Wait for the current reply to finish".to_string());
            }
            Err(e) => {
                warn!(error = %e, "failed to clear conversation");
                self.status_line = Some(format!("Could not clear chats: {}", e));
            }
        }
    }

    // Message selection (for the copy control)
    pub fn select_next_message(&mut self) {
        let len = self.controller.conversation().len();
        if len > 0 {
            let next = self.selected_message.map(|i| (i + 1).min(len - 1)).unwrap_or(len - 1);
            self.selected_message = Some(next);
            self.scroll_to_selection = true;
        }
    }

    pub fn select_prev_message(&mut self) {
        let len = self.controller.conversation().len();
        if len > 0 {
            let prev = self.selected_message.map(|i| i.saturating_sub(1)).unwrap_or(len - 1);
            self.selected_message = Some(prev);
            self.scroll_to_selection = true;
        }
    }

    /// The message the copy control acts on: the selection, else the latest
    /// finished assistant reply.
    pub fn copy_target(&self) -> Option<usize> {
        let messages = self.controller.conversation().messages();
        if let Some(idx) = self.selected_message.filter(|i| *i < messages.len()) {
            return Some(idx);
        }
        messages
            .iter()
            .rposition(|m| m.role == ChatRole::Assistant && m.status == MessageStatus::Complete)
    }

    pub fn message_text(&self, idx: usize) -> Option<&str> {
        self.controller
            .conversation()
            .get(idx)
            .filter(|m| !m.status.is_transient())
            .map(|m| m.content.as_str())
    }

    pub fn mark_copied(&mut self, idx: usize, now: Instant) {
        self.copied = Some((idx, now));
    }

    pub fn is_copied(&self, idx: usize) -> bool {
        matches!(self.copied, Some((i, _)) if i == idx)
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    /// Scroll down; reaching the end resumes following new output (the
    /// renderer clamps and re-enables follow when the bottom is visible).
    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
    }
}
