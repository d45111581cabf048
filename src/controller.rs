//! Lifecycle of one chat turn.
//!
//! ```text
//! Idle --submit--> Scheduled --delay elapsed--> Loading --reply--> Typing --last word--> Idle
//!                                                  \--error--------------------------> Idle
//! ```
//!
//! The in-flight guard is set on submit and released either when the last
//! word of the reply is revealed or when the request fails.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::conversation::{ChatMessage, Conversation, MessageStatus};
use crate::error::ChatError;
use crate::storage::Store;
use crate::typing::TypingAnimator;

#[derive(Debug)]
enum Phase {
    Idle,
    Scheduled { at: Instant, prompt: String },
    Loading,
    Typing(TypingAnimator),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    Empty,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingProgress {
    /// Nothing is being revealed
    Idle,
    Revealed,
    /// Last word revealed; the guard is released and the conversation saved
    Finished,
}

pub struct ConversationController {
    conversation: Conversation,
    store: Store,
    in_flight: bool,
    header_visible: bool,
    phase: Phase,
    loading_delay: Duration,
}

impl ConversationController {
    /// Restore the saved conversation. The header banner shows only when
    /// there is nothing to display.
    pub fn load(store: Store, loading_delay: Duration) -> Result<Self> {
        let conversation = store.load_conversation()?;
        let header_visible = conversation.is_empty();

        Ok(Self {
            conversation,
            store,
            in_flight: false,
            header_visible,
            phase: Phase::Idle,
            loading_delay,
        })
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_header_visible(&self) -> bool {
        self.header_visible
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading)
    }

    pub fn is_typing(&self) -> bool {
        matches!(self.phase, Phase::Typing(_))
    }

    /// Accept a user message. The caller clears its input line on `Accepted`.
    pub fn submit(&mut self, input: &str, now: Instant) -> Submission {
        let text = input.trim();
        if text.is_empty() {
            return Submission::Empty;
        }
        if self.in_flight {
            debug!("dropping submission while a response is in flight");
            return Submission::Busy;
        }

        self.in_flight = true;
        self.conversation.push(ChatMessage::user(text));
        self.header_visible = false;
        self.phase = Phase::Scheduled {
            at: now + self.loading_delay,
            prompt: text.to_string(),
        };
        info!(chars = text.chars().count(), "message submitted");
        Submission::Accepted
    }

    /// Once the loading delay has passed, insert the placeholder and hand
    /// back the prompt that should be sent.
    pub fn take_due_request(&mut self, now: Instant) -> Option<String> {
        match &self.phase {
            Phase::Scheduled { at, .. } if now >= *at => {}
            _ => return None,
        }

        let Phase::Scheduled { prompt, .. } = std::mem::replace(&mut self.phase, Phase::Loading) else {
            return None;
        };
        self.conversation.push(ChatMessage::loading());
        Some(prompt)
    }

    pub fn finish_request(&mut self, result: Result<String, ChatError>) {
        if !self.is_loading() {
            warn!("response arrived with no request outstanding");
            return;
        }

        let Some(placeholder) = self.conversation.last_mut() else {
            self.phase = Phase::Idle;
            self.in_flight = false;
            return;
        };

        match result {
            Ok(text) => {
                placeholder.status = MessageStatus::Typing;
                let animator = TypingAnimator::new(&text);
                debug!(words = animator.word_count(), "starting typing reveal");
                self.phase = Phase::Typing(animator);
            }
            Err(e) => {
                warn!(error = %e, "chat request failed");
                placeholder.content = e.to_string();
                placeholder.status = MessageStatus::Error;
                self.phase = Phase::Idle;
                self.in_flight = false;
            }
        }
    }

    /// Reveal one more word of the reply.
    pub fn tick_typing(&mut self) -> TypingProgress {
        let Phase::Typing(animator) = &mut self.phase else {
            return TypingProgress::Idle;
        };

        if animator.tick().is_none() {
            return TypingProgress::Idle;
        }
        let shown = animator.revealed().to_string();
        let done = animator.is_done();

        if let Some(message) = self.conversation.last_mut() {
            message.content = shown;
            if done {
                message.status = MessageStatus::Complete;
            }
        }

        if !done {
            return TypingProgress::Revealed;
        }

        self.phase = Phase::Idle;
        self.in_flight = false;
        if let Err(e) = self.store.save_conversation(&self.conversation) {
            warn!(error = %e, "failed to save conversation");
        }
        TypingProgress::Finished
    }

    /// Delete every message and the saved copy. Refused while a reply is in
    /// flight since the reveal cannot be interrupted.
    pub fn clear(&mut self) -> Result<bool> {
        if self.in_flight {
            debug!("refusing to clear while a response is in flight");
            return Ok(false);
        }

        self.store.clear_conversation()?;
        self.conversation.clear();
        self.header_visible = true;
        info!("conversation cleared");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ChatRole;

    const DELAY: Duration = Duration::from_millis(500);

    fn controller() -> (tempfile::TempDir, ConversationController) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let controller = ConversationController::load(store, DELAY).unwrap();
        (dir, controller)
    }

    /// Drive a submission up to the point where the request is sent.
    fn submit_and_send(controller: &mut ConversationController, text: &str) -> String {
        let now = Instant::now();
        assert_eq!(controller.submit(text, now), Submission::Accepted);
        controller.take_due_request(now + DELAY).unwrap()
    }

    fn run_typing(controller: &mut ConversationController) -> Vec<String> {
        let mut updates = Vec::new();
        loop {
            match controller.tick_typing() {
                TypingProgress::Idle => break,
                TypingProgress::Revealed => {
                    updates.push(controller.conversation().messages().last().unwrap().content.clone());
                }
                TypingProgress::Finished => {
                    updates.push(controller.conversation().messages().last().unwrap().content.clone());
                    break;
                }
            }
        }
        updates
    }

    #[test]
    fn test_empty_submission_is_noop() {
        let (_dir, mut controller) = controller();

        assert_eq!(controller.submit("", Instant::now()), Submission::Empty);
        assert_eq!(controller.submit("   \n\t", Instant::now()), Submission::Empty);
        assert!(controller.conversation().is_empty());
        assert!(!controller.is_in_flight());
        assert!(controller.is_header_visible());
    }

    #[test]
    fn test_submission_while_in_flight_is_noop() {
        let (_dir, mut controller) = controller();
        let now = Instant::now();

        assert_eq!(controller.submit("first", now), Submission::Accepted);
        assert_eq!(controller.submit("second", now), Submission::Busy);
        assert_eq!(controller.conversation().len(), 1);
        assert!(controller.is_in_flight());
    }

    #[test]
    fn test_submit_appends_trimmed_message_and_hides_header() {
        let (_dir, mut controller) = controller();

        controller.submit("  hello  ", Instant::now());
        let msg = &controller.conversation().messages()[0];
        assert_eq!(msg.role, ChatRole::User);
        assert_eq!(msg.content, "hello");
        assert!(!controller.is_header_visible());
    }

    #[test]
    fn test_placeholder_waits_for_delay() {
        let (_dir, mut controller) = controller();
        let now = Instant::now();
        controller.submit("hello", now);

        assert_eq!(controller.take_due_request(now + Duration::from_millis(499)), None);
        assert_eq!(controller.conversation().len(), 1);

        assert_eq!(controller.take_due_request(now + DELAY).as_deref(), Some("hello"));
        assert!(controller.is_loading());
        let placeholder = controller.conversation().messages().last().unwrap();
        assert_eq!(placeholder.status, MessageStatus::Loading);

        // Only sent once
        assert_eq!(controller.take_due_request(now + DELAY * 2), None);
    }

    #[test]
    fn test_success_reveals_word_by_word_then_saves() {
        let (dir, mut controller) = controller();
        submit_and_send(&mut controller, "hi");

        controller.finish_request(Ok("Hello there, friend".to_string()));
        assert!(!controller.is_loading());
        assert!(controller.is_in_flight());

        let updates = run_typing(&mut controller);
        assert_eq!(updates, vec!["Hello", "Hello there,", "Hello there, friend"]);
        assert!(!controller.is_in_flight());
        assert_eq!(
            controller.conversation().messages().last().unwrap().status,
            MessageStatus::Complete
        );
        assert_eq!(controller.tick_typing(), TypingProgress::Idle);

        let reloaded = ConversationController::load(Store::new(dir.path()), DELAY).unwrap();
        assert_eq!(reloaded.conversation(), controller.conversation());
        assert!(!reloaded.is_header_visible());
    }

    #[test]
    fn test_nothing_saved_before_reveal_finishes() {
        let (dir, mut controller) = controller();
        submit_and_send(&mut controller, "hi");
        controller.finish_request(Ok("one two".to_string()));
        assert_eq!(controller.tick_typing(), TypingProgress::Revealed);

        let store = Store::new(dir.path());
        assert!(store.load_conversation().unwrap().is_empty());
    }

    #[test]
    fn test_failure_renders_error_and_releases_guard() {
        let (_dir, mut controller) = controller();
        submit_and_send(&mut controller, "hi");

        controller.finish_request(Err(ChatError::Api("quota exceeded".to_string())));

        let last = controller.conversation().messages().last().unwrap();
        assert_eq!(last.content, "quota exceeded");
        assert_eq!(last.status, MessageStatus::Error);
        assert!(!controller.is_loading());
        assert!(!controller.is_in_flight());

        // The next turn is accepted
        assert_eq!(controller.submit("again", Instant::now()), Submission::Accepted);
    }

    #[test]
    fn test_clear_empties_storage_and_shows_header() {
        let (dir, mut controller) = controller();
        submit_and_send(&mut controller, "hi");
        controller.finish_request(Ok("done".to_string()));
        run_typing(&mut controller);
        assert!(!controller.is_header_visible());

        assert!(controller.clear().unwrap());
        assert!(controller.conversation().is_empty());
        assert!(controller.is_header_visible());
        assert_eq!(Store::new(dir.path()).get(crate::storage::CONVERSATION_KEY).unwrap(), None);
    }

    #[test]
    fn test_clear_refused_while_in_flight() {
        let (_dir, mut controller) = controller();
        controller.submit("hi", Instant::now());

        assert!(!controller.clear().unwrap());
        assert_eq!(controller.conversation().len(), 1);
    }

    #[test]
    fn test_stray_response_is_ignored() {
        let (_dir, mut controller) = controller();
        controller.finish_request(Ok("unexpected".to_string()));
        assert!(controller.conversation().is_empty());
        assert!(!controller.is_in_flight());
    }
}
