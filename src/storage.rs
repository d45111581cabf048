//! Per-user key-value storage.
//!
//! Each key is one file inside the data directory. On top of the raw store
//! sit the two values the app keeps: the theme name and the versioned
//! conversation record.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::conversation::{ChatMessage, Conversation};
use crate::theme::Theme;

pub const CONVERSATION_KEY: &str = "saved-chats";
pub const THEME_KEY: &str = "theme-color";
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", key)),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        // Write beside the target and rename so a crash never leaves half a value
        let tmp = self.path_for(&format!(".{}.tmp", key));
        fs::write(&tmp, value).with_context(|| format!("Failed to write {}", key))?;
        fs::rename(&tmp, self.path_for(key)).with_context(|| format!("Failed to replace {}", key))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", key)),
        }
    }

    pub fn load_theme(&self) -> Result<Theme> {
        Ok(self
            .get(THEME_KEY)?
            .map(|name| Theme::from_stored(&name))
            .unwrap_or_default())
    }

    pub fn save_theme(&self, theme: Theme) -> Result<()> {
        self.set(THEME_KEY, theme.as_str())
    }

    /// Load the saved conversation. Unreadable or unknown-version records are
    /// logged and treated as an empty conversation.
    pub fn load_conversation(&self) -> Result<Conversation> {
        let Some(raw) = self.get(CONVERSATION_KEY)? else {
            return Ok(Conversation::new());
        };

        let record: ConversationRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable saved conversation");
                return Ok(Conversation::new());
            }
        };

        if record.version != RECORD_VERSION {
            warn!(version = record.version, "ignoring saved conversation with unknown version");
            return Ok(Conversation::new());
        }

        debug!(messages = record.messages.len(), "loaded saved conversation");
        Ok(Conversation::from_messages(record.messages))
    }

    pub fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        let record = ConversationRecord {
            version: RECORD_VERSION,
            saved_at: Utc::now(),
            messages: conversation.persistable(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        self.set(CONVERSATION_KEY, &json)?;
        debug!(messages = record.messages.len(), "saved conversation");
        Ok(())
    }

    pub fn clear_conversation(&self) -> Result<()> {
        self.remove(CONVERSATION_KEY)
    }
}
