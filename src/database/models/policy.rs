//! Dispatch policy models: disabled commands, denial policy, blue-text
//! cleaning and the log-channel binding.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Per-chat dispatch policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPolicy {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Telegram chat ID (indexed)
    pub chat_id: i64,

    /// Commands disabled in this chat (names without prefix, lowercase).
    #[serde(default)]
    pub disabled_commands: Vec<String>,

    /// Permission-denial policy override; None falls back to the global
    /// default from config.
    #[serde(default)]
    pub quiet_deny: Option<bool>,

    /// Delete command-looking messages that match no registered command.
    #[serde(default)]
    pub clean_bluetext: bool,

    /// Tokens the blue-text cleaner must leave alone in this chat.
    #[serde(default)]
    pub bluetext_ignored: Vec<String>,

    /// Channel receiving this chat's audit log, if configured.
    #[serde(default)]
    pub log_channel: Option<i64>,
}

impl ChatPolicy {
    pub fn new(chat_id: i64) -> Self {
        Self {
            id: None,
            chat_id,
            disabled_commands: Vec::new(),
            quiet_deny: None,
            clean_bluetext: false,
            bluetext_ignored: Vec::new(),
            log_channel: None,
        }
    }

    pub fn is_disabled(&self, command: &str) -> bool {
        self.disabled_commands.iter().any(|c| c == command)
    }
}

/// Singleton document for process-wide policy (global blue-text ignores).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalPolicy {
    /// Fixed key so the collection holds exactly one document.
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(default)]
    pub bluetext_ignored: Vec<String>,
}

impl GlobalPolicy {
    pub const KEY: &'static str = "global";

    pub fn new() -> Self {
        Self {
            id: Self::KEY.to_string(),
            bluetext_ignored: Vec::new(),
        }
    }
}

impl Default for GlobalPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_disabled() {
        let mut policy = ChatPolicy::new(1);
        assert!(!policy.is_disabled("setflood"));

        policy.disabled_commands.push("setflood".to_string());
        assert!(policy.is_disabled("setflood"));
        assert!(!policy.is_disabled("flood"));
    }
}
