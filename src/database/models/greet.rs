//! Greeting and join-verification models.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Join-verification mode for a chat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// No verification.
    Off,
    /// Restrict media-sending for 24 hours, no bookkeeping.
    Soft,
    /// Mute until the joiner taps an "I'm human" button.
    Strong,
    /// Mute until the joiner taps the correct code button.
    Captcha,
}

impl Default for VerifyMode {
    fn default() -> Self {
        Self::Off
    }
}

impl VerifyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Soft => "soft",
            Self::Strong => "strong",
            Self::Captcha => "captcha",
        }
    }
}

/// Per-chat greeting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetSettings {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Telegram chat ID (indexed)
    pub chat_id: i64,

    /// Whether to greet new members at all.
    #[serde(default = "default_true")]
    pub welcome_enabled: bool,

    /// Custom welcome template with fillings; None uses the defaults.
    #[serde(default)]
    pub template: Option<String>,

    #[serde(default)]
    pub verify_mode: VerifyMode,

    /// Delete the previous welcome message when a new one is sent.
    #[serde(default)]
    pub clean_welcome: bool,

    /// Message ID of the last welcome sent, for clean_welcome.
    #[serde(default)]
    pub last_welcome_msg: Option<i32>,

    /// Delete join/leave service messages.
    #[serde(default)]
    pub clean_service: bool,
}

fn default_true() -> bool {
    true
}

impl GreetSettings {
    pub fn new(chat_id: i64) -> Self {
        Self {
            id: None,
            chat_id,
            welcome_enabled: true,
            template: None,
            verify_mode: VerifyMode::Off,
            clean_welcome: false,
            last_welcome_msg: None,
            clean_service: false,
        }
    }
}

/// A join-verification in flight. At most one per (chat, user).
///
/// Persisted; rows are re-armed on startup and the deadline handler
/// re-reads the row before acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingVerification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub chat_id: i64,
    pub user_id: u64,

    pub mode: VerifyMode,

    /// The one correct captcha code (captcha mode only).
    #[serde(default)]
    pub captcha_answer: Option<u32>,

    /// Welcome text deferred until verification succeeds.
    #[serde(default)]
    pub welcome_text: Option<String>,

    /// Message ID of the challenge message, edited or deleted on resolution.
    pub challenge_msg_id: i32,

    /// Unix timestamp after which the joiner is removed.
    pub deadline: i64,
}

/// A user who passed verification in a chat; never challenged again there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedHuman {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub chat_id: i64,
    pub user_id: u64,
}
