//! Guard settings: flood control and raid mode, one document per chat.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Action applied when a user trips flood control.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FloodAction {
    /// Ban permanently
    Ban,
    /// Ban then unban immediately, so the user can rejoin
    Kick,
    /// Mute permanently
    Mute,
    /// Ban for a configured duration
    TempBan,
    /// Mute for a configured duration
    TempMute,
}

impl Default for FloodAction {
    fn default() -> Self {
        Self::Mute
    }
}

/// Flood control configuration for a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodConfig {
    /// Consecutive-message limit. 0 disables flood control; any other value
    /// must be greater than 3.
    #[serde(default)]
    pub limit: u32,

    /// Action on breach.
    #[serde(default)]
    pub action: FloodAction,

    /// Duration string (`4m`, `3h`, `6d`, `5w`) for temp-ban / temp-mute.
    #[serde(default)]
    pub action_duration: Option<String>,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            limit: 0,
            action: FloodAction::default(),
            action_duration: None,
        }
    }
}

/// Raid mode state for a chat.
///
/// The toggle duration and the join temp-ban duration are distinct named
/// fields and are configured independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaidSettings {
    /// Whether raid mode is currently active.
    #[serde(default)]
    pub enabled: bool,

    /// How long raid mode stays on once enabled, in seconds.
    #[serde(default = "default_raid_duration")]
    pub raid_duration_secs: u64,

    /// How long joiners are temp-banned while raid mode is active, in seconds.
    #[serde(default = "default_action_duration")]
    pub action_duration_secs: u64,
}

fn default_raid_duration() -> u64 {
    21600 // 6 hours
}

fn default_action_duration() -> u64 {
    3600 // 1 hour
}

impl Default for RaidSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            raid_duration_secs: default_raid_duration(),
            action_duration_secs: default_action_duration(),
        }
    }
}

/// Per-chat guard document: flood + raid + flood exemptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSettings {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Telegram chat ID (indexed)
    pub chat_id: i64,

    #[serde(default)]
    pub flood: FloodConfig,

    #[serde(default)]
    pub raid: RaidSettings,

    /// Approved user IDs (exempt from flood control).
    #[serde(default)]
    pub approved_users: Vec<u64>,
}

impl GuardSettings {
    /// Create new settings with defaults.
    pub fn new(chat_id: i64) -> Self {
        Self {
            id: None,
            chat_id,
            flood: FloodConfig::default(),
            raid: RaidSettings::default(),
            approved_users: Vec::new(),
        }
    }

    /// Check if a user is approved.
    pub fn is_approved(&self, user_id: u64) -> bool {
        self.approved_users.contains(&user_id)
    }

    /// Approve a user. Returns false if already approved.
    pub fn approve(&mut self, user_id: u64) -> bool {
        if self.approved_users.contains(&user_id) {
            return false;
        }
        self.approved_users.push(user_id);
        true
    }

    /// Unapprove a user. Returns false if not approved.
    pub fn unapprove(&mut self, user_id: u64) -> bool {
        match self.approved_users.iter().position(|&id| id == user_id) {
            Some(pos) => {
                self.approved_users.remove(pos);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approvals() {
        let mut settings = GuardSettings::new(1);
        assert!(settings.approve(10));
        assert!(!settings.approve(10));
        assert!(settings.is_approved(10));
        assert!(settings.unapprove(10));
        assert!(!settings.unapprove(10));
        assert!(!settings.is_approved(10));
    }

    #[test]
    fn test_raid_defaults_are_distinct_fields() {
        let raid = RaidSettings::default();
        assert!(!raid.enabled);
        assert_eq!(raid.raid_duration_secs, 21600);
        assert_eq!(raid.action_duration_secs, 3600);
    }
}
