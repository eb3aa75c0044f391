//! Flood detection.
//!
//! A per-chat counter of consecutive messages from the same author. The
//! whole read-modify-write happens inside one map entry operation, so two
//! interleaved updates for the same chat cannot lose a count.

use std::sync::Arc;

use dashmap::DashMap;
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, Message};
use tracing::{debug, info};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::FloodAction;
use crate::middleware::audit;
use crate::utils::{html_escape, mention_html, parse_duration};

#[derive(Debug, Default)]
struct FloodEntry {
    last_user: Option<u64>,
    count: u32,
}

/// In-memory consecutive-message counters, one per chat.
#[derive(Clone)]
pub struct FloodTracker {
    data: Arc<DashMap<i64, FloodEntry>>,
}

impl FloodTracker {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// Record a message and decide whether to act.
    ///
    /// The counter resets to 1 when the author changes and increments for a
    /// consecutive author. Crossing `limit` returns true exactly once and
    /// resets the counter in the same operation. `limit` 0 disables.
    pub fn record(&self, chat_id: i64, user_id: u64, limit: u32) -> bool {
        if limit == 0 {
            return false;
        }

        let mut entry = self.data.entry(chat_id).or_default();
        if entry.last_user == Some(user_id) {
            entry.count += 1;
        } else {
            entry.last_user = Some(user_id);
            entry.count = 1;
        }

        if entry.count > limit {
            entry.count = 0;
            true
        } else {
            false
        }
    }

    /// Break the current run without counting.
    ///
    /// Exempt authors (admins, approved or ranked users) reset the chat's
    /// counter but never participate in a flood themselves.
    pub fn reset(&self, chat_id: i64) {
        if let Some(mut entry) = self.data.get_mut(&chat_id) {
            entry.last_user = None;
            entry.count = 0;
        }
    }
}

impl Default for FloodTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-message flood check, run before command dispatch.
pub async fn check_flood(bot: &ThrottledBot, msg: &Message, state: &AppState) -> anyhow::Result<()> {
    if !msg.chat.is_group() && !msg.chat.is_supergroup() {
        return Ok(());
    }

    let user = match msg.from.as_ref() {
        Some(u) if !u.is_bot => u,
        _ => return Ok(()),
    };

    let chat_id = msg.chat.id;
    let settings = state.guard.get_or_default(chat_id.0).await?;
    if settings.flood.limit == 0 {
        return Ok(());
    }

    // Exempt authors break the run without counting toward one.
    let exempt = state.gate.is_privileged(user.id).await
        || settings.is_approved(user.id.0)
        || state
            .gate
            .admins()
            .is_admin(chat_id, user.id)
            .await
            .unwrap_or(false);
    if exempt {
        state.flood.reset(chat_id.0);
        return Ok(());
    }

    if !state.flood.record(chat_id.0, user.id.0, settings.flood.limit) {
        return Ok(());
    }

    debug!("User {} tripped flood control in chat {}", user.id, chat_id);

    let duration = settings
        .flood
        .action_duration
        .as_deref()
        .and_then(parse_duration);

    let outcome = match settings.flood.action {
        FloodAction::Ban => bot.ban_chat_member(chat_id, user.id).await.map(|_| "Banned".to_string()),
        FloodAction::Kick => match bot.ban_chat_member(chat_id, user.id).await {
            Ok(_) => {
                let _ = bot.unban_chat_member(chat_id, user.id).await;
                Ok("Kicked".to_string())
            }
            Err(e) => Err(e),
        },
        FloodAction::Mute => bot
            .restrict_chat_member(chat_id, user.id, ChatPermissions::empty())
            .await
            .map(|_| "Muted".to_string()),
        FloodAction::TempBan => {
            let until = chrono::Utc::now()
                + chrono::Duration::from_std(duration.unwrap_or_default())?;
            bot.ban_chat_member(chat_id, user.id)
                .until_date(until)
                .await
                .map(|_| {
                    format!(
                        "Banned for {}",
                        settings.flood.action_duration.as_deref().unwrap_or("a while")
                    )
                })
        }
        FloodAction::TempMute => {
            let until = chrono::Utc::now()
                + chrono::Duration::from_std(duration.unwrap_or_default())?;
            bot.restrict_chat_member(chat_id, user.id, ChatPermissions::empty())
                .until_date(until)
                .await
                .map(|_| {
                    format!(
                        "Muted for {}",
                        settings.flood.action_duration.as_deref().unwrap_or("a while")
                    )
                })
        }
    };

    match outcome {
        Ok(action_text) => {
            info!(
                "Flood action '{}' applied to user {} in chat {}",
                action_text, user.id, chat_id
            );
            bot.send_message(chat_id, format!("Beep boop! That's a flood.\n{}!", action_text))
                .await?;

            let log = format!(
                "<b>{}:</b>\n#FLOOD\n<b>User:</b> {}\nFlooded the group. {}.",
                html_escape(msg.chat.title().unwrap_or("Chat")),
                mention_html(user.id.0, &user.first_name),
                action_text
            );
            if let Err(e) = audit::forward(bot, &state.policy, msg, &log).await {
                tracing::warn!("Flood audit forwarding failed: {}", e);
            }
        }
        Err(_) => {
            // Restriction failed: flood control disables itself and says so.
            state.guard.set_flood_limit(chat_id.0, 0).await?;
            bot.send_message(
                chat_id,
                "I can't restrict people here, give me permissions first! \
                 Until then, I'll disable anti-flood.",
            )
            .await?;

            let log = format!(
                "<b>{}:</b>\n#INFO\nNot enough rights to restrict users, \
                 so anti-flood was automatically disabled.",
                html_escape(msg.chat.title().unwrap_or("Chat"))
            );
            if let Err(e) = audit::forward(bot, &state.policy, msg, &log).await {
                tracing::warn!("Flood audit forwarding failed: {}", e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::FloodTracker;

    #[test]
    fn test_breach_fires_once_at_limit_plus_one() {
        let tracker = FloodTracker::new();
        let limit = 4;

        for _ in 0..limit {
            assert!(!tracker.record(1, 10, limit));
        }
        // Message limit+1 triggers...
        assert!(tracker.record(1, 10, limit));
        // ...and the implicit reset means the next message does not.
        assert!(!tracker.record(1, 10, limit));
    }

    #[test]
    fn test_author_change_resets() {
        let tracker = FloodTracker::new();
        let limit = 4;

        for _ in 0..limit {
            assert!(!tracker.record(1, 10, limit));
        }
        // A different author interrupts the run.
        assert!(!tracker.record(1, 11, limit));
        // The original author starts over at 1.
        for _ in 0..limit {
            assert!(!tracker.record(1, 10, limit));
        }
        assert!(tracker.record(1, 10, limit));
    }

    #[test]
    fn test_exempt_reset_breaks_run_without_counting() {
        let tracker = FloodTracker::new();
        let limit = 4;

        for _ in 0..limit {
            tracker.record(1, 10, limit);
        }
        // An admin message in between resets the chat.
        tracker.reset(1);
        assert!(!tracker.record(1, 10, limit));
    }

    #[test]
    fn test_zero_limit_disables() {
        let tracker = FloodTracker::new();
        for _ in 0..100 {
            assert!(!tracker.record(1, 10, 0));
        }
    }

    #[test]
    fn test_chats_are_independent() {
        let tracker = FloodTracker::new();
        for _ in 0..5 {
            tracker.record(1, 10, 4);
        }
        assert!(!tracker.record(2, 10, 4));
    }
}
