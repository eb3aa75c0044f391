//! Blue-text cleanup.
//!
//! Other bots leave clickable command text behind; when a chat enables
//! cleaning, messages that look like commands but match none of our
//! registrations are deleted. The comparison runs against the live command
//! registry so a registered command is never a false positive.

use teloxide::prelude::*;
use teloxide::types::Message;
use tracing::debug;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::middleware::registry::Lookup;
use crate::permissions::BotRight;

/// Delete a command-looking message that matches no known command.
pub async fn check_bluetext(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
) -> anyhow::Result<()> {
    if !msg.chat.is_group() && !msg.chat.is_supergroup() {
        return Ok(());
    }

    let text = match msg.text() {
        Some(t) => t.trim(),
        None => return Ok(()),
    };

    // Only command-shaped text that matches no registration is blue-text;
    // anything the registry knows (ours, or ours addressed to another bot)
    // is left alone.
    let token = match state.commands.lookup(text, &state.bot_username) {
        Lookup::Unknown { token } => token,
        _ => return Ok(()),
    };

    let policy = state.policy.get_or_default(msg.chat.id.0).await?;
    if !policy.clean_bluetext {
        return Ok(());
    }

    if policy.bluetext_ignored.iter().any(|t| t == &token) {
        return Ok(());
    }
    let global = state.policy.global_policy().await?;
    if global.bluetext_ignored.iter().any(|t| t == &token) {
        return Ok(());
    }

    // Deleting needs a live right; don't trust anything cached.
    let can_delete = state
        .gate
        .admins()
        .bot_has(msg.chat.id, BotRight::Delete)
        .await
        .unwrap_or(false);
    if !can_delete {
        return Ok(());
    }

    debug!("Cleaning blue-text '{}' in chat {}", token, msg.chat.id);
    let _ = bot.delete_message(msg.chat.id, msg.id).await;

    Ok(())
}
