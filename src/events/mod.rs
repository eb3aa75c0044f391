//! Event handlers.
//!
//! The unified message handler runs, in order: the chat-migration hook,
//! service-message cleanup, the flood detector, command dispatch, and the
//! blue-text cleaner. Chat-member updates route to the join gate.

pub mod cleaner;
pub mod flood;
pub mod join;
pub mod verify;

use teloxide::prelude::*;
use teloxide::types::Message;
use tracing::error;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::middleware::pipeline;
use crate::report::ErrorContext;

pub use flood::FloodTracker;

/// Unified per-message handler.
pub async fn on_message(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    // Telegram relabels the chat on group -> supergroup migration; every
    // stateful feature follows along before anything else happens.
    if let Some(new_chat_id) = msg.migrate_to_chat_id() {
        state.hooks.migrate_chat(msg.chat.id.0, new_chat_id.0).await;
        return Ok(());
    }

    // Join/leave service messages, deleted where the chat wants them gone.
    if msg.new_chat_members().is_some() || msg.left_chat_member().is_some() {
        let settings = state.greet.get_or_default(msg.chat.id.0).await?;
        if settings.clean_service {
            let _ = bot.delete_message(msg.chat.id, msg.id).await;
        }
        return Ok(());
    }

    // Flood accounting covers every group message, commands included, and
    // runs before dispatch.
    if let Err(e) = flood::check_flood(&bot, &msg, &state).await {
        error!("Flood check failed: {}", e);
        state
            .reporter
            .report(&bot, ErrorContext::from_message(&msg), &e)
            .await;
    }

    match pipeline::dispatch(&bot, &msg, &state).await {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(e) => {
            error!("Command dispatch failed: {}", e);
            state
                .reporter
                .report(&bot, ErrorContext::from_message(&msg), &e)
                .await;
            return Ok(());
        }
    }

    // Unmatched command-looking text may be blue-text left by other bots.
    if let Err(e) = cleaner::check_bluetext(&bot, &msg, &state).await {
        error!("Blue-text cleanup failed: {}", e);
    }

    Ok(())
}
