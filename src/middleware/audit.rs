//! Log-channel forwarding.
//!
//! Handlers return a human-readable audit line; the middleware appends an
//! event stamp and a deep link to the originating message, then delivers it
//! to the chat's configured log channel. A channel that no longer exists is
//! unset and the failure is reported back to the origin chat.

use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, Message, ParseMode};
use tracing::warn;

use crate::bot::dispatcher::ThrottledBot;
use crate::database::PolicyRepo;

const STAMP_FMT: &str = "%H:%M - %d-%m-%Y";

/// Forward an audit line for `origin` to the chat's log channel, if one is
/// configured.
pub async fn forward(
    bot: &ThrottledBot,
    policy: &PolicyRepo,
    origin: &Message,
    text: &str,
) -> anyhow::Result<()> {
    let chat_id = origin.chat.id.0;
    let log_channel = match policy.log_channel(chat_id).await? {
        Some(channel) => channel,
        None => return Ok(()),
    };

    let mut entry = text.to_string();
    entry.push_str(&format!(
        "\n<b>Event Stamp</b>: <code>{}</code>",
        chrono::Utc::now().format(STAMP_FMT)
    ));
    if let Some(link) = message_link(origin) {
        entry.push_str(&format!("\n<b>Link:</b> <a href=\"{}\">click here</a>", link));
    }

    let no_preview = LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    };

    let sent = bot
        .send_message(ChatId(log_channel), entry.clone())
        .parse_mode(ParseMode::Html)
        .link_preview_options(no_preview)
        .await;

    if let Err(e) = sent {
        let description = e.to_string().to_lowercase();
        if description.contains("chat not found") {
            policy.unset_log_channel(chat_id).await?;
            bot.send_message(
                ChatId(chat_id),
                "This log channel has been deleted - unsetting.",
            )
            .await?;
        } else {
            warn!("Log channel delivery failed for chat {}: {}", chat_id, e);
            // Retry without formatting; bad HTML in a log line must not
            // lose the event.
            bot.send_message(
                ChatId(log_channel),
                format!(
                    "{}\n\nFormatting has been disabled due to an unexpected error.",
                    entry
                ),
            )
            .await?;
        }
    }

    Ok(())
}

/// Deep link to a supergroup message, where one can exist.
fn message_link(msg: &Message) -> Option<String> {
    if !msg.chat.is_supergroup() {
        return None;
    }
    match msg.chat.username() {
        Some(username) => Some(format!("https://t.me/{}/{}", username, msg.id.0)),
        None => {
            let cid = msg.chat.id.0.to_string().replace("-100", "");
            Some(format!("https://t.me/c/{}/{}", cid, msg.id.0))
        }
    }
}
