//! Raid mode commands and callbacks.
//!
//! The raid toggle duration and the join temp-ban duration are separate
//! settings; `/raidtime` configures how long the toggle stays on,
//! `/raidactiontime` how long joiners are banned while it is on.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::{info, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::permissions::AdminRight;
use crate::plugins::{reply, require_group};
use crate::utils::{format_duration, html_escape, mention_html, parse_duration};

/// Valid raid durations: at least 5 minutes, under 1 day.
pub fn valid_raid_duration(secs: u64) -> bool {
    (300..86400).contains(&secs)
}

const RANGE_ERROR: &str = "You can only set a time between 5 minutes and 1 day.";
const TIME_ERROR: &str = "Unknown time given, give me something like 5m or 1h.";

fn timer_key(chat_id: i64) -> String {
    format!("raid:{}", chat_id)
}

fn log_line(ctx: &CommandCtx, body: &str) -> String {
    format!(
        "<b>{}:</b>\n#RAID\n{}\n<b>Admin:</b> {}",
        html_escape(ctx.msg.chat.title().unwrap_or("Chat")),
        body,
        ctx.msg
            .from
            .as_ref()
            .map(|u| mention_html(u.id.0, &u.first_name))
            .unwrap_or_else(|| "Anonymous".to_string())
    )
}

/// Handle /raid [off|<duration>] - toggle with confirmation buttons.
pub async fn raid_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let settings = ctx.state.guard.get_or_default(chat_id).await?;
    let readable = format_duration(settings.raid.raid_duration_secs);

    match ctx.args.first().map(|a| a.to_lowercase()) {
        None => {
            let (text, keyboard) = if settings.raid.enabled {
                (
                    "Raid mode is currently <code>Enabled</code>.\nWould you like to <code>Disable</code> it?"
                        .to_string(),
                    InlineKeyboardMarkup::new([[
                        InlineKeyboardButton::callback(
                            "Disable Raid Mode",
                            format!("raid:off:{}", chat_id),
                        ),
                        InlineKeyboardButton::callback("Cancel Action", "raid:cancel:1"),
                    ]]),
                )
            } else {
                (
                    format!(
                        "Raid mode is currently <code>Disabled</code>.\n\
                         Would you like to <code>Enable</code> it for {}?",
                        readable
                    ),
                    InlineKeyboardMarkup::new([[
                        InlineKeyboardButton::callback(
                            "Enable Raid Mode",
                            format!("raid:on:{}:{}", chat_id, settings.raid.raid_duration_secs),
                        ),
                        InlineKeyboardButton::callback("Cancel Action", "raid:cancel:0"),
                    ]]),
                )
            };

            ctx.bot
                .send_message(ctx.msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
            Ok(None)
        }
        Some(arg) if arg == "off" => {
            if !settings.raid.enabled {
                reply(&ctx, "Raid mode is not enabled.").await?;
                return Ok(None);
            }
            disable_raid(&ctx.state, chat_id).await?;
            reply(
                &ctx,
                "Raid mode has been <code>Disabled</code>, members that join will no longer be kicked.",
            )
            .await?;
            Ok(Some(log_line(&ctx, "Disabled")))
        }
        Some(arg) => {
            let secs = match parse_duration(&arg) {
                Some(d) => d.as_secs(),
                None => {
                    reply(&ctx, TIME_ERROR).await?;
                    return Ok(None);
                }
            };
            // Out-of-range values are rejected, not clamped.
            if !valid_raid_duration(secs) {
                reply(&ctx, RANGE_ERROR).await?;
                return Ok(None);
            }

            let keyboard = InlineKeyboardMarkup::new([[
                InlineKeyboardButton::callback(
                    "Enable Raid",
                    format!("raid:on:{}:{}", chat_id, secs),
                ),
                InlineKeyboardButton::callback("Cancel Action", "raid:cancel:0"),
            ]]);
            ctx.bot
                .send_message(
                    ctx.msg.chat.id,
                    format!(
                        "Raid mode is currently <code>Disabled</code>.\n\
                         Would you like to <code>Enable</code> it for {}?",
                        format_duration(secs)
                    ),
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
            Ok(None)
        }
    }
}

/// Enable raid mode and (re)arm the auto-disable timer.
///
/// Scheduling under the chat's timer key replaces any previous timer, so
/// re-enabling never leaves two disables pending.
pub async fn enable_raid(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: i64,
    duration_secs: u64,
) -> anyhow::Result<()> {
    anyhow::ensure!(valid_raid_duration(duration_secs), "raid duration out of range");

    let mut settings = state.guard.get_or_default(chat_id).await?;
    settings.raid.enabled = true;
    settings.raid.raid_duration_secs = duration_secs;
    let raid = settings.raid.clone();
    state.guard.set_raid(chat_id, raid).await?;

    info!("Raid mode enabled in chat {} for {}s", chat_id, duration_secs);

    let bot_for_task = bot.clone();
    let state_for_task = state.clone();
    state.timers.schedule(
        timer_key(chat_id),
        Duration::from_secs(duration_secs),
        async move {
            // The toggle may have been flipped while we slept.
            let settings = match state_for_task.guard.get_or_default(chat_id).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("Raid auto-disable read failed for chat {}: {}", chat_id, e);
                    return;
                }
            };
            if !settings.raid.enabled {
                return;
            }

            let mut raid = settings.raid.clone();
            raid.enabled = false;
            if let Err(e) = state_for_task.guard.set_raid(chat_id, raid).await {
                warn!("Raid auto-disable write failed for chat {}: {}", chat_id, e);
                return;
            }
            info!("Raid mode auto-disabled in chat {}", chat_id);
            let _ = bot_for_task
                .send_message(ChatId(chat_id), "Raid mode has been automatically disabled!")
                .await;
        },
    );

    Ok(())
}

/// Disable raid mode and cancel any pending auto-disable.
pub async fn disable_raid(state: &AppState, chat_id: i64) -> anyhow::Result<()> {
    let mut settings = state.guard.get_or_default(chat_id).await?;
    settings.raid.enabled = false;
    let raid = settings.raid.clone();
    state.guard.set_raid(chat_id, raid).await?;

    // Without this, the stale timer would fire a second disable notice.
    state.timers.cancel(&timer_key(chat_id));
    info!("Raid mode disabled in chat {}", chat_id);

    Ok(())
}

/// Callbacks for the /raid confirmation buttons.
pub async fn on_raid_callback(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
) -> anyhow::Result<()> {
    let data = q.data.clone().unwrap_or_default();
    let mut parts = data.split(':');
    let _tag = parts.next();
    let action = parts.next().unwrap_or("");

    let prompt = match q.message.as_ref() {
        Some(m) => m,
        None => return Ok(()),
    };

    if action == "cancel" {
        let staying = if parts.next() == Some("1") { "Enabled" } else { "Disabled" };
        bot.answer_callback_query(&q.id).await?;
        bot.edit_message_text(
            prompt.chat().id,
            prompt.id(),
            format!(
                "Action cancelled, raid mode will stay <code>{}</code>.",
                staying
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let chat_id: i64 = match parts.next().and_then(|p| p.parse().ok()) {
        Some(id) => id,
        None => return Ok(()),
    };

    if !state
        .gate
        .proof_permits(ChatId(chat_id), q.from.id, AdminRight::ChangeInfo)
        .await
    {
        bot.answer_callback_query(&q.id)
            .text("You aren't allowed to do this.")
            .await?;
        return Ok(());
    }

    match action {
        "on" => {
            let secs: u64 = match parts.next().and_then(|p| p.parse().ok()) {
                Some(s) => s,
                None => return Ok(()),
            };
            if !valid_raid_duration(secs) {
                bot.answer_callback_query(&q.id).text(RANGE_ERROR).await?;
                return Ok(());
            }
            enable_raid(&bot, &state, chat_id, secs).await?;
            bot.answer_callback_query(&q.id).await?;
            bot.edit_message_text(
                prompt.chat().id,
                prompt.id(),
                format!(
                    "Raid mode has been <code>Enabled</code> for {}.",
                    format_duration(secs)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        "off" => {
            disable_raid(&state, chat_id).await?;
            bot.answer_callback_query(&q.id).await?;
            bot.edit_message_text(
                prompt.chat().id,
                prompt.id(),
                "Raid mode has been <code>Disabled</code>, newly joining members \
                 will no longer be kicked.",
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        _ => {}
    }

    Ok(())
}

/// Handle /raidtime [duration] - how long the toggle stays on.
pub async fn raidtime_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let settings = ctx.state.guard.get_or_default(chat_id).await?;

    let arg = match ctx.args.first() {
        Some(arg) => arg.to_lowercase(),
        None => {
            reply(
                &ctx,
                format!(
                    "Raid mode duration is currently {}.\nWhen toggled, raid mode \
                     will stay on that long, then turn off automatically.",
                    format_duration(settings.raid.raid_duration_secs)
                ),
            )
            .await?;
            return Ok(None);
        }
    };

    let secs = match parse_duration(&arg) {
        Some(d) => d.as_secs(),
        None => {
            reply(&ctx, TIME_ERROR).await?;
            return Ok(None);
        }
    };
    if !valid_raid_duration(secs) {
        reply(&ctx, RANGE_ERROR).await?;
        return Ok(None);
    }

    let mut raid = settings.raid.clone();
    raid.raid_duration_secs = secs;
    ctx.state.guard.set_raid(chat_id, raid).await?;

    let readable = format_duration(secs);
    reply(
        &ctx,
        format!("Raid mode duration is now {}.", readable),
    )
    .await?;

    Ok(Some(log_line(
        &ctx,
        &format!("Set the raid mode duration to {}", readable),
    )))
}

/// Handle /raidactiontime [duration] - the join temp-ban duration.
pub async fn raidactiontime_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let settings = ctx.state.guard.get_or_default(chat_id).await?;

    let arg = match ctx.args.first() {
        Some(arg) => arg.to_lowercase(),
        None => {
            reply(
                &ctx,
                format!(
                    "Raid action time is currently {}.\nWhile raid mode is on, \
                     joining members are temp-banned that long.",
                    format_duration(settings.raid.action_duration_secs)
                ),
            )
            .await?;
            return Ok(None);
        }
    };

    let secs = match parse_duration(&arg) {
        Some(d) => d.as_secs(),
        None => {
            reply(&ctx, TIME_ERROR).await?;
            return Ok(None);
        }
    };
    if !valid_raid_duration(secs) {
        reply(&ctx, RANGE_ERROR).await?;
        return Ok(None);
    }

    let mut raid = settings.raid.clone();
    raid.action_duration_secs = secs;
    ctx.state.guard.set_raid(chat_id, raid).await?;

    let readable = format_duration(secs);
    reply(
        &ctx,
        format!("Raid action time is now {}.", readable),
    )
    .await?;

    Ok(Some(log_line(
        &ctx,
        &format!("Set the raid action time to {}", readable),
    )))
}

#[cfg(test)]
mod tests {
    use super::valid_raid_duration;

    #[test]
    fn test_duration_bounds() {
        assert!(!valid_raid_duration(100));
        assert!(valid_raid_duration(300));
        assert!(valid_raid_duration(600));
        assert!(valid_raid_duration(86399));
        assert!(!valid_raid_duration(86400));
        assert!(!valid_raid_duration(90000));
    }
}
