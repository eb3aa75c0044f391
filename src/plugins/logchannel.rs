//! Log-channel binding commands.
//!
//! Setup mirrors the classic flow: add the bot to the channel, send
//! /setlog there, forward that message into the group.

use teloxide::prelude::*;
use teloxide::types::MessageOrigin;

use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::plugins::{reply, require_group};
use crate::utils::html_escape;

/// Handle /logchannel - show the current binding.
pub async fn logchannel_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let binding = ctx.state.policy.log_channel(ctx.msg.chat.id.0).await?;
    match binding {
        Some(channel_id) => {
            let title = ctx
                .bot
                .get_chat(ChatId(channel_id))
                .await
                .ok()
                .and_then(|c| c.title().map(String::from))
                .unwrap_or_else(|| "unknown channel".to_string());
            reply(
                &ctx,
                format!(
                    "This group has all its logs sent to: {} (<code>{}</code>)",
                    html_escape(&title),
                    channel_id
                ),
            )
            .await?;
        }
        None => {
            reply(&ctx, "No log channel has been set for this group!").await?;
        }
    }

    Ok(None)
}

/// Handle /setlog - bind the channel a forwarded /setlog came from.
pub async fn setlog_cmd(ctx: CommandCtx) -> HandlerResult {
    if ctx.msg.chat.is_channel() {
        reply(
            &ctx,
            "Now forward this /setlog to the group you want to tie this channel to!",
        )
        .await?;
        return Ok(None);
    }

    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let origin_channel = match ctx.msg.forward_origin() {
        Some(MessageOrigin::Channel { chat, .. }) => chat.clone(),
        _ => {
            reply(
                &ctx,
                "The steps to set a log channel are:\n\
                 - add me to the desired channel\n\
                 - send /setlog in the channel\n\
                 - forward that /setlog to this group",
            )
            .await?;
            return Ok(None);
        }
    };

    let chat_id = ctx.msg.chat.id;
    ctx.state
        .policy
        .set_log_channel(chat_id.0, origin_channel.id.0)
        .await?;

    // The setup forward is noise once the binding exists.
    let _ = ctx.bot.delete_message(chat_id, ctx.msg.id).await;

    let chat_title = ctx.msg.chat.title().unwrap_or("this group").to_string();
    let _ = ctx
        .bot
        .send_message(
            origin_channel.id,
            format!("This channel has been set as the log channel for {}.", chat_title),
        )
        .await;

    ctx.bot
        .send_message(chat_id, "Successfully set the log channel!")
        .await?;

    Ok(None)
}

/// Handle /unsetlog.
pub async fn unsetlog_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let previous = ctx.state.policy.unset_log_channel(ctx.msg.chat.id.0).await?;
    match previous {
        Some(channel_id) => {
            let chat_title = ctx.msg.chat.title().unwrap_or("this group").to_string();
            let _ = ctx
                .bot
                .send_message(
                    ChatId(channel_id),
                    format!("Channel has been unlinked from {}.", chat_title),
                )
                .await;
            reply(&ctx, "The log channel has been unset.").await?;
        }
        None => {
            reply(&ctx, "No log channel has been set yet!").await?;
        }
    }

    Ok(None)
}
