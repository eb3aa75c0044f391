//! Flood-exemption approvals.

use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::plugins::{extract_target, reply, require_group};
use crate::utils::{html_escape, mention_html};

/// Handle /approve - exempt a user from flood control in this chat.
pub async fn approve_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let (target, target_name) = match extract_target(&ctx) {
        Some(t) => t,
        None => {
            reply(&ctx, "Reply to a user or give me a user id.").await?;
            return Ok(None);
        }
    };

    if ctx
        .state
        .guard
        .approve(ctx.msg.chat.id.0, target.0)
        .await?
    {
        reply(
            &ctx,
            format!(
                "{} is now approved and exempt from flood control here.",
                html_escape(&target_name)
            ),
        )
        .await?;

        let admin = ctx
            .msg
            .from
            .as_ref()
            .map(|u| mention_html(u.id.0, &u.first_name))
            .unwrap_or_else(|| "Anonymous".to_string());
        Ok(Some(format!(
            "<b>{}:</b>\n#APPROVED\n<b>Admin:</b> {}\n<b>User:</b> {}",
            html_escape(ctx.msg.chat.title().unwrap_or("Chat")),
            admin,
            mention_html(target.0, &target_name)
        )))
    } else {
        reply(&ctx, "That user is already approved.").await?;
        Ok(None)
    }
}

/// Handle /unapprove.
pub async fn unapprove_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let (target, target_name) = match extract_target(&ctx) {
        Some(t) => t,
        None => {
            reply(&ctx, "Reply to a user or give me a user id.").await?;
            return Ok(None);
        }
    };

    if ctx
        .state
        .guard
        .unapprove(ctx.msg.chat.id.0, target.0)
        .await?
    {
        reply(
            &ctx,
            format!("{} is no longer approved.", html_escape(&target_name)),
        )
        .await?;

        let admin = ctx
            .msg
            .from
            .as_ref()
            .map(|u| mention_html(u.id.0, &u.first_name))
            .unwrap_or_else(|| "Anonymous".to_string());
        Ok(Some(format!(
            "<b>{}:</b>\n#UNAPPROVED\n<b>Admin:</b> {}\n<b>User:</b> {}",
            html_escape(ctx.msg.chat.title().unwrap_or("Chat")),
            admin,
            mention_html(target.0, &target_name)
        )))
    } else {
        reply(&ctx, "That user isn't approved.").await?;
        Ok(None)
    }
}

/// Handle /approved - list the chat's approved users.
pub async fn approved_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let settings = ctx.state.guard.get_or_default(ctx.msg.chat.id.0).await?;
    if settings.approved_users.is_empty() {
        reply(&ctx, "No users are approved in this chat.").await?;
        return Ok(None);
    }

    let listing: String = settings
        .approved_users
        .iter()
        .map(|id| format!(" - <code>{}</code>\n", id))
        .collect();
    reply(&ctx, format!("Approved users:\n{}", listing)).await?;

    Ok(None)
}
