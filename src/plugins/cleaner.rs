//! Blue-text cleaner configuration commands.

use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::plugins::{reply, require_group};
use crate::utils::html_escape;

fn normalize(ctx: &CommandCtx, raw: &str) -> String {
    let token = raw.trim();
    let stripped = match token.chars().next() {
        Some(c) if ctx.state.commands.prefixes().contains(&c) => &token[c.len_utf8()..],
        _ => token,
    };
    stripped.to_lowercase()
}

/// Handle /cleanbluetext [on|off].
pub async fn cleanbluetext_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;

    match ctx.args.first().map(|a| a.to_lowercase()).as_deref() {
        None => {
            let policy = ctx.state.policy.get_or_default(chat_id).await?;
            reply(
                &ctx,
                format!(
                    "Blue-text cleaning is <b>{}</b> here.",
                    if policy.clean_bluetext { "enabled" } else { "disabled" }
                ),
            )
            .await?;
        }
        Some("on") | Some("yes") => {
            ctx.state.policy.set_clean_bluetext(chat_id, true).await?;
            reply(&ctx, "Blue-text cleaning has been enabled.").await?;
        }
        Some("off") | Some("no") => {
            ctx.state.policy.set_clean_bluetext(chat_id, false).await?;
            reply(&ctx, "Blue-text cleaning has been disabled.").await?;
        }
        Some(_) => {
            reply(&ctx, "Invalid argument. Accepted values are 'yes', 'on', 'no', 'off'.").await?;
        }
    }

    Ok(None)
}

/// Handle /ignorebluetext <token>.
pub async fn ignorebluetext_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let raw = match ctx.args.first() {
        Some(arg) => arg,
        None => {
            reply(&ctx, "No command supplied to be ignored.").await?;
            return Ok(None);
        }
    };
    let token = normalize(&ctx, raw);

    if ctx
        .state
        .policy
        .ignore_bluetext(ctx.msg.chat.id.0, &token)
        .await?
    {
        reply(
            &ctx,
            format!(
                "<code>{}</code> has been added to the blue-text ignore list.",
                html_escape(&token)
            ),
        )
        .await?;
    } else {
        reply(&ctx, "That command is already ignored.").await?;
    }

    Ok(None)
}

/// Handle /unignorebluetext <token>.
pub async fn unignorebluetext_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let raw = match ctx.args.first() {
        Some(arg) => arg,
        None => {
            reply(&ctx, "No command supplied to be unignored.").await?;
            return Ok(None);
        }
    };
    let token = normalize(&ctx, raw);

    if ctx
        .state
        .policy
        .unignore_bluetext(ctx.msg.chat.id.0, &token)
        .await?
    {
        reply(
            &ctx,
            format!(
                "<code>{}</code> has been removed from the blue-text ignore list.",
                html_escape(&token)
            ),
        )
        .await?;
    } else {
        reply(&ctx, "That command isn't ignored currently.").await?;
    }

    Ok(None)
}

/// Handle /gignorebluetext <token> - ignore in every chat.
pub async fn gignorebluetext_cmd(ctx: CommandCtx) -> HandlerResult {
    let raw = match ctx.args.first() {
        Some(arg) => arg,
        None => {
            reply(&ctx, "No command supplied to be ignored.").await?;
            return Ok(None);
        }
    };
    let token = normalize(&ctx, raw);

    if ctx.state.policy.ignore_bluetext_global(&token).await? {
        reply(
            &ctx,
            format!(
                "<code>{}</code> has been added to the global blue-text ignore list.",
                html_escape(&token)
            ),
        )
        .await?;
    } else {
        reply(&ctx, "That command is already ignored globally.").await?;
    }

    Ok(None)
}

/// Handle /gunignorebluetext <token>.
pub async fn gunignorebluetext_cmd(ctx: CommandCtx) -> HandlerResult {
    let raw = match ctx.args.first() {
        Some(arg) => arg,
        None => {
            reply(&ctx, "No command supplied to be unignored.").await?;
            return Ok(None);
        }
    };
    let token = normalize(&ctx, raw);

    if ctx.state.policy.unignore_bluetext_global(&token).await? {
        reply(
            &ctx,
            format!(
                "<code>{}</code> has been removed from the global blue-text ignore list.",
                html_escape(&token)
            ),
        )
        .await?;
    } else {
        reply(&ctx, "That command isn't ignored globally.").await?;
    }

    Ok(None)
}

/// Handle /listbluetext - local and global ignore lists.
pub async fn listbluetext_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let policy = ctx.state.policy.get_or_default(ctx.msg.chat.id.0).await?;
    let global = ctx.state.policy.global_policy().await?;

    let mut text = String::new();
    if !global.bluetext_ignored.is_empty() {
        text.push_str("Ignored globally from blue-text cleaning:\n");
        for token in &global.bluetext_ignored {
            text.push_str(&format!(" - <code>{}</code>\n", html_escape(token)));
        }
    }
    if !policy.bluetext_ignored.is_empty() {
        text.push_str("Ignored in this chat:\n");
        for token in &policy.bluetext_ignored {
            text.push_str(&format!(" - <code>{}</code>\n", html_escape(token)));
        }
    }

    if text.is_empty() {
        reply(&ctx, "No commands are currently ignored from blue-text cleaning.").await?;
    } else {
        reply(&ctx, text).await?;
    }

    Ok(None)
}
