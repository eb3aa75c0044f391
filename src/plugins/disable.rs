//! The per-chat disable mechanism.
//!
//! Admins can make selected commands inert for non-exempt users. Only
//! registrations flagged disable-eligible can be toggled; the toggle
//! commands themselves are not.

use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::plugins::{reply, require_group};
use crate::utils::html_escape;

/// Strip a command prefix from user input, so `/disable /setflood` works.
fn normalize(ctx: &CommandCtx, raw: &str) -> String {
    let token = raw.trim();
    let stripped = match token.chars().next() {
        Some(c) if ctx.state.commands.prefixes().contains(&c) => &token[c.len_utf8()..],
        _ => token,
    };
    stripped.to_lowercase()
}

/// Handle /disable <command>.
pub async fn disable_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let raw = match ctx.args.first() {
        Some(arg) => arg,
        None => {
            reply(&ctx, "What should I disable?").await?;
            return Ok(None);
        }
    };
    let name = normalize(&ctx, raw);

    let eligible = ctx
        .state
        .commands
        .find(&name)
        .map(|spec| spec.disableable)
        .unwrap_or(false);
    if !eligible {
        reply(&ctx, "This command can't be disabled.").await?;
        return Ok(None);
    }

    if ctx
        .state
        .policy
        .disable_command(ctx.msg.chat.id.0, &name)
        .await?
    {
        reply(
            &ctx,
            format!("Disabled the use of <code>{}</code>!", html_escape(&name)),
        )
        .await?;
    } else {
        reply(&ctx, "That command is already disabled.").await?;
    }

    Ok(None)
}

/// Handle /enable <command>.
pub async fn enable_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let raw = match ctx.args.first() {
        Some(arg) => arg,
        None => {
            reply(&ctx, "What should I enable?").await?;
            return Ok(None);
        }
    };
    let name = normalize(&ctx, raw);

    if ctx
        .state
        .policy
        .enable_command(ctx.msg.chat.id.0, &name)
        .await?
    {
        reply(
            &ctx,
            format!("Enabled the use of <code>{}</code>!", html_escape(&name)),
        )
        .await?;
    } else {
        reply(&ctx, "Is that even disabled?").await?;
    }

    Ok(None)
}

/// Handle /listcmds - every command that can be toggled.
pub async fn listcmds_cmd(ctx: CommandCtx) -> HandlerResult {
    let names = ctx.state.commands.disableable_names();
    if names.is_empty() {
        reply(&ctx, "No commands can be disabled.").await?;
        return Ok(None);
    }

    let listing: String = names
        .iter()
        .map(|name| format!(" - <code>{}</code>\n", name))
        .collect();
    reply(
        &ctx,
        format!("The following commands are toggleable:\n{}", listing),
    )
    .await?;

    Ok(None)
}

/// Handle /cmds - what is currently disabled in this chat.
pub async fn cmds_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let policy = ctx.state.policy.get_or_default(ctx.msg.chat.id.0).await?;
    if policy.disabled_commands.is_empty() {
        reply(&ctx, "No commands are disabled!").await?;
        return Ok(None);
    }

    let listing: String = policy
        .disabled_commands
        .iter()
        .map(|name| format!(" - <code>{}</code>\n", html_escape(name)))
        .collect();
    reply(
        &ctx,
        format!("The following commands are currently restricted:\n{}", listing),
    )
    .await?;

    Ok(None)
}
