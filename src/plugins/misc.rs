//! Start, help and diagnostics commands.

use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::plugins::{reply, require_group};
use crate::utils::html_escape;

/// Handle /start.
pub async fn start_cmd(ctx: CommandCtx) -> HandlerResult {
    if ctx.msg.chat.is_private() {
        reply(
            &ctx,
            "Hi! I keep groups safe: flood control, raid protection, join \
             verification and more.\nAdd me to a group and send /help to see \
             what I can do.",
        )
        .await?;
    } else {
        reply(&ctx, "I'm alive and watching.").await?;
    }
    Ok(None)
}

/// Handle /help.
pub async fn help_cmd(ctx: CommandCtx) -> HandlerResult {
    reply(
        &ctx,
        "<b>Flood control</b>\n\
         /flood - current limit\n\
         /setflood &lt;n|off&gt; - limit consecutive messages\n\
         /setfloodmode &lt;ban|kick|mute|tban|tmute&gt; [time]\n\
         \n<b>Raid mode</b>\n\
         /raid [time|off] - toggle removal of new joiners\n\
         /raidtime &lt;time&gt; - how long raid mode stays on\n\
         /raidactiontime &lt;time&gt; - how long joiners are banned\n\
         \n<b>Greetings</b>\n\
         /welcome [on|off], /setwelcome, /resetwelcome\n\
         /welcomemute &lt;off|soft|strong|captcha&gt;\n\
         /cleanwelcome [on|off], /cleanservice [on|off]\n\
         \n<b>Approvals</b>\n\
         /approve, /unapprove, /approved\n\
         \n<b>Disabling</b>\n\
         /disable, /enable, /listcmds, /cmds\n\
         \n<b>Cleanup</b>\n\
         /cleanbluetext [on|off], /ignorebluetext, /unignorebluetext, /listbluetext\n\
         \n<b>Logging</b>\n\
         /logchannel, /setlog, /unsetlog\n\
         \n<b>Misc</b>\n\
         /quietdeny [on|off] - silent permission denials",
    )
    .await?;
    Ok(None)
}

/// Handle /stats - one line per reporting feature.
pub async fn stats_cmd(ctx: CommandCtx) -> HandlerResult {
    let stats = ctx.state.hooks.stats().await;
    if stats.is_empty() {
        reply(&ctx, "Nothing to report yet.").await?;
    } else {
        reply(&ctx, stats).await?;
    }
    Ok(None)
}

/// Handle /errors - the deduplicated unexpected-error ledger.
pub async fn errors_cmd(ctx: CommandCtx) -> HandlerResult {
    let rows = ctx.state.reporter.occurrences();
    if rows.is_empty() {
        reply(&ctx, "No errors recorded. Suspicious.").await?;
        return Ok(None);
    }

    let mut text = String::from("Recorded errors, most frequent first:\n");
    for (identifier, count, fingerprint) in rows.into_iter().take(20) {
        text.push_str(&format!(
            "#{} ({}x): <code>{}</code>\n",
            identifier,
            count,
            html_escape(&fingerprint)
        ));
    }
    reply(&ctx, text).await?;
    Ok(None)
}

/// Handle /quietdeny [on|off] - the chat's permission-denial policy.
pub async fn quietdeny_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;

    match ctx.args.first().map(|a| a.to_lowercase()).as_deref() {
        None => {
            let policy = ctx.state.policy.get_or_default(chat_id).await?;
            let quiet = policy
                .quiet_deny
                .unwrap_or(ctx.state.quiet_deny_default);
            reply(
                &ctx,
                format!(
                    "Permission denials here are <b>{}</b>.",
                    if quiet { "silently dropped" } else { "answered with a reply" }
                ),
            )
            .await?;
        }
        Some("on") | Some("yes") => {
            ctx.state.policy.set_quiet_deny(chat_id, true).await?;
            reply(&ctx, "I'll silently drop unauthorized commands.").await?;
        }
        Some("off") | Some("no") => {
            ctx.state.policy.set_quiet_deny(chat_id, false).await?;
            reply(&ctx, "I'll answer unauthorized commands with a short reply.").await?;
        }
        Some(_) => {
            reply(&ctx, "I understand 'on/yes' or 'off/no' only!").await?;
        }
    }

    Ok(None)
}
