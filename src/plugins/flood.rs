//! Flood control commands.

use tracing::info;

use crate::database::FloodAction;
use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::plugins::{reply, require_group};
use crate::utils::{html_escape, mention_html, parse_duration};

fn chat_title(ctx: &CommandCtx) -> String {
    html_escape(ctx.msg.chat.title().unwrap_or("Chat"))
}

fn admin_mention(ctx: &CommandCtx) -> String {
    ctx.msg
        .from
        .as_ref()
        .map(|u| mention_html(u.id.0, &u.first_name))
        .unwrap_or_else(|| "Anonymous".to_string())
}

/// Handle /flood - show the current limit.
pub async fn flood_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let settings = ctx.state.guard.get_or_default(ctx.msg.chat.id.0).await?;
    if settings.flood.limit == 0 {
        reply(&ctx, "I'm not enforcing any flood control here!").await?;
    } else {
        reply(
            &ctx,
            format!(
                "I'm currently restricting members after {} consecutive messages.",
                settings.flood.limit
            ),
        )
        .await?;
    }

    Ok(None)
}

/// Handle /setflood <n|off> - set or disable the limit.
pub async fn setflood_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let arg = match ctx.args.first() {
        Some(arg) => arg.to_lowercase(),
        None => {
            reply(
                &ctx,
                "Use <code>/setflood number</code> to enable flood control,\n\
                 or <code>/setflood off</code> to disable it.",
            )
            .await?;
            return Ok(None);
        }
    };

    if matches!(arg.as_str(), "off" | "no" | "0") {
        ctx.state.guard.set_flood_limit(chat_id, 0).await?;
        reply(&ctx, "Flood control has been disabled.").await?;
        return Ok(Some(format!(
            "<b>{}:</b>\n#SETFLOOD\n<b>Admin:</b> {}\nDisabled flood control.",
            chat_title(&ctx),
            admin_mention(&ctx)
        )));
    }

    let amount: u32 = match arg.parse() {
        Ok(n) => n,
        Err(_) => {
            reply(&ctx, "Invalid argument, use a number, 'off' or 'no'.").await?;
            return Ok(None);
        }
    };

    // Tiny limits would flag ordinary conversation.
    if amount <= 3 {
        reply(
            &ctx,
            "The flood limit must be either 0 (disabled) or a number greater than 3!",
        )
        .await?;
        return Ok(None);
    }

    ctx.state.guard.set_flood_limit(chat_id, amount).await?;
    info!("Flood limit in chat {} set to {}", chat_id, amount);
    reply(
        &ctx,
        format!("Successfully updated the flood limit to {}!", amount),
    )
    .await?;

    Ok(Some(format!(
        "<b>{}:</b>\n#SETFLOOD\n<b>Admin:</b> {}\nSet the flood limit to <code>{}</code>.",
        chat_title(&ctx),
        admin_mention(&ctx),
        amount
    )))
}

/// Handle /setfloodmode <ban|kick|mute|tban|tmute> [duration].
pub async fn setfloodmode_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;

    let mode = match ctx.args.first() {
        Some(mode) => mode.to_lowercase(),
        None => {
            let settings = ctx.state.guard.get_or_default(chat_id).await?;
            let current = describe_action(settings.flood.action, &settings.flood.action_duration);
            reply(
                &ctx,
                format!("Exceeding the flood limit currently results in: {}.", current),
            )
            .await?;
            return Ok(None);
        }
    };

    let (action, duration) = match mode.as_str() {
        "ban" => (FloodAction::Ban, None),
        "kick" => (FloodAction::Kick, None),
        "mute" => (FloodAction::Mute, None),
        "tban" | "tmute" => {
            let duration = match ctx.args.get(1) {
                Some(d) if parse_duration(d).is_some() => d.to_lowercase(),
                _ => {
                    reply(
                        &ctx,
                        format!(
                            "You need a time value for {}; try <code>/setfloodmode {} &lt;time&gt;</code>.\n\
                             Examples: <code>4m</code> = 4 minutes, <code>3h</code> = 3 hours, \
                             <code>6d</code> = 6 days, <code>5w</code> = 5 weeks.",
                            mode, mode
                        ),
                    )
                    .await?;
                    return Ok(None);
                }
            };
            let action = if mode == "tban" {
                FloodAction::TempBan
            } else {
                FloodAction::TempMute
            };
            (action, Some(duration))
        }
        _ => {
            reply(&ctx, "I only understand ban/kick/mute/tban/tmute!").await?;
            return Ok(None);
        }
    };

    ctx.state
        .guard
        .set_flood_action(chat_id, action, duration.clone())
        .await?;

    let described = describe_action(action, &duration);
    reply(
        &ctx,
        format!("Exceeding the flood limit will now result in: {}!", described),
    )
    .await?;

    Ok(Some(format!(
        "<b>{}:</b>\n#SETFLOODMODE\n<b>Admin:</b> {}\nChanged the flood action to {}.",
        chat_title(&ctx),
        admin_mention(&ctx),
        described
    )))
}

fn describe_action(action: FloodAction, duration: &Option<String>) -> String {
    match action {
        FloodAction::Ban => "a ban".to_string(),
        FloodAction::Kick => "a kick".to_string(),
        FloodAction::Mute => "a mute".to_string(),
        FloodAction::TempBan => format!(
            "a temporary ban for {}",
            duration.as_deref().unwrap_or("a while")
        ),
        FloodAction::TempMute => format!(
            "a temporary mute for {}",
            duration.as_deref().unwrap_or("a while")
        ),
    }
}
