//! Greeting and verification configuration commands.

use crate::database::VerifyMode;
use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::plugins::{reply, require_group, rest_of_text};
use crate::utils::{html_escape, mention_html};

fn log_line(ctx: &CommandCtx, tag: &str, body: &str) -> String {
    format!(
        "<b>{}:</b>\n#{}\n<b>Admin:</b> {}\n{}",
        html_escape(ctx.msg.chat.title().unwrap_or("Chat")),
        tag,
        ctx.msg
            .from
            .as_ref()
            .map(|u| mention_html(u.id.0, &u.first_name))
            .unwrap_or_else(|| "Anonymous".to_string()),
        body
    )
}

/// Handle /welcome [on|off] - toggle greetings or show the setting.
pub async fn welcome_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let mut settings = ctx.state.greet.get_or_default(chat_id).await?;

    match ctx.args.first().map(|a| a.to_lowercase()).as_deref() {
        None => {
            let template = settings
                .template
                .as_deref()
                .unwrap_or("(default greeting)");
            reply(
                &ctx,
                format!(
                    "Welcome messages are <code>{}</code>.\nThe welcome message is:\n{}",
                    if settings.welcome_enabled { "on" } else { "off" },
                    html_escape(template)
                ),
            )
            .await?;
            Ok(None)
        }
        Some("on") | Some("yes") => {
            settings.welcome_enabled = true;
            ctx.state.greet.save(&settings).await?;
            reply(&ctx, "Okay! I'll greet members when they join.").await?;
            Ok(None)
        }
        Some("off") | Some("no") => {
            settings.welcome_enabled = false;
            ctx.state.greet.save(&settings).await?;
            reply(&ctx, "I won't welcome anyone from now on.").await?;
            Ok(None)
        }
        Some(_) => {
            reply(&ctx, "I understand 'on/yes' or 'off/no' only!").await?;
            Ok(None)
        }
    }
}

/// Handle /setwelcome <template> - set the welcome template.
pub async fn setwelcome_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let template = match rest_of_text(&ctx.msg) {
        Some(t) => t,
        None => {
            reply(
                &ctx,
                "Give me a welcome message! Fillings like <code>{first}</code>, \
                 <code>{mention}</code>, <code>{chatname}</code> and <code>{count}</code> \
                 are replaced per member.",
            )
            .await?;
            return Ok(None);
        }
    };

    let chat_id = ctx.msg.chat.id.0;
    let mut settings = ctx.state.greet.get_or_default(chat_id).await?;
    settings.template = Some(template);
    ctx.state.greet.save(&settings).await?;

    reply(&ctx, "Successfully set the custom welcome message!").await?;
    Ok(Some(log_line(&ctx, "SET_WELCOME", "Set the welcome message.")))
}

/// Handle /resetwelcome - back to the default greetings.
pub async fn resetwelcome_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let mut settings = ctx.state.greet.get_or_default(chat_id).await?;
    settings.template = None;
    ctx.state.greet.save(&settings).await?;

    reply(&ctx, "Successfully reset the welcome message to default!").await?;
    Ok(Some(log_line(
        &ctx,
        "RESET_WELCOME",
        "Reset the welcome message to default.",
    )))
}

/// Handle /welcomemute off|soft|strong|captcha.
pub async fn welcomemute_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let mut settings = ctx.state.greet.get_or_default(chat_id).await?;

    let mode = match ctx.args.first().map(|a| a.to_lowercase()).as_deref() {
        Some("off") | Some("no") => VerifyMode::Off,
        Some("soft") => VerifyMode::Soft,
        Some("strong") => VerifyMode::Strong,
        Some("captcha") => VerifyMode::Captcha,
        Some(_) => {
            reply(
                &ctx,
                "Please enter <code>off</code>/<code>no</code>/<code>soft</code>/\
                 <code>strong</code>/<code>captcha</code>!",
            )
            .await?;
            return Ok(None);
        }
        None => {
            reply(
                &ctx,
                format!(
                    "Give me a setting! Choose one of: <code>off</code>/<code>no</code>, \
                     <code>soft</code>, <code>strong</code> or <code>captcha</code>.\n\
                     Current setting: <code>{}</code>",
                    settings.verify_mode.as_str()
                ),
            )
            .await?;
            return Ok(None);
        }
    };

    settings.verify_mode = mode;
    ctx.state.greet.save(&settings).await?;

    let confirmation = match mode {
        VerifyMode::Off => "I will no longer mute people on joining!",
        VerifyMode::Soft => "I will restrict new members' media for 24 hours.",
        VerifyMode::Strong => {
            "I will now mute people when they join until they prove they're not a bot.\n\
             They have 120 seconds before they get kicked."
        }
        VerifyMode::Captcha => {
            "I will now mute people when they join until they solve a captcha.\n\
             They have 120 seconds before they get kicked."
        }
    };
    reply(&ctx, confirmation).await?;

    Ok(Some(log_line(
        &ctx,
        "WELCOME_MUTE",
        &format!(
            "Toggled welcome mute to <b>{}</b>.",
            mode.as_str().to_uppercase()
        ),
    )))
}

/// Handle /cleanwelcome [on|off] - delete the previous welcome message.
pub async fn cleanwelcome_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let mut settings = ctx.state.greet.get_or_default(chat_id).await?;

    match ctx.args.first().map(|a| a.to_lowercase()).as_deref() {
        None => {
            let status = if settings.clean_welcome {
                "I'm deleting the previous welcome message when a new one arrives."
            } else {
                "I'm currently not deleting old welcome messages."
            };
            reply(&ctx, status).await?;
            Ok(None)
        }
        Some("on") | Some("yes") => {
            settings.clean_welcome = true;
            ctx.state.greet.save(&settings).await?;
            reply(&ctx, "I'll try to delete old welcome messages!").await?;
            Ok(Some(log_line(
                &ctx,
                "CLEAN_WELCOME",
                "Toggled clean welcomes to <code>ON</code>.",
            )))
        }
        Some("off") | Some("no") => {
            settings.clean_welcome = false;
            ctx.state.greet.save(&settings).await?;
            reply(&ctx, "I won't delete old welcome messages.").await?;
            Ok(Some(log_line(
                &ctx,
                "CLEAN_WELCOME",
                "Toggled clean welcomes to <code>OFF</code>.",
            )))
        }
        Some(_) => {
            reply(&ctx, "I understand 'on/yes' or 'off/no' only!").await?;
            Ok(None)
        }
    }
}

/// Handle /cleanservice [on|off] - delete join/leave service messages.
pub async fn cleanservice_cmd(ctx: CommandCtx) -> HandlerResult {
    if !require_group(&ctx).await? {
        return Ok(None);
    }

    let chat_id = ctx.msg.chat.id.0;
    let mut settings = ctx.state.greet.get_or_default(chat_id).await?;

    match ctx.args.first().map(|a| a.to_lowercase()).as_deref() {
        None => {
            reply(
                &ctx,
                format!(
                    "Welcome clean service is: <code>{}</code>",
                    if settings.clean_service { "on" } else { "off" }
                ),
            )
            .await?;
        }
        Some("on") | Some("yes") => {
            settings.clean_service = true;
            ctx.state.greet.save(&settings).await?;
            reply(&ctx, "Welcome clean service is: on").await?;
        }
        Some("off") | Some("no") => {
            settings.clean_service = false;
            ctx.state.greet.save(&settings).await?;
            reply(&ctx, "Welcome clean service is: off").await?;
        }
        Some(_) => {
            reply(&ctx, "Usage is on/yes or off/no.").await?;
        }
    }

    Ok(None)
}
