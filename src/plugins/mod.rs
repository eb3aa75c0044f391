//! Command plugins.
//!
//! Each file holds the handlers for one feature; everything is registered
//! here, in one place, with its access requirement and dispatch flags.

pub mod approve;
pub mod cleaner;
pub mod disable;
pub mod flood;
pub mod greet;
pub mod logchannel;
pub mod misc;
pub mod raid;
pub mod ranks;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode, ReplyParameters, UserId};
use tracing::warn;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::events::verify;
use crate::middleware::registry::{CommandCtx, CommandRegistry, CommandSpec};
use crate::middleware::{anon, pipeline};
use crate::permissions::{Access, AdminRight, BotRight};

/// Build the full command registry. Insertion order is dispatch order.
pub fn build_registry(allow_excl: bool) -> CommandRegistry {
    use Access::*;

    let mut reg = CommandRegistry::new(allow_excl);

    // Core
    reg.register(
        CommandSpec::new(&["start"], Public, |c| Box::pin(misc::start_cmd(c))).not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["help"], Public, |c| Box::pin(misc::help_cmd(c))).not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["stats"], DevOnly, |c| Box::pin(misc::stats_cmd(c))).not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["errors"], DevOnly, |c| Box::pin(misc::errors_cmd(c)))
            .not_disableable(),
    );
    reg.register(CommandSpec::new(
        &["quietdeny"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(misc::quietdeny_cmd(c)),
    ));

    // Flood control
    reg.register(CommandSpec::new(
        &["flood"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(flood::flood_cmd(c)),
    ));
    reg.register(
        CommandSpec::new(&["setflood"], ChatAdmin(AdminRight::ChangeInfo), |c| {
            Box::pin(flood::setflood_cmd(c))
        })
        .bot_requires(BotRight::Restrict),
    );
    reg.register(CommandSpec::new(
        &["setfloodmode"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(flood::setfloodmode_cmd(c)),
    ));

    // Raid mode
    reg.register(
        CommandSpec::new(&["raid"], ChatAdmin(AdminRight::ChangeInfo), |c| {
            Box::pin(raid::raid_cmd(c))
        })
        .bot_requires(BotRight::Restrict),
    );
    reg.register(CommandSpec::new(
        &["raidtime"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(raid::raidtime_cmd(c)),
    ));
    reg.register(CommandSpec::new(
        &["raidactiontime"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(raid::raidactiontime_cmd(c)),
    ));

    // Greetings / verification
    reg.register(CommandSpec::new(
        &["welcome"],
        ChatAdmin(AdminRight::Any),
        |c| Box::pin(greet::welcome_cmd(c)),
    ));
    reg.register(CommandSpec::new(
        &["setwelcome"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(greet::setwelcome_cmd(c)),
    ));
    reg.register(CommandSpec::new(
        &["resetwelcome"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(greet::resetwelcome_cmd(c)),
    ));
    reg.register(
        CommandSpec::new(&["welcomemute"], ChatAdmin(AdminRight::ChangeInfo), |c| {
            Box::pin(greet::welcomemute_cmd(c))
        })
        .bot_requires(BotRight::Restrict),
    );
    reg.register(CommandSpec::new(
        &["cleanwelcome"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(greet::cleanwelcome_cmd(c)),
    ));
    reg.register(
        CommandSpec::new(&["cleanservice"], ChatAdmin(AdminRight::ChangeInfo), |c| {
            Box::pin(greet::cleanservice_cmd(c))
        })
        .bot_requires(BotRight::Delete),
    );

    // Approvals
    reg.register(
        CommandSpec::new(&["approve"], ChatAdmin(AdminRight::Any), |c| {
            Box::pin(approve::approve_cmd(c))
        })
        .admin_ok(),
    );
    reg.register(
        CommandSpec::new(&["unapprove"], ChatAdmin(AdminRight::Any), |c| {
            Box::pin(approve::unapprove_cmd(c))
        })
        .admin_ok(),
    );
    reg.register(CommandSpec::new(
        &["approved"],
        ChatAdmin(AdminRight::Any),
        |c| Box::pin(approve::approved_cmd(c)),
    ));

    // Disable mechanism; toggling itself must stay available.
    reg.register(
        CommandSpec::new(&["disable"], ChatAdmin(AdminRight::Any), |c| {
            Box::pin(disable::disable_cmd(c))
        })
        .not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["enable"], ChatAdmin(AdminRight::Any), |c| {
            Box::pin(disable::enable_cmd(c))
        })
        .not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["listcmds"], ChatAdmin(AdminRight::Any), |c| {
            Box::pin(disable::listcmds_cmd(c))
        })
        .not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["cmds", "disabled"], ChatAdmin(AdminRight::Any), |c| {
            Box::pin(disable::cmds_cmd(c))
        })
        .not_disableable(),
    );

    // Blue-text cleaner
    reg.register(
        CommandSpec::new(&["cleanbluetext"], ChatAdmin(AdminRight::ChangeInfo), |c| {
            Box::pin(cleaner::cleanbluetext_cmd(c))
        })
        .bot_requires(BotRight::Delete),
    );
    reg.register(CommandSpec::new(
        &["ignorebluetext"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(cleaner::ignorebluetext_cmd(c)),
    ));
    reg.register(CommandSpec::new(
        &["unignorebluetext"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(cleaner::unignorebluetext_cmd(c)),
    ));
    reg.register(CommandSpec::new(&["gignorebluetext"], DevOnly, |c| {
        Box::pin(cleaner::gignorebluetext_cmd(c))
    }));
    reg.register(CommandSpec::new(&["gunignorebluetext"], DevOnly, |c| {
        Box::pin(cleaner::gunignorebluetext_cmd(c))
    }));
    reg.register(CommandSpec::new(
        &["listbluetext"],
        ChatAdmin(AdminRight::Any),
        |c| Box::pin(cleaner::listbluetext_cmd(c)),
    ));

    // Log channel
    reg.register(CommandSpec::new(
        &["logchannel"],
        ChatAdmin(AdminRight::Any),
        |c| Box::pin(logchannel::logchannel_cmd(c)),
    ));
    reg.register(CommandSpec::new(
        &["setlog"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(logchannel::setlog_cmd(c)),
    ));
    reg.register(CommandSpec::new(
        &["unsetlog"],
        ChatAdmin(AdminRight::ChangeInfo),
        |c| Box::pin(logchannel::unsetlog_cmd(c)),
    ));

    // Global ranks
    reg.register(
        CommandSpec::new(&["addsudo"], DevOnly, |c| Box::pin(ranks::addsudo_cmd(c)))
            .not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["addsupport"], SudoPlus, |c| {
            Box::pin(ranks::addsupport_cmd(c))
        })
        .not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["addwhitelist"], SudoPlus, |c| {
            Box::pin(ranks::addwhitelist_cmd(c))
        })
        .not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["addpro"], SudoPlus, |c| Box::pin(ranks::addpro_cmd(c)))
            .not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["rmrank"], DevOnly, |c| Box::pin(ranks::rmrank_cmd(c)))
            .not_disableable(),
    );
    reg.register(
        CommandSpec::new(&["ranks"], SupportPlus, |c| Box::pin(ranks::ranks_cmd(c)))
            .not_disableable(),
    );

    reg
}

/// Build the callback query handler.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    Update::filter_callback_query().endpoint(on_callback)
}

/// Route callback queries by data prefix.
///
/// Callbacks go through the same per-user budget as commands, and failures
/// reach the error reporter with the callback context attached.
async fn on_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let data = match q.data.as_deref() {
        Some(d) => d.to_string(),
        None => return Ok(()),
    };

    if !state.rate_limiter.check(q.from.id.0).await {
        return Ok(());
    }

    let result = if data.starts_with("vfycap:") {
        verify::on_captcha_button(bot.clone(), q.clone(), state.clone()).await
    } else if data.starts_with("vfy:") {
        verify::on_verify_button(bot.clone(), q.clone(), state.clone()).await
    } else if data.starts_with("anoncb:") {
        on_anon_proof(bot.clone(), q.clone(), state.clone()).await
    } else if data.starts_with("raid:") {
        raid::on_raid_callback(bot.clone(), q.clone(), state.clone()).await
    } else {
        Ok(())
    };

    if let Err(e) = result {
        warn!("Callback handling failed for '{}': {}", data, e);
        state
            .reporter
            .report(&bot, crate::report::ErrorContext::from_callback(&q), &e)
            .await;
    }

    Ok(())
}

/// Identity-proof button for anonymous admins.
async fn on_anon_proof(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let (chat_id, message_id) = match q.data.as_deref().and_then(anon::parse_callback) {
        Some(key) => key,
        None => {
            bot.answer_callback_query(&q.id).text("Malformed callback.").await?;
            return Ok(());
        }
    };

    let intent = match state.anon.get(chat_id, message_id) {
        Some(intent) => intent,
        None => {
            bot.answer_callback_query(&q.id)
                .text("This proof has expired, send the command again.")
                .await?;
            return Ok(());
        }
    };

    if !state
        .gate
        .proof_permits(ChatId(chat_id), q.from.id, intent.right)
        .await
    {
        // Not the admin we're waiting for; the record stays for one who is.
        bot.answer_callback_query(&q.id)
            .text("You aren't an admin of this chat.")
            .await?;
        return Ok(());
    }

    // Consume the record; whoever takes it wins.
    if state.anon.take(chat_id, message_id).is_none() {
        return Ok(());
    }

    // Remove the prompt, then replay the parked command through dispatch.
    if let Some(prompt) = q.message.as_ref() {
        let _ = bot.delete_message(prompt.chat().id, prompt.id()).await;
    }
    bot.answer_callback_query(&q.id).await?;

    if let Err(e) = pipeline::replay(&bot, &state, &intent).await {
        warn!("Replaying anonymous command failed: {}", e);
    }

    Ok(())
}

/// Reply helper: HTML, quoting the invoking message.
pub(crate) async fn reply(ctx: &CommandCtx, text: impl Into<String>) -> anyhow::Result<()> {
    ctx.bot
        .send_message(ctx.msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(ctx.msg.id))
        .await?;
    Ok(())
}

/// Group-only guard used by handlers that make no sense in private chats.
pub(crate) async fn require_group(ctx: &CommandCtx) -> anyhow::Result<bool> {
    if ctx.msg.chat.is_group() || ctx.msg.chat.is_supergroup() {
        return Ok(true);
    }
    reply(ctx, "This command is meant to be used in a group.").await?;
    Ok(false)
}

/// Everything after the command token, whitespace preserved.
pub(crate) fn rest_of_text(msg: &Message) -> Option<String> {
    let text = msg.text()?;
    let mut parts = text.splitn(2, char::is_whitespace);
    parts.next()?;
    parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Target a user by replying to them or passing a numeric id.
pub(crate) fn extract_target(ctx: &CommandCtx) -> Option<(UserId, String)> {
    if let Some(replied) = ctx.msg.reply_to_message() {
        if let Some(user) = replied.from.as_ref() {
            return Some((user.id, user.first_name.clone()));
        }
    }
    let id: u64 = ctx.args.first()?.parse().ok()?;
    Some((UserId(id), format!("User {}", id)))
}
