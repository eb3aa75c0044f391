//! New-member handling: raid gate, join verification, welcome delivery.
//!
//! Raid mode takes precedence over everything: while active, unprivileged
//! joiners are temp-banned before any welcome or verification runs.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberUpdated, ChatPermissions, MessageId, ParseMode, User};
use tracing::{debug, info};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::VerifyMode;
use crate::events::verify;
use crate::utils::fill_greeting;

static DEFAULT_GREETINGS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Hey {first}, welcome aboard!",
        "Welcome to {chatname}, {first}!",
        "{first} just joined. Everyone act natural.",
        "A wild {first} appeared!",
        "Glad you made it, {first}.",
    ]
});

/// Did this chat-member update represent a join?
pub fn is_join(upd: &ChatMemberUpdated) -> bool {
    !upd.old_chat_member.is_present() && upd.new_chat_member.is_present()
}

/// Entry point for chat-member updates.
pub async fn on_chat_member(
    bot: ThrottledBot,
    upd: ChatMemberUpdated,
    state: AppState,
) -> anyhow::Result<()> {
    if !upd.chat.is_group() && !upd.chat.is_supergroup() {
        return Ok(());
    }

    // Promotions and demotions make the cached admin list stale.
    let was_admin = is_admin_kind(&upd.old_chat_member);
    let now_admin = is_admin_kind(&upd.new_chat_member);
    if was_admin != now_admin {
        state.gate.admins().invalidate(upd.chat.id);
    }

    if is_join(&upd) {
        on_join(&bot, &upd, &state).await?;
    }

    Ok(())
}

fn is_admin_kind(member: &teloxide::types::ChatMember) -> bool {
    matches!(
        member.kind,
        teloxide::types::ChatMemberKind::Owner(_) | teloxide::types::ChatMemberKind::Administrator(_)
    )
}

async fn on_join(
    bot: &ThrottledBot,
    upd: &ChatMemberUpdated,
    state: &AppState,
) -> anyhow::Result<()> {
    let chat = &upd.chat;
    let joiner = &upd.new_chat_member.user;

    if joiner.id == state.bot_id {
        return Ok(());
    }

    debug!("User {} joined chat {}", joiner.id, chat.id);

    // Raid gate first: while a raid is on, unprivileged joiners are removed
    // before any greeting logic runs.
    let guard = state.guard.get_or_default(chat.id.0).await?;
    if guard.raid.enabled && !state.gate.is_privileged(joiner.id).await {
        let until = chrono::Utc::now()
            + chrono::Duration::seconds(guard.raid.action_duration_secs as i64);
        let _ = bot
            .ban_chat_member(chat.id, joiner.id)
            .until_date(until)
            .await;
        info!(
            "Raid mode removed joiner {} from chat {} for {}s",
            joiner.id, chat.id, guard.raid.action_duration_secs
        );
        return Ok(());
    }

    let settings = state.greet.get_or_default(chat.id.0).await?;

    let welcome_text = if settings.welcome_enabled {
        let title = chat.title().unwrap_or("the group");
        Some(render_welcome(bot, chat.id, title, &settings.template, joiner).await)
    } else {
        None
    };

    // Bots, ban-protected users and previously verified humans skip the
    // challenge entirely.
    let exempt = joiner.is_bot
        || state.gate.is_privileged(joiner.id).await
        || state
            .gate
            .admins()
            .is_admin(chat.id, joiner.id)
            .await
            .unwrap_or(false)
        || state
            .greet
            .is_verified_human(chat.id.0, joiner.id.0)
            .await
            .unwrap_or(false);

    match settings.verify_mode {
        VerifyMode::Strong | VerifyMode::Captcha if !exempt => {
            // Welcome is deferred until verification succeeds.
            verify::begin_challenge(bot, state, chat, joiner, settings.verify_mode, welcome_text)
                .await?;
        }
        VerifyMode::Soft if !exempt => {
            // Text only for 24 hours, no pending bookkeeping.
            let until = chrono::Utc::now() + chrono::Duration::hours(24);
            let _ = bot
                .restrict_chat_member(chat.id, joiner.id, ChatPermissions::SEND_MESSAGES)
                .until_date(until)
                .await;
            state
                .greet
                .set_verified_human(chat.id.0, joiner.id.0)
                .await?;

            if let Some(text) = welcome_text {
                deliver_welcome(bot, state, chat.id, &text).await?;
            }
        }
        _ => {
            if let Some(text) = welcome_text {
                deliver_welcome(bot, state, chat.id, &text).await?;
            }
        }
    }

    Ok(())
}

/// Render the chat's welcome template (or a default greeting) for a user.
pub async fn render_welcome(
    bot: &ThrottledBot,
    chat_id: ChatId,
    chat_title: &str,
    template: &Option<String>,
    user: &User,
) -> String {
    let count = bot.get_chat_member_count(chat_id).await.ok();

    let template = match template {
        Some(t) => t.clone(),
        None => {
            let mut rng = rand::thread_rng();
            DEFAULT_GREETINGS
                .choose(&mut rng)
                .copied()
                .unwrap_or("Welcome, {first}!")
                .to_string()
        }
    };

    fill_greeting(&template, user, chat_title, count)
}

/// Send a welcome message, honoring the clean-previous-welcome policy.
pub async fn deliver_welcome(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: ChatId,
    text: &str,
) -> anyhow::Result<()> {
    let settings = state.greet.get_or_default(chat_id.0).await?;

    let sent = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;

    if settings.clean_welcome {
        if let Some(previous) = settings.last_welcome_msg {
            let _ = bot.delete_message(chat_id, MessageId(previous)).await;
        }
        state
            .greet
            .set_last_welcome(chat_id.0, Some(sent.id.0))
            .await?;
    }

    Ok(())
}
