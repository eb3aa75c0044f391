//! Join verification: the muted-pending state machine.
//!
//! JOINED -> MUTED_PENDING -> VERIFIED | TIMED_OUT. The pending record is
//! persisted; both resolution paths delete it first and treat a lost race
//! as "the other path already acted", so the deadline firing twice or a tap
//! racing the deadline can never double-act.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use teloxide::prelude::*;
use teloxide::types::{
    Chat, ChatPermissions, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, User,
};
use tracing::{info, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{PendingVerification, VerifyMode};
use crate::events::join;
use crate::utils::mention_html;

/// Seconds a joiner gets to verify before being removed.
pub const DEADLINE_SECS: i64 = 120;

fn timer_key(chat_id: i64, user_id: u64) -> String {
    format!("verify:{}:{}", chat_id, user_id)
}

/// Mute a joiner, post the challenge and arm the deadline.
pub async fn begin_challenge(
    bot: &ThrottledBot,
    state: &AppState,
    chat: &Chat,
    user: &User,
    mode: VerifyMode,
    welcome_text: Option<String>,
) -> anyhow::Result<()> {
    bot.restrict_chat_member(chat.id, user.id, ChatPermissions::empty())
        .await?;

    let mention = mention_html(user.id.0, &user.first_name);

    let (challenge, captcha_answer) = match mode {
        VerifyMode::Captcha => {
            let (code, keyboard) = build_captcha(chat.id.0, user.id.0);
            let sent = bot
                .send_message(
                    chat.id,
                    format!(
                        "Welcome {}! Tap <code>{}</code> below to get unmuted.\n\
                         You have {} seconds.",
                        mention, code, DEADLINE_SECS
                    ),
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
            (sent, Some(code))
        }
        _ => {
            let keyboard = InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
                "Yes, I'm human.",
                format!("vfy:{}", user.id.0),
            )]]);
            let sent = bot
                .send_message(
                    chat.id,
                    format!(
                        "{}, click the button below to prove you're human.\n\
                         You have {} seconds.",
                        mention, DEADLINE_SECS
                    ),
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
            (sent, None)
        }
    };

    let record = PendingVerification {
        id: None,
        chat_id: chat.id.0,
        user_id: user.id.0,
        mode,
        captcha_answer,
        welcome_text,
        challenge_msg_id: challenge.id.0,
        deadline: chrono::Utc::now().timestamp() + DEADLINE_SECS,
    };
    state.greet.put_pending(&record).await?;

    schedule_deadline(
        bot,
        state,
        chat.id.0,
        user.id.0,
        Duration::from_secs(DEADLINE_SECS as u64),
    );

    Ok(())
}

/// One correct 4-digit code among seven shuffled decoys, three per row.
fn build_captcha(chat_id: i64, user_id: u64) -> (u32, InlineKeyboardMarkup) {
    let mut rng = rand::thread_rng();
    let code: u32 = rng.gen_range(1000..10000);

    let mut numbers = vec![code];
    while numbers.len() < 8 {
        let decoy = rng.gen_range(1000..10000);
        if !numbers.contains(&decoy) {
            numbers.push(decoy);
        }
    }
    numbers.shuffle(&mut rng);

    let rows: Vec<Vec<InlineKeyboardButton>> = numbers
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|n| {
                    InlineKeyboardButton::callback(
                        n.to_string(),
                        format!("vfycap:{}:{}:{}", chat_id, user_id, n),
                    )
                })
                .collect()
        })
        .collect();

    (code, InlineKeyboardMarkup::new(rows))
}

/// Arm (or re-arm) the removal deadline for a pending verification.
pub fn schedule_deadline(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: i64,
    user_id: u64,
    delay: Duration,
) {
    let bot = bot.clone();
    let state_for_task = state.clone();
    state.timers.schedule(timer_key(chat_id, user_id), delay, async move {
        if let Err(e) = deadline_fire(&bot, &state_for_task, chat_id, user_id).await {
            warn!(
                "Verification deadline handling failed for ({}, {}): {}",
                chat_id, user_id, e
            );
        }
    });
}

/// Re-arm deadlines for rows that survived a restart.
pub async fn resume_pending(bot: &ThrottledBot, state: &AppState) -> anyhow::Result<()> {
    let rows = state.greet.all_pending().await?;
    let count = rows.len();

    let now = chrono::Utc::now().timestamp();
    for row in rows {
        let remaining = (row.deadline - now).max(1) as u64;
        schedule_deadline(bot, state, row.chat_id, row.user_id, Duration::from_secs(remaining));
    }

    if count > 0 {
        info!("Re-armed {} pending verification deadline(s)", count);
    }
    Ok(())
}

/// The deadline: if the record is still pending, remove the joiner.
async fn deadline_fire(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: i64,
    user_id: u64,
) -> anyhow::Result<()> {
    let row = match state.greet.get_pending(chat_id, user_id).await? {
        Some(row) => row,
        // Verified in time; the deadline is a no-op.
        None => return Ok(()),
    };

    if !state.greet.remove_pending(chat_id, user_id).await? {
        return Ok(());
    }

    let chat = ChatId(chat_id);
    let user = UserId(user_id);

    // Lift the restriction first, then remove: unban on a present member
    // kicks them out without leaving a ban behind.
    let _ = bot.unban_chat_member(chat, user).await;

    let edited = bot
        .edit_message_text(
            chat,
            MessageId(row.challenge_msg_id),
            "*kicks user*\nThey can always rejoin and try again.",
        )
        .await;

    if edited.is_err() {
        // Challenge message already gone; post a fresh notice instead.
        let _ = bot.delete_message(chat, MessageId(row.challenge_msg_id)).await;
        let name = bot
            .get_chat_member(chat, user)
            .await
            .map(|m| m.user.first_name.clone())
            .unwrap_or_else(|_| "A member".to_string());
        bot.send_message(
            chat,
            format!(
                "{} was kicked as they failed to verify themselves.",
                mention_html(user_id, &name)
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
    }

    info!("Removed unverified joiner {} from chat {}", user_id, chat_id);
    Ok(())
}

/// Callback for the strong-mode "I'm human" button (`vfy:<user_id>`).
pub async fn on_verify_button(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
) -> anyhow::Result<()> {
    let join_user: u64 = match q.data.as_deref().and_then(|d| d.strip_prefix("vfy:")) {
        Some(rest) => match rest.parse() {
            Ok(id) => id,
            Err(_) => return Ok(()),
        },
        None => return Ok(()),
    };

    let chat_id = match q.message.as_ref() {
        Some(msg) => msg.chat().id,
        None => return Ok(()),
    };

    if q.from.id.0 != join_user {
        bot.answer_callback_query(&q.id)
            .text("You're not allowed to do this!")
            .await?;
        return Ok(());
    }

    let row = match state.greet.get_pending(chat_id.0, join_user).await? {
        Some(row) => row,
        None => {
            bot.answer_callback_query(&q.id)
                .text("Nothing pending for you here.")
                .await?;
            return Ok(());
        }
    };

    succeed(&bot, &state, chat_id, &q, row).await
}

/// Callback for captcha answers (`vfycap:<chat>:<user>:<code>`).
pub async fn on_captcha_button(
    bot: ThrottledBot,
    q: CallbackQuery,
    state: AppState,
) -> anyhow::Result<()> {
    let data = q.data.as_deref().unwrap_or("");
    let mut parts = data.strip_prefix("vfycap:").unwrap_or("").split(':');
    let (chat_id, join_user, code): (i64, u64, u32) = match (
        parts.next().and_then(|p| p.parse().ok()),
        parts.next().and_then(|p| p.parse().ok()),
        parts.next().and_then(|p| p.parse().ok()),
    ) {
        (Some(c), Some(u), Some(a)) => (c, u, a),
        _ => return Ok(()),
    };
    let chat = ChatId(chat_id);

    if q.from.id.0 != join_user {
        bot.answer_callback_query(&q.id)
            .text("You're not allowed to do this!")
            .await?;
        return Ok(());
    }

    let row = match state.greet.get_pending(chat_id, join_user).await? {
        Some(row) => row,
        None => {
            bot.answer_callback_query(&q.id)
                .text("Nothing pending for you here.")
                .await?;
            return Ok(());
        }
    };

    if row.captcha_answer == Some(code) {
        return succeed(&bot, &state, chat, &q, row).await;
    }

    // Wrong answer: removed immediately, no second chance on this join.
    if !state.greet.remove_pending(chat_id, join_user).await? {
        return Ok(());
    }
    state.timers.cancel(&timer_key(chat_id, join_user));

    bot.answer_callback_query(&q.id).text("Wrong answer.").await?;
    let _ = bot.delete_message(chat, MessageId(row.challenge_msg_id)).await;
    let _ = bot.unban_chat_member(chat, UserId(join_user)).await;

    bot.send_message(
        chat,
        format!(
            "{} failed the captcha and was kicked.",
            mention_html(join_user, &q.from.first_name)
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;

    Ok(())
}

/// The VERIFIED transition: restore permissions, clean up the challenge and
/// deliver any deferred welcome.
async fn succeed(
    bot: &ThrottledBot,
    state: &AppState,
    chat_id: ChatId,
    q: &CallbackQuery,
    row: PendingVerification,
) -> anyhow::Result<()> {
    let user = &q.from;
    // Whoever deletes the row wins; if the deadline got there first, this
    // tap is too late.
    if !state.greet.remove_pending(chat_id.0, user.id.0).await? {
        return Ok(());
    }
    state.timers.cancel(&timer_key(chat_id.0, user.id.0));

    state
        .greet
        .set_verified_human(chat_id.0, user.id.0)
        .await?;

    bot.restrict_chat_member(chat_id, user.id, ChatPermissions::all())
        .await?;

    bot.answer_callback_query(&q.id)
        .text("You're human, unmuted!")
        .await?;

    let _ = bot
        .delete_message(chat_id, MessageId(row.challenge_msg_id))
        .await;

    if let Some(text) = row.welcome_text {
        join::deliver_welcome(bot, state, chat_id, &text).await?;
    }

    info!("User {} verified in chat {}", user.id, chat_id);
    Ok(())
}
