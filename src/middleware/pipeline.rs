//! The ordered dispatch pipeline.
//!
//! [`STAGES`] declares the chain every matched command runs through:
//! rate-limit first, then the permission gate, then the per-chat disable
//! check, then the handler. A stage either lets the dispatch continue or
//! breaks it with a verdict; rate limiting and permission checks always run
//! to completion (or deny) before any handler logic executes.

use std::ops::ControlFlow;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Message, ParseMode};
use tracing::{debug, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::middleware::anon::{self, ResumeIntent};
use crate::middleware::audit;
use crate::middleware::registry::{CommandCtx, CommandSpec, Lookup};
use crate::permissions::{Access, BotRight};
use crate::report::ErrorContext;

/// One stage of the dispatch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RateLimit,
    Permission,
    DisableCheck,
    Handler,
}

/// The chain, in the order it runs. This is the contract, not an emergent
/// property of wrapping order.
pub const STAGES: [Stage; 4] = [
    Stage::RateLimit,
    Stage::Permission,
    Stage::DisableCheck,
    Stage::Handler,
];

/// Why a dispatch stopped before (or instead of) running the handler.
#[derive(Debug, thiserror::Error)]
pub enum Denial {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("permission denied")]
    PermissionDenied,
    #[error("command disabled in this chat")]
    Disabled,
    #[error("bot lacks the right to {}", .0.describe())]
    MissingBotRight(BotRight),
}

/// A stage's reason to break the chain.
enum Verdict {
    Denied(Denial),
    /// An identity proof was requested; dispatch resumes from a callback.
    Deferred,
}

/// Try to dispatch a text message as a command.
///
/// Returns true when the message was recognized as one of ours (whether it
/// ran, was denied, or was addressed to this bot and suppressed), false when
/// other message handlers should have a look at it.
pub async fn dispatch(bot: &ThrottledBot, msg: &Message, state: &AppState) -> anyhow::Result<bool> {
    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(false),
    };

    let (spec, name, args) = match state.commands.lookup(text, &state.bot_username) {
        Lookup::Matched { spec, name, args } => (spec.clone(), name, args),
        // Addressed to a different bot: not ours to run, not ours to clean.
        Lookup::ForeignBot => return Ok(true),
        Lookup::Unknown { .. } | Lookup::NotCommand => return Ok(false),
    };

    Dispatch {
        bot,
        msg,
        state,
        spec: &spec,
        name,
        args,
    }
    .run(&STAGES)
    .await?;

    Ok(true)
}

/// Re-enter the pipeline for a proven anonymous-admin intent.
///
/// Rate limiting and the permission stage were already settled when the
/// intent was parked, so the replay starts at the disable check.
pub async fn replay(
    bot: &ThrottledBot,
    state: &AppState,
    intent: &ResumeIntent,
) -> anyhow::Result<()> {
    let spec = match state.commands.find(&intent.command) {
        Some(spec) => spec.clone(),
        None => return Ok(()),
    };

    Dispatch {
        bot,
        msg: &intent.msg,
        state,
        spec: &spec,
        name: intent.command.clone(),
        args: intent.args.clone(),
    }
    .run(&[Stage::DisableCheck, Stage::Handler])
    .await
}

struct Dispatch<'a> {
    bot: &'a ThrottledBot,
    msg: &'a Message,
    state: &'a AppState,
    spec: &'a CommandSpec,
    name: String,
    args: Vec<String>,
}

impl Dispatch<'_> {
    async fn run(mut self, stages: &[Stage]) -> anyhow::Result<()> {
        for stage in stages {
            if let ControlFlow::Break(verdict) = self.stage(*stage).await? {
                if let Verdict::Denied(denial) = verdict {
                    self.denied(denial).await?;
                }
                return Ok(());
            }
        }
        Ok(())
    }

    async fn stage(&mut self, stage: Stage) -> anyhow::Result<ControlFlow<Verdict>> {
        match stage {
            Stage::RateLimit => self.rate_limit().await,
            Stage::Permission => self.permission().await,
            Stage::DisableCheck => self.disable_check().await,
            Stage::Handler => {
                self.invoke().await;
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    async fn rate_limit(&self) -> anyhow::Result<ControlFlow<Verdict>> {
        let user_id = match self.msg.from.as_ref() {
            Some(user) => user.id.0,
            // No sender to account against (channel posts); the permission
            // stage deals with those.
            None => return Ok(ControlFlow::Continue(())),
        };

        if self.state.rate_limiter.check(user_id).await {
            Ok(ControlFlow::Continue(()))
        } else {
            Ok(ControlFlow::Break(Verdict::Denied(Denial::RateLimited)))
        }
    }

    async fn permission(&self) -> anyhow::Result<ControlFlow<Verdict>> {
        // Anonymous senders cannot be checked directly; park the intent and
        // ask for an identity proof instead of an immediate allow/deny.
        if self.msg.sender_chat.is_some() {
            return match self.spec.access {
                Access::Public => self.check_bot_rights().await,
                Access::ChatAdmin(right) => {
                    self.request_identity_proof(right).await?;
                    Ok(ControlFlow::Break(Verdict::Deferred))
                }
                _ => Ok(ControlFlow::Break(Verdict::Denied(Denial::PermissionDenied))),
            };
        }

        let user = match self.msg.from.as_ref() {
            Some(user) => user,
            None => {
                return Ok(ControlFlow::Break(Verdict::Denied(Denial::PermissionDenied)))
            }
        };

        if !self
            .state
            .gate
            .permits(self.spec.access, &self.msg.chat, user.id)
            .await
        {
            return Ok(ControlFlow::Break(Verdict::Denied(Denial::PermissionDenied)));
        }

        self.check_bot_rights().await
    }

    /// Bot-capability requirements re-check current membership rights; a
    /// cached answer could post-date a demotion.
    async fn check_bot_rights(&self) -> anyhow::Result<ControlFlow<Verdict>> {
        let right = match self.spec.bot_requires {
            Some(right) if !self.msg.chat.is_private() => right,
            _ => return Ok(ControlFlow::Continue(())),
        };

        let ok = self
            .state
            .gate
            .admins()
            .bot_has(self.msg.chat.id, right)
            .await
            .unwrap_or(false);

        if ok {
            Ok(ControlFlow::Continue(()))
        } else {
            Ok(ControlFlow::Break(Verdict::Denied(Denial::MissingBotRight(
                right,
            ))))
        }
    }

    async fn disable_check(&self) -> anyhow::Result<ControlFlow<Verdict>> {
        if !self.spec.disableable || self.msg.chat.is_private() {
            return Ok(ControlFlow::Continue(()));
        }

        let policy = self
            .state
            .policy
            .get_or_default(self.msg.chat.id.0)
            .await?;
        if !policy.is_disabled(&self.name) {
            return Ok(ControlFlow::Continue(()));
        }

        if self.spec.admin_ok {
            if let Some(user) = self.msg.from.as_ref() {
                let is_admin = self
                    .state
                    .gate
                    .admins()
                    .is_admin(self.msg.chat.id, user.id)
                    .await
                    .unwrap_or(false);
                if is_admin {
                    return Ok(ControlFlow::Continue(()));
                }
            }
        }

        Ok(ControlFlow::Break(Verdict::Denied(Denial::Disabled)))
    }

    async fn invoke(&mut self) {
        let ctx = CommandCtx {
            bot: self.bot.clone(),
            msg: self.msg.clone(),
            state: self.state.clone(),
            args: self.args.clone(),
        };

        match self.spec.invoke(ctx).await {
            Ok(Some(log)) => {
                if let Err(e) = audit::forward(self.bot, &self.state.policy, self.msg, &log).await {
                    warn!("Audit forwarding failed for /{}: {}", self.name, e);
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.state
                    .reporter
                    .report(self.bot, ErrorContext::from_message(self.msg), &e)
                    .await;
            }
        }
    }

    async fn request_identity_proof(&self, right: crate::permissions::AdminRight) -> anyhow::Result<()> {
        let chat_id = self.msg.chat.id;
        let intent = ResumeIntent {
            command: self.name.clone(),
            args: self.args.clone(),
            right,
            msg: self.msg.clone(),
        };
        self.state.anon.put(chat_id.0, self.msg.id.0, intent);

        let keyboard = InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
            "Prove identity",
            anon::callback_data(chat_id.0, self.msg.id.0),
        )]]);

        self.bot
            .send_message(
                chat_id,
                "Seems like you're anonymous, click the button below to prove your identity",
            )
            .reply_markup(keyboard)
            .await?;

        Ok(())
    }

    /// Exactly one of silent-drop or terse-reply per chat policy, never both.
    async fn denied(&self, denial: Denial) -> anyhow::Result<()> {
        match denial {
            Denial::RateLimited | Denial::Disabled => {
                // Suppressions are silent; the limiter already logged at debug.
                debug!("Suppressed /{} in chat {}: {}", self.name, self.msg.chat.id, denial);
                Ok(())
            }
            Denial::PermissionDenied => {
                let policy = self
                    .state
                    .policy
                    .get_or_default(self.msg.chat.id.0)
                    .await?;
                let quiet = policy.quiet_deny.unwrap_or(self.state.quiet_deny_default);

                if quiet {
                    let _ = self.bot.delete_message(self.msg.chat.id, self.msg.id).await;
                } else {
                    let text = match self.spec.access {
                        Access::ChatAdmin(right) => format!(
                            "You lack the permission: <code>{:?}</code>",
                            right
                        ),
                        _ => "You don't have access to use this.".to_string(),
                    };
                    self.bot
                        .send_message(self.msg.chat.id, text)
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
                Ok(())
            }
            Denial::MissingBotRight(right) => {
                self.bot
                    .send_message(
                        self.msg.chat.id,
                        format!(
                            "I can't {} here!\nMake sure I'm admin and can {}.",
                            right.describe(),
                            right.describe()
                        ),
                    )
                    .await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_fixed() {
        // Rate limiting must run before the permission gate, the disable
        // check after both, and the handler last.
        assert_eq!(
            STAGES,
            [
                Stage::RateLimit,
                Stage::Permission,
                Stage::DisableCheck,
                Stage::Handler
            ]
        );
    }
}
