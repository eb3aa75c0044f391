//! Chat-admin checker with caching.
//!
//! The administrator list of a chat is cached for ten minutes to bound API
//! calls; the bot's own rights are always fetched fresh, since Telegram
//! rights can change between messages.

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMember, ChatMemberKind, UserId};
use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};

/// A chat-scoped admin right a command may require of the invoking user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRight {
    /// Any admin status is enough.
    Any,
    ChangeInfo,
    RestrictMembers,
    DeleteMessages,
    PinMessages,
    PromoteMembers,
}

/// A right the bot itself must currently hold in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotRight {
    Restrict,
    Delete,
    Pin,
    Promote,
}

impl BotRight {
    /// Actionable text for the capability-error reply.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Restrict => "restrict users",
            Self::Delete => "delete other users' messages",
            Self::Pin => "pin messages",
            Self::Promote => "appoint new admins",
        }
    }
}

/// Cached admin information for one administrator of a chat.
#[derive(Clone, Debug)]
pub struct AdminInfo {
    pub user_id: UserId,
    pub is_owner: bool,
    pub can_delete_messages: bool,
    pub can_restrict_members: bool,
    pub can_promote_members: bool,
    pub can_change_info: bool,
    pub can_pin_messages: bool,
}

impl AdminInfo {
    /// Create AdminInfo from a ChatMember; None for non-admins.
    fn from_chat_member(member: &ChatMember) -> Option<Self> {
        match &member.kind {
            ChatMemberKind::Owner(_) => Some(Self {
                user_id: member.user.id,
                is_owner: true,
                can_delete_messages: true,
                can_restrict_members: true,
                can_promote_members: true,
                can_change_info: true,
                can_pin_messages: true,
            }),
            ChatMemberKind::Administrator(admin) => Some(Self {
                user_id: member.user.id,
                is_owner: false,
                can_delete_messages: admin.can_delete_messages,
                can_restrict_members: admin.can_restrict_members,
                can_promote_members: admin.can_promote_members,
                can_change_info: admin.can_change_info,
                can_pin_messages: admin.can_pin_messages,
            }),
            _ => None,
        }
    }

    pub fn has(&self, right: AdminRight) -> bool {
        if self.is_owner {
            return true;
        }
        match right {
            AdminRight::Any => true,
            AdminRight::ChangeInfo => self.can_change_info,
            AdminRight::RestrictMembers => self.can_restrict_members,
            AdminRight::DeleteMessages => self.can_delete_messages,
            AdminRight::PinMessages => self.can_pin_messages,
            AdminRight::PromoteMembers => self.can_promote_members,
        }
    }
}

/// Chat-admin lookups with a 10 minute per-chat cache.
#[derive(Clone)]
pub struct AdminChecker {
    bot: Bot,
    bot_id: UserId,
    cache: TypedCache<i64, Arc<Vec<AdminInfo>>>,
}

impl AdminChecker {
    pub fn new(bot: Bot, bot_id: UserId, cache_registry: &CacheRegistry) -> Self {
        let cache = cache_registry.get_or_create(
            "chat_admins",
            CacheConfig::with_capacity(10_000).ttl(Duration::from_secs(600)),
        );

        Self {
            bot,
            bot_id,
            cache,
        }
    }

    /// The chat's administrator list, cached.
    pub async fn admin_list(&self, chat_id: ChatId) -> anyhow::Result<Arc<Vec<AdminInfo>>> {
        if let Some(admins) = self.cache.get(&chat_id.0) {
            debug!("Admin cache hit for chat {}", chat_id);
            return Ok(admins);
        }

        debug!("Admin cache miss for chat {}", chat_id);
        let members = self.bot.get_chat_administrators(chat_id).await?;
        let admins: Arc<Vec<AdminInfo>> = Arc::new(
            members
                .iter()
                .filter_map(AdminInfo::from_chat_member)
                .collect(),
        );

        self.cache.insert(chat_id.0, admins.clone());
        Ok(admins)
    }

    /// Admin info for one user in a chat; None if they are not an admin.
    pub async fn admin_info(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> anyhow::Result<Option<AdminInfo>> {
        let admins = self.admin_list(chat_id).await?;
        Ok(admins.iter().find(|a| a.user_id == user_id).cloned())
    }

    /// Check if a user is an admin (including the chat owner).
    pub async fn is_admin(&self, chat_id: ChatId, user_id: UserId) -> anyhow::Result<bool> {
        Ok(self.admin_info(chat_id, user_id).await?.is_some())
    }

    /// Check if a user holds a specific admin right in the chat.
    pub async fn has_right(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        right: AdminRight,
    ) -> anyhow::Result<bool> {
        Ok(self
            .admin_info(chat_id, user_id)
            .await?
            .map(|a| a.has(right))
            .unwrap_or(false))
    }

    /// Check the bot's own right in the chat.
    ///
    /// Always fetched fresh; Telegram rights can change between messages.
    pub async fn bot_has(&self, chat_id: ChatId, right: BotRight) -> anyhow::Result<bool> {
        let member = self.bot.get_chat_member(chat_id, self.bot_id).await?;
        let ok = match &member.kind {
            ChatMemberKind::Owner(_) => true,
            ChatMemberKind::Administrator(admin) => match right {
                BotRight::Restrict => admin.can_restrict_members,
                BotRight::Delete => admin.can_delete_messages,
                BotRight::Pin => admin.can_pin_messages,
                BotRight::Promote => admin.can_promote_members,
            },
            _ => false,
        };
        Ok(ok)
    }

    /// Invalidate the cached admin list for a chat.
    ///
    /// Call this when admin status might have changed.
    pub fn invalidate(&self, chat_id: ChatId) {
        self.cache.invalidate(&chat_id.0);
        debug!("Invalidated admin cache for chat {}", chat_id);
    }
}
