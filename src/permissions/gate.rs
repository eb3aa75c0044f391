//! The permission gate: effective privilege resolution and access checks.

use teloxide::types::{Chat, ChatId, UserId};

use super::checker::{AdminChecker, AdminRight};
use super::ranks::{PrivilegeStore, Rank};

/// Effective privilege of a user in a chat context, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrivilegeLevel {
    Member,
    ChatAdmin,
    Whitelist,
    Support,
    Sudo,
    Owner,
    Developer,
}

/// Access requirement attached to a command registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone may run it.
    Public,
    /// Whitelist/pro rank or above.
    WhitelistPlus,
    /// Support rank or above.
    SupportPlus,
    /// Sudo rank or above.
    SudoPlus,
    /// Developers (and the bot owner) only.
    DevOnly,
    /// Chat admin holding the given right; global sudo+ ranks short-circuit.
    ChatAdmin(AdminRight),
}

/// Resolves global ranks and chat-admin status into allow/deny answers.
#[derive(Clone)]
pub struct Gate {
    ranks: PrivilegeStore,
    admins: AdminChecker,
    owner_id: u64,
}

impl Gate {
    pub fn new(ranks: PrivilegeStore, admins: AdminChecker, owner_id: u64) -> Self {
        Self {
            ranks,
            admins,
            owner_id,
        }
    }

    pub fn admins(&self) -> &AdminChecker {
        &self.admins
    }

    pub fn ranks(&self) -> &PrivilegeStore {
        &self.ranks
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        user_id.0 == self.owner_id
    }

    /// Does the user hold any global rank (or own the bot)?
    ///
    /// This is the exemption set used by raid mode and join verification.
    pub async fn is_privileged(&self, user_id: UserId) -> bool {
        if self.is_owner(user_id) {
            return true;
        }
        matches!(self.ranks.rank_of(user_id.0).await, Ok(Some(_)))
    }

    /// Resolve the effective privilege level of a user in a chat.
    pub async fn resolve(&self, chat: &Chat, user_id: UserId) -> PrivilegeLevel {
        match self.ranks.rank_of(user_id.0).await.ok().flatten() {
            Some(Rank::Developer) => return PrivilegeLevel::Developer,
            Some(Rank::Sudo) => return PrivilegeLevel::Sudo,
            Some(Rank::Support) => return PrivilegeLevel::Support,
            Some(Rank::Whitelist) | Some(Rank::Pro) => return PrivilegeLevel::Whitelist,
            None => {}
        }

        if self.is_owner(user_id) {
            return PrivilegeLevel::Owner;
        }

        if !chat.is_private() && self.admins.is_admin(chat.id, user_id).await.unwrap_or(false) {
            return PrivilegeLevel::ChatAdmin;
        }

        PrivilegeLevel::Member
    }

    /// Does the user satisfy the access requirement in this chat?
    ///
    /// Chat-admin requirements authorize private chats automatically and are
    /// short-circuited by sudo-and-above global ranks.
    pub async fn permits(&self, access: Access, chat: &Chat, user_id: UserId) -> bool {
        let level = self.resolve(chat, user_id).await;

        match access {
            Access::Public => true,
            Access::WhitelistPlus => level >= PrivilegeLevel::Whitelist,
            Access::SupportPlus => level >= PrivilegeLevel::Support,
            Access::SudoPlus => level >= PrivilegeLevel::Sudo,
            // The config owner always passes developer checks: the owner is
            // the root of trust and must be able to seed the developer list.
            Access::DevOnly => level >= PrivilegeLevel::Owner,
            Access::ChatAdmin(right) => {
                if chat.is_private() {
                    return true;
                }
                if level >= PrivilegeLevel::Sudo {
                    return true;
                }
                self.admins
                    .has_right(chat.id, user_id, right)
                    .await
                    .unwrap_or(false)
            }
        }
    }

    /// Anonymous-admin proof check: does the clicking user hold the right?
    ///
    /// Used by the proof callback, where the original sender was a channel
    /// proxy and only the clicker's identity is known.
    pub async fn proof_permits(&self, chat_id: ChatId, user_id: UserId, right: AdminRight) -> bool {
        if self.is_owner(user_id) {
            return true;
        }
        if matches!(
            self.ranks.rank_of(user_id.0).await.ok().flatten(),
            Some(Rank::Developer) | Some(Rank::Sudo)
        ) {
            return true;
        }
        self.admins
            .has_right(chat_id, user_id, right)
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(PrivilegeLevel::Developer > PrivilegeLevel::Owner);
        assert!(PrivilegeLevel::Owner > PrivilegeLevel::Sudo);
        assert!(PrivilegeLevel::Sudo > PrivilegeLevel::Support);
        assert!(PrivilegeLevel::Support > PrivilegeLevel::Whitelist);
        assert!(PrivilegeLevel::Whitelist > PrivilegeLevel::ChatAdmin);
        assert!(PrivilegeLevel::ChatAdmin > PrivilegeLevel::Member);
    }
}
