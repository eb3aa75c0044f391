//! Policy repository: disabled commands, denial policy, blue-text cleaning
//! and log-channel bindings.
//!
//! Consulted on every dispatched command, so cached with a 10 minute TTL.

use std::time::Duration;

use anyhow::Result;
use mongodb::bson::doc;
use mongodb::Collection;
use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::database::models::{ChatPolicy, GlobalPolicy};
use crate::database::Database;

/// Repository for per-chat dispatch policy.
pub struct PolicyRepo {
    collection: Collection<ChatPolicy>,
    global: Collection<GlobalPolicy>,
    cache: TypedCache<i64, ChatPolicy>,
    global_cache: TypedCache<String, GlobalPolicy>,
}

impl PolicyRepo {
    pub fn new(db: &Database, cache: &CacheRegistry) -> Self {
        let policy_cache = cache.get_or_create(
            "chat_policy",
            CacheConfig::with_capacity(10_000).ttl(Duration::from_secs(600)),
        );
        let global_cache = cache.get_or_create(
            "global_policy",
            CacheConfig::with_capacity(4).ttl(Duration::from_secs(600)),
        );

        Self {
            collection: db.collection("policy"),
            global: db.collection("policy_global"),
            cache: policy_cache,
            global_cache,
        }
    }

    /// Get policy, returning defaults if the chat has none stored.
    pub async fn get_or_default(&self, chat_id: i64) -> Result<ChatPolicy> {
        if let Some(policy) = self.cache.get(&chat_id) {
            return Ok(policy);
        }

        let filter = doc! { "chat_id": chat_id };
        let result = self.collection.find_one(filter).await?;

        let policy = result.unwrap_or_else(|| ChatPolicy::new(chat_id));
        self.cache.insert(chat_id, policy.clone());

        Ok(policy)
    }

    /// Save policy (upsert).
    pub async fn save(&self, policy: &ChatPolicy) -> Result<()> {
        let filter = doc! { "chat_id": policy.chat_id };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .replace_one(filter, policy)
            .with_options(options)
            .await?;

        self.cache.insert(policy.chat_id, policy.clone());
        debug!("Saved ChatPolicy for chat {}", policy.chat_id);

        Ok(())
    }

    /// Disable a command in a chat. Returns false if already disabled.
    pub async fn disable_command(&self, chat_id: i64, command: &str) -> Result<bool> {
        let mut policy = self.get_or_default(chat_id).await?;
        if policy.is_disabled(command) {
            return Ok(false);
        }
        policy.disabled_commands.push(command.to_string());
        self.save(&policy).await?;
        Ok(true)
    }

    /// Re-enable a command in a chat. Returns false if it wasn't disabled.
    pub async fn enable_command(&self, chat_id: i64, command: &str) -> Result<bool> {
        let mut policy = self.get_or_default(chat_id).await?;
        match policy.disabled_commands.iter().position(|c| c == command) {
            Some(pos) => {
                policy.disabled_commands.remove(pos);
                self.save(&policy).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn set_quiet_deny(&self, chat_id: i64, quiet: bool) -> Result<()> {
        let mut policy = self.get_or_default(chat_id).await?;
        policy.quiet_deny = Some(quiet);
        self.save(&policy).await
    }

    pub async fn set_clean_bluetext(&self, chat_id: i64, enabled: bool) -> Result<()> {
        let mut policy = self.get_or_default(chat_id).await?;
        policy.clean_bluetext = enabled;
        self.save(&policy).await
    }

    /// Add a token to the chat's blue-text ignore list.
    pub async fn ignore_bluetext(&self, chat_id: i64, token: &str) -> Result<bool> {
        let mut policy = self.get_or_default(chat_id).await?;
        if policy.bluetext_ignored.iter().any(|t| t == token) {
            return Ok(false);
        }
        policy.bluetext_ignored.push(token.to_string());
        self.save(&policy).await?;
        Ok(true)
    }

    /// Remove a token from the chat's blue-text ignore list.
    pub async fn unignore_bluetext(&self, chat_id: i64, token: &str) -> Result<bool> {
        let mut policy = self.get_or_default(chat_id).await?;
        match policy.bluetext_ignored.iter().position(|t| t == token) {
            Some(pos) => {
                policy.bluetext_ignored.remove(pos);
                self.save(&policy).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The process-wide policy singleton.
    pub async fn global_policy(&self) -> Result<GlobalPolicy> {
        if let Some(policy) = self.global_cache.get(&GlobalPolicy::KEY.to_string()) {
            return Ok(policy);
        }

        let filter = doc! { "_id": GlobalPolicy::KEY };
        let policy = self
            .global
            .find_one(filter)
            .await?
            .unwrap_or_else(GlobalPolicy::new);
        self.global_cache
            .insert(GlobalPolicy::KEY.to_string(), policy.clone());
        Ok(policy)
    }

    async fn save_global(&self, policy: &GlobalPolicy) -> Result<()> {
        let filter = doc! { "_id": GlobalPolicy::KEY };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();
        self.global
            .replace_one(filter, policy)
            .with_options(options)
            .await?;
        self.global_cache
            .insert(GlobalPolicy::KEY.to_string(), policy.clone());
        Ok(())
    }

    /// Add a token to the global blue-text ignore list.
    pub async fn ignore_bluetext_global(&self, token: &str) -> Result<bool> {
        let mut policy = self.global_policy().await?;
        if policy.bluetext_ignored.iter().any(|t| t == token) {
            return Ok(false);
        }
        policy.bluetext_ignored.push(token.to_string());
        self.save_global(&policy).await?;
        Ok(true)
    }

    /// Remove a token from the global blue-text ignore list.
    pub async fn unignore_bluetext_global(&self, token: &str) -> Result<bool> {
        let mut policy = self.global_policy().await?;
        match policy.bluetext_ignored.iter().position(|t| t == token) {
            Some(pos) => {
                policy.bluetext_ignored.remove(pos);
                self.save_global(&policy).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The chat's configured log channel, if any.
    pub async fn log_channel(&self, chat_id: i64) -> Result<Option<i64>> {
        Ok(self.get_or_default(chat_id).await?.log_channel)
    }

    pub async fn set_log_channel(&self, chat_id: i64, channel_id: i64) -> Result<()> {
        let mut policy = self.get_or_default(chat_id).await?;
        policy.log_channel = Some(channel_id);
        self.save(&policy).await
    }

    /// Unset the log channel, returning the previous binding.
    pub async fn unset_log_channel(&self, chat_id: i64) -> Result<Option<i64>> {
        let mut policy = self.get_or_default(chat_id).await?;
        let previous = policy.log_channel.take();
        if previous.is_some() {
            self.save(&policy).await?;
        }
        Ok(previous)
    }

    /// Relabel rows after a group -> supergroup migration.
    pub async fn migrate_chat(&self, old_chat_id: i64, new_chat_id: i64) -> Result<()> {
        self.collection
            .update_many(
                doc! { "chat_id": old_chat_id },
                doc! { "$set": { "chat_id": new_chat_id } },
            )
            .await?;
        self.cache.invalidate(&old_chat_id);
        self.cache.invalidate(&new_chat_id);
        Ok(())
    }

    /// Count chats with at least one disabled command (for /stats).
    pub async fn count_disabling_chats(&self) -> Result<u64> {
        Ok(self
            .collection
            .count_documents(doc! { "disabled_commands.0": { "$exists": true } })
            .await?)
    }
}
