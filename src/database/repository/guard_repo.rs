//! Guard repository: flood + raid settings with hot caching.
//!
//! Read on every group message by the flood detector, so cached with a
//! 10 minute TTL.

use std::time::Duration;

use anyhow::Result;
use mongodb::bson::doc;
use mongodb::Collection;
use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::database::models::{FloodAction, GuardSettings, RaidSettings};
use crate::database::Database;

/// Repository for per-chat guard settings (flood, raid, approvals).
pub struct GuardRepo {
    collection: Collection<GuardSettings>,
    cache: TypedCache<i64, GuardSettings>,
}

impl GuardRepo {
    pub fn new(db: &Database, cache: &CacheRegistry) -> Self {
        let guard_cache = cache.get_or_create(
            "guard_settings",
            CacheConfig::with_capacity(10_000).ttl(Duration::from_secs(600)),
        );

        Self {
            collection: db.collection("guard"),
            cache: guard_cache,
        }
    }

    /// Get settings, returning defaults if the chat has none stored.
    pub async fn get_or_default(&self, chat_id: i64) -> Result<GuardSettings> {
        if let Some(settings) = self.cache.get(&chat_id) {
            return Ok(settings);
        }

        let filter = doc! { "chat_id": chat_id };
        let result = self.collection.find_one(filter).await?;

        let settings = result.unwrap_or_else(|| GuardSettings::new(chat_id));
        self.cache.insert(chat_id, settings.clone());

        Ok(settings)
    }

    /// Save settings (upsert).
    pub async fn save(&self, settings: &GuardSettings) -> Result<()> {
        let filter = doc! { "chat_id": settings.chat_id };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .replace_one(filter, settings)
            .with_options(options)
            .await?;

        self.cache.insert(settings.chat_id, settings.clone());
        debug!("Saved GuardSettings for chat {}", settings.chat_id);

        Ok(())
    }

    /// Set the flood limit. 0 disables flood control.
    pub async fn set_flood_limit(&self, chat_id: i64, limit: u32) -> Result<()> {
        let mut settings = self.get_or_default(chat_id).await?;
        settings.flood.limit = limit;
        self.save(&settings).await
    }

    /// Set the flood action and optional duration string.
    pub async fn set_flood_action(
        &self,
        chat_id: i64,
        action: FloodAction,
        duration: Option<String>,
    ) -> Result<()> {
        let mut settings = self.get_or_default(chat_id).await?;
        settings.flood.action = action;
        settings.flood.action_duration = duration;
        self.save(&settings).await
    }

    /// Replace the raid settings wholesale.
    pub async fn set_raid(&self, chat_id: i64, raid: RaidSettings) -> Result<()> {
        let mut settings = self.get_or_default(chat_id).await?;
        settings.raid = raid;
        self.save(&settings).await
    }

    /// Approve a user (flood exemption). Returns false if already approved.
    pub async fn approve(&self, chat_id: i64, user_id: u64) -> Result<bool> {
        let mut settings = self.get_or_default(chat_id).await?;
        let added = settings.approve(user_id);
        if added {
            self.save(&settings).await?;
        }
        Ok(added)
    }

    /// Unapprove a user. Returns false if not approved.
    pub async fn unapprove(&self, chat_id: i64, user_id: u64) -> Result<bool> {
        let mut settings = self.get_or_default(chat_id).await?;
        let removed = settings.unapprove(user_id);
        if removed {
            self.save(&settings).await?;
        }
        Ok(removed)
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

    /// Count chats enforcing flood control (for /stats).
    pub async fn count_flood_enabled(&self) -> Result<u64> {
        Ok(self
            .collection
            .count_documents(doc! { "flood.limit": { "$gt": 0 } })
            .await?)
    }
}
