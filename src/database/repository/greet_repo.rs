//! Greet repository: welcome settings, pending verifications, human checks.
//!
//! Welcome settings are lazily cached (joins are rare). Pending
//! verifications are not cached at all - the deadline handler must always
//! see the current row.

use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use mongodb::bson::doc;
use mongodb::Collection;
use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::database::models::{GreetSettings, PendingVerification, VerifiedHuman};
use crate::database::Database;

/// Repository for greeting and join-verification state.
pub struct GreetRepo {
    settings: Collection<GreetSettings>,
    pending: Collection<PendingVerification>,
    humans: Collection<VerifiedHuman>,
    cache: TypedCache<i64, GreetSettings>,
}

impl GreetRepo {
    pub fn new(db: &Database, cache: &CacheRegistry) -> Self {
        let greet_cache = cache.get_or_create(
            "greet_settings",
            CacheConfig::with_capacity(2_000).ttl(Duration::from_secs(300)),
        );

        Self {
            settings: db.collection("greet"),
            pending: db.collection("pending_verify"),
            humans: db.collection("human_checks"),
            cache: greet_cache,
        }
    }

    /// Get settings, returning defaults if the chat has none stored.
    pub async fn get_or_default(&self, chat_id: i64) -> Result<GreetSettings> {
        if let Some(settings) = self.cache.get(&chat_id) {
            return Ok(settings);
        }

        let filter = doc! { "chat_id": chat_id };
        let result = self.settings.find_one(filter).await?;

        let settings = result.unwrap_or_else(|| GreetSettings::new(chat_id));
        self.cache.insert(chat_id, settings.clone());

        Ok(settings)
    }

    /// Save settings (upsert).
    pub async fn save(&self, settings: &GreetSettings) -> Result<()> {
        let filter = doc! { "chat_id": settings.chat_id };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.settings
            .replace_one(filter, settings)
            .with_options(options)
            .await?;

        self.cache.insert(settings.chat_id, settings.clone());
        debug!("Saved GreetSettings for chat {}", settings.chat_id);

        Ok(())
    }

    /// Remember the last welcome message for the clean-welcome policy.
    pub async fn set_last_welcome(&self, chat_id: i64, message_id: Option<i32>) -> Result<()> {
        let mut settings = self.get_or_default(chat_id).await?;
        settings.last_welcome_msg = message_id;
        self.save(&settings).await
    }

    /// Store a pending verification, replacing any existing row for the
    /// same (chat, user) so at most one is in flight.
    pub async fn put_pending(&self, record: &PendingVerification) -> Result<()> {
        let filter = doc! { "chat_id": record.chat_id, "user_id": record.user_id as i64 };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.pending
            .replace_one(filter, record)
            .with_options(options)
            .await?;
        Ok(())
    }

    /// Fetch the pending verification for a (chat, user), if any.
    pub async fn get_pending(
        &self,
        chat_id: i64,
        user_id: u64,
    ) -> Result<Option<PendingVerification>> {
        let filter = doc! { "chat_id": chat_id, "user_id": user_id as i64 };
        Ok(self.pending.find_one(filter).await?)
    }

    /// Remove the pending verification for a (chat, user).
    ///
    /// Returns true if a row was actually deleted, so callers can tell
    /// whether they won the race against another resolution path.
    pub async fn remove_pending(&self, chat_id: i64, user_id: u64) -> Result<bool> {
        let filter = doc! { "chat_id": chat_id, "user_id": user_id as i64 };
        let result = self.pending.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }

    /// All pending verifications, for re-arming deadlines on startup.
    pub async fn all_pending(&self) -> Result<Vec<PendingVerification>> {
        let mut cursor = self.pending.find(doc! {}).await?;
        let mut out = Vec::new();
        while let Some(record) = cursor.next().await {
            out.push(record?);
        }
        Ok(out)
    }

    /// Has this user already passed verification in this chat?
    pub async fn is_verified_human(&self, chat_id: i64, user_id: u64) -> Result<bool> {
        let filter = doc! { "chat_id": chat_id, "user_id": user_id as i64 };
        Ok(self.humans.find_one(filter).await?.is_some())
    }

    /// Record a passed verification.
    pub async fn set_verified_human(&self, chat_id: i64, user_id: u64) -> Result<()> {
        let filter = doc! { "chat_id": chat_id, "user_id": user_id as i64 };
        let record = VerifiedHuman {
            id: None,
            chat_id,
            user_id,
        };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();
        self.humans
            .replace_one(filter, record)
            .with_options(options)
            .await?;
        Ok(())
    }

    /// Relabel rows after a group -> supergroup migration.
    pub async fn migrate_chat(&self, old_chat_id: i64, new_chat_id: i64) -> Result<()> {
        let update = doc! { "$set": { "chat_id": new_chat_id } };
        self.settings
            .update_many(doc! { "chat_id": old_chat_id }, update.clone())
            .await?;
        self.pending
            .update_many(doc! { "chat_id": old_chat_id }, update.clone())
            .await?;
        self.humans
            .update_many(doc! { "chat_id": old_chat_id }, update)
            .await?;
        self.cache.invalidate(&old_chat_id);
        self.cache.invalidate(&new_chat_id);
        Ok(())
    }

    /// Count in-flight verifications (for /stats).
    pub async fn count_pending(&self) -> Result<u64> {
        Ok(self.pending.count_documents(doc! {}).await?)
    }
}
