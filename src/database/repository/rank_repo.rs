//! Rank repository.
//!
//! One document per user; keying on user_id is what enforces the
//! at-most-one-rank invariant.

use anyhow::Result;
use futures::StreamExt;
use mongodb::bson::doc;
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::permissions::Rank;

/// A stored rank row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RankRecord {
    user_id: i64,
    rank: Rank,
}

/// Repository for global rank rows. The persisted row is the source of
/// truth on restart; the in-process cache lives in `PrivilegeStore`.
pub struct RankRepo {
    collection: Collection<RankRecord>,
}

impl RankRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("ranks"),
        }
    }

    /// Look up the stored rank for a user.
    pub async fn find(&self, user_id: u64) -> Result<Option<Rank>> {
        let filter = doc! { "user_id": user_id as i64 };
        Ok(self.collection.find_one(filter).await?.map(|r| r.rank))
    }

    /// Set a user's rank, replacing any prior rank row.
    pub async fn upsert(&self, user_id: u64, rank: Rank) -> Result<()> {
        let filter = doc! { "user_id": user_id as i64 };
        let record = RankRecord {
            user_id: user_id as i64,
            rank,
        };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();
        self.collection
            .replace_one(filter, record)
            .with_options(options)
            .await?;
        Ok(())
    }

    /// Remove a user's rank row. Returns true if one existed.
    pub async fn remove(&self, user_id: u64) -> Result<bool> {
        let filter = doc! { "user_id": user_id as i64 };
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }

    /// All rank rows, for the /ranks listing.
    pub async fn all(&self) -> Result<Vec<(u64, Rank)>> {
        let mut cursor = self.collection.find(doc! {}).await?;
        let mut out = Vec::new();
        while let Some(record) = cursor.next().await {
            let record = record?;
            out.push((record.user_id as u64, record.rank));
        }
        Ok(out)
    }
}
