//! Global ranks and the privilege store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::database::{Database, RankRepo};

/// A global (cross-chat) privilege tier. A user holds at most one.
///
/// `Whitelist` and `Pro` sit on the same privilege tier; they are kept as
/// separate ranks because they are granted and listed separately.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Developer,
    Sudo,
    Support,
    Whitelist,
    Pro,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::Sudo => "sudo",
            Self::Support => "support",
            Self::Whitelist => "whitelist",
            Self::Pro => "pro",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank lookups with the persisted row as source of truth and an in-process
/// read-through cache, invalidated on every mutation.
#[derive(Clone)]
pub struct PrivilegeStore {
    repo: Arc<RankRepo>,
    cache: TypedCache<u64, Option<Rank>>,
}

impl PrivilegeStore {
    pub fn new(db: &Database, cache: &CacheRegistry) -> Self {
        let rank_cache = cache.get_or_create(
            "ranks",
            CacheConfig::with_capacity(10_000).ttl(Duration::from_secs(600)),
        );

        Self {
            repo: Arc::new(RankRepo::new(db)),
            cache: rank_cache,
        }
    }

    /// The user's global rank, if any. Negative results are cached too.
    pub async fn rank_of(&self, user_id: u64) -> Result<Option<Rank>> {
        if let Some(rank) = self.cache.get(&user_id) {
            return Ok(rank);
        }

        let rank = self.repo.find(user_id).await?;
        self.cache.insert(user_id, rank);
        Ok(rank)
    }

    /// Set or clear a user's rank. Setting a rank replaces any prior one.
    pub async fn set_rank(&self, user_id: u64, rank: Option<Rank>) -> Result<()> {
        match rank {
            Some(rank) => self.repo.upsert(user_id, rank).await?,
            None => {
                self.repo.remove(user_id).await?;
            }
        }
        self.cache.invalidate(&user_id);
        debug!("Rank of user {} set to {:?}", user_id, rank);
        Ok(())
    }

    /// All rank rows, for the /ranks listing.
    pub async fn all(&self) -> Result<Vec<(u64, Rank)>> {
        self.repo.all().await
    }
}
