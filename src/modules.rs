//! Typed capability registry.
//!
//! Features expose optional hooks as explicit trait objects registered at
//! startup, instead of reflection over module attributes: a feature that
//! stores per-chat rows registers a [`Migratable`] so the group->supergroup
//! migration event can relabel them, and may register a [`StatsReporter`]
//! for the dev /stats listing.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{error, info};

use crate::database::{GreetRepo, GuardRepo, PolicyRepo};

/// A feature whose per-chat rows must follow a chat-id migration.
pub trait Migratable: Send + Sync {
    fn migrate<'a>(&'a self, old_chat_id: i64, new_chat_id: i64)
        -> BoxFuture<'a, anyhow::Result<()>>;
}

/// A feature contributing a line to the dev /stats listing.
pub trait StatsReporter: Send + Sync {
    fn stats(&self) -> BoxFuture<'_, anyhow::Result<String>>;
}

/// Hooks one feature registers; absent capabilities stay `None`.
pub struct ModuleHooks {
    pub name: &'static str,
    pub migrate: Option<Arc<dyn Migratable>>,
    pub stats: Option<Arc<dyn StatsReporter>>,
}

/// All registered hooks, fixed at startup.
pub struct ModuleRegistry {
    hooks: Vec<ModuleHooks>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register(&mut self, hooks: ModuleHooks) {
        self.hooks.push(hooks);
    }

    /// Fan a chat-id migration out to every migratable feature.
    ///
    /// A failing feature is logged and skipped; one broken collection must
    /// not keep the rest from relabeling.
    pub async fn migrate_chat(&self, old_chat_id: i64, new_chat_id: i64) {
        info!("Migrating chat {} -> {}", old_chat_id, new_chat_id);
        for hooks in &self.hooks {
            if let Some(migratable) = &hooks.migrate {
                if let Err(e) = migratable.migrate(old_chat_id, new_chat_id).await {
                    error!("Migration failed in module '{}': {}", hooks.name, e);
                }
            }
        }
    }

    /// Collect stats lines from every reporting feature.
    pub async fn stats(&self) -> String {
        let mut lines = Vec::new();
        for hooks in &self.hooks {
            if let Some(reporter) = &hooks.stats {
                match reporter.stats().await {
                    Ok(line) => lines.push(line),
                    Err(e) => error!("Stats failed in module '{}': {}", hooks.name, e),
                }
            }
        }
        lines.join("\n")
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Migratable for GuardRepo {
    fn migrate<'a>(
        &'a self,
        old_chat_id: i64,
        new_chat_id: i64,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(self.migrate_chat(old_chat_id, new_chat_id))
    }
}

impl Migratable for GreetRepo {
    fn migrate<'a>(
        &'a self,
        old_chat_id: i64,
        new_chat_id: i64,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(self.migrate_chat(old_chat_id, new_chat_id))
    }
}

impl Migratable for PolicyRepo {
    fn migrate<'a>(
        &'a self,
        old_chat_id: i64,
        new_chat_id: i64,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(self.migrate_chat(old_chat_id, new_chat_id))
    }
}

impl StatsReporter for GuardRepo {
    fn stats(&self) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async move {
            let count = self.count_flood_enabled().await?;
            Ok(format!("• {} chats enforcing flood control.", count))
        })
    }
}

impl StatsReporter for GreetRepo {
    fn stats(&self) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async move {
            let count = self.count_pending().await?;
            Ok(format!("• {} verifications in flight.", count))
        })
    }
}

impl StatsReporter for PolicyRepo {
    fn stats(&self) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async move {
            let count = self.count_disabling_chats().await?;
            Ok(format!("• {} chats with disabled commands.", count))
        })
    }
}
