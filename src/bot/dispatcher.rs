//! Dispatcher setup and shared application state.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::UserId;

use crate::cache::CacheRegistry;
use crate::config::Config;
use crate::database::{Database, GreetRepo, GuardRepo, PolicyRepo};
use crate::events::{self, FloodTracker};
use crate::middleware::registry::CommandRegistry;
use crate::middleware::{AnonProofs, MemoryCounterStore, RateLimiter};
use crate::modules::{ModuleHooks, ModuleRegistry};
use crate::permissions::{AdminChecker, Gate, PrivilegeStore};
use crate::plugins;
use crate::report::Reporter;
use crate::scheduler::Timers;

/// Bot type with the Throttle adaptor for automatic API rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Flood + raid settings and approvals.
    pub guard: Arc<GuardRepo>,

    /// Greetings, verification state, human checks.
    pub greet: Arc<GreetRepo>,

    /// Disabled commands, denial policy, blue-text, log channels.
    pub policy: Arc<PolicyRepo>,

    /// The permission gate (global ranks + chat admins).
    pub gate: Gate,

    /// Per-user command budget, checked before anything else.
    pub rate_limiter: RateLimiter,

    /// Command registrations, immutable after startup.
    pub commands: Arc<CommandRegistry>,

    /// Named one-shot timers (raid auto-disable, verification deadlines).
    pub timers: Timers,

    /// In-memory consecutive-message counters.
    pub flood: FloodTracker,

    /// Parked anonymous-admin intents.
    pub anon: AnonProofs,

    /// Deduplicating unexpected-error reporter.
    pub reporter: Arc<Reporter>,

    /// Typed capability hooks (migration, stats).
    pub hooks: Arc<ModuleRegistry>,

    /// Bot owner user ID.
    pub owner_id: u64,

    /// The bot's own user ID.
    pub bot_id: UserId,

    /// Bot username (without @) for command mention matching.
    pub bot_username: String,

    /// Default permission-denial policy for chats without an override.
    pub quiet_deny_default: bool,
}

impl AppState {
    /// Create the application state and register all capability hooks.
    pub fn new(
        bot: ThrottledBot,
        db: Arc<Database>,
        cache: Arc<CacheRegistry>,
        config: &Config,
        bot_id: UserId,
        bot_username: String,
    ) -> Self {
        let guard = Arc::new(GuardRepo::new(&db, &cache));
        let greet = Arc::new(GreetRepo::new(&db, &cache));
        let policy = Arc::new(PolicyRepo::new(&db, &cache));

        let ranks = PrivilegeStore::new(&db, &cache);
        // Permission checks need the inner Bot for API calls.
        let admins = AdminChecker::new(bot.inner().clone(), bot_id, &cache);
        let gate = Gate::new(ranks, admins, config.owner_id);

        let rate_limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()));
        let commands = Arc::new(plugins::build_registry(config.allow_excl));

        let mut hooks = ModuleRegistry::new();
        hooks.register(ModuleHooks {
            name: "guard",
            migrate: Some(guard.clone() as _),
            stats: Some(guard.clone() as _),
        });
        hooks.register(ModuleHooks {
            name: "greet",
            migrate: Some(greet.clone() as _),
            stats: Some(greet.clone() as _),
        });
        hooks.register(ModuleHooks {
            name: "policy",
            migrate: Some(policy.clone() as _),
            stats: Some(policy.clone() as _),
        });

        Self {
            guard,
            greet,
            policy,
            gate,
            rate_limiter,
            commands,
            timers: Timers::new(),
            flood: FloodTracker::new(),
            anon: AnonProofs::new(&cache),
            reporter: Arc::new(Reporter::new(config.owner_id, config.debug)),
            hooks: Arc::new(hooks),
            owner_id: config.owner_id,
            bot_id,
            bot_username,
            quiet_deny_default: config.quiet_deny,
        }
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    let message_handler = Update::filter_message().endpoint(events::on_message);
    let member_handler = Update::filter_chat_member().endpoint(events::join::on_chat_member);
    let callback_handler = plugins::callback_handler();

    dptree::entry()
        .branch(message_handler)
        .branch(member_handler)
        .branch(callback_handler)
}
