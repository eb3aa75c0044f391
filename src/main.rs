//! Vigil - a Telegram group-protection bot.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB models and repositories
//! - `cache` - Moka-backed typed caches
//! - `permissions` - Global ranks + cached chat-admin checks
//! - `middleware` - Command registry, dispatch pipeline, rate limiter
//! - `events` - Flood detector, join gate, verification, blue-text cleaner
//! - `plugins` - Command handlers
//! - `scheduler` - Cancellable one-shot timers
//! - `bot` - Dispatcher wiring and polling/webhook runtime

mod bot;
mod cache;
mod config;
mod database;
mod events;
mod middleware;
mod modules;
mod permissions;
mod plugins;
mod report;
mod scheduler;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bot::dispatcher::AppState;
use cache::CacheRegistry;
use config::Config;
use database::Database;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment.
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vigil=info,teloxide=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Vigil...");

    let config = Config::from_env();
    info!("Configuration loaded, mode: {:?}", config.bot_mode);

    info!("Connecting to MongoDB...");
    let db = Arc::new(Database::connect(&config.mongodb_uri, &config.mongodb_database).await?);

    let cache = Arc::new(CacheRegistry::new());

    // Throttle keeps us inside Telegram's API limits (30 msg/s globally,
    // 20 msg/min per group).
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());

    let state = AppState::new(
        bot.clone(),
        db,
        cache,
        &config,
        me.user.id,
        bot_username,
    );

    // A restart must not strand muted joiners: re-arm their deadlines.
    events::verify::resume_pending(&bot, &state).await?;

    let dispatcher = bot::build_dispatcher(bot.clone(), state);

    bot::run(&config, dispatcher, bot).await;

    Ok(())
}
