//! Configuration module.
//!
//! Loads configuration from environment variables.

use std::env;

/// Bot running mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotMode {
    Polling,
    Webhook,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Bot username (without @) for command mention matching and deep links.
    /// Optional - will be fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Bot owner user ID. The owner outranks every stored rank and receives
    /// unexpected-error reports. Immutable at runtime.
    pub owner_id: u64,

    /// Allow `!` as a second command prefix in addition to `/`.
    pub allow_excl: bool,

    /// Default permission-denial policy for chats that have not chosen one:
    /// true = silently drop (delete bare command messages), false = terse reply.
    pub quiet_deny: bool,

    /// Send a generic "I hit an error" notice to the chat on unexpected
    /// errors. Production default is off (owner still gets the report).
    pub debug: bool,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if required environment variables are not set.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let bot_mode = env::var("BOT_MODE")
            .unwrap_or_else(|_| "polling".to_string())
            .to_lowercase();

        let bot_mode = match bot_mode.as_str() {
            "webhook" => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = env::var("WEBHOOK_URL").ok();

        // Validate webhook URL is set if mode is webhook
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            panic!("WEBHOOK_URL must be set when BOT_MODE is webhook");
        }

        let webhook_port = env::var("WEBHOOK_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8443);

        let webhook_secret = env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());

        // Parse bot username (strip @ if present)
        let bot_username = env::var("BOT_USERNAME")
            .ok()
            .map(|s| s.trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty());

        let owner_id = env::var("OWNER_ID")
            .expect("OWNER_ID must be set")
            .trim()
            .parse()
            .expect("OWNER_ID must be a numeric user id");

        Self {
            bot_token: env::var("BOT_TOKEN").expect("BOT_TOKEN must be set"),
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret,
            bot_username,
            owner_id,
            allow_excl: env_flag("ALLOW_EXCL", false),
            quiet_deny: env_flag("QUIET_DENY", false),
            debug: env_flag("DEBUG", false),
            mongodb_uri: env::var("MONGODB_URI").expect("MONGODB_URI must be set"),
            mongodb_database: env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| "vigil".to_string()),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
