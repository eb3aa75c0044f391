//! Bot runtime - polling and webhook runners.

use teloxide::prelude::*;
use tracing::info;

use super::dispatcher::ThrottledBot;
use super::webhook;
use crate::config::{BotMode, Config};

/// Run the bot with the configured mode.
///
/// SIGTERM is mapped to the same graceful-shutdown path as Ctrl+C, so a
/// supervisor stop and a terminal interrupt behave identically.
pub async fn run(
    config: &Config,
    mut dispatcher: Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey>,
    bot: ThrottledBot,
) {
    #[cfg(unix)]
    {
        let token = dispatcher.shutdown_token();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("SIGTERM received, shutting down...");
                    if let Ok(shutdown) = token.shutdown() {
                        shutdown.await;
                    }
                }
                Err(e) => tracing::warn!("Could not install SIGTERM handler: {}", e),
            }
        });
    }

    match config.bot_mode {
        BotMode::Polling => {
            info!("Starting bot in polling mode...");
            dispatcher.dispatch().await;
        }
        BotMode::Webhook => {
            info!("Starting bot in webhook mode...");
            webhook::start_webhook(config, dispatcher, bot).await;
        }
    }
}
