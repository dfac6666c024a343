mod config;
mod health;
mod heartbeat;
mod platform;
mod relay;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::platform::telegram::TelegramChannel;
use crate::relay::{RelayEngine, RelaySettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,anonbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Owner tag: {}", config.telegram.owner_tag);
    info!("  Reveal sender id: {}", config.relay.reveal_sender_id);
    info!("  Tracked replies limit: {}", config.relay.max_tracked_replies);
    info!("  Health port: {:?}", config.health.port);

    let bot = Bot::new(&config.telegram.bot_token);
    let channel = Arc::new(TelegramChannel::new(bot.clone()));
    let engine = Arc::new(RelayEngine::new(channel, RelaySettings::from_config(&config)));

    if let Some(port) = config.health.port {
        tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                error!("{:#}", e);
            }
        });
    }

    let _heartbeat = heartbeat::start(engine.clone(), &config.heartbeat.cron).await?;

    info!("Bot is starting...");
    platform::telegram::run(engine, bot).await?;

    Ok(())
}
