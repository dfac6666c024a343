use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Telegram user id of the owner; 0 means not configured.
    #[serde(default)]
    pub owner_id: u64,
    /// How senders see the owner named in the greeting (e.g. "@someone").
    #[serde(default = "default_owner_tag")]
    pub owner_tag: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// Show the sender's numeric id to the owner in forwarded captions.
    #[serde(default)]
    pub reveal_sender_id: bool,
    /// How many forwarded copies stay answerable; 0 keeps all of them.
    #[serde(default = "default_max_tracked_replies")]
    pub max_tracked_replies: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    #[serde(default = "default_broadcast_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HealthConfig {
    /// Port for the liveness endpoint. No endpoint when unset.
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_cron")]
    pub cron: String,
}

fn default_owner_tag() -> String {
    "the owner".to_string()
}

fn default_max_tracked_replies() -> usize {
    50_000
}

fn default_broadcast_concurrency() -> usize {
    16
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_heartbeat_cron() -> String {
    "0 0 * * * *".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            owner_id: 0,
            owner_tag: default_owner_tag(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reveal_sender_id: false,
            max_tracked_replies: default_max_tracked_replies(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            concurrency: default_broadcast_concurrency(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            cron: default_heartbeat_cron(),
        }
    }
}

impl Config {
    /// Load from a TOML file, then apply environment overrides.
    ///
    /// The file is optional: a hosted deployment can supply everything
    /// through `BOT_TOKEN`, `OWNER_ID`, `OWNER_TAG` and `PORT`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            )
        } else {
            None
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from optional TOML text plus an environment lookup.
    pub fn from_sources(toml_text: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config: Config = match toml_text {
            Some(text) => toml::from_str(text).context("Failed to parse config file")?,
            None => Config::default(),
        };

        if let Some(token) = env("BOT_TOKEN") {
            config.telegram.bot_token = token;
        }
        if let Some(owner) = env("OWNER_ID") {
            config.telegram.owner_id = owner
                .trim()
                .parse()
                .with_context(|| format!("OWNER_ID is not a valid user id: {:?}", owner))?;
        }
        if let Some(tag) = env("OWNER_TAG") {
            config.telegram.owner_tag = tag;
        }
        if let Some(port) = env("PORT") {
            config.health.port = Some(
                port.trim()
                    .parse()
                    .with_context(|| format!("PORT is not a valid port: {:?}", port))?,
            );
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            bail!("Missing bot token: set [telegram] bot_token or BOT_TOKEN");
        }
        if self.telegram.owner_id == 0 {
            bail!("Missing owner id: set [telegram] owner_id or OWNER_ID");
        }
        Ok(())
    }
}
