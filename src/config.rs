use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;

use crate::{autoplay::AutoplaySettings, game::PlayerId, gateway::StartOptions};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root of the authority service.
    pub server_url: String,
    /// Upper bound for a single call, so a stalled request cannot hold the
    /// busy token forever.
    pub request_timeout_ms: u64,
    /// Human player when the server does not flag one with `is_human`.
    pub human_player_id: PlayerId,
    /// Default filter when `RUST_LOG` is not set.
    pub log_level: String,
    pub start: StartOptions,
    pub autoplay: AutoplaySettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000/api".to_string(),
            request_timeout_ms: 10_000,
            human_player_id: 0,
            log_level: "info".to_string(),
            start: StartOptions::default(),
            autoplay: AutoplaySettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: ClientConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Play WAR against the bots from the terminal.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// TOML file with client settings
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// API root of the game server, e.g. http://localhost:5000/api
    #[arg(long, env = "WAR_SERVER_URL")]
    pub server: Option<String>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
    /// Start bots-only games to watch instead of playing
    #[arg(long)]
    pub spectate: bool,
    /// Start autoplay as soon as a game begins
    #[arg(long)]
    pub autoplay: bool,
}

impl Cli {
    /// Settings from the config file (if any) with flags applied on top.
    pub fn resolve(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                ClientConfig::from_toml_str(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => ClientConfig::default(),
        };
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.spectate {
            config.start.include_human = None;
        }
        if self.autoplay {
            config.start.auto_play = true;
        }
        Ok(config)
    }
}
