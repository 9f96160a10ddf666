use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use prometheus::Registry;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level: tracing::Level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .context("Failed to install tracing subscriber")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("Failed to install tracing subscriber")?;
    }
    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    /// `None` when no file was found and defaults are in use.
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Report where the configuration came from. Call once logging is up.
    pub fn announce(&self) {
        match &self.path {
            Some(path) => info!(path = %path.display(), "Loaded configuration"),
            None => warn!("No configuration file found; using defaults"),
        }
    }
}

/// Priority: `--config` > ./config/config.yaml > <config_dir>/soulpilot/config.yaml.
/// Environment overrides are applied last. Logs nothing, so it can run
/// before the subscriber is installed.
pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config(),
    };

    let mut loaded = match path {
        Some(path) => {
            let contents = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = parse_config(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            LoadedConfig {
                config,
                path: Some(path),
            }
        }
        None => LoadedConfig {
            config: Config::default(),
            path: None,
        },
    };

    loaded.config.apply_env_overrides(|key| env::var(key).ok());
    Ok(loaded)
}

pub fn parse_config(contents: &str) -> Result<Config> {
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(contents).context("Invalid configuration YAML")
}

fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("config/config.yaml");
    if local.exists() {
        return Some(local);
    }
    let mut user = dirs::config_dir()?;
    user.push("soulpilot");
    user.push("config.yaml");
    user.exists().then_some(user)
}

/// Registry holding the resolver and session metrics.
pub fn init_metrics() -> Registry {
    let registry = Registry::new();
    action_locator::metrics::register_metrics(&registry);
    soulpilot_registry::metrics::register_metrics(&registry);
    registry
}
