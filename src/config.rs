//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use action_flow::AutomationOptions;
use action_locator::ResolverConfig;
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use soulpilot_registry::SessionManagerConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: CdpConfig,
    pub sessions: SessionsConfig,
    pub resolver: ResolverConfig,
    pub actions: ActionsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub max_pages: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_pages: 8,
            acquire_timeout_ms: 30_000,
        }
    }
}

impl SessionsConfig {
    pub fn manager_config(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            max_pages: self.max_pages,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
        }
    }
}

/// Defaults for request options a request leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub default_timeout_ms: u64,
    pub retry_count: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        let options = AutomationOptions::default();
        Self {
            default_timeout_ms: options.timeout_ms,
            retry_count: options.retry_count,
            retry_backoff_ms: options.retry_backoff_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Apply `SOULPILOT_*` overrides. Unparsable numbers are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("SOULPILOT_HEADLESS") {
            self.browser.headless = !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        if let Some(value) = lookup("SOULPILOT_CHROME") {
            let value = value.trim();
            if !value.is_empty() {
                self.browser.executable = Some(PathBuf::from(value));
            }
        }
        if let Some(max_pages) = lookup("SOULPILOT_MAX_PAGES").and_then(|v| v.trim().parse().ok()) {
            self.sessions.max_pages = max_pages;
        }
        if let Some(timeout) =
            lookup("SOULPILOT_DEFAULT_TIMEOUT_MS").and_then(|v| v.trim().parse().ok())
        {
            self.actions.default_timeout_ms = timeout;
        }
        if let Some(level) = lookup("SOULPILOT_LOG_LEVEL") {
            let level = level.trim();
            if !level.is_empty() {
                self.logging.level = level.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "sessions:\n  max_pages: 2\nresolver:\n  ambiguous_floor: 40\n",
        )
        .unwrap();
        assert_eq!(config.sessions.max_pages, 2);
        assert_eq!(config.sessions.acquire_timeout_ms, 30_000);
        assert_eq!(config.resolver.ambiguous_floor, 40);
        assert_eq!(config.resolver.accept_threshold, 70);
        assert_eq!(config.actions.retry_count, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn env_overrides_win() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("SOULPILOT_HEADLESS", "off"),
            ("SOULPILOT_CHROME", "/opt/chrome"),
            ("SOULPILOT_MAX_PAGES", "3"),
            ("SOULPILOT_DEFAULT_TIMEOUT_MS", "5000"),
            ("SOULPILOT_LOG_LEVEL", "debug"),
        ]));
        assert!(!config.browser.headless);
        assert_eq!(config.browser.executable, Some(PathBuf::from("/opt/chrome")));
        assert_eq!(config.sessions.max_pages, 3);
        assert_eq!(config.actions.default_timeout_ms, 5_000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn bad_numbers_are_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("SOULPILOT_MAX_PAGES", "many")]));
        assert_eq!(config.sessions.max_pages, 8);
    }
}
