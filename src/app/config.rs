use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::exclude::ExcludeSet;
use crate::verdict::Risk;

/// Application configuration. Loaded from a TOML file when present; CLI
/// flags override file values. Invalid values are fatal at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Regex over session names; only matching sessions are scanned.
    #[serde(default)]
    pub filter: Option<String>,

    /// Sessions to exclude (fixed, glob, or /regex/ patterns).
    #[serde(default)]
    pub exclude_sessions: Vec<String>,

    /// Drop the pane paneguard itself runs in (default: true).
    #[serde(default = "default_true")]
    pub ignore_self: bool,

    /// Maximum concurrent pane evaluations.
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Extra logging.
    #[serde(default)]
    pub verbose: bool,

    /// Verdict cache TTL in seconds; zero disables the cache.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Interval between scans in continuous mode, milliseconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,

    /// Lines of scrollback captured per pane.
    #[serde(default = "default_capture_lines")]
    pub capture_lines: u32,

    /// Dispatch the recommended action for blocked panes automatically.
    #[serde(default)]
    pub auto_nudge: bool,

    /// Ceiling risk for auto-nudge.
    #[serde(default = "default_max_risk")]
    pub auto_nudge_max_risk: Risk,

    /// Event socket path override; defaults to the per-user runtime path.
    #[serde(default)]
    pub event_socket: Option<PathBuf>,

    /// Event store TTL in seconds.
    #[serde(default = "default_event_ttl")]
    pub event_ttl_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_parallel() -> usize {
    4
}
fn default_cache_ttl() -> u64 {
    30
}
fn default_refresh_interval() -> u64 {
    2000
}
fn default_capture_lines() -> u32 {
    100
}
fn default_max_risk() -> Risk {
    Risk::Low
}
fn default_event_ttl() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: None,
            exclude_sessions: Vec::new(),
            ignore_self: true,
            parallel: default_parallel(),
            verbose: false,
            cache_ttl_secs: default_cache_ttl(),
            refresh_interval_ms: default_refresh_interval(),
            capture_lines: default_capture_lines(),
            auto_nudge: false,
            auto_nudge_max_risk: default_max_risk(),
            event_socket: None,
            event_ttl_secs: default_event_ttl(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("paneguard").join("config.toml"))
    }

    /// Loads the default config file, falling back to defaults when absent.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("failed to load config {}: {}", path.display(), e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path().context("config directory not found")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create config directory {}", dir.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serialize config")?;
        std::fs::write(path, raw).with_context(|| format!("write config {}", path.display()))?;
        Ok(())
    }

    /// Startup validation; any failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        self.filter_regex()?;
        self.exclude_set()?;
        if self.parallel == 0 {
            anyhow::bail!("parallel must be at least 1");
        }
        if self.capture_lines == 0 {
            anyhow::bail!("capture_lines must be at least 1");
        }
        Ok(())
    }

    pub fn filter_regex(&self) -> Result<Option<Regex>> {
        match &self.filter {
            Some(raw) => {
                let re = Regex::new(raw)
                    .map_err(|e| anyhow::anyhow!("invalid session filter '{raw}': {e}"))?;
                Ok(Some(re))
            }
            None => Ok(None),
        }
    }

    pub fn exclude_set(&self) -> Result<ExcludeSet> {
        ExcludeSet::compile(&self.exclude_sessions)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn event_ttl(&self) -> Duration {
        Duration::from_secs(self.event_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn event_socket_path(&self) -> PathBuf {
        self.event_socket
            .clone()
            .unwrap_or_else(crate::events::default_socket_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parallel, 4);
        assert_eq!(config.cache_ttl_secs, 30);
        assert!(config.ignore_self);
        assert_eq!(config.auto_nudge_max_risk, Risk::Low);
    }

    #[test]
    fn test_invalid_filter_is_fatal() {
        let config = Config {
            filter: Some("[unclosed".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_exclude_is_fatal() {
        let config = Config {
            exclude_sessions: vec!["/[bad/".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_parallel_is_fatal() {
        let config = Config {
            parallel: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.filter = Some("^work".to_string());
        config.exclude_sessions = vec!["scratch".to_string(), "ci-*".to_string()];
        config.auto_nudge = true;
        config.auto_nudge_max_risk = Risk::Medium;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.filter.as_deref(), Some("^work"));
        assert_eq!(loaded.exclude_sessions.len(), 2);
        assert!(loaded.auto_nudge);
        assert_eq!(loaded.auto_nudge_max_risk, Risk::Medium);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let raw = "no_such_option = true\n";
        assert!(toml::from_str::<Config>(raw).is_err());
    }

    #[test]
    fn test_invalid_file_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "filter = \"[broken\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
