use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    /// Enforcement tick interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub tick_interval_ms: u64,

    /// Rule watcher poll interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub watch_interval_ms: u64,

    /// Interface names that are never managed (loopback is always skipped)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Override for the rule file location
    #[serde(default)]
    pub rule_path: Option<PathBuf>,
}

fn default_interval_ms() -> u64 {
    200
}

fn default_exclude() -> Vec<String> {
    vec!["lo".to_string()]
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_interval_ms(),
            watch_interval_ms: default_interval_ms(),
            exclude: default_exclude(),
            rule_path: None,
        }
    }
}

impl DaemonConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

/// Get the platform-specific config file path
pub fn get_config_path() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/etc/netcurfew/config.yaml"))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from(
            "/Library/Application Support/netcurfew/config.yaml",
        ))
    }

    #[cfg(target_os = "windows")]
    {
        let mut path = PathBuf::from(
            std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("netcurfew");
        path.push("config.yaml");
        Ok(path)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

/// Load configuration from YAML file
pub fn load_config(path: &Path) -> Result<DaemonConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: DaemonConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load configuration, falling back to defaults when no file exists
pub fn load_or_default(path: &Path) -> Result<DaemonConfig> {
    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(DaemonConfig::default());
    }

    load_config(path)
}

/// Save configuration to YAML file
pub fn save_config(path: &Path, config: &DaemonConfig) -> Result<()> {
    validate_config(config)?;

    let content = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    crate::store::atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Validate configuration
pub fn validate_config(config: &DaemonConfig) -> Result<()> {
    if config.tick_interval_ms == 0 {
        anyhow::bail!("tick_interval_ms must be greater than zero");
    }

    if config.watch_interval_ms == 0 {
        anyhow::bail!("watch_interval_ms must be greater than zero");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_cadence() {
        let config = DaemonConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
        assert_eq!(config.watch_interval(), Duration::from_millis(200));
        assert_eq!(config.exclude, vec!["lo".to_string()]);
        assert!(config.rule_path.is_none());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: DaemonConfig = serde_yaml::from_str("tick_interval_ms: 500\n").unwrap();
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.watch_interval_ms, 200);
        assert_eq!(config.exclude, vec!["lo".to_string()]);
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = DaemonConfig::default();
        config.exclude.push("docker0".to_string());
        config.rule_path = Some(dir.path().join("rule.json"));

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.exclude, config.exclude);
        assert_eq!(loaded.rule_path, config.rule_path);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = DaemonConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());

        let config = DaemonConfig {
            watch_interval_ms: 0,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn load_or_default_handles_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join("missing.yaml")).unwrap();
        assert_eq!(config.tick_interval_ms, 200);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "tick_interval_ms: [not a number]").unwrap();
        assert!(load_config(&path).is_err());
    }
}
