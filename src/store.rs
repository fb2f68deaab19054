use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error};

use crate::rule::Rule;

/// Read-side bridge to the persisted rule file.
///
/// The store only ever reads whole-rule snapshots; writes come from an
/// external writer (the `set` command) that rewrites the file atomically.
/// Transient read failures fall back to the last known-good rule so the
/// enforcement loop is never disrupted by a missing or malformed file.
pub struct RuleStore {
    path: PathBuf,
    last_good: Mutex<Option<Rule>>,
}

impl RuleStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_good: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current rule snapshot.
    ///
    /// Never fails: unreadable or malformed content yields the last
    /// known-good rule, or the sentinel if nothing was ever read.
    pub fn load(&self) -> Rule {
        match self.try_load() {
            Ok(rule) => {
                *self.last_good.lock().unwrap() = Some(rule);
                rule
            }
            Err(e) => {
                debug!("Falling back to last known-good rule: {:#}", e);
                self.last_good.lock().unwrap().unwrap_or_default()
            }
        }
    }

    fn try_load(&self) -> Result<Rule> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read rule file: {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse rule file: {}", self.path.display()))
    }

    /// Materialize a sentinel rule file if none exists.
    ///
    /// Idempotent; never overwrites an existing file, even a malformed one
    /// (the external writer owns repairs).
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        debug!("Creating default rule file: {}", self.path.display());
        self.save(&Rule::sentinel())
    }

    /// Atomically rewrite the whole rule file.
    ///
    /// This is the external-writer path used by the CLI; the daemon itself
    /// only reads.
    pub fn save(&self, rule: &Rule) -> Result<()> {
        let content = serde_json::to_string_pretty(rule).context("Failed to serialize rule")?;

        atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write rule file: {}", self.path.display()))
    }
}

/// Background task that keeps the rule file materialized.
///
/// Re-checks on the polling cadence so a deleted file reappears as the
/// sentinel within one interval.
pub async fn run_materializer(store: Arc<RuleStore>, interval: Duration) {
    loop {
        if let Err(e) = store.ensure_exists() {
            error!("Failed to materialize rule file: {:#}", e);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Atomically write content to a file.
///
/// Writes to a temporary file in the same directory, syncs to disk, then
/// renames over the target path so readers never observe a partial record.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temporary file: {}", temp_path.display()))?;

        file.write_all(content)
            .context("Failed to write to temporary file")?;

        file.sync_all().context("Failed to sync file to disk")?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Get the platform-specific default rule file path
pub fn default_rule_path() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        // Prefer the system location, fall back to the user location
        let system_path = PathBuf::from("/etc/netcurfew/rule.json");
        if system_path.parent().map(|p| p.exists()).unwrap_or(false) {
            return Ok(system_path);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "netcurfew") {
            let mut path = dirs.config_dir().to_path_buf();
            path.push("rule.json");
            return Ok(path);
        }

        anyhow::bail!("Could not determine rule file location");
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from(
            "/Library/Application Support/netcurfew/rule.json",
        ))
    }

    #[cfg(target_os = "windows")]
    {
        let mut path = PathBuf::from(
            std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("netcurfew");
        path.push("rule.json");
        Ok(path)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap()
    }

    fn temp_store() -> (tempfile::TempDir, RuleStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RuleStore::new(dir.path().join("rule.json"));
        (dir, store)
    }

    #[test]
    fn load_missing_file_yields_sentinel() {
        let (_dir, store) = temp_store();
        assert_eq!(store.load(), Rule::sentinel());
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = temp_store();
        let rule = Rule::new(t("22:00:00"), t("06:00:00"));
        store.save(&rule).unwrap();
        assert_eq!(store.load(), rule);
    }

    #[test]
    fn malformed_file_falls_back_to_last_known_good() {
        let (_dir, store) = temp_store();
        let rule = Rule::new(t("09:00:00"), t("17:00:00"));
        store.save(&rule).unwrap();
        assert_eq!(store.load(), rule);

        std::fs::write(store.path(), "not json").unwrap();
        assert_eq!(store.load(), rule);
    }

    #[test]
    fn deleted_file_falls_back_to_last_known_good() {
        let (_dir, store) = temp_store();
        let rule = Rule::new(t("20:00:00"), t("21:00:00"));
        store.save(&rule).unwrap();
        assert_eq!(store.load(), rule);

        std::fs::remove_file(store.path()).unwrap();
        assert_eq!(store.load(), rule);
    }

    #[test]
    fn ensure_exists_creates_sentinel_file() {
        let (_dir, store) = temp_store();
        store.ensure_exists().unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load(), Rule::sentinel());
    }

    #[test]
    fn ensure_exists_does_not_overwrite() {
        let (_dir, store) = temp_store();
        let rule = Rule::new(t("22:00:00"), t("06:00:00"));
        store.save(&rule).unwrap();

        store.ensure_exists().unwrap();
        store.ensure_exists().unwrap();
        assert_eq!(store.load(), rule);
    }

    #[test]
    fn ensure_exists_leaves_malformed_file_alone() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path(), "garbage").unwrap();

        store.ensure_exists().unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "garbage");
    }

    #[test]
    fn atomic_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("rule.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rule.json");
        atomic_write(&path, b"{}").unwrap();
        assert!(!path.with_extension("tmp").exists());
    }
}
