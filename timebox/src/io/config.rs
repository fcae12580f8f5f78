//! Process-level configuration, stored as TOML (`timebox.toml`).

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::strategy::Strategy;

/// Environment variable that overrides the configured strategy.
pub const STRATEGY_ENV: &str = "TIMEBOX_STRATEGY";

/// Timebox configuration (TOML).
///
/// Missing fields take their defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeboxConfig {
    /// Bounded executor used for every test in this process.
    pub strategy: Strategy,

    /// Timeout applied when a caller does not give one explicitly.
    pub default_timeout_ms: u64,

    /// How long the interrupting strategy waits for an interrupted thread
    /// before detaching it.
    pub interrupt_grace_ms: u64,

    /// Upper bound on worker threads for the racing strategy.
    pub pool_max_workers: usize,

    /// Truncate captured stdout/stderr of process tests beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for TimeboxConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            default_timeout_ms: 30_000,
            interrupt_grace_ms: 100,
            pool_max_workers: 64,
            output_limit_bytes: 100_000,
        }
    }
}

impl TimeboxConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            return Err(anyhow!("default_timeout_ms must be > 0"));
        }
        if i64::try_from(self.default_timeout_ms).is_err() {
            return Err(anyhow!("default_timeout_ms is too large"));
        }
        if self.pool_max_workers == 0 {
            return Err(anyhow!("pool_max_workers must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TimeboxConfig::default()`.
pub fn load_config(path: &Path) -> Result<TimeboxConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing; using defaults");
        let cfg = TimeboxConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TimeboxConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Apply `TIMEBOX_STRATEGY` on top of `cfg`.
pub fn apply_env_overrides(mut cfg: TimeboxConfig) -> Result<TimeboxConfig> {
    if let Ok(raw) = env::var(STRATEGY_ENV) {
        cfg.strategy = raw
            .parse::<Strategy>()
            .with_context(|| format!("parse {STRATEGY_ENV}"))?;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TimeboxConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TimeboxConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("timebox.toml");
        let cfg = TimeboxConfig {
            strategy: Strategy::Interrupting,
            interrupt_grace_ms: 250,
            ..TimeboxConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("timebox.toml");
        fs::write(&path, "strategy = \"interrupting\"\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.strategy, Strategy::Interrupting);
        assert_eq!(cfg.default_timeout_ms, 30_000);
    }

    #[test]
    fn rejects_zero_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("timebox.toml");
        fs::write(&path, "default_timeout_ms = 0\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("default_timeout_ms must be > 0"));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("timebox.toml");
        fs::write(&path, "strategy = \"preemptive\"\n").expect("write");

        assert!(load_config(&path).is_err());
    }
}
