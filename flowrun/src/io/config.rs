//! Monitor configuration stored in `flowrun.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::classifier::ReduceOptions;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "flowrun.toml";

/// Monitor configuration (TOML).
///
/// Missing fields default to values matching the runner service's current
/// message format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub reducer: ReducerConfig,
    pub server: ServerConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReducerConfig {
    /// Placeholder responses that carry no outcome (e.g. `Processing...`).
    pub placeholders: Vec<String>,
    /// Payload fields searched, in order, for lifecycle text.
    pub text_fields: Vec<String>,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        let options = ReduceOptions::default();
        Self {
            placeholders: options.placeholders,
            text_fields: options.text_fields,
        }
    }
}

impl ReducerConfig {
    pub fn options(&self) -> ReduceOptions {
        ReduceOptions {
            placeholders: self.placeholders.clone(),
            text_fields: self.text_fields.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Buffered change events per SSE subscriber before it lags.
    pub broadcast_capacity: usize,
    /// SSE keep-alive ping interval.
    pub keep_alive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3002,
            broadcast_capacity: 256,
            keep_alive_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory for ledger captures (`<dir>/<run_id>.jsonl`).
    pub dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".flowrun").join("captures"),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reducer.placeholders.iter().all(|p| p.trim().is_empty()) {
            return Err(anyhow!("reducer.placeholders must contain a non-empty entry"));
        }
        if self.reducer.text_fields.is_empty()
            || self.reducer.text_fields.iter().any(|f| f.trim().is_empty())
        {
            return Err(anyhow!("reducer.text_fields must be non-empty field names"));
        }
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be > 0"));
        }
        if self.server.broadcast_capacity == 0 {
            return Err(anyhow!("server.broadcast_capacity must be > 0"));
        }
        if self.server.keep_alive_secs == 0 {
            return Err(anyhow!("server.keep_alive_secs must be > 0"));
        }
        if self.capture.dir.as_os_str().is_empty() {
            return Err(anyhow!("capture.dir must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `MonitorConfig::default()`.
pub fn load_config(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        let cfg = MonitorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MonitorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &MonitorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
