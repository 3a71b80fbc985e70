use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive failed attempts after which a task is marked failed.
    pub max_retries: u32,
    /// Base delay in seconds; the n-th retry waits `base * n`.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2.0,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/upq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpqConfig {
    /// Base URL of the chunk-session endpoints (`{server_url}/start`, `/append`, ...).
    pub server_url: String,
    /// Bytes per chunk.
    pub chunk_size: u64,
    /// Number of tasks that may upload at once.
    pub max_active_uploads: usize,
    /// Minimum interval between progress-only view refreshes.
    pub render_interval_ms: u64,
    pub connect_timeout_secs: u64,
    /// Hard timeout for one request (one chunk round trip).
    pub request_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for UpqConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000/upload/upload_chunk".to_string(),
            chunk_size: 1024 * 1024,
            max_active_uploads: 1,
            render_interval_ms: 250,
            connect_timeout_secs: 15,
            request_timeout_secs: 120,
            retry: None,
        }
    }
}

impl UpqConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().policy()
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("upq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<UpqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = UpqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: UpqConfig = toml::from_str(&data)?;
    if cfg.chunk_size == 0 {
        anyhow::bail!("chunk_size must be greater than zero ({})", path.display());
    }
    Ok(cfg)
}
