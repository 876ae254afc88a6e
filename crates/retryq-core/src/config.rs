use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Backoff between drain passes (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/retryq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryqConfig {
    /// Failed attempts after which a queued request is dropped.
    pub max_request_retries: u32,
    /// Distinct queued requests attempted at once while draining.
    pub drain_concurrency: usize,
    /// Base URL requests are sent to; the command name is appended as a path segment.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Seconds a drain's claim on a request keeps other drains away from it.
    /// Must outlast one request; a claim left by a crashed process expires after this.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
    /// Optional backoff; if missing, built-in defaults are used.
    #[serde(default)]
    pub backoff: Option<BackoffConfig>,
}

fn default_claim_lease_secs() -> u64 {
    300
}

impl Default for RetryqConfig {
    fn default() -> Self {
        Self {
            max_request_retries: 10,
            drain_concurrency: 1,
            endpoint: None,
            request_timeout_secs: 30,
            connect_timeout_secs: 15,
            claim_lease_secs: default_claim_lease_secs(),
            backoff: None,
        }
    }
}

impl RetryqConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_request_retries == 0 {
            anyhow::bail!("max_request_retries must be at least 1");
        }
        if self.drain_concurrency == 0 {
            anyhow::bail!("drain_concurrency must be at least 1");
        }
        if self.claim_lease_secs <= self.request_timeout_secs {
            anyhow::bail!("claim_lease_secs must be longer than request_timeout_secs");
        }
        if let Some(b) = &self.backoff {
            if !(b.base_delay_secs.is_finite() && b.base_delay_secs >= 0.0) {
                anyhow::bail!("backoff.base_delay_secs must be a non-negative number");
            }
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("retryq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RetryqConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<RetryqConfig> {
    if !path.exists() {
        let default_cfg = RetryqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: RetryqConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
