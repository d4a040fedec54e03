use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries per segment after the first attempt.
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/dumpconv/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Number of parallel byte-range segments per download.
    pub segment_count: usize,
    /// Rows per flushed batch during extraction.
    pub batch_size: usize,
    /// Connect timeout per request, in seconds.
    pub connect_timeout_secs: u64,
    /// A transfer slower than this many bytes/s for `low_speed_time_secs` is
    /// treated as timed out and retried.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
    /// Sliding window for progress rate reporting, in seconds.
    pub progress_window_secs: u64,
    /// Base directory for downloads (default: current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            segment_count: 8,
            batch_size: 10_000,
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            progress_window_secs: 5,
            download_dir: None,
            retry: None,
        }
    }
}

impl DumpConfig {
    /// Retry settings, falling back to defaults when the section is absent.
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dumpconv")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DumpConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DumpConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<DumpConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: DumpConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
