use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collection::LoadOrdering;

pub const DEFAULT_BASE_URL: &str = "https://server.casanayo.com";

/// Environment variable that overrides `api.base_url`.
pub const BASE_URL_ENV: &str = "ESTATE_SYNC_BASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub sync: SyncConfig,
  /// Directory for daily-rolled log files (stderr only if not set)
  pub log_dir: Option<PathBuf>,
  /// File the configuration was read from (None when using defaults)
  #[serde(skip)]
  pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      timeout_secs: 30,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false, nothing is written to disk and every cold start fetches
  pub enabled: bool,
  pub ttl_hours: i64,
  /// SQLite file (defaults to the platform data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_hours: 24,
      path: None,
    }
  }
}

impl CacheConfig {
  /// Saturates instead of overflowing; `Config::load` rejects such values.
  pub fn ttl(&self) -> chrono::Duration {
    chrono::Duration::try_hours(self.ttl_hours).unwrap_or(chrono::Duration::MAX)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  pub load_ordering: LoadOrdering,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./estate-sync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/estate-sync/config.yaml
  ///
  /// Built-in defaults apply when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => {
        let mut config = Self::load_from_path(&p)?;
        config.source = Some(p);
        config
      }
      None => Self::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("estate-sync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("estate-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file parses as null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
      self.api.base_url = url;
    }
  }

  fn validate(&self) -> Result<()> {
    if self.cache.ttl_hours <= 0 {
      return Err(eyre!(
        "cache.ttl_hours must be positive, got {}",
        self.cache.ttl_hours
      ));
    }
    if chrono::Duration::try_hours(self.cache.ttl_hours).is_none() {
      return Err(eyre!(
        "cache.ttl_hours is out of range, got {}",
        self.cache.ttl_hours
      ));
    }
    if self.api.timeout_secs == 0 {
      return Err(eyre!("api.timeout_secs must be positive"));
    }
    Ok(())
  }
}
