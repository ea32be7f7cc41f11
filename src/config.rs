use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_CACHE_TTL_SECS, DEFAULT_DATA_ROOT, DEFAULT_PORT,
};
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    /// Remote download area; sub-source file names are appended to it.
    pub base_url: String,
    /// Root directory of the fallback snapshots.
    pub data_root: PathBuf,
    /// Skip remote fetches and read the snapshots directly.
    pub use_local_data: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            use_local_data: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Config {
    /// Load the file at `path` (defaults when absent), then apply environment
    /// overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply `VITIBRASIL_*` overrides; `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("VITIBRASIL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("VITIBRASIL_PORT") {
            self.server.port = parse_env("VITIBRASIL_PORT", &port)?;
        }
        if let Some(url) = lookup("VITIBRASIL_BASE_URL") {
            self.sources.base_url = url;
        }
        if let Some(root) = lookup("VITIBRASIL_DATA_ROOT") {
            self.sources.data_root = PathBuf::from(root);
        }
        if let Some(flag) = lookup("VITIBRASIL_USE_LOCAL_DATA") {
            self.sources.use_local_data = parse_flag("VITIBRASIL_USE_LOCAL_DATA", &flag)?;
        }
        if let Some(ttl) = lookup("VITIBRASIL_CACHE_TTL_SECS") {
            self.cache.ttl_seconds = parse_env("VITIBRASIL_CACHE_TTL_SECS", &ttl)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        PipelineError::Configuration(format!("Invalid value '{}' for {}", value, key))
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(PipelineError::Configuration(format!(
            "Invalid value '{}' for {}",
            value, key
        ))),
    }
}
