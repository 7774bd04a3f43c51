//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The provisioner API key is loaded from PROVISIONER_API_KEY or api_key_file,
//! never stored in the TOML directly.

use provisioner::ApiKey;
use randomness_pool::PoolSettings;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Env var that overrides `provisioner.api_key_file`.
const API_KEY_ENV: &str = "PROVISIONER_API_KEY";

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    pub provisioner: ProvisionerConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Pool sizing, cooldown and persistence
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_size: usize,
    /// Accounts to create at startup, clamped to `max_size`
    pub initial_size: usize,
    /// Cooldown applied when a return request does not name one
    pub cooldown_secs: u64,
    pub creation_delay_ms: u64,
    pub sweep_interval_secs: u64,
    /// Account file; the pool is in-memory when unset
    pub store_path: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 20,
            initial_size: 5,
            cooldown_secs: 300,
            creation_delay_ms: 500,
            sweep_interval_secs: 60,
            store_path: None,
        }
    }
}

impl PoolConfig {
    pub fn settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.max_size,
            creation_delay: Duration::from_millis(self.creation_delay_ms),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Provisioning backend, selected by `kind`
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvisionerConfig {
    /// Run a program that prints the new account id on stdout
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
    /// POST to a provisioning endpoint
    Http {
        url: String,
        queue: String,
        /// Path to a file containing the API key (alternative to PROVISIONER_API_KEY)
        #[serde(default)]
        api_key_file: Option<PathBuf>,
        #[serde(skip)]
        api_key: Option<ApiKey>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load configuration from a TOML file, validate it, then resolve secrets.
    ///
    /// API key resolution order:
    /// 1. PROVISIONER_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let ProvisionerConfig::Http {
            api_key,
            api_key_file,
            ..
        } = &mut config.provisioner
        {
            *api_key = resolve_api_key(api_key_file.as_deref())?;
        }

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.pool.max_size == 0 {
            return Err(ConfigError::Invalid(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.pool.cooldown_secs == 0 {
            return Err(ConfigError::Invalid(
                "cooldown_secs must be greater than 0".into(),
            ));
        }
        if self.pool.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if self.pool.initial_size > self.pool.max_size {
            warn!(
                initial_size = self.pool.initial_size,
                max_size = self.pool.max_size,
                "initial_size exceeds max_size, bootstrap will stop at max_size"
            );
        }

        match &self.provisioner {
            ProvisionerConfig::Command {
                program,
                timeout_secs,
                ..
            } => {
                if program.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "provisioner program must not be empty".into(),
                    ));
                }
                check_timeout(*timeout_secs)
            }
            ProvisionerConfig::Http {
                url, timeout_secs, ..
            } => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::Invalid(format!(
                        "provisioner url must start with http:// or https://, got: {url}"
                    )));
                }
                check_timeout(*timeout_secs)
            }
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("randomness-pool.toml")
    }
}

fn check_timeout(timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "provisioner timeout_secs must be greater than 0".into(),
        ));
    }
    Ok(())
}

/// Env var wins over the key file. A blank value from either source means no key.
fn resolve_api_key(key_file: Option<&Path>) -> Result<Option<ApiKey>, ConfigError> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        let key = key.trim();
        return Ok((!key.is_empty()).then(|| ApiKey::new(key)));
    }
    let Some(key_file) = key_file else {
        return Ok(None);
    };
    let key = std::fs::read_to_string(key_file).map_err(|e| {
        ConfigError::Invalid(format!(
            "failed to read api_key_file {}: {e}",
            key_file.display()
        ))
    })?;
    let key = key.trim();
    Ok((!key.is_empty()).then(|| ApiKey::new(key)))
}
