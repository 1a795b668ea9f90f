// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Auth Configuration Types
//
// Defines the configuration schema for a ledgerauth client, including:
// - Target ledger network and seed endpoints
// - Registered application contracts (name -> contract id)
// - Response polling policy

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Application name of the contract that holds auth documents.
pub const LOGIN_CONTRACT: &str = "loginContract";
/// Application name of the username directory contract.
pub const DPNS_CONTRACT: &str = "dpnsContract";

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Ledger network the client talks to
    #[serde(default)]
    pub network: Network,

    /// Registered applications, keyed by name
    #[serde(default = "default_apps")]
    pub apps: BTreeMap<String, AppContract>,

    /// Seed endpoints ("host:port")
    #[serde(default = "default_seeds")]
    pub seeds: Vec<String>,

    /// Response polling policy
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

impl std::str::FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "testnet" => Ok(Self::Testnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(ConfigError::Invalid(format!(
                "unknown network '{}', expected testnet or mainnet",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Testnet => write!(f, "testnet"),
            Self::Mainnet => write!(f, "mainnet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContract {
    /// Ledger contract id
    #[serde(rename = "contractId")]
    pub contract_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Give up on a response after this long (measured from the first query)
    #[serde(default = "default_poll_timeout")]
    pub response_polling_timeout_ms: u64,

    /// Sleep between queries
    #[serde(default = "default_poll_frequency")]
    pub response_polling_frequency_ms: u64,

    /// Sleep once before the first query
    #[serde(default = "default_poll_delay")]
    pub response_polling_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            response_polling_timeout_ms: default_poll_timeout(),
            response_polling_frequency_ms: default_poll_frequency(),
            response_polling_delay_ms: default_poll_delay(),
        }
    }
}

impl PollingConfig {
    pub fn policy(&self) -> PollingPolicy {
        PollingPolicy {
            timeout: Duration::from_millis(self.response_polling_timeout_ms),
            frequency: Duration::from_millis(self.response_polling_frequency_ms),
            initial_delay: Duration::from_millis(self.response_polling_delay_ms),
        }
    }
}

/// Runtime form of [`PollingConfig`] handed to the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    pub timeout: Duration,
    pub frequency: Duration,
    pub initial_delay: Duration,
}

impl PollingPolicy {
    pub fn new(timeout: Duration, frequency: Duration, initial_delay: Duration) -> Self {
        Self {
            timeout,
            frequency,
            initial_delay,
        }
    }
}

impl Default for PollingPolicy {
    fn default() -> Self {
        PollingConfig::default().policy()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Default value functions
fn default_poll_timeout() -> u64 {
    30_000
}

fn default_poll_frequency() -> u64 {
    5_000
}

fn default_poll_delay() -> u64 {
    3_000
}

fn default_apps() -> BTreeMap<String, AppContract> {
    BTreeMap::from([
        (
            LOGIN_CONTRACT.to_string(),
            AppContract {
                contract_id: "DBVuaTbU8PY9weNrg8RZPerNnv4oEdRWwSa4qXUG7ji4".to_string(),
            },
        ),
        (
            DPNS_CONTRACT.to_string(),
            AppContract {
                contract_id: "7PBvxeGpj7SsWfvDSa31uqEMt58LAiJww7zNcVRP1uEM".to_string(),
            },
        ),
    ])
}

fn default_seeds() -> Vec<String> {
    (1..=5)
        .map(|n| format!("seed-{}.evonet.networks.dash.org:3000", n))
        .collect()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            apps: default_apps(),
            seeds: default_seeds(),
            polling: PollingConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Discover configuration file using precedence order
    /// 1. LEDGERAUTH_CONFIG_PATH environment variable
    /// 2. ./ledgerauth.yaml (working directory)
    /// 3. ~/.ledgerauth/config.yaml (user home)
    /// 4. /etc/ledgerauth/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("LEDGERAUTH_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./ledgerauth.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".ledgerauth").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/ledgerauth/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default.
    ///
    /// An explicit `cli_path` must exist and parse.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LEDGERAUTH_NETWORK") {
            match val.parse::<Network>() {
                Ok(network) => {
                    tracing::info!("Environment override: LEDGERAUTH_NETWORK={}", network);
                    self.network = network;
                }
                Err(e) => tracing::warn!("Ignoring LEDGERAUTH_NETWORK: {}", e),
            }
        }

        let polling = [
            ("LEDGERAUTH_POLL_TIMEOUT_MS", &mut self.polling.response_polling_timeout_ms),
            ("LEDGERAUTH_POLL_FREQUENCY_MS", &mut self.polling.response_polling_frequency_ms),
            ("LEDGERAUTH_POLL_DELAY_MS", &mut self.polling.response_polling_delay_ms),
        ];
        for (var, field) in polling {
            let Ok(val) = std::env::var(var) else {
                continue;
            };
            match val.parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: {}={}", var, ms);
                    *field = ms;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for {}: '{}'. Expected milliseconds. Ignoring.",
                        var,
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let polling = &self.polling;
        if polling.response_polling_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "polling.response_polling_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if polling.response_polling_frequency_ms == 0 {
            return Err(ConfigError::Invalid(
                "polling.response_polling_frequency_ms must be greater than 0".to_string(),
            ));
        }
        if polling.response_polling_frequency_ms > polling.response_polling_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "polling frequency ({}ms) exceeds polling timeout ({}ms)",
                polling.response_polling_frequency_ms, polling.response_polling_timeout_ms
            )));
        }

        if !self.apps.contains_key(LOGIN_CONTRACT) {
            return Err(ConfigError::Invalid(format!("apps.{} is required", LOGIN_CONTRACT)));
        }
        for (name, app) in &self.apps {
            if app.contract_id.is_empty() {
                return Err(ConfigError::Invalid(format!("apps.{}.contractId cannot be empty", name)));
            }
        }

        Ok(())
    }

    /// Contract id of a registered application.
    pub fn contract_id(&self, app_name: &str) -> Option<&str> {
        self.apps.get(app_name).map(|app| app.contract_id.as_str())
    }

    /// Contract id that auth documents are written to.
    pub fn login_contract_id(&self) -> Result<&str, ConfigError> {
        self.contract_id(LOGIN_CONTRACT)
            .ok_or_else(|| ConfigError::Invalid(format!("apps.{} is required", LOGIN_CONTRACT)))
    }
}
