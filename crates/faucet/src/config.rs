//! Faucet configuration

use crate::error::{FaucetError, FaucetResult};
use sepolia_common::units::parse_ether;
use sepolia_common::utils::config::load_config;
use sepolia_common::utils::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

const INFURA_SEPOLIA_URL: &str = "https://sepolia.infura.io/v3";

/// Faucet service configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Server address
    pub server_addr: String,

    /// Explicit RPC endpoint; takes precedence over the Infura key
    pub rpc_url: Option<String>,

    /// Infura project key used to build the Sepolia endpoint
    pub infura_api_key: Option<String>,

    /// Faucet account private key (hex)
    pub private_key: String,

    /// Amount sent per grant, in ether
    pub drip_amount: String,

    /// Cooldown between grants to the same client, in hours
    pub request_limit_hours: f64,

    /// Gas limit for transfers
    pub gas_limit: u64,

    /// Network name shown in wallet info
    pub network_name: String,

    /// Enable CORS
    pub cors_enabled: bool,

    pub logging: LoggingConfig,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:3000".to_string(),
            rpc_url: None,
            infura_api_key: None,
            private_key: String::new(),
            drip_amount: "0.01".to_string(),
            request_limit_hours: 24.0,
            gas_limit: 21_000,
            network_name: "Sepolia".to_string(),
            cors_enabled: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl fmt::Debug for FaucetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaucetConfig")
            .field("server_addr", &self.server_addr)
            .field("rpc_url", &self.rpc_url.as_ref().map(|_| "<set>"))
            .field("infura_api_key", &self.infura_api_key.as_ref().map(|_| "<redacted>"))
            .field("private_key", &"<redacted>")
            .field("drip_amount", &self.drip_amount)
            .field("request_limit_hours", &self.request_limit_hours)
            .field("gas_limit", &self.gas_limit)
            .field("network_name", &self.network_name)
            .field("cors_enabled", &self.cors_enabled)
            .field("logging", &self.logging)
            .finish()
    }
}

impl FaucetConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Defaults, then the optional config file, then environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => load_config::<Self, _>(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) {
        if let Ok(hours) = std::env::var("REQUEST_LIMIT_HOURS") {
            self.request_limit_hours = hours.trim().parse().unwrap_or(self.request_limit_hours);
        }

        if let Ok(amount) = std::env::var("DRIP_AMOUNT") {
            self.drip_amount = amount;
        }

        if let Ok(key) = std::env::var("INFURA_API_KEY") {
            self.infura_api_key = Some(key);
        }

        if let Ok(key) = std::env::var("FAUCET_PRIVATE_KEY") {
            self.private_key = key;
        }

        if let Ok(rpc_url) = std::env::var("FAUCET_RPC_URL") {
            self.rpc_url = Some(rpc_url);
        }

        if let Ok(addr) = std::env::var("FAUCET_SERVER_ADDR") {
            self.server_addr = addr;
        }

        if let Ok(network) = std::env::var("FAUCET_NETWORK") {
            self.network_name = network;
        }

        if let Ok(level) = std::env::var("FAUCET_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("FAUCET_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Cooldown window between grants
    pub fn cooldown(&self) -> FaucetResult<Duration> {
        Duration::try_from_secs_f64(self.request_limit_hours * 3600.0).map_err(|_| {
            FaucetError::Config(format!(
                "request_limit_hours must be a non-negative number, got {}",
                self.request_limit_hours
            ))
        })
    }

    /// JSON-RPC endpoint of the ledger
    pub fn rpc_endpoint(&self) -> FaucetResult<String> {
        match (&self.rpc_url, &self.infura_api_key) {
            (Some(url), _) if !url.is_empty() => Ok(url.clone()),
            (_, Some(key)) if !key.is_empty() => Ok(format!("{}/{}", INFURA_SEPOLIA_URL, key)),
            _ => Err(FaucetError::Config(
                "no RPC endpoint: set FAUCET_RPC_URL or INFURA_API_KEY".to_string(),
            )),
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> FaucetResult<()> {
        self.cooldown()?;
        self.rpc_endpoint()?;

        let wei = parse_ether(&self.drip_amount)?;
        if wei == 0 {
            return Err(FaucetError::Config("drip_amount must be greater than zero".to_string()));
        }

        if self.private_key.is_empty() {
            return Err(FaucetError::Config("FAUCET_PRIVATE_KEY is not set".to_string()));
        }
        crate::ledger::signing_key_from_hex(&self.private_key)?;

        if self.gas_limit == 0 {
            return Err(FaucetError::Config("gas_limit must be greater than zero".to_string()));
        }

        Ok(())
    }
}
