use std::fs;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use launchpad_types::{DEFAULT_MINT_DEADLINE_SECS, DEFAULT_POSITION_MANAGER, DEFAULT_SQRT_PRICE_X96};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::state::LaunchSettings;

/// Orchestrator configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// JSON-RPC endpoint of the node
    pub rpc_url: String,

    /// Node-managed account used to send transactions; the node's first
    /// account is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,

    /// NonfungiblePositionManager address
    pub position_manager: Address,

    /// Starting price of new pools as Q64.96 square root
    pub initial_sqrt_price_x96: U256,

    /// Seconds added to the current time for the mint deadline
    pub mint_deadline_secs: u64,

    /// Check token balances before the first transaction
    pub check_balances: bool,

    /// How long to wait for a receipt before giving up
    pub confirmation_timeout_secs: u64,

    /// Receipt polling configuration
    pub retry: RetryConfig,
}

/// Retry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum number of retries for failed RPC requests
    pub max_retries: u32,

    /// Base delay between polls in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between polls in milliseconds
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
}

impl OrchestratorConfig {
    /// Load configuration from TOML file
    pub fn load(path: &str) -> OrchestratorResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            OrchestratorError::InvalidConfig(format!("Failed to read config file {}: {}", path, e))
        })?;

        let config: OrchestratorConfig = toml::from_str(&content).map_err(|e| {
            OrchestratorError::InvalidConfig(format!("Failed to parse config file {}: {}", path, e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &str) -> OrchestratorResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            OrchestratorError::InvalidConfig(format!("Failed to write config file {}: {}", path, e))
        })?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> OrchestratorResult<()> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(invalid("rpc_url", &self.rpc_url, "an http(s) URL"));
        }

        if self.position_manager == Address::ZERO {
            return Err(invalid("position_manager", "0x0", "a non-zero address"));
        }

        if self.initial_sqrt_price_x96.is_zero() || self.initial_sqrt_price_x96.bit_len() > 160 {
            return Err(invalid(
                "initial_sqrt_price_x96",
                &self.initial_sqrt_price_x96.to_string(),
                "a non-zero uint160",
            ));
        }

        if self.mint_deadline_secs == 0 {
            return Err(invalid("mint_deadline_secs", "0", "greater than 0"));
        }

        if self.confirmation_timeout_secs == 0 {
            return Err(invalid("confirmation_timeout_secs", "0", "greater than 0"));
        }

        self.retry.validate()?;

        Ok(())
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            position_manager: self.position_manager,
            initial_sqrt_price_x96: self.initial_sqrt_price_x96,
            mint_deadline_secs: self.mint_deadline_secs,
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl RetryConfig {
    /// Validate retry configuration
    fn validate(&self) -> OrchestratorResult<()> {
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "0", "greater than 0"));
        }

        if self.base_delay_ms == 0 {
            return Err(invalid("base_delay_ms", "0", "greater than 0"));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid(
                "max_delay_ms",
                &self.max_delay_ms.to_string(),
                &format!("greater than or equal to base_delay_ms ({})", self.base_delay_ms),
            ));
        }

        if self.backoff_multiplier <= 1.0 {
            return Err(invalid("backoff_multiplier", &self.backoff_multiplier.to_string(), "greater than 1.0"));
        }

        Ok(())
    }

    /// Calculate delay for retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return self.base_delay_ms;
        }

        let exponential_delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (exponential_delay as u64).min(self.max_delay_ms)
    }
}

fn invalid(field: &str, value: &str, expected: &str) -> OrchestratorError {
    OrchestratorError::InvalidConfig(format!("{} is {}, expected {}", field, value, expected))
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            from: None,
            position_manager: DEFAULT_POSITION_MANAGER,
            initial_sqrt_price_x96: DEFAULT_SQRT_PRICE_X96,
            mint_deadline_secs: DEFAULT_MINT_DEADLINE_SECS,
            check_balances: true,
            confirmation_timeout_secs: 300,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: &str) -> OrchestratorResult<()> {
    let example_config = OrchestratorConfig {
        rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
        confirmation_timeout_secs: 600,
        retry: RetryConfig {
            max_retries: 5,
            base_delay_ms: 2000,
            max_delay_ms: 15_000,
            backoff_multiplier: 1.5,
        },
        ..OrchestratorConfig::default()
    };

    example_config.save(path)?;
    Ok(())
}
