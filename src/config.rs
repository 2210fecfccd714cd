//! Runtime configuration
//!
//! Environment-driven with sane Polygon defaults; a TOML file can be
//! loaded/saved for repeatable setups.

use alloy_primitives::Address;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// ============================================
// EXECUTION MODE
// ============================================

/// Whether winning routes may actually be broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Fetch and compare quotes only - never touches funds
    QuoteOnly,

    /// Sign and broadcast the winning route
    /// CAUTION: this uses real funds!
    Live,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::QuoteOnly
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::QuoteOnly => write!(f, "QUOTE_ONLY"),
            ExecutionMode::Live => write!(f, "LIVE"),
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// Polygon RPC URL
    pub rpc_url: String,

    /// Chain ID (137 = Polygon mainnet)
    pub chain_id: u64,

    // ========== Wallet Settings ==========
    /// Taker address quotes are built for (also the balance owner)
    pub wallet_address: Option<String>,

    /// Private key for live execution (KEEP SECRET!)
    pub signer_key: Option<String>,

    // ========== Quote Settings ==========
    /// Slippage tolerance as percent * 100 (50 = 0.5%)
    pub slippage_bps: u16,

    /// Seconds between automatic re-quotes while idle
    pub refresh_interval_secs: u64,

    /// Debounce for source-amount edits (SELL direction)
    pub sell_debounce_ms: u64,

    /// Debounce for destination-amount edits (BUY direction).
    /// Shorter: the receive field changes more while typing
    pub buy_debounce_ms: u64,

    /// Fallback gas price (wei) when the winning route carries none
    pub fallback_gas_price: u128,

    // ========== Provider Endpoints ==========
    /// Velora (ParaSwap) API base URL
    pub velora_base_url: String,

    /// KyberSwap aggregator API base URL (chain-scoped)
    pub kyber_base_url: String,

    // ========== Execution Settings ==========
    /// Current execution mode
    pub execution_mode: ExecutionMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://polygon-rpc.com".to_string(),
            chain_id: 137,
            wallet_address: None,
            signer_key: None,
            slippage_bps: 50,
            refresh_interval_secs: 5,
            sell_debounce_ms: 1000,
            buy_debounce_ms: 250,
            fallback_gas_price: 50_000_000_000,
            velora_base_url: crate::providers::VeloraClient::DEFAULT_BASE_URL.to_string(),
            kyber_base_url: crate::providers::KyberClient::DEFAULT_BASE_URL.to_string(),
            execution_mode: ExecutionMode::QuoteOnly,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: env::var("CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.chain_id),

            wallet_address: env::var("WALLET_ADDRESS").ok(),
            signer_key: env::var("SIGNER_KEY").ok(),

            slippage_bps: env::var("SLIPPAGE_BPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.slippage_bps),
            refresh_interval_secs: env::var("REFRESH_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.refresh_interval_secs),
            sell_debounce_ms: env::var("SELL_DEBOUNCE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sell_debounce_ms),
            buy_debounce_ms: env::var("BUY_DEBOUNCE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.buy_debounce_ms),
            fallback_gas_price: env::var("FALLBACK_GAS_PRICE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fallback_gas_price),

            velora_base_url: env::var("VELORA_BASE_URL").unwrap_or(defaults.velora_base_url),
            kyber_base_url: env::var("KYBER_BASE_URL").unwrap_or(defaults.kyber_base_url),

            execution_mode: match env::var("EXECUTION_MODE")
                .unwrap_or_else(|_| "quote_only".to_string())
                .to_lowercase()
                .as_str()
            {
                "live" => ExecutionMode::Live,
                _ => ExecutionMode::QuoteOnly,
            },
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Taker address as the Address type
    pub fn taker_address(&self) -> Option<Address> {
        self.wallet_address
            .as_deref()
            .and_then(|s| Address::from_str(s).ok())
    }

    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre::eyre!("Invalid RPC_URL - please set a valid Polygon RPC endpoint"));
        }

        if let Some(addr) = &self.wallet_address {
            if Address::from_str(addr).is_err() {
                return Err(eyre::eyre!("WALLET_ADDRESS is not a valid address: {}", addr));
            }
        }

        // 5000 bps = 50% - anything beyond is a typo, not a tolerance
        if self.slippage_bps > 5000 {
            return Err(eyre::eyre!(
                "SLIPPAGE_BPS too high ({} = {:.2}%)",
                self.slippage_bps,
                self.slippage_bps as f64 / 100.0
            ));
        }

        if self.refresh_interval_secs == 0 {
            return Err(eyre::eyre!("REFRESH_INTERVAL_SECS must be at least 1"));
        }

        if self.execution_mode == ExecutionMode::Live {
            if self.signer_key.is_none() {
                return Err(eyre::eyre!("Live mode requires SIGNER_KEY"));
            }
            if self.wallet_address.is_none() {
                return Err(eyre::eyre!("Live mode requires WALLET_ADDRESS"));
            }
        }

        Ok(())
    }

    /// Print a configuration summary
    pub fn print_summary(&self) {
        println!("Configuration:");
        println!("  Chain: {} ({})", self.chain_id, self.rpc_url);
        println!(
            "  Wallet: {}",
            self.wallet_address.as_deref().unwrap_or("(not set)")
        );
        println!(
            "  Slippage: {:.2}%  |  Refresh: {}s  |  Debounce: {}ms sell / {}ms buy",
            self.slippage_bps as f64 / 100.0,
            self.refresh_interval_secs,
            self.sell_debounce_ms,
            self.buy_debounce_ms
        );
        println!("  Execution mode: {}", self.execution_mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_id, 137);
        assert_eq!(config.execution_mode, ExecutionMode::QuoteOnly);
    }

    #[test]
    fn test_live_mode_requires_key_and_wallet() {
        let config = Config {
            execution_mode: ExecutionMode::Live,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            execution_mode: ExecutionMode::Live,
            signer_key: Some("0xabc".to_string()),
            wallet_address: Some("0x388C818CA8B9251b393131C08a736A67ccB19297".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_absurd_slippage() {
        let config = Config {
            slippage_bps: 9000,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join("arbiter-config-round-trip.toml");
        let config = Config {
            slippage_bps: 75,
            ..Config::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.chain_id, config.chain_id);
        assert_eq!(loaded.slippage_bps, 75);
        assert_eq!(loaded.execution_mode, ExecutionMode::QuoteOnly);
    }

    #[test]
    fn test_taker_address_parsing() {
        let config = Config {
            wallet_address: Some("0x388C818CA8B9251b393131C08a736A67ccB19297".to_string()),
            ..Config::default()
        };
        assert!(config.taker_address().is_some());
    }
}
