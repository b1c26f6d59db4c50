//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for one wallet engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a wallet engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Wallet identity: address, chain, enabled tokens.
    pub wallet: WalletConfig,

    /// Data providers raced for chain facts and broadcasts.
    pub providers: ProvidersConfig,

    /// Per-resource polling cadence.
    pub polling: PollingConfig,

    /// Spend path limits and fee schedule.
    pub spend: SpendConfig,

    /// Snapshot storage.
    pub persistence: PersistenceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Read-only status API.
    pub admin: AdminConfig,
}

/// Wallet identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Key under which the snapshot is persisted.
    pub id: String,

    /// Hex address of the wallet.
    pub address: String,

    /// Chain ID for EIP-155 replay protection.
    pub chain_id: u64,

    /// Currency code of the native asset.
    pub native_currency: String,

    /// Tokens enabled on the address, in priority order.
    pub tokens: Vec<TokenConfig>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            address: String::new(),
            chain_id: 1,
            native_currency: "ETH".to_string(),
            tokens: Vec::new(),
        }
    }
}

/// Token enabled on the wallet address.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    pub code: String,
    pub contract: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

/// Provider endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Explorer-style APIs (hex proxy results, paged history).
    pub explorers: Vec<EndpointConfig>,

    /// JSON-RPC gateways.
    pub rpc: Vec<EndpointConfig>,

    /// Analytics aggregator used as the secondary source.
    pub aggregator: Option<AggregatorConfig>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            explorers: Vec::new(),
            rpc: Vec::new(),
            aggregator: None,
            timeout_secs: 10,
        }
    }
}

/// A single provider endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Label for logs and metrics.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Polling cadence. Every resource key has its own interval.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Pause between scheduler passes in milliseconds.
    pub yield_ms: u64,

    pub height_interval_secs: u64,
    pub nonce_interval_secs: u64,
    pub balance_interval_secs: u64,
    pub history_interval_secs: u64,

    /// Blocks after which a locally submitted, still-unmined spend is rolled back.
    pub stale_pending_blocks: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            yield_ms: 500,
            height_interval_secs: 15,
            nonce_interval_secs: 20,
            balance_interval_secs: 20,
            history_interval_secs: 30,
            stale_pending_blocks: 1000,
        }
    }
}

/// Spend path settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpendConfig {
    /// Maximum gap between the next nonce and the confirmed nonce.
    pub max_pending_spends: u64,

    /// Base gas price in gwei before the multiplier.
    pub gas_price_gwei: u64,

    /// Gas price multiplier (1.0 = base, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Gas limit for token transfers.
    pub token_gas_limit: u64,
}

impl Default for SpendConfig {
    fn default() -> Self {
        Self {
            max_pending_spends: 5,
            gas_price_gwei: 20,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
            token_gas_limit: 65_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding `<wallet id>.json` snapshots.
    pub dir: String,

    /// How often a dirty snapshot is flushed, in seconds.
    pub flush_interval_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            dir: "./data".to_string(),
            flush_interval_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Status API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            [wallet]
            id = "main"
            address = "0x1111111111111111111111111111111111111111"

            [[wallet.tokens]]
            code = "USDC"
            contract = "0x3333333333333333333333333333333333333333"
            decimals = 6

            [[providers.rpc]]
            name = "local"
            url = "http://127.0.0.1:8545"

            [providers.aggregator]
            name = "agg"
            url = "https://agg.test/ethereum/"
            "#,
        )
        .unwrap();

        assert_eq!(config.wallet.id, "main");
        assert_eq!(config.wallet.native_currency, "ETH");
        assert_eq!(config.wallet.tokens[0].decimals, 6);
        assert_eq!(config.providers.rpc.len(), 1);
        assert!(config.providers.aggregator.is_some());
        assert_eq!(config.polling.height_interval_secs, 15);
        assert_eq!(config.spend.max_pending_spends, 5);
    }
}
