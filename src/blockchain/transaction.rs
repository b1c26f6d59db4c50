//! Spend intents, signing requests and fee estimation.
//!
//! # Responsibilities
//! - Describe what the caller wants to send (`SpendIntent`)
//! - Describe what the signer must sign (`SignRequest`)
//! - Estimate gas limit and gas price from the configured fee schedule
//! - Encode ERC-20 transfer calldata for token spends

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::blockchain::types::{SyncError, SyncResult};
use crate::config::SpendConfig;

pub mod erc20 {
    alloy::sol! {
        /// ERC-20 balance query.
        function balanceOf(address owner) external view returns (uint256);

        /// ERC-20 transfer.
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Caller request for an outgoing spend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendIntent {
    /// Currency code: the native asset or an enabled token.
    pub currency: String,
    /// Recipient address (hex string, validated on submission).
    pub to: String,
    /// Amount in base units, decimal string.
    pub amount: String,
}

/// Everything the signer collaborator needs; it never sees anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub nonce: U256,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

/// Signer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// `0x`-prefixed raw transaction ready for broadcast.
    pub signed_raw_tx: String,
    /// `0x`-prefixed lowercase transaction hash.
    pub txid: String,
}

/// Fee estimate for one spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub gas_limit: u64,
    pub gas_price: u128,
}

impl FeeQuote {
    /// Upper bound on the native-asset cost of the spend.
    pub fn max_fee(&self) -> U256 {
        U256::from(self.gas_limit) * U256::from(self.gas_price)
    }
}

/// Known fee schedule handed to the estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeSchedule {
    pub base_gas_price_wei: u128,
    pub gas_price_multiplier: f64,
    pub max_gas_price_gwei: u64,
    pub token_gas_limit: u64,
}

impl From<&SpendConfig> for FeeSchedule {
    fn from(config: &SpendConfig) -> Self {
        Self {
            base_gas_price_wei: u128::from(config.gas_price_gwei) * 1_000_000_000,
            gas_price_multiplier: config.gas_price_multiplier,
            max_gas_price_gwei: config.max_gas_price_gwei,
            token_gas_limit: config.token_gas_limit,
        }
    }
}

/// Fee-estimation collaborator.
pub trait FeeEstimator: Send + Sync {
    fn estimate(&self, intent: &SpendIntent, is_token: bool, data: &Bytes, schedule: &FeeSchedule) -> SyncResult<FeeQuote>;
}

/// Static estimator driven entirely by the fee schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredFeeEstimator;

impl FeeEstimator for ConfiguredFeeEstimator {
    fn estimate(&self, _intent: &SpendIntent, is_token: bool, data: &Bytes, schedule: &FeeSchedule) -> SyncResult<FeeQuote> {
        // Base gas + data cost (16 gas per byte, simplified)
        let gas_limit = if is_token {
            schedule.token_gas_limit
        } else {
            21_000u64 + data.len() as u64 * 16
        };

        let adjusted = (schedule.base_gas_price_wei as f64 * schedule.gas_price_multiplier) as u128;
        let adjusted_gwei = adjusted / 1_000_000_000;
        if adjusted_gwei > u128::from(schedule.max_gas_price_gwei) {
            return Err(SyncError::GasPriceTooHigh {
                current_gwei: u64::try_from(adjusted_gwei).unwrap_or(u64::MAX),
                max_gwei: schedule.max_gas_price_gwei,
            });
        }

        Ok(FeeQuote {
            gas_limit,
            gas_price: adjusted,
        })
    }
}

/// Calldata for an ERC-20 `transfer(to, amount)`.
pub fn token_transfer_data(to: Address, amount: U256) -> Bytes {
    Bytes::from(erc20::transferCall { to, amount }.abi_encode())
}
