//! Chain-specific types and error definitions.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// A token enabled on the wallet address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Currency code (e.g. "USDC").
    pub code: String,
    /// Contract address on chain.
    pub contract: Address,
    /// Display decimals, carried for callers; balances stay in base units.
    pub decimals: u8,
}

/// Errors produced by the synchronization core.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// A provider answered, but the payload failed the structural check.
    #[error("Malformed response from {provider}: {detail}")]
    ProviderMalformedResponse { provider: String, detail: String },

    /// Transport or HTTP-level failure.
    #[error("Provider {provider} unavailable: {detail}")]
    ProviderUnavailable { provider: String, detail: String },

    /// The provider understood the request and refused it (e.g. "nonce too low").
    #[error("{message}")]
    ProviderRejected { provider: String, message: String },

    /// Every candidate in a race failed.
    #[error("All {} providers failed", .0.len())]
    AllProvidersFailed(Vec<SyncError>),

    /// Too many unconfirmed outgoing spends.
    #[error("Too many pending spends: {pending} unconfirmed (limit {limit})")]
    ExcessivePendingSpends { pending: U256, limit: u64 },

    #[error("Insufficient {currency} funds: need {required}, have {available}")]
    InsufficientFunds {
        currency: String,
        required: U256,
        available: U256,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Currency is not the native asset nor an enabled token, or its contract is unusable.
    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Request to a provider exceeded its deadline.
    #[error("Provider {provider} timed out after {secs} seconds")]
    Timeout { provider: String, secs: u64 },
}

impl SyncError {
    pub fn malformed(provider: &str, detail: impl Into<String>) -> Self {
        Self::ProviderMalformedResponse {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }

    pub fn unavailable(provider: &str, detail: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }

    pub fn rejected(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderRejected {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Errors collected by an exhausted race, empty for any other kind.
    pub fn underlying(&self) -> &[SyncError] {
        match self {
            Self::AllProvidersFailed(errors) => errors,
            _ => &[],
        }
    }
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Parse a `0x`-prefixed hex quantity into a U256.
pub fn parse_hex_quantity(provider: &str, raw: &str) -> SyncResult<U256> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| SyncError::malformed(provider, format!("'{raw}' is not a hex quantity")))?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| SyncError::malformed(provider, format!("'{raw}': {e}")))
}

/// Parse an unsigned decimal string into a U256.
pub fn parse_decimal(provider: &str, raw: &str) -> SyncResult<U256> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SyncError::malformed(
            provider,
            format!("'{raw}' is not an unsigned decimal"),
        ));
    }
    U256::from_str_radix(raw, 10).map_err(|e| SyncError::malformed(provider, format!("'{raw}': {e}")))
}

/// Parse a block height, rejecting anything that doesn't fit an unsigned 64-bit value.
pub fn height_from_quantity(provider: &str, value: U256) -> SyncResult<u64> {
    u64::try_from(value).map_err(|_| SyncError::malformed(provider, format!("height {value} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_quantity() {
        assert_eq!(parse_hex_quantity("p", "0x64").unwrap(), U256::from(100));
        assert_eq!(parse_hex_quantity("p", "0X0").unwrap(), U256::ZERO);
        assert!(parse_hex_quantity("p", "100").is_err());
        assert!(parse_hex_quantity("p", "0xzz").is_err());
        assert!(parse_hex_quantity("p", "-0x1").is_err());
    }

    #[test]
    fn test_decimal() {
        assert_eq!(parse_decimal("p", "0100").unwrap(), U256::from(100));
        assert!(parse_decimal("p", "").is_err());
        assert!(parse_decimal("p", "-5").is_err());
        assert!(parse_decimal("p", "1.5").is_err());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::AllProvidersFailed(vec![
            SyncError::unavailable("a", "503"),
            SyncError::malformed("b", "bad"),
        ]);
        assert_eq!(err.to_string(), "All 2 providers failed");
        assert_eq!(err.underlying().len(), 2);

        let err = SyncError::rejected("rpc", "nonce too low");
        assert_eq!(err.to_string(), "nonce too low");

        let err = SyncError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500,
        };
        assert!(err.to_string().contains("600"));
    }
}
