//! Per-resource fetchers.
//!
//! # Data Flow
//! ```text
//! PollScheduler (one resource key due)
//!     → block_height.rs | nonce.rs | balance.rs | history.rs
//!     → providers::racer over explorer / rpc / aggregator candidates
//!     → Fact (canonical, provider shape erased)
//!     → StateReconciler::process_update
//! ```
//!
//! # Design Decisions
//! - Fetchers never touch state; they return one `Fact` or an error
//! - No retries here: a failed race waits for the resource's next poll interval
//! - The fact's source label is diagnostic only

pub mod balance;
pub mod block_height;
pub mod history;
pub mod nonce;

use alloy::primitives::{Address, U256};
use std::collections::BTreeMap;

use crate::blockchain::types::{SyncError, SyncResult, TokenInfo};
use crate::providers::ProviderSet;
use crate::state::snapshot::TransactionRecord;

pub use balance::fetch_balance;
pub use block_height::fetch_block_height;
pub use history::fetch_history;
pub use nonce::fetch_nonce;

/// The result of one successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    /// Provider that won the race.
    pub source: String,
    pub kind: FactKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FactKind {
    BlockHeight(u64),
    Nonce(U256),
    /// Currency code → decimal string.
    Balances(BTreeMap<String, String>),
    TransactionBatch {
        currency: String,
        records: Vec<TransactionRecord>,
    },
}

impl Fact {
    pub fn new(source: impl Into<String>, kind: FactKind) -> Self {
        Self {
            source: source.into(),
            kind,
        }
    }
}

/// Which asset a currency code refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    Native,
    Token(Address),
}

impl Asset {
    pub fn contract(self) -> Option<Address> {
        match self {
            Asset::Native => None,
            Asset::Token(contract) => Some(contract),
        }
    }
}

/// Everything a fetcher needs: who we are, what we hold, whom we ask.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub address: Address,
    pub native_currency: String,
    pub tokens: Vec<TokenInfo>,
    pub providers: ProviderSet,
}

impl FetchContext {
    pub fn new(address: Address, native_currency: impl Into<String>, tokens: Vec<TokenInfo>, providers: ProviderSet) -> Self {
        let context = Self {
            address,
            native_currency: native_currency.into(),
            tokens,
            providers,
        };
        for (i, token) in context.tokens.iter().enumerate() {
            if let Some(owner) = context.tokens[..i].iter().find(|t| t.contract == token.contract) {
                tracing::warn!(
                    currency = %token.code,
                    contract = %token.contract,
                    owner = %owner.code,
                    "Token shares a contract with an earlier token; rows and fan-in balances for it go to the earlier one"
                );
            }
        }
        context
    }

    /// Every tracked currency code, native first.
    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.native_currency.as_str()).chain(self.tokens.iter().map(|t| t.code.as_str()))
    }

    pub fn asset(&self, code: &str) -> SyncResult<Asset> {
        if code == self.native_currency {
            return Ok(Asset::Native);
        }
        self.tokens
            .iter()
            .find(|t| t.code == code)
            .map(|t| Asset::Token(t.contract))
            .ok_or_else(|| SyncError::InvalidContract(format!("currency '{code}' is not enabled")))
    }

    /// Currency code for a contract; the first configured token wins on a shared contract.
    pub fn code_for(&self, contract: Option<Address>) -> Option<&str> {
        match contract {
            None => Some(self.native_currency.as_str()),
            Some(contract) => self
                .tokens
                .iter()
                .find(|t| t.contract == contract)
                .map(|t| t.code.as_str()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::providers::mock::MockTransport;

    #[test]
    fn test_asset_lookup() {
        let ctx = context(MockTransport::new());
        assert_eq!(ctx.asset("ETH").unwrap(), Asset::Native);
        assert_eq!(ctx.asset("USDC").unwrap(), Asset::Token(USDC.parse().unwrap()));
        assert!(matches!(ctx.asset("DAI"), Err(SyncError::InvalidContract(_))));
        assert_eq!(ctx.currencies().collect::<Vec<_>>(), ["ETH", "USDC"]);
    }

    #[test]
    fn test_shared_contract_first_token_wins() {
        let mut ctx = context(MockTransport::new());
        ctx.tokens.push(TokenInfo {
            code: "USDC.e".to_string(),
            contract: USDC.parse().unwrap(),
            decimals: 6,
        });
        let ctx = FetchContext::new(ctx.address, "ETH", ctx.tokens, ctx.providers);
        assert_eq!(ctx.code_for(Some(USDC.parse().unwrap())), Some("USDC"));
        assert_eq!(ctx.code_for(None), Some("ETH"));
        assert_eq!(ctx.code_for(Some(OTHER.parse().unwrap())), None);
    }
}
