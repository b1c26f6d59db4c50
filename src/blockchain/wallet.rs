//! Signer collaborator.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized
//! - The synchronization core only ever sees `SignRequest` in and `SignedTransaction` out

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, TxKind};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::blockchain::transaction::{SignRequest, SignedTransaction};
use crate::blockchain::types::{SyncError, SyncResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "WALLET_SYNC_PRIVATE_KEY";

/// Turns a signing request into a raw transaction.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(&self, request: &SignRequest) -> SyncResult<SignedTransaction>;
}

/// In-process signer backed by a local private key.
#[derive(Debug, Clone)]
pub struct LocalSigner {
    signer: PrivateKeySigner,
}

impl LocalSigner {
    /// Create a signer from a hex-encoded private key string (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> SyncResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| SyncError::Signer(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), "Signer initialized");

        Ok(Self { signer })
    }

    /// Load the key from `WALLET_SYNC_PRIVATE_KEY`.
    pub fn from_env() -> SyncResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            SyncError::Signer(format!("Environment variable {} not set", PRIVATE_KEY_ENV_VAR))
        })?;

        Self::from_private_key(&private_key)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    async fn sign(&self, request: &SignRequest) -> SyncResult<SignedTransaction> {
        let nonce = u64::try_from(request.nonce)
            .map_err(|_| SyncError::Signer(format!("nonce {} out of range", request.nonce)))?;

        let mut tx = TxLegacy {
            chain_id: Some(request.chain_id),
            nonce,
            gas_price: request.gas_price,
            gas_limit: request.gas_limit,
            to: TxKind::Call(request.to),
            value: request.value,
            input: request.data.clone(),
        };

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| SyncError::Signer(format!("Signing failed: {}", e)))?;
        let signed = tx.into_signed(signature);
        let txid = format!("{:#x}", signed.hash());
        let envelope = TxEnvelope::Legacy(signed);

        Ok(SignedTransaction {
            signed_raw_tx: alloy::hex::encode_prefixed(envelope.encoded_2718()),
            txid,
        })
    }
}

/// Signer for watch-only deployments; refuses every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlySigner;

#[async_trait]
impl TransactionSigner for ReadOnlySigner {
    async fn sign(&self, _request: &SignRequest) -> SyncResult<SignedTransaction> {
        Err(SyncError::Signer("wallet is watch-only".to_string()))
    }
}
