//! Wallet engine: the inbound surface of the synchronization core.
//!
//! # Responsibilities
//! - Wire configuration, providers, state and collaborators for one wallet
//! - `start()` / `stop()` the poll scheduler and the snapshot flusher
//! - `submit_spend()`: validate, estimate, check funds, allocate nonce, sign, broadcast
//! - `current_snapshot()`: lock-free read of the published state
//!
//! # Design Decisions
//! - Everything is per instance; two engines in one process share nothing
//! - Collaborators are injected through [`EngineDeps`]

use alloy::primitives::{Address, Bytes, U256};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::blockchain::client::{HttpTransport, JsonTransport};
use crate::blockchain::transaction::{
    token_transfer_data, ConfiguredFeeEstimator, FeeEstimator, FeeSchedule, SignRequest, SpendIntent,
};
use crate::blockchain::types::{parse_decimal, SyncError, SyncResult, TokenInfo};
use crate::blockchain::wallet::{LocalSigner, ReadOnlySigner, TransactionSigner, PRIVATE_KEY_ENV_VAR};
use crate::config::{EngineConfig, PollingConfig};
use crate::fetchers::{Asset, FetchContext};
use crate::lifecycle::Liveness;
use crate::persistence::{JsonFileStore, SnapshotStore};
use crate::providers::ProviderSet;
use crate::scheduler::PollScheduler;
use crate::spend::broadcast;
use crate::state::snapshot::signed_amount;
use crate::state::{unix_now, LoggingSink, NotificationSink, Snapshot, StateReconciler, TransactionRecord};

/// Collaborators the engine talks to.
pub struct EngineDeps {
    pub transport: Arc<dyn JsonTransport>,
    pub store: Arc<dyn SnapshotStore>,
    pub signer: Arc<dyn TransactionSigner>,
    pub fee_estimator: Arc<dyn FeeEstimator>,
    pub sink: Arc<dyn NotificationSink>,
}

impl EngineDeps {
    /// Production defaults: reqwest transport, JSON file store, key from the environment
    /// (watch-only without one), configured fee schedule, logging sink.
    pub fn from_config(config: &EngineConfig) -> SyncResult<Self> {
        let signer: Arc<dyn TransactionSigner> = if std::env::var_os(PRIVATE_KEY_ENV_VAR).is_some() {
            Arc::new(LocalSigner::from_env()?)
        } else {
            tracing::warn!(env = PRIVATE_KEY_ENV_VAR, "No signing key configured; wallet is watch-only");
            Arc::new(ReadOnlySigner)
        };

        Ok(Self {
            transport: Arc::new(HttpTransport::new(config.providers.timeout_secs)?),
            store: Arc::new(JsonFileStore::new(&config.persistence.dir)),
            signer,
            fee_estimator: Arc::new(ConfiguredFeeEstimator),
            sink: Arc::new(LoggingSink),
        })
    }
}

pub struct WalletEngine {
    wallet_id: String,
    chain_id: u64,
    ctx: Arc<FetchContext>,
    reconciler: Arc<StateReconciler>,
    liveness: Liveness,
    polling: PollingConfig,
    max_pending_spends: u64,
    fee_schedule: FeeSchedule,
    flush_interval: Duration,
    store: Arc<dyn SnapshotStore>,
    signer: Arc<dyn TransactionSigner>,
    fee_estimator: Arc<dyn FeeEstimator>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WalletEngine {
    /// Build the engine and load the persisted snapshot, if any.
    pub async fn new(config: &EngineConfig, deps: EngineDeps) -> SyncResult<Self> {
        let wallet = &config.wallet;
        let address: Address = wallet
            .address
            .parse()
            .map_err(|_| SyncError::InvalidAddress(wallet.address.clone()))?;

        let tokens = wallet
            .tokens
            .iter()
            .map(|token| {
                let contract = token
                    .contract
                    .parse()
                    .map_err(|_| SyncError::InvalidContract(token.contract.clone()))?;
                Ok(TokenInfo {
                    code: token.code.clone(),
                    contract,
                    decimals: token.decimals,
                })
            })
            .collect::<SyncResult<Vec<_>>>()?;

        let providers = ProviderSet::from_config(&config.providers, deps.transport);
        let ctx = FetchContext::new(address, wallet.native_currency.clone(), tokens, providers);

        let initial = deps.store.load(&wallet.id).await?.unwrap_or_default();
        tracing::info!(
            wallet = %wallet.id,
            address = %address,
            height = initial.block_height,
            "Wallet engine initialized"
        );

        Ok(Self {
            wallet_id: wallet.id.clone(),
            chain_id: wallet.chain_id,
            ctx: Arc::new(ctx),
            reconciler: Arc::new(StateReconciler::new(
                initial,
                deps.sink,
                config.polling.stale_pending_blocks,
            )),
            liveness: Liveness::new(),
            polling: config.polling.clone(),
            max_pending_spends: config.spend.max_pending_spends,
            fee_schedule: FeeSchedule::from(&config.spend),
            flush_interval: Duration::from_secs(config.persistence.flush_interval_secs),
            store: deps.store,
            signer: deps.signer,
            fee_estimator: deps.fee_estimator,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    pub fn address(&self) -> Address {
        self.ctx.address
    }

    pub fn is_running(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Read-only view of the latest published state.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.reconciler.snapshot()
    }

    /// Start polling and periodic flushing. Returns false if already running.
    pub fn start(&self) -> bool {
        if !self.liveness.set_alive() {
            return false;
        }

        let scheduler = PollScheduler::new(
            self.ctx.clone(),
            self.reconciler.clone(),
            self.liveness.clone(),
            &self.polling,
        );
        let flusher = flush_loop(
            self.wallet_id.clone(),
            self.reconciler.clone(),
            self.store.clone(),
            self.liveness.clone(),
            self.flush_interval,
        );

        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tasks.push(tokio::spawn(scheduler.run()));
        tasks.push(tokio::spawn(flusher));
        tracing::info!(wallet = %self.wallet_id, "Wallet engine started");
        true
    }

    /// Stop scheduling, wait for the background tasks, and save the snapshot one last time.
    pub async fn stop(&self) -> SyncResult<()> {
        self.liveness.clear();

        let tasks: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task ended abnormally");
            }
        }

        self.reconciler.take_dirty();
        self.store.save(&self.wallet_id, &self.reconciler.snapshot()).await?;
        tracing::info!(wallet = %self.wallet_id, "Wallet engine stopped");
        Ok(())
    }

    /// Save the snapshot if anything changed since the last save.
    pub async fn flush(&self) -> SyncResult<bool> {
        flush_once(&self.wallet_id, &self.reconciler, self.store.as_ref()).await
    }

    /// Sign and broadcast a spend; the returned record is already tracked as pending.
    pub async fn submit_spend(&self, intent: SpendIntent) -> SyncResult<TransactionRecord> {
        let asset = self.ctx.asset(&intent.currency)?;
        let recipient: Address = intent
            .to
            .parse()
            .map_err(|_| SyncError::InvalidAddress(intent.to.clone()))?;
        let amount = parse_decimal("intent", &intent.amount)
            .ok()
            .filter(|a| !a.is_zero())
            .ok_or_else(|| SyncError::InvalidAmount(intent.amount.clone()))?;

        let (to, value, data) = match asset {
            Asset::Native => (recipient, amount, Bytes::new()),
            Asset::Token(contract) => (contract, U256::ZERO, token_transfer_data(recipient, amount)),
        };
        let is_token = matches!(asset, Asset::Token(_));

        let quote = self
            .fee_estimator
            .estimate(&intent, is_token, &data, &self.fee_schedule)?;
        let fee = quote.max_fee();

        let snapshot = self.reconciler.snapshot();
        check_funds(&snapshot, &self.ctx.native_currency, &intent.currency, is_token, amount, fee)?;

        let nonce = self.reconciler.allocate_nonce(self.max_pending_spends)?;
        let request = SignRequest {
            nonce,
            gas_limit: quote.gas_limit,
            gas_price: quote.gas_price,
            to,
            value,
            data,
            chain_id: self.chain_id,
        };

        let signed = match self.signer.sign(&request).await {
            Ok(signed) => signed,
            Err(e) => {
                self.reconciler.release_nonce(nonce);
                return Err(e);
            }
        };

        let hash = match broadcast(&self.ctx.providers, &signed.signed_raw_tx).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(txid = %signed.txid, nonce = %nonce, error = %e, "Broadcast failed");
                self.reconciler.release_nonce(nonce);
                return Err(e);
            }
        };
        if !hash.eq_ignore_ascii_case(&signed.txid) {
            tracing::warn!(reported = %hash, signed = %signed.txid, "Broadcast endpoint reported a different hash");
        }

        let (amount_text, network_fee, parent_network_fee) = if is_token {
            (signed_amount(true, amount), "0".to_string(), Some(fee.to_string()))
        } else {
            (signed_amount(true, amount.saturating_add(fee)), fee.to_string(), None)
        };
        let record = TransactionRecord {
            txid: signed.txid.clone(),
            timestamp: unix_now(),
            currency: intent.currency.clone(),
            block_height: 0,
            amount: amount_text,
            network_fee,
            parent_network_fee,
            from: self.ctx.address.to_string(),
            to: Some(recipient.to_string()),
            nonce: u64::try_from(nonce).ok(),
            metadata: json!({
                "gasLimit": quote.gas_limit,
                "gasPrice": quote.gas_price.to_string(),
                "signedRawTx": signed.signed_raw_tx,
            }),
            submitted_at_height: Some(snapshot.block_height),
        };

        self.reconciler.record_pending(record.timestamp, record.clone());
        tracing::info!(
            txid = %record.txid,
            currency = %record.currency,
            nonce = %nonce,
            "Spend broadcast"
        );
        Ok(record)
    }
}

impl std::fmt::Debug for WalletEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletEngine")
            .field("wallet_id", &self.wallet_id)
            .field("address", &self.ctx.address)
            .field("running", &self.is_running())
            .finish()
    }
}

fn check_funds(
    snapshot: &Snapshot,
    native: &str,
    currency: &str,
    is_token: bool,
    amount: U256,
    fee: U256,
) -> SyncResult<()> {
    let available = |code: &str| {
        snapshot
            .balance(code)
            .and_then(|b| U256::from_str_radix(b, 10).ok())
            .unwrap_or(U256::ZERO)
    };
    let insufficient = |code: &str, required: U256, available: U256| SyncError::InsufficientFunds {
        currency: code.to_string(),
        required,
        available,
    };

    let native_available = available(native);
    if is_token {
        let token_available = available(currency);
        if amount > token_available {
            return Err(insufficient(currency, amount, token_available));
        }
        if fee > native_available {
            return Err(insufficient(native, fee, native_available));
        }
    } else {
        let required = amount.saturating_add(fee);
        if required > native_available {
            return Err(insufficient(native, required, native_available));
        }
    }
    Ok(())
}

async fn flush_once(wallet_id: &str, reconciler: &StateReconciler, store: &dyn SnapshotStore) -> SyncResult<bool> {
    if !reconciler.take_dirty() {
        return Ok(false);
    }
    if let Err(e) = store.save(wallet_id, &reconciler.snapshot()).await {
        reconciler.mark_dirty();
        return Err(e);
    }
    Ok(true)
}

async fn flush_loop(
    wallet_id: String,
    reconciler: Arc<StateReconciler>,
    store: Arc<dyn SnapshotStore>,
    liveness: Liveness,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = liveness.cleared() => break,
        }
        match flush_once(&wallet_id, &reconciler, store.as_ref()).await {
            Ok(true) => tracing::debug!(wallet = %wallet_id, "Snapshot flushed"),
            Ok(false) => {}
            Err(e) => tracing::error!(wallet = %wallet_id, error = %e, "Snapshot flush failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AggregatorConfig, EndpointConfig, TokenConfig};
    use crate::persistence::MemoryStore;
    use crate::providers::mock::{MockReply, MockTransport};
    use crate::spend::NonceAllocator;
    use crate::state::ChannelSink;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const WALLET: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const USDC: &str = "0x3333333333333333333333333333333333333333";
    const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";
    const HASH: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";
    const ONE_ETH: &str = "1000000000000000000";

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.wallet.id = "main".to_string();
        config.wallet.address = WALLET.to_string();
        config.wallet.chain_id = 31337;
        config.wallet.tokens.push(TokenConfig {
            code: "USDC".to_string(),
            contract: USDC.to_string(),
            decimals: 6,
        });
        let endpoint = |name: &str, url: &str| EndpointConfig {
            name: name.to_string(),
            url: url.to_string(),
            api_key: None,
        };
        config.providers.explorers.push(endpoint("explorer", "https://explorer.test/api"));
        config.providers.rpc.push(endpoint("rpc", "https://rpc.test/"));
        config.providers.aggregator = Some(AggregatorConfig {
            name: "aggregator".to_string(),
            url: "https://agg.test/ethereum/".to_string(),
            api_key: None,
        });
        config
    }

    fn funded() -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.block_height = 100;
        snapshot.nonces = NonceAllocator::new(U256::from(5));
        snapshot.balances.insert("ETH".to_string(), ONE_ETH.to_string());
        snapshot.balances.insert("USDC".to_string(), "1000".to_string());
        snapshot
    }

    async fn engine(mock: Arc<MockTransport>, store: Arc<MemoryStore>) -> WalletEngine {
        let (sink, _rx) = ChannelSink::new();
        let deps = EngineDeps {
            transport: mock,
            store,
            signer: Arc::new(LocalSigner::from_private_key(TEST_PRIVATE_KEY).unwrap()),
            fee_estimator: Arc::new(ConfiguredFeeEstimator),
            sink: Arc::new(sink),
        };
        WalletEngine::new(&config(), deps).await.unwrap()
    }

    fn accepting() -> Arc<MockTransport> {
        let mock = MockTransport::new();
        mock.on("rpc.test", MockReply::json(json!({"jsonrpc": "2.0", "id": 1, "result": HASH})));
        mock.on("explorer.test", MockReply::unavailable());
        mock.on("agg.test", MockReply::unavailable());
        mock
    }

    fn intent(currency: &str, to: &str, amount: &str) -> SpendIntent {
        SpendIntent {
            currency: currency.to_string(),
            to: to.to_string(),
            amount: amount.to_string(),
        }
    }

    #[tokio::test]
    async fn test_native_spend_tracked_as_pending() {
        let store = Arc::new(MemoryStore::with_snapshot("main", funded()));
        let engine = engine(accepting(), store).await;

        let record = engine.submit_spend(intent("ETH", RECIPIENT, "1000")).await.unwrap();
        // 21000 gas at 20 gwei × 1.2
        let fee = U256::from(21_000u64) * U256::from(24_000_000_000u64);
        assert_eq!(record.amount, format!("-{}", U256::from(1000) + fee));
        assert_eq!(record.network_fee, fee.to_string());
        assert_eq!(record.nonce, Some(5));
        assert_eq!(record.submitted_at_height, Some(100));

        let snapshot = engine.current_snapshot();
        assert_eq!(snapshot.nonces.next_unconfirmed_nonce, U256::from(6));
        assert_eq!(snapshot.pending_local().count(), 1);
    }

    #[tokio::test]
    async fn test_token_spend_records_parent_fee() {
        let store = Arc::new(MemoryStore::with_snapshot("main", funded()));
        let engine = engine(accepting(), store).await;

        let record = engine.submit_spend(intent("USDC", RECIPIENT, "250")).await.unwrap();
        assert_eq!(record.amount, "-250");
        assert_eq!(record.network_fee, "0");
        let fee = U256::from(65_000u64) * U256::from(24_000_000_000u64);
        assert_eq!(record.parent_network_fee, Some(fee.to_string()));
    }

    #[tokio::test]
    async fn test_spend_validation() {
        let store = Arc::new(MemoryStore::with_snapshot("main", funded()));
        let engine = engine(accepting(), store).await;

        assert!(matches!(
            engine.submit_spend(intent("ETH", "0x1234", "1")).await,
            Err(SyncError::InvalidAddress(_))
        ));
        assert!(matches!(
            engine.submit_spend(intent("DAI", RECIPIENT, "1")).await,
            Err(SyncError::InvalidContract(_))
        ));
        assert!(matches!(
            engine.submit_spend(intent("ETH", RECIPIENT, "1.5")).await,
            Err(SyncError::InvalidAmount(_))
        ));
        assert!(matches!(
            engine.submit_spend(intent("ETH", RECIPIENT, ONE_ETH)).await,
            Err(SyncError::InsufficientFunds { ref currency, .. }) if currency == "ETH"
        ));
        assert!(matches!(
            engine.submit_spend(intent("USDC", RECIPIENT, "1001")).await,
            Err(SyncError::InsufficientFunds { ref currency, .. }) if currency == "USDC"
        ));
        // None of the rejected spends consumed a nonce.
        assert_eq!(engine.current_snapshot().nonces.next_unconfirmed_nonce, U256::from(5));
    }

    #[tokio::test]
    async fn test_failed_broadcast_releases_nonce() {
        let mock = MockTransport::new();
        mock.on("explorer.test", MockReply::unavailable());
        mock.on("agg.test", MockReply::unavailable());
        mock.on(
            "rpc.test",
            MockReply::delayed(json!({"jsonrpc": "2.0", "id": 1, "error": {"message": "nonce too low"}}), 10),
        );
        let store = Arc::new(MemoryStore::with_snapshot("main", funded()));
        let engine = engine(mock, store).await;

        let err = engine.submit_spend(intent("ETH", RECIPIENT, "1")).await.unwrap_err();
        assert_eq!(err.to_string(), "nonce too low");

        let snapshot = engine.current_snapshot();
        assert_eq!(snapshot.nonces.next_unconfirmed_nonce, U256::from(5));
        assert_eq!(snapshot.nonces.pending_spend_count, 0);
        assert_eq!(snapshot.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_cap_blocks_spend() {
        let store = Arc::new(MemoryStore::with_snapshot("main", funded()));
        let engine = engine(accepting(), store).await;

        for _ in 0..6 {
            engine.submit_spend(intent("ETH", RECIPIENT, "1")).await.unwrap();
        }
        assert!(matches!(
            engine.submit_spend(intent("ETH", RECIPIENT, "1")).await,
            Err(SyncError::ExcessivePendingSpends { limit: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_saves_snapshot() {
        let mock = MockTransport::new();
        mock.on("test", MockReply::unavailable());
        let store = Arc::new(MemoryStore::new());
        let engine = engine(mock, store.clone()).await;

        assert!(engine.start());
        assert!(!engine.start());
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.stop().await.unwrap();

        assert!(!engine.is_running());
        assert!(store.get("main").is_some());
    }

    #[tokio::test]
    async fn test_flush_only_when_dirty() {
        let store = Arc::new(MemoryStore::with_snapshot("main", funded()));
        let engine = engine(accepting(), store.clone()).await;

        assert!(!engine.flush().await.unwrap());
        engine.submit_spend(intent("ETH", RECIPIENT, "1")).await.unwrap();
        assert!(engine.flush().await.unwrap());
        assert!(!engine.flush().await.unwrap());
        assert_eq!(store.save_count(), 1);
    }
}
