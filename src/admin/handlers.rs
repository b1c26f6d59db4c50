use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::state::{Snapshot, TransactionRecord};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub wallet_id: String,
    pub address: String,
    pub block_height: u64,
    pub confirmed_nonce: String,
    pub next_unconfirmed_nonce: String,
    pub pending_spend_count: u64,
    /// Locally submitted spends not yet seen in a block.
    pub pending_local: usize,
    pub transactions: usize,
    pub updated_at: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let engine = &state.engine;
    let snapshot = engine.current_snapshot();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if engine.is_running() { "running" } else { "stopped" },
        wallet_id: engine.wallet_id().to_string(),
        address: engine.address().to_string(),
        block_height: snapshot.block_height,
        confirmed_nonce: snapshot.nonces.confirmed_nonce.to_string(),
        next_unconfirmed_nonce: snapshot.nonces.next_unconfirmed_nonce.to_string(),
        pending_spend_count: snapshot.nonces.pending_spend_count,
        pending_local: snapshot.pending_local().count(),
        transactions: snapshot.transaction_count(),
        updated_at: snapshot.updated_at,
    })
}

pub async fn get_snapshot(State(state): State<AdminState>) -> Json<Snapshot> {
    Json(state.engine.current_snapshot().as_ref().clone())
}

pub async fn get_transactions(
    State(state): State<AdminState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<TransactionRecord>>, StatusCode> {
    let snapshot = state.engine.current_snapshot();
    let known = snapshot.balances.contains_key(&code) || snapshot.transactions.contains_key(&code);
    if !known {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(snapshot.transactions_for(&code).into_iter().cloned().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::setup_admin_router;
    use crate::blockchain::transaction::ConfiguredFeeEstimator;
    use crate::blockchain::wallet::ReadOnlySigner;
    use crate::config::{EndpointConfig, EngineConfig};
    use crate::engine::{EngineDeps, WalletEngine};
    use crate::persistence::MemoryStore;
    use crate::providers::mock::MockTransport;
    use crate::state::LoggingSink;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn state() -> AdminState {
        let mut config = EngineConfig::default();
        config.wallet.id = "main".to_string();
        config.wallet.address = "0x1111111111111111111111111111111111111111".to_string();
        config.providers.rpc.push(EndpointConfig {
            name: "rpc".to_string(),
            url: "https://rpc.test/".to_string(),
            api_key: None,
        });

        let mut snapshot = Snapshot::default();
        snapshot.block_height = 77;
        snapshot.balances.insert("ETH".to_string(), "5".to_string());

        let deps = EngineDeps {
            transport: MockTransport::new(),
            store: Arc::new(MemoryStore::with_snapshot("main", snapshot)),
            signer: Arc::new(ReadOnlySigner),
            fee_estimator: Arc::new(ConfiguredFeeEstimator),
            sink: Arc::new(LoggingSink),
        };
        AdminState {
            engine: Arc::new(WalletEngine::new(&config, deps).await.unwrap()),
            api_key: Arc::from("secret"),
        }
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_requires_bearer_key() {
        let app = setup_admin_router(state().await);
        let response = app.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = app.oneshot(get("/admin/status", Some("wrong"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_reports_snapshot() {
        let app = setup_admin_router(state().await);
        let response = app.oneshot(get("/admin/status", Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["block_height"], 77);
        assert_eq!(json["status"], "stopped");
        assert_eq!(json["wallet_id"], "main");
    }

    #[tokio::test]
    async fn test_snapshot_and_transactions() {
        let app = setup_admin_router(state().await);
        let json = body_json(app.clone().oneshot(get("/admin/snapshot", Some("secret"))).await.unwrap()).await;
        assert_eq!(json["balances"]["ETH"], "5");

        let response = app.clone().oneshot(get("/admin/transactions/ETH", Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));

        let response = app.oneshot(get("/admin/transactions/DOGE", Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
