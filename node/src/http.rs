use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use ledger_core::{Block, Ledger, PeerRegistry, Transaction};
use shared::Amount;
use wallet::Wallet;

/// Shared application state, handed to every handler via axum's
/// `State` extractor (§4.7). No handler mutates anything outside of a
/// single call into `ledger`, `wallet`, or `peers`.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub wallet: Arc<Wallet>,
    pub peers: Arc<PeerRegistry>,
    pub self_address: String,
    pub http_client: reqwest::Client,
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs_f64()
}

/// Builds the router matching the HTTP surface of §6.1. Every handler
/// is a thin translation of request body to core call to status code —
/// no consensus branching lives here.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mine", get(mine))
        .route("/chain", get(chain))
        .route("/transactions/create", post(create_transaction))
        .route("/transactions/receive", post(receive_transaction))
        .route("/block/receive", post(receive_block))
        .route("/peers/register", post(register_peer))
        .route("/wallets/create", post(create_wallet))
        .route("/wallets/{alias}/balance", get(wallet_balance))
        .with_state(state)
}

async fn mine(State(state): State<AppState>) -> impl IntoResponse {
    match ledger_core::mine_block(&state.ledger, now()) {
        Ok(Some(block)) => {
            crate::gossip::broadcast_block(&state.peers, &state.http_client, &block).await;
            Json(block).into_response()
        }
        Ok(None) => Json(json!({"message": "No transactions or mining failed"})).into_response(),
        Err(err) => {
            tracing::error!(%err, "mining attempt failed");
            Json(json!({"message": "No transactions or mining failed"})).into_response()
        }
    }
}

async fn chain(State(state): State<AppState>) -> impl IntoResponse {
    let chain: Vec<Block> = state.ledger.chain_snapshot();
    Json(json!({"length": chain.len(), "chain": chain}))
}

#[derive(Deserialize)]
struct CreateTransactionRequest {
    sender_alias: String,
    recipient_pub_key: String,
    amount: f64,
    #[serde(default)]
    fee: f64,
}

async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> impl IntoResponse {
    let Ok(amount) = Amount::from_major(request.amount) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid amount"}))).into_response();
    };
    let Ok(fee) = Amount::from_major(request.fee) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid fee"}))).into_response();
    };

    let Some(tx) = state.wallet.build_transaction(
        &request.sender_alias,
        &request.recipient_pub_key,
        amount,
        fee,
        state.ledger.utxo_store(),
        state.ledger.params().transaction_version,
        now(),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unknown alias or insufficient funds"})),
        )
            .into_response();
    };

    let Ok(txid) = tx.txid() else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "could not derive txid"}))).into_response();
    };

    let broadcastable = tx.clone();
    if !state.ledger.add_transaction(tx) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "transaction rejected by the ledger"})),
        )
            .into_response();
    }
    crate::gossip::broadcast_transaction(&state.peers, &state.http_client, &broadcastable).await;

    (StatusCode::CREATED, Json(json!({"txid": txid.to_hex()}))).into_response()
}

async fn receive_transaction(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> impl IntoResponse {
    if state.ledger.add_transaction(tx) {
        (StatusCode::OK, Json(json!({"status": "added"}))).into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({"error": "transaction rejected"}))).into_response()
    }
}

async fn receive_block(State(state): State<AppState>, body: axum::body::Bytes) -> impl IntoResponse {
    let Ok(block) = serde_json::from_slice::<Block>(&body) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "malformed block"}))).into_response();
    };

    let tip_hash = match state.ledger.tip().hash() {
        Ok(hash) => hash,
        Err(_) => return (StatusCode::BAD_REQUEST, Json(json!({"error": "corrupt tip"}))).into_response(),
    };
    let difficulty = state.ledger.difficulty();

    match ledger_core::gossip::accepts_inbound_block(&block, tip_hash, difficulty) {
        Ok(true) => match state.ledger.commit_block(block) {
            Ok(()) => (StatusCode::OK, Json(json!({"status": "accepted"}))).into_response(),
            Err(err) => {
                tracing::warn!(%err, "inbound block failed to commit");
                (StatusCode::OK, Json(json!({"status": "ignored"}))).into_response()
            }
        },
        Ok(false) => (StatusCode::OK, Json(json!({"status": "ignored"}))).into_response(),
        Err(err) => {
            tracing::warn!(%err, "inbound block hashing failed");
            (StatusCode::BAD_REQUEST, Json(json!({"error": "malformed block"}))).into_response()
        }
    }
}

#[derive(Deserialize)]
struct RegisterPeerRequest {
    address: String,
}

async fn register_peer(
    State(state): State<AppState>,
    Json(request): Json<RegisterPeerRequest>,
) -> impl IntoResponse {
    match state.peers.register(&request.address, &state.self_address) {
        Some(normalized) => {
            state.ledger.block_store().upsert_peer(&normalized, now());
            (StatusCode::CREATED, Json(json!({"address": normalized}))).into_response()
        }
        None => (StatusCode::BAD_REQUEST, Json(json!({"error": "malformed or self address"}))).into_response(),
    }
}

#[derive(Deserialize)]
struct CreateWalletRequest {
    alias: String,
}

async fn create_wallet(
    State(state): State<AppState>,
    Json(request): Json<CreateWalletRequest>,
) -> impl IntoResponse {
    match state.wallet.create_wallet(&request.alias) {
        Ok(address) => (
            StatusCode::CREATED,
            Json(json!({"alias": request.alias, "address": address})),
        )
            .into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, Json(json!({"error": err.to_string()}))).into_response(),
    }
}

async fn wallet_balance(State(state): State<AppState>, Path(alias): Path<String>) -> impl IntoResponse {
    match state.wallet.balance(&alias, state.ledger.utxo_store()) {
        Some(balance) => (
            StatusCode::OK,
            Json(json!({"alias": alias, "balance": balance.to_major()})),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "unknown alias"}))).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use ledger_core::NetworkParams;
    use shared::Dilithium3Mock;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let wallet = Wallet::new(Box::new(Dilithium3Mock::new()));
        let miner_address = wallet.create_wallet("miner").unwrap();
        let params = NetworkParams {
            initial_difficulty: 1,
            ..NetworkParams::default()
        };
        let ledger = Ledger::new(params, miner_address, Box::new(Dilithium3Mock::new())).unwrap();
        let peers = PeerRegistry::load_from(ledger.block_store());
        AppState {
            ledger: Arc::new(ledger),
            wallet: Arc::new(wallet),
            peers: Arc::new(peers),
            self_address: "http://127.0.0.1:0".to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn balance_for_an_unknown_alias_is_404() {
        let app = router(test_state());
        let request = Request::builder()
            .uri("/wallets/nobody/balance")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn a_malformed_block_body_is_400() {
        let app = router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/block/receive")
            .body(Body::from("not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn a_payable_transaction_request_is_created() {
        let app = router(test_state());
        let body = json!({
            "sender_alias": "miner",
            "recipient_pub_key": "bob",
            "amount": 10.0
        });
        let request = Request::builder()
            .method("POST")
            .uri("/transactions/create")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = json_body(response).await;
        assert!(json.get("txid").is_some());
    }

    #[tokio::test]
    async fn creating_a_wallet_is_created() {
        let app = router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/wallets/create")
            .header("content-type", "application/json")
            .body(Body::from(json!({"alias": "alice"}).to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
