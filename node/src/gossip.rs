use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use ledger_core::{Block, Ledger, PeerRegistry, Transaction};

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs_f64()
}

#[derive(Deserialize)]
struct ChainResponse {
    #[allow(dead_code)]
    length: usize,
    chain: Vec<Block>,
}

/// Runs forever, reconciling against every known peer every
/// `interval` (§4.5 steps 1-4). The decision of which chain wins is
/// made entirely by the synchronous functions in `ledger_core::gossip`;
/// this task only fetches bytes and feeds them in.
pub async fn run_reconcile_loop(
    ledger: Arc<Ledger>,
    peers: Arc<PeerRegistry>,
    client: reqwest::Client,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        reconcile_once(&ledger, &peers, &client).await;
    }
}

async fn reconcile_once(ledger: &Ledger, peers: &PeerRegistry, client: &reqwest::Client) {
    let local_len = ledger.chain_snapshot().len();
    let mut best_len = local_len;
    let mut best_chain: Option<Vec<Block>> = None;

    for peer in peers.snapshot() {
        let url = format!("{peer}/chain");
        let response = match client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%peer, %err, "peer unreachable during reconcile");
                continue;
            }
        };
        let parsed: ChainResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(%peer, %err, "peer sent an unparsable chain");
                continue;
            }
        };
        if ledger_core::gossip::consider_candidate(best_len, &parsed.chain) {
            best_len = parsed.chain.len();
            best_chain = Some(parsed.chain);
        }
    }

    if let Some(chain) = best_chain {
        if let Err(err) = ledger.replace_chain(chain) {
            tracing::warn!(%err, "failed to replace chain with peer's longer chain");
        } else {
            tracing::info!(new_height = ledger.height(), "replaced local chain via reconcile");
        }
    }
}

/// Fire-and-forget broadcast of a newly committed block to every known
/// peer (§4.5 "Broadcast"). Errors are swallowed; there is no retry.
pub async fn broadcast_block(peers: &PeerRegistry, client: &reqwest::Client, block: &Block) {
    for peer in peers.snapshot() {
        let url = format!("{peer}/block/receive");
        if let Err(err) = client.post(&url).json(block).send().await {
            tracing::warn!(%peer, %err, "block broadcast failed");
        }
    }
}

/// Fire-and-forget broadcast of a newly admitted transaction to every
/// known peer (§4.5 "Broadcast").
pub async fn broadcast_transaction(peers: &PeerRegistry, client: &reqwest::Client, tx: &Transaction) {
    for peer in peers.snapshot() {
        let url = format!("{peer}/transactions/receive");
        if let Err(err) = client.post(&url).json(tx).send().await {
            tracing::warn!(%peer, %err, "transaction broadcast failed");
        }
    }
}

/// Registers this node with `peer_address` and records the reciprocal
/// registration locally, matching how a freshly joined node introduces
/// itself (§4.5 "Peer registration").
pub async fn register_with_peer(
    self_address: &str,
    peer_address: &str,
    peers: &Arc<PeerRegistry>,
    ledger: &Arc<Ledger>,
    client: &reqwest::Client,
) {
    if let Some(normalized) = peers.register(peer_address, self_address) {
        ledger.block_store().upsert_peer(&normalized, now());
    }
    let url = format!("{peer_address}/peers/register");
    if let Err(err) = client
        .post(&url)
        .json(&serde_json::json!({"address": self_address}))
        .send()
        .await
    {
        tracing::warn!(%peer_address, %err, "failed to register with peer");
    }
}
