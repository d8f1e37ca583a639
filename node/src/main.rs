mod config;
mod gossip;
mod http;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ledger_core::{Ledger, PeerRegistry};
use wallet::Wallet;

use crate::config::Config;
use crate::http::AppState;

#[derive(Parser)]
#[command(name = "node")]
#[command(about = "Post-quantum ledger node: HTTP surface, miner, and gossip driver")]
struct Cli {
    /// Bootstrap peer addresses to register with at startup (http://host:port)
    #[arg(long)]
    peer: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    run(cli, config).await
}

/// Everything that can fail before the HTTP listener is bound (§4.3
/// "Startup", §7's `ConfigError` semantics): scheme resolution, wallet
/// provisioning, ledger bootstrap, and the peer HTTP client. Split out
/// of `run` so the fatal paths are reachable from a test without
/// binding a real socket or serving forever.
async fn bootstrap(cli: &Cli, config: &Config) -> Result<(AppState, SocketAddr), String> {
    let scheme = shared::scheme_by_name(&config.pqc_scheme_name)
        .map_err(|err| format!("unrecognized signature scheme {:?}: {err}", config.pqc_scheme_name))?;

    // The wallet needs its own scheme instance (it signs on behalf of
    // aliases); the ledger's is only ever used to verify.
    let wallet_scheme = shared::scheme_by_name(&config.pqc_scheme_name)
        .map_err(|err| format!("unrecognized signature scheme {:?}: {err}", config.pqc_scheme_name))?;
    let wallet = Arc::new(Wallet::new(wallet_scheme));

    let miner_address = match config.miner_address.clone() {
        Some(address) => address,
        None => wallet
            .create_wallet("node-miner")
            .map_err(|err| format!("failed to provision a default miner wallet: {err}"))?,
    };

    let ledger = Arc::new(
        Ledger::new(config.network_params(), miner_address, scheme)
            .map_err(|err| format!("failed to bootstrap the ledger: {err}"))?,
    );
    info!(height = ledger.height(), "ledger bootstrapped");

    let peers = Arc::new(PeerRegistry::load_from(ledger.block_store()));
    let self_address = format!("http://127.0.0.1:{}", config.node_port);

    let http_client = reqwest::Client::builder()
        .timeout(config.network_timeout)
        .build()
        .map_err(|err| format!("failed to build the peer HTTP client: {err}"))?;

    for peer in &cli.peer {
        gossip::register_with_peer(&self_address, peer, &peers, &ledger, &http_client).await;
    }

    let gossip_ledger = Arc::clone(&ledger);
    let gossip_peers = Arc::clone(&peers);
    let gossip_client = http_client.clone();
    let gossip_interval = config.gossip_interval;
    tokio::spawn(async move {
        gossip::run_reconcile_loop(gossip_ledger, gossip_peers, gossip_client, gossip_interval).await;
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.node_port));
    let state = AppState {
        ledger,
        wallet,
        peers,
        self_address,
        http_client,
    };
    Ok((state, addr))
}

async fn run(cli: Cli, config: Config) -> ExitCode {
    let (state, addr) = match bootstrap(&cli, &config).await {
        Ok(result) => result,
        Err(message) => {
            error!(%message, "fatal startup error, refusing to start");
            return ExitCode::FAILURE;
        }
    };

    let app = http::router(state).layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, %addr, "failed to bind the HTTP listener");
            return ExitCode::FAILURE;
        }
    };
    info!(%addr, "node listening");

    if let Err(err) = axum::serve(listener, app).await {
        error!(%err, "http server exited with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Amount, Dilithium3Mock};
    use std::time::Duration;

    fn test_config(scheme_name: &str) -> Config {
        Config {
            node_port: 0,
            initial_difficulty: 1,
            miner_reward: Amount::from_major(1.0).unwrap(),
            block_time_target: 10,
            difficulty_adjustment_interval: 5,
            gossip_interval: Duration::from_secs(10),
            network_timeout: Duration::from_secs(5),
            pqc_scheme_name: scheme_name.to_string(),
            transaction_version: 1,
            miner_address: None,
        }
    }

    /// The startup-fatal path exercised by an unrecognized `PQC_SCHEME_NAME`
    /// (§7's `ConfigError`, testable property 9): bootstrap must fail
    /// before anything is bound.
    #[tokio::test]
    async fn unrecognized_scheme_name_fails_bootstrap() {
        let cli = Cli { peer: vec![] };
        let config = test_config("not-a-real-scheme");
        assert!(bootstrap(&cli, &config).await.is_err());
    }

    #[tokio::test]
    async fn a_recognized_scheme_name_bootstraps_a_running_ledger() {
        let cli = Cli { peer: vec![] };
        let config = test_config(Dilithium3Mock::SCHEME_NAME);
        let (state, _addr) = bootstrap(&cli, &config).await.unwrap();
        assert_eq!(state.ledger.height(), 0);
    }
}
