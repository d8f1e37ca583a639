use std::env;
use std::time::Duration;

use shared::Amount;

/// Startup configuration, loaded from environment variables with
/// defaults matching the original's `config.py` (§6.5). An unrecognized
/// `PQC_SCHEME_NAME` is the one setting that makes loading itself fail
/// — everything else falls back silently.
pub struct Config {
    pub node_port: u16,
    pub initial_difficulty: u32,
    pub miner_reward: Amount,
    pub block_time_target: u64,
    pub difficulty_adjustment_interval: u64,
    pub gossip_interval: Duration,
    pub network_timeout: Duration,
    pub pqc_scheme_name: String,
    pub transaction_version: u32,
    pub miner_address: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            node_port: env_or("NODE_PORT", 5000),
            initial_difficulty: env_or("INITIAL_DIFFICULTY", 4),
            miner_reward: Amount::from_major(env_or("MINER_REWARD", 10.0)).unwrap_or(Amount::ZERO),
            block_time_target: env_or("BLOCK_TIME_TARGET", 10),
            difficulty_adjustment_interval: env_or("DIFFICULTY_ADJUSTMENT_INTERVAL", 5),
            gossip_interval: Duration::from_secs(env_or("GOSSIP_INTERVAL", 10)),
            network_timeout: Duration::from_secs(env_or("NETWORK_TIMEOUT", 5)),
            pqc_scheme_name: env::var("PQC_SCHEME_NAME")
                .unwrap_or_else(|_| shared::Dilithium3Mock::SCHEME_NAME.to_string()),
            transaction_version: env_or("TRANSACTION_VERSION", 1),
            miner_address: env::var("MINER_ADDRESS").ok(),
        }
    }

    #[must_use]
    pub fn network_params(&self) -> ledger_core::NetworkParams {
        ledger_core::NetworkParams {
            initial_difficulty: self.initial_difficulty,
            miner_reward: self.miner_reward,
            block_time_target: self.block_time_target,
            difficulty_adjustment_interval: self.difficulty_adjustment_interval,
            transaction_version: self.transaction_version,
        }
    }
}
