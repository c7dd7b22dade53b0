//! Node configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use xintent_core::{Address, Amount, ChainId, ProtocolParams, MAX_WINDOW_SECS, UNIT};

use crate::chain::ChainConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "xintent-node", about = "xintent chain node", version)]
pub struct NodeConfig {
    /// HTTP listen address
    #[arg(long, env = "XINTENT_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Chain id this node serves
    #[arg(long, env = "XINTENT_CHAIN_ID", default_value_t = 1)]
    pub chain_id: ChainId,

    /// Admin of the registry, relay, escrow and proxy
    #[arg(long, env = "XINTENT_ADMIN", default_value = "0x00000000000000000000000000000000000000ad")]
    pub admin: Address,

    /// Account the engine sweeps expired intents as; granted the executor role
    #[arg(long, env = "XINTENT_OPERATOR", default_value = "0x00000000000000000000000000000000000000e0")]
    pub operator: Address,

    /// Address the chain's contracts act as
    #[arg(long, env = "XINTENT_CONTRACT", default_value = "0x00000000000000000000000000000000000000c1")]
    pub contract: Address,

    /// Local id on the generic endpoint transport
    #[arg(long, env = "XINTENT_ENDPOINT_ID", default_value_t = 30_101)]
    pub endpoint_id: u32,

    /// Local selector on the chain-selector transport
    #[arg(long, env = "XINTENT_CHAIN_SELECTOR", default_value_t = 1_001)]
    pub chain_selector: u64,

    /// Minimum agent stake in base units
    #[arg(long, env = "XINTENT_MIN_STAKE", default_value_t = UNIT)]
    pub min_stake: Amount,

    /// Minimum seconds between intent creation and its deadline
    #[arg(
        long,
        env = "XINTENT_MIN_DEADLINE_HORIZON",
        default_value_t = 3_600,
        value_parser = clap::value_parser!(i64).range(0..=MAX_WINDOW_SECS)
    )]
    pub min_deadline_horizon_secs: i64,

    /// Milliseconds between expiry sweeps
    #[arg(long, env = "XINTENT_SWEEP_INTERVAL_MS", default_value_t = 5_000)]
    pub sweep_interval_ms: u64,

    /// Default tracing filter when RUST_LOG is unset
    #[arg(long, env = "XINTENT_LOG", default_value = "xintent_node=info,tower_http=info")]
    pub log_filter: String,
}

impl NodeConfig {
    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            chain_id: self.chain_id,
            address: self.contract,
            admin: self.admin,
            endpoint_id: self.endpoint_id,
            chain_selector: self.chain_selector,
            params: ProtocolParams::default()
                .with_min_stake(self.min_stake)
                .with_min_deadline_horizon(self.min_deadline_horizon_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::try_parse_from(["xintent-node"]).unwrap();
        assert_eq!(config.listen.port(), 3000);
        assert_eq!(config.chain_id, 1);
        assert_eq!(
            config.admin,
            "0x00000000000000000000000000000000000000ad".parse::<Address>().unwrap()
        );

        let chain = config.chain_config();
        assert_eq!(chain.params.min_stake, UNIT);
        assert_eq!(chain.params.min_deadline_horizon_secs, 3_600);
        assert_eq!(chain.params.baseline_reputation, 1_000);
    }

    #[test]
    fn test_flags() {
        let config = NodeConfig::try_parse_from([
            "xintent-node",
            "--chain-id",
            "8453",
            "--admin",
            "0x4242424242424242424242424242424242424242",
            "--min-stake",
            "500",
            "--sweep-interval-ms",
            "0",
        ])
        .unwrap();
        assert_eq!(config.chain_id, 8453);
        assert_eq!(config.admin, Address::repeat_byte(0x42));
        assert_eq!(config.chain_config().params.min_stake, 500);
        assert_eq!(config.sweep_interval(), Duration::from_millis(1));

        assert!(NodeConfig::try_parse_from(["xintent-node", "--admin", "0x12"]).is_err());
        assert!(NodeConfig::try_parse_from([
            "xintent-node",
            "--min-deadline-horizon-secs",
            "9223372036854775807",
        ])
        .is_err());
    }
}
