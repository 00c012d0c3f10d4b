//! Environment-driven configuration.
//!
//! Per-chain RPC endpoint lists are configuration, not constants: fallback
//! ordering differs per deployment. `Config::default()` carries the known
//! chain set with public endpoints; `Config::from_env()` overlays
//! environment variables on top of those defaults.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::services::breaker::BreakerConfig;

/// Chain ids the protocol is deployed on.
pub mod chains {
    pub const ETHEREUM: u64 = 1;
    pub const OPTIMISM: u64 = 10;
    pub const BASE: u64 = 8453;
    pub const ARBITRUM: u64 = 42161;
    pub const ETHEREUM_SEPOLIA: u64 = 11155111;
    pub const OPTIMISM_SEPOLIA: u64 = 11155420;
    pub const BASE_SEPOLIA: u64 = 84532;
    pub const ARBITRUM_SEPOLIA: u64 = 421614;

    pub fn is_testnet(chain_id: u64) -> bool {
        matches!(
            chain_id,
            ETHEREUM_SEPOLIA | OPTIMISM_SEPOLIA | BASE_SEPOLIA | ARBITRUM_SEPOLIA
        )
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the GraphQL indexer (mainnet deployment).
    pub indexer_url: String,
    /// Base URL of the testnet indexer deployment.
    pub indexer_testnet_url: String,
    /// When set, queries for testnet chains are routed to the mainnet API.
    pub testnet_routes_to_mainnet: bool,
    /// Ordered RPC endpoint lists per chain id. Order is fallback priority.
    pub rpc_urls: HashMap<u64, Vec<String>>,
    /// Upper bound for a single RPC attempt against one endpoint.
    pub per_attempt_timeout: Duration,
    /// How many endpoints of a chain's list are tried before giving up.
    pub max_rpc_attempts: usize,
    pub breaker: BreakerConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut rpc_urls = HashMap::new();
        rpc_urls.insert(
            chains::ETHEREUM,
            vec![
                "https://ethereum-rpc.publicnode.com".to_string(),
                "https://eth.llamarpc.com".to_string(),
            ],
        );
        rpc_urls.insert(
            chains::OPTIMISM,
            vec![
                "https://optimism-rpc.publicnode.com".to_string(),
                "https://mainnet.optimism.io".to_string(),
            ],
        );
        rpc_urls.insert(
            chains::BASE,
            vec![
                "https://base-rpc.publicnode.com".to_string(),
                "https://mainnet.base.org".to_string(),
            ],
        );
        rpc_urls.insert(
            chains::ARBITRUM,
            vec![
                "https://arbitrum-one-rpc.publicnode.com".to_string(),
                "https://arb1.arbitrum.io/rpc".to_string(),
            ],
        );
        rpc_urls.insert(
            chains::ETHEREUM_SEPOLIA,
            vec!["https://ethereum-sepolia-rpc.publicnode.com".to_string()],
        );
        rpc_urls.insert(
            chains::OPTIMISM_SEPOLIA,
            vec!["https://optimism-sepolia-rpc.publicnode.com".to_string()],
        );
        rpc_urls.insert(
            chains::BASE_SEPOLIA,
            vec!["https://base-sepolia-rpc.publicnode.com".to_string()],
        );
        rpc_urls.insert(
            chains::ARBITRUM_SEPOLIA,
            vec!["https://arbitrum-sepolia-rpc.publicnode.com".to_string()],
        );

        Self {
            indexer_url: "https://bendystraw.xyz/graphql".to_string(),
            indexer_testnet_url: "https://testnet.bendystraw.xyz/graphql".to_string(),
            testnet_routes_to_mainnet: false,
            rpc_urls,
            per_attempt_timeout: Duration::from_secs(15),
            max_rpc_attempts: 3,
            breaker: BreakerConfig::default(),
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to the
    /// compiled-in defaults for anything unset.
    ///
    /// Recognized variables:
    /// - `TREASURY_INDEXER_URL` / `TREASURY_INDEXER_TESTNET_URL`
    /// - `TREASURY_TESTNET_TO_MAINNET` ("1"/"true")
    /// - `TREASURY_RPC_URLS_<chain_id>` (comma-separated, ordered by
    ///   fallback priority)
    /// - `TREASURY_RPC_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Config::default();

        if let Ok(url) = env::var("TREASURY_INDEXER_URL") {
            config.indexer_url = url;
        }
        if let Ok(url) = env::var("TREASURY_INDEXER_TESTNET_URL") {
            config.indexer_testnet_url = url;
        }
        if let Ok(flag) = env::var("TREASURY_TESTNET_TO_MAINNET") {
            config.testnet_routes_to_mainnet = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
        if let Ok(secs) = env::var("TREASURY_RPC_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                config.per_attempt_timeout = Duration::from_secs(secs);
            }
        }

        let known_chains: Vec<u64> = config.rpc_urls.keys().copied().collect();
        for chain_id in known_chains {
            if let Ok(urls) = env::var(format!("TREASURY_RPC_URLS_{}", chain_id)) {
                let urls: Vec<String> = urls
                    .split(',')
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .collect();
                if !urls.is_empty() {
                    config.rpc_urls.insert(chain_id, urls);
                }
            }
        }

        tracing::debug!(
            chains = config.rpc_urls.len(),
            testnet_to_mainnet = config.testnet_routes_to_mainnet,
            "Loaded treasury data layer config"
        );

        config
    }

    /// Ordered endpoint list for a chain, if any is configured.
    pub fn endpoints_for(&self, chain_id: u64) -> Option<&[String]> {
        self.rpc_urls.get(&chain_id).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_covers_known_chains() {
        let config = Config::default();
        for chain_id in [
            chains::ETHEREUM,
            chains::OPTIMISM,
            chains::BASE,
            chains::ARBITRUM,
        ] {
            assert!(
                config
                    .endpoints_for(chain_id)
                    .is_some_and(|urls| !urls.is_empty()),
                "chain {} should have default endpoints",
                chain_id
            );
        }
    }

    #[test]
    fn testnet_classification_covers_the_sepolias() {
        assert!(chains::is_testnet(chains::ETHEREUM_SEPOLIA));
        assert!(chains::is_testnet(chains::OPTIMISM_SEPOLIA));
        assert!(chains::is_testnet(chains::BASE_SEPOLIA));
        assert!(chains::is_testnet(chains::ARBITRUM_SEPOLIA));
        assert!(!chains::is_testnet(chains::OPTIMISM));
        assert!(!chains::is_testnet(chains::ETHEREUM));
    }
}
