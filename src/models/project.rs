//! Project and sucker-group domain models.
//!
//! A `Project` is one deployment of the protocol on one chain; the same
//! logical treasury can be sharded across several chains and linked into a
//! `SuckerGroup` by the bridging mechanism. `(project_id, chain_id,
//! version)` uniquely identifies a project row from the indexer.

use alloy::primitives::{Address, U256};

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub project_id: u64,
    pub chain_id: u64,
    /// Contract generation this project row was indexed under.
    pub version: u32,
    pub owner: String,
    /// Treasury balance in the smallest unit of the accounting token.
    pub balance: U256,
    /// Lifetime payment volume in the smallest unit.
    pub volume: U256,
    pub payments_count: u64,
    pub metadata_uri: Option<String>,
    /// Sucker group this project belongs to, if it is bridged anywhere.
    pub sucker_group_id: Option<String>,
    /// Project ERC-20, once deployed.
    pub erc20: Option<Address>,
    pub erc20_symbol: Option<String>,
    /// Total project token supply on this chain, smallest unit.
    pub token_supply: U256,
    /// Accounting token decimals. 6 decimals is the stable-unit signal.
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuckerGroup {
    pub id: String,
    /// Pre-aggregated totals computed by the indexer. Preferred over
    /// summing members: they already account for unit normalization.
    pub balance: U256,
    pub volume: U256,
    pub payments_count: u64,
    pub token_supply: U256,
    pub projects: Vec<Project>,
}

/// Composed cross-chain financial view of one logical project, as returned
/// by the sucker-group aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSnapshot {
    /// The seed project the snapshot was requested for.
    pub chain_id: u64,
    pub project_id: u64,
    pub sucker_group_id: Option<String>,
    pub balance: U256,
    pub volume: U256,
    pub payments_count: u64,
    pub token_supply: U256,
    /// All member projects (the seed itself in the singleton case).
    pub members: Vec<Project>,
    pub token_symbol: Option<String>,
    /// Decimals of the project token, from the seed project's row.
    pub token_decimals: u8,
    /// True when the accounting asset is treated as a 6-decimal stable
    /// unit. Decimals take precedence over any explicit currency code.
    pub uses_stable_unit: bool,
}

impl ProjectSnapshot {
    /// Chain ids the logical project is deployed on.
    pub fn chain_ids(&self) -> Vec<u64> {
        self.members.iter().map(|p| p.chain_id).collect()
    }
}
