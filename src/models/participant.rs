//! Token holders, per chain and merged across a sucker group.

use alloy::primitives::U256;

/// An address's token balance for one project on one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub address: String,
    pub chain_id: u64,
    pub project_id: u64,
    pub balance: U256,
}

/// One logical holder across all chains of a sucker group. The same
/// address on two chains merges into a single entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupHolder {
    /// Lower-cased address (the merge key).
    pub address: String,
    /// Sum of per-chain balances.
    pub balance: U256,
    /// Each chain id the holder has balance on, once.
    pub chains: Vec<u64>,
    /// Share of the group's total token supply, percent.
    pub percent_of_supply: f64,
}
