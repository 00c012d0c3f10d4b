//! Ruleset domain models: the time-boxed configuration epochs of a
//! project, their decoded metadata, and the expanded per-cycle timeline.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;

/// One ruleset record as stored on-chain. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    pub id: u64,
    /// Strictly increasing across a project's rulesets.
    pub cycle_number: u64,
    /// Epoch seconds at which the ruleset takes effect.
    pub start: u64,
    /// Cycle length in seconds. 0 = unbounded, advances only manually.
    pub duration: u32,
    /// Token-issuance rate numerator, 18 decimals.
    pub weight: u128,
    /// Per-cycle issuance decay, parts-per-billion.
    pub weight_cut_percent: u32,
    /// Back-reference to the ruleset this one was derived from.
    pub based_on_id: u64,
    pub approval_hook: Address,
    /// Raw packed metadata word, as read from the chain.
    pub metadata_word: U256,
}

/// A ruleset together with its decoded metadata word.
#[derive(Debug, Clone, PartialEq)]
pub struct RulesetWithMetadata {
    pub ruleset: Ruleset,
    pub metadata: RulesetMetadata,
}

/// Decoded form of the packed ruleset configuration word.
///
/// Field domains: `reserved_percent` and `cash_out_tax_rate` are basis
/// points (0-10000); `cash_out_tax_rate == 10000` disallows cash-outs
/// entirely, `0` is full linear redemption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulesetMetadata {
    pub reserved_percent: u16,
    pub cash_out_tax_rate: u16,
    pub base_currency: u32,
    pub pause_pay: bool,
    pub pause_credit_transfers: bool,
    pub allow_owner_minting: bool,
    pub allow_set_custom_token: bool,
    pub allow_terminal_migration: bool,
    pub allow_set_terminals: bool,
    pub allow_set_controller: bool,
    pub allow_add_accounting_context: bool,
    pub allow_add_price_feed: bool,
    pub owner_must_send_payouts: bool,
    pub hold_fees: bool,
    pub use_total_surplus_for_cash_outs: bool,
    pub use_data_hook_for_pay: bool,
    pub use_data_hook_for_cash_out: bool,
    pub data_hook: Address,
    /// Free-form 16-bit field forwarded to hooks.
    pub metadata: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Current,
    Past,
}

/// One entry of the reconstructed per-cycle timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedCycle {
    pub cycle_number: u64,
    /// Epoch seconds this cycle started (or starts).
    pub start: u64,
    pub duration: u32,
    /// Effective issuance weight after applying the per-cycle decay.
    pub weight: Decimal,
    pub weight_cut_percent: u32,
    /// Ruleset the cycle's configuration derives from.
    pub base_ruleset_id: u64,
    pub status: CycleStatus,
}
