//! Split groups and fund access limits.

use alloy::primitives::{Address, U256};

use crate::error::TreasuryError;

/// Denominator of split percents: 1_000_000_000 = 100%.
pub const SPLITS_TOTAL_PERCENT: u32 = 1_000_000_000;

/// A recipient allocation for payouts or reserved-token distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub prefer_add_to_balance: bool,
    /// Out of [`SPLITS_TOTAL_PERCENT`].
    pub percent: u32,
    /// Non-zero when the recipient is itself a project.
    pub project_id: u64,
    pub beneficiary: Address,
    /// The split cannot be removed or edited before this timestamp.
    pub locked_until: u64,
    /// Optional hook receiving a programmable callback instead of funds.
    pub hook: Address,
}

/// A validated split group. Percents sum to at most 100%; any remainder
/// implicitly accrues to the project owner.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitGroup {
    pub splits: Vec<Split>,
    /// Remainder out of [`SPLITS_TOTAL_PERCENT`] that goes to the owner.
    pub unallocated_percent: u32,
}

impl SplitGroup {
    pub fn from_splits(splits: Vec<Split>) -> Result<Self, TreasuryError> {
        let total: u64 = splits.iter().map(|s| s.percent as u64).sum();
        if total > SPLITS_TOTAL_PERCENT as u64 {
            return Err(TreasuryError::Decode(format!(
                "split group percents sum to {} (max {})",
                total, SPLITS_TOTAL_PERCENT
            )));
        }
        Ok(Self {
            unallocated_percent: SPLITS_TOTAL_PERCENT - total as u32,
            splits,
        })
    }
}

/// A `(amount, currency)` pair from the fund access limits store. Used for
/// both payout limits and surplus allowances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundAccessLimit {
    pub amount: U256,
    pub currency: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(percent: u32) -> Split {
        Split {
            prefer_add_to_balance: false,
            percent,
            project_id: 0,
            beneficiary: Address::ZERO,
            locked_until: 0,
            hook: Address::ZERO,
        }
    }

    #[test]
    fn remainder_accrues_to_owner() {
        let group = SplitGroup::from_splits(vec![split(600_000_000), split(250_000_000)]).unwrap();
        assert_eq!(group.unallocated_percent, 150_000_000);
    }

    #[test]
    fn full_allocation_leaves_nothing() {
        let group = SplitGroup::from_splits(vec![split(SPLITS_TOTAL_PERCENT)]).unwrap();
        assert_eq!(group.unallocated_percent, 0);
    }

    #[test]
    fn oversubscribed_group_is_rejected() {
        let result = SplitGroup::from_splits(vec![split(800_000_000), split(300_000_000)]);
        assert!(matches!(result, Err(TreasuryError::Decode(_))));
    }
}
