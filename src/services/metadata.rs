//! Ruleset metadata codec.
//!
//! Each on-chain ruleset carries a single 256-bit configuration word.
//! Layout (bit offsets from the low end):
//!
//! ```text
//!   0..16    reservedPercent        (basis points)
//!   16..32   cashOutTaxRate         (basis points, must be <= 10000)
//!   32..64   baseCurrency
//!   64..78   capability flags, one bit each
//!   80..240  dataHook address
//!   240..256 auxiliary metadata forwarded to hooks
//! ```
//!
//! Decoding is pure and total except for the basis-point range check on
//! `cashOutTaxRate`: out-of-domain values are a decode failure, never
//! clamped. Encoding is the exact bitwise inverse.

use alloy::primitives::{Address, U256};

use crate::error::TreasuryError;
use crate::models::ruleset::RulesetMetadata;

pub const MAX_CASH_OUT_TAX_RATE: u16 = 10_000;

const FLAGS_OFFSET: usize = 64;
const DATA_HOOK_OFFSET: usize = 80;
const AUX_METADATA_OFFSET: usize = 240;
const FLAG_COUNT: usize = 14;

pub fn decode(word: U256) -> Result<RulesetMetadata, TreasuryError> {
    let reserved_percent = (word & U256::from(0xFFFFu64)).to::<u16>();
    let cash_out_tax_rate = ((word >> 16usize) & U256::from(0xFFFFu64)).to::<u16>();
    if cash_out_tax_rate > MAX_CASH_OUT_TAX_RATE {
        return Err(TreasuryError::Decode(format!(
            "cashOutTaxRate {} exceeds {} basis points",
            cash_out_tax_rate, MAX_CASH_OUT_TAX_RATE
        )));
    }
    let base_currency = ((word >> 32usize) & U256::from(0xFFFF_FFFFu64)).to::<u32>();

    let flag = |index: usize| word.bit(FLAGS_OFFSET + index);

    let address_mask = (U256::from(1) << 160usize) - U256::from(1);
    let hook_word = (word >> DATA_HOOK_OFFSET) & address_mask;
    let data_hook = Address::from_slice(&hook_word.to_be_bytes::<32>()[12..]);

    let metadata = (word >> AUX_METADATA_OFFSET).to::<u16>();

    Ok(RulesetMetadata {
        reserved_percent,
        cash_out_tax_rate,
        base_currency,
        pause_pay: flag(0),
        pause_credit_transfers: flag(1),
        allow_owner_minting: flag(2),
        allow_set_custom_token: flag(3),
        allow_terminal_migration: flag(4),
        allow_set_terminals: flag(5),
        allow_set_controller: flag(6),
        allow_add_accounting_context: flag(7),
        allow_add_price_feed: flag(8),
        owner_must_send_payouts: flag(9),
        hold_fees: flag(10),
        use_total_surplus_for_cash_outs: flag(11),
        use_data_hook_for_pay: flag(12),
        use_data_hook_for_cash_out: flag(13),
        data_hook,
        metadata,
    })
}

pub fn encode(metadata: &RulesetMetadata) -> U256 {
    let flags = [
        metadata.pause_pay,
        metadata.pause_credit_transfers,
        metadata.allow_owner_minting,
        metadata.allow_set_custom_token,
        metadata.allow_terminal_migration,
        metadata.allow_set_terminals,
        metadata.allow_set_controller,
        metadata.allow_add_accounting_context,
        metadata.allow_add_price_feed,
        metadata.owner_must_send_payouts,
        metadata.hold_fees,
        metadata.use_total_surplus_for_cash_outs,
        metadata.use_data_hook_for_pay,
        metadata.use_data_hook_for_cash_out,
    ];
    debug_assert_eq!(flags.len(), FLAG_COUNT);

    let mut word = U256::from(metadata.reserved_percent);
    word |= U256::from(metadata.cash_out_tax_rate) << 16usize;
    word |= U256::from(metadata.base_currency) << 32usize;
    for (index, set) in flags.iter().enumerate() {
        if *set {
            word |= U256::from(1) << (FLAGS_OFFSET + index);
        }
    }
    word |= U256::from_be_slice(metadata.data_hook.as_slice()) << DATA_HOOK_OFFSET;
    word |= U256::from(metadata.metadata) << AUX_METADATA_OFFSET;
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn sample() -> RulesetMetadata {
        RulesetMetadata {
            reserved_percent: 5_000,
            cash_out_tax_rate: 2_500,
            base_currency: 2,
            pause_pay: true,
            allow_owner_minting: true,
            hold_fees: true,
            use_data_hook_for_cash_out: true,
            data_hook: address!("00000000000000000000000000000000000000aa"),
            metadata: 0x0102,
            ..Default::default()
        }
    }

    #[test]
    fn round_trips_record_to_word_and_back() {
        let original = sample();
        let word = encode(&original);
        let decoded = decode(word).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn round_trips_word_to_record_and_back() {
        let word = encode(&sample());
        let reencoded = encode(&decode(word).unwrap());
        assert_eq!(reencoded, word);
    }

    #[test]
    fn fields_land_at_fixed_offsets() {
        let word = encode(&sample());
        assert_eq!((word & U256::from(0xFFFFu64)).to::<u16>(), 5_000);
        assert_eq!(((word >> 16usize) & U256::from(0xFFFFu64)).to::<u16>(), 2_500);
        assert_eq!(((word >> 32usize) & U256::from(0xFFFF_FFFFu64)).to::<u32>(), 2);
        // pause_pay is the first flag bit.
        assert!(word.bit(64));
        // pause_credit_transfers is unset.
        assert!(!word.bit(65));
        assert_eq!((word >> 240usize).to::<u16>(), 0x0102);
    }

    #[test]
    fn zero_word_decodes_to_defaults() {
        let decoded = decode(U256::ZERO).unwrap();
        assert_eq!(decoded, RulesetMetadata::default());
    }

    #[test]
    fn full_cash_out_tax_rate_is_valid() {
        let mut metadata = sample();
        metadata.cash_out_tax_rate = MAX_CASH_OUT_TAX_RATE;
        let decoded = decode(encode(&metadata)).unwrap();
        assert_eq!(decoded.cash_out_tax_rate, MAX_CASH_OUT_TAX_RATE);
    }

    #[test]
    fn out_of_domain_cash_out_tax_rate_is_rejected_not_clamped() {
        // Craft a word with cashOutTaxRate = 10001 directly.
        let word = U256::from(10_001u64) << 16usize;
        match decode(word) {
            Err(TreasuryError::Decode(msg)) => assert!(msg.contains("10001")),
            other => panic!("expected decode failure, got {:?}", other),
        }
    }
}
