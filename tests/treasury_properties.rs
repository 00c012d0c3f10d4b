//! End-to-end property checks over the public API: the packed metadata
//! codec, the payout/floor-price calculators, ruleset history expansion,
//! holder merging and the circuit breaker. Everything here is pure or
//! process-local; no network.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256, address};
use rust_decimal_macros::dec;

use omnitreasury::models::participant::Participant;
use omnitreasury::models::ruleset::{CycleStatus, Ruleset, RulesetMetadata};
use omnitreasury::services::aggregator::merge_holders;
use omnitreasury::services::breaker::{BreakerConfig, CallOutcome, CircuitBreaker, TracingSink};
use omnitreasury::services::history::expand_cycles;
use omnitreasury::services::metadata;
use omnitreasury::services::payouts::{
    UNLIMITED_PAYOUT_LIMIT, cash_out_value, distributable_payout,
};

fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
    CircuitBreaker::new(
        "test",
        BreakerConfig {
            failure_threshold: threshold,
            cooldown,
            backoff_factor: 2,
            max_cooldown: Duration::from_secs(60),
        },
        Arc::new(TracingSink),
    )
}

#[test]
fn metadata_codec_round_trips_a_fully_populated_record() {
    let record = RulesetMetadata {
        reserved_percent: 2_500,
        cash_out_tax_rate: 5_000,
        base_currency: 61_166,
        pause_pay: true,
        allow_owner_minting: true,
        allow_set_terminals: true,
        hold_fees: true,
        use_data_hook_for_cash_out: true,
        data_hook: address!("00000000000000000000000000000000000000ff"),
        metadata: 7,
        ..RulesetMetadata::default()
    };

    let word = metadata::encode(&record);
    let decoded = metadata::decode(word).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(metadata::encode(&decoded), word);
}

#[test]
fn metadata_rate_above_domain_is_a_decode_failure() {
    // cashOutTaxRate sits in bits 16..32.
    let word = U256::from(10_001u64) << 16;
    assert!(metadata::decode(word).is_err());
    assert!(metadata::decode(U256::from(10_000u64) << 16).is_ok());
}

#[test]
fn payout_availability_matrix() {
    let balance = U256::from(900u64);

    // limit == 0: disabled, regardless of used.
    assert_eq!(
        distributable_payout(U256::ZERO, U256::from(5u64), balance),
        U256::ZERO
    );
    // limit == max-uint224: unlimited, the terminal balance is available.
    assert_eq!(
        distributable_payout(UNLIMITED_PAYOUT_LIMIT, U256::from(5u64), balance),
        balance
    );
    // bounded: limit - used, clamped at zero.
    assert_eq!(
        distributable_payout(U256::from(100u64), U256::from(30u64), balance),
        U256::from(70u64)
    );
    assert_eq!(
        distributable_payout(U256::from(100u64), U256::from(130u64), balance),
        U256::ZERO
    );
}

#[test]
fn floor_price_matches_the_worked_example() {
    // balance = 1000, supply = 100, rate = 50%: redeeming 10 tokens
    // yields 0.1 * ((1 - 0.5) + 0.5 * 0.1) * 1000 = 55.
    let value = cash_out_value(10.0, 100.0, 1_000.0, 5_000).unwrap();
    assert!((value - 55.0).abs() < 1e-9);

    // Linear at rate 0, full balance for full redemption at any rate.
    assert!((cash_out_value(10.0, 100.0, 1_000.0, 0).unwrap() - 100.0).abs() < 1e-9);
    assert!((cash_out_value(100.0, 100.0, 1_000.0, 9_999).unwrap() - 1_000.0).abs() < 1e-6);

    // Degenerate inputs return zero, never a division error.
    assert_eq!(cash_out_value(10.0, 0.0, 1_000.0, 5_000).unwrap(), 0.0);
    assert_eq!(cash_out_value(10.0, 100.0, 0.0, 5_000).unwrap(), 0.0);
}

#[test]
fn history_weight_is_constant_without_a_cut_and_decreasing_with_one() {
    let ruleset = |cut: u32| Ruleset {
        id: 1,
        cycle_number: 1,
        start: 1_700_000_000,
        duration: 86_400,
        weight: 1_000_000_000_000_000_000,
        weight_cut_percent: cut,
        based_on_id: 0,
        approval_hook: Address::ZERO,
        metadata_word: U256::ZERO,
    };

    let flat = expand_cycles(&[ruleset(0)], 8, 100);
    assert_eq!(flat.len(), 8);
    assert!(flat.iter().all(|c| c.weight == dec!(1.0)));
    assert_eq!(flat[0].status, CycleStatus::Current);

    // 10% cut per cycle.
    let decaying = expand_cycles(&[ruleset(100_000_000)], 8, 100);
    for pair in decaying.windows(2) {
        assert!(pair[0].weight < pair[1].weight);
    }
    // One cycle after the base: 0.9 exactly.
    let second = decaying.iter().find(|c| c.cycle_number == 2).unwrap();
    assert_eq!(second.weight, dec!(0.90));
}

#[test]
fn holders_merge_across_chains_by_lowercased_address() {
    let holder = |chain_id: u64, address: &str, balance: u64| Participant {
        address: address.to_string(),
        chain_id,
        project_id: 1,
        balance: U256::from(balance),
    };

    let merged = merge_holders(
        vec![
            holder(1, "0xAb00000000000000000000000000000000000001", 70),
            holder(8453, "0xab00000000000000000000000000000000000001", 30),
            holder(8453, "0xab00000000000000000000000000000000000001", 10),
            holder(10, "0x0000000000000000000000000000000000000002", 5),
        ],
        U256::from(400u64),
    );

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].balance, U256::from(110u64));
    assert_eq!(merged[0].chains, vec![1, 8453]);
    assert!((merged[0].percent_of_supply - 27.5).abs() < 1e-9);
}

#[tokio::test]
async fn breaker_opens_after_threshold_and_allows_one_trial() {
    let breaker = breaker(2, Duration::from_millis(40));

    for _ in 0..2 {
        let outcome: CallOutcome<()> = breaker
            .call("op", serde_json::json!({}), || async {
                Err::<(), _>("boom")
            })
            .await;
        assert!(matches!(outcome, CallOutcome::Failure(_)));
    }

    // Open: short-circuits with a retry-after, no call attempted.
    let outcome: CallOutcome<u32> = breaker
        .call("op", serde_json::json!({}), || async { Ok::<_, String>(1) })
        .await;
    assert!(matches!(outcome, CallOutcome::CircuitOpen { .. }));

    // After the cooldown one trial is admitted; success closes the circuit.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let outcome: CallOutcome<u32> = breaker
        .call("op", serde_json::json!({}), || async { Ok::<_, String>(2) })
        .await;
    assert!(matches!(outcome, CallOutcome::Success(2)));

    let outcome: CallOutcome<u32> = breaker
        .call("op", serde_json::json!({}), || async { Ok::<_, String>(3) })
        .await;
    assert!(matches!(outcome, CallOutcome::Success(3)));
}
