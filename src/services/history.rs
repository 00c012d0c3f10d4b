//! Ruleset history reconstructor.
//!
//! On-chain, each ruleset only points backward at the ruleset it was based
//! on. Recovering a project's full timeline therefore means walking that
//! backward linked list to collect the distinct base configurations, then
//! expanding them into one entry per cycle, applying the per-cycle weight
//! decay. Past cycles are immutable once expanded, so finished timelines
//! go into the permanent cache.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use tracing::{debug, warn};

use crate::error::TreasuryError;
use crate::models::ruleset::{CycleStatus, ExpandedCycle, Ruleset};
use crate::services::cache::PermanentCache;
use crate::services::chain::ChainReader;
use crate::services::resolver::ContractSuite;

/// Bound on the based-on walk. A project that reconfigured more often than
/// this only loses the oldest configurations.
const MAX_BASE_HOPS: usize = 50;

const WEIGHT_CUT_DENOMINATOR: u32 = 1_000_000_000;

/// Largest integer `rust_decimal` can hold losslessly.
const MAX_DECIMAL_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

/// Effective weight `cycles_after_base` cycles after a base ruleset:
/// `weight * (1 - weight_cut_percent / 1e9) ^ n`, evaluated with 18
/// decimals of scale.
pub fn decayed_weight(weight: u128, weight_cut_percent: u32, cycles_after_base: u64) -> Decimal {
    let weight = Decimal::from_i128_with_scale(weight.min(MAX_DECIMAL_MANTISSA) as i128, 18);
    if weight_cut_percent == 0 || cycles_after_base == 0 {
        return weight;
    }
    let cut = Decimal::from(weight_cut_percent) / Decimal::from(WEIGHT_CUT_DENOMINATOR);
    weight * (Decimal::ONE - cut).powi(cycles_after_base as i64)
}

/// Expand base configurations into a per-cycle timeline.
///
/// `bases` must be the distinct base rulesets sorted ascending by
/// `cycle_number`. Cycles run from 1 to `current_cycle`; each picks the
/// latest base that had taken effect by then. Rulesets with `duration ==
/// 0` do not auto-advance and are never expanded past their own cycle.
/// Returns at most `max_history` entries, newest first, with the current
/// cycle marked [`CycleStatus::Current`].
pub fn expand_cycles(
    bases: &[Ruleset],
    current_cycle: u64,
    max_history: usize,
) -> Vec<ExpandedCycle> {
    if bases.is_empty() || current_cycle == 0 || max_history == 0 {
        return Vec::new();
    }

    let mut timeline = Vec::with_capacity(max_history.min(current_cycle as usize));
    let mut cycle = current_cycle;
    while cycle >= 1 && timeline.len() < max_history {
        let Some(base) = bases.iter().rev().find(|b| b.cycle_number <= cycle) else {
            break;
        };
        // Unbounded rulesets hold a single cycle open until manually
        // advanced; there are no time-derived cycles after them.
        if base.duration == 0 && cycle > base.cycle_number {
            cycle -= 1;
            continue;
        }
        let cycles_after_base = cycle - base.cycle_number;
        let start = base.start + cycles_after_base * base.duration as u64;
        timeline.push(ExpandedCycle {
            cycle_number: cycle,
            start,
            duration: base.duration,
            weight: decayed_weight(base.weight, base.weight_cut_percent, cycles_after_base),
            weight_cut_percent: base.weight_cut_percent,
            base_ruleset_id: base.id,
            status: if cycle == current_cycle {
                CycleStatus::Current
            } else {
                CycleStatus::Past
            },
        });
        cycle -= 1;
    }
    timeline
}

pub struct HistoryReconstructor {
    chain: Arc<ChainReader>,
    /// Keyed by `(chain_id, project_id, current_cycle, max_history)`:
    /// given the same current cycle and requested depth, the expansion is
    /// deterministic forever. Depth is part of the key so a shallow
    /// truncation is never served to a deeper request.
    cache: PermanentCache<(u64, u64, u64, usize), Vec<ExpandedCycle>>,
}

impl HistoryReconstructor {
    pub fn new(chain: Arc<ChainReader>) -> Self {
        Self {
            chain,
            cache: PermanentCache::new(),
        }
    }

    /// Reconstruct the per-cycle timeline for a project on one chain.
    /// Returns an empty timeline for projects with no ruleset.
    pub async fn reconstruct(
        &self,
        chain_id: u64,
        suite: &ContractSuite,
        project_id: u64,
        max_history: usize,
    ) -> Result<Vec<ExpandedCycle>, TreasuryError> {
        let Some(current) = self
            .chain
            .current_ruleset_of(chain_id, suite.rulesets, project_id)
            .await?
        else {
            return Ok(Vec::new());
        };
        let current = current.ruleset;

        let key = (chain_id, project_id, current.cycle_number, max_history);
        if let Some(timeline) = self.cache.get(&key).await {
            return Ok(timeline);
        }

        let bases = self
            .collect_bases(chain_id, suite, project_id, current.clone())
            .await?;
        let timeline = expand_cycles(&bases, current.cycle_number, max_history);

        debug!(
            chain_id,
            project_id,
            bases = bases.len(),
            cycles = timeline.len(),
            "Reconstructed ruleset history"
        );
        self.cache.insert(key, timeline.clone()).await;
        Ok(timeline)
    }

    /// Follow `based_on_id` backward to collect the distinct base
    /// configurations, oldest first.
    async fn collect_bases(
        &self,
        chain_id: u64,
        suite: &ContractSuite,
        project_id: u64,
        current: Ruleset,
    ) -> Result<Vec<Ruleset>, TreasuryError> {
        let mut seen: HashSet<u64> = HashSet::from([current.id]);
        let mut bases = vec![current];

        for _ in 0..MAX_BASE_HOPS {
            let based_on_id = bases.last().map(|b| b.based_on_id).unwrap_or(0);
            if based_on_id == 0 || seen.contains(&based_on_id) {
                break;
            }
            match self
                .chain
                .ruleset_of(chain_id, suite.rulesets, project_id, based_on_id)
                .await?
            {
                Some(base) => {
                    seen.insert(base.ruleset.id);
                    bases.push(base.ruleset);
                }
                None => {
                    warn!(
                        chain_id,
                        project_id, based_on_id, "Dangling based-on reference, stopping walk"
                    );
                    break;
                }
            }
        }

        bases.sort_by_key(|b| b.cycle_number);
        Ok(bases)
    }
}
