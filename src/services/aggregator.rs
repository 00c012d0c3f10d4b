//! Sucker-group aggregator.
//!
//! A logical project is deliberately sharded across chains; this service
//! reassembles the pieces. Group totals come from the indexer's own
//! pre-aggregated fields whenever a group exists, since those already
//! account for unit/currency normalization the client cannot reliably
//! redo, and fall back to the seed project's own numbers for singletons.
//! Holder lists are fetched per chain, merged by lower-cased address.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::TreasuryError;
use crate::models::participant::{GroupHolder, Participant};
use crate::models::project::{Project, ProjectSnapshot, SuckerGroup};
use crate::services::cache::{ProjectKey, TtlCache};
use crate::services::chain::ChainReader;
use crate::services::indexer::ProjectIndex;
use crate::services::payouts::to_float;

/// Decimals take precedence over any explicit currency code: a 6-decimal
/// token is a stable unit even when the code claims otherwise, and an
/// 18-decimal token is not, even when the code claims USD.
pub fn is_stable_unit(decimals: u8, _currency_code: Option<u32>) -> bool {
    decimals == 6
}

/// Merge per-chain holder records into logical holders.
///
/// The same address on two chains is one holder whose balances add and
/// whose `chains` list carries each chain id once. Percentages are
/// computed against the group's total supply, not any per-chain supply.
pub fn merge_holders(participants: Vec<Participant>, group_supply: U256) -> Vec<GroupHolder> {
    let mut by_address: HashMap<String, GroupHolder> = HashMap::new();

    for participant in participants {
        let key = participant.address.to_lowercase();
        let entry = by_address.entry(key.clone()).or_insert_with(|| GroupHolder {
            address: key,
            balance: U256::ZERO,
            chains: Vec::new(),
            percent_of_supply: 0.0,
        });
        entry.balance = entry.balance.saturating_add(participant.balance);
        if !entry.chains.contains(&participant.chain_id) {
            entry.chains.push(participant.chain_id);
        }
    }

    let supply = to_float(group_supply);
    let mut holders: Vec<GroupHolder> = by_address
        .into_values()
        .map(|mut holder| {
            if supply > 0.0 {
                holder.percent_of_supply = to_float(holder.balance) / supply * 100.0;
            }
            holder
        })
        .collect();
    holders.sort_by(|a, b| b.balance.cmp(&a.balance));
    holders
}

/// Compose a snapshot from the seed project and its group, if any.
pub fn compose_snapshot(seed: Project, group: Option<SuckerGroup>) -> ProjectSnapshot {
    match group {
        Some(group) => {
            let members = if group.projects.is_empty() {
                vec![seed.clone()]
            } else {
                group.projects
            };
            ProjectSnapshot {
                chain_id: seed.chain_id,
                project_id: seed.project_id,
                sucker_group_id: Some(group.id),
                balance: group.balance,
                volume: group.volume,
                payments_count: group.payments_count,
                token_supply: group.token_supply,
                uses_stable_unit: members.iter().any(|m| is_stable_unit(m.decimals, None)),
                token_symbol: seed.erc20_symbol.clone(),
                token_decimals: seed.decimals,
                members,
            }
        }
        // No group anywhere: the project is a singleton and its own
        // numbers are the totals.
        None => ProjectSnapshot {
            chain_id: seed.chain_id,
            project_id: seed.project_id,
            sucker_group_id: None,
            balance: seed.balance,
            volume: seed.volume,
            payments_count: seed.payments_count,
            token_supply: seed.token_supply,
            uses_stable_unit: is_stable_unit(seed.decimals, None),
            token_symbol: seed.erc20_symbol.clone(),
            token_decimals: seed.decimals,
            members: vec![seed],
        },
    }
}

pub struct SuckerGroupAggregator {
    index: Arc<dyn ProjectIndex>,
    chain: Arc<ChainReader>,
    snapshots: TtlCache<ProjectKey, ProjectSnapshot>,
}

impl SuckerGroupAggregator {
    pub fn new(index: Arc<dyn ProjectIndex>, chain: Arc<ChainReader>, cache_ttl: Duration) -> Self {
        Self {
            index,
            chain,
            snapshots: TtlCache::new(cache_ttl),
        }
    }

    /// Cross-chain financial snapshot for the project. Fails only on
    /// load-bearing slots (the seed project lookup); the token symbol
    /// degrades to `None` when the chain read fails.
    pub async fn project_snapshot(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<ProjectSnapshot, TreasuryError> {
        let key = ProjectKey {
            chain_id,
            project_id,
        };
        if let Some(snapshot) = self.snapshots.get(&key).await {
            return Ok(snapshot);
        }

        let seed = self
            .index
            .project(chain_id, project_id)
            .await?
            .ok_or_else(|| {
                TreasuryError::NotFound(format!(
                    "project {} on chain {}",
                    project_id, chain_id
                ))
            })?;

        let group = match &seed.sucker_group_id {
            Some(group_id) => self.index.sucker_group(group_id).await?,
            None => None,
        };

        let mut snapshot = compose_snapshot(seed, group);

        // Non-load-bearing: fill the symbol from the chain when the
        // indexer does not have it yet.
        if snapshot.token_symbol.is_none() {
            if let Some(token) = snapshot
                .members
                .iter()
                .find(|m| m.chain_id == chain_id)
                .and_then(|m| m.erc20)
            {
                match self.chain.token_meta(chain_id, token).await {
                    Ok(meta) => snapshot.token_symbol = Some(meta.symbol),
                    Err(e) => {
                        warn!(chain_id, project_id, error = %e, "Token symbol unavailable");
                    }
                }
            }
        }

        debug!(
            chain_id,
            project_id,
            members = snapshot.members.len(),
            grouped = snapshot.sucker_group_id.is_some(),
            "Composed project snapshot"
        );
        self.snapshots.insert(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Logical holders across every chain of the project's group.
    ///
    /// Per-chain participant fetches run concurrently; a failed chain
    /// degrades to an empty slice for that chain (logged), it never fails
    /// the whole aggregation.
    pub async fn group_holders(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Vec<GroupHolder>, TreasuryError> {
        let snapshot = self.project_snapshot(chain_id, project_id).await?;

        let fetches = snapshot.members.iter().map(|member| {
            let index = Arc::clone(&self.index);
            let (member_chain, member_project) = (member.chain_id, member.project_id);
            async move {
                match index.participants(member_chain, member_project).await {
                    Ok(participants) => participants,
                    Err(e) => {
                        warn!(
                            chain_id = member_chain,
                            project_id = member_project,
                            error = %e,
                            "Participant fetch failed for chain, degrading to empty"
                        );
                        Vec::new()
                    }
                }
            }
        });

        let per_chain = join_all(fetches).await;
        let all: Vec<Participant> = per_chain.into_iter().flatten().collect();
        Ok(merge_holders(all, snapshot.token_supply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::breaker::{BreakerConfig, CircuitBreaker, TracingSink};
    use async_trait::async_trait;
    use std::collections::HashSet;

    fn project(chain_id: u64, project_id: u64, balance: u64, group: Option<&str>) -> Project {
        Project {
            project_id,
            chain_id,
            version: 4,
            owner: "0x1111111111111111111111111111111111111111".to_string(),
            balance: U256::from(balance),
            volume: U256::from(balance * 2),
            payments_count: 3,
            metadata_uri: None,
            sucker_group_id: group.map(str::to_string),
            erc20: None,
            erc20_symbol: Some("NANA".to_string()),
            token_supply: U256::from(1_000u64),
            decimals: 18,
        }
    }

    fn participant(chain_id: u64, address: &str, balance: u64) -> Participant {
        Participant {
            address: address.to_string(),
            chain_id,
            project_id: 1,
            balance: U256::from(balance),
        }
    }

    #[derive(Default)]
    struct StubIndex {
        projects: HashMap<(u64, u64), Project>,
        groups: HashMap<String, SuckerGroup>,
        participants: HashMap<(u64, u64), Vec<Participant>>,
        failing_chains: HashSet<u64>,
        project_calls: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl ProjectIndex for StubIndex {
        async fn project(
            &self,
            chain_id: u64,
            project_id: u64,
        ) -> Result<Option<Project>, TreasuryError> {
            self.project_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(self.projects.get(&(chain_id, project_id)).cloned())
        }

        async fn sucker_group(
            &self,
            group_id: &str,
        ) -> Result<Option<SuckerGroup>, TreasuryError> {
            Ok(self.groups.get(group_id).cloned())
        }

        async fn participants(
            &self,
            chain_id: u64,
            project_id: u64,
        ) -> Result<Vec<Participant>, TreasuryError> {
            if self.failing_chains.contains(&chain_id) {
                return Err(TreasuryError::Upstream("rpc down".to_string()));
            }
            Ok(self
                .participants
                .get(&(chain_id, project_id))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn aggregator_with(stub: Arc<StubIndex>) -> SuckerGroupAggregator {
        let config = Arc::new(Config::default());
        let breaker = Arc::new(CircuitBreaker::new(
            "rpc",
            BreakerConfig::default(),
            Arc::new(TracingSink),
        ));
        let chain = Arc::new(ChainReader::new(config, breaker));
        SuckerGroupAggregator::new(stub, chain, Duration::from_secs(60))
    }

    fn aggregator(stub: StubIndex) -> SuckerGroupAggregator {
        aggregator_with(Arc::new(stub))
    }

    #[test]
    fn merging_dedupes_addresses_case_insensitively() {
        let holders = merge_holders(
            vec![
                participant(1, "0xABcD000000000000000000000000000000000001", 60),
                participant(8453, "0xabcd000000000000000000000000000000000001", 40),
                participant(1, "0x0000000000000000000000000000000000000002", 25),
            ],
            U256::from(200u64),
        );

        assert_eq!(holders.len(), 2);
        let top = &holders[0];
        assert_eq!(top.balance, U256::from(100u64));
        assert_eq!(top.chains, vec![1, 8453]);
        assert!((top.percent_of_supply - 50.0).abs() < 1e-9);
        assert_eq!(holders[1].balance, U256::from(25u64));
    }

    #[test]
    fn same_chain_duplicates_keep_one_chain_entry() {
        let holders = merge_holders(
            vec![
                participant(1, "0xEE00000000000000000000000000000000000001", 10),
                participant(1, "0xee00000000000000000000000000000000000001", 5),
            ],
            U256::ZERO,
        );
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].chains, vec![1]);
        assert_eq!(holders[0].balance, U256::from(15u64));
    }

    #[test]
    fn group_totals_are_preferred_over_member_sums() {
        let seed = project(1, 7, 100, Some("g1"));
        let group = SuckerGroup {
            id: "g1".to_string(),
            // Deliberately not the sum of member balances: the indexer
            // normalized units the client cannot.
            balance: U256::from(512u64),
            volume: U256::from(1_024u64),
            payments_count: 9,
            token_supply: U256::from(5_000u64),
            projects: vec![seed.clone(), project(8453, 9, 300, Some("g1"))],
        };

        let snapshot = compose_snapshot(seed, Some(group));
        assert_eq!(snapshot.balance, U256::from(512u64));
        assert_eq!(snapshot.token_supply, U256::from(5_000u64));
        assert_eq!(snapshot.members.len(), 2);
        assert_eq!(snapshot.chain_ids(), vec![1, 8453]);
    }

    #[test]
    fn singleton_project_uses_its_own_totals() {
        let snapshot = compose_snapshot(project(10, 3, 77, None), None);
        assert_eq!(snapshot.sucker_group_id, None);
        assert_eq!(snapshot.balance, U256::from(77u64));
        assert_eq!(snapshot.members.len(), 1);
    }

    #[test]
    fn six_decimal_members_force_the_stable_unit() {
        assert!(is_stable_unit(6, Some(1)));
        assert!(is_stable_unit(6, None));
        // An explicit USD code does not override 18 decimals.
        assert!(!is_stable_unit(18, Some(2)));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let aggregator = aggregator(StubIndex::default());
        let err = aggregator.project_snapshot(1, 404).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn failed_chain_degrades_instead_of_failing_the_group() {
        let seed = project(1, 7, 100, Some("g1"));
        let other = project(8453, 9, 300, Some("g1"));
        let mut stub = StubIndex::default();
        stub.projects.insert((1, 7), seed.clone());
        stub.groups.insert(
            "g1".to_string(),
            SuckerGroup {
                id: "g1".to_string(),
                balance: U256::from(400u64),
                volume: U256::from(800u64),
                payments_count: 4,
                token_supply: U256::from(100u64),
                projects: vec![seed, other],
            },
        );
        stub.participants.insert(
            (1, 7),
            vec![participant(1, "0x00000000000000000000000000000000000000aa", 30)],
        );
        // Base's participant store is down.
        stub.failing_chains.insert(8453);

        let holders = aggregator(stub).group_holders(1, 7).await.unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].balance, U256::from(30u64));
        assert!((holders[0].percent_of_supply - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn snapshots_are_cached_until_ttl() {
        let mut stub = StubIndex::default();
        stub.projects.insert((1, 7), project(1, 7, 100, None));
        let stub = Arc::new(stub);
        let aggregator = aggregator_with(Arc::clone(&stub));

        let first = aggregator.project_snapshot(1, 7).await.unwrap();
        let second = aggregator.project_snapshot(1, 7).await.unwrap();
        assert_eq!(first, second);
        // The second call was served from the cache.
        assert_eq!(
            stub.project_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
