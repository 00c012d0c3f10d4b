// src/lib.rs

//! Multi-chain treasury data layer.
//!
//! Read-only derivation layer over an on-chain crowdfunding/treasury
//! protocol and its GraphQL indexer: resolves which contract generation
//! governs a project, decodes packed ruleset configuration, reconstructs
//! per-cycle history, aggregates sucker groups across chains, and computes
//! payout availability and bonding-curve floor prices. All outbound calls
//! pass through per-dependency circuit breakers.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use tracing::warn;

use crate::config::Config;
use crate::error::TreasuryError;
use crate::models::event::ActivityEvent;
use crate::models::participant::GroupHolder;
use crate::models::project::ProjectSnapshot;
use crate::models::ruleset::{ExpandedCycle, RulesetWithMetadata};
use crate::models::split::{FundAccessLimit, SplitGroup};
use crate::services::aggregator::SuckerGroupAggregator;
use crate::services::breaker::{CircuitBreaker, FailureSink, TracingSink};
use crate::services::chain::{self, ChainReader};
use crate::services::history::HistoryReconstructor;
use crate::services::indexer::IndexerClient;
use crate::services::payouts;
use crate::services::resolver::{ContractResolver, ContractSuite};

pub mod config;
pub mod error;

pub mod models {
    pub mod event;
    pub mod participant;
    pub mod project;
    pub mod ruleset;
    pub mod split;
}

pub mod services {
    pub mod aggregator;
    pub mod breaker;
    pub mod cache;
    pub mod chain;
    pub mod history;
    pub mod indexer;
    pub mod metadata;
    pub mod payouts;
    pub mod resolver;
    pub mod rpc;
}

/// How long a resolved contract suite stays cached. Projects migrate
/// controllers rarely; minutes of staleness is acceptable.
const SUITE_CACHE_TTL: Duration = Duration::from_secs(300);

/// How long a composed financial snapshot stays cached.
const SNAPSHOT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Composed treasury view for one project on one chain.
#[derive(Debug, Clone)]
pub struct TreasuryOverview {
    pub snapshot: ProjectSnapshot,
    pub suite: ContractSuite,
    /// `None` when the project has no ruleset yet.
    pub current_ruleset: Option<RulesetWithMetadata>,
    /// The payout limit matching the ruleset's base currency, if one is
    /// configured.
    pub payout_limit: Option<FundAccessLimit>,
    /// Remaining distributable payout. `None` when the limit, usage, or
    /// terminal balance could not be read.
    pub distributable_payout: Option<U256>,
    /// Cash-out value of one whole token, in raw treasury units.
    pub floor_price_per_token: f64,
    /// Newest first; empty when `max_history` was 0 or no ruleset exists.
    pub history: Vec<ExpandedCycle>,
}

/// Entry point composing every service of the layer.
///
/// Two independent circuit breakers guard the two failure domains: one for
/// the GraphQL indexer, one for RPC calls. Construction is cheap and
/// non-blocking; nothing talks to the network until a query method runs.
pub struct TreasuryClient {
    config: Arc<Config>,
    indexer: Arc<IndexerClient>,
    chain: Arc<ChainReader>,
    resolver: ContractResolver,
    history: HistoryReconstructor,
    aggregator: SuckerGroupAggregator,
}

impl TreasuryClient {
    pub fn new(config: Config) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Build with a custom failure sink receiving breaker failure records.
    pub fn with_sink(config: Config, sink: Arc<dyn FailureSink>) -> Self {
        let config = Arc::new(config);
        let indexer_breaker = Arc::new(CircuitBreaker::new(
            "indexer",
            config.breaker.clone(),
            Arc::clone(&sink),
        ));
        let rpc_breaker = Arc::new(CircuitBreaker::new("rpc", config.breaker.clone(), sink));

        let indexer = Arc::new(IndexerClient::new(Arc::clone(&config), indexer_breaker));
        let chain = Arc::new(ChainReader::new(Arc::clone(&config), rpc_breaker));

        Self {
            resolver: ContractResolver::new(Arc::clone(&chain), SUITE_CACHE_TTL),
            history: HistoryReconstructor::new(Arc::clone(&chain)),
            aggregator: SuckerGroupAggregator::new(
                Arc::clone(&indexer) as Arc<dyn services::indexer::ProjectIndex>,
                Arc::clone(&chain),
                SNAPSHOT_CACHE_TTL,
            ),
            config,
            indexer,
            chain,
        }
    }

    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cross-chain financial snapshot for a project.
    pub async fn project_snapshot(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<ProjectSnapshot, TreasuryError> {
        self.aggregator.project_snapshot(chain_id, project_id).await
    }

    /// Token holders merged across every chain of the project's group.
    pub async fn group_holders(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Vec<GroupHolder>, TreasuryError> {
        self.aggregator.group_holders(chain_id, project_id).await
    }

    /// The contract suite governing a project, resolved from the on-chain
    /// directory. Infallible: degraded reads fall back to the default.
    pub async fn contract_suite(&self, chain_id: u64, project_id: u64) -> ContractSuite {
        self.resolver.resolve(chain_id, project_id).await
    }

    /// Per-cycle ruleset timeline, newest first.
    pub async fn ruleset_history(
        &self,
        chain_id: u64,
        project_id: u64,
        max_history: usize,
    ) -> Result<Vec<ExpandedCycle>, TreasuryError> {
        let suite = self.resolver.resolve(chain_id, project_id).await;
        self.history
            .reconstruct(chain_id, &suite, project_id, max_history)
            .await
    }

    /// Payout recipients of the project's current ruleset, for the native
    /// accounting token.
    pub async fn payout_splits(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<SplitGroup, TreasuryError> {
        let (suite, ruleset) = self.current_ruleset(chain_id, project_id).await?;
        let Some(ruleset) = ruleset else {
            return SplitGroup::from_splits(Vec::new());
        };
        self.chain
            .splits_of(
                chain_id,
                suite.splits,
                project_id,
                ruleset.ruleset.id,
                chain::payout_group(chain::NATIVE_TOKEN),
            )
            .await
    }

    /// Reserved-token recipients of the project's current ruleset.
    pub async fn reserved_token_splits(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<SplitGroup, TreasuryError> {
        let (suite, ruleset) = self.current_ruleset(chain_id, project_id).await?;
        let Some(ruleset) = ruleset else {
            return SplitGroup::from_splits(Vec::new());
        };
        self.chain
            .splits_of(
                chain_id,
                suite.splits,
                project_id,
                ruleset.ruleset.id,
                chain::reserved_tokens_group(),
            )
            .await
    }

    /// Surplus allowances configured for the project's current ruleset.
    pub async fn surplus_allowances(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Vec<FundAccessLimit>, TreasuryError> {
        let (suite, ruleset) = self.current_ruleset(chain_id, project_id).await?;
        let Some(ruleset) = ruleset else {
            return Ok(Vec::new());
        };
        self.chain
            .surplus_allowances_of(
                chain_id,
                suite.fund_access_limits,
                project_id,
                ruleset.ruleset.id,
                suite.terminal,
                chain::NATIVE_TOKEN,
            )
            .await
    }

    /// Most recent payments to a project, newest first.
    pub async fn recent_pay_events(
        &self,
        chain_id: u64,
        project_id: u64,
        limit: u32,
    ) -> Result<Vec<ActivityEvent>, TreasuryError> {
        self.indexer
            .recent_pay_events(chain_id, project_id, limit)
            .await
    }

    /// Full paginated activity feed for a project.
    pub async fn activity_events(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Vec<ActivityEvent>, TreasuryError> {
        self.indexer.activity_events(chain_id, project_id).await
    }

    /// Cash-out value for redeeming `tokens_to_redeem` raw token units
    /// against the project's current treasury, in raw treasury units.
    pub async fn cash_out_quote(
        &self,
        chain_id: u64,
        project_id: u64,
        tokens_to_redeem: U256,
    ) -> Result<f64, TreasuryError> {
        let (snapshot, suite) = tokio::join!(
            self.aggregator.project_snapshot(chain_id, project_id),
            self.resolver.resolve(chain_id, project_id),
        );
        let snapshot = snapshot?;
        let Some(ruleset) = self
            .chain
            .current_ruleset_of(chain_id, suite.rulesets, project_id)
            .await?
        else {
            return Ok(0.0);
        };
        payouts::cash_out_value(
            payouts::to_float(tokens_to_redeem),
            payouts::to_float(snapshot.token_supply),
            payouts::to_float(snapshot.balance),
            ruleset.metadata.cash_out_tax_rate,
        )
    }

    /// The composed treasury view: snapshot, governing contracts, current
    /// ruleset, payout availability, floor price, and optionally history.
    ///
    /// Load-bearing slots (snapshot, current ruleset) surface their
    /// errors. Payout availability degrades to `None` and history to an
    /// empty timeline, each with a logged warning, when their reads fail.
    pub async fn treasury_overview(
        &self,
        chain_id: u64,
        project_id: u64,
        max_history: usize,
    ) -> Result<TreasuryOverview, TreasuryError> {
        let (snapshot, suite) = tokio::join!(
            self.aggregator.project_snapshot(chain_id, project_id),
            self.resolver.resolve(chain_id, project_id),
        );
        let snapshot = snapshot?;

        let current_ruleset = self
            .chain
            .current_ruleset_of(chain_id, suite.rulesets, project_id)
            .await?;

        let (payout_limit, distributable_payout) = match &current_ruleset {
            Some(current) => {
                self.payout_availability(chain_id, &suite, project_id, current)
                    .await
            }
            None => (None, None),
        };

        let floor_price_per_token = match &current_ruleset {
            Some(current) => payouts::cash_out_value(
                10f64.powi(snapshot.token_decimals as i32),
                payouts::to_float(snapshot.token_supply),
                payouts::to_float(snapshot.balance),
                current.metadata.cash_out_tax_rate,
            )?,
            None => 0.0,
        };

        let history = if max_history > 0 {
            degraded_history(
                chain_id,
                project_id,
                self.history
                    .reconstruct(chain_id, &suite, project_id, max_history)
                    .await,
            )
        } else {
            Vec::new()
        };

        Ok(TreasuryOverview {
            snapshot,
            suite,
            current_ruleset,
            payout_limit,
            distributable_payout,
            floor_price_per_token,
            history,
        })
    }

    async fn current_ruleset(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<(ContractSuite, Option<RulesetWithMetadata>), TreasuryError> {
        let suite = self.resolver.resolve(chain_id, project_id).await;
        let ruleset = self
            .chain
            .current_ruleset_of(chain_id, suite.rulesets, project_id)
            .await?;
        Ok((suite, ruleset))
    }

    /// The payout limit matching the ruleset's base currency plus the
    /// remaining distributable amount under it. Any failed read degrades
    /// to `None` rather than failing the overview.
    async fn payout_availability(
        &self,
        chain_id: u64,
        suite: &ContractSuite,
        project_id: u64,
        current: &RulesetWithMetadata,
    ) -> (Option<FundAccessLimit>, Option<U256>) {
        let limits = match self
            .chain
            .payout_limits_of(
                chain_id,
                suite.fund_access_limits,
                project_id,
                current.ruleset.id,
                suite.terminal,
                chain::NATIVE_TOKEN,
            )
            .await
        {
            Ok(limits) => limits,
            Err(e) => {
                warn!(chain_id, project_id, error = %e, "Payout limits unavailable");
                return (None, None);
            }
        };

        let Some(limit) = limits
            .iter()
            .find(|l| l.currency == current.metadata.base_currency)
            .or_else(|| limits.first())
            .copied()
        else {
            return (None, None);
        };

        let (used, balance) = tokio::join!(
            self.chain.used_payout_limit(
                chain_id,
                suite.terminal_store,
                suite.terminal,
                project_id,
                chain::NATIVE_TOKEN,
                current.ruleset.cycle_number,
                limit.currency,
            ),
            self.chain.terminal_balance(
                chain_id,
                suite.terminal_store,
                suite.terminal,
                project_id,
                chain::NATIVE_TOKEN,
            ),
        );

        match (used, balance) {
            (Ok(used), Ok(balance)) => (
                Some(limit),
                Some(payouts::distributable_payout(limit.amount, used, balance)),
            ),
            (used, balance) => {
                if let Err(e) = &used {
                    warn!(chain_id, project_id, error = %e, "Used payout limit unavailable");
                }
                if let Err(e) = &balance {
                    warn!(chain_id, project_id, error = %e, "Terminal balance unavailable");
                }
                (Some(limit), None)
            }
        }
    }
}

/// History is informational in the overview: a failed based-on walk
/// degrades to an empty timeline instead of failing the slots that
/// already succeeded.
fn degraded_history(
    chain_id: u64,
    project_id: u64,
    result: Result<Vec<ExpandedCycle>, TreasuryError>,
) -> Vec<ExpandedCycle> {
    match result {
        Ok(history) => history,
        Err(e) => {
            warn!(chain_id, project_id, error = %e, "History reconstruction unavailable");
            Vec::new()
        }
    }
}
