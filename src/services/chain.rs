//! On-chain reader.
//!
//! Read-only contract calls against the small fixed ABI surface the data
//! layer needs: directory lookups, ruleset lookups, splits, fund access
//! limits, terminal balances and ERC-20 metadata. Every call goes through
//! the RPC circuit breaker and the per-chain endpoint fallback policy.

use std::sync::Arc;

use alloy::primitives::{Address, U256, address};
use alloy::sol;

use crate::config::Config;
use crate::error::TreasuryError;
use crate::models::ruleset::{Ruleset, RulesetWithMetadata};
use crate::models::split::{FundAccessLimit, Split, SplitGroup};
use crate::services::breaker::CircuitBreaker;
use crate::services::metadata;
use crate::services::rpc::{self, BoxError, RetryPolicy};

/// Address the terminals use to denote the chain's native token.
pub const NATIVE_TOKEN: Address = address!("000000000000000000000000000000000000eeee");

/// Split group id for reserved-token distribution.
pub fn reserved_tokens_group() -> U256 {
    U256::from(1u64)
}

/// Split group id for payouts of a given accounting token.
pub fn payout_group(token: Address) -> U256 {
    U256::from_be_slice(token.as_slice())
}

sol! {
    #[sol(rpc)]
    interface IJBDirectory {
        function controllerOf(uint256 projectId) external view returns (address);
        function primaryTerminalOf(uint256 projectId, address token) external view returns (address);
    }
}

sol! {
    struct JBRulesetData {
        uint48 cycleNumber;
        uint48 id;
        uint48 basedOnId;
        uint48 start;
        uint32 duration;
        uint112 weight;
        uint32 weightCutPercent;
        address approvalHook;
        uint256 metadata;
    }

    #[sol(rpc)]
    interface IJBRulesets {
        function currentOf(uint256 projectId) external view returns (JBRulesetData memory);
        function getRulesetOf(uint256 projectId, uint256 rulesetId) external view returns (JBRulesetData memory);
    }
}

sol! {
    struct JBSplitData {
        bool preferAddToBalance;
        uint32 percent;
        uint64 projectId;
        address beneficiary;
        uint48 lockedUntil;
        address hook;
    }

    #[sol(rpc)]
    interface IJBSplits {
        function splitsOf(uint256 projectId, uint256 rulesetId, uint256 groupId) external view returns (JBSplitData[] memory);
    }
}

sol! {
    struct JBCurrencyAmount {
        uint224 amount;
        uint32 currency;
    }

    #[sol(rpc)]
    interface IJBFundAccessLimits {
        function payoutLimitsOf(uint256 projectId, uint256 rulesetId, address terminal, address token) external view returns (JBCurrencyAmount[] memory);
        function surplusAllowancesOf(uint256 projectId, uint256 rulesetId, address terminal, address token) external view returns (JBCurrencyAmount[] memory);
    }
}

sol! {
    #[sol(rpc)]
    interface IJBTerminalStore {
        function balanceOf(address terminal, uint256 projectId, address token) external view returns (uint256);
        function usedPayoutLimitOf(address terminal, uint256 projectId, address token, uint256 rulesetCycleNumber, uint256 currency) external view returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20Meta {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
    }
}

/// ERC-20 metadata needed for snapshot composition.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

pub struct ChainReader {
    config: Arc<Config>,
    breaker: Arc<CircuitBreaker>,
}

impl ChainReader {
    pub fn new(config: Arc<Config>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { config, breaker }
    }

    /// Directory pointer: which controller governs this project.
    pub async fn controller_of(
        &self,
        chain_id: u64,
        directory: Address,
        project_id: u64,
    ) -> Result<Address, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        self.breaker
            .call(
                "directory.controllerOf",
                serde_json::json!({ "chainId": chain_id, "projectId": project_id }),
                || {
                    rpc::try_each(&policy, "directory.controllerOf", move |provider| async move {
                        IJBDirectory::new(directory, provider)
                            .controllerOf(U256::from(project_id))
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)
                    })
                },
            )
            .await
            .into_result()
    }

    /// The ruleset currently in effect. `None` when the project has never
    /// queued one on this chain.
    pub async fn current_ruleset_of(
        &self,
        chain_id: u64,
        rulesets: Address,
        project_id: u64,
    ) -> Result<Option<RulesetWithMetadata>, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        let raw = self
            .breaker
            .call(
                "rulesets.currentOf",
                serde_json::json!({ "chainId": chain_id, "projectId": project_id }),
                || {
                    rpc::try_each(&policy, "rulesets.currentOf", move |provider| async move {
                        IJBRulesets::new(rulesets, provider)
                            .currentOf(U256::from(project_id))
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)
                    })
                },
            )
            .await
            .into_result()?;

        decode_ruleset(raw)
    }

    /// A specific ruleset by id, used when walking the based-on chain.
    pub async fn ruleset_of(
        &self,
        chain_id: u64,
        rulesets: Address,
        project_id: u64,
        ruleset_id: u64,
    ) -> Result<Option<RulesetWithMetadata>, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        let raw = self
            .breaker
            .call(
                "rulesets.getRulesetOf",
                serde_json::json!({
                    "chainId": chain_id,
                    "projectId": project_id,
                    "rulesetId": ruleset_id,
                }),
                || {
                    rpc::try_each(&policy, "rulesets.getRulesetOf", move |provider| async move {
                        IJBRulesets::new(rulesets, provider)
                            .getRulesetOf(U256::from(project_id), U256::from(ruleset_id))
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)
                    })
                },
            )
            .await
            .into_result()?;

        decode_ruleset(raw)
    }

    /// Splits configured for one `(ruleset, group)` pair, validated as a
    /// group (sum of percents capped at 100%).
    pub async fn splits_of(
        &self,
        chain_id: u64,
        splits_store: Address,
        project_id: u64,
        ruleset_id: u64,
        group: U256,
    ) -> Result<SplitGroup, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        let raw = self
            .breaker
            .call(
                "splits.splitsOf",
                serde_json::json!({
                    "chainId": chain_id,
                    "projectId": project_id,
                    "rulesetId": ruleset_id,
                    "group": group.to_string(),
                }),
                || {
                    rpc::try_each(&policy, "splits.splitsOf", move |provider| async move {
                        IJBSplits::new(splits_store, provider)
                            .splitsOf(U256::from(project_id), U256::from(ruleset_id), group)
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)
                    })
                },
            )
            .await
            .into_result()?;

        let splits = raw
            .into_iter()
            .map(|s| Split {
                prefer_add_to_balance: s.preferAddToBalance,
                percent: s.percent,
                project_id: s.projectId,
                beneficiary: s.beneficiary,
                locked_until: s.lockedUntil.to::<u64>(),
                hook: s.hook,
            })
            .collect();
        SplitGroup::from_splits(splits)
    }

    pub async fn payout_limits_of(
        &self,
        chain_id: u64,
        fund_access_limits: Address,
        project_id: u64,
        ruleset_id: u64,
        terminal: Address,
        token: Address,
    ) -> Result<Vec<FundAccessLimit>, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        let raw = self
            .breaker
            .call(
                "fundAccess.payoutLimitsOf",
                serde_json::json!({
                    "chainId": chain_id,
                    "projectId": project_id,
                    "rulesetId": ruleset_id,
                }),
                || {
                    rpc::try_each(&policy, "fundAccess.payoutLimitsOf", move |provider| async move {
                        IJBFundAccessLimits::new(fund_access_limits, provider)
                            .payoutLimitsOf(
                                U256::from(project_id),
                                U256::from(ruleset_id),
                                terminal,
                                token,
                            )
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)
                    })
                },
            )
            .await
            .into_result()?;

        Ok(raw.into_iter().map(convert_currency_amount).collect())
    }

    pub async fn surplus_allowances_of(
        &self,
        chain_id: u64,
        fund_access_limits: Address,
        project_id: u64,
        ruleset_id: u64,
        terminal: Address,
        token: Address,
    ) -> Result<Vec<FundAccessLimit>, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        let raw = self
            .breaker
            .call(
                "fundAccess.surplusAllowancesOf",
                serde_json::json!({
                    "chainId": chain_id,
                    "projectId": project_id,
                    "rulesetId": ruleset_id,
                }),
                || {
                    rpc::try_each(
                        &policy,
                        "fundAccess.surplusAllowancesOf",
                        move |provider| async move {
                            IJBFundAccessLimits::new(fund_access_limits, provider)
                                .surplusAllowancesOf(
                                    U256::from(project_id),
                                    U256::from(ruleset_id),
                                    terminal,
                                    token,
                                )
                                .call()
                                .await
                                .map(|r| r._0)
                                .map_err(|e| Box::new(e) as BoxError)
                        },
                    )
                },
            )
            .await
            .into_result()?;

        Ok(raw.into_iter().map(convert_currency_amount).collect())
    }

    /// Funds held by a terminal for a project, in the token's smallest
    /// unit. Fetched separately for the unlimited-payout case.
    pub async fn terminal_balance(
        &self,
        chain_id: u64,
        terminal_store: Address,
        terminal: Address,
        project_id: u64,
        token: Address,
    ) -> Result<U256, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        self.breaker
            .call(
                "terminalStore.balanceOf",
                serde_json::json!({ "chainId": chain_id, "projectId": project_id }),
                || {
                    rpc::try_each(&policy, "terminalStore.balanceOf", move |provider| async move {
                        IJBTerminalStore::new(terminal_store, provider)
                            .balanceOf(terminal, U256::from(project_id), token)
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)
                    })
                },
            )
            .await
            .into_result()
    }

    /// How much of the payout limit this ruleset has already sent out.
    pub async fn used_payout_limit(
        &self,
        chain_id: u64,
        terminal_store: Address,
        terminal: Address,
        project_id: u64,
        token: Address,
        ruleset_cycle_number: u64,
        currency: u32,
    ) -> Result<U256, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        self.breaker
            .call(
                "terminalStore.usedPayoutLimitOf",
                serde_json::json!({
                    "chainId": chain_id,
                    "projectId": project_id,
                    "cycleNumber": ruleset_cycle_number,
                    "currency": currency,
                }),
                || {
                    rpc::try_each(
                        &policy,
                        "terminalStore.usedPayoutLimitOf",
                        move |provider| async move {
                            IJBTerminalStore::new(terminal_store, provider)
                                .usedPayoutLimitOf(
                                    terminal,
                                    U256::from(project_id),
                                    token,
                                    U256::from(ruleset_cycle_number),
                                    U256::from(currency),
                                )
                                .call()
                                .await
                                .map(|r| r._0)
                                .map_err(|e| Box::new(e) as BoxError)
                        },
                    )
                },
            )
            .await
            .into_result()
    }

    /// ERC-20 symbol/decimals/totalSupply in one gated call.
    pub async fn token_meta(
        &self,
        chain_id: u64,
        token: Address,
    ) -> Result<TokenMeta, TreasuryError> {
        let policy = RetryPolicy::for_chain(&self.config, chain_id)?;
        self.breaker
            .call(
                "erc20.meta",
                serde_json::json!({ "chainId": chain_id, "token": token.to_string() }),
                || {
                    rpc::try_each(&policy, "erc20.meta", move |provider| async move {
                        let erc20 = IERC20Meta::new(token, provider);
                        let symbol = erc20
                            .symbol()
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)?;
                        let decimals = erc20
                            .decimals()
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)?;
                        let total_supply = erc20
                            .totalSupply()
                            .call()
                            .await
                            .map(|r| r._0)
                            .map_err(|e| Box::new(e) as BoxError)?;
                        Ok(TokenMeta {
                            symbol,
                            decimals,
                            total_supply,
                        })
                    })
                },
            )
            .await
            .into_result()
    }
}

fn convert_currency_amount(raw: JBCurrencyAmount) -> FundAccessLimit {
    FundAccessLimit {
        amount: raw.amount.to::<U256>(),
        currency: raw.currency,
    }
}

/// An all-zero ruleset row means "nothing recorded": the stores return
/// empty structs instead of reverting.
fn decode_ruleset(raw: JBRulesetData) -> Result<Option<RulesetWithMetadata>, TreasuryError> {
    if raw.id.is_zero() && raw.cycleNumber.is_zero() {
        return Ok(None);
    }
    let metadata = metadata::decode(raw.metadata)?;
    Ok(Some(RulesetWithMetadata {
        ruleset: Ruleset {
            id: raw.id.to::<u64>(),
            cycle_number: raw.cycleNumber.to::<u64>(),
            start: raw.start.to::<u64>(),
            duration: raw.duration,
            weight: raw.weight.to::<u128>(),
            weight_cut_percent: raw.weightCutPercent,
            based_on_id: raw.basedOnId.to::<u64>(),
            approval_hook: raw.approvalHook,
            metadata_word: raw.metadata,
        },
        metadata,
    }))
}
