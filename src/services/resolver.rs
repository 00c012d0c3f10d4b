//! Versioned contract resolver.
//!
//! Different protocol generations coexist per-project, so the governing
//! contract suite is read from the on-chain directory instead of trusting
//! a hardcoded version. The directory's `controllerOf` pointer is
//! classified against the known deterministic controller addresses (the
//! deployments share addresses across chains) to pick the matching
//! rulesets store, fund-access-limits store and terminal.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, address};
use tracing::{debug, warn};

use crate::services::cache::{ProjectKey, TtlCache};
use crate::services::chain::ChainReader;

/// Deterministic deployment addresses, identical on every supported chain.
pub mod addresses {
    use super::*;

    pub const DIRECTORY: Address = address!("0bc9f153dee4d3d474ce0903775b9b2aaae9aa41");

    pub const CONTROLLER_V4: Address = address!("b291844f213047eb9e1621ae555b1eae6700d553");
    pub const RULESETS_V4: Address = address!("da86eedb67c6c9fb3e58fe83efa28674d7c89826");
    pub const SPLITS_V4: Address = address!("0d25e44a8ff5f8ad9ca2bfba8e0f166e55714c9b");
    pub const FUND_ACCESS_LIMITS_V4: Address = address!("f42a0b4f09dba4d33ccb39937ef0ee0f46cdd7cf");
    pub const TERMINAL_V4: Address = address!("db9f89c28a6f1d5dcd85ffb41be39e552c3bfb42");
    pub const TERMINAL_STORE_V4: Address = address!("6f6740dda12033ca9fbaa56693194e38cfd36827");

    pub const CONTROLLER_V4_1: Address = address!("d604365c7c701af45f52986ea33da502e858cd9c");
    pub const RULESETS_V4_1: Address = address!("6292281d69c3593fcbfff27dd9fbaef06e2b1c9e");
    pub const SPLITS_V4_1: Address = address!("3e1b6e58bbca4667b1e1f306ca1e360fbd194aeb");
    pub const FUND_ACCESS_LIMITS_V4_1: Address =
        address!("9d8c09b674b1a41dd91701f437fb599e4f57387f");
    pub const TERMINAL_V4_1: Address = address!("52869db3d61dde683bb9ce0f7feb1b47ba8bf2f6");
    pub const TERMINAL_STORE_V4_1: Address = address!("4d4685a4524c8f5f29e309e289ed27d51fcfbdd2");

    /// Automated deployer that owns revnet-style projects. Routes to the
    /// v4.1 suite but marks the project as a special variant.
    pub const REV_DEPLOYER: Address = address!("027f1684c6d31066c3f2468117f2508e8134fdfc");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V4,
    V4_1,
}

/// The contracts governing one project on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractSuite {
    pub version: ProtocolVersion,
    pub controller: Address,
    pub rulesets: Address,
    pub splits: Address,
    pub fund_access_limits: Address,
    pub terminal: Address,
    pub terminal_store: Address,
    /// Project is owned by the automated deployer rather than an EOA/DAO.
    pub is_special_variant: bool,
}

fn suite_for(version: ProtocolVersion, is_special_variant: bool) -> ContractSuite {
    match version {
        ProtocolVersion::V4 => ContractSuite {
            version,
            controller: addresses::CONTROLLER_V4,
            rulesets: addresses::RULESETS_V4,
            splits: addresses::SPLITS_V4,
            fund_access_limits: addresses::FUND_ACCESS_LIMITS_V4,
            terminal: addresses::TERMINAL_V4,
            terminal_store: addresses::TERMINAL_STORE_V4,
            is_special_variant,
        },
        ProtocolVersion::V4_1 => ContractSuite {
            version,
            controller: addresses::CONTROLLER_V4_1,
            rulesets: addresses::RULESETS_V4_1,
            splits: addresses::SPLITS_V4_1,
            fund_access_limits: addresses::FUND_ACCESS_LIMITS_V4_1,
            terminal: addresses::TERMINAL_V4_1,
            terminal_store: addresses::TERMINAL_STORE_V4_1,
            is_special_variant,
        },
    }
}

/// Classify a controller address from the directory. `None` for unknown
/// controllers (custom forks).
pub fn classify_controller(controller: Address) -> Option<(ProtocolVersion, bool)> {
    if controller == addresses::CONTROLLER_V4 {
        Some((ProtocolVersion::V4, false))
    } else if controller == addresses::CONTROLLER_V4_1 {
        Some((ProtocolVersion::V4_1, false))
    } else if controller == addresses::REV_DEPLOYER {
        Some((ProtocolVersion::V4_1, true))
    } else {
        None
    }
}

/// The suite assumed when the directory cannot be read: the latest
/// generation, no special variant.
pub fn default_suite() -> ContractSuite {
    suite_for(ProtocolVersion::V4_1, false)
}

pub struct ContractResolver {
    chain: Arc<ChainReader>,
    cache: TtlCache<ProjectKey, ContractSuite>,
}

impl ContractResolver {
    pub fn new(chain: Arc<ChainReader>, cache_ttl: Duration) -> Self {
        Self {
            chain,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Resolve the suite governing `(project_id, chain_id)`.
    ///
    /// Degraded-but-non-fatal: a failed directory read or a zero/unknown
    /// controller falls back to the default suite with a logged warning,
    /// never an error.
    pub async fn resolve(&self, chain_id: u64, project_id: u64) -> ContractSuite {
        let key = ProjectKey {
            chain_id,
            project_id,
        };
        if let Some(suite) = self.cache.get(&key).await {
            return suite;
        }

        let suite = match self
            .chain
            .controller_of(chain_id, addresses::DIRECTORY, project_id)
            .await
        {
            Ok(controller) if controller == Address::ZERO => {
                warn!(
                    chain_id,
                    project_id, "Directory has no controller for project, using default suite"
                );
                default_suite()
            }
            Ok(controller) => match classify_controller(controller) {
                Some((version, is_special_variant)) => {
                    debug!(
                        chain_id,
                        project_id,
                        ?version,
                        is_special_variant,
                        "Resolved contract suite from directory"
                    );
                    suite_for(version, is_special_variant)
                }
                None => {
                    warn!(
                        chain_id,
                        project_id,
                        controller = %controller,
                        "Unknown controller address, using default suite"
                    );
                    default_suite()
                }
            },
            Err(e) => {
                warn!(
                    chain_id,
                    project_id,
                    error = %e,
                    "Directory read failed, using default suite"
                );
                default_suite()
            }
        };

        self.cache.insert(key, suite).await;
        suite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_controllers_classify_to_their_generation() {
        assert_eq!(
            classify_controller(addresses::CONTROLLER_V4),
            Some((ProtocolVersion::V4, false))
        );
        assert_eq!(
            classify_controller(addresses::CONTROLLER_V4_1),
            Some((ProtocolVersion::V4_1, false))
        );
        assert_eq!(
            classify_controller(addresses::REV_DEPLOYER),
            Some((ProtocolVersion::V4_1, true))
        );
    }

    #[test]
    fn unknown_controller_is_unclassified() {
        assert_eq!(
            classify_controller(address!("00000000000000000000000000000000000000ff")),
            None
        );
    }

    #[test]
    fn suites_pair_controllers_with_their_stores() {
        let v4 = suite_for(ProtocolVersion::V4, false);
        assert_eq!(v4.rulesets, addresses::RULESETS_V4);
        assert_eq!(v4.terminal, addresses::TERMINAL_V4);
        assert!(!v4.is_special_variant);

        let special = suite_for(ProtocolVersion::V4_1, true);
        assert_eq!(special.rulesets, addresses::RULESETS_V4_1);
        assert!(special.is_special_variant);
    }

    #[test]
    fn default_suite_is_latest_generation() {
        assert_eq!(default_suite().version, ProtocolVersion::V4_1);
        assert!(!default_suite().is_special_variant);
    }
}
