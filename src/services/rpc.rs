//! RPC endpoint fallback.
//!
//! Each chain has an ordered list of endpoints; calls try them
//! sequentially with a fixed per-attempt timeout. First success wins,
//! every failure is logged, and exhausting the list is a hard failure for
//! that call. The policy is a plain value so it stays independent of any
//! particular chain.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::TreasuryError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub endpoints: Vec<String>,
    pub per_attempt_timeout: Duration,
    pub max_attempts: usize,
}

impl RetryPolicy {
    /// Policy for one chain from the ambient config. A chain with no
    /// configured endpoints is a configuration error, not an upstream one.
    pub fn for_chain(config: &Arc<Config>, chain_id: u64) -> Result<Self, TreasuryError> {
        let endpoints = config
            .endpoints_for(chain_id)
            .filter(|urls| !urls.is_empty())
            .ok_or_else(|| {
                TreasuryError::MissingConfig(format!("no RPC endpoints for chain {}", chain_id))
            })?;
        Ok(Self {
            endpoints: endpoints.to_vec(),
            per_attempt_timeout: config.per_attempt_timeout,
            max_attempts: config.max_rpc_attempts,
        })
    }
}

/// Try `op` against each endpoint in order until one succeeds.
pub async fn try_each<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, TreasuryError>
where
    F: FnMut(RootProvider<Http<Client>>) -> Fut,
    Fut: Future<Output = Result<T, BoxError>>,
{
    let mut last_error = String::from("no endpoints attempted");

    for (attempt, endpoint) in policy
        .endpoints
        .iter()
        .take(policy.max_attempts.max(1))
        .enumerate()
    {
        let url = match endpoint.parse() {
            Ok(url) => url,
            Err(e) => {
                warn!(label, endpoint = %endpoint, error = %e, "Invalid RPC URL, skipping");
                last_error = format!("invalid RPC URL {}: {}", endpoint, e);
                continue;
            }
        };
        let provider = ProviderBuilder::new().on_http(url);

        match tokio::time::timeout(policy.per_attempt_timeout, op(provider)).await {
            Ok(Ok(value)) => {
                if attempt > 0 {
                    debug!(label, endpoint = %endpoint, attempt, "RPC fallback succeeded");
                }
                return Ok(value);
            }
            Ok(Err(e)) => {
                warn!(label, endpoint = %endpoint, attempt, error = %e, "RPC attempt failed");
                last_error = e.to_string();
            }
            Err(_) => {
                warn!(
                    label,
                    endpoint = %endpoint,
                    attempt,
                    timeout_secs = policy.per_attempt_timeout.as_secs(),
                    "RPC attempt timed out"
                );
                last_error = format!(
                    "timed out after {}s",
                    policy.per_attempt_timeout.as_secs()
                );
            }
        }
    }

    Err(TreasuryError::Upstream(format!(
        "{}: all RPC endpoints failed, last error: {}",
        label, last_error
    )))
}
