//! Error taxonomy for the treasury data layer.
//!
//! Every fallible operation in the crate returns `TreasuryError`. The
//! variants are deliberately coarse: callers branch on the *kind* of
//! failure (retry-after hint, upstream outage, corrupt data, missing
//! entity, missing configuration), not on stringly-typed details.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum TreasuryError {
    /// The circuit breaker for the dependency is open. The call never
    /// reached the network; retry after the embedded duration.
    CircuitOpen { retry_after: Duration },
    /// The dependency was reachable but returned an error or malformed
    /// data (HTTP failure, GraphQL errors array, RPC revert, timeout).
    Upstream(String),
    /// A packed/binary field was outside its valid domain. Never clamped:
    /// surfacing this makes upstream data corruption visible instead of
    /// rendering bogus economics.
    Decode(String),
    /// The requested project/ruleset/group does not exist. Distinct from
    /// `Upstream` so callers can render "nothing here" rather than "error".
    NotFound(String),
    /// No RPC endpoint (or other required configuration) for a chain.
    MissingConfig(String),
}

impl std::fmt::Display for TreasuryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreasuryError::CircuitOpen { retry_after } => {
                write!(f, "circuit open, retry after {:?}", retry_after)
            }
            TreasuryError::Upstream(msg) => write!(f, "upstream failure: {}", msg),
            TreasuryError::Decode(msg) => write!(f, "decode failure: {}", msg),
            TreasuryError::NotFound(msg) => write!(f, "not found: {}", msg),
            TreasuryError::MissingConfig(msg) => write!(f, "missing configuration: {}", msg),
        }
    }
}

impl std::error::Error for TreasuryError {}

impl TreasuryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreasuryError::NotFound(_))
    }
}
