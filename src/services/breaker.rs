//! Resilience gate (circuit breaker).
//!
//! Wraps every outbound call to the indexer and to chain RPC so one
//! failing dependency cannot cascade into unbounded retries or UI hangs.
//! State machine: closed → (repeated failure) → open, short-circuiting
//! with a retry-after hint → (cooldown elapses) → half-open, one trial
//! call → closed on success, open with multiplied cooldown on failure.
//!
//! The indexer and RPC get independent instances: their failure domains
//! differ. Breaker state is process-local, never persisted.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::TreasuryError;

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,
    /// Initial open duration.
    pub cooldown: Duration,
    /// Open duration is multiplied by this after a failed trial call.
    pub backoff_factor: u32,
    /// Cap on the backed-off cooldown.
    pub max_cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(10),
            backoff_factor: 2,
            max_cooldown: Duration::from_secs(120),
        }
    }
}

/// Result of a gated call. Callers must branch on the outcome, never
/// assume success.
#[derive(Debug)]
pub enum CallOutcome<T> {
    Success(T),
    Failure(String),
    CircuitOpen { retry_after: Duration },
}

impl<T> CallOutcome<T> {
    pub fn into_result(self) -> Result<T, TreasuryError> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Failure(error) => Err(TreasuryError::Upstream(error)),
            CallOutcome::CircuitOpen { retry_after } => {
                Err(TreasuryError::CircuitOpen { retry_after })
            }
        }
    }
}

/// Structured failure record forwarded to the observability collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    /// Which breaker recorded it ("indexer", "rpc").
    pub source: String,
    /// Query or call identifier.
    pub label: String,
    pub variables: serde_json::Value,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Fire-and-forget sink for failure records. Implementations must never
/// block or fail the primary call.
pub trait FailureSink: Send + Sync {
    fn record(&self, record: FailureRecord);
}

/// Default sink: structured log lines only.
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn record(&self, record: FailureRecord) {
        warn!(
            source = %record.source,
            label = %record.label,
            error = %record.error,
            "Dependency failure recorded"
        );
    }
}

#[derive(Debug)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { until: Instant, cooldown: Duration },
    HalfOpen { cooldown: Duration },
}

pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
    sink: Arc<dyn FailureSink>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig, sink: Arc<dyn FailureSink>) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
            sink,
        }
    }

    /// Run `op` through the gate. `label` and `variables` identify the
    /// call for the observability sink.
    pub async fn call<T, E, F, Fut>(
        &self,
        label: &str,
        variables: serde_json::Value,
        op: F,
    ) -> CallOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        // Admission check. A trial call transitions Open -> HalfOpen and
        // proceeds; everything else during the trial short-circuits.
        let is_trial = {
            let mut state = self.state.lock();
            match &*state {
                BreakerState::Closed { .. } => false,
                BreakerState::Open { until, cooldown } => {
                    let now = Instant::now();
                    if now < *until {
                        let retry_after = *until - now;
                        drop(state);
                        self.emit(label, &variables, "circuit open, call short-circuited");
                        return CallOutcome::CircuitOpen { retry_after };
                    }
                    let cooldown = *cooldown;
                    *state = BreakerState::HalfOpen { cooldown };
                    true
                }
                BreakerState::HalfOpen { cooldown } => {
                    let retry_after = *cooldown;
                    drop(state);
                    self.emit(label, &variables, "trial call in flight, short-circuited");
                    return CallOutcome::CircuitOpen { retry_after };
                }
            }
        };

        match op().await {
            Ok(value) => {
                let mut state = self.state.lock();
                if is_trial {
                    debug!(breaker = %self.name, label, "Trial call succeeded, closing circuit");
                }
                *state = BreakerState::Closed {
                    consecutive_failures: 0,
                };
                CallOutcome::Success(value)
            }
            Err(error) => {
                let error = error.to_string();
                self.on_failure(is_trial);
                self.emit(label, &variables, &error);
                CallOutcome::Failure(error)
            }
        }
    }

    fn on_failure(&self, was_trial: bool) {
        let mut state = self.state.lock();
        if was_trial {
            // Failed trial: re-open with multiplied cooldown, capped.
            let previous = match &*state {
                BreakerState::HalfOpen { cooldown } => *cooldown,
                _ => self.config.cooldown,
            };
            let next = (previous * self.config.backoff_factor).min(self.config.max_cooldown);
            warn!(
                breaker = %self.name,
                cooldown_secs = next.as_secs(),
                "Trial call failed, re-opening circuit"
            );
            *state = BreakerState::Open {
                until: Instant::now() + next,
                cooldown: next,
            };
            return;
        }

        match &mut *state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                *consecutive_failures += 1;
                if *consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = *consecutive_failures,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "Failure threshold reached, opening circuit"
                    );
                    *state = BreakerState::Open {
                        until: Instant::now() + self.config.cooldown,
                        cooldown: self.config.cooldown,
                    };
                }
            }
            // Late failure from a call admitted before the trip. Nothing
            // to count: the circuit is already open.
            BreakerState::Open { .. } | BreakerState::HalfOpen { .. } => {}
        }
    }

    fn emit(&self, label: &str, variables: &serde_json::Value, error: &str) {
        self.sink.record(FailureRecord {
            source: self.name.clone(),
            label: label.to_string(),
            variables: variables.clone(),
            error: error.to_string(),
            at: Utc::now(),
        });
    }
}
