//! Brute-force lockout state machine.
//!
//! An identity is `Open` until its failure count reaches the threshold, then
//! `Blocked` for as long as the block key lives in the store. Each lockout
//! doubles the next one, up to a ceiling. There are no timers: the store's TTL
//! is the only clock.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::attempts::{identity_digest, AttemptCounter};
use crate::config::LockoutConfig;
use crate::error::AuthError;
use crate::logging::mask;
use crate::store::KeyValueStore;

const BLOCK_PREFIX: &str = "login:block:";
const ESCALATION_PREFIX: &str = "login:block_count:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockStatus {
    Open,
    /// `unlock_at` is `None` when the remaining time could not be read.
    Blocked { unlock_at: Option<DateTime<Utc>> },
}

impl LockStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, LockStatus::Blocked { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Failure counted; the identity is still open.
    Counted(i64),
    /// This failure engaged a lockout.
    Locked { unlock_at: DateTime<Utc>, escalation: i64 },
    /// Past the threshold, but another failure engaged the lockout first.
    AlreadyLocked { unlock_at: Option<DateTime<Utc>> },
}

/// Length of a lockout given how many lockouts preceded it:
/// `min(base * 2^prior, ceiling)`. Saturates instead of overflowing.
pub fn lockout_duration(prior: i64, base: Duration, ceiling: Duration) -> Duration {
    let exponent = u32::try_from(prior.max(0)).unwrap_or(u32::MAX);
    2u32.checked_pow(exponent)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(ceiling, |d| d.min(ceiling))
}

fn block_key(identity: &str) -> String {
    format!("{}{}", BLOCK_PREFIX, identity_digest(identity))
}

fn escalation_key(identity: &str) -> String {
    format!("{}{}", ESCALATION_PREFIX, identity_digest(identity))
}

fn unlock_time(ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl).ok().map(|d| Utc::now() + d)
}

#[derive(Clone)]
pub struct LockoutPolicy {
    store: Arc<dyn KeyValueStore>,
    attempts: AttemptCounter,
    config: LockoutConfig,
}

impl LockoutPolicy {
    pub fn new(store: Arc<dyn KeyValueStore>, config: LockoutConfig) -> Self {
        let attempts = AttemptCounter::new(store.clone(), config.attempt_ttl());
        Self {
            store,
            attempts,
            config,
        }
    }

    pub fn attempts(&self) -> &AttemptCounter {
        &self.attempts
    }

    /// Fails closed: if the block record cannot be read the caller gets
    /// `StoreUnavailable`, never `Open`.
    pub async fn check(&self, identity: &str) -> Result<LockStatus, AuthError> {
        let key = block_key(identity);
        if self.store.get(&key).await?.is_none() {
            return Ok(LockStatus::Open);
        }

        let unlock_at = match self.store.ttl(&key).await {
            Ok(Some(ttl)) => unlock_time(ttl),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read lockout TTL for {}: {}", mask(identity, "**"), e);
                None
            }
        };
        Ok(LockStatus::Blocked { unlock_at })
    }

    pub async fn record_failure(&self, identity: &str) -> Result<FailureOutcome, AuthError> {
        let count = self.attempts.record_failure(identity).await?;
        if count < self.config.failure_threshold {
            info!(
                "Failed login {} of {} for {}",
                count,
                self.config.failure_threshold,
                mask(identity, "**")
            );
            return Ok(FailureOutcome::Counted(count));
        }

        // Only the failure that creates the block key escalates. Concurrent
        // failures past the threshold join the lockout already in place.
        let claimed = self
            .store
            .set_if_absent(&block_key(identity), "1", self.config.base_lockout())
            .await?;
        if !claimed {
            let unlock_at = match self.check(identity).await? {
                LockStatus::Blocked { unlock_at } => unlock_at,
                LockStatus::Open => None,
            };
            return Ok(FailureOutcome::AlreadyLocked { unlock_at });
        }

        self.engage(identity).await
    }

    /// Runs once per lockout, by the caller that created the block key.
    async fn engage(&self, identity: &str) -> Result<FailureOutcome, AuthError> {
        let escalation = self
            .store
            .increment_with_ttl(&escalation_key(identity), self.config.escalation_ttl())
            .await?;
        let duration = lockout_duration(
            escalation - 1,
            self.config.base_lockout(),
            self.config.max_lockout(),
        );

        if duration != self.config.base_lockout() {
            self.store
                .set_with_ttl(&block_key(identity), "1", duration)
                .await?;
        }
        self.attempts.clear(identity).await?;

        warn!(
            "Lockout #{} engaged for {} ({}s)",
            escalation,
            mask(identity, "**"),
            duration.as_secs()
        );

        Ok(FailureOutcome::Locked {
            unlock_at: unlock_time(duration).unwrap_or_else(Utc::now),
            escalation,
        })
    }

    /// Called after a successful login: forgets failures and past lockouts.
    pub async fn reset(&self, identity: &str) -> Result<(), AuthError> {
        self.attempts.clear(identity).await?;
        self.store.delete(&escalation_key(identity)).await?;
        Ok(())
    }

    /// Number of consecutive lockouts still remembered for `identity`.
    pub async fn escalation_level(&self, identity: &str) -> Result<i64, AuthError> {
        let value = self.store.get(&escalation_key(identity)).await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }
}
