//! Shared key-value store holding all throttling and session state.
//!
//! Every process instance talks to the same store, so nothing in here keeps
//! in-process state for production use. Expiry is always the store's own TTL.

mod memory;
mod redis_store;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` and (re)sets the key's expiry to `ttl`, replacing any
    /// previous value.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Writes `value` with expiry `ttl` only if `key` does not exist. Returns
    /// whether this call created the key.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Atomically increments the integer at `key` (creating it at 1) and resets
    /// its expiry to `ttl`. Returns the new value.
    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError>;

    /// Remaining time to live. `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Store expiries have one-second granularity on most backends; round up so a
/// sub-second TTL never turns into "no expiry".
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}
