use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AuthError;
use crate::store::KeyValueStore;

const ATTEMPTS_PREFIX: &str = "login:attempts:";

/// Trimmed, lower-cased form of a login identity.
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Store-safe key fragment for an identity: SHA-256 of the normalised form,
/// base64url without padding. User input never reaches a key verbatim.
pub fn identity_digest(identity: &str) -> String {
    let digest = Sha256::digest(normalize_identity(identity).as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Consecutive failed logins per identity, expiring after a quiet window.
#[derive(Clone)]
pub struct AttemptCounter {
    store: Arc<dyn KeyValueStore>,
    window: Duration,
}

impl AttemptCounter {
    pub fn new(store: Arc<dyn KeyValueStore>, window: Duration) -> Self {
        Self { store, window }
    }

    fn key(identity: &str) -> String {
        format!("{}{}", ATTEMPTS_PREFIX, identity_digest(identity))
    }

    /// Counts one more failure and restarts the window. Returns the new count.
    pub async fn record_failure(&self, identity: &str) -> Result<i64, AuthError> {
        let count = self
            .store
            .increment_with_ttl(&Self::key(identity), self.window)
            .await?;
        Ok(count)
    }

    pub async fn clear(&self, identity: &str) -> Result<(), AuthError> {
        self.store.delete(&Self::key(identity)).await?;
        Ok(())
    }

    /// Zero when absent, expired, or not an integer.
    pub async fn current(&self, identity: &str) -> Result<i64, AuthError> {
        let value = self.store.get(&Self::key(identity)).await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }
}
