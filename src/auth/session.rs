use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::db::UserSnapshot;
use crate::error::AuthError;
use crate::store::KeyValueStore;

const SESSION_PREFIX: &str = "session:";
const REVOKE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Access,
    Refresh,
}

impl SessionRole {
    pub const ALL: [SessionRole; 2] = [SessionRole::Access, SessionRole::Refresh];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionRole::Access => "access",
            SessionRole::Refresh => "refresh",
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side record that a token for (subject, role) is still honoured.
/// One live session per pair; binding again replaces it.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(subject: &str, role: SessionRole) -> String {
        format!("{}{}:{}", SESSION_PREFIX, role, subject)
    }

    pub async fn bind(
        &self,
        subject: &str,
        role: SessionRole,
        snapshot: &UserSnapshot,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let value = serde_json::to_string(snapshot)
            .map_err(|e| AuthError::Internal(format!("session encoding failed: {}", e)))?;
        self.store
            .set_with_ttl(&Self::key(subject, role), &value, ttl)
            .await?;
        Ok(())
    }

    /// A stored value that no longer decodes is treated as no session.
    pub async fn lookup(
        &self,
        subject: &str,
        role: SessionRole,
    ) -> Result<Option<UserSnapshot>, AuthError> {
        let Some(value) = self.store.get(&Self::key(subject, role)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&value) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!("Discarding undecodable {} session for {}: {}", role, subject, e);
                Ok(None)
            }
        }
    }

    pub async fn revoke(&self, subject: &str, role: SessionRole) -> Result<(), AuthError> {
        self.store.delete(&Self::key(subject, role)).await?;
        Ok(())
    }

    /// Deletes both sessions, retrying each a few times. Every role is
    /// attempted even if an earlier one keeps failing.
    pub async fn revoke_all(&self, subject: &str) -> Result<(), AuthError> {
        let mut failure = None;

        for role in SessionRole::ALL {
            let mut last_error = None;
            for attempt in 1..=REVOKE_ATTEMPTS {
                match self.revoke(subject, role).await {
                    Ok(()) => {
                        last_error = None;
                        break;
                    }
                    Err(e) => {
                        warn!(
                            "Revoking {} session for {} failed (attempt {}/{}): {}",
                            role, subject, attempt, REVOKE_ATTEMPTS, e
                        );
                        last_error = Some(e);
                    }
                }
            }
            if let Some(e) = last_error {
                error!("Giving up on revoking {} session for {}", role, subject);
                failure = Some(e);
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
