use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::attempts::normalize_identity;
use super::gate::AuthGate;
use super::lockout::{FailureOutcome, LockStatus, LockoutPolicy};
use super::password::{dummy_hash, hash_password, verify_password};
use super::session::{SessionRole, SessionStore};
use super::token::{TokenIssuer, TokenPair};
use crate::config::Settings;
use crate::db::{User, UserRepository, UserSnapshot};
use crate::error::{AccountError, AuthError};
use crate::logging::mask;
use crate::store::KeyValueStore;

/// Login orchestration on top of the lockout policy, token issuer and session
/// store. This is the only part of the core the route layer talks to.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    lockout: LockoutPolicy,
    tokens: TokenIssuer,
    sessions: SessionStore,
    gate: AuthGate,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        store: Arc<dyn KeyValueStore>,
        settings: &Settings,
    ) -> Self {
        let tokens = TokenIssuer::new(&settings.auth);
        let sessions = SessionStore::new(store.clone());
        Self {
            users,
            lockout: LockoutPolicy::new(store, settings.lockout.clone()),
            gate: AuthGate::new(tokens.clone(), sessions.clone()),
            tokens,
            sessions,
        }
    }

    pub fn lockout(&self) -> &LockoutPolicy {
        &self.lockout
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn attempt_login(&self, identity: &str, secret: &str) -> Result<TokenPair, AuthError> {
        let identity = normalize_identity(identity);

        if let LockStatus::Blocked { unlock_at } = self.lockout.check(&identity).await? {
            info!("Login refused for locked identity {}", mask(&identity, "**"));
            return Err(AuthError::AccountLocked { unlock_at });
        }

        // A lookup failure is an outage, not a wrong password: it is not counted.
        let user = self.users.find_by_email(&identity).await?;

        let hash = user
            .as_ref()
            .map_or_else(|| dummy_hash().to_string(), |u| u.password_hash.clone());
        let secret = secret.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&hash, &secret))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task failed: {}", e)))?;

        match user {
            Some(user) if matches => self.complete_login(&identity, &user).await,
            _ => Err(self.fail_login(&identity).await?),
        }
    }

    async fn fail_login(&self, identity: &str) -> Result<AuthError, AuthError> {
        Ok(match self.lockout.record_failure(identity).await? {
            FailureOutcome::Counted(_) => AuthError::InvalidCredential,
            FailureOutcome::Locked { unlock_at, .. } => AuthError::AccountLocked {
                unlock_at: Some(unlock_at),
            },
            FailureOutcome::AlreadyLocked { unlock_at } => AuthError::AccountLocked { unlock_at },
        })
    }

    async fn complete_login(&self, identity: &str, user: &User) -> Result<TokenPair, AuthError> {
        self.lockout.reset(identity).await?;

        let subject = user.id.to_string();
        let pair = self.tokens.issue_pair(&subject)?;
        let snapshot = user.snapshot();
        for role in SessionRole::ALL {
            self.bind(&subject, role, &snapshot).await?;
        }

        info!("Login succeeded for {}", mask(identity, "**"));
        Ok(pair)
    }

    async fn bind(&self, subject: &str, role: SessionRole, snapshot: &UserSnapshot) -> Result<(), AuthError> {
        let ttl = self
            .tokens
            .ttl(role)
            .to_std()
            .map_err(|e| AuthError::Internal(format!("invalid {} lifetime: {}", role, e)))?;
        self.sessions.bind(subject, role, snapshot, ttl).await
    }

    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        role: SessionRole,
    ) -> Result<UserSnapshot, AuthError> {
        self.gate.authenticate(authorization, role).await
    }

    /// Ends both sessions of `subject`. Succeeds when none exist.
    pub async fn logout(&self, subject: &str) -> Result<(), AuthError> {
        self.sessions.revoke_all(subject).await?;
        info!("Sessions revoked for {}", subject);
        Ok(())
    }

    /// Issues a fresh access token for the holder of a live refresh session
    /// and rebinds the access session to the user's current state. The
    /// refresh token itself is left as is.
    pub async fn refresh_access(&self, authorization: Option<&str>) -> Result<String, AuthError> {
        let principal = self.gate.authenticate(authorization, SessionRole::Refresh).await?;
        let subject = principal.id.to_string();

        let user = match self.users.find_by_id(principal.id).await? {
            Some(user) if !user.is_deleted() => user,
            _ => {
                warn!("Refresh for vanished user {}; revoking sessions", subject);
                self.sessions.revoke_all(&subject).await?;
                return Err(AuthError::SessionNotFound);
            }
        };

        let expires_at = chrono::Utc::now() + self.tokens.ttl(SessionRole::Access);
        let token = self.tokens.issue(&subject, SessionRole::Access, expires_at)?;
        self.bind(&subject, SessionRole::Access, &user.snapshot()).await?;

        Ok(token)
    }

    /// Creates a user with a freshly hashed password. The email is stored in
    /// its normalised form so that login lookups match.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AccountError> {
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {}", e)))?
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let user = User::new(name.trim().to_string(), normalize_identity(email), hash);
        let created = self.users.create_user(&user).await?;
        info!("Registered user {}", created.id);
        Ok(created)
    }

    /// Removes `id` from view and ends its sessions.
    pub async fn deactivate(&self, id: Uuid, expected_version: i32) -> Result<(), AccountError> {
        self.users.soft_delete(id, expected_version).await?;
        self.sessions.revoke_all(&id.to_string()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryUserRepository, MockUserRepository};
    use crate::error::DatabaseError;
    use crate::store::MemoryStore;
    use std::time::Duration;

    const EMAIL: &str = "ann@example.com";
    const PASSWORD: &str = "correct-horse";

    struct Harness {
        service: AuthService,
        store: MemoryStore,
        user: User,
    }

    async fn harness() -> Harness {
        let settings = Settings::new_for_test().unwrap();
        let store = MemoryStore::new();
        let users = Arc::new(MemoryUserRepository::new());
        let service = AuthService::new(users, Arc::new(store.clone()), &settings);
        let user = service.register("Ann", EMAIL, PASSWORD).await.unwrap();
        Harness { service, store, user }
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    #[test_log::test(tokio::test)]
    async fn test_login_binds_both_sessions() {
        let h = harness().await;
        let pair = h.service.attempt_login(EMAIL, PASSWORD).await.unwrap();
        let subject = h.user.id.to_string();

        let access = h.service.sessions().lookup(&subject, SessionRole::Access).await.unwrap();
        let refresh = h.service.sessions().lookup(&subject, SessionRole::Refresh).await.unwrap();
        assert_eq!(access, Some(h.user.snapshot()));
        assert_eq!(access, refresh);

        let access_ttl = h.store.ttl(&format!("session:access:{}", subject)).await.unwrap().unwrap();
        let refresh_ttl = h.store.ttl(&format!("session:refresh:{}", subject)).await.unwrap().unwrap();
        assert!(access_ttl <= Duration::from_secs(900) && access_ttl > Duration::from_secs(890));
        assert!(refresh_ttl <= Duration::from_secs(86_400) && refresh_ttl > Duration::from_secs(86_390));

        let principal = h
            .service
            .authenticate(Some(&bearer(&pair.access_token)), SessionRole::Access)
            .await
            .unwrap();
        assert_eq!(principal.id, h.user.id);
    }

    #[tokio::test]
    async fn test_identity_is_normalised() {
        let h = harness().await;
        assert!(h.service.attempt_login("  ANN@Example.com ", PASSWORD).await.is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn test_third_failure_locks_and_correct_password_stays_locked() {
        let h = harness().await;

        for _ in 0..2 {
            let err = h.service.attempt_login(EMAIL, "wrong").await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredential));
        }
        let err = h.service.attempt_login(EMAIL, "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { unlock_at: Some(_) }));

        let err = h.service.attempt_login(EMAIL, PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { unlock_at: Some(_) }));
    }

    #[tokio::test]
    async fn test_success_below_threshold_resets_count() {
        let h = harness().await;

        h.service.attempt_login(EMAIL, "wrong").await.unwrap_err();
        h.service.attempt_login(EMAIL, "wrong").await.unwrap_err();
        h.service.attempt_login(EMAIL, PASSWORD).await.unwrap();
        assert_eq!(h.service.lockout().attempts().current(EMAIL).await.unwrap(), 0);

        let err = h.service.attempt_login(EMAIL, "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_success_clears_escalation() {
        let h = harness().await;
        for _ in 0..3 {
            h.service.attempt_login(EMAIL, "wrong").await.unwrap_err();
        }
        assert_eq!(h.service.lockout().escalation_level(EMAIL).await.unwrap(), 1);

        // Lift the block by hand; its expiry is covered by the lockout tests.
        h.store
            .delete(&format!("login:block:{}", crate::auth::attempts::identity_digest(EMAIL)))
            .await
            .unwrap();
        h.service.attempt_login(EMAIL, PASSWORD).await.unwrap();

        assert_eq!(h.service.lockout().escalation_level(EMAIL).await.unwrap(), 0);
        assert_eq!(h.service.lockout().attempts().current(EMAIL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_identity_is_counted_like_wrong_password() {
        let h = harness().await;
        let ghost = "nobody@example.com";

        for _ in 0..2 {
            let err = h.service.attempt_login(ghost, PASSWORD).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredential));
        }
        let err = h.service.attempt_login(ghost, PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));
    }

    #[tokio::test]
    async fn test_user_store_outage_is_not_counted() {
        let settings = Settings::new_for_test().unwrap();
        let store = MemoryStore::new();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(|_| Err(DatabaseError::ConnectionError("pool timed out".into())));
        let service = AuthService::new(Arc::new(users), Arc::new(store), &settings);

        let err = service.attempt_login(EMAIL, PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
        assert_eq!(service.lockout().attempts().current(EMAIL).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_logout_revokes_and_is_idempotent() {
        let h = harness().await;
        let pair = h.service.attempt_login(EMAIL, PASSWORD).await.unwrap();
        let subject = h.user.id.to_string();

        h.service.logout(&subject).await.unwrap();
        h.service.logout(&subject).await.unwrap();

        let err = h
            .service
            .authenticate(Some(&bearer(&pair.access_token)), SessionRole::Access)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_refresh_issues_working_access_token() {
        let h = harness().await;
        let pair = h.service.attempt_login(EMAIL, PASSWORD).await.unwrap();

        let access = h
            .service
            .refresh_access(Some(&bearer(&pair.refresh_token)))
            .await
            .unwrap();
        let principal = h
            .service
            .authenticate(Some(&bearer(&access)), SessionRole::Access)
            .await
            .unwrap();
        assert_eq!(principal.id, h.user.id);

        let err = h
            .service
            .refresh_access(Some(&bearer(&pair.access_token)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }

    #[tokio::test]
    async fn test_deactivate_ends_sessions() {
        let h = harness().await;
        let pair = h.service.attempt_login(EMAIL, PASSWORD).await.unwrap();

        h.service.deactivate(h.user.id, h.user.version).await.unwrap();

        let err = h
            .service
            .authenticate(Some(&bearer(&pair.access_token)), SessionRole::Access)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound));
        let err = h.service.attempt_login(EMAIL, PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_deactivate_with_stale_version_keeps_sessions() {
        let h = harness().await;
        let pair = h.service.attempt_login(EMAIL, PASSWORD).await.unwrap();

        let err = h.service.deactivate(h.user.id, h.user.version + 1).await.unwrap_err();
        assert!(matches!(err, AccountError::Database(DatabaseError::VersionConflict)));
        assert!(h
            .service
            .authenticate(Some(&bearer(&pair.access_token)), SessionRole::Access)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let h = harness().await;
        let err = h.service.register("Ann 2", "ANN@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AccountError::Database(DatabaseError::Duplicate)));
    }
}
