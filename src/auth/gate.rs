use tracing::debug;

use super::session::{SessionRole, SessionStore};
use super::token::TokenIssuer;
use crate::db::UserSnapshot;
use crate::error::AuthError;

/// Pulls the token out of an `Authorization: Bearer <token>` header. The
/// scheme is matched case-insensitively.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Decides whether a request carries a token that is still honoured.
#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenIssuer,
    sessions: SessionStore,
}

impl AuthGate {
    pub fn new(tokens: TokenIssuer, sessions: SessionStore) -> Self {
        Self { tokens, sessions }
    }

    /// Accepts iff the signature verifies, the token has not expired, it is of
    /// the requested kind, and a live session exists for its subject.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        role: SessionRole,
    ) -> Result<UserSnapshot, AuthError> {
        let token = authorization
            .and_then(extract_bearer)
            .ok_or(AuthError::MissingCredential)?;

        let claims = self.tokens.verify_role(token, role).map_err(|e| {
            debug!("Rejected {} token: {}", role, e);
            AuthError::TokenInvalid(e)
        })?;

        let snapshot = self
            .sessions
            .lookup(&claims.sub, role)
            .await?
            .ok_or_else(|| {
                debug!("No live {} session for {}", role, claims.sub);
                AuthError::SessionNotFound
            })?;

        if snapshot.id.to_string() != claims.sub {
            debug!("Session for {} holds a different subject", claims.sub);
            return Err(AuthError::SessionNotFound);
        }

        Ok(snapshot)
    }
}
