use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::SessionRole;
use crate::config::AuthConfig;
use crate::error::{AuthError, TokenError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,  // User ID
    pub iat: i64,     // Issued at
    pub exp: i64,     // Expiration time
    pub jti: String,  // Unique token id
    pub typ: SessionRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints and checks HS256 tokens. Holds no state besides the keys and
/// lifetimes; whether a token is still honoured is decided by the session
/// store.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl: config.access_token_ttl(),
            refresh_ttl: config.refresh_token_ttl(),
        }
    }

    pub fn ttl(&self, role: SessionRole) -> chrono::Duration {
        match role {
            SessionRole::Access => self.access_ttl,
            SessionRole::Refresh => self.refresh_ttl,
        }
    }

    pub fn issue(
        &self,
        subject: &str,
        role: SessionRole,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: role,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {}", e)))
    }

    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, AuthError> {
        let now = Utc::now();

        Ok(TokenPair {
            access_token: self.issue(subject, SessionRole::Access, now + self.access_ttl)?,
            refresh_token: self.issue(subject, SessionRole::Refresh, now + self.refresh_ttl)?,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?
            .claims;

        // The library accepts `now == exp`; a token is only live strictly before it.
        if Utc::now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Verifies and also requires the token to be of the given kind.
    pub fn verify_role(&self, token: &str, role: SessionRole) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.typ != role {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }
}
