use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::time::Duration;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::ConnectionError(err.to_string()))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Auth(e) => AppError::AuthError(e),
            AccountError::Database(e) => AppError::DatabaseError(e),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl AppError {
    /// Message shown to the client. Authentication failures share one message so
    /// callers cannot tell which step of the gate rejected them, and infrastructure
    /// faults never leak their detail.
    fn public_message(&self) -> String {
        match self {
            AppError::AuthError(AuthError::AccountLocked { .. }) => {
                "Account locked due to too many failed login attempts".to_string()
            }
            AppError::AuthError(AuthError::StoreUnavailable(_)) | AppError::StoreError(_) => {
                "Service temporarily unavailable".to_string()
            }
            AppError::AuthError(AuthError::Internal(_)) => "Internal server error".to_string(),
            AppError::AuthError(_) => "Unauthorized".to_string(),
            AppError::DatabaseError(DatabaseError::NotFound) => "Resource not found".to_string(),
            AppError::DatabaseError(DatabaseError::Duplicate) => "Email already exists".to_string(),
            AppError::DatabaseError(DatabaseError::VersionConflict) => {
                "Resource was modified concurrently".to_string()
            }
            AppError::ValidationError(_) => self.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status.as_u16(), self);
        }

        let mut body = json!({
            "status": status.as_u16(),
            "message": self.public_message(),
        });
        if let AppError::AuthError(AuthError::AccountLocked { unlock_at: Some(at) }) = self {
            body["unlock_at"] = json!(at.to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        HttpResponse::build(status).json(json!({ "error": body }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
                AuthError::TokenInvalid(_) => StatusCode::UNAUTHORIZED,
                AuthError::SessionNotFound => StatusCode::UNAUTHORIZED,
                AuthError::MissingCredential => StatusCode::UNAUTHORIZED,
                AuthError::AccountLocked { .. } => StatusCode::TOO_MANY_REQUESTS,
                AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::StoreError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(DatabaseError::VersionConflict) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Outcomes of the authentication core. Carries no HTTP knowledge; the route
/// layer maps it through [`AppError`].
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong secret or unknown identity. Merged to avoid user enumeration.
    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Account locked")]
    AccountLocked { unlock_at: Option<DateTime<Utc>> },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid or expired token: {0}")]
    TokenInvalid(#[from] TokenError),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Missing credential")]
    MissingCredential,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}

impl From<DatabaseError> for AuthError {
    fn from(err: DatabaseError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}

/// Account management failures. Unlike a login, these surface database
/// outcomes (duplicate email, stale version) to the caller unchanged.
#[derive(Error, Debug)]
pub enum AccountError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature or algorithm mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token kind does not match")]
    WrongKind,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,

    #[error("Version conflict")]
    VersionConflict,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}
