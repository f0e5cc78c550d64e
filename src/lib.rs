pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod store;

use std::sync::Arc;
use actix_web::HttpResponse;
use tracing::info;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::AuthService;
pub use db::{DbOperations, MemoryUserRepository, User, UserRepository};
pub use store::{KeyValueStore, MemoryStore, RedisStore};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserRepository>,
    pub store: Arc<dyn KeyValueStore>,
}

impl AppState {
    /// Connects to Postgres (running migrations) and Redis.
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::connect(&config.database).await?;
        info!("Connected to Postgres");
        let store = RedisStore::connect(&config.redis).await?;

        Ok(Self::with_backends(config, Arc::new(db), Arc::new(store)))
    }

    /// Wires the state over arbitrary backends, e.g. the in-memory ones.
    pub fn with_backends(
        config: Settings,
        users: Arc<dyn UserRepository>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let auth = AuthService::new(users.clone(), store.clone(), &config);
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            users,
            store,
        }
    }

    pub fn in_memory(config: Settings) -> Self {
        Self::with_backends(
            config,
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemoryStore::new()),
        )
    }
}
