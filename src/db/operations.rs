use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::models::{User, UserChanges};
use super::UserRepository;
use crate::config::DatabaseConfig;
use crate::error::DatabaseError;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, created_at, updated_at, deleted_at, version";

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let db = Self::new_with_options(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.acquire_timeout_secs),
        )
        .await?;

        sqlx::migrate!("./migrations")
            .run(db.pool.as_ref())
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;
        info!("Database migrations applied");

        Ok(db)
    }

    /// Tells a missing row apart from a stale version after a guarded write
    /// matched nothing.
    async fn conflict_or_missing(&self, id: Uuid) -> DatabaseError {
        match self.find_by_id(id).await {
            Ok(Some(user)) if !user.is_deleted() => DatabaseError::VersionConflict,
            Ok(_) => DatabaseError::NotFound,
            Err(e) => e,
        }
    }
}

#[async_trait]
impl UserRepository for DbOperations {
    async fn create_user(&self, user: &User) -> Result<User, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.version)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            OFFSET $1 LIMIT $2
            "#
        );

        let users = sqlx::query_as::<_, User>(&query)
            .bind(offset)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(users)
    }

    async fn count_window(&self, offset: i64, limit: i64) -> Result<i64, DatabaseError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM (
                SELECT id FROM users
                WHERE deleted_at IS NULL
                ORDER BY created_at DESC, id DESC
                OFFSET $1 LIMIT $2
            ) AS page_window
            "#,
        )
        .bind(offset)
        .bind(limit)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn update_user(
        &self,
        id: Uuid,
        expected_version: i32,
        changes: &UserChanges,
    ) -> Result<User, DatabaseError> {
        let query = format!(
            r#"
            UPDATE users
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                updated_at = now(),
                version = version + 1
            WHERE id = $1 AND version = $2 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(changes.name.as_deref())
            .bind(changes.email.as_deref())
            .fetch_optional(self.pool.as_ref())
            .await?;

        match updated {
            Some(user) => Ok(user),
            None => Err(self.conflict_or_missing(id).await),
        }
    }

    async fn soft_delete(&self, id: Uuid, expected_version: i32) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = now(), updated_at = now(), version = version + 1
            WHERE id = $1 AND version = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing(id).await);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
