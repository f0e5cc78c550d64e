//! User persistence.
//!
//! The authentication core only reads users by email; the route layer uses the
//! rest of [`UserRepository`] for CRUD.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;

pub use memory::MemoryUserRepository;
pub use models::{User, UserChanges, UserSnapshot};
pub use operations::DbOperations;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`DatabaseError::Duplicate`] when a live user already owns the email.
    async fn create_user(&self, user: &User) -> Result<User, DatabaseError>;

    /// Soft-deleted users are not returned.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Live users, newest first.
    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>, DatabaseError>;

    /// Number of live users in the window `[offset, offset + limit)` of the
    /// listing order.
    async fn count_window(&self, offset: i64, limit: i64) -> Result<i64, DatabaseError>;

    /// Applies `changes` if the stored version still equals `expected_version`
    /// and bumps the version.
    async fn update_user(
        &self,
        id: Uuid,
        expected_version: i32,
        changes: &UserChanges,
    ) -> Result<User, DatabaseError>;

    async fn soft_delete(&self, id: Uuid, expected_version: i32) -> Result<(), DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}
