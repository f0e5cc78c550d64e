use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{User, UserChanges};
use super::UserRepository;
use crate::error::DatabaseError;

/// In-process user store with the same contract as the Postgres one. Users
/// are kept in insertion order, so "newest first" is the reverse.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<RwLock<Vec<User>>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_newest_first(users: &[User]) -> impl Iterator<Item = &User> {
        users.iter().rev().filter(|u| !u.is_deleted())
    }

    fn email_taken(users: &[User], email: &str, except: Option<Uuid>) -> bool {
        users
            .iter()
            .any(|u| !u.is_deleted() && u.email == email && Some(u.id) != except)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create_user(&self, user: &User) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;
        if Self::email_taken(&users, &user.email, None) {
            return Err(DatabaseError::Duplicate);
        }
        users.push(user.clone());
        Ok(user.clone())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| !u.is_deleted() && u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>, DatabaseError> {
        let users = self.users.read().await;
        Ok(Self::live_newest_first(&users)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_window(&self, offset: i64, limit: i64) -> Result<i64, DatabaseError> {
        let users = self.users.read().await;
        Ok(Self::live_newest_first(&users)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .count() as i64)
    }

    async fn update_user(
        &self,
        id: Uuid,
        expected_version: i32,
        changes: &UserChanges,
    ) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if Self::email_taken(&users, email, Some(id)) {
                return Err(DatabaseError::Duplicate);
            }
        }

        let user = users
            .iter_mut()
            .find(|u| u.id == id && !u.is_deleted())
            .ok_or(DatabaseError::NotFound)?;
        if user.version != expected_version {
            return Err(DatabaseError::VersionConflict);
        }

        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        user.updated_at = Utc::now();
        user.version += 1;

        Ok(user.clone())
    }

    async fn soft_delete(&self, id: Uuid, expected_version: i32) -> Result<(), DatabaseError> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id && !u.is_deleted())
            .ok_or(DatabaseError::NotFound)?;
        if user.version != expected_version {
            return Err(DatabaseError::VersionConflict);
        }

        let now = Utc::now();
        user.deleted_at = Some(now);
        user.updated_at = now;
        user.version += 1;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
