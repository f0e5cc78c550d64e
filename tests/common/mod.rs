#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use authgate_server::error::StoreError;
use authgate_server::{AppState, KeyValueStore, MemoryUserRepository, Settings};
use std::sync::Arc;
use std::time::Duration;

/// A store that is always down.
pub struct UnreachableStore;

#[async_trait]
impl KeyValueStore for UnreachableStore {
    async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set_if_absent(&self, _: &str, _: &str, _: Duration) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn increment_with_ttl(&self, _: &str, _: Duration) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn ttl(&self, _: &str) -> Result<Option<Duration>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

pub fn state() -> web::Data<AppState> {
    let config = Settings::new_for_test().expect("Failed to load test config");
    web::Data::new(AppState::in_memory(config))
}

pub fn state_with_store_down() -> web::Data<AppState> {
    let config = Settings::new_for_test().expect("Failed to load test config");
    web::Data::new(AppState::with_backends(
        config,
        Arc::new(MemoryUserRepository::new()),
        Arc::new(UnreachableStore),
    ))
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
