use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

use super::{ttl_secs, KeyValueStore};
use crate::config::RedisConfig;
use crate::error::StoreError;

/// Redis-backed store. The connection manager reconnects on its own; each
/// command is bounded by `operation_timeout` so a stalled Redis fails the
/// request instead of hanging it.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    operation_timeout: Duration,
}

impl RedisStore {
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str())?;
        let timeout = config.operation_timeout();

        let manager = tokio::time::timeout(timeout * 10, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Timeout(timeout * 10))??;

        let store = Self {
            manager,
            operation_timeout: timeout,
        };
        store.ping().await?;
        info!("Connected to Redis");

        Ok(store)
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Redis {} failed: {}", op, e);
                Err(e.into())
            }
            Err(_) => {
                error!("Redis {} timed out after {:?}", op, self.operation_timeout);
                Err(StoreError::Timeout(self.operation_timeout))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.manager.clone();
        self.bounded("GET", async move { con.get(key).await }).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        self.bounded("SETEX", async move { con.set_ex(key, value, ttl_secs(ttl)).await })
            .await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut con = self.manager.clone();
        let secs = ttl_secs(ttl);

        // SET NX replies nil when the key already exists.
        let reply: Option<String> = self
            .bounded("SET NX", async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(secs)
                    .query_async(&mut con)
                    .await
            })
            .await?;

        Ok(reply.is_some())
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let mut con = self.manager.clone();
        let expire_secs = ttl_secs(ttl) as i64;

        // MULTI/EXEC keeps the increment and the expiry refresh indivisible.
        let (count,): (i64,) = self
            .bounded("INCR", async move {
                let mut pipe = redis::pipe();
                pipe.atomic().incr(key, 1).expire(key, expire_secs).ignore();
                pipe.query_async(&mut con).await
            })
            .await?;

        Ok(count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut con = self.manager.clone();
        let millis: i64 = self
            .bounded("PTTL", async move { con.pttl(key).await })
            .await?;

        // -2: no such key, -1: key without expiry.
        if millis < 0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_millis(millis as u64)))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        self.bounded("DEL", async move { con.del(key).await }).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        let _: String = self
            .bounded("PING", async move { redis::cmd("PING").query_async(&mut con).await })
            .await?;
        Ok(())
    }
}
