//! Fixed-window rate limiting over an injected counter store. The store is
//! swappable so single-instance deployments use process memory while
//! multi-instance deployments share counters through Redis.

use crate::errors::ServiceError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Counter backend for the limiter. `increment` bumps the counter for `key`
/// in the current window and returns the post-increment count.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, ServiceError>;
}

/// In-memory store; per-process counters only.
#[derive(Default)]
pub struct InMemoryStore {
    counters: DashMap<String, (Instant, u64)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, ServiceError> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert((now, 0));
        let (start, count) = *entry;
        if now.duration_since(start) >= window {
            *entry = (now, 1);
            Ok(1)
        } else {
            *entry = (start, count + 1);
            Ok(count + 1)
        }
    }
}

/// Redis-backed store for multi-instance deployments. INCR + EXPIRE on
/// first hit gives a shared fixed window.
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, ServiceError> {
        let client = redis::Client::open(url)
            .map_err(|e| ServiceError::InternalError(format!("redis client: {e}")))?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| ServiceError::InternalError(format!("redis connect: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, ServiceError> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| ServiceError::InternalError(format!("redis incr: {e}")))?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window.as_secs())
                .query_async(&mut conn)
                .await
                .map_err(|e| ServiceError::InternalError(format!("redis expire: {e}")))?;
        }
        Ok(count)
    }
}

/// Policy wrapper: at most `max_requests` per `window` per key.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, max_requests: u64, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    /// Returns Ok(()) when the request is within budget.
    pub async fn check(&self, key: &str) -> Result<(), ServiceError> {
        let count = self.store.increment(key, self.window).await?;
        if count > self.max_requests {
            debug!(%key, count, "rate limit exceeded");
            return Err(ServiceError::RateLimited);
        }
        Ok(())
    }
}
