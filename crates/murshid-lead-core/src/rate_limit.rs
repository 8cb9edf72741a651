//! Request rate limiting
//!
//! Fixed-window counter per client key. The remote backend (Upstash-style
//! Redis REST) keeps the window consistent across instances via an atomic
//! `INCR` plus a conditional `EXPIRE`; when it is absent or unreachable
//! the limiter transparently falls back to an in-process map. The
//! fallback is best-effort abuse mitigation, not a security boundary.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::error::LeadError;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// A counting backend: atomically increment `key`'s counter within the
/// current fixed window, returning the post-increment count.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, LeadError>;
}

/// One window's state for a key.
#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u64,
    /// Epoch milliseconds when the window resets
    reset_at_ms: u128,
}

/// In-process fallback backend. No cross-instance consistency.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, WindowRecord>>,
}

#[async_trait]
impl RateLimitBackend for MemoryBackend {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, LeadError> {
        let now_ms = epoch_ms();
        let mut records = self.records.write().await;

        // Lazy sweep: expired windows are reclaimed when observed.
        records.retain(|_, record| record.reset_at_ms > now_ms);

        let record = records.entry(key.to_string()).or_insert(WindowRecord {
            count: 0,
            reset_at_ms: now_ms + window.as_millis(),
        });
        record.count += 1;
        Ok(record.count)
    }
}

impl MemoryBackend {
    /// Number of live (non-expired) keys. For tests.
    pub async fn key_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[derive(Debug, Deserialize)]
struct PipelineResult {
    result: serde_json::Value,
}

/// Upstash-style Redis REST backend: `INCR` + `EXPIRE NX` in one pipeline
/// call, so the expiry is only set when the key is created.
pub struct RedisRestBackend {
    client: Client,
    url: String,
    token: String,
}

impl RedisRestBackend {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl RateLimitBackend for RedisRestBackend {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, LeadError> {
        let window_secs = window.as_secs().max(1).to_string();
        let commands = json!([
            ["INCR", key],
            ["EXPIRE", key, window_secs, "NX"],
        ]);

        let response = self
            .client
            .post(format!("{}/pipeline", self.url.trim_end_matches('/')))
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(5))
            .json(&commands)
            .send()
            .await
            .map_err(|e| LeadError::Provider(format!("rate limit backend: {e}")))?;

        if !response.status().is_success() {
            return Err(LeadError::Provider(format!(
                "rate limit backend status {}",
                response.status()
            )));
        }

        let results: Vec<PipelineResult> = response
            .json()
            .await
            .map_err(|e| LeadError::Provider(format!("rate limit backend: {e}")))?;

        results
            .first()
            .and_then(|r| r.result.as_u64())
            .ok_or_else(|| LeadError::Provider("rate limit backend returned no count".into()))
    }
}

impl std::fmt::Debug for RedisRestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRestBackend")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Fixed-window rate limiter with remote backend and in-memory fallback.
pub struct RateLimiter {
    config: RateLimitConfig,
    remote: Option<RedisRestBackend>,
    memory: MemoryBackend,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let remote = match (&config.redis_rest_url, &config.redis_rest_token) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => {
                Some(RedisRestBackend::new(url.clone(), token.clone()))
            }
            _ => None,
        };
        Self {
            config,
            remote,
            memory: MemoryBackend::default(),
        }
    }

    /// Check one request for `key`. Never errors: a failing remote backend
    /// falls back to the in-memory counter.
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        let count = match &self.remote {
            Some(remote) => match remote.increment(key, self.config.window).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "Remote rate limit backend failed, using in-memory fallback");
                    self.fallback_count(key).await
                }
            },
            None => self.fallback_count(key).await,
        };

        let max = u64::from(self.config.max_requests);
        let decision = RateLimitDecision {
            allowed: count <= max,
            remaining: max.saturating_sub(count) as u32,
        };
        if !decision.allowed {
            debug!(key, count, max, "Rate limit exceeded");
            metrics::counter!("rate_limit_rejections_total").increment(1);
        }
        decision
    }

    async fn fallback_count(&self, key: &str) -> u64 {
        self.memory
            .increment(key, self.config.window)
            .await
            .unwrap_or(1)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.config.max_requests)
            .field("window", &self.config.window)
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests: max,
            window,
            redis_rest_url: None,
            redis_rest_token: None,
        })
    }

    #[tokio::test]
    async fn first_request_is_allowed_with_decremented_remaining() {
        let limiter = limiter(15, Duration::from_secs(3600));
        let decision = limiter.check("203.0.113.9").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 14);
    }

    #[tokio::test]
    async fn request_over_the_maximum_is_rejected() {
        let limiter = limiter(3, Duration::from_secs(3600));
        for _ in 0..3 {
            assert!(limiter.check("key").await.allowed);
        }
        let decision = limiter.check("key").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_count() {
        let limiter = limiter(1, Duration::from_millis(50));
        assert!(limiter.check("key").await.allowed);
        assert!(!limiter.check("key").await.allowed);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.check("key").await.allowed);
    }

    #[tokio::test]
    async fn keys_are_tracked_independently() {
        let limiter = limiter(1, Duration::from_secs(3600));
        assert!(limiter.check("a").await.allowed);
        assert!(limiter.check("b").await.allowed);
        assert!(!limiter.check("a").await.allowed);
    }

    #[tokio::test]
    async fn unreachable_remote_backend_falls_back_to_memory() {
        // Closed port: every remote increment fails with a connect error.
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 2,
            window: Duration::from_secs(3600),
            redis_rest_url: Some("http://127.0.0.1:9".to_string()),
            redis_rest_token: Some("token".to_string()),
        });

        assert!(limiter.check("203.0.113.9").await.allowed);
        assert!(limiter.check("203.0.113.9").await.allowed);
        // The window is still enforced through the in-memory counter.
        let decision = limiter.check("203.0.113.9").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn expired_records_are_swept_on_later_checks() {
        let backend = MemoryBackend::default();
        backend.increment("old", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        backend.increment("new", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.key_count().await, 1);
    }
}
