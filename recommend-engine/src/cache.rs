//! Best-effort TTL cache for similarity recall results (spec.md §4.4),
//! grounded on `search-service`'s `RedisCache`.

use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

const RECALL_CACHE_TTL_SECS: u64 = 3600;

#[derive(Clone)]
pub struct RecallCache {
    redis: SharedConnectionManager,
}

impl RecallCache {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }

    fn key(seed_id: &str, size: usize) -> String {
        format!("recall:similar:{seed_id}:{size}")
    }

    /// Returns `None` on a cache miss or any transport failure — the cache
    /// is best-effort and may always be bypassed (spec.md §4.4).
    pub async fn get<T: DeserializeOwned>(&self, seed_id: &str, size: usize) -> Option<T> {
        let key = Self::key(seed_id, size);
        let mut conn = self.redis.lock().await;
        let raw: Option<String> =
            redis_utils::with_timeout(async { conn.get(&key).await })
                .await
                .unwrap_or(None);
        raw.and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Silently drops the write on failure; the next call recomputes.
    pub async fn set<T: Serialize>(&self, seed_id: &str, size: usize, value: &T) {
        let key = Self::key(seed_id, size);
        let Ok(serialized) = serde_json::to_string(value) else {
            return;
        };
        let mut conn = self.redis.lock().await;
        let result: Result<(), _> = redis_utils::with_timeout(async {
            conn.set_ex(&key, serialized, RECALL_CACHE_TTL_SECS).await
        })
        .await;
        if let Err(err) = result {
            warn!("recall cache write failed for {key}: {err}");
        }
    }
}
