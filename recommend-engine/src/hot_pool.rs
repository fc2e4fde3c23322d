//! Hot pool (C3): the cached set of globally popular videos, loaded lazily
//! and mirrored into the shared store under a well-known key.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use tracing::{info, warn};

use crate::content_index::ContentIndexClient;
use crate::models::{EngineVariant, VideoId};

/// Hot queries unioned to build the pool from scratch (spec.md §4.3).
const SEED_QUERIES: &[(Option<&str>, usize)] = &[
    (None, 700),
    (Some("india"), 200),
    (Some("bollywood"), 500),
    (Some("series"), 200),
];

/// Process-local mirror of the hot pool. Loaded once during engine
/// construction and immutable thereafter (spec.md §5): readers need no
/// synchronization.
pub struct HotPool {
    entries: Arc<HashMap<VideoId, f64>>,
}

impl HotPool {
    /// Construction protocol (spec.md §4.3): read the well-known key if it
    /// exists, otherwise build it by unioning the seed queries and persist
    /// the result.
    pub async fn load(
        redis: &SharedConnectionManager,
        content_index: &dyn ContentIndexClient,
        variant: EngineVariant,
    ) -> redis::RedisResult<Self> {
        let key = variant.hot_pool_key();

        let existing: Vec<(String, f64)> = {
            let mut conn = redis.lock().await;
            redis_utils::with_timeout(async { conn.zrange_withscores(key, 0, -1).await }).await?
        };

        if !existing.is_empty() {
            info!("hot pool loaded from existing key {key} ({} entries)", existing.len());
            let entries = existing.into_iter().collect();
            return Ok(Self {
                entries: Arc::new(entries),
            });
        }

        let mut entries = HashMap::new();
        for (tag, size) in SEED_QUERIES {
            let candidates = content_index.hot_query(*tag, *size).await;
            for candidate in candidates {
                entries.insert(candidate.video_id, candidate.score);
            }
        }

        if entries.is_empty() {
            warn!("hot pool build produced zero entries from content index");
        } else {
            let zset_args: Vec<(f64, String)> = entries
                .iter()
                .map(|(id, score)| (*score, id.clone()))
                .collect();
            let mut conn = redis.lock().await;
            let _: Result<(), _> =
                redis_utils::with_timeout(async { conn.zadd_multiple(key, &zset_args).await })
                    .await;
            info!("hot pool built and persisted under {key} ({} entries)", entries.len());
        }

        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    /// `n` members drawn uniformly without replacement, using the
    /// in-memory mirror (spec.md §4.3).
    pub fn sample_hot(&self, n: usize) -> Vec<VideoId> {
        let mut rng = rand::thread_rng();
        self.sample_hot_with(n, &mut rng)
    }

    /// Seedable variant for deterministic tests (spec.md §9 design notes).
    pub fn sample_hot_seeded(&self, n: usize, seed: u64) -> Vec<VideoId> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.sample_hot_with(n, &mut rng)
    }

    fn sample_hot_with(&self, n: usize, rng: &mut impl rand::Rng) -> Vec<VideoId> {
        let ids: Vec<&VideoId> = self.entries.keys().collect();
        ids.choose_multiple(rng, n.min(ids.len()))
            .map(|id| (*id).clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: usize) -> HotPool {
        let entries: HashMap<VideoId, f64> = (0..n)
            .map(|i| (format!("v{i}"), 7.0 + i as f64 * 0.01))
            .collect();
        HotPool {
            entries: Arc::new(entries),
        }
    }

    #[test]
    fn sample_hot_returns_requested_count_without_duplicates() {
        let pool = pool_of(50);
        let sample = pool.sample_hot_seeded(10, 42);
        assert_eq!(sample.len(), 10);
        let unique: std::collections::HashSet<_> = sample.iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn sample_hot_clamps_to_pool_size() {
        let pool = pool_of(5);
        let sample = pool.sample_hot_seeded(200, 7);
        assert_eq!(sample.len(), 5);
    }

    #[test]
    fn sample_hot_seeded_is_deterministic() {
        let pool = pool_of(100);
        let a = pool.sample_hot_seeded(20, 1234);
        let b = pool.sample_hot_seeded(20, 1234);
        assert_eq!(a, b);
    }
}
