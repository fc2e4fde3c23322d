//! Per-device recommendation ledger (C5): the central component. A sorted
//! set per device encoding both "pending to recommend" and "recently
//! served" items under the sign convention from spec.md §3.

use std::collections::HashMap;

use chrono::Utc;
use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use tracing::warn;

use crate::hot_pool::HotPool;
use crate::models::{EngineVariant, Operation, VideoId};

/// Ledger reads are capped at this many entries (spec.md §4.5 step 1).
const MAX_LEDGER_READ: isize = 1000;

/// Members drawn from the hot pool to seed an empty ledger (spec.md §4.5
/// `drainForRead` step 2).
const COLD_START_SAMPLE: usize = 200;

/// Score assigned to cold-start entries that are seeded but not returned.
const COLD_START_SEED_SCORE: f64 = 1.0;

/// Epoch offset subtracted from `now_unix` in both served-score encodings
/// (spec.md §4.5).
const SERVED_SCORE_EPOCH: i64 = 2_147_483_647;

/// V2's rescale divisor, keeping served scores from dominating positive
/// merge results (spec.md §4.5).
const V2_SERVED_SCORE_DIVISOR: f64 = 2e8;

#[derive(Debug, Clone)]
pub struct LedgerCaps {
    pub pending_cap: usize,
    pub served_cap: usize,
    pub ttl_secs: i64,
}

impl Default for LedgerCaps {
    fn default() -> Self {
        Self {
            pending_cap: 500,
            served_cap: 500,
            ttl_secs: 2_592_000,
        }
    }
}

/// Served-score encoding as a pure function of `now_unix`, exercised
/// directly by unit tests without a Redis connection.
fn served_score_at(variant: EngineVariant, now_unix: i64) -> f64 {
    let base = (now_unix - SERVED_SCORE_EPOCH) as f64;
    match variant {
        EngineVariant::V1 => base,
        EngineVariant::V2 => base / V2_SERVED_SCORE_DIVISOR,
    }
}

/// Steps 2-6 of `mergeCandidates` (spec.md §4.5), isolated as a pure
/// function so the algorithm is testable without a Redis connection. Takes
/// ownership of the read-back ledger as `working` and returns the
/// `(score, video_id)` pairs to write back, already capped.
fn compute_merge(
    mut working: HashMap<VideoId, f64>,
    seed_id: &str,
    served_score_now: f64,
    operation: Operation,
    candidates: &HashMap<VideoId, u64>,
    variant: EngineVariant,
    caps: &LedgerCaps,
) -> Vec<(f64, String)> {
    // Step 3: force the just-interacted video into the served half.
    working.insert(seed_id.to_string(), served_score_now);

    // Step 4: fold candidates in.
    let weight = operation.weight();
    for (cand_id, popularity) in candidates {
        if *popularity == 0 {
            continue;
        }
        let log_pop = (*popularity as f64).log10();
        let applies_increment = match variant {
            EngineVariant::V1 => working.get(cand_id).is_some_and(|score| *score > 0.0),
            EngineVariant::V2 => working.contains_key(cand_id),
        };

        if applies_increment {
            *working.get_mut(cand_id).unwrap() += weight * log_pop;
        } else {
            working.insert(cand_id.clone(), log_pop);
        }
    }

    // Step 5: sort descending by score.
    let mut sorted: Vec<(VideoId, f64)> = working.into_iter().collect();
    sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    // Step 6: admit into bounded pending/served pools.
    let mut pending = Vec::with_capacity(caps.pending_cap);
    let mut served = Vec::with_capacity(caps.served_cap);
    for (id, score) in sorted {
        if score > 0.0 {
            if pending.len() < caps.pending_cap {
                pending.push((id, score));
            }
        } else if served.len() < caps.served_cap {
            served.push((id, score));
        }
    }

    pending
        .into_iter()
        .chain(served)
        .map(|(id, score)| (score, id))
        .collect()
}

pub struct LedgerStore {
    redis: SharedConnectionManager,
    variant: EngineVariant,
    caps: LedgerCaps,
}

impl LedgerStore {
    pub fn new(redis: SharedConnectionManager, variant: EngineVariant, caps: LedgerCaps) -> Self {
        Self {
            redis,
            variant,
            caps,
        }
    }

    fn key(&self, device: &str) -> String {
        self.variant.ledger_key(device)
    }

    /// `served_score` for "now", per the chosen encoding (spec.md §4.5).
    fn served_score_now(&self) -> f64 {
        served_score_at(self.variant, Utc::now().timestamp())
    }

    /// `topPending(device, n)`: up to `n` members with score ≥ 0, highest
    /// first. Returns empty on transport failure (spec.md §4.5 failure
    /// semantics).
    pub async fn top_pending(&self, device: &str, n: isize) -> Vec<VideoId> {
        let key = self.key(device);
        let mut conn = self.redis.lock().await;
        let result: redis::RedisResult<Vec<(String, f64)>> =
            redis_utils::with_timeout(async {
                conn.zrevrangebyscore_limit_withscores(&key, f64::INFINITY, 0.0, 0, n)
                    .await
            })
            .await;

        match result {
            Ok(pairs) => pairs.into_iter().map(|(id, _)| id).collect(),
            Err(err) => {
                warn!("top_pending failed for {key}: {err}");
                Vec::new()
            }
        }
    }

    /// `markServed(device, ids)`: rewrite each id's score to the current
    /// served score. Silently drops on failure (spec.md §4.5).
    pub async fn mark_served(&self, device: &str, ids: &[VideoId]) {
        if ids.is_empty() {
            return;
        }
        let key = self.key(device);
        let served = self.served_score_now();
        let members: Vec<(f64, &str)> = ids.iter().map(|id| (served, id.as_str())).collect();

        let mut conn = self.redis.lock().await;
        let result: redis::RedisResult<()> =
            redis_utils::with_timeout(async { conn.zadd_multiple(&key, &members).await }).await;
        if let Err(err) = result {
            warn!("mark_served failed for {key}: {err}");
        }
    }

    /// `mergeCandidates(device, seed_id, operation, candidates)`: the
    /// behavior-event update (spec.md §4.5).
    pub async fn merge_candidates(
        &self,
        device: &str,
        seed_id: &str,
        operation: Operation,
        candidates: &HashMap<VideoId, u64>,
    ) {
        let key = self.key(device);

        let existing: redis::RedisResult<Vec<(String, f64)>> = {
            let mut conn = self.redis.lock().await;
            redis_utils::with_timeout(async {
                conn.zrevrange_withscores(&key, 0, MAX_LEDGER_READ - 1).await
            })
            .await
        };

        let existing = match existing {
            Ok(entries) => entries,
            Err(err) => {
                warn!("merge_candidates read failed for {key}: {err}");
                return;
            }
        };

        // Step 1: empty ledger means the device has no recommendation
        // history to merge into; do not create one here.
        if existing.is_empty() {
            return;
        }

        let members = compute_merge(
            existing.into_iter().collect(),
            seed_id,
            self.served_score_now(),
            operation,
            candidates,
            self.variant,
            &self.caps,
        );
        if members.is_empty() {
            return;
        }

        let mut conn = self.redis.lock().await;
        let result: redis::RedisResult<()> = redis_utils::with_timeout(async {
            let mut pipe = redis::pipe();
            pipe.atomic().del(&key).ignore().zadd_multiple(&key, &members);
            pipe.query_async(&mut *conn).await
        })
        .await;
        if let Err(err) = result {
            warn!("merge_candidates atomic replace failed for {key}: {err}");
        }
    }

    /// `drainForRead(device, n)`: the read path (spec.md §4.5).
    pub async fn drain_for_read(&self, device: &str, n: usize, hot_pool: &HotPool) -> Vec<VideoId> {
        let fetched = self.top_pending(device, n as isize).await;

        let result = if fetched.is_empty() {
            self.cold_start(device, n, hot_pool).await
        } else {
            fetched
        };

        if !result.is_empty() {
            self.mark_served(device, &result).await;
        }

        result
    }

    async fn cold_start(&self, device: &str, n: usize, hot_pool: &HotPool) -> Vec<VideoId> {
        let key = self.key(device);

        {
            let mut conn = self.redis.lock().await;
            let _: redis::RedisResult<()> =
                redis_utils::with_timeout(async { conn.del(&key).await }).await;
        }

        let sample = hot_pool.sample_hot(COLD_START_SAMPLE);
        let take = n.min(sample.len());
        let (result, remainder) = sample.split_at(take);

        if !remainder.is_empty() {
            let members: Vec<(f64, &str)> = remainder
                .iter()
                .map(|id| (COLD_START_SEED_SCORE, id.as_str()))
                .collect();
            let mut conn = self.redis.lock().await;
            let seeded: redis::RedisResult<()> = redis_utils::with_timeout(async {
                conn.zadd_multiple(&key, &members).await
            })
            .await;
            if seeded.is_ok() {
                let _: redis::RedisResult<()> = redis_utils::with_timeout(async {
                    conn.expire(&key, self.caps.ttl_secs).await
                })
                .await;
            } else if let Err(err) = seeded {
                warn!("cold_start seed failed for {key}: {err}");
            }
        }

        result.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_900_000_000;

    #[test]
    fn v1_served_score_is_negative_and_unscaled() {
        let score = served_score_at(EngineVariant::V1, NOW);
        assert!(score < 0.0);
        assert!(score.abs() > 1_000.0);
    }

    #[test]
    fn v2_served_score_is_negative_and_rescaled() {
        let v1 = served_score_at(EngineVariant::V1, NOW);
        let v2 = served_score_at(EngineVariant::V2, NOW);
        assert!(v2 < 0.0);
        assert!(v2.abs() < v1.abs());
    }

    fn ledger_of(pairs: &[(&str, f64)]) -> HashMap<VideoId, f64> {
        pairs
            .iter()
            .map(|(id, score)| (id.to_string(), *score))
            .collect()
    }

    fn score_of(members: &[(f64, String)], id: &str) -> f64 {
        members
            .iter()
            .find(|(_, member)| member == id)
            .map(|(score, _)| *score)
            .unwrap_or_else(|| panic!("{id} missing from merge result"))
    }

    /// Scenario 3 (spec.md §8): behavior boost via `share`.
    #[test]
    fn merge_candidates_behavior_boost() {
        let existing = ledger_of(&[("v1", 2.0), ("v2", 1.5), ("v3", 1.0)]);
        let mut candidates = HashMap::new();
        candidates.insert("v2".to_string(), 1_000_000u64);
        candidates.insert("v4".to_string(), 100_000u64);

        let served_now = -42.0;
        let members = compute_merge(
            existing,
            "vseed",
            served_now,
            Operation::Share,
            &candidates,
            EngineVariant::V1,
            &LedgerCaps::default(),
        );

        assert!((score_of(&members, "v2") - 3.3).abs() < 1e-9);
        assert!((score_of(&members, "v4") - 5.0).abs() < 1e-9);
        assert_eq!(score_of(&members, "vseed"), served_now);
        assert_eq!(score_of(&members, "v1"), 2.0);
        assert_eq!(score_of(&members, "v3"), 1.0);
    }

    /// Scenario 5 (spec.md §8): same setup with `dislike` instead of `share`.
    /// Applies `operationWeight[op] * log10(popularity)` per §4.5 step 4:
    /// `1.5 + (-0.5 * log10(1e6)) = 1.5 - 3.0 = -1.5`.
    #[test]
    fn merge_candidates_dislike_demotes() {
        let existing = ledger_of(&[("v1", 2.0), ("v2", 1.5), ("v3", 1.0)]);
        let mut candidates = HashMap::new();
        candidates.insert("v2".to_string(), 1_000_000u64);
        candidates.insert("v4".to_string(), 100_000u64);

        let members = compute_merge(
            existing,
            "vseed",
            -42.0,
            Operation::Dislike,
            &candidates,
            EngineVariant::V1,
            &LedgerCaps::default(),
        );

        assert!((score_of(&members, "v2") - (-1.5)).abs() < 1e-9);
        assert!((score_of(&members, "v4") - 5.0).abs() < 1e-9);
    }

    #[test]
    fn merge_candidates_v2_increments_unconditionally() {
        // v2 starts served (score <= 0); V1 would overwrite it, V2 increments.
        let existing = ledger_of(&[("v2", -3.0)]);
        let mut candidates = HashMap::new();
        candidates.insert("v2".to_string(), 1_000_000u64);

        let members = compute_merge(
            existing,
            "vseed",
            -42.0,
            Operation::Watch,
            &candidates,
            EngineVariant::V2,
            &LedgerCaps::default(),
        );

        let expected = -3.0 + Operation::Watch.weight() * 6.0_f64.log10();
        assert!((score_of(&members, "v2") - expected).abs() < 1e-9);
    }

    /// Invariant 1 (spec.md §8): bounded pending/served pools after merge.
    #[test]
    fn merge_candidates_enforces_caps() {
        let mut existing = HashMap::new();
        for i in 0..10 {
            existing.insert(format!("pending{i}"), 1.0 + i as f64);
        }
        for i in 0..10 {
            existing.insert(format!("served{i}"), -(1.0 + i as f64));
        }

        let caps = LedgerCaps {
            pending_cap: 5,
            served_cap: 5,
            ttl_secs: 2_592_000,
        };
        let members = compute_merge(
            existing,
            "seed-not-present",
            -42.0,
            Operation::Watch,
            &HashMap::new(),
            EngineVariant::V1,
            &caps,
        );

        let pending_count = members.iter().filter(|(score, _)| *score > 0.0).count();
        let served_count = members.iter().filter(|(score, _)| *score <= 0.0).count();
        assert_eq!(pending_count, 5);
        assert_eq!(served_count, 5);
    }
}
