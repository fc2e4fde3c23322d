//! Behavior ingestor (C6): debounces user events and enqueues ledger
//! updates (spec.md §4.6).

use redis::AsyncCommands;
use redis_utils::SharedConnectionManager;
use tracing::warn;

use crate::models::{EngineVariant, Operation};
use crate::queue::{RecommendationTask, TaskProducer};

/// Debounce marker TTL, bounding the update rate per (device, video, op)
/// triple to once per window (spec.md §3, §4.6).
const DEBOUNCE_TTL_SECS: u64 = 300;

#[derive(Clone)]
pub struct BehaviorIngestor {
    redis: SharedConnectionManager,
    producer: TaskProducer,
}

impl BehaviorIngestor {
    pub fn new(redis: SharedConnectionManager, producer: TaskProducer) -> Self {
        Self { redis, producer }
    }

    /// `ingest(device, video_id, op)`: returns immediately after enqueueing
    /// (spec.md §4.6). The V1/V2 sharding decision (spec.md §4.6) is made by
    /// the caller at merge time via `EngineVariant::for_device`; this stage
    /// only debounces and dispatches.
    pub async fn ingest(&self, device: &str, video_id: &str, op: Operation) {
        if !self.accept(device, video_id, op).await {
            return;
        }

        let task = RecommendationTask::new(device, video_id, op);
        if let Err(err) = self.producer.enqueue(&task).await {
            warn!("failed to enqueue behavior task: {err}");
        }
    }

    fn debounce_key(device: &str, video_id: &str, op: Operation) -> String {
        format!("operation|{device}|{video_id}|{}", op as i32 + 1)
    }

    /// `SET key 1 NX EX 300` — true if the marker was newly set (the event
    /// is accepted), false if it already existed (dropped) or the store is
    /// unreachable (best-effort: fails open, per spec.md §4.6 bounding a
    /// rate rather than guaranteeing exclusion).
    async fn accept(&self, device: &str, video_id: &str, op: Operation) -> bool {
        let key = Self::debounce_key(device, video_id, op);
        let mut conn = self.redis.lock().await;

        let result: redis::RedisResult<bool> = redis_utils::with_timeout(async {
            let opts = redis::SetOptions::default()
                .conditional_set(redis::ExistenceCheck::NX)
                .with_expiration(redis::SetExpiry::EX(DEBOUNCE_TTL_SECS as usize));
            conn.set_options(&key, "1", opts).await
        })
        .await;

        match result {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("debounce check failed for {key}: {err}");
                true
            }
        }
    }
}

/// Sharding rule (spec.md §4.6): the ledger variant a device is routed to.
/// A thin re-export of `EngineVariant::for_device` under the ingest
/// component's vocabulary, exercised directly by unit tests.
pub fn route(device: &str) -> EngineVariant {
    EngineVariant::for_device(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_key_matches_spec_shape() {
        let key = BehaviorIngestor::debounce_key("abc", "v1", Operation::Watch);
        assert_eq!(key, "operation|abc|v1|1");
    }

    #[test]
    fn route_matches_hex_prefix_rule() {
        assert_eq!(route("0abc"), EngineVariant::V1);
        assert_eq!(route("9abc"), EngineVariant::V2);
    }
}
