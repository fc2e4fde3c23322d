//! Recommendation engine (C7): composes the hot pool, similarity recall,
//! and ledger store into the three externally-visible operations of
//! spec.md §4.7.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::hot_pool::HotPool;
use crate::ingest::BehaviorIngestor;
use crate::ledger::LedgerStore;
use crate::models::{EngineVariant, Operation, VideoId};
use crate::publish_resolver::PublishResolver;
use crate::recall::SimilarityRecall;

/// Candidate pool size fed into `mergeCandidates` by the worker path
/// (spec.md §4.6 dispatch).
const MERGE_RECALL_SIZE: usize = 20;

/// One deployment of the engine, bound to a single `EngineVariant`. Devices
/// are routed to a V1 or V2 instance at dispatch time via
/// `crate::ingest::route` (spec.md §4.6 sharding).
pub struct RecommendationEngine {
    variant: EngineVariant,
    hot_pool: Arc<HotPool>,
    ledger: LedgerStore,
    recall: SimilarityRecall,
    ingestor: BehaviorIngestor,
    publish_resolver: PublishResolver,
}

impl RecommendationEngine {
    pub fn new(
        variant: EngineVariant,
        hot_pool: Arc<HotPool>,
        ledger: LedgerStore,
        recall: SimilarityRecall,
        ingestor: BehaviorIngestor,
        publish_resolver: PublishResolver,
    ) -> Self {
        Self {
            variant,
            hot_pool,
            ledger,
            recall,
            ingestor,
            publish_resolver,
        }
    }

    pub fn variant(&self) -> EngineVariant {
        self.variant
    }

    /// `guessLike(seed_id, size)` (spec.md §4.7): similarity recall,
    /// falling back to a random hot-pool sample (excluding the seed) when
    /// recall is empty.
    pub async fn guess_like(&self, seed_id: &str, size: usize) -> Vec<VideoId> {
        let similar = self.recall.similar_videos(seed_id, size).await;
        if !similar.is_empty() {
            return similar.into_keys().collect();
        }

        debug!("similarity recall empty for {seed_id}, falling back to hot pool sample");
        self.hot_pool
            .sample_hot(size + 1)
            .into_iter()
            .filter(|id| id != seed_id)
            .take(size)
            .collect()
    }

    /// `guessLike` rekeyed through C8 (spec.md §4.4 "variant with publish
    /// id", surfaced by the HTTP front's `version >= 11300` envelope per
    /// spec.md §6). Entries that fail to resolve a publish id are dropped,
    /// including hot-pool fallback entries, so every returned id carries
    /// one.
    pub async fn guess_like_with_publish_id(&self, seed_id: &str, size: usize) -> Vec<VideoId> {
        let similar = self
            .recall
            .similar_videos_with_publish_id(seed_id, size, &self.publish_resolver)
            .await;
        if !similar.is_empty() {
            return similar.into_keys().collect();
        }

        debug!("similarity recall empty for {seed_id}, falling back to hot pool sample");
        let fallback: Vec<VideoId> = self
            .hot_pool
            .sample_hot(size + 1)
            .into_iter()
            .filter(|id| id != seed_id)
            .take(size)
            .collect();

        let publish_map = self.publish_resolver.resolve(&fallback).await;
        fallback
            .into_iter()
            .filter_map(|id| publish_map.get(&id).map(|pub_id| format!("{id}|{pub_id}")))
            .collect()
    }

    /// `recommend(device, size)` (spec.md §4.7): `C5.drainForRead`.
    pub async fn recommend(&self, device: &str, size: usize) -> Vec<VideoId> {
        self.ledger.drain_for_read(device, size, &self.hot_pool).await
    }

    /// `observe(device, seed_id, op)` (spec.md §4.7): `C6.ingest`. Returns
    /// immediately after enqueueing; the actual merge happens in
    /// `observe_now` when a worker dequeues the task.
    pub async fn observe(&self, device: &str, seed_id: &str, op: Operation) {
        self.ingestor.ingest(device, seed_id, op).await;
    }

    /// Worker-side execution of a dequeued task (spec.md §4.6 dispatch):
    /// `C5.mergeCandidates(device, video_id, op, C4.similarVideos(video_id, 20))`.
    pub async fn observe_now(&self, device: &str, seed_id: &str, op: Operation) {
        let candidates: HashMap<VideoId, u64> =
            self.recall.similar_videos(seed_id, MERGE_RECALL_SIZE).await;
        self.ledger.merge_candidates(device, seed_id, op, &candidates).await;
    }
}
