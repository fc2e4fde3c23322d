//! Similarity recall (C4): turns a seed video into a tag set and uses it to
//! retrieve candidate videos from the content index.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::RecallCache;
use crate::content_index::ContentIndexClient;
use crate::publish_resolver::PublishResolver;
use crate::tags::extract_tags;
use crate::models::VideoId;

/// `(video_id, popularity)` candidates returned by similarity recall.
pub type SimilarVideos = HashMap<VideoId, u64>;

#[derive(Serialize, Deserialize)]
struct CachedSimilarVideos(Vec<(VideoId, u64)>);

#[derive(Clone)]
pub struct SimilarityRecall {
    content_index: Arc<dyn ContentIndexClient>,
    cache: Option<RecallCache>,
}

impl SimilarityRecall {
    pub fn new(content_index: Arc<dyn ContentIndexClient>, cache: Option<RecallCache>) -> Self {
        Self {
            content_index,
            cache,
        }
    }

    /// Protocol (spec.md §4.4):
    /// 1. Extract tags from `seed_id`. Empty tags → empty map.
    /// 2. Issue a tag-match query of `size`. Empty → empty map.
    /// 3. Remove `seed_id` if present.
    /// 4. Return the `(id, hot)` map.
    ///
    /// Cacheable for 3600s keyed by `(seed_id, size)`; best-effort, may be
    /// bypassed.
    pub async fn similar_videos(&self, seed_id: &str, size: usize) -> SimilarVideos {
        if let Some(cache) = &self.cache {
            if let Some(CachedSimilarVideos(entries)) = cache.get(seed_id, size).await {
                return entries.into_iter().collect();
            }
        }

        let result = self.similar_videos_uncached(seed_id, size).await;

        if let Some(cache) = &self.cache {
            let entries: Vec<(VideoId, u64)> =
                result.iter().map(|(k, v)| (k.clone(), *v)).collect();
            cache.set(seed_id, size, &CachedSimilarVideos(entries)).await;
        }

        result
    }

    async fn similar_videos_uncached(&self, seed_id: &str, size: usize) -> SimilarVideos {
        let Some(doc) = self.content_index.get_video(seed_id).await else {
            return SimilarVideos::new();
        };

        let tags = extract_tags(&doc.title, &doc.tags);
        if tags.is_empty() {
            return SimilarVideos::new();
        }

        let matches = self.content_index.tag_match_query(&tags, size).await;
        if matches.is_empty() {
            return SimilarVideos::new();
        }

        matches
            .into_iter()
            .filter(|m| m.video_id != seed_id)
            .map(|m| (m.video_id, m.hot))
            .collect()
    }

    /// Variant "with publish id" (spec.md §4.4): rekeys entries to
    /// `"{id}|{publish_id}"`, dropping entries that fail to resolve.
    pub async fn similar_videos_with_publish_id(
        &self,
        seed_id: &str,
        size: usize,
        publish_resolver: &PublishResolver,
    ) -> SimilarVideos {
        let base = self.similar_videos(seed_id, size).await;
        if base.is_empty() {
            return base;
        }

        let ids: Vec<VideoId> = base.keys().cloned().collect();
        let publish_map = publish_resolver.resolve(&ids).await;

        base.into_iter()
            .filter_map(|(id, hot)| {
                publish_map
                    .get(&id)
                    .map(|pub_id| (format!("{id}|{pub_id}"), hot))
            })
            .collect()
    }
}

impl std::fmt::Debug for SimilarityRecall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityRecall").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_index::test_support::FakeContentIndex;
    use crate::content_index::{TagMatchCandidate, VideoDocument};
    use std::collections::HashMap as StdHashMap;
    use tokio::sync::Mutex;

    fn index_with(doc: VideoDocument, matches: Vec<TagMatchCandidate>, tag_key: &str) -> FakeContentIndex {
        let mut documents = StdHashMap::new();
        documents.insert("seed".to_string(), doc);

        let mut tag_matches = StdHashMap::new();
        tag_matches.insert(tag_key.to_string(), matches);

        FakeContentIndex {
            hot: Mutex::new(Vec::new()),
            tag_matches: Mutex::new(tag_matches),
            documents: Mutex::new(documents),
        }
    }

    #[tokio::test]
    async fn similar_videos_never_returns_seed_itself() {
        let doc = VideoDocument {
            title: "great show".to_string(),
            tags: vec!["bollywood".to_string()],
        };
        let matches = vec![
            TagMatchCandidate {
                video_id: "seed".to_string(),
                hot: 200_000,
            },
            TagMatchCandidate {
                video_id: "other".to_string(),
                hot: 300_000,
            },
        ];
        let index = index_with(doc, matches, "bollywood,great,show");
        let recall = SimilarityRecall::new(Arc::new(index), None);

        let result = recall.similar_videos("seed", 10).await;
        assert!(!result.contains_key("seed"));
        assert_eq!(result.get("other"), Some(&300_000));
    }

    #[tokio::test]
    async fn untagged_seed_returns_empty() {
        let doc = VideoDocument {
            title: "".to_string(),
            tags: vec![],
        };
        let index = index_with(doc, vec![], "");
        let recall = SimilarityRecall::new(Arc::new(index), None);

        let result = recall.similar_videos("seed", 10).await;
        assert!(result.is_empty());
    }
}
