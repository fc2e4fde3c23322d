//! Content index client (C2): hot-video and tag-match queries against the
//! external full-text search store.

mod elasticsearch_client;

pub use elasticsearch_client::ElasticsearchContentIndex;

use async_trait::async_trait;

use crate::models::{TagSet, VideoId};

/// Minimum view count for a video to be admitted to a hot query result
/// (spec.md §4.2).
pub const HOT_ADMISSION_THRESHOLD: u64 = 20_000_000;

/// Minimum popularity for a video to survive a tag-match query (spec.md §4.2).
pub const TAG_MATCH_POPULARITY_FLOOR: u64 = 100_000;

/// Minimum relevance score the content index itself imposes on tag-match
/// queries (spec.md §4.2).
pub const TAG_MATCH_MIN_SCORE: f64 = 20.0;

/// A hot-query result already filtered by `HOT_ADMISSION_THRESHOLD` and
/// scored as `log10(hot)`, per spec.md §4.2.
#[derive(Debug, Clone, PartialEq)]
pub struct HotCandidate {
    pub video_id: VideoId,
    pub score: f64,
}

/// A tag-match result carrying raw `hot`, already filtered to
/// `hot > TAG_MATCH_POPULARITY_FLOOR`, per spec.md §4.2.
#[derive(Debug, Clone, PartialEq)]
pub struct TagMatchCandidate {
    pub video_id: VideoId,
    pub hot: u64,
}

/// A video's tag-extraction metadata as stored in the content index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDocument {
    pub title: String,
    pub tags: Vec<String>,
}

/// Contract consumed by the hot pool (C3) and similarity recall (C4).
///
/// Implementations MUST be idempotent and side-effect-free; on transport
/// failure they return an empty result, never a partial one (spec.md §4.2).
#[async_trait]
pub trait ContentIndexClient: Send + Sync {
    /// Documents of `type=mv`, `genre=youtube` where `tag` optionally
    /// matches, sorted by `hot` descending, truncated to `size`.
    async fn hot_query(&self, tag: Option<&str>, size: usize) -> Vec<HotCandidate>;

    /// Boolean query: MUST `type=mv`, `genre=youtube`, `status=1`, SHOULD
    /// over `tags` (at least one must match).
    async fn tag_match_query(&self, tags: &TagSet, size: usize) -> Vec<TagMatchCandidate>;

    /// Fetch a video's `{tag, title}` document for tag extraction. Returns
    /// `None` if the document cannot be retrieved; callers MUST treat that
    /// identically to "no tags" (spec.md §4.1).
    async fn get_video(&self, video_id: &str) -> Option<VideoDocument>;
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory stand-in for the content index used by unit tests.
    #[derive(Default)]
    pub struct FakeContentIndex {
        pub hot: Mutex<Vec<HotCandidate>>,
        pub tag_matches: Mutex<HashMap<String, Vec<TagMatchCandidate>>>,
        pub documents: Mutex<HashMap<String, VideoDocument>>,
    }

    #[async_trait]
    impl ContentIndexClient for FakeContentIndex {
        async fn hot_query(&self, _tag: Option<&str>, size: usize) -> Vec<HotCandidate> {
            let hot = self.hot.lock().await;
            hot.iter().take(size).cloned().collect()
        }

        async fn tag_match_query(&self, tags: &TagSet, size: usize) -> Vec<TagMatchCandidate> {
            let matches = self.tag_matches.lock().await;
            let mut key: Vec<&str> = tags.iter().map(|s| s.as_str()).collect();
            key.sort();
            matches
                .get(&key.join(","))
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .take(size)
                .collect()
        }

        async fn get_video(&self, video_id: &str) -> Option<VideoDocument> {
            let docs = self.documents.lock().await;
            docs.get(video_id).cloned()
        }
    }
}
