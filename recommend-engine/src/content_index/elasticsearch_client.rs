use elasticsearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    Elasticsearch, GetParts, SearchParts,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use url::Url;

use super::{
    ContentIndexClient, HotCandidate, TagMatchCandidate, VideoDocument, HOT_ADMISSION_THRESHOLD,
    TAG_MATCH_MIN_SCORE, TAG_MATCH_POPULARITY_FLOOR,
};
use crate::error::EngineError;
use crate::models::TagSet;
use async_trait::async_trait;

impl From<url::ParseError> for EngineError {
    fn from(err: url::ParseError) -> Self {
        EngineError::ContentIndex(format!("invalid content index URL: {err}"))
    }
}

impl From<elasticsearch::http::transport::BuildError> for EngineError {
    fn from(err: elasticsearch::http::transport::BuildError) -> Self {
        EngineError::ContentIndex(format!("failed to build transport: {err}"))
    }
}

/// Content index client backed by Elasticsearch (spec.md §4.2), grounded on
/// the same client crate `search-service` uses for full-text search.
#[derive(Clone)]
pub struct ElasticsearchContentIndex {
    client: Elasticsearch,
    video_index: String,
}

#[derive(Debug, Deserialize)]
struct HotSource {
    hot: u64,
}

#[derive(Debug, Deserialize)]
struct TagMatchSource {
    hot: u64,
}

#[derive(Debug, Deserialize)]
struct SourceHit<T> {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: T,
}

#[derive(Debug, Deserialize)]
struct Hits<T> {
    hits: Vec<SourceHit<T>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    hits: Hits<T>,
}

#[derive(Debug, Deserialize)]
struct VideoDocSource {
    #[serde(default)]
    title: String,
    #[serde(default)]
    tag: Vec<String>,
}

impl ElasticsearchContentIndex {
    pub fn new(url: &str, video_index: &str) -> Result<Self, EngineError> {
        let parsed = Url::parse(url)?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool).build()?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            video_index: video_index.to_string(),
        })
    }
}

#[async_trait]
impl ContentIndexClient for ElasticsearchContentIndex {
    async fn hot_query(&self, tag: Option<&str>, size: usize) -> Vec<HotCandidate> {
        let mut must = vec![
            json!({ "term": { "type": "mv" } }),
            json!({ "term": { "genre": "youtube" } }),
        ];
        if let Some(tag) = tag {
            must.push(json!({ "term": { "tag": tag } }));
        }

        let body = json!({
            "size": size,
            "query": { "bool": { "must": must } },
            "_source": ["hot"],
            "sort": [{ "hot": { "order": "desc" } }],
        });

        let response = match self
            .client
            .search(SearchParts::Index(&[self.video_index.as_str()]))
            .body(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                warn!("content index hot query failed: {err}");
                return Vec::new();
            }
        };

        if !response.status_code().is_success() {
            return Vec::new();
        }

        let parsed: SearchResponse<HotSource> = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("content index hot query decode failed: {err}");
                return Vec::new();
            }
        };

        parsed
            .hits
            .hits
            .into_iter()
            .filter(|hit| hit.source.hot >= HOT_ADMISSION_THRESHOLD)
            .map(|hit| HotCandidate {
                video_id: hit.id,
                score: (hit.source.hot as f64).log10(),
            })
            .collect()
    }

    async fn tag_match_query(&self, tags: &TagSet, size: usize) -> Vec<TagMatchCandidate> {
        if tags.is_empty() {
            return Vec::new();
        }

        let should: Vec<_> = tags.iter().map(|t| json!({ "term": { "tag": t } })).collect();

        let body = json!({
            "size": size,
            "min_score": TAG_MATCH_MIN_SCORE,
            "query": {
                "bool": {
                    "must": [
                        { "term": { "type": "mv" } },
                        { "term": { "genre": "youtube" } },
                        { "term": { "status": 1 } },
                        { "bool": { "should": should } },
                    ]
                }
            },
            "_source": ["hot"],
        });

        let response = match self
            .client
            .search(SearchParts::Index(&[self.video_index.as_str()]))
            .body(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                warn!("content index tag-match query failed: {err}");
                return Vec::new();
            }
        };

        if !response.status_code().is_success() {
            return Vec::new();
        }

        let parsed: SearchResponse<TagMatchSource> = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("content index tag-match query decode failed: {err}");
                return Vec::new();
            }
        };

        parsed
            .hits
            .hits
            .into_iter()
            .filter(|hit| hit.source.hot > TAG_MATCH_POPULARITY_FLOOR)
            .map(|hit| TagMatchCandidate {
                video_id: hit.id,
                hot: hit.source.hot,
            })
            .collect()
    }

    async fn get_video(&self, video_id: &str) -> Option<VideoDocument> {
        let response = self
            .client
            .get(GetParts::IndexId(&self.video_index, video_id))
            .send()
            .await
            .ok()?;

        if !response.status_code().is_success() {
            return None;
        }

        #[derive(Debug, Deserialize)]
        struct GetResponse {
            #[serde(rename = "_source")]
            source: VideoDocSource,
        }

        let parsed: GetResponse = response.json().await.ok()?;
        Some(VideoDocument {
            title: parsed.source.title,
            tags: parsed.source.tag,
        })
    }
}
