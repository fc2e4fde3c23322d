//! Publish-id resolver (C8): thin adapter over an external HTTP endpoint
//! that attaches a secondary identifier to outgoing items.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::VideoId;

const BATCH_SIZE: usize = 100;

#[derive(Serialize)]
struct Resource<'a> {
    res_type: &'a str,
    res_id: &'a str,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    resources: Vec<Resource<'a>>,
}

#[derive(Deserialize)]
struct QueryResponse {
    data: Vec<ResourceResult>,
}

#[derive(Deserialize)]
struct ResourceResult {
    res_id: String,
    pub_ids: Vec<String>,
}

#[derive(Clone)]
pub struct PublishResolver {
    client: reqwest::Client,
    query_url: String,
}

impl PublishResolver {
    pub fn new(query_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            query_url,
        }
    }

    /// Resolve a list of video ids to their first publish id.
    ///
    /// Ids without a publish id are omitted from the result; failures are
    /// silent (missing entries mean "unresolvable", not "error").
    ///
    /// The original implementation inverted this check — it returned
    /// immediately when the input list was *non-empty* — which the spec
    /// flags as a source bug (spec.md §9 REDESIGN FLAGS). This resolves
    /// empty input to an empty map without a network call, and resolves
    /// non-empty input in batches of `BATCH_SIZE`.
    pub async fn resolve(&self, video_ids: &[VideoId]) -> HashMap<VideoId, String> {
        if video_ids.is_empty() {
            return HashMap::new();
        }

        let mut result = HashMap::new();
        for batch in video_ids.chunks(BATCH_SIZE) {
            let body = QueryBody {
                resources: batch
                    .iter()
                    .map(|id| Resource {
                        res_type: "video",
                        res_id: id,
                    })
                    .collect(),
            };

            let response = match self.client.post(&self.query_url).json(&body).send().await {
                Ok(resp) => resp,
                Err(err) => {
                    warn!("publish-id resolver request failed: {err}");
                    continue;
                }
            };

            let parsed: QueryResponse = match response.json().await {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("publish-id resolver decode failed: {err}");
                    continue;
                }
            };

            for item in parsed.data {
                if let Some(first) = item.pub_ids.into_iter().next() {
                    result.insert(item.res_id, first);
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_short_circuits_without_a_request() {
        let resolver = PublishResolver::new("http://127.0.0.1:1/unreachable".to_string());
        let result = resolver.resolve(&[]).await;
        assert!(result.is_empty());
    }
}
