use std::env;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub content_index: ContentIndexConfig,
    pub ledger: LedgerConfig,
    pub queue: QueueConfig,
    pub publish_resolver: PublishResolverConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ContentIndexConfig {
    pub url: String,
    pub video_index: String,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Per-device cap on pending entries (spec.md fixes 500).
    pub pending_cap: usize,
    /// Per-device cap on recently-served entries (spec.md fixes 500,
    /// recording the 100-vs-500 source ambiguity as resolved).
    pub served_cap: usize,
    pub ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

#[derive(Debug, Clone)]
pub struct PublishResolverConfig {
    pub query_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            service: ServiceConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "recommend-engine".to_string()),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            content_index: ContentIndexConfig {
                url: env::var("CONTENT_INDEX_URL")
                    .unwrap_or_else(|_| "http://localhost:9200".to_string()),
                video_index: env::var("CONTENT_INDEX_VIDEO_INDEX")
                    .unwrap_or_else(|_| "resources".to_string()),
            },
            ledger: LedgerConfig {
                pending_cap: parse_env("LEDGER_PENDING_CAP", 500)?,
                served_cap: parse_env("LEDGER_SERVED_CAP", 500)?,
                ttl_secs: parse_env("LEDGER_TTL_SECS", 2_592_000)?,
            },
            queue: QueueConfig {
                brokers: env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                topic: env::var("KAFKA_RECOMMEND_TOPIC")
                    .unwrap_or_else(|_| "update_video_recommendation".to_string()),
                group_id: env::var("KAFKA_RECOMMEND_GROUP_ID")
                    .unwrap_or_else(|_| "recommend-engine".to_string()),
            },
            publish_resolver: PublishResolverConfig {
                query_url: env::var("PUBLISH_QUERY_URL").unwrap_or_else(|_| {
                    "http://localhost:8090/internal/publish/query".to_string()
                }),
            },
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + ToString,
{
    match env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|_| EngineError::Configuration(format!("{key} must be a valid value"))),
        Err(_) => Ok(default),
    }
}
