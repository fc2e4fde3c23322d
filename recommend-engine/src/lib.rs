//! Per-device video recommendation engine: hot-pool loading, similarity
//! recall, a signed-score recommendation ledger, and debounced behavior
//! ingestion, composed into a small set of public operations.

pub mod cache;
pub mod config;
pub mod content_index;
pub mod engine;
pub mod error;
pub mod hot_pool;
pub mod ingest;
pub mod ledger;
pub mod models;
pub mod publish_resolver;
pub mod queue;
pub mod recall;
pub mod tags;

pub use config::Config;
pub use engine::RecommendationEngine;
pub use error::{EngineError, Result};
pub use models::{EngineVariant, Operation, VideoId};
