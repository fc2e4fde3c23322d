use std::sync::Arc;

use anyhow::{Context, Result};
use recommend_engine::cache::RecallCache;
use recommend_engine::config::Config;
use recommend_engine::content_index::ElasticsearchContentIndex;
use recommend_engine::engine::RecommendationEngine;
use recommend_engine::hot_pool::HotPool;
use recommend_engine::ingest::{self, BehaviorIngestor};
use recommend_engine::ledger::{LedgerCaps, LedgerStore};
use recommend_engine::models::EngineVariant;
use recommend_engine::publish_resolver::PublishResolver;
use recommend_engine::queue::{TaskConsumer, TaskProducer};
use recommend_engine::recall::SimilarityRecall;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    info!("starting {}", config.service.service_name);

    let redis_pool = redis_utils::RedisPool::connect(&config.redis.url)
        .await
        .context("failed to connect to Redis")?;
    let redis = redis_pool.manager();

    let content_index: Arc<dyn recommend_engine::content_index::ContentIndexClient> = Arc::new(
        ElasticsearchContentIndex::new(
            &config.content_index.url,
            &config.content_index.video_index,
        )
        .context("failed to build content index client")?,
    );

    // Hot-pool load failure at startup is fatal (spec.md §7): the engine
    // cannot serve without it.
    let hot_pool_v1 = Arc::new(
        HotPool::load(&redis, content_index.as_ref(), EngineVariant::V1)
            .await
            .context("failed to load V1 hot pool")?,
    );
    let hot_pool_v2 = Arc::new(
        HotPool::load(&redis, content_index.as_ref(), EngineVariant::V2)
            .await
            .context("failed to load V2 hot pool")?,
    );

    let ledger_caps = LedgerCaps {
        pending_cap: config.ledger.pending_cap,
        served_cap: config.ledger.served_cap,
        ttl_secs: config.ledger.ttl_secs,
    };

    let cache = RecallCache::new(redis.clone());
    let recall = SimilarityRecall::new(content_index.clone(), Some(cache));

    let producer = TaskProducer::new(&config.queue.brokers, config.queue.topic.clone())
        .context("failed to build task producer")?;
    let ingestor = BehaviorIngestor::new(redis.clone(), producer);

    let publish_resolver = PublishResolver::new(config.publish_resolver.query_url.clone());

    let engine_v1 = RecommendationEngine::new(
        EngineVariant::V1,
        hot_pool_v1,
        LedgerStore::new(redis.clone(), EngineVariant::V1, ledger_caps.clone()),
        recall.clone(),
        ingestor.clone(),
        publish_resolver.clone(),
    );
    let engine_v2 = RecommendationEngine::new(
        EngineVariant::V2,
        hot_pool_v2,
        LedgerStore::new(redis.clone(), EngineVariant::V2, ledger_caps),
        recall.clone(),
        ingestor.clone(),
        publish_resolver,
    );

    let consumer = TaskConsumer::new(
        &config.queue.brokers,
        &config.queue.group_id,
        &config.queue.topic,
    )
    .context("failed to build task consumer")?;

    info!("worker loop starting");
    consumer
        .run(|task| {
            let variant = ingest::route(&task.device);
            let engine = match variant {
                EngineVariant::V1 => &engine_v1,
                EngineVariant::V2 => &engine_v2,
            };
            async move {
                match recommend_engine::models::Operation::try_from(task.operation) {
                    Ok(op) => engine.observe_now(&task.device, &task.video_id, op).await,
                    Err(err) => error!("dropping task with invalid operation: {err}"),
                }
            }
        })
        .await;

    Ok(())
}
