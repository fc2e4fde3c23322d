//! Task-queue contract (spec.md §6): the named task
//! `update_video_recommendation(device, video_id, operation)`, delivered
//! at-least-once. Grounded on `user-service`'s `EventProducer` and
//! `search-service`'s `kafka_consumer`/`kafka` event-consumer pair.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::error::{EngineError, Result};
use crate::models::Operation;

/// Payload carried by the `update_video_recommendation` task (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationTask {
    pub device: String,
    pub video_id: String,
    pub operation: i32,
}

impl RecommendationTask {
    pub fn new(device: &str, video_id: &str, operation: Operation) -> Self {
        Self {
            device: device.to_string(),
            video_id: video_id.to_string(),
            operation: operation as i32 + 1,
        }
    }
}

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Producer side of the task queue (spec.md §6, C6 dispatch).
#[derive(Clone)]
pub struct TaskProducer {
    producer: FutureProducer,
    topic: String,
}

impl TaskProducer {
    pub fn new(brokers: &str, topic: String) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("queue.buffering.max.messages", "100000")
            .set("acks", "all")
            .create()
            .map_err(|err| EngineError::Queue(err.to_string()))?;

        Ok(Self { producer, topic })
    }

    /// Enqueues a task keyed by device, so per-device ordering is preserved
    /// within a partition (spec.md §5 ordering guarantee).
    pub async fn enqueue(&self, task: &RecommendationTask) -> Result<()> {
        let payload = serde_json::to_string(task)?;
        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(&task.device);

        debug!(
            "enqueueing recommendation task for device {} video {}",
            task.device, task.video_id
        );

        match timeout(SEND_TIMEOUT, self.producer.send(record, SEND_TIMEOUT)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err((err, _))) => Err(EngineError::Queue(err.to_string())),
            Err(_) => {
                warn!("task enqueue timed out after {SEND_TIMEOUT:?}");
                Err(EngineError::Queue("enqueue timeout".to_string()))
            }
        }
    }
}

/// Consumer side of the task queue, driving the worker loop in `main.rs`.
pub struct TaskConsumer {
    consumer: StreamConsumer,
}

impl TaskConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|err| EngineError::Queue(err.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|err| EngineError::Queue(err.to_string()))?;

        Ok(Self { consumer })
    }

    /// Drains tasks and invokes `handler` for each, committing only on
    /// successful processing. Delivery is at-least-once: a handler failure
    /// leaves the offset uncommitted and the task is redelivered.
    pub async fn run<F, Fut>(&self, mut handler: F)
    where
        F: FnMut(RecommendationTask) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        loop {
            match self.consumer.recv().await {
                Ok(message) => {
                    let Some(payload) = message.payload() else {
                        continue;
                    };

                    match serde_json::from_slice::<RecommendationTask>(payload) {
                        Ok(task) => {
                            handler(task).await;
                            if let Err(err) =
                                self.consumer.commit_message(&message, CommitMode::Async)
                            {
                                warn!("failed to commit task offset: {err}");
                            }
                        }
                        Err(err) => {
                            warn!("failed to decode recommendation task: {err}");
                        }
                    }
                }
                Err(err) => {
                    error!("task queue consumer error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_round_trips_through_json() {
        let task = RecommendationTask::new("device-1", "video-1", Operation::Share);
        let encoded = serde_json::to_string(&task).unwrap();
        let decoded: RecommendationTask = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.device, "device-1");
        assert_eq!(decoded.video_id, "video-1");
        assert_eq!(Operation::try_from(decoded.operation).unwrap(), Operation::Share);
    }
}
