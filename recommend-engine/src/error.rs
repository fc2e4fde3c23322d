use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy for the recommendation engine core.
///
/// Matches the propagation policy of the spec: transient external failures
/// are absorbed by callers (empty results, dropped writes) rather than
/// bubbled up as hard errors, except where noted on the call site.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("shared store error: {0}")]
    Store(String),

    #[error("content index error: {0}")]
    ContentIndex(String),

    #[error("publish resolver error: {0}")]
    PublishResolver(String),

    #[error("task queue error: {0}")]
    Queue(String),

    #[error("invalid operation code: {0}")]
    InvalidOperation(i32),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<redis::RedisError> for EngineError {
    fn from(err: redis::RedisError) -> Self {
        EngineError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Store(err.to_string())
    }
}
