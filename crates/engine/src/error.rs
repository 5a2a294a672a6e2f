use model::pagination::cursor::Watermark;
use store::error::StoreError;
use thiserror::Error;

/// Fail-fast problems detected at construction or first-round init; never
/// retried automatically.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("pipeline name must not be empty")]
    EmptyName,

    #[error("ordering field must not be empty")]
    EmptyOrderingField,

    #[error("key field must not be empty")]
    EmptyKeyField,

    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("cursor start is past its end bound")]
    InvalidCursorBounds,

    #[error("paging extraction requires at least one stable sort key")]
    MissingSortOrder,
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("source query failed: {0}")]
    Source(#[from] StoreError),

    #[error("expected {expected} watermark, cursor holds {actual:?}")]
    WatermarkKind {
        expected: &'static str,
        actual: Watermark,
    },

    #[error("time-span extraction requires both window bounds")]
    UnboundedWindow,

    #[error("row is missing ordering field '{0}'")]
    MissingOrderingField(String),
}

/// A failure scoped to one record. Tolerated by the orchestrator up to the
/// configured threshold; carries only a message because appliers are the
/// ones who know the underlying cause.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct RecordError {
    pub message: String,
}

impl RecordError {
    pub fn new(message: impl Into<String>) -> Self {
        RecordError {
            message: message.into(),
        }
    }
}

impl From<StoreError> for RecordError {
    fn from(err: StoreError) -> Self {
        RecordError::new(err.to_string())
    }
}

/// Errors that abort a round. The cursor is never advanced past work that
/// failed, so the next `process()` call re-delivers from the last durable
/// position.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("initialization failed for pipeline '{pipeline}': {source}")]
    Init {
        pipeline: String,
        #[source]
        source: StoreError,
    },

    #[error("fetch failed for pipeline '{pipeline}': {source}")]
    Fetch {
        pipeline: String,
        #[source]
        source: ExtractError,
    },

    #[error("pipeline '{pipeline}' hit {count} consecutive record errors, last: {last}")]
    ErrorThreshold {
        pipeline: String,
        count: u32,
        last: String,
    },

    #[error("transaction failed for pipeline '{pipeline}': {source}")]
    Transaction {
        pipeline: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("catalog error: {0}")]
    Catalog(#[from] StoreError),

    #[error("copy of table '{table}' failed: {source}")]
    Copy {
        table: String,
        #[source]
        source: StoreError,
    },
}
