use common_kafka::kafka_consumer::OffsetErr;
use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::registry::EventType;
use crate::types::ProcessingStage;

/// A per-record failure. Every variant is recoverable: the record is wrapped
/// into a dead-letter envelope and the stream keeps going.
#[derive(Debug, Clone, Error)]
pub enum EventError {
    #[error("failed to parse payload: {0}")]
    ParseError(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid event_type {got:?}, expected one of: {}", EventType::legal_set())]
    InvalidEnum { got: String },
    #[error("invalid amount: {0}")]
    RangeError(String),
    #[error("timestamp is not ISO-8601: {0}")]
    FormatError(String),
    #[error("no mapping for event_type {0:?}")]
    MappingGap(String),
    #[error("sink write failed: {0}")]
    SinkWrite(String),
}

impl EventError {
    /// The taxonomy tag recorded in the dead-letter envelope.
    pub fn error_type(&self) -> &'static str {
        match self {
            EventError::ParseError(_) => "ParseError",
            EventError::MissingField(_) => "MissingField",
            EventError::InvalidEnum { .. } => "InvalidEnum",
            EventError::RangeError(_) => "RangeError",
            EventError::FormatError(_) => "FormatError",
            EventError::MappingGap(_) => "MappingGap",
            EventError::SinkWrite(_) => "SinkWriteError",
        }
    }

    /// The stage this error is detected at, when raised by the engine
    /// itself. Externally raised failures carry their own stage.
    pub fn stage(&self) -> ProcessingStage {
        match self {
            EventError::ParseError(_)
            | EventError::MissingField(_)
            | EventError::InvalidEnum { .. }
            | EventError::RangeError(_)
            | EventError::FormatError(_) => ProcessingStage::ConsumerValidation,
            EventError::MappingGap(_) => ProcessingStage::Transformation,
            EventError::SinkWrite(_) => ProcessingStage::SinkWrite,
        }
    }

    /// Malformed records will fail the same way on every attempt; sink
    /// write failures are worth re-submitting once the sink recovers.
    pub fn can_retry(&self) -> bool {
        matches!(self, EventError::SinkWrite(_))
    }
}

/// A process-level failure. These are not recoverable per-record: the
/// worker loop bails and lets the orchestrator restart us.
#[derive(Debug, Error)]
pub enum UnhandledError {
    #[error("config error: {0}")]
    Config(#[from] envconfig::Error),
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("offset store error: {0}")]
    Offset(#[from] OffsetErr),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("startup invariant violated: {0}")]
    InvariantViolation(String),
}
