use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::EventError;

pub mod file;
pub mod kafka;

/// Destination for a flushed batch. Implementations either accept the
/// whole batch or reject the whole batch; partial writes are treated
/// as failure so re-wrapping stays simple.
#[async_trait]
pub trait RecordSink<T>: Send + Sync {
    async fn send_batch(&self, records: &[T]) -> Result<(), EventError>;
}

/// Logs each record instead of writing it anywhere. Local runs only.
pub struct PrintSink;

#[async_trait]
impl<T: Serialize + Send + Sync> RecordSink<T> for PrintSink {
    async fn send_batch(&self, records: &[T]) -> Result<(), EventError> {
        for record in records {
            let rendered = serde_json::to_string(record)
                .map_err(|e| EventError::SinkWrite(e.to_string()))?;
            info!("{}", rendered);
        }
        Ok(())
    }
}
