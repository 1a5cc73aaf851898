use std::sync::Arc;

use tracing::{error, warn};

use common_kafka::kafka_consumer::{RecvErr, SingleTopicConsumer};

use crate::app_context::AppContext;
use crate::error::UnhandledError;
use crate::metrics_consts::{DEAD_LETTERS_PERSISTED, EMPTY_EVENTS, RECV_ERRORS};
use crate::sinks::RecordSink;
use crate::types::DeadLetterEvent;

/// Drains the dead-letter topic to disk so envelopes survive topic
/// retention and are inspectable as plain files.
pub async fn run_loop(
    context: Arc<AppContext>,
    consumer: SingleTopicConsumer,
) -> Result<(), UnhandledError> {
    loop {
        if let Some(liveness) = &context.dead_letter_liveness {
            liveness.report_healthy();
        }

        let (payload, offset) = match consumer.recv().await {
            Ok(received) => received,
            Err(RecvErr::Empty) => {
                warn!("empty payload on dead letter topic");
                metrics::counter!(EMPTY_EVENTS, &[("topic", "dead_letter")]).increment(1);
                continue;
            }
            Err(RecvErr::Kafka(e)) => return Err(e.into()),
        };

        let envelope: DeadLetterEvent = match serde_json::from_slice(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Malformed envelopes should be impossible, we produced
                // them. Log and skip rather than wedge the drain.
                error!("undeserializable dead letter envelope: {}", e);
                metrics::counter!(RECV_ERRORS, &[("topic", "dead_letter")]).increment(1);
                offset.store()?;
                continue;
            }
        };

        if let Err(e) = context.dead_letter_store.send_batch(&[envelope]).await {
            error!("failed to persist dead letter: {}", e);
            // Leave the offset unstored so the envelope is redelivered.
            continue;
        }

        metrics::counter!(DEAD_LETTERS_PERSISTED).increment(1);
        offset.store()?;
    }
}
