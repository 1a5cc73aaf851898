use tracing::error;

use crate::app_context::AppContext;
use crate::batch::BatchAccumulator;
use crate::metrics_consts::{BATCHES_FLUSHED, BATCH_FLUSH_SIZE, FLUSH_FAILED, SINK_WRITE_TIME};
use crate::registry::SchemaRegistry;
use crate::router::Outcome;
use crate::sinks::RecordSink;
use crate::time::TimeSource;
use crate::types::{DeadLetterEvent, TransformedEvent};

pub mod app_context;
pub mod batch;
pub mod config;
pub mod dead_letters;
pub mod error;
pub mod metrics_consts;
pub mod registry;
pub mod router;
pub mod sinks;
pub mod test_utils;
pub mod time;
pub mod transform;
pub mod types;
pub mod validation;

/// Validate, transform and route one raw payload. Pure apart from the
/// clock: every consumed record maps to exactly one outcome, and a
/// failure at any stage carries the payload as received.
pub fn process_event(
    registry: &SchemaRegistry,
    payload: &[u8],
    time: &dyn TimeSource,
) -> Outcome {
    let raw = match validation::validate(registry, payload) {
        Ok(raw) => raw,
        Err(error) => {
            return router::route(
                router::original_payload_value(payload),
                Err(error),
                time.now(),
            )
        }
    };

    match transform::transform(registry, &raw, time) {
        Ok(event) => Outcome::Sink(event),
        Err(error) => router::route(
            router::original_payload_value(payload),
            Err(error),
            time.now(),
        ),
    }
}

/// Hand a full event batch to the sink. On failure the whole batch is
/// re-wrapped as dead letters and pushed through the dead-letter
/// accumulator, which may itself trigger a dead-letter flush.
pub async fn flush_events(
    context: &AppContext,
    batch: Vec<TransformedEvent>,
    dead: &mut BatchAccumulator<DeadLetterEvent>,
) {
    metrics::histogram!(BATCH_FLUSH_SIZE, &[("destination", "events")])
        .record(batch.len() as f64);
    let timing = common_metrics::timing_guard(SINK_WRITE_TIME, &[]);
    match context.event_sink.send_batch(&batch).await {
        Ok(()) => {
            timing.label("outcome", "success").fin();
            metrics::counter!(BATCHES_FLUSHED, &[("destination", "events")]).increment(1);
        }
        Err(e) => {
            timing.label("outcome", "failure").fin();
            metrics::counter!(FLUSH_FAILED, &[("destination", "events")]).increment(1);
            error!("event sink flush failed, dead lettering batch: {}", e);
            for envelope in router::wrap_sink_failure(&batch, &e, context.time.now()) {
                if let Some(full) = dead.push(envelope) {
                    flush_dead_letters(context, full).await;
                }
            }
        }
    }
}

/// Hand a dead-letter batch to its sink. A sink failure falls back to
/// the local file store, and a batch that cannot be persisted anywhere
/// is fatal: by this point the offsets are stored, so dropping the
/// envelopes would lose the records for good.
pub async fn flush_dead_letters(context: &AppContext, batch: Vec<DeadLetterEvent>) {
    metrics::histogram!(BATCH_FLUSH_SIZE, &[("destination", "dead_letters")])
        .record(batch.len() as f64);
    match context.dead_letter_sink.send_batch(&batch).await {
        Ok(()) => {
            metrics::counter!(BATCHES_FLUSHED, &[("destination", "dead_letters")]).increment(1);
        }
        Err(e) => {
            metrics::counter!(FLUSH_FAILED, &[("destination", "dead_letters")]).increment(1);
            error!("dead letter flush failed, falling back to the file store: {}", e);
            if let Err(e) = context.dead_letter_store.send_batch(&batch).await {
                panic!("failed to persist {} dead letters: {}", batch.len(), e);
            }
            metrics::counter!(BATCHES_FLUSHED, &[("destination", "dead_letter_store")])
                .increment(1);
        }
    }
}

/// Route one outcome into the right accumulator, flushing any batch
/// that fills. Shared by the worker loop and the shutdown drain.
pub async fn handle_outcome(
    context: &AppContext,
    outcome: Outcome,
    events: &mut BatchAccumulator<TransformedEvent>,
    dead: &mut BatchAccumulator<DeadLetterEvent>,
) {
    match outcome {
        Outcome::Sink(event) => {
            metrics::counter!(crate::metrics_consts::EVENTS_ROUTED, &[("destination", "sink")])
                .increment(1);
            if let Some(batch) = events.push(event) {
                flush_events(context, batch, dead).await;
            }
        }
        Outcome::DeadLetter(envelope) => {
            metrics::counter!(
                crate::metrics_consts::EVENTS_ROUTED,
                &[("destination", "dead_letter")]
            )
            .increment(1);
            metrics::counter!(
                crate::metrics_consts::DEAD_LETTERS,
                &[
                    ("error_type", envelope.error_type.clone()),
                    ("stage", envelope.processing_stage.to_string()),
                ]
            )
            .increment(1);
            if let Some(batch) = dead.push(envelope) {
                flush_dead_letters(context, batch).await;
            }
        }
    }
}
