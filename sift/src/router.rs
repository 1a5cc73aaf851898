use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::EventError;
use crate::types::{DeadLetterEvent, TransformedEvent};

/// Where a processed record goes next. Every consumed record becomes
/// exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Sink(TransformedEvent),
    DeadLetter(DeadLetterEvent),
}

/// Fold a processing result into a routing decision. Pure: the same
/// result and payload always route the same way.
pub fn route(
    original: Value,
    result: Result<TransformedEvent, EventError>,
    now: DateTime<Utc>,
) -> Outcome {
    match result {
        Ok(event) => Outcome::Sink(event),
        Err(error) => Outcome::DeadLetter(DeadLetterEvent::from_failure(original, &error, now)),
    }
}

/// Re-wrap an entire failed sink batch as dead letters, one envelope
/// per record, preserving batch order. The envelope carries the record
/// as it entered the sink, so a drained dead-letter can be re-submitted
/// directly.
pub fn wrap_sink_failure(
    batch: &[TransformedEvent],
    error: &EventError,
    now: DateTime<Utc>,
) -> Vec<DeadLetterEvent> {
    batch
        .iter()
        .map(|event| {
            let original = serde_json::to_value(event).unwrap_or_else(|e| {
                // Serialize of our own struct cannot fail in practice,
                // but a dead letter with a note beats a panic here.
                Value::String(format!("unserializable event: {}", e))
            });
            DeadLetterEvent::from_failure(original, error, now)
        })
        .collect()
}

/// The payload as a JSON value when it parses, or the verbatim bytes as
/// a lossy string when it does not. Either way nothing is dropped.
pub fn original_payload_value(payload: &[u8]) -> Value {
    serde_json::from_slice(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use crate::test_utils::{fixed_time, transformed_event};
    use crate::time::TimeSource;
    use crate::types::ProcessingStage;
    use serde_json::json;

    #[test]
    fn ok_result_routes_to_sink() {
        let event = transformed_event("click");
        let outcome = route(json!({}), Ok(event.clone()), fixed_time().now());
        assert_eq!(outcome, Outcome::Sink(event));
    }

    #[test]
    fn err_result_routes_to_dead_letter_with_original_payload() {
        let original = json!({"user_id": "u1", "event_type": "hover"});
        let error = EventError::InvalidEnum {
            got: "hover".to_string(),
        };
        let now = fixed_time().now();
        let Outcome::DeadLetter(envelope) = route(original.clone(), Err(error), now) else {
            panic!("expected a dead letter");
        };
        assert_eq!(envelope.original_event, original);
        assert_eq!(envelope.error_type, "InvalidEnum");
        assert_eq!(envelope.processing_stage, ProcessingStage::ConsumerValidation);
        assert_eq!(envelope.failed_at, Some(now));
        assert_eq!(envelope.retry_count, 0);
        assert!(!envelope.can_retry);
    }

    #[test]
    fn sink_failure_wraps_every_record_in_order() {
        let batch: Vec<_> = (0..10)
            .map(|i| {
                let mut event = transformed_event("page_view");
                event.event_id = format!("evt-{}", i);
                event
            })
            .collect();
        let error = EventError::SinkWrite("disk full".to_string());
        let envelopes = wrap_sink_failure(&batch, &error, fixed_time().now());

        assert_eq!(envelopes.len(), 10);
        for (i, envelope) in envelopes.iter().enumerate() {
            assert_eq!(envelope.processing_stage, ProcessingStage::SinkWrite);
            assert_eq!(envelope.error_type, "SinkWriteError");
            assert!(envelope.can_retry);
            assert_eq!(
                envelope.original_event["event_id"],
                json!(format!("evt-{}", i))
            );
        }
    }

    #[test]
    fn unparseable_payload_is_preserved_as_a_string() {
        let value = original_payload_value(b"{truncated");
        assert_eq!(value, json!("{truncated"));
    }

    #[test]
    fn parseable_payload_round_trips_as_json() {
        let value = original_payload_value(br#"{"a": 1}"#);
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn mapping_gap_routes_to_a_transformation_stage_dead_letter() {
        use std::collections::{HashMap, HashSet};

        // Tables drifted out from under the legal enum
        let registry = SchemaRegistry::with_tables(HashMap::new(), HashMap::new(), HashSet::new());
        let original = json!({"user_id": "u1", "event_type": "click"});
        let outcome =
            crate::process_event(&registry, original.to_string().as_bytes(), &fixed_time());

        let Outcome::DeadLetter(envelope) = outcome else {
            panic!("expected a dead letter");
        };
        assert_eq!(envelope.error_type, "MappingGap");
        assert_eq!(envelope.processing_stage, ProcessingStage::Transformation);
        assert_eq!(
            serde_json::to_value(envelope.processing_stage).unwrap(),
            json!("transformation")
        );
        assert_eq!(envelope.original_event, original);
        assert!(!envelope.can_retry);
    }

    #[test]
    fn dead_letter_from_process_event_keeps_malformed_bytes() {
        let registry = SchemaRegistry::new();
        let outcome = crate::process_event(&registry, b"not json at all", &fixed_time());
        let Outcome::DeadLetter(envelope) = outcome else {
            panic!("expected a dead letter");
        };
        assert_eq!(envelope.original_event, json!("not json at all"));
        assert_eq!(envelope.error_type, "ParseError");
    }
}
