//! In-memory doubles and sample records shared by unit and
//! integration tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::error::EventError;
use crate::registry::{EventCategory, NormalizedEventType};
use crate::sinks::RecordSink;
use crate::time::TimeSource;
use crate::types::{DeadLetterEvent, ProcessingStage, RawEvent, TransformedEvent};

/// A clock pinned to a known instant.
pub struct FixedTime {
    pub time: DateTime<Utc>,
}

impl TimeSource for FixedTime {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

pub fn fixed_time() -> FixedTime {
    FixedTime {
        time: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

/// Captures every batch it is handed, in order.
#[derive(Default)]
pub struct MemorySink<T> {
    pub batches: Mutex<Vec<Vec<T>>>,
}

impl<T: Clone> MemorySink<T> {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<T> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> RecordSink<T> for MemorySink<T> {
    async fn send_batch(&self, records: &[T]) -> Result<(), EventError> {
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

/// Rejects every batch, standing in for a sink outage.
pub struct FailingSink;

#[async_trait]
impl<T: Send + Sync> RecordSink<T> for FailingSink {
    async fn send_batch(&self, _records: &[T]) -> Result<(), EventError> {
        Err(EventError::SinkWrite("simulated sink outage".to_string()))
    }
}

pub fn raw_event(event_type: &str) -> RawEvent {
    RawEvent {
        user_id: Some("user-1".to_string()),
        event_type: Some(event_type.to_string()),
        source: Some("web".to_string()),
        version: Some("1.0".to_string()),
        ..Default::default()
    }
}

pub fn raw_payload(event_type: &str) -> Vec<u8> {
    json!({"user_id": "user-1", "event_type": event_type})
        .to_string()
        .into_bytes()
}

pub fn transformed_event(event_type: &str) -> TransformedEvent {
    TransformedEvent {
        event_id: "evt-1".to_string(),
        user_id: "user-1".to_string(),
        event_type: event_type.to_string(),
        normalized_event_type: NormalizedEventType::Interaction,
        event_category: EventCategory::Interaction,
        timestamp: "not-a-valid-timestamp".to_string(),
        is_conversion: false,
        revenue: None,
        conversion_value: None,
        session_id: None,
        page_url: None,
        element_id: None,
        product_id: None,
        source: "web".to_string(),
        version: "1.0".to_string(),
        user_agent_parsed: None,
        country_code: None,
        processed_at: fixed_time().now(),
        processing_version: crate::types::PROCESSING_VERSION.to_string(),
    }
}

pub fn dead_letter_event() -> DeadLetterEvent {
    DeadLetterEvent {
        original_event: json!({"user_id": "user-1", "event_type": "hover"}),
        error_type: "InvalidEnum".to_string(),
        error_message: "invalid event_type \"hover\"".to_string(),
        processing_stage: ProcessingStage::ConsumerValidation,
        failed_at: Some(fixed_time().now()),
        retry_count: 0,
        can_retry: false,
    }
}
