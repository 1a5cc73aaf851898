use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventError;
use crate::registry::{EventCategory, NormalizedEventType};

/// Stamped onto every outbound record, bumped when transformation
/// semantics change.
pub const PROCESSING_VERSION: &str = "1.0";

/// An inbound event as submitted by producers. Everything except
/// `user_id` and `event_type` is optional on the wire; validation
/// enforces the rest of the contract before transformation runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    // Unknown producer keys ride along rather than being dropped
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl RawEvent {
    pub fn user_id(&self) -> Result<&str, EventError> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(EventError::MissingField("user_id"))
    }

    pub fn event_type(&self) -> Result<&str, EventError> {
        self.event_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(EventError::MissingField("event_type"))
    }
}

/// Best-effort browser and OS families pulled out of a user agent
/// string. Absent entirely when the string is unrecognised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAgent {
    pub browser: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    pub device: String,
}

/// The outbound record shape. Only ever constructed from a `RawEvent`
/// that passed validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformedEvent {
    pub event_id: String,
    pub user_id: String,
    pub event_type: String,
    pub normalized_event_type: NormalizedEventType,
    pub event_category: EventCategory,
    pub timestamp: String,
    pub is_conversion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub source: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent_parsed: Option<UserAgent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    pub processed_at: DateTime<Utc>,
    pub processing_version: String,
}

/// Where in the pipeline a record died.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    ProducerValidation,
    ConsumerValidation,
    Transformation,
    SinkWrite,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessingStage::ProducerValidation => "producer_validation",
            ProcessingStage::ConsumerValidation => "consumer_validation",
            ProcessingStage::Transformation => "transformation",
            ProcessingStage::SinkWrite => "sink_write",
        };
        write!(f, "{}", s)
    }
}

fn default_can_retry() -> bool {
    true
}

/// The envelope a failed record travels in. `original_event` is the
/// payload exactly as it arrived, so nothing is lost to later repair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadLetterEvent {
    pub original_event: Value,
    pub error_type: String,
    pub error_message: String,
    pub processing_stage: ProcessingStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_can_retry")]
    pub can_retry: bool,
}

impl DeadLetterEvent {
    /// Wrap a record the engine itself failed on.
    pub fn from_failure(original_event: Value, error: &EventError, failed_at: DateTime<Utc>) -> Self {
        Self {
            original_event,
            error_type: error.error_type().to_string(),
            error_message: error.to_string(),
            processing_stage: error.stage(),
            failed_at: Some(failed_at),
            retry_count: 0,
            can_retry: error.can_retry(),
        }
    }
}
