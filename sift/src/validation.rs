use serde_json::{Map, Value};

use crate::error::EventError;
use crate::registry::SchemaRegistry;
use crate::time::parse_timestamp;
use crate::types::RawEvent;

pub const DEFAULT_SOURCE: &str = "web";
pub const DEFAULT_VERSION: &str = "1.0";

/// Run the inbound contract checks against a raw payload, in a fixed
/// order so a record that fails several ways always reports the same
/// error. Returns the typed event with `source` and `version` defaults
/// applied.
pub fn validate(registry: &SchemaRegistry, payload: &[u8]) -> Result<RawEvent, EventError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| EventError::ParseError(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(EventError::ParseError(
            "payload is not a JSON object".to_string(),
        ));
    };

    require_string(object, "user_id")?;

    // An absent key is a missing field; any present value that is not a
    // member of the legal set, strings included, fails the enum check.
    match object.get("event_type") {
        None => return Err(EventError::MissingField("event_type")),
        Some(Value::String(s)) if registry.is_valid_event_type(s) => {}
        Some(Value::String(s)) => {
            return Err(EventError::InvalidEnum { got: s.clone() });
        }
        Some(other) => {
            return Err(EventError::InvalidEnum {
                got: other.to_string(),
            });
        }
    }

    if let Some(amount) = object.get("amount") {
        match amount.as_f64() {
            Some(parsed) if parsed >= 0.0 => {}
            Some(parsed) => {
                return Err(EventError::RangeError(format!(
                    "amount must be non-negative, got {}",
                    parsed
                )))
            }
            None => {
                return Err(EventError::RangeError(format!(
                    "amount must be numeric, got {}",
                    amount
                )))
            }
        }
    }

    if let Some(timestamp) = object.get("timestamp") {
        let valid = timestamp
            .as_str()
            .is_some_and(|raw| parse_timestamp(raw).is_some());
        if !valid {
            return Err(EventError::FormatError(timestamp.to_string()));
        }
    }

    let mut event: RawEvent =
        serde_json::from_value(value).map_err(|e| EventError::ParseError(e.to_string()))?;
    event.source.get_or_insert_with(|| DEFAULT_SOURCE.to_string());
    event.version.get_or_insert_with(|| DEFAULT_VERSION.to_string());

    Ok(event)
}

fn require_string<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, EventError> {
    match object.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(EventError::MissingField(field)),
    }
}
