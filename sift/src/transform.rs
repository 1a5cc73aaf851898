use uuid::Uuid;

use crate::error::EventError;
use crate::registry::SchemaRegistry;
use crate::time::TimeSource;
use crate::types::{RawEvent, TransformedEvent, UserAgent, PROCESSING_VERSION};

/// Map a validated event onto the outbound shape. Total over the
/// validated domain: the only failure mode is a registry lookup miss,
/// which means the tables and the legal enum have drifted apart.
pub fn transform(
    registry: &SchemaRegistry,
    event: &RawEvent,
    time: &dyn TimeSource,
) -> Result<TransformedEvent, EventError> {
    let user_id = event.user_id()?;
    let event_type = event.event_type()?;

    let normalized_event_type = registry
        .normalized_type(event_type)
        .ok_or_else(|| EventError::MappingGap(event_type.to_string()))?;
    let event_category = registry
        .category(event_type)
        .ok_or_else(|| EventError::MappingGap(event_type.to_string()))?;

    let now = time.now();
    let is_conversion = registry.is_conversion_type(event_type);

    // Revenue only ever means money changed hands. A signup with an
    // attributed value is a conversion_value, not revenue.
    let (revenue, conversion_value) = match event_type {
        "purchase" => {
            let amount = event.amount.unwrap_or(0.0);
            (Some(amount), Some(amount))
        }
        "signup" => (None, Some(event.amount.unwrap_or(0.0))),
        _ => (None, None),
    };

    Ok(TransformedEvent {
        event_id: event
            .event_id
            .clone()
            .unwrap_or_else(|| Uuid::now_v7().to_string()),
        user_id: user_id.to_string(),
        event_type: event_type.to_string(),
        normalized_event_type,
        event_category,
        timestamp: event
            .timestamp
            .clone()
            .unwrap_or_else(|| now.to_rfc3339()),
        is_conversion,
        revenue,
        conversion_value,
        session_id: event.session_id.clone(),
        page_url: event.page_url.clone(),
        element_id: event.element_id.clone(),
        product_id: event.product_id.clone(),
        source: event
            .source
            .clone()
            .unwrap_or_else(|| crate::validation::DEFAULT_SOURCE.to_string()),
        version: event
            .version
            .clone()
            .unwrap_or_else(|| crate::validation::DEFAULT_VERSION.to_string()),
        user_agent_parsed: event.user_agent.as_deref().and_then(parse_user_agent),
        country_code: event.country.as_deref().and_then(country_code),
        processed_at: now,
        processing_version: PROCESSING_VERSION.to_string(),
    })
}

/// Substring sniffing only. Order matters: Chrome UAs also carry a
/// Safari token, Edge and Opera also carry a Chrome token.
pub fn parse_user_agent(user_agent: &str) -> Option<UserAgent> {
    let browser = if user_agent.contains("Edg/") {
        "Edge"
    } else if user_agent.contains("OPR/") || user_agent.contains("Opera") {
        "Opera"
    } else if user_agent.contains("Chrome/") {
        "Chrome"
    } else if user_agent.contains("Firefox/") {
        "Firefox"
    } else if user_agent.contains("Safari/") {
        "Safari"
    } else {
        return None;
    };

    let os = if user_agent.contains("Windows") {
        Some("Windows")
    } else if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        Some("iOS")
    } else if user_agent.contains("Mac OS X") {
        Some("macOS")
    } else if user_agent.contains("Android") {
        Some("Android")
    } else if user_agent.contains("Linux") {
        Some("Linux")
    } else {
        None
    };

    let device = if user_agent.contains("Mobi")
        || user_agent.contains("iPhone")
        || user_agent.contains("Android")
    {
        "mobile"
    } else if user_agent.contains("iPad") || user_agent.contains("Tablet") {
        "tablet"
    } else {
        "desktop"
    };

    Some(UserAgent {
        browser: browser.to_string(),
        os: os.map(str::to_string),
        device: device.to_string(),
    })
}

/// Uppercase two-letter code, or nothing. No attempt to map country
/// names onto codes.
pub fn country_code(country: &str) -> Option<String> {
    if country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(country.to_ascii_uppercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EventCategory, EventType, NormalizedEventType};
    use crate::test_utils::{fixed_time, raw_event};
    use std::collections::{HashMap, HashSet};

    fn transform_ok(event: &RawEvent) -> TransformedEvent {
        transform(&SchemaRegistry::new(), event, &fixed_time()).unwrap()
    }

    #[test]
    fn purchase_gets_revenue_and_conversion_value() {
        let mut event = raw_event("purchase");
        event.amount = Some(42.5);
        let out = transform_ok(&event);
        assert!(out.is_conversion);
        assert_eq!(out.revenue, Some(42.5));
        assert_eq!(out.conversion_value, Some(42.5));
        assert_eq!(out.normalized_event_type, NormalizedEventType::Conversion);
        assert_eq!(out.event_category, EventCategory::Commerce);
    }

    #[test]
    fn purchase_without_amount_defaults_revenue_to_zero() {
        let out = transform_ok(&raw_event("purchase"));
        assert_eq!(out.revenue, Some(0.0));
        assert_eq!(out.conversion_value, Some(0.0));
    }

    #[test]
    fn signup_gets_conversion_value_but_never_revenue() {
        let mut event = raw_event("signup");
        event.amount = Some(10.0);
        let out = transform_ok(&event);
        assert!(out.is_conversion);
        assert_eq!(out.revenue, None);
        assert_eq!(out.conversion_value, Some(10.0));
        assert_eq!(out.event_category, EventCategory::UserManagement);
    }

    #[test]
    fn non_conversion_event_carries_neither_money_field() {
        let mut event = raw_event("click");
        event.amount = Some(5.0);
        let out = transform_ok(&event);
        assert!(!out.is_conversion);
        assert_eq!(out.revenue, None);
        assert_eq!(out.conversion_value, None);
    }

    #[test]
    fn missing_event_id_is_filled_in_and_unique() {
        let first = transform_ok(&raw_event("page_view"));
        let second = transform_ok(&raw_event("page_view"));
        assert!(!first.event_id.is_empty());
        assert_ne!(first.event_id, second.event_id);
    }

    #[test]
    fn producer_event_id_is_kept() {
        let mut event = raw_event("page_view");
        event.event_id = Some("evt-123".to_string());
        assert_eq!(transform_ok(&event).event_id, "evt-123");
    }

    #[test]
    fn missing_timestamp_defaults_to_processing_time() {
        let out = transform_ok(&raw_event("login"));
        assert_eq!(out.timestamp, fixed_time().now().to_rfc3339());
        assert_eq!(out.processed_at, fixed_time().now());
    }

    #[test]
    fn producer_timestamp_is_kept_verbatim() {
        let mut event = raw_event("login");
        event.timestamp = Some("2026-01-02T03:04:05.000006".to_string());
        assert_eq!(transform_ok(&event).timestamp, "2026-01-02T03:04:05.000006");
    }

    #[test]
    fn processing_version_is_stamped() {
        assert_eq!(transform_ok(&raw_event("logout")).processing_version, "1.0");
    }

    #[test]
    fn mapping_gap_when_tables_drift_from_the_enum() {
        let registry = SchemaRegistry::with_tables(
            HashMap::new(),
            HashMap::new(),
            HashSet::from([EventType::Purchase]),
        );
        let err = transform(&registry, &raw_event("click"), &fixed_time()).unwrap_err();
        assert!(matches!(err, crate::error::EventError::MappingGap(ref t) if t == "click"));
    }

    #[test]
    fn chrome_on_windows_is_detected() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let parsed = parse_user_agent(ua).unwrap();
        assert_eq!(parsed.browser, "Chrome");
        assert_eq!(parsed.os.as_deref(), Some("Windows"));
        assert_eq!(parsed.device, "desktop");
    }

    #[test]
    fn edge_wins_over_its_chrome_token() {
        let ua = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
        assert_eq!(parse_user_agent(ua).unwrap().browser, "Edge");
    }

    #[test]
    fn safari_on_iphone_is_detected() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
                  (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        let parsed = parse_user_agent(ua).unwrap();
        assert_eq!(parsed.browser, "Safari");
        assert_eq!(parsed.os.as_deref(), Some("iOS"));
        assert_eq!(parsed.device, "mobile");
    }

    #[test]
    fn unrecognised_user_agent_yields_nothing() {
        assert!(parse_user_agent("curl/8.4.0").is_none());
        let mut event = raw_event("click");
        event.user_agent = Some("curl/8.4.0".to_string());
        assert!(transform_ok(&event).user_agent_parsed.is_none());
    }

    #[test]
    fn country_codes_are_uppercased_or_dropped() {
        assert_eq!(country_code("de"), Some("DE".to_string()));
        assert_eq!(country_code("US"), Some("US".to_string()));
        assert_eq!(country_code("Germany"), None);
        assert_eq!(country_code("d1"), None);
        assert_eq!(country_code(""), None);
    }
}
