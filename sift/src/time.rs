use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Clock seam so transformation stays deterministic under test.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Accepts RFC 3339, plus zone-less ISO-8601 since plenty of producers
/// stamp local naive datetimes. Naive times are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_timestamp("2026-03-01T12:30:00+02:00").unwrap();
        assert_eq!(parsed.hour(), 10);
    }

    #[test]
    fn parses_naive_iso_with_fractional_seconds() {
        assert!(parse_timestamp("2026-03-01T12:30:00.123456").is_some());
        assert!(parse_timestamp("2026-03-01T12:30:00").is_some());
    }

    #[test]
    fn rejects_non_iso_strings() {
        assert!(parse_timestamp("01/03/2026 12:30").is_none());
        assert!(parse_timestamp("not-a-time").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
