use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnhandledError;

/// The closed set of inbound event types. Anything not listed here is
/// rejected at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    PageView,
    Click,
    Purchase,
    Signup,
    Login,
    Logout,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::PageView,
        EventType::Click,
        EventType::Purchase,
        EventType::Signup,
        EventType::Login,
        EventType::Logout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageView => "page_view",
            EventType::Click => "click",
            EventType::Purchase => "purchase",
            EventType::Signup => "signup",
            EventType::Login => "login",
            EventType::Logout => "logout",
        }
    }

    /// The legal set, rendered for error messages.
    pub fn legal_set() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for EventType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page_view" => Ok(EventType::PageView),
            "click" => Ok(EventType::Click),
            "purchase" => Ok(EventType::Purchase),
            "signup" => Ok(EventType::Signup),
            "login" => Ok(EventType::Login),
            "logout" => Ok(EventType::Logout),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The coarse vocabulary outbound consumers key on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedEventType {
    View,
    Interaction,
    Conversion,
    Authentication,
}

impl std::fmt::Display for NormalizedEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NormalizedEventType::View => "view",
            NormalizedEventType::Interaction => "interaction",
            NormalizedEventType::Conversion => "conversion",
            NormalizedEventType::Authentication => "authentication",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Navigation,
    Interaction,
    Commerce,
    UserManagement,
    Authentication,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventCategory::Navigation => "navigation",
            EventCategory::Interaction => "interaction",
            EventCategory::Commerce => "commerce",
            EventCategory::UserManagement => "user_management",
            EventCategory::Authentication => "authentication",
        };
        write!(f, "{}", s)
    }
}

/// Static lookup tables mapping inbound event types onto the outbound
/// vocabulary. Built once at startup, read-only after that.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    normalized: HashMap<EventType, NormalizedEventType>,
    categories: HashMap<EventType, EventCategory>,
    conversions: HashSet<EventType>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let normalized = HashMap::from([
            (EventType::PageView, NormalizedEventType::View),
            (EventType::Click, NormalizedEventType::Interaction),
            (EventType::Purchase, NormalizedEventType::Conversion),
            (EventType::Signup, NormalizedEventType::Conversion),
            (EventType::Login, NormalizedEventType::Authentication),
            (EventType::Logout, NormalizedEventType::Authentication),
        ]);
        let categories = HashMap::from([
            (EventType::PageView, EventCategory::Navigation),
            (EventType::Click, EventCategory::Interaction),
            (EventType::Purchase, EventCategory::Commerce),
            (EventType::Signup, EventCategory::UserManagement),
            (EventType::Login, EventCategory::Authentication),
            (EventType::Logout, EventCategory::Authentication),
        ]);
        let conversions = HashSet::from([EventType::Purchase, EventType::Signup]);

        Self {
            normalized,
            categories,
            conversions,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_tables(
        normalized: HashMap<EventType, NormalizedEventType>,
        categories: HashMap<EventType, EventCategory>,
        conversions: HashSet<EventType>,
    ) -> Self {
        Self {
            normalized,
            categories,
            conversions,
        }
    }

    pub fn is_valid_event_type(&self, event_type: &str) -> bool {
        EventType::from_str(event_type).is_ok()
    }

    pub fn normalized_type(&self, event_type: &str) -> Option<NormalizedEventType> {
        let parsed = EventType::from_str(event_type).ok()?;
        self.normalized.get(&parsed).copied()
    }

    pub fn category(&self, event_type: &str) -> Option<EventCategory> {
        let parsed = EventType::from_str(event_type).ok()?;
        self.categories.get(&parsed).copied()
    }

    pub fn is_conversion_type(&self, event_type: &str) -> bool {
        EventType::from_str(event_type)
            .map(|parsed| self.conversions.contains(&parsed))
            .unwrap_or(false)
    }

    /// Assert every legal event type has a row in both tables. Run once
    /// at startup so a table edit that misses a map fails loudly instead
    /// of dead-lettering valid traffic.
    pub fn verify(&self) -> Result<(), UnhandledError> {
        for event_type in EventType::ALL {
            if !self.normalized.contains_key(&event_type) {
                return Err(UnhandledError::InvariantViolation(format!(
                    "event type {} has no normalized type mapping",
                    event_type
                )));
            }
            if !self.categories.contains_key(&event_type) {
                return Err(UnhandledError::InvariantViolation(format!(
                    "event type {} has no category mapping",
                    event_type
                )));
            }
        }
        Ok(())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_cover_every_event_type() {
        let registry = SchemaRegistry::new();
        registry.verify().expect("default tables must be total");
        for event_type in EventType::ALL {
            assert!(registry.is_valid_event_type(event_type.as_str()));
            assert!(registry.normalized_type(event_type.as_str()).is_some());
            assert!(registry.category(event_type.as_str()).is_some());
        }
    }

    #[test]
    fn conversion_set_is_exactly_purchase_and_signup() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_conversion_type("purchase"));
        assert!(registry.is_conversion_type("signup"));
        for other in ["page_view", "click", "login", "logout"] {
            assert!(!registry.is_conversion_type(other), "{}", other);
        }
    }

    #[test]
    fn unknown_event_type_is_rejected_everywhere() {
        let registry = SchemaRegistry::new();
        assert!(!registry.is_valid_event_type("hover"));
        assert!(registry.normalized_type("hover").is_none());
        assert!(registry.category("hover").is_none());
        assert!(!registry.is_conversion_type("hover"));
    }

    #[test]
    fn verify_catches_a_missing_row() {
        let mut normalized = SchemaRegistry::new().normalized;
        normalized.remove(&EventType::Logout);
        let registry = SchemaRegistry::with_tables(
            normalized,
            SchemaRegistry::new().categories,
            SchemaRegistry::new().conversions,
        );
        assert!(registry.verify().is_err());
    }
}
