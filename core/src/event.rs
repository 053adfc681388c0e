//! Event types for WordGuard
//!
//! Defines every event the filter records while classifying UI activity.

use crate::classifier::CheckCategory;
use crate::notify::NotificationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Severity for categorizing filter events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine activity (checks, lifecycle)
    Info,
    /// Blocked content seen, one-shot enforcement
    Warning,
    /// App-level block in force
    Block,
}

impl Severity {
    /// Returns the emoji representation of the severity
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Info => "🟢",
            Severity::Warning => "🟠",
            Severity::Block => "🔴",
        }
    }

    /// Returns a text alternative for terminals without emoji support
    pub fn text_label(&self) -> &'static str {
        match self {
            Severity::Info => "[INFO]",
            Severity::Warning => "[WARN]",
            Severity::Block => "[BLOCK]",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Block => write!(f, "block"),
        }
    }
}

/// Service lifecycle actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAction {
    Start,
    Stop,
    AccessibilityOff,
    AccessibilityOn,
    ForceStopDetected,
}

/// Type of event recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    /// A snapshot was classified
    Classification {
        category: CheckCategory,
        nodes_visited: usize,
        text_len: usize,
    },
    /// Explicit words found in a snapshot
    WordMatch { words: Vec<String> },
    /// A blocked site was on screen
    SiteMatch { url: String, root: String },
    /// A word crossed the frequency threshold and the app was blocked
    FrequencyBlock {
        word: String,
        count: usize,
        expires_at: DateTime<Utc>,
    },
    /// The app is still under an earlier block
    ActiveBlock { expires_at: DateTime<Utc> },
    /// Corrective actions were taken
    Enforcement {
        cleared_input: bool,
        tabs_closed: usize,
        back_presses: u32,
        went_home: bool,
        failures: usize,
    },
    /// A notification was queued for recipients
    Notification {
        kind: NotificationKind,
        recipients: usize,
    },
    /// Service lifecycle
    Service { action: ServiceAction },
}

/// An event recorded by WordGuard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: uuid::Uuid,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
    /// Event type and details
    #[serde(flatten)]
    pub event_type: EventType,
    /// Package the event concerns
    pub package: String,
    /// Severity
    pub severity: Severity,
    /// Whether this event corresponds to an intervention
    pub alert: bool,
}

impl Event {
    /// Create a new event with current timestamp
    pub fn new(event_type: EventType, package: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            package: package.into(),
            severity,
            alert: severity >= Severity::Warning,
        }
    }

    /// Create a classification event
    pub fn classification(
        package: &str,
        category: CheckCategory,
        nodes_visited: usize,
        text_len: usize,
    ) -> Self {
        Self::new(
            EventType::Classification {
                category,
                nodes_visited,
                text_len,
            },
            package,
            Severity::Info,
        )
    }

    /// Create a service lifecycle event
    pub fn service(package: &str, action: ServiceAction) -> Self {
        let severity = match action {
            ServiceAction::AccessibilityOff | ServiceAction::ForceStopDetected => {
                Severity::Warning
            }
            _ => Severity::Info,
        };
        Self::new(EventType::Service { action }, package, severity)
    }
}

/// Receiver of filter events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Sink that keeps events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count recorded events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&EventType) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| predicate(&e.event_type)).count())
            .unwrap_or(0)
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn emit(&self, event: &Event) {
        (**self).emit(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Block);
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Info.emoji(), "🟢");
        assert_eq!(Severity::Block.text_label(), "[BLOCK]");
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[test]
    fn test_alert_follows_severity() {
        let info = Event::classification("com.app", CheckCategory::Text, 3, 10);
        assert!(!info.alert);

        let warn = Event::new(
            EventType::WordMatch {
                words: vec!["porn".to_string()],
            },
            "com.app",
            Severity::Warning,
        );
        assert!(warn.alert);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::classification("com.app", CheckCategory::Content, 12, 40);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"classification\""));
        assert!(json.contains("\"category\":\"content\""));
        assert!(json.contains("\"severity\":\"info\""));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type, event.event_type);
    }

    #[test]
    fn test_service_event_severity() {
        let off = Event::service("wordguard", ServiceAction::AccessibilityOff);
        assert_eq!(off.severity, Severity::Warning);
        let start = Event::service("wordguard", ServiceAction::Start);
        assert_eq!(start.severity, Severity::Info);
    }

    #[test]
    fn test_memory_sink_counts() {
        let sink = MemorySink::new();
        sink.emit(&Event::classification("a", CheckCategory::Text, 1, 1));
        sink.emit(&Event::service("a", ServiceAction::Start));
        assert_eq!(sink.events().len(), 2);
        assert_eq!(
            sink.count(|t| matches!(t, EventType::Classification { .. })),
            1
        );
    }
}
