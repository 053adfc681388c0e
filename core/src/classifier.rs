//! Event classifier
//!
//! Decides how each UI event is checked: after a quiet period (debounced per
//! category), right away (submission), or not at all.

use crate::config::FilterConfig;
use crate::ui::{UiEvent, UiEventKind, UiNode, ACTION_NEXT_HTML_ELEMENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Class names of widgets whose activation submits input
pub const BUTTON_CLASSES: &[&str] = &["android.widget.Button", "android.widget.ImageButton"];

/// What a check looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    /// Text typed into the event source
    Text,
    /// Full tree of the active window
    Content,
    /// Text at a submission, checked without delay
    Immediate,
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckCategory::Text => write!(f, "text"),
            CheckCategory::Content => write!(f, "content"),
            CheckCategory::Immediate => write!(f, "immediate"),
        }
    }
}

/// Routing decision for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run after `delay`, superseding any pending check of the same category
    Debounced {
        category: CheckCategory,
        delay: Duration,
    },
    /// Run now
    Immediate,
    /// Nothing to do
    Ignore,
}

/// Routes incoming UI events
#[derive(Debug, Clone)]
pub struct EventClassifier {
    own_package: String,
    text_debounce: Duration,
    content_debounce: Duration,
}

impl EventClassifier {
    pub fn new(own_package: impl Into<String>, config: &FilterConfig) -> Self {
        Self {
            own_package: own_package.into(),
            text_debounce: config.text_debounce(),
            content_debounce: config.content_debounce(),
        }
    }

    /// Route an event. Events from our own package are always ignored.
    pub fn route<N: UiNode>(&self, event: &UiEvent<N>) -> Route {
        if event.package.as_deref() == Some(self.own_package.as_str()) {
            return Route::Ignore;
        }

        match event.kind {
            UiEventKind::TextChanged => Route::Debounced {
                category: CheckCategory::Text,
                delay: self.text_debounce,
            },
            UiEventKind::ViewClicked if is_submission(event) => Route::Immediate,
            UiEventKind::WindowContentChanged
            | UiEventKind::Scrolled
            | UiEventKind::WindowStateChanged
            | UiEventKind::ViewFocused
            | UiEventKind::ViewClicked => Route::Debounced {
                category: CheckCategory::Content,
                delay: self.content_debounce,
            },
            UiEventKind::TextSelectionChanged if is_submission(event) => Route::Immediate,
            UiEventKind::TextSelectionChanged | UiEventKind::Other => {
                debug!(
                    "Ignoring {} event from {}",
                    event.kind,
                    event.package.as_deref().unwrap_or("unknown package")
                );
                Route::Ignore
            }
        }
    }
}

/// Whether a widget class looks like a button
pub fn is_button_like(class_name: &str) -> bool {
    BUTTON_CLASSES.contains(&class_name) || class_name.ends_with("Button")
}

/// Whether the event signals that input is being submitted.
///
/// Either the enter-key signature on a selection change, or a click on a
/// button-like source (Send, Search, ...).
pub fn is_submission<N: UiNode>(event: &UiEvent<N>) -> bool {
    let Some(source) = event.source.as_ref() else {
        return false;
    };

    match event.kind {
        UiEventKind::TextSelectionChanged => event.action == Some(ACTION_NEXT_HTML_ELEMENT),
        UiEventKind::ViewClicked => source
            .class_name()
            .is_some_and(|class| is_button_like(&class)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::SnapshotNode;

    fn classifier() -> EventClassifier {
        EventClassifier::new("com.wordguard", &FilterConfig::default())
    }

    fn event(kind: UiEventKind) -> UiEvent<SnapshotNode> {
        UiEvent::new(kind, "com.chat")
    }

    #[test]
    fn test_own_package_ignored() {
        let e = UiEvent::<SnapshotNode>::new(UiEventKind::TextChanged, "com.wordguard");
        assert_eq!(classifier().route(&e), Route::Ignore);
    }

    #[test]
    fn test_text_changed_debounced_500ms() {
        assert_eq!(
            classifier().route(&event(UiEventKind::TextChanged)),
            Route::Debounced {
                category: CheckCategory::Text,
                delay: Duration::from_millis(500),
            }
        );
    }

    #[test]
    fn test_content_kinds_debounced_1000ms() {
        for kind in [
            UiEventKind::WindowContentChanged,
            UiEventKind::Scrolled,
            UiEventKind::WindowStateChanged,
            UiEventKind::ViewFocused,
            UiEventKind::ViewClicked,
        ] {
            assert_eq!(
                classifier().route(&event(kind)),
                Route::Debounced {
                    category: CheckCategory::Content,
                    delay: Duration::from_millis(1000),
                },
                "kind {}",
                kind
            );
        }
    }

    #[test]
    fn test_button_click_is_immediate() {
        let e = event(UiEventKind::ViewClicked)
            .with_source(SnapshotNode::new().with_class("android.widget.ImageButton"));
        assert_eq!(classifier().route(&e), Route::Immediate);
    }

    #[test]
    fn test_enter_key_selection_is_immediate() {
        let e = event(UiEventKind::TextSelectionChanged)
            .with_source(SnapshotNode::new().editable())
            .with_action(ACTION_NEXT_HTML_ELEMENT);
        assert_eq!(classifier().route(&e), Route::Immediate);
    }

    #[test]
    fn test_plain_selection_change_ignored() {
        let e = event(UiEventKind::TextSelectionChanged).with_source(SnapshotNode::new());
        assert_eq!(classifier().route(&e), Route::Ignore);
        assert_eq!(classifier().route(&event(UiEventKind::Other)), Route::Ignore);
    }

    #[test]
    fn test_is_button_like() {
        assert!(is_button_like("android.widget.Button"));
        assert!(is_button_like("com.google.android.material.button.MaterialButton"));
        assert!(!is_button_like("android.widget.TextView"));
    }
}
