//! Replay of recorded UI sessions
//!
//! Each line of a replay file is one UI event together with the screen
//! state the host showed at that moment. Events are fed to a real
//! `FilterService` running against a simulated host, with the original
//! spacing between them preserved.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use wordguard_core::{
    AccessibilityHost, FilterService, ManualClock, SimulatedHost, SnapshotNode, UiEvent,
    UiEventKind,
};

use crate::i18n::t_args;

/// One recorded UI event
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRecord {
    /// Milliseconds since the start of the recording
    pub at_ms: u64,
    pub kind: UiEventKind,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub source: Option<SnapshotNode>,
    /// Active window root from this point on
    #[serde(default)]
    pub root: Option<SnapshotNode>,
    /// Foreground package from this point on
    #[serde(default)]
    pub foreground: Option<String>,
    #[serde(default)]
    pub action: Option<i32>,
    /// Accessibility permission toggled at this point
    #[serde(default)]
    pub accessibility: Option<bool>,
}

impl ReplayRecord {
    fn to_event(&self) -> UiEvent<SnapshotNode> {
        UiEvent {
            kind: self.kind,
            package: self.package.clone(),
            source: self.source.clone(),
            action: self.action,
        }
    }
}

/// Parse a JSON Lines replay file, skipping blank and malformed lines
pub fn parse_records(content: &str) -> Vec<ReplayRecord> {
    let mut records: Vec<ReplayRecord> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                let line_no = (index + 1).to_string();
                eprintln!(
                    "{}",
                    t_args(
                        "replay-bad-line",
                        &[("line", &line_no), ("error", &e.to_string())]
                    )
                );
                None
            }
        })
        .collect();
    records.sort_by_key(|r| r.at_ms);
    records
}

pub fn read_records(path: &Path) -> Result<Vec<ReplayRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("{}: {}", crate::i18n::t("error-read-replay"), path.display()))?;
    Ok(parse_records(&content))
}

/// Apply a record's screen state to the host
pub fn apply_screen(host: &SimulatedHost, record: &ReplayRecord) {
    if let Some(root) = &record.root {
        host.set_root(Some(root.clone()));
    }
    if let Some(foreground) = &record.foreground {
        host.set_foreground(Some(foreground.clone()));
    }
}

/// Feed every record to `service` and wait for the last check to settle
pub async fn run(
    service: &FilterService<SimulatedHost>,
    clock: &ManualClock,
    records: &[ReplayRecord],
    base_ms: i64,
) {
    let mut elapsed = 0u64;
    for record in records {
        if record.at_ms > elapsed {
            tokio::time::sleep(Duration::from_millis(record.at_ms - elapsed)).await;
            elapsed = record.at_ms;
        }
        clock.set(base_ms + record.at_ms as i64);

        apply_screen(service.host(), record);
        if let Some(enabled) = record.accessibility {
            service.on_accessibility_state(enabled);
        }
        service.on_event(record.to_event());
        service.heartbeat();
    }

    tokio::time::sleep(settle_time(service)).await;
    if service.pending_checks() > 0 {
        warn!("Replay ended with checks still pending");
    }
}

/// Longest a trailing event can take to run through the pipeline
fn settle_time(service: &FilterService<impl AccessibilityHost>) -> Duration {
    let config = service.config();
    let debounce = config.filter.text_debounce().max(config.filter.content_debounce());
    let enforcement = config.enforcement.back_pacing() * config.enforcement.back_attempts;
    debounce + enforcement + Duration::from_millis(250)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_sorted_and_lenient() {
        let content = r#"
{"at_ms": 900, "kind": "window_content_changed", "package": "com.browser"}
not json
{"at_ms": 100, "kind": "text_changed", "package": "com.chat", "source": {"text": "hi", "editable": true}}
"#;
        let records = parse_records(content);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].at_ms, 100);
        assert_eq!(records[0].kind, UiEventKind::TextChanged);
        assert_eq!(records[1].package.as_deref(), Some("com.browser"));
    }

    #[test]
    fn test_apply_screen_updates_host() {
        let host = SimulatedHost::new();
        let record: ReplayRecord = serde_json::from_str(
            r#"{"at_ms": 0, "kind": "window_state_changed",
                "root": {"text": "page"}, "foreground": "com.browser"}"#,
        )
        .unwrap();

        apply_screen(&host, &record);
        assert_eq!(host.foreground_package(), Some("com.browser".to_string()));
        assert!(host.active_root().is_some());
    }
}
