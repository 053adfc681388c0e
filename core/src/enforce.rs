//! Enforcement actions
//!
//! Once a decision fires, the enforcer clears the offending input, closes
//! browser tabs and walks the user out of the app. Every step is
//! best-effort: failures are logged and counted, never propagated.

use crate::config::EnforcementConfig;
use crate::extract::{find_all, find_editable, find_first, WalkLimits};
use crate::host::{AccessibilityHost, GlobalAction, NodeAction};
use crate::ui::UiNode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Fragments identifying the tab-switcher affordance
const TAB_SWITCHER_HINTS: &[&str] = &["tab_switcher", "tabs_button", "switch tabs", "open tabs"];
/// Fragments identifying a close-tab affordance
const CLOSE_TAB_HINTS: &[&str] = &["close_tab", "close tab", "tab_close"];

/// What an enforcement run managed to do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementReport {
    pub cleared_input: bool,
    pub tabs_closed: usize,
    pub back_presses: u32,
    pub went_home: bool,
    /// Individual actions the host rejected
    pub failures: usize,
}

impl EnforcementReport {
    /// Whether the user was moved out of the offending package
    pub fn left_package(&self) -> bool {
        self.went_home || self.back_presses > 0
    }
}

fn matches_hint(value: Option<String>, hints: &[&str]) -> bool {
    value.is_some_and(|v| {
        let v = v.to_lowercase();
        hints.iter().any(|hint| v.contains(hint))
    })
}

/// Whether a node opens the browser's tab overview
pub fn is_tab_switcher<N: UiNode>(node: &N) -> bool {
    matches_hint(node.view_id(), TAB_SWITCHER_HINTS)
        || matches_hint(node.content_description(), TAB_SWITCHER_HINTS)
}

/// Whether a node closes a single tab
pub fn is_close_tab<N: UiNode>(node: &N) -> bool {
    matches_hint(node.view_id(), CLOSE_TAB_HINTS)
        || node
            .content_description()
            .is_some_and(|d| d.trim_start().to_lowercase().starts_with("close"))
}

/// Runs enforcement against a host
#[derive(Debug, Clone)]
pub struct Enforcer {
    config: EnforcementConfig,
    limits: WalkLimits,
}

impl Enforcer {
    pub fn new(config: EnforcementConfig, limits: WalkLimits) -> Self {
        Self { config, limits }
    }

    /// Enforce against `package`. Always completes; the report says what
    /// succeeded.
    pub async fn enforce<H: AccessibilityHost>(
        &self,
        host: &H,
        package: &str,
        source: Option<&H::Node>,
    ) -> EnforcementReport {
        let mut report = EnforcementReport::default();

        if self.config.clear_input {
            self.clear_input(host, source, &mut report);
        }
        if self.config.close_tabs {
            self.close_tabs(host, &mut report);
        }
        self.leave_package(host, package, &mut report).await;

        debug!("Enforcement on {} finished: {:?}", package, report);
        report
    }

    fn clear_input<H: AccessibilityHost>(
        &self,
        host: &H,
        source: Option<&H::Node>,
        report: &mut EnforcementReport,
    ) {
        let editable = source
            .and_then(|node| {
                if node.is_editable() {
                    Some(node.clone())
                } else {
                    find_editable(node, self.limits)
                }
            })
            .or_else(|| {
                host.active_root()
                    .and_then(|root| find_editable(&root, self.limits))
            });

        let Some(node) = editable else {
            debug!("No editable node to clear");
            return;
        };
        match host.perform_action(&node, NodeAction::SetText(String::new())) {
            Ok(()) => report.cleared_input = true,
            Err(e) => {
                warn!("Failed to clear input: {}", e);
                report.failures += 1;
            }
        }
    }

    fn close_tabs<H: AccessibilityHost>(&self, host: &H, report: &mut EnforcementReport) {
        let Some(root) = host.active_root() else {
            return;
        };
        let Some(switcher) = find_first(&root, self.limits, is_tab_switcher) else {
            debug!("No tab switcher on screen");
            return;
        };
        if let Err(e) = host.perform_action(&switcher, NodeAction::Click) {
            warn!("Failed to open tab switcher: {}", e);
            report.failures += 1;
            return;
        }

        // The overview is a different tree
        let Some(overview) = host.active_root() else {
            return;
        };
        for close in find_all(&overview, self.limits, is_close_tab) {
            match host.perform_action(&close, NodeAction::Click) {
                Ok(()) => report.tabs_closed += 1,
                Err(e) => {
                    warn!("Failed to close tab: {}", e);
                    report.failures += 1;
                }
            }
        }
    }

    async fn leave_package<H: AccessibilityHost>(
        &self,
        host: &H,
        package: &str,
        report: &mut EnforcementReport,
    ) {
        let pacing = self.config.back_pacing();
        for _ in 0..self.config.back_attempts {
            if !still_in(host, package) {
                break;
            }
            match host.perform_global_action(GlobalAction::Back) {
                Ok(()) => report.back_presses += 1,
                Err(e) => {
                    warn!("Back action failed: {}", e);
                    report.failures += 1;
                }
            }
            pause(pacing).await;
        }

        if still_in(host, package) {
            match host.perform_global_action(GlobalAction::Home) {
                Ok(()) => report.went_home = true,
                Err(e) => {
                    warn!("Home action failed: {}", e);
                    report.failures += 1;
                }
            }
        }
    }
}

/// Unknown foreground counts as still inside
fn still_in<H: AccessibilityHost>(host: &H, package: &str) -> bool {
    host.foreground_package()
        .map_or(true, |foreground| foreground == package)
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
