//! Host accessibility layer
//!
//! The filter never talks to a platform directly. Everything it reads or
//! does on screen goes through [`AccessibilityHost`].

use crate::error::ActionError;
use crate::ui::{SnapshotNode, UiNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Package reported once the simulated user lands on the home screen
pub const LAUNCHER_PACKAGE: &str = "launcher";

/// Action performed on a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum NodeAction {
    SetText(String),
    Click,
}

impl std::fmt::Display for NodeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeAction::SetText(_) => write!(f, "set_text"),
            NodeAction::Click => write!(f, "click"),
        }
    }
}

/// System-wide navigation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalAction {
    Back,
    Home,
}

impl std::fmt::Display for GlobalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobalAction::Back => write!(f, "back"),
            GlobalAction::Home => write!(f, "home"),
        }
    }
}

/// Platform accessibility service as seen by the filter
pub trait AccessibilityHost: Send + Sync + 'static {
    type Node: UiNode;

    /// Root of the active window, `None` when there is no window
    fn active_root(&self) -> Option<Self::Node>;
    /// Package currently in the foreground, if the host can tell
    fn foreground_package(&self) -> Option<String>;
    fn perform_action(&self, node: &Self::Node, action: NodeAction) -> Result<(), ActionError>;
    fn perform_global_action(&self, action: GlobalAction) -> Result<(), ActionError>;
}

/// One action recorded by [`SimulatedHost`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedAction {
    Node {
        view_id: Option<String>,
        action: NodeAction,
    },
    Global {
        action: GlobalAction,
    },
}

#[derive(Debug, Default)]
struct SimState {
    root: Option<SnapshotNode>,
    foreground: Option<String>,
    back_stack: Vec<String>,
    screens: HashMap<String, SnapshotNode>,
    actions: Vec<RecordedAction>,
    fail_node_actions: bool,
    fail_global_actions: bool,
}

/// In-memory host driven by snapshots, used for replays and tests.
///
/// Back pops the package stack, Home switches to [`LAUNCHER_PACKAGE`], and
/// clicking a node whose view id has a registered screen swaps the root.
#[derive(Debug, Default)]
pub struct SimulatedHost {
    state: Mutex<SimState>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn set_root(&self, root: Option<SnapshotNode>) {
        self.with_state(|s| s.root = root);
    }

    pub fn set_foreground(&self, package: Option<String>) {
        self.with_state(|s| s.foreground = package);
    }

    /// Packages revealed by successive back presses, nearest first
    pub fn set_back_stack(&self, packages: Vec<String>) {
        self.with_state(|s| {
            s.back_stack = packages;
            s.back_stack.reverse();
        });
    }

    /// Root shown after a node with `view_id` is clicked
    pub fn register_screen(&self, view_id: impl Into<String>, root: SnapshotNode) {
        self.with_state(|s| {
            s.screens.insert(view_id.into(), root);
        });
    }

    pub fn fail_node_actions(&self, fail: bool) {
        self.with_state(|s| s.fail_node_actions = fail);
    }

    pub fn fail_global_actions(&self, fail: bool) {
        self.with_state(|s| s.fail_global_actions = fail);
    }

    pub fn actions(&self) -> Vec<RecordedAction> {
        self.with_state(|s| s.actions.clone())
    }

    pub fn clear_actions(&self) {
        self.with_state(|s| s.actions.clear());
    }

    /// Count recorded global actions of one type
    pub fn global_count(&self, action: GlobalAction) -> usize {
        self.with_state(|s| {
            s.actions
                .iter()
                .filter(|a| matches!(a, RecordedAction::Global { action: g } if *g == action))
                .count()
        })
    }
}

impl AccessibilityHost for SimulatedHost {
    type Node = SnapshotNode;

    fn active_root(&self) -> Option<SnapshotNode> {
        self.with_state(|s| s.root.clone())
    }

    fn foreground_package(&self) -> Option<String> {
        self.with_state(|s| s.foreground.clone())
    }

    fn perform_action(&self, node: &SnapshotNode, action: NodeAction) -> Result<(), ActionError> {
        self.with_state(|s| {
            if s.fail_node_actions {
                return Err(ActionError::Rejected {
                    action: action.to_string(),
                });
            }
            let view_id = node.view_id();
            if action == NodeAction::Click {
                if let Some(screen) = view_id.as_ref().and_then(|id| s.screens.get(id)) {
                    s.root = Some(screen.clone());
                }
            }
            s.actions.push(RecordedAction::Node { view_id, action });
            Ok(())
        })
    }

    fn perform_global_action(&self, action: GlobalAction) -> Result<(), ActionError> {
        self.with_state(|s| {
            if s.fail_global_actions {
                return Err(ActionError::Rejected {
                    action: action.to_string(),
                });
            }
            match action {
                GlobalAction::Back => {
                    if let Some(previous) = s.back_stack.pop() {
                        s.foreground = Some(previous);
                    }
                }
                GlobalAction::Home => {
                    s.back_stack.clear();
                    s.foreground = Some(LAUNCHER_PACKAGE.to_string());
                }
            }
            s.actions.push(RecordedAction::Global { action });
            Ok(())
        })
    }
}
