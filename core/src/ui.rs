//! UI model consumed by the filter
//!
//! The host accessibility layer hands us events and node trees. Nodes are
//! abstracted behind [`UiNode`] so the engine never depends on a platform
//! API; [`SnapshotNode`] is an owned, serializable tree used for replays.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Android's `AccessibilityNodeInfo.ACTION_NEXT_HTML_ELEMENT`, reported on
/// selection changes caused by the enter key.
pub const ACTION_NEXT_HTML_ELEMENT: i32 = 0x0000_0400;

/// A node in the host's UI tree.
///
/// Every accessor may come back empty: hosts routinely hand out nodes whose
/// fields or children have vanished by the time we read them.
pub trait UiNode: Clone + Send + Sync + 'static {
    fn text(&self) -> Option<String>;
    fn content_description(&self) -> Option<String>;
    fn view_id(&self) -> Option<String>;
    fn class_name(&self) -> Option<String>;
    fn child_count(&self) -> usize;
    fn child(&self, index: usize) -> Option<Self>;

    /// Whether the node accepts text input
    fn is_editable(&self) -> bool {
        self.class_name()
            .is_some_and(|class| class.ends_with("EditText"))
    }
}

/// Kind of UI change reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiEventKind {
    TextChanged,
    WindowContentChanged,
    Scrolled,
    WindowStateChanged,
    ViewFocused,
    ViewClicked,
    TextSelectionChanged,
    Other,
}

impl UiEventKind {
    /// Map an Android `AccessibilityEvent` type constant
    pub fn from_android(event_type: u32) -> Self {
        match event_type {
            0x0000_0001 => UiEventKind::ViewClicked,
            0x0000_0008 => UiEventKind::ViewFocused,
            0x0000_0010 => UiEventKind::TextChanged,
            0x0000_0020 => UiEventKind::WindowStateChanged,
            0x0000_0800 => UiEventKind::WindowContentChanged,
            0x0000_1000 => UiEventKind::Scrolled,
            0x0000_2000 => UiEventKind::TextSelectionChanged,
            _ => UiEventKind::Other,
        }
    }
}

impl std::fmt::Display for UiEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UiEventKind::TextChanged => "text_changed",
            UiEventKind::WindowContentChanged => "window_content_changed",
            UiEventKind::Scrolled => "scrolled",
            UiEventKind::WindowStateChanged => "window_state_changed",
            UiEventKind::ViewFocused => "view_focused",
            UiEventKind::ViewClicked => "view_clicked",
            UiEventKind::TextSelectionChanged => "text_selection_changed",
            UiEventKind::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// A UI change notification
#[derive(Debug, Clone)]
pub struct UiEvent<N> {
    pub kind: UiEventKind,
    /// Package owning the window the event came from
    pub package: Option<String>,
    /// Node the event originated at
    pub source: Option<N>,
    /// Action code attached to the event, if any
    pub action: Option<i32>,
}

impl<N> UiEvent<N> {
    pub fn new(kind: UiEventKind, package: impl Into<String>) -> Self {
        Self {
            kind,
            package: Some(package.into()),
            source: None,
            action: None,
        }
    }

    pub fn with_source(mut self, source: N) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_action(mut self, action: i32) -> Self {
        self.action = Some(action);
        self
    }
}

/// Plain data behind a [`SnapshotNode`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    pub text: Option<String>,
    pub description: Option<String>,
    pub view_id: Option<String>,
    pub class_name: Option<String>,
    pub editable: bool,
    /// `null` entries model children the host failed to hand out
    pub children: Vec<Option<SnapshotNode>>,
}

/// Owned UI tree, cheap to clone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeInfo", into = "NodeInfo")]
pub struct SnapshotNode(Arc<NodeInfo>);

impl From<NodeInfo> for SnapshotNode {
    fn from(info: NodeInfo) -> Self {
        SnapshotNode(Arc::new(info))
    }
}

impl From<SnapshotNode> for NodeInfo {
    fn from(node: SnapshotNode) -> Self {
        Arc::try_unwrap(node.0).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl SnapshotNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaf node carrying text
    pub fn text_node(text: impl Into<String>) -> Self {
        Self::new().with_text(text)
    }

    pub fn info(&self) -> &NodeInfo {
        &self.0
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.0).text = Some(text.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.0).description = Some(description.into());
        self
    }

    pub fn with_view_id(mut self, view_id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.0).view_id = Some(view_id.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.0).class_name = Some(class_name.into());
        self
    }

    pub fn editable(mut self) -> Self {
        Arc::make_mut(&mut self.0).editable = true;
        self
    }

    pub fn with_child(mut self, child: SnapshotNode) -> Self {
        Arc::make_mut(&mut self.0).children.push(Some(child));
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = SnapshotNode>) -> Self {
        Arc::make_mut(&mut self.0)
            .children
            .extend(children.into_iter().map(Some));
        self
    }

    /// Append a child slot the host cannot resolve
    pub fn with_missing_child(mut self) -> Self {
        Arc::make_mut(&mut self.0).children.push(None);
        self
    }
}

impl UiNode for SnapshotNode {
    fn text(&self) -> Option<String> {
        self.0.text.clone()
    }

    fn content_description(&self) -> Option<String> {
        self.0.description.clone()
    }

    fn view_id(&self) -> Option<String> {
        self.0.view_id.clone()
    }

    fn class_name(&self) -> Option<String> {
        self.0.class_name.clone()
    }

    fn child_count(&self) -> usize {
        self.0.children.len()
    }

    fn child(&self, index: usize) -> Option<Self> {
        self.0.children.get(index).cloned().flatten()
    }

    fn is_editable(&self) -> bool {
        self.0.editable
            || self
                .0
                .class_name
                .as_deref()
                .is_some_and(|class| class.ends_with("EditText"))
    }
}
