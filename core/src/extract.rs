//! Tree extractor
//!
//! Walks a UI tree with an explicit stack, bounded by depth and node count,
//! and flattens visible text into a single space-separated string.

use crate::config::FilterConfig;
use crate::ui::UiNode;

/// Token placed in front of address-bar contents
pub const URL_MARKER: &str = "URL:";

/// View id fragments that identify a browser address bar
pub const ADDRESS_BAR_HINTS: &[&str] = &[
    "url_bar",
    "url_field",
    "address_bar",
    "location_bar",
    "url_view",
    "omnibox",
];

/// Bounds applied to every tree walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    /// Deepest level visited (root is level 0)
    pub max_depth: usize,
    /// Total nodes visited before giving up
    pub max_nodes: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_nodes: 5000,
        }
    }
}

impl From<&FilterConfig> for WalkLimits {
    fn from(config: &FilterConfig) -> Self {
        Self {
            max_depth: config.max_tree_depth,
            max_nodes: config.max_tree_nodes.max(1),
        }
    }
}

/// Result of one tree walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub nodes_visited: usize,
    /// Set when a bound cut the walk short
    pub truncated: bool,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// URLs found behind [`URL_MARKER`] tokens
    pub fn urls(&self) -> Vec<String> {
        extract_urls(&self.text)
    }
}

/// Whether a view id looks like a browser address bar
pub fn is_address_bar(view_id: &str) -> bool {
    let id = view_id.to_lowercase();
    ADDRESS_BAR_HINTS.iter().any(|hint| id.contains(hint))
}

/// Flatten the visible text of a tree.
///
/// An absent root yields an empty extraction. Nodes below `max_depth` are
/// not visited, but everything collected above the bound is returned.
pub fn extract_text<N: UiNode>(root: Option<&N>, limits: WalkLimits) -> Extraction {
    let mut extraction = Extraction::default();
    let Some(root) = root else {
        return extraction;
    };

    let mut fragments: Vec<String> = Vec::new();
    let mut stack: Vec<(N, usize)> = vec![(root.clone(), 0)];

    while let Some((node, depth)) = stack.pop() {
        if extraction.nodes_visited >= limits.max_nodes {
            extraction.truncated = true;
            break;
        }
        extraction.nodes_visited += 1;

        collect_fragments(&node, &mut fragments);

        let child_count = node.child_count();
        if child_count == 0 {
            continue;
        }
        if depth >= limits.max_depth {
            extraction.truncated = true;
            continue;
        }
        // Reverse so children pop in document order
        for index in (0..child_count).rev() {
            if let Some(child) = node.child(index) {
                stack.push((child, depth + 1));
            }
        }
    }

    extraction.text = fragments.join(" ");
    extraction
}

fn collect_fragments<N: UiNode>(node: &N, fragments: &mut Vec<String>) {
    let text = node.text().map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let address_bar = node.view_id().is_some_and(|id| is_address_bar(&id));

    if let Some(text) = text {
        if address_bar {
            fragments.push(format!("{} {}", URL_MARKER, text));
        } else {
            fragments.push(text);
        }
    }
    if let Some(description) = node
        .content_description()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
    {
        fragments.push(description);
    }
}

/// Every token that follows a [`URL_MARKER`]
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == URL_MARKER {
            if let Some(url) = tokens.next() {
                urls.push(url.to_string());
            }
        } else if let Some(url) = token.strip_prefix(URL_MARKER) {
            if !url.is_empty() {
                urls.push(url.to_string());
            }
        }
    }
    urls
}

/// First node in depth-first pre-order that satisfies `predicate`
pub fn find_first<N, F>(root: &N, limits: WalkLimits, predicate: F) -> Option<N>
where
    N: UiNode,
    F: Fn(&N) -> bool,
{
    let mut visited = 0;
    let mut stack: Vec<(N, usize)> = vec![(root.clone(), 0)];

    while let Some((node, depth)) = stack.pop() {
        if visited >= limits.max_nodes {
            break;
        }
        visited += 1;

        if predicate(&node) {
            return Some(node);
        }
        if depth < limits.max_depth {
            for index in (0..node.child_count()).rev() {
                if let Some(child) = node.child(index) {
                    stack.push((child, depth + 1));
                }
            }
        }
    }
    None
}

/// Every node that satisfies `predicate`, in depth-first pre-order
pub fn find_all<N, F>(root: &N, limits: WalkLimits, predicate: F) -> Vec<N>
where
    N: UiNode,
    F: Fn(&N) -> bool,
{
    let mut found = Vec::new();
    let mut visited = 0;
    let mut stack: Vec<(N, usize)> = vec![(root.clone(), 0)];

    while let Some((node, depth)) = stack.pop() {
        if visited >= limits.max_nodes {
            break;
        }
        visited += 1;

        if depth < limits.max_depth {
            for index in (0..node.child_count()).rev() {
                if let Some(child) = node.child(index) {
                    stack.push((child, depth + 1));
                }
            }
        }
        if predicate(&node) {
            found.push(node);
        }
    }
    found
}

/// First text-input-capable node at or below `root`
pub fn find_editable<N: UiNode>(root: &N, limits: WalkLimits) -> Option<N> {
    find_first(root, limits, |node| node.is_editable())
}

/// Text currently typed at the event source.
///
/// Uses the source itself when it is editable, otherwise its first editable
/// descendant.
pub fn input_text<N: UiNode>(source: Option<&N>, limits: WalkLimits) -> Option<String> {
    let source = source?;
    let node = if source.is_editable() {
        source.clone()
    } else {
        find_editable(source, limits)?
    };
    node.text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::SnapshotNode;

    fn chain(depth: usize) -> SnapshotNode {
        let mut node = SnapshotNode::text_node(format!("level{}", depth));
        for level in (0..depth).rev() {
            node = SnapshotNode::text_node(format!("level{}", level)).with_child(node);
        }
        node
    }

    #[test]
    fn test_absent_root_is_empty() {
        let extraction = extract_text::<SnapshotNode>(None, WalkLimits::default());
        assert!(extraction.is_empty());
        assert_eq!(extraction.nodes_visited, 0);
    }

    #[test]
    fn test_collects_text_and_descriptions_in_order() {
        let root = SnapshotNode::new()
            .with_child(SnapshotNode::text_node("Hello"))
            .with_child(SnapshotNode::new().with_description("Profile photo"))
            .with_child(
                SnapshotNode::text_node("  Parent  ").with_child(SnapshotNode::text_node("child")),
            );

        let extraction = extract_text(Some(&root), WalkLimits::default());
        assert_eq!(extraction.text, "Hello Profile photo Parent child");
        assert!(!extraction.truncated);
    }

    #[test]
    fn test_address_bar_is_marked() {
        let root = SnapshotNode::new().with_child(
            SnapshotNode::text_node("pornhub.com/video")
                .with_view_id("com.android.chrome:id/url_bar"),
        );

        let extraction = extract_text(Some(&root), WalkLimits::default());
        assert_eq!(extraction.text, "URL: pornhub.com/video");
        assert_eq!(extraction.urls(), vec!["pornhub.com/video"]);
    }

    #[test]
    fn test_missing_children_and_fields_tolerated() {
        let root = SnapshotNode::new()
            .with_missing_child()
            .with_child(SnapshotNode::new())
            .with_child(SnapshotNode::text_node("kept"))
            .with_missing_child();

        let extraction = extract_text(Some(&root), WalkLimits::default());
        assert_eq!(extraction.text, "kept");
    }

    #[test]
    fn test_depth_bound_truncates_without_error() {
        let root = chain(15);
        let extraction = extract_text(Some(&root), WalkLimits::default());

        assert!(extraction.truncated);
        assert!(extraction.text.contains("level0"));
        assert!(extraction.text.contains("level10"));
        assert!(!extraction.text.contains("level11"));
        assert_eq!(extraction.nodes_visited, 11);
    }

    #[test]
    fn test_node_bound_truncates() {
        let root = SnapshotNode::new()
            .with_children((0..20).map(|i| SnapshotNode::text_node(format!("n{}", i))));
        let limits = WalkLimits {
            max_depth: 10,
            max_nodes: 5,
        };

        let extraction = extract_text(Some(&root), limits);
        assert!(extraction.truncated);
        assert_eq!(extraction.nodes_visited, 5);
        assert_eq!(extraction.text, "n0 n1 n2 n3");
    }

    #[test]
    fn test_extract_urls_forms() {
        let urls = extract_urls("foo URL: a.com bar URL:b.org URL:");
        assert_eq!(urls, vec!["a.com", "b.org"]);
    }

    #[test]
    fn test_input_text_from_descendant() {
        let source = SnapshotNode::new()
            .with_child(SnapshotNode::text_node("label"))
            .with_child(
                SnapshotNode::text_node("typed words").with_class("android.widget.EditText"),
            );

        let text = input_text(Some(&source), WalkLimits::default());
        assert_eq!(text, Some("typed words".to_string()));
    }

    #[test]
    fn test_input_text_from_editable_source() {
        let source = SnapshotNode::text_node("direct").editable();
        assert_eq!(
            input_text(Some(&source), WalkLimits::default()),
            Some("direct".to_string())
        );
        assert_eq!(input_text::<SnapshotNode>(None, WalkLimits::default()), None);
    }

    #[test]
    fn test_find_all_preorder() {
        let root = SnapshotNode::new()
            .with_child(SnapshotNode::new().with_view_id("close_a"))
            .with_child(
                SnapshotNode::new().with_child(SnapshotNode::new().with_view_id("close_b")),
            );
        let found = find_all(&root, WalkLimits::default(), |n| {
            n.view_id().is_some_and(|id| id.starts_with("close"))
        });
        let ids: Vec<_> = found.iter().filter_map(|n| n.view_id()).collect();
        assert_eq!(ids, vec!["close_a", "close_b"]);
    }

    #[test]
    fn test_is_address_bar() {
        assert!(is_address_bar("org.mozilla.firefox:id/mozac_browser_toolbar_url_view"));
        assert!(is_address_bar("com.sec.android.app.sbrowser:id/location_bar_edit_text"));
        assert!(!is_address_bar("com.whatsapp:id/entry"));
    }
}
