//! Small helpers over the kuchikiki DOM shared by the pipeline stages.

use kuchikiki::traits::TendrilSink;
use kuchikiki::NodeRef;

/// Parse a full document. Malformed markup yields a best-effort tree.
pub fn parse_html(html: &str) -> NodeRef {
    kuchikiki::parse_html().one(html)
}

/// Lowercase local tag name, or `None` for non-element nodes.
pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|el| el.name.local.to_string().to_ascii_lowercase())
}

pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|el| el.attributes.borrow().get(name).map(str::to_string))
}

pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(el) = node.as_element() {
        el.attributes.borrow_mut().insert(name, value.to_string());
    }
}

pub fn class_tokens(node: &NodeRef) -> Vec<String> {
    attr(node, "class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Every element under `root` (inclusive) matching `selector`, collected up
/// front so callers may detach nodes while iterating.
pub fn select_all(root: &NodeRef, selector: &str) -> Vec<NodeRef> {
    match root.select(selector) {
        Ok(matches) => matches.map(|m| m.as_node().clone()).collect(),
        Err(()) => {
            tracing::warn!(selector, "invalid CSS selector");
            Vec::new()
        }
    }
}

pub fn select_first(root: &NodeRef, selector: &str) -> Option<NodeRef> {
    root.select_first(selector).ok().map(|m| m.as_node().clone())
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
