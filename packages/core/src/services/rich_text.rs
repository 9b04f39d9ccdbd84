//! Rich-text reference extraction
//!
//! Rich-text field values are documents of nested `{ nodeType, data, content }`
//! nodes. Entities can be embedded as blocks, inline, or as hyperlink targets;
//! all of those carry the reference in `data.target`.
//!
//! Extraction walks the document depth-first in document order. Embedded nodes
//! can sit inside arbitrary wrapper nodes (paragraphs, list items, table cells),
//! so every node's `content` is visited whether or not the node itself is a
//! reference.

use crate::models::has_sys;
use serde_json::Value;

/// Node types whose `data.target` is a reference
pub const EMBEDDED_NODE_TYPES: [&str; 4] = [
    "embedded-asset-block",
    "embedded-entry-block",
    "embedded-entry-inline",
    "entry-hyperlink",
];

/// Whether a field value is shaped like a rich-text document
pub fn is_rich_text(value: &Value) -> bool {
    value.get("content").is_some_and(Value::is_array)
}

/// Collect the `data.target` values of embedded nodes, in document order
pub fn extract_embedded_targets(document: &Value) -> Vec<&Value> {
    let mut targets = Vec::new();
    let mut stack: Vec<&Value> = match document.get("content").and_then(Value::as_array) {
        Some(content) => content.iter().rev().collect(),
        None => return targets,
    };

    while let Some(node) = stack.pop() {
        if let Some(target) = embedded_target(node) {
            targets.push(target);
        }
        if let Some(content) = node.get("content").and_then(Value::as_array) {
            stack.extend(content.iter().rev());
        }
    }

    targets
}

fn embedded_target(node: &Value) -> Option<&Value> {
    let node_type = node.get("nodeType")?.as_str()?;
    if !EMBEDDED_NODE_TYPES.contains(&node_type) {
        return None;
    }
    let target = node.get("data")?.get("target")?;
    has_sys(target).then_some(target)
}
