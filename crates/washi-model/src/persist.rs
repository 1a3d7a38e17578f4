//! Persisted document form.
//!
//! A minimal element tree mirroring the serialized shape of the host editor's
//! document format: elements with a tag, ordered string attributes, and
//! children that are either nested elements or text runs. The two custom
//! extensions recognize their own elements by the reserved
//! `data-type` discriminator; everything else passes through untouched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reserved discriminator attribute identifying custom extension elements.
pub const DATA_TYPE_ATTR: &str = "data-type";

/// Reserved styling-class attribute.
pub const CLASS_ATTR: &str = "class";

/// One node in the persisted tree: a text run or a nested element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedNode {
    Text(String),
    Element(PersistedElement),
}

impl PersistedNode {
    /// Convenience constructor for a text run.
    pub fn text(s: impl Into<String>) -> Self {
        PersistedNode::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PersistedNode::Text(s) => Some(s),
            PersistedNode::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&PersistedElement> {
        match self {
            PersistedNode::Element(el) => Some(el),
            PersistedNode::Text(_) => None,
        }
    }
}

impl From<PersistedElement> for PersistedNode {
    fn from(el: PersistedElement) -> Self {
        PersistedNode::Element(el)
    }
}

/// A persisted element: tag, ordered attributes, children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PersistedNode>,
}

impl PersistedElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute insertion.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Builder-style child append.
    pub fn child(mut self, node: impl Into<PersistedNode>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Builder-style text child append.
    pub fn text_child(mut self, text: impl Into<String>) -> Self {
        self.children.push(PersistedNode::text(text));
        self
    }

    /// The `data-type` discriminator, if present.
    pub fn data_type(&self) -> Option<&str> {
        self.get(DATA_TYPE_ATTR)
    }

    /// Look up one attribute value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Concatenated text of all descendant text runs, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(children: &[PersistedNode], out: &mut String) {
    for child in children {
        match child {
            PersistedNode::Text(t) => out.push_str(t),
            PersistedNode::Element(el) => collect_text(&el.children, out),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let el = PersistedElement::new("a")
            .attr("class", "wiki-link")
            .text_child("see also");
        assert_eq!(el.tag, "a");
        assert_eq!(el.get("class"), Some("wiki-link"));
        assert_eq!(el.children.len(), 1);
    }

    #[test]
    fn test_data_type() {
        let el = PersistedElement::new("a").attr(DATA_TYPE_ATTR, "wiki-link");
        assert_eq!(el.data_type(), Some("wiki-link"));
        assert_eq!(PersistedElement::new("a").data_type(), None);
    }

    #[test]
    fn test_text_content_recurses() {
        let el = PersistedElement::new("p")
            .text_child("one ")
            .child(PersistedElement::new("em").text_child("two"))
            .text_child(" three");
        assert_eq!(el.text_content(), "one two three");
    }

    #[test]
    fn test_json_roundtrip() {
        let el = PersistedElement::new("pre")
            .attr(DATA_TYPE_ATTR, "code-block")
            .attr("data-language", "python")
            .text_child("print(1)");
        let json = serde_json::to_string(&el).unwrap();
        let parsed: PersistedElement = serde_json::from_str(&json).unwrap();
        assert_eq!(el, parsed);
    }

    #[test]
    fn test_json_attr_order_is_stable() {
        let el = PersistedElement::new("x").attr("b", "1").attr("a", "2");
        let json = serde_json::to_string(&el).unwrap();
        let b = json.find("\"b\"").unwrap();
        let a = json.find("\"a\"").unwrap();
        assert!(b < a, "declaration order preserved: {json}");
    }

    #[test]
    fn test_node_untagged_serde() {
        let text = PersistedNode::text("hello");
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"hello\"");

        let parsed: PersistedNode = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(parsed.as_text(), Some("hello"));

        let parsed: PersistedNode = serde_json::from_str(r#"{"tag":"p"}"#).unwrap();
        assert_eq!(parsed.as_element().map(|e| e.tag.as_str()), Some("p"));
    }

    #[test]
    fn test_empty_attrs_and_children_skipped_in_json() {
        let el = PersistedElement::new("p");
        let json = serde_json::to_string(&el).unwrap();
        assert_eq!(json, r#"{"tag":"p"}"#);
    }
}
