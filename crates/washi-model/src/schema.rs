//! Attribute schema registry.
//!
//! Each custom element type declares its attributes up front: name, default
//! value, and how the value converts to and from the persisted string form.
//! The registry is a closed schema — attributes nobody declared are dropped on
//! serialization, and defaults fill in whenever an element arrives without
//! explicit values. Declaring the same attribute twice for one element type
//! (or the same element type twice) is rejected at registration time.
//!
//! Presentational pass-through attributes (extra HTML attributes supplied by
//! extension configs) are deliberately *not* governed here — the registry
//! owns model attributes only.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Errors raised while registering element specs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two attributes with the same name declared for one element type.
    #[error("attribute {attr:?} declared twice for element type {element:?}")]
    DuplicateAttribute { element: String, attr: String },

    /// The same element type registered twice.
    #[error("element type {0:?} registered twice")]
    DuplicateElement(String),
}

/// A typed attribute value in the model layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Absent — rendered as an omitted attribute.
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

/// How an attribute converts to and from its persisted string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttrCodec {
    /// Stored verbatim.
    #[default]
    Text,
    /// `"true"` / `"false"`.
    Bool,
    /// Decimal integer.
    Int,
}

impl AttrCodec {
    /// Parse a persisted string into a typed value. `None` means malformed.
    pub fn parse(&self, raw: &str) -> Option<AttrValue> {
        match self {
            AttrCodec::Text => Some(AttrValue::Str(raw.to_string())),
            AttrCodec::Bool => raw.parse().ok().map(AttrValue::Bool),
            AttrCodec::Int => raw.parse().ok().map(AttrValue::Int),
        }
    }

    /// Render a typed value to its persisted string. `None` means the
    /// attribute is omitted entirely (null values never persist).
    pub fn render(&self, value: &AttrValue) -> Option<String> {
        match value {
            AttrValue::Null => None,
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::Int(n) => Some(n.to_string()),
            AttrValue::Str(s) => Some(s.clone()),
        }
    }
}

/// One declared attribute: name, default, persisted-form codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSpec {
    pub name: String,
    pub default: AttrValue,
    pub codec: AttrCodec,
}

impl AttrSpec {
    /// Declare an attribute with the verbatim text codec.
    pub fn new(name: impl Into<String>, default: AttrValue) -> Self {
        Self {
            name: name.into(),
            default,
            codec: AttrCodec::Text,
        }
    }

    /// Override the persisted-form codec.
    pub fn with_codec(mut self, codec: AttrCodec) -> Self {
        self.codec = codec;
        self
    }
}

/// Whether an element type is an inline mark or a structural node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Inline, non-structural annotation over a run of text.
    Mark,
    /// Structural element that can carry content of its own.
    Node,
}

/// Declaration of one custom element type, handed to [`SchemaRegistry::register`].
///
/// Attribute uniqueness is validated at registration, not while building,
/// so declarations chain freely.
#[derive(Debug, Clone)]
pub struct ElementSpec {
    type_tag: String,
    kind: ElementKind,
    attrs: Vec<AttrSpec>,
}

impl ElementSpec {
    pub fn new(type_tag: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            type_tag: type_tag.into(),
            kind,
            attrs: Vec::new(),
        }
    }

    /// Declare one attribute. Duplicates are caught by `register`.
    pub fn attr(mut self, spec: AttrSpec) -> Self {
        self.attrs.push(spec);
        self
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }
}

/// A registered element type: kind plus its declared attributes, in
/// declaration order.
#[derive(Debug, Clone)]
struct RegisteredElement {
    kind: ElementKind,
    attrs: IndexMap<String, AttrSpec>,
}

/// The closed attribute schema for all custom element types.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    elements: IndexMap<String, RegisteredElement>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the built-in extensions: the wiki-link
    /// mark and the executable code block.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(crate::mark::WikiLink::spec())
            .expect("builtin wiki-link spec is valid");
        registry
            .register(crate::node::CodeBlock::spec())
            .expect("builtin code-block spec is valid");
        registry
    }

    /// Register an element type, rejecting duplicate element types and
    /// duplicate attribute names within the spec.
    pub fn register(&mut self, spec: ElementSpec) -> std::result::Result<(), SchemaError> {
        if self.elements.contains_key(&spec.type_tag) {
            return Err(SchemaError::DuplicateElement(spec.type_tag));
        }
        let mut attrs = IndexMap::new();
        for attr in spec.attrs {
            if attrs.contains_key(&attr.name) {
                return Err(SchemaError::DuplicateAttribute {
                    element: spec.type_tag,
                    attr: attr.name,
                });
            }
            attrs.insert(attr.name.clone(), attr);
        }
        self.elements.insert(
            spec.type_tag,
            RegisteredElement {
                kind: spec.kind,
                attrs,
            },
        );
        Ok(())
    }

    /// Whether an element type is registered.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.elements.contains_key(type_tag)
    }

    /// The kind a type was registered as.
    pub fn kind(&self, type_tag: &str) -> Option<ElementKind> {
        self.elements.get(type_tag).map(|e| e.kind)
    }

    /// Declared defaults for an element type, in declaration order.
    pub fn defaults(&self, type_tag: &str) -> IndexMap<String, AttrValue> {
        let Some(element) = self.elements.get(type_tag) else {
            return IndexMap::new();
        };
        element
            .attrs
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default.clone()))
            .collect()
    }

    /// Parse persisted attribute strings into typed values.
    ///
    /// Undeclared attributes are dropped; missing or malformed values fall
    /// back to the declared default (malformed values are logged).
    pub fn parse_attrs(
        &self,
        type_tag: &str,
        raw: &IndexMap<String, String>,
    ) -> IndexMap<String, AttrValue> {
        let Some(element) = self.elements.get(type_tag) else {
            return IndexMap::new();
        };
        let mut out = IndexMap::new();
        for (name, spec) in &element.attrs {
            let value = match raw.get(name) {
                Some(raw_value) => match spec.codec.parse(raw_value) {
                    Some(parsed) => parsed,
                    None => {
                        tracing::warn!(
                            element = %type_tag,
                            attr = %name,
                            value = %raw_value,
                            "malformed attribute value, using default"
                        );
                        spec.default.clone()
                    }
                },
                None => spec.default.clone(),
            };
            out.insert(name.clone(), value);
        }
        out
    }

    /// Render typed attribute values to persisted strings.
    ///
    /// Undeclared attributes are dropped (closed schema) and null values are
    /// omitted.
    pub fn render_attrs(
        &self,
        type_tag: &str,
        values: &IndexMap<String, AttrValue>,
    ) -> IndexMap<String, String> {
        let Some(element) = self.elements.get(type_tag) else {
            return IndexMap::new();
        };
        let mut out = IndexMap::new();
        for (name, value) in values {
            let Some(spec) = element.attrs.get(name) else {
                continue;
            };
            if let Some(rendered) = spec.codec.render(value) {
                out.insert(name.clone(), rendered);
            }
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
