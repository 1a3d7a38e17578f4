//! The wiki-link mark.
//!
//! A zero-width inline annotation over a run of text, carrying a [`DocRef`]
//! to another document. The mark itself never resolves anything — existence
//! checks and navigation belong to the document directory collaborator. It
//! only knows how to carry a reference and how to round-trip through the
//! persisted form.
//!
//! Persisted shape: an anchor-like element with the reserved discriminator
//! `data-type="wiki-link"`, the stable `wiki-link` class, and the reference
//! attributes. Elements without the discriminator are never adopted, so
//! unrelated anchors pass through the parser untouched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use washi_types::{DocId, DocRef};

use crate::error::{ModelError, Result};
use crate::persist::{CLASS_ATTR, DATA_TYPE_ATTR, PersistedElement, PersistedNode};
use crate::schema::{AttrSpec, AttrValue, ElementKind, ElementSpec, SchemaRegistry};

/// Discriminator value for persisted wiki links.
pub const WIKI_LINK_TYPE: &str = "wiki-link";

/// Stable styling class emitted on every rendered wiki link.
pub const WIKI_LINK_CLASS: &str = "wiki-link";

/// Persisted attribute carrying the target document id.
pub const DOC_ID_ATTR: &str = "data-doc-id";

/// Persisted attribute carrying the target document title.
pub const DOC_TITLE_ATTR: &str = "data-doc-title";

/// Extra presentational attributes merged into rendered links.
///
/// Reserved keys (the discriminator, the class, and the reference
/// attributes) always win the merge — callers cannot override them, which is
/// what keeps round-trip identity intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WikiLinkConfig {
    pub html_attributes: IndexMap<String, String>,
}

impl WikiLinkConfig {
    /// Builder-style extra attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.html_attributes.insert(name.into(), value.into());
        self
    }
}

/// An inline wiki-link mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WikiLink {
    reference: DocRef,
}

impl WikiLink {
    /// Wrap a reference — resolved or placeholder.
    pub fn new(reference: DocRef) -> Self {
        Self { reference }
    }

    /// An unresolved link, shown while the user is still picking a target.
    pub fn placeholder() -> Self {
        Self::new(DocRef::placeholder())
    }

    /// A resolved link.
    pub fn resolved(doc_id: DocId, doc_title: impl Into<String>) -> Self {
        Self::new(DocRef::resolved(doc_id, doc_title))
    }

    pub fn reference(&self) -> &DocRef {
        &self.reference
    }

    pub fn is_resolved(&self) -> bool {
        self.reference.is_resolved()
    }

    /// Resolve a placeholder (or re-target an existing link) in place.
    pub fn resolve(&mut self, doc_id: DocId, doc_title: impl Into<String>) {
        self.reference.resolve(doc_id, doc_title);
    }

    /// Sync the title after the target document was renamed. Returns whether
    /// anything changed.
    pub fn retitle_if(&mut self, doc_id: DocId, doc_title: &str) -> bool {
        self.reference.retitle_if(doc_id, doc_title)
    }

    /// Schema declaration for this element type.
    pub fn spec() -> ElementSpec {
        ElementSpec::new(WIKI_LINK_TYPE, ElementKind::Mark)
            .attr(AttrSpec::new(DOC_ID_ATTR, AttrValue::Null))
            .attr(AttrSpec::new(DOC_TITLE_ATTR, AttrValue::Null))
    }

    /// The mark's model attributes, for schema-governed rendering.
    pub fn attrs(&self) -> IndexMap<String, AttrValue> {
        let mut out = IndexMap::new();
        out.insert(
            DOC_ID_ATTR.to_string(),
            match self.reference.doc_id() {
                Some(id) => AttrValue::Str(id.to_string()),
                None => AttrValue::Null,
            },
        );
        out.insert(
            DOC_TITLE_ATTR.to_string(),
            match self.reference.doc_title() {
                Some(title) => AttrValue::Str(title.to_string()),
                None => AttrValue::Null,
            },
        );
        out
    }

    /// Rebuild a mark from schema-parsed attributes.
    ///
    /// A half-populated id/title pair or an unparseable id is a validation
    /// error — the element claimed to be a wiki link and lied.
    pub fn from_attrs(attrs: &IndexMap<String, AttrValue>) -> Result<Self> {
        let doc_id = match attrs.get(DOC_ID_ATTR).and_then(AttrValue::as_str) {
            Some(raw) => Some(DocId::parse(raw).map_err(|_| {
                ModelError::Validation(format!("wiki link carries unparseable doc id {raw:?}"))
            })?),
            None => None,
        };
        let doc_title = attrs
            .get(DOC_TITLE_ATTR)
            .and_then(AttrValue::as_str)
            .map(str::to_string);
        let reference = DocRef::from_parts(doc_id, doc_title)
            .map_err(|e| ModelError::Validation(e.to_string()))?;
        Ok(Self::new(reference))
    }

    /// Recognize a persisted element as a wiki link.
    ///
    /// Returns `Ok(None)` when the element lacks the discriminator or the
    /// type isn't registered — unrelated markup is never adopted. Returns a
    /// validation error when a discriminated element carries a malformed
    /// reference.
    pub fn parse_element(
        el: &PersistedElement,
        schema: &SchemaRegistry,
    ) -> Result<Option<Self>> {
        if el.data_type() != Some(WIKI_LINK_TYPE) || !schema.contains(WIKI_LINK_TYPE) {
            return Ok(None);
        }
        let attrs = schema.parse_attrs(WIKI_LINK_TYPE, &el.attrs);
        Self::from_attrs(&attrs).map(Some)
    }

    /// Render to the persisted form, wrapping `text`.
    ///
    /// Caller-supplied attributes from `config` are merged first; the
    /// reserved discriminator, class, and schema-rendered reference
    /// attributes are written afterwards so they always win.
    pub fn render_element(
        &self,
        text: &str,
        config: &WikiLinkConfig,
        schema: &SchemaRegistry,
    ) -> PersistedElement {
        let mut el = PersistedElement::new("a");
        for (name, value) in &config.html_attributes {
            el.attrs.insert(name.clone(), value.clone());
        }
        el.attrs
            .insert(DATA_TYPE_ATTR.to_string(), WIKI_LINK_TYPE.to_string());
        el.attrs
            .insert(CLASS_ATTR.to_string(), WIKI_LINK_CLASS.to_string());
        for (name, value) in schema.render_attrs(WIKI_LINK_TYPE, &self.attrs()) {
            el.attrs.insert(name, value);
        }
        if !text.is_empty() {
            el.children.push(PersistedNode::text(text));
        }
        el
    }
}

// ============================================================================
// Tests
// ============================================================================
