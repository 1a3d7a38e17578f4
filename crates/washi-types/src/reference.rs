//! Cross-document references.
//!
//! A [`DocRef`] is what a wiki-link mark carries: which document it points at
//! and the display title it was resolved with. The two fields travel together —
//! either both populated (resolved) or both absent (placeholder, shown in the
//! UI as an unresolved link while the user is still picking a target).

use serde::{Deserialize, Serialize};

use crate::ids::DocId;

/// Error from constructing or deserializing an inconsistent reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefError {
    /// One of id/title was populated without the other.
    #[error("doc id and doc title must be populated together")]
    MismatchedPair,
}

/// A reference to another document: either resolved (id + title) or a
/// placeholder (neither).
///
/// The pairing invariant is enforced by construction — fields are private and
/// deserialization goes through [`DocRef::from_parts`]. Title staleness is
/// tolerated: if the target is renamed and no rename notification arrives,
/// the reference simply keeps the old title.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RefParts", into = "RefParts")]
pub struct DocRef {
    doc_id: Option<DocId>,
    doc_title: Option<String>,
}

/// Raw serialized shape of a [`DocRef`], before invariant checking.
#[derive(Clone, Serialize, Deserialize)]
struct RefParts {
    #[serde(default)]
    doc_id: Option<DocId>,
    #[serde(default)]
    doc_title: Option<String>,
}

impl TryFrom<RefParts> for DocRef {
    type Error = RefError;

    fn try_from(parts: RefParts) -> Result<Self, RefError> {
        DocRef::from_parts(parts.doc_id, parts.doc_title)
    }
}

impl From<DocRef> for RefParts {
    fn from(r: DocRef) -> Self {
        Self {
            doc_id: r.doc_id,
            doc_title: r.doc_title,
        }
    }
}

impl DocRef {
    /// A resolved reference to a known document.
    pub fn resolved(doc_id: DocId, doc_title: impl Into<String>) -> Self {
        Self {
            doc_id: Some(doc_id),
            doc_title: Some(doc_title.into()),
        }
    }

    /// An unresolved placeholder — the user hasn't picked a target yet.
    pub fn placeholder() -> Self {
        Self {
            doc_id: None,
            doc_title: None,
        }
    }

    /// Build from optional parts, rejecting a half-populated pair.
    pub fn from_parts(
        doc_id: Option<DocId>,
        doc_title: Option<String>,
    ) -> Result<Self, RefError> {
        match (doc_id, doc_title) {
            (Some(id), Some(title)) => Ok(Self::resolved(id, title)),
            (None, None) => Ok(Self::placeholder()),
            _ => Err(RefError::MismatchedPair),
        }
    }

    /// The target document, if resolved.
    pub fn doc_id(&self) -> Option<DocId> {
        self.doc_id
    }

    /// The display title, if resolved.
    pub fn doc_title(&self) -> Option<&str> {
        self.doc_title.as_deref()
    }

    /// Whether this reference points at a known document.
    pub fn is_resolved(&self) -> bool {
        self.doc_id.is_some()
    }

    /// Whether this is an unresolved placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.doc_id.is_none()
    }

    /// Resolve a placeholder (or re-target a resolved reference).
    pub fn resolve(&mut self, doc_id: DocId, doc_title: impl Into<String>) {
        self.doc_id = Some(doc_id);
        self.doc_title = Some(doc_title.into());
    }

    /// Update the title if this reference targets `doc_id`.
    ///
    /// Used when a rename notification arrives for the target document.
    /// Returns whether anything changed.
    pub fn retitle_if(&mut self, doc_id: DocId, doc_title: &str) -> bool {
        if self.doc_id != Some(doc_id) {
            return false;
        }
        if self.doc_title.as_deref() == Some(doc_title) {
            return false;
        }
        self.doc_title = Some(doc_title.to_string());
        true
    }

    /// Display string: the title if resolved, a fixed placeholder otherwise.
    pub fn display_name(&self) -> &str {
        self.doc_title.as_deref().unwrap_or("(unresolved)")
    }
}

impl std::fmt::Debug for DocRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.doc_id, &self.doc_title) {
            (Some(id), Some(title)) => write!(f, "DocRef({} -> {:?})", id.short(), title),
            _ => write!(f, "DocRef(placeholder)"),
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
    fn test_resolved() {
        let id = DocId::new();
        let r = DocRef::resolved(id, "Roadmap");
        assert!(r.is_resolved());
        assert!(!r.is_placeholder());
        assert_eq!(r.doc_id(), Some(id));
        assert_eq!(r.doc_title(), Some("Roadmap"));
        assert_eq!(r.display_name(), "Roadmap");
    }

    #[test]
    fn test_placeholder() {
        let r = DocRef::placeholder();
        assert!(r.is_placeholder());
        assert_eq!(r.doc_id(), None);
        assert_eq!(r.doc_title(), None);
        assert_eq!(r.display_name(), "(unresolved)");
    }

    #[test]
    fn test_from_parts_rejects_half_pairs() {
        let id = DocId::new();
        assert_eq!(
            DocRef::from_parts(Some(id), None),
            Err(RefError::MismatchedPair)
        );
        assert_eq!(
            DocRef::from_parts(None, Some("Roadmap".into())),
            Err(RefError::MismatchedPair)
        );
    }

    #[test]
    fn test_from_parts_accepts_full_and_empty() {
        let id = DocId::new();
        assert!(DocRef::from_parts(Some(id), Some("Roadmap".into())).is_ok());
        assert!(DocRef::from_parts(None, None).is_ok());
    }

    #[test]
    fn test_resolve_placeholder() {
        let id = DocId::new();
        let mut r = DocRef::placeholder();
        r.resolve(id, "Roadmap");
        assert!(r.is_resolved());
        assert_eq!(r.doc_id(), Some(id));
        assert_eq!(r.doc_title(), Some("Roadmap"));
    }

    #[test]
    fn test_retitle_if_matching_target() {
        let id = DocId::new();
        let mut r = DocRef::resolved(id, "Roadmap");
        assert!(r.retitle_if(id, "Roadmap 2026"));
        assert_eq!(r.doc_title(), Some("Roadmap 2026"));
    }

    #[test]
    fn test_retitle_if_ignores_other_targets() {
        let id = DocId::new();
        let mut r = DocRef::resolved(id, "Roadmap");
        assert!(!r.retitle_if(DocId::new(), "Elsewhere"));
        assert_eq!(r.doc_title(), Some("Roadmap"));
    }

    #[test]
    fn test_retitle_if_same_title_is_noop() {
        let id = DocId::new();
        let mut r = DocRef::resolved(id, "Roadmap");
        assert!(!r.retitle_if(id, "Roadmap"));
    }

    #[test]
    fn test_retitle_if_skips_placeholder() {
        let mut r = DocRef::placeholder();
        assert!(!r.retitle_if(DocId::new(), "Roadmap"));
        assert!(r.is_placeholder());
    }

    // ── Serde ───────────────────────────────────────────────────────────

    #[test]
    fn test_json_roundtrip_resolved() {
        let r = DocRef::resolved(DocId::new(), "Roadmap");
        let json = serde_json::to_string(&r).unwrap();
        let parsed: DocRef = serde_json::from_str(&json).unwrap();
        assert_eq!(r, parsed);
    }

    #[test]
    fn test_json_roundtrip_placeholder() {
        let r = DocRef::placeholder();
        let json = serde_json::to_string(&r).unwrap();
        let parsed: DocRef = serde_json::from_str(&json).unwrap();
        assert_eq!(r, parsed);
    }

    #[test]
    fn test_json_rejects_half_pair() {
        let json = format!(r#"{{"doc_id":"{}","doc_title":null}}"#, DocId::new());
        let result: Result<DocRef, _> = serde_json::from_str(&json);
        assert!(result.is_err());
    }

    #[test]
    fn test_postcard_roundtrip() {
        let r = DocRef::resolved(DocId::new(), "Roadmap");
        let bytes = postcard::to_stdvec(&r).unwrap();
        let parsed: DocRef = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(r, parsed);
    }

    #[test]
    fn test_debug_redacts_nothing_useful() {
        let id = DocId::new();
        let r = DocRef::resolved(id, "Roadmap");
        let debug = format!("{:?}", r);
        assert!(debug.contains("Roadmap"));
        assert!(debug.contains(&id.short()));
        assert_eq!(format!("{:?}", DocRef::placeholder()), "DocRef(placeholder)");
    }
}
