//! Typed identifiers for documents, blocks, runs, and sessions.
//!
//! All ID types wrap UUIDv7 (time-ordered, globally unique). They're opaque on
//! the wire and display as standard UUID text for logging. The `short()` form
//! (first 8 hex chars) is for human-facing UI — never used as a lookup key.
//!
//! `RunId` is the correlation id: minted once per run request, echoed back on
//! every reply and stream chunk, and the only thing replies are matched by.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A document identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(uuid::Uuid);

/// A block identifier (UUIDv7) — one per structural element in a document.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(uuid::Uuid);

/// A run correlation identifier (UUIDv7) — one per dispatched execution.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(uuid::Uuid);

/// A session identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters — for human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// The raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Reconstruct from 16 bytes.
            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(b))
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// Prefer a label for display; fall back to short hex.
            pub fn display_or(&self, label: Option<&str>) -> String {
                match label {
                    Some(l) if !l.is_empty() => l.to_string(),
                    _ => self.short(),
                }
            }

            /// A nil / zero ID — for sentinel values only.
            pub fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            /// Check if this is the nil ID.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(DocId, "DocId");
impl_typed_id!(BlockId, "BlockId");
impl_typed_id!(RunId, "RunId");
impl_typed_id!(SessionId, "SessionId");

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ── Basic ID operations ─────────────────────────────────────────────

    #[test]
    fn test_new_is_unique() {
        let a = DocId::new();
        let b = DocId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_is_8_chars() {
        let id = RunId::new();
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_hex_is_32_chars() {
        let id = BlockId::new();
        assert_eq!(id.to_hex().len(), 32);
    }

    #[test]
    fn test_roundtrip_bytes() {
        let id = DocId::new();
        let bytes = *id.as_bytes();
        let id2 = DocId::from_bytes(bytes);
        assert_eq!(id, id2);
    }

    #[test]
    fn test_parse_hex() {
        let id = DocId::new();
        let hex = id.to_hex();
        let parsed = DocId::parse(&hex).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_uuid_format() {
        let id = BlockId::new();
        let uuid_str = id.to_string(); // has hyphens
        let parsed = BlockId::parse(&uuid_str).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RunId::parse("not-a-uuid").is_err());
        assert!(RunId::parse("").is_err());
    }

    #[test]
    fn test_display_or() {
        let id = DocId::new();
        assert_eq!(id.display_or(Some("Roadmap")), "Roadmap");
        assert_eq!(id.display_or(Some("")), id.short());
        assert_eq!(id.display_or(None), id.short());
    }

    #[test]
    fn test_nil() {
        let id = DocId::nil();
        assert!(id.is_nil());
        assert!(!DocId::new().is_nil());
    }

    #[test]
    fn test_ordering_is_time_ordered() {
        let ids: Vec<RunId> = (0..10).map(|_| RunId::new()).collect();
        for i in 1..ids.len() {
            assert!(ids[i] >= ids[i - 1]);
        }
    }

    // ── Serde roundtrips ────────────────────────────────────────────────

    #[test]
    fn test_serde_roundtrip_doc_id() {
        let id = DocId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: DocId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_serde_roundtrip_run_id() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_postcard_roundtrip_block_id() {
        let id = BlockId::new();
        let bytes = postcard::to_stdvec(&id).unwrap();
        let parsed: BlockId = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_postcard_roundtrip_session_id() {
        let id = SessionId::new();
        let bytes = postcard::to_stdvec(&id).unwrap();
        let parsed: SessionId = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(id, parsed);
    }

    // ── Type safety (distinct newtypes) ─────────────────────────────────

    #[test]
    fn test_debug_shows_type_and_short() {
        let bytes = *DocId::new().as_bytes();
        let doc = DocId::from_bytes(bytes);
        let block = BlockId::from_bytes(bytes);
        let run = RunId::from_bytes(bytes);

        assert!(format!("{:?}", doc).starts_with("DocId("));
        assert!(format!("{:?}", block).starts_with("BlockId("));
        assert!(format!("{:?}", run).starts_with("RunId("));
    }

    #[test]
    fn test_display_is_full_uuid_with_hyphens() {
        let id = DocId::new();
        let displayed = id.to_string();
        // Standard UUID format: 8-4-4-4-12
        assert_eq!(displayed.len(), 36);
        assert_eq!(displayed.chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn test_from_uuid_roundtrip() {
        let u = uuid::Uuid::now_v7();
        let id = DocId::from(u);
        let back: uuid::Uuid = id.into();
        assert_eq!(u, back);
    }
}
