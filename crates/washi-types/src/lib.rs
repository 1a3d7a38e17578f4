//! Shared identifier, reference, and run-lifecycle types for Washi.
//!
//! This crate is the relational foundation: typed IDs, cross-document
//! references, the run state machine, and the wire messages that carry run
//! requests and replies. It has **no internal washi dependencies** — a pure
//! leaf crate that other crates build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Document (DocId)
//!     └── contains Block (BlockId) — paragraph or executable code block
//!
//! Wiki link (inline mark over a paragraph span)
//!     └── carries DocRef — resolved {doc_id, doc_title} or placeholder
//!
//! Code block (BlockId)
//!     └── dispatches Run (RunId = correlation id)
//!         └── RunRequest → backend → RunChunk* → RunReply
//!     └── tracks RunState (idle/running/succeeded/failed)
//!
//! Session (SessionId) ← one editing surface over one document
//! ```
//!
//! # Key Types
//!
//! |---------------|-------------------------------------------------|
//! | Type          | Purpose                                         |
//! |---------------|-------------------------------------------------|
//! | [`DocId`]     | Which document                                  |
//! | [`BlockId`]   | Which block within a document                   |
//! | [`RunId`]     | Which dispatched run (correlation id)           |
//! | [`SessionId`] | Which editing session                           |
//! | [`DocRef`]    | Cross-document reference carried by wiki links  |
//! | [`RunState`]  | Per-block execution lifecycle                   |
//! | [`RunError`]  | Failure taxonomy: execution/transport/timeout   |
//! | [`RunRequest`]| Outbound dispatch message                       |
//! | [`RunReply`]  | Terminal reply, matched by `run_id`             |
//! | [`RunChunk`]  | Streamed output fragment, matched by `run_id`   |
//! |---------------|-------------------------------------------------|

pub mod ids;
pub mod reference;
pub mod run;

// Re-export primary types at crate root for convenience.
pub use ids::{BlockId, DocId, RunId, SessionId};
pub use reference::{DocRef, RefError};
pub use run::{RunChunk, RunError, RunErrorKind, RunOutcome, RunReply, RunRequest, RunState};
