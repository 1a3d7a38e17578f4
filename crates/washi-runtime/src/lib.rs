//! Runtime seam for Washi.
//!
//! The model crate owns the serializable truth; this crate owns everything
//! around it that breathes: the [`DocumentSession`] driving a single
//! document on one logical task, the [`ExecutionBackend`] and
//! [`DocumentDirectory`] collaborator traits, the [`DocumentEvent`]
//! broadcast views subscribe to, and the node-view bridge
//! ([`NodeView`] / [`ViewRegistry`] / [`ViewHandle`]).
//!
//! # Dispatch model
//!
//! A run request moves the block to `Running` synchronously, then the actual
//! backend call lives in a spawned task. Whatever comes back — a terminal
//! reply, stream chunks, a transport error, or a local timeout — is
//! converted to a signal and applied on the session's thread, where the
//! correlation-id check decides whether it still matters. Out-of-order and
//! duplicate deliveries die there silently.

pub mod backend;
pub mod error;
pub mod events;
pub mod session;
pub mod view;

// Re-export primary types at crate root for convenience.
pub use backend::{DocumentDirectory, ExecutionBackend, TransportError};
pub use error::{Result, RuntimeError};
pub use events::DocumentEvent;
pub use session::{DEFAULT_RUN_TIMEOUT, DocumentSession};
pub use view::{NodeView, ViewCommand, ViewHandle, ViewRegistry};
