//! External collaborator traits.
//!
//! Execution and document lookup live behind these seams. The session treats
//! both as unordered and at-least-once: replies and chunks are matched to
//! requests by correlation id only, never by arrival order, so an
//! implementation is free to ride on an HTTP API, a websocket, or anything
//! else that can echo a [`RunId`](washi_types::RunId) back.

use async_trait::async_trait;
use tokio::sync::mpsc;
use washi_types::{DocRef, RunChunk, RunReply, RunRequest};

/// The request never reached the backend (network/backend unavailable).
///
/// Distinct from an execution failure carried inside a successful reply —
/// "we couldn't run your code" vs "your code failed".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Executes code block sources on behalf of the document.
///
/// One call per dispatched run. The reply must echo the request's `run_id`;
/// the session discards anything else as stale.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Execute one request and resolve with its terminal reply.
    async fn run(&self, request: RunRequest) -> Result<RunReply, TransportError>;

    /// Streaming form: push incremental chunks while executing, then return
    /// the terminal reply. Chunks must echo the request's `run_id`.
    ///
    /// The default implementation does not stream.
    async fn run_streaming(
        &self,
        request: RunRequest,
        chunks: mpsc::UnboundedSender<RunChunk>,
    ) -> Result<RunReply, TransportError> {
        drop(chunks);
        self.run(request).await
    }
}

/// Resolves free-text queries to candidate documents for the wiki-link UI.
#[async_trait]
pub trait DocumentDirectory: Send + Sync {
    /// Look up documents matching `query`. Zero or more candidates.
    async fn search(&self, query: &str) -> Result<Vec<DocRef>, TransportError>;
}
