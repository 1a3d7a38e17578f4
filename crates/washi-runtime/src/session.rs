//! The document session.
//!
//! One session owns one [`Document`] and is the only writer to it — a
//! single-threaded cooperative surface. Views send [`ViewCommand`]s over the
//! write-back channel; backend replies and stream chunks come home as
//! internal signals; the session applies both as model operations and
//! broadcasts [`DocumentEvent`]s for any number of observers.
//!
//! Suspension happens only at the boundary of outbound backend calls: a
//! dispatched run lives in a spawned task, so the session stays responsive
//! while the block is `Running`. The local run timeout synthesizes a terminal
//! failure for the same correlation id; any reply arriving after that is
//! dropped by the ordinary stale rule. No cancellation signal is sent to the
//! backend — invalidation is purely local.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use washi_model::{Document, WikiLink};
use washi_types::{
    BlockId, DocId, DocRef, RunChunk, RunError, RunId, RunReply, RunRequest, RunState,
};

use crate::backend::{DocumentDirectory, ExecutionBackend};
use crate::error::{Result, RuntimeError};
use crate::events::DocumentEvent;
use crate::view::{NodeView, ViewCommand, ViewHandle, ViewRegistry};

/// Default wait before a run is locally failed with a timeout error.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Event broadcast capacity. A lagged receiver loses events, not integrity.
const EVENT_CAPACITY: usize = 256;

/// A run signal coming home from a dispatch task.
#[derive(Debug)]
enum RunSignal {
    Chunk { block_id: BlockId, chunk: RunChunk },
    Reply { block_id: BlockId, reply: RunReply },
}

/// Owns a document and drives its runtime concerns.
pub struct DocumentSession {
    document: Document,
    backend: Arc<dyn ExecutionBackend>,
    directory: Option<Arc<dyn DocumentDirectory>>,
    views: ViewRegistry,
    events: broadcast::Sender<DocumentEvent>,
    commands_tx: mpsc::UnboundedSender<ViewCommand>,
    commands_rx: mpsc::UnboundedReceiver<ViewCommand>,
    signals_tx: mpsc::UnboundedSender<RunSignal>,
    signals_rx: mpsc::UnboundedReceiver<RunSignal>,
    run_timeout: Duration,
}

impl DocumentSession {
    /// Create a session over a document with an execution backend.
    pub fn new(document: Document, backend: Arc<dyn ExecutionBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            document,
            backend,
            directory: None,
            views: ViewRegistry::new(),
            events,
            commands_tx,
            commands_rx,
            signals_tx,
            signals_rx,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    /// Attach a document directory for wiki-link lookup.
    pub fn with_directory(mut self, directory: Arc<dyn DocumentDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Override the local run timeout.
    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// The document. Read-only — mutation goes through session operations.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Subscribe to document events (a view's read channel).
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.events.subscribe()
    }

    /// A write-back sender for views created outside [`Self::mount`].
    pub fn command_sender(&self) -> mpsc::UnboundedSender<ViewCommand> {
        self.commands_tx.clone()
    }

    fn emit(&self, event: DocumentEvent) {
        // Nobody subscribed is fine
        let _ = self.events.send(event);
    }

    // ── Model operations ────────────────────────────────────────────────

    /// Insert a paragraph after `after` (or at the end).
    pub fn insert_paragraph(
        &mut self,
        after: Option<BlockId>,
        text: impl Into<String>,
    ) -> Result<BlockId> {
        let block_id = self.document.insert_paragraph(after, text)?;
        self.emit(DocumentEvent::BlockInserted { block_id });
        Ok(block_id)
    }

    /// Insert a code block after `after` (or at the end).
    pub fn insert_code_block(
        &mut self,
        after: Option<BlockId>,
        language: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<BlockId> {
        let block_id = self.document.insert_code_block(after, language, source)?;
        self.emit(DocumentEvent::BlockInserted { block_id });
        Ok(block_id)
    }

    /// Delete a block.
    pub fn delete_block(&mut self, block_id: BlockId) -> Result<()> {
        self.document.delete_block(block_id)?;
        self.emit(DocumentEvent::BlockDeleted { block_id });
        Ok(())
    }

    /// Replace paragraph text over a range.
    pub fn splice_text(
        &mut self,
        block_id: BlockId,
        range: Range<usize>,
        text: &str,
    ) -> Result<()> {
        self.document.splice_text(block_id, range, text)?;
        self.emit(DocumentEvent::TextEdited { block_id });
        Ok(())
    }

    /// Apply a wiki link over a paragraph range, replacing any overlapped
    /// link.
    pub fn apply_link(
        &mut self,
        block_id: BlockId,
        range: Range<usize>,
        link: WikiLink,
    ) -> Result<()> {
        self.document.apply_link(block_id, range, link)?;
        self.emit(DocumentEvent::LinkApplied { block_id });
        Ok(())
    }

    /// Strip wiki links from a paragraph range.
    pub fn remove_link(&mut self, block_id: BlockId, range: Range<usize>) -> Result<()> {
        self.document.remove_link(block_id, range)?;
        self.emit(DocumentEvent::LinkRemoved { block_id });
        Ok(())
    }

    /// Replace a code block's source.
    pub fn edit_source(&mut self, block_id: BlockId, source: impl Into<String>) -> Result<()> {
        self.document.edit_source(block_id, source)?;
        self.emit(DocumentEvent::SourceEdited { block_id });
        Ok(())
    }

    /// Change a code block's language tag.
    pub fn set_language(&mut self, block_id: BlockId, language: impl Into<String>) -> Result<()> {
        self.document.set_language(block_id, language)?;
        self.emit(DocumentEvent::SourceEdited { block_id });
        Ok(())
    }

    /// Handle a rename notification from the document store: retitle every
    /// resolved link targeting `doc_id`. Returns how many were updated.
    pub fn handle_rename(&mut self, doc_id: DocId, title: &str) -> usize {
        let updated = self.document.retitle_links(doc_id, title);
        if updated > 0 {
            self.emit(DocumentEvent::LinksRetitled { doc_id, updated });
        }
        updated
    }

    // ── Run dispatch ────────────────────────────────────────────────────

    /// Start a run on a code block and dispatch it to the backend.
    ///
    /// Rejected without a state change when the source is empty or a run is
    /// already in flight. Must be called within a tokio runtime.
    pub fn request_run(&mut self, block_id: BlockId) -> Result<RunId> {
        let request = self.document.begin_run(block_id)?;
        let run_id = request.run_id;
        self.emit(DocumentEvent::RunStateChanged {
            block_id,
            run_id,
            state: RunState::Running,
        });
        self.spawn_dispatch(block_id, request);
        Ok(run_id)
    }

    fn spawn_dispatch(&self, block_id: BlockId, request: RunRequest) {
        let backend = Arc::clone(&self.backend);
        let signals = self.signals_tx.clone();
        let run_timeout = self.run_timeout;
        let run_id = request.run_id;

        tokio::spawn(async move {
            let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<RunChunk>();
            let chunk_signals = signals.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(chunk) = chunk_rx.recv().await {
                    let _ = chunk_signals.send(RunSignal::Chunk { block_id, chunk });
                }
            });

            let reply =
                match tokio::time::timeout(run_timeout, backend.run_streaming(request, chunk_tx))
                    .await
                {
                    Ok(Ok(reply)) => reply,
                    Ok(Err(err)) => RunReply::failure(run_id, RunError::transport(err.to_string())),
                    Err(_) => RunReply::failure(run_id, RunError::timeout(run_timeout)),
                };

            // The chunk sender is gone by now (completed or dropped with the
            // timed-out future), so this preserves chunk-before-reply order.
            let _ = forwarder.await;
            let _ = signals.send(RunSignal::Reply { block_id, reply });
        });
    }

    fn handle_signal(&mut self, signal: RunSignal) {
        match signal {
            RunSignal::Chunk { block_id, chunk } => {
                let run_id = chunk.run_id;
                match self.document.apply_chunk(block_id, &chunk) {
                    Ok(true) => self.emit(DocumentEvent::OutputChunk {
                        block_id,
                        run_id,
                        text: chunk.text,
                    }),
                    Ok(false) => {} // stale, dropped
                    Err(err) => tracing::warn!(%err, "dropping run chunk"),
                }
            }
            RunSignal::Reply { block_id, reply } => {
                let run_id = reply.run_id;
                match self.document.apply_reply(block_id, &reply) {
                    Ok(true) => {
                        let state = self
                            .document
                            .code(block_id)
                            .map(|c| c.state())
                            .unwrap_or(RunState::Idle);
                        self.emit(DocumentEvent::RunStateChanged {
                            block_id,
                            run_id,
                            state,
                        });
                    }
                    Ok(false) => {} // stale, dropped
                    Err(err) => tracing::warn!(%err, "dropping run reply"),
                }
            }
        }
    }

    /// Apply one view command as a model operation.
    pub fn handle_command(&mut self, command: ViewCommand) -> Result<()> {
        match command {
            ViewCommand::RequestRun { block_id } => {
                self.request_run(block_id)?;
            }
            ViewCommand::EditSource { block_id, source } => {
                self.edit_source(block_id, source)?;
            }
            ViewCommand::SetLanguage { block_id, language } => {
                self.set_language(block_id, language)?;
            }
            ViewCommand::SpliceText {
                block_id,
                range,
                text,
            } => {
                self.splice_text(block_id, range, &text)?;
            }
            ViewCommand::ApplyLink {
                block_id,
                range,
                link,
            } => {
                self.apply_link(block_id, range, link)?;
            }
            ViewCommand::RemoveLink { block_id, range } => {
                self.remove_link(block_id, range)?;
            }
            ViewCommand::DeleteBlock { block_id } => {
                self.delete_block(block_id)?;
            }
        }
        Ok(())
    }

    /// Drain everything immediately available: pending run signals first,
    /// then queued view commands. Returns how many were handled.
    ///
    /// Rejected commands are logged and dropped — a view asking for the
    /// impossible surfaces an inline hint, it never poisons the session.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.signals_rx.try_recv() {
            self.handle_signal(signal);
            handled += 1;
        }
        while let Ok(command) = self.commands_rx.try_recv() {
            if let Err(err) = self.handle_command(command) {
                tracing::warn!(%err, "view command rejected");
            }
            handled += 1;
        }
        handled
    }

    /// Wait for and apply the next run signal (stream chunk or terminal
    /// reply).
    pub async fn process_next_signal(&mut self) -> bool {
        match self.signals_rx.recv().await {
            Some(signal) => {
                self.handle_signal(signal);
                true
            }
            None => false,
        }
    }

    // ── Document lookup ─────────────────────────────────────────────────

    /// Resolve a free-text query to candidate documents for the wiki-link
    /// picker. Without a directory attached there are no candidates.
    pub async fn search_directory(&self, query: &str) -> Result<Vec<DocRef>> {
        match &self.directory {
            Some(directory) => Ok(directory.search(query).await?),
            None => Ok(Vec::new()),
        }
    }

    // ── View bridge ─────────────────────────────────────────────────────

    /// Register a view factory for an element type.
    pub fn register_view(
        &mut self,
        type_tag: impl Into<String>,
        factory: impl Fn() -> Box<dyn NodeView> + Send + Sync + 'static,
    ) -> Result<()> {
        self.views.register(type_tag, factory)
    }

    /// Mount a view over a block: instantiate the strategy for the block's
    /// element type, render once from current state, and hand back the
    /// channels.
    pub fn mount(&self, block_id: BlockId) -> Result<ViewHandle> {
        let node = self
            .document
            .block(block_id)
            .ok_or(washi_model::ModelError::BlockNotFound(block_id))
            .map_err(RuntimeError::from)?;
        let mut view = self
            .views
            .mount(node.type_tag())
            .ok_or_else(|| RuntimeError::UnknownView(node.type_tag().to_string()))?;
        view.update(node);
        Ok(ViewHandle::new(
            block_id,
            view,
            self.commands_tx.clone(),
            self.events.subscribe(),
        ))
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("document", &self.document.id())
            .field("blocks", &self.document.block_count())
            .field("run_timeout", &self.run_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
