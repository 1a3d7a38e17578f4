//! Events pushed from the session to subscribed views.
//!
//! These are the typed notifications a view's read channel receives when the
//! model's attributes change underneath it — whether from local commands or
//! from a collaborator's reply arriving. Subscribe via
//! [`DocumentSession::subscribe`](crate::session::DocumentSession::subscribe).

use washi_types::{BlockId, DocId, RunId, RunState};

/// One observable change to the document.
#[derive(Clone, Debug)]
pub enum DocumentEvent {
    /// A new block was inserted.
    BlockInserted { block_id: BlockId },
    /// A block was deleted.
    BlockDeleted { block_id: BlockId },
    /// Paragraph text changed.
    TextEdited { block_id: BlockId },
    /// A code block's source or language changed.
    SourceEdited { block_id: BlockId },
    /// A wiki link was applied over a paragraph range.
    LinkApplied { block_id: BlockId },
    /// Wiki links were stripped from a paragraph range.
    LinkRemoved { block_id: BlockId },
    /// A rename notification retitled links across the document.
    LinksRetitled { doc_id: DocId, updated: usize },
    /// A code block's run lifecycle moved (Running, Succeeded, Failed).
    RunStateChanged {
        block_id: BlockId,
        run_id: RunId,
        state: RunState,
    },
    /// A stream chunk was accepted for the in-flight run.
    OutputChunk {
        block_id: BlockId,
        run_id: RunId,
        text: String,
    },
}

impl DocumentEvent {
    /// The block this event is scoped to, or `None` for document-wide
    /// events.
    pub fn block_id(&self) -> Option<BlockId> {
        match self {
            DocumentEvent::BlockInserted { block_id }
            | DocumentEvent::BlockDeleted { block_id }
            | DocumentEvent::TextEdited { block_id }
            | DocumentEvent::SourceEdited { block_id }
            | DocumentEvent::LinkApplied { block_id }
            | DocumentEvent::LinkRemoved { block_id }
            | DocumentEvent::RunStateChanged { block_id, .. }
            | DocumentEvent::OutputChunk { block_id, .. } => Some(*block_id),
            DocumentEvent::LinksRetitled { .. } => None,
        }
    }
}
