//! Node-view renderer bridge.
//!
//! A view is a per-element-type rendering strategy: the host surface queries
//! the [`ViewRegistry`] by type tag, mounts whatever comes back, and drives
//! it through a [`ViewHandle`]. The bridge is purely a presentation adapter —
//! a view holds nothing that isn't derivable from the model, interaction
//! flows back as [`ViewCommand`]s over the write-back channel, and the read
//! channel is the session's event broadcast. Destroying or remounting a
//! handle never alters document content or execution state.

use std::ops::Range;

use indexmap::IndexMap;
use tokio::sync::{broadcast, mpsc};
use washi_model::{BlockNode, Document, WikiLink};
use washi_types::BlockId;

use crate::error::{Result, RuntimeError};
use crate::events::DocumentEvent;

/// A model mutation requested by user interaction inside a view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Run button pressed on a code block.
    RequestRun { block_id: BlockId },
    /// Source edited inline in a code block.
    EditSource { block_id: BlockId, source: String },
    /// Language picker changed on a code block.
    SetLanguage { block_id: BlockId, language: String },
    /// Paragraph text replaced over a range.
    SpliceText {
        block_id: BlockId,
        range: Range<usize>,
        text: String,
    },
    /// Wiki link applied over a paragraph range.
    ApplyLink {
        block_id: BlockId,
        range: Range<usize>,
        link: WikiLink,
    },
    /// Wiki links stripped from a paragraph range.
    RemoveLink {
        block_id: BlockId,
        range: Range<usize>,
    },
    /// Block removed entirely.
    DeleteBlock { block_id: BlockId },
}

/// The per-element-type rendering strategy.
///
/// Implementations re-render from the node's serializable state and nothing
/// else — the model never learns who renders it.
pub trait NodeView {
    /// Re-render from the node's current state.
    fn update(&mut self, node: &BlockNode);

    /// Called when the view is unmounted. Must not touch the model.
    fn unmount(&mut self) {}
}

type ViewFactory = Box<dyn Fn() -> Box<dyn NodeView> + Send + Sync>;

/// Registry of view factories, keyed by element type tag.
#[derive(Default)]
pub struct ViewRegistry {
    factories: IndexMap<String, ViewFactory>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for an element type. Duplicate registration is
    /// rejected — one strategy per type.
    pub fn register(
        &mut self,
        type_tag: impl Into<String>,
        factory: impl Fn() -> Box<dyn NodeView> + Send + Sync + 'static,
    ) -> Result<()> {
        let type_tag = type_tag.into();
        if self.factories.contains_key(&type_tag) {
            return Err(RuntimeError::DuplicateView(type_tag));
        }
        self.factories.insert(type_tag, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.factories.contains_key(type_tag)
    }

    /// Instantiate a fresh view for an element type.
    pub fn mount(&self, type_tag: &str) -> Option<Box<dyn NodeView>> {
        self.factories.get(type_tag).map(|factory| factory())
    }
}

impl std::fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A mounted view plus its two channels: commands out, events in.
pub struct ViewHandle {
    block_id: BlockId,
    view: Box<dyn NodeView>,
    commands: mpsc::UnboundedSender<ViewCommand>,
    events: broadcast::Receiver<DocumentEvent>,
}

impl ViewHandle {
    pub(crate) fn new(
        block_id: BlockId,
        view: Box<dyn NodeView>,
        commands: mpsc::UnboundedSender<ViewCommand>,
        events: broadcast::Receiver<DocumentEvent>,
    ) -> Self {
        Self {
            block_id,
            view,
            commands,
            events,
        }
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// Request a model mutation over the write-back channel. Returns false
    /// if the session is gone.
    pub fn send(&self, command: ViewCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Drain pending events and re-render if any touched this block.
    ///
    /// Returns whether the view re-rendered. A lagged receiver re-renders
    /// unconditionally — missing an event costs a repaint, never state.
    /// Returns false once the block no longer exists; the host should
    /// unmount then.
    pub fn refresh(&mut self, document: &Document) -> bool {
        let mut dirty = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if event.block_id().is_none_or(|id| id == self.block_id) {
                        dirty = true;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => dirty = true,
                Err(_) => break,
            }
        }
        if !dirty {
            return false;
        }
        match document.block(self.block_id) {
            Some(node) => {
                self.view.update(node);
                true
            }
            None => false,
        }
    }
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        self.view.unmount();
    }
}

impl std::fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHandle")
            .field("block_id", &self.block_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct NullView;

    impl NodeView for NullView {
        fn update(&mut self, _node: &BlockNode) {}
    }

    #[test]
    fn test_register_and_mount() {
        let mut registry = ViewRegistry::new();
        registry
            .register("code-block", || Box::new(NullView))
            .unwrap();
        assert!(registry.contains("code-block"));
        assert!(registry.mount("code-block").is_some());
        assert!(registry.mount("paragraph").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ViewRegistry::new();
        registry.register("paragraph", || Box::new(NullView)).unwrap();
        let err = registry
            .register("paragraph", || Box::new(NullView))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateView(tag) if tag == "paragraph"));
    }

    #[test]
    fn test_each_mount_instantiates_fresh() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut registry = ViewRegistry::new();
        registry
            .register("paragraph", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(NullView)
            })
            .unwrap();

        let _a = registry.mount("paragraph").unwrap();
        let _b = registry.mount("paragraph").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }
}
