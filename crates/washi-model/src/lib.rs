//! Extensible document model for Washi.
//!
//! The model owns everything serializable: blocks, spans, marks, and the
//! per-block run lifecycle. Views and transports are collaborators that
//! observe it and request mutations through the operations on
//! [`Document`] — nothing else writes attributes, which is what keeps
//! undo/redo, serialization, and collaborative merge working on the model
//! alone.
//!
//! # Extensions
//!
//! Two custom element types ride on the schema registry:
//!
//! - the **wiki-link mark** ([`WikiLink`]): an inline annotation over a run
//!   of text carrying a [`washi_types::DocRef`] to another document, persisted
//!   as an anchor with the `data-type="wiki-link"` discriminator;
//! - the **executable code block** ([`CodeBlock`]): a structural node holding
//!   a language tag, source text, and the idle → running → succeeded/failed
//!   run lifecycle, with replies matched strictly by correlation id.
//!
//! The [`SchemaRegistry`] is the closed attribute schema for both: declared
//! attributes get defaults and codecs; undeclared attributes are dropped on
//! serialization; duplicate declarations are rejected outright.
//!
//! Markup neither extension recognizes passes through parsing and rendering
//! untouched.

pub mod document;
pub mod error;
pub mod mark;
pub mod node;
pub mod persist;
pub mod schema;

// Re-export primary types at crate root for convenience.
pub use document::{Block, BlockNode, Document, Paragraph, RenderOptions, Span};
pub use error::{ModelError, Result};
pub use mark::{
    DOC_ID_ATTR, DOC_TITLE_ATTR, WIKI_LINK_CLASS, WIKI_LINK_TYPE, WikiLink, WikiLinkConfig,
};
pub use node::{
    CODE_BLOCK_TYPE, CodeBlock, CodeBlockConfig, DEFAULT_LANGUAGE, LANGUAGE_ATTR,
};
pub use persist::{CLASS_ATTR, DATA_TYPE_ATTR, PersistedElement, PersistedNode};
pub use schema::{
    AttrCodec, AttrSpec, AttrValue, ElementKind, ElementSpec, SchemaError, SchemaRegistry,
};

#[cfg(test)]
mod tests {
    use super::*;
    use washi_types::{DocId, RunReply, RunState};

    #[test]
    fn test_full_document_lifecycle() {
        let opts = RenderOptions::default();
        let mut doc = Document::new(DocId::new());

        // Author a paragraph with a link and a runnable block
        let para = doc.insert_paragraph(None, "results from the benchmark").unwrap();
        let target = DocId::new();
        doc.apply_link(para, 17..26, WikiLink::resolved(target, "Benchmark"))
            .unwrap();
        let code = doc.insert_code_block(Some(para), "python", "print(1)").unwrap();

        // Run it
        let req = doc.begin_run(code).unwrap();
        assert!(doc.apply_reply(code, &RunReply::success(req.run_id, "1")).unwrap());
        assert_eq!(doc.code(code).unwrap().state(), RunState::Succeeded);

        // Target renamed elsewhere
        assert_eq!(doc.retitle_links(target, "Benchmark (archived)"), 1);

        // Persist and reload: content survives, execution state does not
        let persisted = doc.to_persisted(&opts);
        let reloaded = Document::from_persisted(doc.id(), &persisted, &opts.schema).unwrap();
        let blocks: Vec<&BlockNode> = reloaded.blocks().map(|b| b.node()).collect();

        let p = blocks[0].as_paragraph().unwrap();
        assert_eq!(p.links()[0].1.reference().doc_title(), Some("Benchmark (archived)"));

        let c = blocks[1].as_code().unwrap();
        assert_eq!(c.source(), "print(1)");
        assert_eq!(c.state(), RunState::Idle);
        assert_eq!(c.output(), None);
    }

    #[test]
    fn test_registry_rejects_conflicting_extension() {
        let mut registry = SchemaRegistry::builtin();
        let err = registry.register(WikiLink::spec()).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateElement(WIKI_LINK_TYPE.into()));
    }
}
