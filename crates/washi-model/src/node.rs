//! The executable code block node.
//!
//! Holds source text, a language tag, and the run lifecycle. The block never
//! executes anything — `begin_run` mints a correlation id and hands back the
//! outbound request; whoever dispatches it feeds the terminal reply (and any
//! stream chunks) back in, and matching is done strictly by that id. Replies
//! for a superseded id are discarded, which is the entire defense against an
//! unordered, at-least-once transport.
//!
//! Editing `source` or `language` is legal in every state and never touches
//! the run lifecycle.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use washi_types::{RunChunk, RunError, RunId, RunOutcome, RunReply, RunRequest, RunState};

use crate::error::{ModelError, Result};
use crate::persist::{DATA_TYPE_ATTR, PersistedElement, PersistedNode};
use crate::schema::{AttrSpec, AttrValue, ElementKind, ElementSpec, SchemaRegistry};

/// Discriminator value for persisted code blocks.
pub const CODE_BLOCK_TYPE: &str = "code-block";

/// Persisted attribute carrying the language tag.
pub const LANGUAGE_ATTR: &str = "data-language";

/// Language applied when none is given.
pub const DEFAULT_LANGUAGE: &str = "plaintext";

/// Extra presentational attributes merged into rendered code blocks.
///
/// Reserved keys (the discriminator and the language attribute) always win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBlockConfig {
    pub html_attributes: IndexMap<String, String>,
}

impl CodeBlockConfig {
    /// Builder-style extra attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.html_attributes.insert(name.into(), value.into());
        self
    }
}

/// An executable code block.
///
/// Field access goes through methods so the run-lifecycle invariants hold at
/// every observation point: `output()` is populated only in `Succeeded`,
/// `error()` only in `Failed`, and a retained result from a superseded run is
/// visible only through the `stale_*` accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    language: String,
    source: String,
    state: RunState,
    output: Option<String>,
    error: Option<RunError>,
    last_run_id: Option<RunId>,
    /// Accumulated stream chunks for the in-flight run. Transient.
    #[serde(default, skip)]
    streamed: String,
}

impl CodeBlock {
    /// Create an idle block. An empty language falls back to
    /// [`DEFAULT_LANGUAGE`].
    pub fn new(language: impl Into<String>, source: impl Into<String>) -> Self {
        let language = language.into();
        Self {
            language: if language.is_empty() {
                DEFAULT_LANGUAGE.to_string()
            } else {
                language
            },
            source: source.into(),
            state: RunState::Idle,
            output: None,
            error: None,
            last_run_id: None,
            streamed: String::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Correlation id of the most recent dispatch.
    pub fn last_run_id(&self) -> Option<RunId> {
        self.last_run_id
    }

    /// Output of the last run — populated only while `Succeeded`.
    pub fn output(&self) -> Option<&str> {
        match self.state {
            RunState::Succeeded => self.output.as_deref(),
            _ => None,
        }
    }

    /// Error of the last run — populated only while `Failed`.
    pub fn error(&self) -> Option<&RunError> {
        match self.state {
            RunState::Failed => self.error.as_ref(),
            _ => None,
        }
    }

    /// Output retained from a superseded run, for rendering as stale while
    /// a new run is in flight.
    pub fn stale_output(&self) -> Option<&str> {
        match self.state {
            RunState::Succeeded => None,
            _ => self.output.as_deref(),
        }
    }

    /// Error retained from a superseded run.
    pub fn stale_error(&self) -> Option<&RunError> {
        match self.state {
            RunState::Failed => None,
            _ => self.error.as_ref(),
        }
    }

    /// Stream chunks accumulated for the current run.
    pub fn streamed(&self) -> &str {
        &self.streamed
    }

    // ── Editing ─────────────────────────────────────────────────────────

    /// Change the language tag. Legal in any state.
    pub fn set_language(&mut self, language: impl Into<String>) {
        let language = language.into();
        self.language = if language.is_empty() {
            DEFAULT_LANGUAGE.to_string()
        } else {
            language
        };
    }

    /// Replace the source text. Legal in any state; an in-flight run keeps
    /// executing the source it was dispatched with.
    pub fn edit_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    // ── Run lifecycle ───────────────────────────────────────────────────

    /// Start a run: mint a fresh correlation id, move to `Running`, and
    /// return the outbound request.
    ///
    /// Rejected without a state change when the source is empty
    /// (whitespace-only counts) or a run is already in flight.
    pub fn begin_run(&mut self) -> Result<RunRequest> {
        if self.state.is_active() {
            return Err(ModelError::RunInProgress);
        }
        if self.source.trim().is_empty() {
            return Err(ModelError::EmptySource);
        }
        let run_id = RunId::new();
        self.last_run_id = Some(run_id);
        self.state = RunState::Running;
        self.streamed.clear();
        debug_assert!(self.consistent());
        Ok(RunRequest {
            run_id,
            language: self.language.clone(),
            source: self.source.clone(),
        })
    }

    /// Apply a terminal reply. Returns whether it was accepted.
    ///
    /// A reply is accepted only while `Running` and only when its
    /// correlation id matches the current one; anything else is a stale or
    /// duplicate delivery and is dropped without touching state.
    pub fn apply_reply(&mut self, reply: &RunReply) -> bool {
        if !self.state.is_active() || self.last_run_id != Some(reply.run_id) {
            tracing::debug!(
                run_id = %reply.run_id,
                current = ?self.last_run_id,
                state = %self.state,
                "discarding stale run reply"
            );
            return false;
        }
        match &reply.outcome {
            RunOutcome::Success { output } => {
                self.state = RunState::Succeeded;
                self.output = Some(output.clone());
                self.error = None;
            }
            RunOutcome::Error { error } => {
                self.state = RunState::Failed;
                self.error = Some(error.clone());
                self.output = None;
            }
        }
        debug_assert!(self.consistent());
        true
    }

    /// Append a stream chunk for the current run. Returns whether it was
    /// accepted; stale chunks are dropped by the same rule as replies.
    pub fn apply_chunk(&mut self, chunk: &RunChunk) -> bool {
        if !self.state.is_active() || self.last_run_id != Some(chunk.run_id) {
            tracing::debug!(run_id = %chunk.run_id, "discarding stale run chunk");
            return false;
        }
        self.streamed.push_str(&chunk.text);
        true
    }

    /// Lifecycle invariants, asserted after every transition.
    fn consistent(&self) -> bool {
        match self.state {
            RunState::Idle => true,
            RunState::Running => self.last_run_id.is_some(),
            RunState::Succeeded => self.output.is_some() && self.error.is_none(),
            RunState::Failed => self.error.is_some() && self.output.is_none(),
        }
    }

    // ── Persisted form ──────────────────────────────────────────────────

    /// Schema declaration for this element type.
    pub fn spec() -> ElementSpec {
        ElementSpec::new(CODE_BLOCK_TYPE, ElementKind::Node).attr(AttrSpec::new(
            LANGUAGE_ATTR,
            AttrValue::Str(DEFAULT_LANGUAGE.to_string()),
        ))
    }

    /// The node's model attributes, for schema-governed rendering.
    pub fn attrs(&self) -> IndexMap<String, AttrValue> {
        let mut out = IndexMap::new();
        out.insert(
            LANGUAGE_ATTR.to_string(),
            AttrValue::Str(self.language.clone()),
        );
        out
    }

    /// Recognize a persisted element as a code block.
    ///
    /// Execution state never persists — a parsed block is always idle.
    pub fn parse_element(
        el: &PersistedElement,
        schema: &SchemaRegistry,
    ) -> Result<Option<Self>> {
        if el.data_type() != Some(CODE_BLOCK_TYPE) || !schema.contains(CODE_BLOCK_TYPE) {
            return Ok(None);
        }
        let attrs = schema.parse_attrs(CODE_BLOCK_TYPE, &el.attrs);
        let language = attrs
            .get(LANGUAGE_ATTR)
            .and_then(AttrValue::as_str)
            .unwrap_or(DEFAULT_LANGUAGE);
        Ok(Some(Self::new(language, el.text_content())))
    }

    /// Render to the persisted form: a `pre` element carrying the
    /// discriminator, the language, and the source as its text content.
    pub fn render_element(
        &self,
        config: &CodeBlockConfig,
        schema: &SchemaRegistry,
    ) -> PersistedElement {
        let mut el = PersistedElement::new("pre");
        for (name, value) in &config.html_attributes {
            el.attrs.insert(name.clone(), value.clone());
        }
        el.attrs
            .insert(DATA_TYPE_ATTR.to_string(), CODE_BLOCK_TYPE.to_string());
        for (name, value) in schema.render_attrs(CODE_BLOCK_TYPE, &self.attrs()) {
            el.attrs.insert(name, value);
        }
        if !self.source.is_empty() {
            el.children.push(PersistedNode::text(self.source.clone()));
        }
        el
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use washi_types::RunErrorKind;

    fn schema() -> SchemaRegistry {
        SchemaRegistry::builtin()
    }

    /// The mutual-exclusion invariant, checked through the public accessors.
    fn assert_invariants(block: &CodeBlock) {
        match block.state() {
            RunState::Succeeded => {
                assert!(block.output().is_some());
                assert!(block.error().is_none());
            }
            RunState::Failed => {
                assert!(block.error().is_some());
                assert!(block.output().is_none());
            }
            RunState::Running => {
                assert!(block.last_run_id().is_some());
                assert!(block.output().is_none());
                assert!(block.error().is_none());
            }
            RunState::Idle => {
                assert!(block.output().is_none());
                assert!(block.error().is_none());
            }
        }
    }

    // ── Construction and editing ────────────────────────────────────────

    #[test]
    fn test_new_is_idle() {
        let block = CodeBlock::new("python", "print(1)");
        assert_eq!(block.state(), RunState::Idle);
        assert_eq!(block.language(), "python");
        assert_eq!(block.source(), "print(1)");
        assert_eq!(block.last_run_id(), None);
        assert_invariants(&block);
    }

    #[test]
    fn test_empty_language_defaults() {
        let block = CodeBlock::new("", "x");
        assert_eq!(block.language(), DEFAULT_LANGUAGE);

        let mut block = CodeBlock::new("python", "x");
        block.set_language("");
        assert_eq!(block.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_edit_source_legal_in_any_state() {
        let mut block = CodeBlock::new("python", "print(1)");
        let req = block.begin_run().unwrap();
        block.edit_source("print(2)");
        assert_eq!(block.source(), "print(2)");
        // The in-flight run is untouched
        assert_eq!(block.state(), RunState::Running);
        assert_eq!(block.last_run_id(), Some(req.run_id));
    }

    // ── Run happy path ──────────────────────────────────────────────────

    #[test]
    fn test_run_success_scenario() {
        let mut block = CodeBlock::new("python", "print(1)");

        let req = block.begin_run().unwrap();
        assert_eq!(block.state(), RunState::Running);
        assert_eq!(block.last_run_id(), Some(req.run_id));
        assert_eq!(req.language, "python");
        assert_eq!(req.source, "print(1)");
        assert_invariants(&block);

        assert!(block.apply_reply(&RunReply::success(req.run_id, "1")));
        assert_eq!(block.state(), RunState::Succeeded);
        assert_eq!(block.output(), Some("1"));
        assert_eq!(block.error(), None);
        assert_invariants(&block);
    }

    #[test]
    fn test_run_failure_sets_error_clears_output() {
        let mut block = CodeBlock::new("python", "boom()");

        // First a success, so there is an output to clear
        let req = block.begin_run().unwrap();
        block.apply_reply(&RunReply::success(req.run_id, "ok"));

        let req = block.begin_run().unwrap();
        assert!(block.apply_reply(&RunReply::failure(
            req.run_id,
            RunError::execution("NameError: boom"),
        )));
        assert_eq!(block.state(), RunState::Failed);
        assert_eq!(block.output(), None);
        assert_eq!(block.error().map(|e| e.kind), Some(RunErrorKind::Execution));
        assert_invariants(&block);
    }

    // ── Rejections ──────────────────────────────────────────────────────

    #[test]
    fn test_empty_source_rejected_without_state_change() {
        let mut block = CodeBlock::new("python", "");
        assert!(matches!(block.begin_run(), Err(ModelError::EmptySource)));
        assert_eq!(block.state(), RunState::Idle);

        let mut block = CodeBlock::new("python", "  \n\t ");
        assert!(matches!(block.begin_run(), Err(ModelError::EmptySource)));
        assert_eq!(block.state(), RunState::Idle);
        assert_eq!(block.last_run_id(), None);
    }

    #[test]
    fn test_run_while_running_rejected_as_noop() {
        let mut block = CodeBlock::new("python", "print(1)");
        let req = block.begin_run().unwrap();

        assert!(matches!(block.begin_run(), Err(ModelError::RunInProgress)));
        // Correlation id unchanged — the original reply still lands
        assert_eq!(block.last_run_id(), Some(req.run_id));
        assert!(block.apply_reply(&RunReply::success(req.run_id, "1")));
        assert_eq!(block.state(), RunState::Succeeded);
    }

    // ── Stale replies ───────────────────────────────────────────────────

    #[test]
    fn test_stale_reply_discarded() {
        let mut block = CodeBlock::new("python", "print(1)");
        let req = block.begin_run().unwrap();

        let stale = RunReply::success(RunId::new(), "other");
        assert!(!block.apply_reply(&stale));
        assert_eq!(block.state(), RunState::Running);
        assert_eq!(block.output(), None);
        assert_eq!(block.last_run_id(), Some(req.run_id));
    }

    #[test]
    fn test_duplicate_terminal_reply_discarded() {
        let mut block = CodeBlock::new("python", "print(1)");
        let req = block.begin_run().unwrap();
        assert!(block.apply_reply(&RunReply::success(req.run_id, "1")));

        // Same id delivered again — at-least-once transport
        assert!(!block.apply_reply(&RunReply::failure(
            req.run_id,
            RunError::execution("late failure"),
        )));
        assert_eq!(block.state(), RunState::Succeeded);
        assert_eq!(block.output(), Some("1"));
    }

    #[test]
    fn test_reply_for_superseded_run_discarded() {
        let mut block = CodeBlock::new("python", "print(1)");
        let first = block.begin_run().unwrap();
        block.apply_reply(&RunReply::failure(first.run_id, RunError::execution("x")));

        let second = block.begin_run().unwrap();
        assert_ne!(first.run_id, second.run_id);

        // First run's reply redelivered after the re-run started
        assert!(!block.apply_reply(&RunReply::success(first.run_id, "old")));
        assert_eq!(block.state(), RunState::Running);
        assert_eq!(block.last_run_id(), Some(second.run_id));
    }

    // ── Stale result retention ──────────────────────────────────────────

    #[test]
    fn test_previous_output_retained_as_stale_during_rerun() {
        let mut block = CodeBlock::new("python", "print(1)");
        let req = block.begin_run().unwrap();
        block.apply_reply(&RunReply::success(req.run_id, "1"));

        block.begin_run().unwrap();
        assert_eq!(block.output(), None, "not presented as current");
        assert_eq!(block.stale_output(), Some("1"));
        assert_invariants(&block);

        // New result supersedes the stale one
        let id = block.last_run_id().unwrap();
        block.apply_reply(&RunReply::success(id, "2"));
        assert_eq!(block.output(), Some("2"));
        assert_eq!(block.stale_output(), None);
    }

    #[test]
    fn test_previous_error_retained_as_stale_during_rerun() {
        let mut block = CodeBlock::new("python", "boom()");
        let req = block.begin_run().unwrap();
        block.apply_reply(&RunReply::failure(req.run_id, RunError::execution("boom")));

        block.begin_run().unwrap();
        assert_eq!(block.error(), None);
        assert_eq!(block.stale_error().map(|e| e.kind), Some(RunErrorKind::Execution));
    }

    // ── Streaming ───────────────────────────────────────────────────────

    #[test]
    fn test_chunks_accumulate_in_order() {
        let mut block = CodeBlock::new("python", "print(1)");
        let req = block.begin_run().unwrap();

        assert!(block.apply_chunk(&RunChunk { run_id: req.run_id, text: "1".into() }));
        assert!(block.apply_chunk(&RunChunk { run_id: req.run_id, text: "\n2".into() }));
        assert_eq!(block.streamed(), "1\n2");
    }

    #[test]
    fn test_stale_chunk_discarded() {
        let mut block = CodeBlock::new("python", "print(1)");
        block.begin_run().unwrap();

        assert!(!block.apply_chunk(&RunChunk { run_id: RunId::new(), text: "x".into() }));
        assert_eq!(block.streamed(), "");
    }

    #[test]
    fn test_streamed_cleared_on_rerun() {
        let mut block = CodeBlock::new("python", "print(1)");
        let req = block.begin_run().unwrap();
        block.apply_chunk(&RunChunk { run_id: req.run_id, text: "1".into() });
        block.apply_reply(&RunReply::success(req.run_id, "1"));

        block.begin_run().unwrap();
        assert_eq!(block.streamed(), "");
    }

    // ── Persisted round trip ────────────────────────────────────────────

    #[test]
    fn test_render_parse_render_identity() {
        let schema = schema();
        let config = CodeBlockConfig::default();
        let block = CodeBlock::new("python", "print(1)\n");

        let rendered = block.render_element(&config, &schema);
        assert_eq!(rendered.tag, "pre");
        assert_eq!(rendered.data_type(), Some(CODE_BLOCK_TYPE));
        assert_eq!(rendered.get(LANGUAGE_ATTR), Some("python"));
        assert_eq!(rendered.text_content(), "print(1)\n");

        let parsed = CodeBlock::parse_element(&rendered, &schema).unwrap().unwrap();
        assert_eq!(parsed, block);
        assert_eq!(parsed.render_element(&config, &schema), rendered);
    }

    #[test]
    fn test_execution_state_never_persists() {
        let schema = schema();
        let mut block = CodeBlock::new("python", "print(1)");
        let req = block.begin_run().unwrap();
        block.apply_reply(&RunReply::success(req.run_id, "1"));

        let rendered = block.render_element(&CodeBlockConfig::default(), &schema);
        let parsed = CodeBlock::parse_element(&rendered, &schema).unwrap().unwrap();
        assert_eq!(parsed.state(), RunState::Idle);
        assert_eq!(parsed.output(), None);
        assert_eq!(parsed.last_run_id(), None);
    }

    #[test]
    fn test_missing_language_attr_defaults() {
        let schema = schema();
        let el = PersistedElement::new("pre")
            .attr(DATA_TYPE_ATTR, CODE_BLOCK_TYPE)
            .text_child("print(1)");
        let parsed = CodeBlock::parse_element(&el, &schema).unwrap().unwrap();
        assert_eq!(parsed.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_unrelated_pre_not_adopted() {
        let schema = schema();
        let el = PersistedElement::new("pre").text_child("just preformatted");
        assert!(CodeBlock::parse_element(&el, &schema).unwrap().is_none());
    }

    #[test]
    fn test_reserved_attrs_win_over_config() {
        let schema = schema();
        let config = CodeBlockConfig::default()
            .with_attribute(DATA_TYPE_ATTR, "spoof")
            .with_attribute(LANGUAGE_ATTR, "cobol")
            .with_attribute("spellcheck", "false");
        let el = CodeBlock::new("python", "x").render_element(&config, &schema);
        assert_eq!(el.data_type(), Some(CODE_BLOCK_TYPE));
        assert_eq!(el.get(LANGUAGE_ATTR), Some("python"));
        assert_eq!(el.get("spellcheck"), Some("false"));
    }
}
