//! The document container.
//!
//! A document is an ordered list of blocks: paragraphs (runs of spans, each
//! span optionally carrying one wiki link), executable code blocks, and raw
//! passthrough elements neither extension recognizes. The document is the
//! single source of truth for everything serializable — views observe it and
//! request mutations, they never own state.
//!
//! Spans are the non-overlap guarantee for wiki links: a span carries at most
//! one link, and applying a link over a range splits spans at the range
//! boundaries and overwrites whatever was there. Two link marks can never
//! overlap the same character.
//!
//! Positions are byte offsets into the paragraph's concatenated text and must
//! fall on character boundaries.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use washi_types::{BlockId, DocId, RunChunk, RunReply, RunRequest};

use crate::error::{ModelError, Result};
use crate::mark::{WikiLink, WikiLinkConfig};
use crate::node::{CODE_BLOCK_TYPE, CodeBlock, CodeBlockConfig};
use crate::persist::{PersistedElement, PersistedNode};
use crate::schema::SchemaRegistry;

/// Tag of persisted paragraph elements.
const PARAGRAPH_TAG: &str = "p";

/// One run of text with at most one wiki link over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link: Option<WikiLink>,
}

impl Span {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn link(&self) -> Option<&WikiLink> {
        self.link.as_ref()
    }
}

/// A paragraph: an ordered run of spans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    spans: Vec<Span>,
}

impl Paragraph {
    /// A paragraph holding one unlinked run of text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut p = Self::default();
        if !text.is_empty() {
            p.spans.push(Span::plain(text));
        }
        p
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Concatenated text of all spans.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Byte length of the concatenated text.
    pub fn len(&self) -> usize {
        self.spans.iter().map(|s| s.text.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every linked range, in document order. Ranges never overlap.
    pub fn links(&self) -> Vec<(Range<usize>, &WikiLink)> {
        let mut out = Vec::new();
        let mut offset = 0;
        for span in &self.spans {
            if let Some(link) = &span.link {
                out.push((offset..offset + span.text.len(), link));
            }
            offset += span.text.len();
        }
        out
    }

    /// The link covering a byte position, if any.
    pub fn link_at(&self, pos: usize) -> Option<&WikiLink> {
        let mut offset = 0;
        for span in &self.spans {
            if pos < offset + span.text.len() {
                return span.link.as_ref();
            }
            offset += span.text.len();
        }
        None
    }

    /// Apply a wiki link over `range`, replacing any link already covering
    /// part of it.
    pub fn apply_link(&mut self, range: Range<usize>, link: WikiLink) -> Result<()> {
        self.check_range(&range)?;
        if range.is_empty() {
            return Err(ModelError::EmptyRange);
        }
        let start = self.split_at(range.start);
        let end = self.split_at(range.end);
        for span in &mut self.spans[start..end] {
            span.link = Some(link.clone());
        }
        self.normalize();
        Ok(())
    }

    /// Strip wiki links from `range`.
    pub fn remove_link(&mut self, range: Range<usize>) -> Result<()> {
        self.check_range(&range)?;
        let start = self.split_at(range.start);
        let end = self.split_at(range.end);
        for span in &mut self.spans[start..end] {
            span.link = None;
        }
        self.normalize();
        Ok(())
    }

    /// Replace `range` with plain text. Links outside the range keep their
    /// spans; a link whose text is deleted entirely goes with it, and the
    /// replacement text is unlinked.
    pub fn splice(&mut self, range: Range<usize>, replacement: &str) -> Result<()> {
        self.check_range(&range)?;
        let start = self.split_at(range.start);
        let end = self.split_at(range.end);
        let inserted = if replacement.is_empty() {
            Vec::new()
        } else {
            vec![Span::plain(replacement)]
        };
        self.spans.splice(start..end, inserted);
        self.normalize();
        Ok(())
    }

    /// Sync link titles after the target document was renamed. Returns the
    /// number of links updated.
    pub fn retitle_links(&mut self, doc_id: DocId, title: &str) -> usize {
        let mut updated = 0;
        for span in &mut self.spans {
            if let Some(link) = &mut span.link
                && link.retitle_if(doc_id, title)
            {
                updated += 1;
            }
        }
        if updated > 0 {
            self.normalize();
        }
        updated
    }

    fn check_range(&self, range: &Range<usize>) -> Result<()> {
        let text = self.text();
        if range.start > range.end || range.end > text.len() {
            return Err(ModelError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                len: text.len(),
            });
        }
        for pos in [range.start, range.end] {
            if !text.is_char_boundary(pos) {
                return Err(ModelError::NotCharBoundary(pos));
            }
        }
        Ok(())
    }

    /// Split spans so `pos` falls on a span boundary; returns the index of
    /// the span starting at `pos`. Caller has validated the position.
    fn split_at(&mut self, pos: usize) -> usize {
        let mut offset = 0;
        for i in 0..self.spans.len() {
            if pos == offset {
                return i;
            }
            let len = self.spans[i].text.len();
            if pos < offset + len {
                let tail = self.spans[i].text.split_off(pos - offset);
                let link = self.spans[i].link.clone();
                self.spans.insert(i + 1, Span { text: tail, link });
                return i + 1;
            }
            offset += len;
        }
        self.spans.len()
    }

    /// Canonical form: no empty spans, no adjacent spans with the same link.
    fn normalize(&mut self) {
        self.spans.retain(|s| !s.text.is_empty());
        let mut i = 1;
        while i < self.spans.len() {
            if self.spans[i].link == self.spans[i - 1].link {
                let tail = self.spans.remove(i);
                self.spans[i - 1].text.push_str(&tail.text);
            } else {
                i += 1;
            }
        }
    }

    /// Render to a persisted `p` element.
    pub fn render_element(&self, opts: &RenderOptions) -> PersistedElement {
        let mut el = PersistedElement::new(PARAGRAPH_TAG);
        for span in &self.spans {
            match &span.link {
                Some(link) => el.children.push(PersistedNode::Element(link.render_element(
                    &span.text,
                    &opts.wiki_link,
                    &opts.schema,
                ))),
                None => el.children.push(PersistedNode::text(span.text.clone())),
            }
        }
        el
    }

    /// Parse a persisted `p` element.
    ///
    /// Wiki-link children become linked spans. Unrecognized inline markup is
    /// flattened to its text content — inline structure other than the two
    /// extensions is not modeled here.
    pub fn parse_element(el: &PersistedElement, schema: &SchemaRegistry) -> Result<Self> {
        let mut p = Paragraph::default();
        for child in &el.children {
            match child {
                PersistedNode::Text(text) => p.spans.push(Span::plain(text.clone())),
                PersistedNode::Element(child_el) => {
                    if let Some(link) = WikiLink::parse_element(child_el, schema)? {
                        p.spans.push(Span {
                            text: child_el.text_content(),
                            link: Some(link),
                        });
                    } else {
                        let text = child_el.text_content();
                        if !text.is_empty() {
                            p.spans.push(Span::plain(text));
                        }
                    }
                }
            }
        }
        p.normalize();
        Ok(p)
    }
}

/// The content of one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockNode {
    Paragraph(Paragraph),
    Code(CodeBlock),
    /// Markup neither extension recognizes — preserved untouched.
    Raw(PersistedElement),
}

impl BlockNode {
    /// Element type tag, used to pick a node view.
    pub fn type_tag(&self) -> &str {
        match self {
            BlockNode::Paragraph(_) => "paragraph",
            BlockNode::Code(_) => CODE_BLOCK_TYPE,
            BlockNode::Raw(el) => el.data_type().unwrap_or("raw"),
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            BlockNode::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&CodeBlock> {
        match self {
            BlockNode::Code(c) => Some(c),
            _ => None,
        }
    }
}

/// One block: identity plus content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    id: BlockId,
    node: BlockNode,
}

impl Block {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn node(&self) -> &BlockNode {
        &self.node
    }
}

/// Rendering configuration: the schema plus per-extension presentational
/// attributes, merged with reserved keys winning.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub schema: SchemaRegistry,
    pub wiki_link: WikiLinkConfig,
    pub code_block: CodeBlockConfig,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            schema: SchemaRegistry::builtin(),
            wiki_link: WikiLinkConfig::default(),
            code_block: CodeBlockConfig::default(),
        }
    }
}

/// An editable document: ordered blocks, mutated only through these
/// operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: DocId,
    blocks: Vec<Block>,
}

impl Document {
    /// A new empty document.
    pub fn new(id: DocId) -> Self {
        Self {
            id,
            blocks: Vec::new(),
        }
    }

    pub fn id(&self) -> DocId {
        self.id
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in document order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn block(&self, id: BlockId) -> Option<&BlockNode> {
        self.blocks.iter().find(|b| b.id == id).map(|b| &b.node)
    }

    fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    fn insert_node(&mut self, after: Option<BlockId>, node: BlockNode) -> Result<BlockId> {
        let at = match after {
            Some(anchor) => self
                .index_of(anchor)
                .ok_or(ModelError::BlockNotFound(anchor))?
                + 1,
            None => self.blocks.len(),
        };
        let id = BlockId::new();
        self.blocks.insert(at, Block { id, node });
        Ok(id)
    }

    /// Insert a paragraph after `after` (or at the end).
    pub fn insert_paragraph(
        &mut self,
        after: Option<BlockId>,
        text: impl Into<String>,
    ) -> Result<BlockId> {
        self.insert_node(after, BlockNode::Paragraph(Paragraph::from_text(text)))
    }

    /// Insert a code block after `after` (or at the end).
    pub fn insert_code_block(
        &mut self,
        after: Option<BlockId>,
        language: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<BlockId> {
        self.insert_node(after, BlockNode::Code(CodeBlock::new(language, source)))
    }

    /// Delete a block, returning its content.
    pub fn delete_block(&mut self, id: BlockId) -> Result<BlockNode> {
        let at = self.index_of(id).ok_or(ModelError::BlockNotFound(id))?;
        Ok(self.blocks.remove(at).node)
    }

    fn paragraph_mut(&mut self, id: BlockId) -> Result<&mut Paragraph> {
        let at = self.index_of(id).ok_or(ModelError::BlockNotFound(id))?;
        match &mut self.blocks[at].node {
            BlockNode::Paragraph(p) => Ok(p),
            _ => Err(ModelError::NotAParagraph(id)),
        }
    }

    fn code_mut(&mut self, id: BlockId) -> Result<&mut CodeBlock> {
        let at = self.index_of(id).ok_or(ModelError::BlockNotFound(id))?;
        match &mut self.blocks[at].node {
            BlockNode::Code(c) => Ok(c),
            _ => Err(ModelError::NotACodeBlock(id)),
        }
    }

    /// Borrow a code block.
    pub fn code(&self, id: BlockId) -> Result<&CodeBlock> {
        match self.block(id) {
            Some(BlockNode::Code(c)) => Ok(c),
            Some(_) => Err(ModelError::NotACodeBlock(id)),
            None => Err(ModelError::BlockNotFound(id)),
        }
    }

    // ── Paragraph operations ────────────────────────────────────────────

    /// Apply a wiki link over a range of a paragraph, replacing any link
    /// already covering part of it.
    pub fn apply_link(&mut self, id: BlockId, range: Range<usize>, link: WikiLink) -> Result<()> {
        self.paragraph_mut(id)?.apply_link(range, link)
    }

    /// Strip wiki links from a range of a paragraph.
    pub fn remove_link(&mut self, id: BlockId, range: Range<usize>) -> Result<()> {
        self.paragraph_mut(id)?.remove_link(range)
    }

    /// Replace a range of paragraph text with plain text.
    pub fn splice_text(
        &mut self,
        id: BlockId,
        range: Range<usize>,
        replacement: &str,
    ) -> Result<()> {
        self.paragraph_mut(id)?.splice(range, replacement)
    }

    /// Sync every resolved link targeting `doc_id` to a new title. Returns
    /// the number of links updated across the document.
    pub fn retitle_links(&mut self, doc_id: DocId, title: &str) -> usize {
        let mut updated = 0;
        for block in &mut self.blocks {
            if let BlockNode::Paragraph(p) = &mut block.node {
                updated += p.retitle_links(doc_id, title);
            }
        }
        updated
    }

    // ── Code block operations ───────────────────────────────────────────

    /// Replace a code block's source. Legal in any run state.
    pub fn edit_source(&mut self, id: BlockId, source: impl Into<String>) -> Result<()> {
        self.code_mut(id)?.edit_source(source);
        Ok(())
    }

    /// Change a code block's language tag.
    pub fn set_language(&mut self, id: BlockId, language: impl Into<String>) -> Result<()> {
        self.code_mut(id)?.set_language(language);
        Ok(())
    }

    /// Start a run on a code block; returns the outbound request.
    pub fn begin_run(&mut self, id: BlockId) -> Result<RunRequest> {
        self.code_mut(id)?.begin_run()
    }

    /// Apply a terminal run reply to a code block. `Ok(false)` means the
    /// reply was stale and discarded.
    pub fn apply_reply(&mut self, id: BlockId, reply: &RunReply) -> Result<bool> {
        Ok(self.code_mut(id)?.apply_reply(reply))
    }

    /// Apply a stream chunk to a code block. `Ok(false)` means the chunk was
    /// stale and discarded.
    pub fn apply_chunk(&mut self, id: BlockId, chunk: &RunChunk) -> Result<bool> {
        Ok(self.code_mut(id)?.apply_chunk(chunk))
    }

    // ── Persisted form ──────────────────────────────────────────────────

    /// Render the document to the persisted form.
    pub fn to_persisted(&self, opts: &RenderOptions) -> Vec<PersistedNode> {
        self.blocks
            .iter()
            .map(|block| match &block.node {
                BlockNode::Paragraph(p) => PersistedNode::Element(p.render_element(opts)),
                BlockNode::Code(c) => {
                    PersistedNode::Element(c.render_element(&opts.code_block, &opts.schema))
                }
                BlockNode::Raw(el) => PersistedNode::Element(el.clone()),
            })
            .collect()
    }

    /// Parse a persisted node list into a document.
    ///
    /// Code blocks and paragraphs (with their wiki links) are recognized via
    /// the schema; top-level text becomes a paragraph; everything else is
    /// carried as raw passthrough.
    pub fn from_persisted(
        id: DocId,
        nodes: &[PersistedNode],
        schema: &SchemaRegistry,
    ) -> Result<Self> {
        let mut doc = Self::new(id);
        for node in nodes {
            let parsed = match node {
                PersistedNode::Text(text) => BlockNode::Paragraph(Paragraph::from_text(text)),
                PersistedNode::Element(el) => {
                    if let Some(code) = CodeBlock::parse_element(el, schema)? {
                        BlockNode::Code(code)
                    } else if el.tag == PARAGRAPH_TAG {
                        BlockNode::Paragraph(Paragraph::parse_element(el, schema)?)
                    } else {
                        BlockNode::Raw(el.clone())
                    }
                }
            };
            doc.insert_node(None, parsed)?;
        }
        Ok(doc)
    }
}

// ============================================================================
// Tests
// ============================================================================
