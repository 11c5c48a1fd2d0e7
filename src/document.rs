use std::collections::HashMap;

use crate::scanner::Scanner;
use crate::tag::Tag;
use crate::{Anchor, Directives, EventHandler, Mark, ParserError, TokenKind};

const END_OF_SEQ: &str = "end of sequence not found";
const END_OF_SEQ_FLOW: &str = "end of sequence flow not found";
const UNTERMINATED_SEQ_FLOW: &str = "end of stream inside a flow sequence";
const END_OF_MAP: &str = "end of map not found";
const END_OF_MAP_FLOW: &str = "end of map flow not found";
const UNTERMINATED_MAP_FLOW: &str = "end of stream inside a flow map";
const MULTIPLE_TAGS: &str = "cannot assign multiple tags to the same node";
const MULTIPLE_ANCHORS: &str = "cannot assign multiple anchors to the same node";
const UNKNOWN_ANCHOR: &str = "the referenced anchor is not defined";
const END_OF_DOCUMENT: &str = "end of document not found";
const NESTING_TOO_DEEP: &str = "collections are nested too deeply";

/// How many collections may be open at once. Every open collection costs a
/// few frames of recursion.
pub(crate) const MAX_DEPTH: usize = 128;

/// The kind of an open collection.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum CollectionKind {
    BlockMap,
    BlockSeq,
    FlowMap,
    FlowSeq,
    /// A single `key: value` pair written as a flow sequence entry.
    CompactMap,
}

#[derive(Default, Debug)]
pub(crate) struct CollectionStack {
    stack: Vec<CollectionKind>,
}

impl CollectionStack {
    pub(crate) fn push(&mut self, kind: CollectionKind, mark: Mark) -> Result<(), ParserError> {
        if self.stack.len() >= MAX_DEPTH {
            return problem(NESTING_TOO_DEEP, mark);
        }
        self.stack.push(kind);
        Ok(())
    }

    pub(crate) fn pop(&mut self, kind: CollectionKind) -> Result<(), ParserError> {
        match self.stack.pop() {
            Some(top) if top == kind => Ok(()),
            _ => Err(ParserError::Internal {
                problem: "collection type mismatch",
            }),
        }
    }

    pub(crate) fn top(&self) -> Option<CollectionKind> {
        self.stack.last().copied()
    }
}

fn problem<T>(problem: &'static str, mark: Mark) -> Result<T, ParserError> {
    Err(ParserError::Problem { problem, mark })
}

/// Walks the tokens of a single document and reports its structure.
///
/// Anchors and the collection stack belong to one document: create a new
/// `DocumentParser` for every document.
pub struct DocumentParser<'s, 'r> {
    scanner: &'s mut Scanner<'r>,
    directives: &'s Directives,
    collections: CollectionStack,
    anchors: HashMap<String, Anchor>,
    current_anchor: Anchor,
}

impl<'s, 'r> DocumentParser<'s, 'r> {
    pub fn new(scanner: &'s mut Scanner<'r>, directives: &'s Directives) -> Self {
        DocumentParser {
            scanner,
            directives,
            collections: CollectionStack::default(),
            anchors: HashMap::new(),
            current_anchor: Anchor::NULL,
        }
    }

    /// Parse one document: an optional `---`, one root node, and any number
    /// of `...` markers.
    pub fn handle_document(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        let Some((kind, mark)) = self.next_token()? else {
            return Err(ParserError::Internal {
                problem: "no tokens in scanner",
            });
        };
        if !self.current_anchor.is_null() {
            return Err(ParserError::Internal {
                problem: "anchor counter is not reset",
            });
        }

        handler.document_start(mark);
        if kind == TokenKind::DocumentStart {
            self.scanner.pop()?;
        }
        self.handle_node(handler)?;
        handler.document_end();

        let mut ended = false;
        while let Some((TokenKind::DocumentEnd, _)) = self.next_token()? {
            self.scanner.pop()?;
            ended = true;
        }
        // Without `...`, only the start of another document may follow.
        match self.next_token()? {
            Some((TokenKind::DocumentStart | TokenKind::Directive, _)) | None => Ok(()),
            Some(_) if ended => Ok(()),
            Some((_, mark)) => problem(END_OF_DOCUMENT, mark),
        }
    }

    /// The kind and position of the next token, or `None` at end of stream.
    fn next_token(&mut self) -> Result<Option<(TokenKind, Mark)>, ParserError> {
        if self.scanner.empty()? {
            return Ok(None);
        }
        let token = self.scanner.peek()?;
        Ok(Some((token.kind, token.mark)))
    }

    fn handle_node(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        // An empty node is a possibility.
        let Some((kind, mark)) = self.next_token()? else {
            handler.null(self.scanner.mark(), "?", Anchor::NULL);
            return Ok(());
        };

        match kind {
            // A value with no key before it starts a map with a null key.
            TokenKind::Value => {
                handler.map_start(mark, "?", Anchor::NULL);
                self.handle_map(handler)?;
                handler.map_end();
                return Ok(());
            }
            TokenKind::Alias => {
                let token = self.scanner.pop()?;
                let anchor = self.lookup_anchor(mark, &token.value)?;
                handler.alias(mark, anchor);
                return Ok(());
            }
            _ => {}
        }

        let (tag, anchor) = self.parse_properties()?;
        let kind = self.next_token()?.map(|(kind, _)| kind);

        if kind == Some(TokenKind::PlainScalar) && self.scanner.peek()?.value == "null" {
            handler.null(mark, tag.as_deref().unwrap_or("?"), anchor);
            self.scanner.pop()?;
            return Ok(());
        }

        let explicit = tag.is_some();
        let tag = tag.unwrap_or_else(|| {
            if kind == Some(TokenKind::NonPlainScalar) {
                "!".to_owned()
            } else {
                "?".to_owned()
            }
        });

        match kind {
            Some(TokenKind::PlainScalar | TokenKind::NonPlainScalar) => {
                let token = self.scanner.pop()?;
                handler.scalar(mark, &tag, anchor, &token.value);
                return Ok(());
            }
            Some(TokenKind::FlowSequenceStart | TokenKind::BlockSequenceStart) => {
                handler.sequence_start(mark, &tag, anchor);
                self.handle_sequence(handler)?;
                handler.sequence_end();
                return Ok(());
            }
            Some(TokenKind::FlowMappingStart | TokenKind::BlockMappingStart) => {
                handler.map_start(mark, &tag, anchor);
                self.handle_map(handler)?;
                handler.map_end();
                return Ok(());
            }
            // Compact maps only go in a flow sequence. Elsewhere the key is
            // left for the enclosing collection to reject.
            Some(TokenKind::Key) if self.collections.top() == Some(CollectionKind::FlowSeq) => {
                handler.map_start(mark, &tag, anchor);
                self.handle_map(handler)?;
                handler.map_end();
                return Ok(());
            }
            _ => {}
        }

        if explicit {
            handler.scalar(mark, &tag, anchor, "");
        } else {
            handler.null(mark, &tag, anchor);
        }
        Ok(())
    }

    fn handle_sequence(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        match self.next_token()? {
            Some((TokenKind::BlockSequenceStart, _)) => self.handle_block_sequence(handler),
            Some((TokenKind::FlowSequenceStart, _)) => self.handle_flow_sequence(handler),
            _ => Ok(()),
        }
    }

    fn handle_block_sequence(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        let start = self.scanner.pop()?;
        self.collections.push(CollectionKind::BlockSeq, start.mark)?;

        loop {
            let Some((kind, mark)) = self.next_token()? else {
                return problem(END_OF_SEQ, self.scanner.mark());
            };
            if kind != TokenKind::BlockEntry && kind != TokenKind::BlockSequenceEnd {
                return problem(END_OF_SEQ, mark);
            }
            self.scanner.pop()?;
            if kind == TokenKind::BlockSequenceEnd {
                break;
            }

            // An entry with nothing after it is null.
            if let Some((TokenKind::BlockEntry | TokenKind::BlockSequenceEnd, mark)) =
                self.next_token()?
            {
                handler.null(mark, "?", Anchor::NULL);
                continue;
            }
            self.handle_node(handler)?;
        }

        self.collections.pop(CollectionKind::BlockSeq)
    }

    fn handle_flow_sequence(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        let start = self.scanner.pop()?;
        self.collections.push(CollectionKind::FlowSeq, start.mark)?;

        loop {
            match self.next_token()? {
                None => return problem(UNTERMINATED_SEQ_FLOW, self.scanner.mark()),
                Some((TokenKind::FlowSequenceEnd, _)) => {
                    self.scanner.pop()?;
                    break;
                }
                Some(_) => {}
            }

            self.handle_node(handler)?;

            // A separator or the end; the end is consumed at the top of the
            // loop.
            match self.next_token()? {
                None => return problem(UNTERMINATED_SEQ_FLOW, self.scanner.mark()),
                Some((TokenKind::FlowEntry, _)) => {
                    self.scanner.pop()?;
                }
                Some((TokenKind::FlowSequenceEnd, _)) => {}
                Some((_, mark)) => return problem(END_OF_SEQ_FLOW, mark),
            }
        }

        self.collections.pop(CollectionKind::FlowSeq)
    }

    fn handle_map(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        match self.next_token()? {
            Some((TokenKind::BlockMappingStart, _)) => self.handle_block_map(handler),
            Some((TokenKind::FlowMappingStart, _)) => self.handle_flow_map(handler),
            Some((TokenKind::Key, _)) => self.handle_compact_map(handler),
            Some((TokenKind::Value, _)) => self.handle_compact_map_with_no_key(handler),
            _ => Ok(()),
        }
    }

    fn handle_block_map(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        let start = self.scanner.pop()?;
        self.collections.push(CollectionKind::BlockMap, start.mark)?;

        loop {
            let Some((kind, mark)) = self.next_token()? else {
                return problem(END_OF_MAP, self.scanner.mark());
            };
            match kind {
                TokenKind::BlockMappingEnd => {
                    self.scanner.pop()?;
                    break;
                }
                TokenKind::Key => {
                    self.scanner.pop()?;
                    self.handle_node(handler)?;
                }
                TokenKind::Value => handler.null(mark, "?", Anchor::NULL),
                _ => return problem(END_OF_MAP, mark),
            }
            self.handle_map_value(handler, mark)?;
        }

        self.collections.pop(CollectionKind::BlockMap)
    }

    fn handle_flow_map(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        let start = self.scanner.pop()?;
        self.collections.push(CollectionKind::FlowMap, start.mark)?;

        loop {
            let Some((kind, mark)) = self.next_token()? else {
                return problem(UNTERMINATED_MAP_FLOW, self.scanner.mark());
            };
            match kind {
                TokenKind::FlowMappingEnd => {
                    self.scanner.pop()?;
                    break;
                }
                TokenKind::Key => {
                    self.scanner.pop()?;
                    self.handle_node(handler)?;
                }
                _ => handler.null(mark, "?", Anchor::NULL),
            }
            self.handle_map_value(handler, mark)?;

            match self.next_token()? {
                None => return problem(UNTERMINATED_MAP_FLOW, self.scanner.mark()),
                Some((TokenKind::FlowEntry, _)) => {
                    self.scanner.pop()?;
                }
                Some((TokenKind::FlowMappingEnd, _)) => {}
                Some((_, mark)) => return problem(END_OF_MAP_FLOW, mark),
            }
        }

        self.collections.pop(CollectionKind::FlowMap)
    }

    fn handle_compact_map(&mut self, handler: &mut dyn EventHandler) -> Result<(), ParserError> {
        let key = self.scanner.pop()?;
        self.collections.push(CollectionKind::CompactMap, key.mark)?;

        self.handle_node(handler)?;
        self.handle_map_value(handler, key.mark)?;

        self.collections.pop(CollectionKind::CompactMap)
    }

    fn handle_compact_map_with_no_key(
        &mut self,
        handler: &mut dyn EventHandler,
    ) -> Result<(), ParserError> {
        let value = self.scanner.pop()?;
        self.collections.push(CollectionKind::CompactMap, value.mark)?;

        handler.null(value.mark, "?", Anchor::NULL);
        self.handle_node(handler)?;

        self.collections.pop(CollectionKind::CompactMap)
    }

    /// The optional `VALUE` half of a map entry; a missing value is null at
    /// the entry's mark.
    fn handle_map_value(
        &mut self,
        handler: &mut dyn EventHandler,
        entry_mark: Mark,
    ) -> Result<(), ParserError> {
        if let Some((TokenKind::Value, _)) = self.next_token()? {
            self.scanner.pop()?;
            self.handle_node(handler)
        } else {
            handler.null(entry_mark, "?", Anchor::NULL);
            Ok(())
        }
    }

    /// Consume the tag and anchor in front of a node, in either order.
    fn parse_properties(&mut self) -> Result<(Option<String>, Anchor), ParserError> {
        let mut tag = None;
        let mut anchor = Anchor::NULL;
        loop {
            match self.next_token()? {
                Some((TokenKind::Tag, mark)) => {
                    if tag.is_some() {
                        return problem(MULTIPLE_TAGS, mark);
                    }
                    let token = self.scanner.pop()?;
                    tag = Some(Tag::from_token(&token)?.translate(self.directives));
                }
                Some((TokenKind::Anchor, mark)) => {
                    if !anchor.is_null() {
                        return problem(MULTIPLE_ANCHORS, mark);
                    }
                    let token = self.scanner.pop()?;
                    anchor = self.register_anchor(&token.value);
                }
                _ => return Ok((tag, anchor)),
            }
        }
    }

    fn register_anchor(&mut self, name: &str) -> Anchor {
        if name.is_empty() {
            return Anchor::NULL;
        }
        self.current_anchor = Anchor(self.current_anchor.0 + 1);
        self.anchors.insert(name.to_owned(), self.current_anchor);
        self.current_anchor
    }

    fn lookup_anchor(&self, mark: Mark, name: &str) -> Result<Anchor, ParserError> {
        match self.anchors.get(name) {
            Some(anchor) => Ok(*anchor),
            None => problem(UNKNOWN_ANCHOR, mark),
        }
    }
}
