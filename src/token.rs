use core::fmt;

use crate::{Mark, TagKind};

/// The token structure.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Token {
    /// The token type.
    pub kind: TokenKind,
    /// The beginning of the token.
    pub mark: Mark,
    /// The directive name, scalar text, anchor or alias name, or tag suffix.
    pub value: String,
    /// Directive arguments, or the suffix of a named-handle tag.
    pub params: Vec<String>,
    /// The tag form, set for [`TokenKind::Tag`] only.
    pub tag_kind: Option<TagKind>,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum TokenKind {
    /// A `%NAME param...` directive.
    Directive,
    /// A `---` marker.
    DocumentStart,
    /// A `...` marker.
    DocumentEnd,
    BlockSequenceStart,
    BlockMappingStart,
    BlockSequenceEnd,
    BlockMappingEnd,
    /// A `-` entry indicator.
    BlockEntry,
    FlowSequenceStart,
    FlowMappingStart,
    FlowSequenceEnd,
    FlowMappingEnd,
    /// A `,` separator.
    FlowEntry,
    Key,
    Value,
    Anchor,
    Alias,
    Tag,
    PlainScalar,
    /// A quoted or block scalar.
    NonPlainScalar,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Directive => "DIRECTIVE",
            TokenKind::DocumentStart => "DOC_START",
            TokenKind::DocumentEnd => "DOC_END",
            TokenKind::BlockSequenceStart => "BLOCK_SEQ_START",
            TokenKind::BlockMappingStart => "BLOCK_MAP_START",
            TokenKind::BlockSequenceEnd => "BLOCK_SEQ_END",
            TokenKind::BlockMappingEnd => "BLOCK_MAP_END",
            TokenKind::BlockEntry => "BLOCK_ENTRY",
            TokenKind::FlowSequenceStart => "FLOW_SEQ_START",
            TokenKind::FlowMappingStart => "FLOW_MAP_START",
            TokenKind::FlowSequenceEnd => "FLOW_SEQ_END",
            TokenKind::FlowMappingEnd => "FLOW_MAP_END",
            TokenKind::FlowEntry => "FLOW_ENTRY",
            TokenKind::Key => "KEY",
            TokenKind::Value => "VALUE",
            TokenKind::Anchor => "ANCHOR",
            TokenKind::Alias => "ALIAS",
            TokenKind::Tag => "TAG",
            TokenKind::PlainScalar => "PLAIN_SCALAR",
            TokenKind::NonPlainScalar => "NON_PLAIN_SCALAR",
        }
    }
}

impl Token {
    pub fn new(kind: TokenKind, mark: Mark) -> Token {
        Token {
            kind,
            mark,
            value: String::new(),
            params: Vec::new(),
            tag_kind: None,
        }
    }

    pub(crate) fn with_value(kind: TokenKind, mark: Mark, value: String) -> Token {
        Token {
            value,
            ..Token::new(kind, mark)
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.value)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}
