#![doc = include_str!("../README.md")]
#![doc(html_root_url = "https://docs.rs/yaml-events/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::manual_range_contains,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::struct_excessive_bools,
    clippy::too_many_lines,
    clippy::unnecessary_wraps,
    clippy::match_wildcard_for_single_variants
)]
#![deny(unsafe_code)]

use core::fmt;

#[macro_use]
mod macros;

mod directives;
mod document;
mod error;
mod event;
mod parser;
mod reader;
mod scanner;
mod tag;
mod token;

pub use crate::directives::*;
pub use crate::document::DocumentParser;
pub use crate::error::*;
pub use crate::event::*;
pub use crate::parser::*;
pub use crate::scanner::*;
pub use crate::tag::*;
pub use crate::token::*;

pub(crate) const INPUT_BUFFER_SIZE: usize = 16384;

/// The pointer position.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub struct Mark {
    /// The position index, in bytes.
    pub index: u64,
    /// The position line.
    pub line: u64,
    /// The position column.
    pub column: u64,
}

impl Mark {
    /// No position is available.
    pub const NULL: Mark = Mark {
        index: u64::MAX,
        line: u64::MAX,
        column: u64::MAX,
    };

    pub fn is_null(&self) -> bool {
        *self == Mark::NULL
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("unknown position");
        }
        write!(f, "line {} column {}", self.line + 1, self.column + 1)
    }
}

/// Identifies an anchored node within one document. Anchors are numbered
/// from 1 in the order they appear.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Anchor(pub u32);

impl Anchor {
    /// The node has no anchor.
    pub const NULL: Anchor = Anchor(0);

    pub fn is_null(self) -> bool {
        self == Anchor::NULL
    }
}

/// The stream encoding.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum Encoding {
    /// Let the parser choose the encoding.
    #[default]
    Any = 0,
    /// The default UTF-8 encoding.
    Utf8 = 1,
    /// The UTF-16-LE encoding with BOM.
    Utf16Le = 2,
    /// The UTF-16-BE encoding with BOM.
    Utf16Be = 3,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(input: &str) -> Result<Vec<EventData>, ParserError> {
        let mut bytes = input.as_bytes();
        let mut parser = Parser::new();
        parser.load(&mut bytes);
        let mut events = Vec::<Event>::new();
        while parser.handle_next_document(&mut events)? {}
        Ok(events.into_iter().map(|event| event.data).collect())
    }

    fn null() -> EventData {
        EventData::Null {
            tag: "?".to_owned(),
            anchor: Anchor::NULL,
        }
    }

    fn scalar(value: &str) -> EventData {
        EventData::Scalar {
            tag: "?".to_owned(),
            anchor: Anchor::NULL,
            value: value.to_owned(),
        }
    }

    fn quoted(value: &str) -> EventData {
        EventData::Scalar {
            tag: "!".to_owned(),
            anchor: Anchor::NULL,
            value: value.to_owned(),
        }
    }

    fn seq() -> EventData {
        EventData::SequenceStart {
            tag: "?".to_owned(),
            anchor: Anchor::NULL,
        }
    }

    fn map() -> EventData {
        EventData::MapStart {
            tag: "?".to_owned(),
            anchor: Anchor::NULL,
        }
    }

    fn document(mut body: Vec<EventData>) -> Vec<EventData> {
        body.insert(0, EventData::DocumentStart);
        body.push(EventData::DocumentEnd);
        body
    }

    /// Every start is closed by the matching end, and documents hold exactly
    /// one root node.
    fn assert_well_nested(events: &[EventData]) {
        let mut open = Vec::new();
        let mut roots = 0;
        for event in events {
            match event {
                EventData::DocumentStart => {
                    assert!(open.is_empty());
                    roots = 0;
                }
                EventData::DocumentEnd => {
                    assert!(open.is_empty());
                    assert_eq!(roots, 1);
                }
                EventData::SequenceStart { .. } | EventData::MapStart { .. } => {
                    if open.is_empty() {
                        roots += 1;
                    }
                    open.push(event);
                }
                EventData::SequenceEnd => {
                    assert!(matches!(open.pop(), Some(EventData::SequenceStart { .. })));
                }
                EventData::MapEnd => {
                    assert!(matches!(open.pop(), Some(EventData::MapStart { .. })));
                }
                _ if open.is_empty() => roots += 1,
                _ => {}
            }
        }
        assert!(open.is_empty());
    }

    #[test]
    fn empty_input_has_no_documents() {
        assert_eq!(parse("").unwrap(), Vec::<EventData>::new());
        let mut bytes = "".as_bytes();
        let mut parser = Parser::new();
        parser.load(&mut bytes);
        assert!(!parser.is_valid());
        assert!(!parser.handle_next_document(&mut Vec::<Event>::new()).unwrap());
    }

    #[test]
    fn null_document() {
        assert_eq!(parse("null").unwrap(), document(vec![null()]));
        assert_eq!(
            parse("!!null null").unwrap(),
            document(vec![EventData::Null {
                tag: "tag:yaml.org,2002:null".to_owned(),
                anchor: Anchor::NULL,
            }])
        );
    }

    #[test]
    fn flow_sequence() {
        assert_eq!(
            parse("[1, 2, 3]").unwrap(),
            document(vec![
                seq(),
                scalar("1"),
                scalar("2"),
                scalar("3"),
                EventData::SequenceEnd,
            ])
        );
    }

    #[test]
    fn block_mapping() {
        assert_eq!(
            parse("a: b").unwrap(),
            document(vec![map(), scalar("a"), scalar("b"), EventData::MapEnd])
        );
    }

    #[test]
    fn elided_sequence_entry_is_null() {
        assert_eq!(
            parse("- a\n- \n- c").unwrap(),
            document(vec![
                seq(),
                scalar("a"),
                null(),
                scalar("c"),
                EventData::SequenceEnd,
            ])
        );
    }

    #[test]
    fn compact_map_in_flow_sequence() {
        assert_eq!(
            parse("[ a: b, c ]").unwrap(),
            document(vec![
                seq(),
                map(),
                scalar("a"),
                scalar("b"),
                EventData::MapEnd,
                scalar("c"),
                EventData::SequenceEnd,
            ])
        );
    }

    #[test]
    fn flow_mapping_entries() {
        assert_eq!(
            parse("{a, b: , : c, 'd': [e]}").unwrap(),
            document(vec![
                map(),
                scalar("a"),
                null(),
                scalar("b"),
                null(),
                null(),
                scalar("c"),
                quoted("d"),
                seq(),
                scalar("e"),
                EventData::SequenceEnd,
                EventData::MapEnd,
            ])
        );
    }

    #[test]
    fn nested_block_collections() {
        let input = "\
top:
  list:
  - 1
  - - nested
    - 'q'
  empty:
  map: {x: y}
last: |
  text
";
        let events = parse(input).unwrap();
        assert_well_nested(&events);
        assert_eq!(
            events,
            document(vec![
                map(),
                scalar("top"),
                map(),
                scalar("list"),
                seq(),
                scalar("1"),
                seq(),
                scalar("nested"),
                quoted("q"),
                EventData::SequenceEnd,
                EventData::SequenceEnd,
                scalar("empty"),
                null(),
                scalar("map"),
                map(),
                scalar("x"),
                scalar("y"),
                EventData::MapEnd,
                EventData::MapEnd,
                scalar("last"),
                quoted("text\n"),
                EventData::MapEnd,
            ])
        );
    }

    #[test]
    fn explicit_keys_and_values() {
        assert_eq!(
            parse("? a\n? b\n: c\n: d").unwrap(),
            document(vec![
                map(),
                scalar("a"),
                null(),
                scalar("b"),
                scalar("c"),
                null(),
                scalar("d"),
                EventData::MapEnd,
            ])
        );
    }

    #[test]
    fn several_documents() {
        let events = parse("a\n---\n- b\n...\n--- c\n...\n").unwrap();
        assert_well_nested(&events);
        let mut expected = document(vec![scalar("a")]);
        expected.extend(document(vec![seq(), scalar("b"), EventData::SequenceEnd]));
        expected.extend(document(vec![scalar("c")]));
        assert_eq!(events, expected);
    }

    #[test]
    fn anchors_resolve_within_a_document() {
        assert_eq!(
            parse("a: &x 1\nb: *x\nc: &y [*x]").unwrap(),
            document(vec![
                map(),
                scalar("a"),
                EventData::Scalar {
                    tag: "?".to_owned(),
                    anchor: Anchor(1),
                    value: "1".to_owned(),
                },
                scalar("b"),
                EventData::Alias { anchor: Anchor(1) },
                scalar("c"),
                EventData::SequenceStart {
                    tag: "?".to_owned(),
                    anchor: Anchor(2),
                },
                EventData::Alias { anchor: Anchor(1) },
                EventData::SequenceEnd,
                EventData::MapEnd,
            ])
        );
    }

    #[test]
    fn unknown_alias_fails() {
        let err = parse("a: *nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.mark().column, 3);
    }

    #[test]
    fn anchors_do_not_cross_documents() {
        let err = parse("&a x\n--- *a\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.mark().line, 1);
        assert!(err.to_string().contains("anchor"));
    }

    #[test]
    fn anchor_numbering_restarts_per_document() {
        let events = parse("&a x\n--- &b y\n").unwrap();
        let anchors: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                EventData::Scalar { anchor, .. } => Some(*anchor),
                _ => None,
            })
            .collect();
        assert_eq!(anchors, vec![Anchor(1), Anchor(1)]);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(parse("[a, b").unwrap_err().kind(), ErrorKind::Lexical);
        assert_eq!(parse("%YAML 2.0\n--- a").unwrap_err().kind(), ErrorKind::Directive);
        assert_eq!(parse("a: b\n- c").unwrap_err().kind(), ErrorKind::Structural);
        assert_eq!(parse("a: \"\\q\"").unwrap_err().kind(), ErrorKind::Lexical);

        let mut bytes: &[u8] = b"a: \xff";
        let mut parser = Parser::new();
        parser.load(&mut bytes);
        let err = parser
            .handle_next_document(&mut Vec::<Event>::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lexical);

        struct Broken;
        impl std::io::Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "broken pipe"))
            }
        }
        let mut input = std::io::BufReader::new(Broken);
        let mut parser = Parser::new();
        parser.load(&mut input);
        let err = parser
            .handle_next_document(&mut Vec::<Event>::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn error_leaves_parser_usable() {
        let mut bytes = "a: *x\n".as_bytes();
        let mut parser = Parser::new();
        parser.load(&mut bytes);
        let mut events = Vec::<Event>::new();
        assert!(parser.handle_next_document(&mut events).is_err());
        assert!(parser.is_valid());

        let mut bytes = "b".as_bytes();
        parser.load(&mut bytes);
        assert!(parser.handle_next_document(&mut events).unwrap());
    }

    #[test]
    fn mark_display() {
        let mark = Mark {
            index: 3,
            line: 1,
            column: 0,
        };
        assert_eq!(mark.to_string(), "line 2 column 1");
        assert!(Mark::NULL.is_null());
        assert!(!Mark::default().is_null());
        assert!(Anchor::NULL.is_null());
    }

    #[test]
    fn scanner_marks() {
        const INPUT: &str = "b:
c: true";
        let mut read_in = INPUT.as_bytes();
        let tokens = Scanner::from_reader(&mut read_in)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let mark = |index, line, column| Mark {
            index,
            line,
            column,
        };
        let summary: Vec<_> = tokens
            .iter()
            .map(|token| (token.kind, token.value.as_str(), token.mark))
            .collect();
        assert_eq!(
            summary,
            vec![
                (TokenKind::BlockMappingStart, "", mark(0, 0, 0)),
                (TokenKind::Key, "", mark(0, 0, 0)),
                (TokenKind::PlainScalar, "b", mark(0, 0, 0)),
                (TokenKind::Value, "", mark(1, 0, 1)),
                (TokenKind::Key, "", mark(3, 1, 0)),
                (TokenKind::PlainScalar, "c", mark(3, 1, 0)),
                (TokenKind::Value, "", mark(4, 1, 1)),
                (TokenKind::PlainScalar, "true", mark(6, 1, 3)),
                (TokenKind::BlockMappingEnd, "", mark(10, 1, 7)),
            ]
        );
    }
}
