use std::io::BufRead;

use crate::document::DocumentParser;
use crate::scanner::Scanner;
use crate::{Directives, Encoding, EventHandler, ParserError, Token, TokenKind, Version};

const YAML_DIRECTIVE_ARGS: &str = "YAML directives must have exactly one argument";
const REPEATED_YAML_DIRECTIVE: &str = "repeated YAML directive";
const YAML_MAJOR_VERSION: &str = "YAML major version too large";
const TAG_DIRECTIVE_ARGS: &str = "TAG directives must have exactly two arguments";
const REPEATED_TAG_DIRECTIVE: &str = "repeated TAG directive";

/// The parser structure.
///
/// Load an input with [`Parser::load`], then call
/// [`Parser::handle_next_document`] until it returns `Ok(false)`.
pub struct Parser<'r> {
    scanner: Scanner<'r>,
    directives: Directives,
    encoding: Encoding,
}

impl<'r> Default for Parser<'r> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Parser<'r> {
    /// Create a parser with no input.
    pub fn new() -> Parser<'r> {
        Parser {
            scanner: Scanner::new(),
            directives: Directives::new(),
            encoding: Encoding::Any,
        }
    }

    /// Start over on a new input, with default directives.
    pub fn load(&mut self, input: &'r mut dyn BufRead) {
        self.scanner = Scanner::from_reader(input);
        if self.encoding != Encoding::Any {
            self.scanner.set_encoding(self.encoding);
        }
        self.directives = Directives::new();
    }

    /// Set the source encoding used by the next [`Parser::load`]. By default
    /// it is detected from the byte order mark.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    /// Returns `true` while there is unconsumed input.
    ///
    /// An input that fails to scan counts as unconsumed.
    pub fn is_valid(&mut self) -> bool {
        !matches!(self.scanner.empty(), Ok(true))
    }

    /// The directives of the current document.
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    /// Parse the next document of the stream and report it to `handler`.
    ///
    /// Returns `Ok(false)` once the stream has no more documents. After an
    /// error, the scanner stays where the error occurred.
    pub fn handle_next_document(
        &mut self,
        handler: &mut dyn EventHandler,
    ) -> Result<bool, ParserError> {
        self.parse_directives()?;
        if self.scanner.empty()? {
            debug!("end of stream");
            return Ok(false);
        }

        debug!(mark = %self.scanner.mark(), "parsing document");
        DocumentParser::new(&mut self.scanner, &self.directives).handle_document(handler)?;
        Ok(true)
    }

    /// Drain the remaining tokens into a listing, one per line.
    pub fn print_tokens(&mut self) -> Result<String, ParserError> {
        let mut output = String::new();
        while !self.scanner.empty()? {
            let token = self.scanner.pop()?;
            output.push_str(&token.to_string());
            output.push('\n');
        }
        Ok(output)
    }

    /// Apply the directives in front of a document. Directives carry over from
    /// the previous document unless this one declares its own.
    fn parse_directives(&mut self) -> Result<(), ParserError> {
        let mut read_directive = false;
        while !self.scanner.empty()? {
            if self.scanner.peek()?.kind != TokenKind::Directive {
                break;
            }
            if !read_directive {
                self.directives = Directives::new();
                read_directive = true;
            }
            let token = self.scanner.pop()?;
            self.handle_directive(&token)?;
        }
        Ok(())
    }

    fn handle_directive(&mut self, token: &Token) -> Result<(), ParserError> {
        debug!(directive = %token, "directive");
        match token.value.as_str() {
            "YAML" => self.handle_yaml_directive(token),
            "TAG" => self.handle_tag_directive(token),
            _ => Ok(()),
        }
    }

    fn handle_yaml_directive(&mut self, token: &Token) -> Result<(), ParserError> {
        let mark = token.mark;
        let [value] = token.params.as_slice() else {
            return Err(ParserError::Directive {
                problem: YAML_DIRECTIVE_ARGS,
                mark,
            });
        };
        if !self.directives.version.is_default {
            return Err(ParserError::Directive {
                problem: REPEATED_YAML_DIRECTIVE,
                mark,
            });
        }
        let Some((major, minor)) = parse_version(value) else {
            return Err(ParserError::InvalidVersion {
                value: value.clone(),
                mark,
            });
        };
        if major > 1 {
            return Err(ParserError::Directive {
                problem: YAML_MAJOR_VERSION,
                mark,
            });
        }
        self.directives.version = Version {
            is_default: false,
            major,
            minor,
        };
        Ok(())
    }

    fn handle_tag_directive(&mut self, token: &Token) -> Result<(), ParserError> {
        let mark = token.mark;
        let [handle, prefix] = token.params.as_slice() else {
            return Err(ParserError::Directive {
                problem: TAG_DIRECTIVE_ARGS,
                mark,
            });
        };
        if self.directives.tags.contains_key(handle) {
            return Err(ParserError::Directive {
                problem: REPEATED_TAG_DIRECTIVE,
                mark,
            });
        }
        self.directives.tags.insert(handle.clone(), prefix.clone());
        Ok(())
    }
}

/// Read `major.minor`. Anything after the minor digits is ignored.
fn parse_version(value: &str) -> Option<(i32, i32)> {
    let (major, rest) = value.split_once('.')?;
    let end = rest
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(rest.len());
    Some((major.parse().ok()?, rest[..end].parse().ok()?))
}
