use std::collections::VecDeque;
use std::io::BufRead;

use crate::macros::{
    as_digit, as_hex, is_alpha, is_blank, is_blankz, is_bom, is_break, is_breakz, is_digit,
    is_flow_indicator, is_hex, is_space, is_tab, is_uri_char,
};
use crate::reader::{utf8_char_width, Reader};
use crate::{Encoding, Mark, ReaderError, ScannerError, TagKind, Token, TokenKind};

/// A simple key candidate goes stale once the scanner moves this many
/// characters past it.
const MAX_SIMPLE_KEY_LENGTH: u64 = 1024;

/// This structure holds information about a potential simple key.
#[derive(Copy, Clone, Default, Debug)]
struct SimpleKey {
    /// Is a simple key possible?
    possible: bool,
    /// Is a simple key required?
    required: bool,
    /// The number of the token.
    token_number: usize,
    /// The position mark.
    mark: Mark,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum IndentKind {
    Sequence,
    Mapping,
}

/// An open block collection: the column that introduced it and its kind.
#[derive(Copy, Clone, Debug)]
struct Indent {
    column: i64,
    kind: IndentKind,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum FlowKind {
    Sequence,
    Mapping,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Chomping {
    Strip,
    Clip,
    Keep,
}

/// The scanner turns a character stream into tokens.
///
/// Tokens are produced lazily: [`Scanner::peek`], [`Scanner::pop`] and
/// [`Scanner::empty`] lex only as far as needed to know that the token at the
/// front of the queue is final, i.e. that no `KEY` or block start will have to
/// be inserted in front of it.
pub struct Scanner<'r> {
    reader: Reader<'r>,
    /// The current position.
    mark: Mark,
    /// The queued tokens.
    tokens: VecDeque<Token>,
    /// The number of tokens handed out.
    tokens_parsed: usize,
    /// Has the end of the input been reached and all closing tokens queued?
    stream_end_produced: bool,
    /// The open block collections, innermost last.
    indents: Vec<Indent>,
    /// The open flow collections and where they started, innermost last.
    flows: Vec<(FlowKind, Mark)>,
    /// May a simple key occur at the current position?
    simple_key_allowed: bool,
    /// One simple key slot per flow level, plus one for block context.
    simple_keys: Vec<SimpleKey>,
}

impl<'r> Default for Scanner<'r> {
    fn default() -> Self {
        Self::new()
    }
}

fn scanner_error<T>(
    context: &'static str,
    context_mark: Mark,
    problem: &'static str,
    problem_mark: Mark,
) -> Result<T, ScannerError> {
    Err(ScannerError::Problem {
        context,
        context_mark,
        problem,
        problem_mark,
    })
}

impl<'r> Scanner<'r> {
    /// Create a scanner without input; it is empty.
    pub fn new() -> Scanner<'r> {
        Self::with_reader(Reader::new(None))
    }

    /// Create a scanner reading from `input`.
    pub fn from_reader(input: &'r mut dyn BufRead) -> Scanner<'r> {
        Self::with_reader(Reader::new(Some(input)))
    }

    fn with_reader(reader: Reader<'r>) -> Scanner<'r> {
        Scanner {
            reader,
            mark: Mark::default(),
            tokens: VecDeque::with_capacity(16),
            tokens_parsed: 0,
            stream_end_produced: false,
            indents: Vec::with_capacity(16),
            flows: Vec::new(),
            simple_key_allowed: true,
            simple_keys: vec![SimpleKey::default()],
        }
    }

    #[cfg(test)]
    pub(crate) fn from_tokens(tokens: Vec<Token>) -> Scanner<'static> {
        let mut scanner = Scanner::new();
        scanner.tokens = tokens.into();
        scanner.stream_end_produced = true;
        scanner
    }

    /// Set the source encoding instead of detecting it from the byte order
    /// mark.
    ///
    /// Has no effect once the encoding is fixed, either by an earlier call or
    /// because scanning has started.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        if self.reader.encoding == Encoding::Any {
            self.reader.encoding = encoding;
        }
    }

    /// The current scan position. Valid even when the scanner is empty.
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// Returns `true` when the input is exhausted and every token was popped.
    pub fn empty(&mut self) -> Result<bool, ScannerError> {
        self.fetch_more_tokens()?;
        Ok(self.tokens.is_empty())
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<&Token, ScannerError> {
        self.fetch_more_tokens()?;
        self.tokens.front().ok_or(ScannerError::Empty)
    }

    /// Consume the next token.
    pub fn pop(&mut self) -> Result<Token, ScannerError> {
        self.fetch_more_tokens()?;
        let token = self.tokens.pop_front().ok_or(ScannerError::Empty)?;
        self.tokens_parsed += 1;
        trace!(token = %token, "scanned");
        Ok(token)
    }

    fn in_flow(&self) -> bool {
        !self.flows.is_empty()
    }

    fn indent(&self) -> i64 {
        self.indents.last().map_or(-1, |indent| indent.column)
    }

    fn cache(&mut self, length: usize) -> Result<(), ReaderError> {
        self.reader.cache(length)
    }

    fn ch(&self) -> Option<char> {
        self.reader.get(0)
    }

    fn ch_at(&self, index: usize) -> Option<char> {
        self.reader.get(index)
    }

    fn check(&self, ch: char) -> bool {
        self.reader.check(ch)
    }

    fn at_block_entry(&self) -> bool {
        self.check('-') && is_blankz(self.ch_at(1))
    }

    /// `---` or `...` at the start of a line.
    fn at_document_indicator(&self) -> bool {
        self.mark.column == 0
            && (self.reader.starts_with(&['-', '-', '-'])
                || self.reader.starts_with(&['.', '.', '.']))
            && is_blankz(self.ch_at(3))
    }

    fn skip(&mut self) {
        if let Some(ch) = self.reader.buffer.pop_front() {
            self.mark.index += ch.len_utf8() as u64;
            self.mark.column += 1;
        }
    }

    fn skip_line(&mut self) {
        if self.reader.starts_with(&['\r', '\n']) {
            self.reader.buffer.drain(0..2);
            self.mark.index += 2;
            self.mark.column = 0;
            self.mark.line += 1;
        } else if let Some(ch) = self.ch().filter(|ch| is_break(*ch)) {
            self.reader.buffer.pop_front();
            self.mark.index += ch.len_utf8() as u64;
            self.mark.column = 0;
            self.mark.line += 1;
        }
    }

    fn read(&mut self, string: &mut String) {
        if let Some(ch) = self.reader.buffer.pop_front() {
            string.push(ch);
            self.mark.index += ch.len_utf8() as u64;
            self.mark.column += 1;
        }
    }

    fn read_line(&mut self, string: &mut String) {
        if self.reader.starts_with(&['\r', '\n']) {
            string.push('\n');
            self.reader.buffer.drain(0..2);
            self.mark.index += 2;
            self.mark.column = 0;
            self.mark.line += 1;
        } else if let Some(ch) = self.ch().filter(|ch| is_break(*ch)) {
            self.reader.buffer.pop_front();
            // Line and paragraph separators survive; other breaks become LF.
            if matches!(ch, '\u{2028}' | '\u{2029}') {
                string.push(ch);
            } else {
                string.push('\n');
            }
            self.mark.index += ch.len_utf8() as u64;
            self.mark.column = 0;
            self.mark.line += 1;
        }
    }

    fn fetch_more_tokens(&mut self) -> Result<(), ScannerError> {
        loop {
            let need_more_tokens = if self.tokens.is_empty() {
                !self.stream_end_produced
            } else {
                self.stale_simple_keys()?;
                self.simple_keys
                    .iter()
                    .any(|key| key.possible && key.token_number == self.tokens_parsed)
            };
            if !need_more_tokens {
                return Ok(());
            }
            self.fetch_next_token()?;
        }
    }

    fn fetch_next_token(&mut self) -> Result<(), ScannerError> {
        self.scan_to_next_token()?;
        self.stale_simple_keys()?;
        self.cache(4)?;
        self.unroll_indent(self.mark.column as i64);

        let Some(ch) = self.ch() else {
            return self.fetch_stream_end();
        };

        if self.mark.column == 0 && ch == '%' {
            return self.fetch_directive();
        }
        if self.at_document_indicator() {
            let kind = if ch == '-' {
                TokenKind::DocumentStart
            } else {
                TokenKind::DocumentEnd
            };
            return self.fetch_document_indicator(kind);
        }

        let next_is_blankz = is_blankz(self.ch_at(1));
        match ch {
            '[' => return self.fetch_flow_collection_start(FlowKind::Sequence),
            '{' => return self.fetch_flow_collection_start(FlowKind::Mapping),
            ']' => return self.fetch_flow_collection_end(FlowKind::Sequence),
            '}' => return self.fetch_flow_collection_end(FlowKind::Mapping),
            ',' => return self.fetch_flow_entry(),
            '-' if next_is_blankz => return self.fetch_block_entry(),
            '?' if self.in_flow() || next_is_blankz => return self.fetch_key(),
            ':' if self.in_flow() || next_is_blankz => return self.fetch_value(),
            '*' => return self.fetch_anchor(TokenKind::Alias),
            '&' => return self.fetch_anchor(TokenKind::Anchor),
            '!' => return self.fetch_tag(),
            '|' if !self.in_flow() => return self.fetch_block_scalar(true),
            '>' if !self.in_flow() => return self.fetch_block_scalar(false),
            '\'' => return self.fetch_flow_scalar(true),
            '"' => return self.fetch_flow_scalar(false),
            _ => {}
        }

        let indicator = is_blankz(ch)
            || matches!(
                ch,
                '-' | '?'
                    | ':'
                    | ','
                    | '['
                    | ']'
                    | '{'
                    | '}'
                    | '#'
                    | '&'
                    | '*'
                    | '!'
                    | '|'
                    | '>'
                    | '\''
                    | '"'
                    | '%'
                    | '@'
                    | '`'
            );
        if !indicator
            || ch == '-' && !is_blank(self.ch_at(1))
            || !self.in_flow() && (ch == '?' || ch == ':') && !next_is_blankz
        {
            return self.fetch_plain_scalar();
        }

        scanner_error(
            "while scanning for the next token",
            self.mark,
            "found character that cannot start any token",
            self.mark,
        )
    }

    fn stale_simple_keys(&mut self) -> Result<(), ScannerError> {
        let mark = self.mark;
        for simple_key in &mut self.simple_keys {
            if simple_key.possible
                && (simple_key.mark.line < mark.line
                    || simple_key.mark.index + MAX_SIMPLE_KEY_LENGTH < mark.index)
            {
                if simple_key.required {
                    return scanner_error(
                        "while scanning a simple key",
                        simple_key.mark,
                        "could not find expected ':'",
                        mark,
                    );
                }
                simple_key.possible = false;
            }
        }
        Ok(())
    }

    fn save_simple_key(&mut self) -> Result<(), ScannerError> {
        if !self.simple_key_allowed {
            return Ok(());
        }
        let simple_key = SimpleKey {
            possible: true,
            required: !self.in_flow() && self.indent() == self.mark.column as i64,
            token_number: self.tokens_parsed + self.tokens.len(),
            mark: self.mark,
        };
        self.remove_simple_key()?;
        if let Some(last) = self.simple_keys.last_mut() {
            *last = simple_key;
        }
        Ok(())
    }

    fn remove_simple_key(&mut self) -> Result<(), ScannerError> {
        let mark = self.mark;
        if let Some(simple_key) = self.simple_keys.last_mut() {
            if simple_key.possible && simple_key.required {
                return scanner_error(
                    "while scanning a simple key",
                    simple_key.mark,
                    "could not find expected ':'",
                    mark,
                );
            }
            simple_key.possible = false;
        }
        Ok(())
    }

    /// Inside a flow mapping, a pending simple key at `,` or `}` is an entry
    /// without a value: `{a, b: c}`.
    fn complete_solo_flow_key(&mut self) {
        if !matches!(self.flows.last(), Some((FlowKind::Mapping, _))) {
            return;
        }
        let Some(simple_key) = self.simple_keys.last_mut() else {
            return;
        };
        if !simple_key.possible {
            return;
        }
        simple_key.possible = false;
        let (token_number, mark) = (simple_key.token_number, simple_key.mark);
        self.tokens.insert(
            token_number - self.tokens_parsed,
            Token::new(TokenKind::Key, mark),
        );
        self.tokens.push_back(Token::new(TokenKind::Value, self.mark));
    }

    fn increase_flow_level(&mut self, kind: FlowKind) {
        self.simple_keys.push(SimpleKey::default());
        self.flows.push((kind, self.mark));
    }

    fn decrease_flow_level(&mut self) {
        if self.flows.pop().is_some() {
            self.simple_keys.pop();
        }
    }

    /// Open a block collection at `column` if it is deeper than the current
    /// one. A sequence may also open at the column of its parent mapping.
    fn roll_indent(&mut self, column: i64, kind: IndentKind, number: Option<usize>, mark: Mark) {
        if self.in_flow() {
            return;
        }
        let indentless = kind == IndentKind::Sequence
            && matches!(
                self.indents.last(),
                Some(top) if top.column == column && top.kind == IndentKind::Mapping
            );
        if self.indent() >= column && !indentless {
            return;
        }
        self.indents.push(Indent { column, kind });
        let token_kind = match kind {
            IndentKind::Sequence => TokenKind::BlockSequenceStart,
            IndentKind::Mapping => TokenKind::BlockMappingStart,
        };
        let token = Token::new(token_kind, mark);
        match number {
            Some(number) => self.tokens.insert(number - self.tokens_parsed, token),
            None => self.tokens.push_back(token),
        }
    }

    /// Close every block collection deeper than `column`, and a sequence at
    /// `column` itself unless another entry follows.
    fn unroll_indent(&mut self, column: i64) {
        if self.in_flow() {
            return;
        }
        while let Some(top) = self.indents.last().copied() {
            let closes = top.column > column
                || top.column == column
                    && top.kind == IndentKind::Sequence
                    && !self.at_block_entry();
            if !closes {
                break;
            }
            let kind = match top.kind {
                IndentKind::Sequence => TokenKind::BlockSequenceEnd,
                IndentKind::Mapping => TokenKind::BlockMappingEnd,
            };
            self.tokens.push_back(Token::new(kind, self.mark));
            self.indents.pop();
        }
    }

    fn fetch_stream_end(&mut self) -> Result<(), ScannerError> {
        if let Some(&(_, flow_mark)) = self.flows.last() {
            return scanner_error(
                "while scanning a flow collection",
                flow_mark,
                "found unexpected end of stream",
                self.mark,
            );
        }
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        self.stream_end_produced = true;
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_directive()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_document_indicator(&mut self, kind: TokenKind) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let mark = self.mark;
        self.skip();
        self.skip();
        self.skip();
        self.tokens.push_back(Token::new(kind, mark));
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, kind: FlowKind) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.increase_flow_level(kind);
        self.simple_key_allowed = true;
        let mark = self.mark;
        self.skip();
        let token_kind = match kind {
            FlowKind::Sequence => TokenKind::FlowSequenceStart,
            FlowKind::Mapping => TokenKind::FlowMappingStart,
        };
        self.tokens.push_back(Token::new(token_kind, mark));
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, kind: FlowKind) -> Result<(), ScannerError> {
        self.complete_solo_flow_key();
        self.remove_simple_key()?;
        self.decrease_flow_level();
        self.simple_key_allowed = false;
        let mark = self.mark;
        self.skip();
        let token_kind = match kind {
            FlowKind::Sequence => TokenKind::FlowSequenceEnd,
            FlowKind::Mapping => TokenKind::FlowMappingEnd,
        };
        self.tokens.push_back(Token::new(token_kind, mark));
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<(), ScannerError> {
        self.complete_solo_flow_key();
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let mark = self.mark;
        self.skip();
        self.tokens.push_back(Token::new(TokenKind::FlowEntry, mark));
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<(), ScannerError> {
        if !self.in_flow() {
            if !self.simple_key_allowed {
                return scanner_error(
                    "while scanning a block entry",
                    self.mark,
                    "block sequence entries are not allowed in this context",
                    self.mark,
                );
            }
            self.roll_indent(
                self.mark.column as i64,
                IndentKind::Sequence,
                None,
                self.mark,
            );
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let mark = self.mark;
        self.skip();
        self.tokens.push_back(Token::new(TokenKind::BlockEntry, mark));
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<(), ScannerError> {
        if !self.in_flow() {
            if !self.simple_key_allowed {
                return scanner_error(
                    "while scanning a mapping key",
                    self.mark,
                    "mapping keys are not allowed in this context",
                    self.mark,
                );
            }
            self.roll_indent(
                self.mark.column as i64,
                IndentKind::Mapping,
                None,
                self.mark,
            );
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = !self.in_flow();
        let mark = self.mark;
        self.skip();
        self.tokens.push_back(Token::new(TokenKind::Key, mark));
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<(), ScannerError> {
        let simple_key = self.simple_keys.last().copied().unwrap_or_default();
        if simple_key.possible {
            self.tokens.insert(
                simple_key.token_number - self.tokens_parsed,
                Token::new(TokenKind::Key, simple_key.mark),
            );
            self.roll_indent(
                simple_key.mark.column as i64,
                IndentKind::Mapping,
                Some(simple_key.token_number),
                simple_key.mark,
            );
            if let Some(last) = self.simple_keys.last_mut() {
                last.possible = false;
            }
            self.simple_key_allowed = false;
        } else {
            if !self.in_flow() {
                if !self.simple_key_allowed {
                    return scanner_error(
                        "while scanning a mapping value",
                        self.mark,
                        "mapping values are not allowed in this context",
                        self.mark,
                    );
                }
                self.roll_indent(
                    self.mark.column as i64,
                    IndentKind::Mapping,
                    None,
                    self.mark,
                );
            }
            self.simple_key_allowed = !self.in_flow();
        }
        let mark = self.mark;
        self.skip();
        self.tokens.push_back(Token::new(TokenKind::Value, mark));
        Ok(())
    }

    fn fetch_anchor(&mut self, kind: TokenKind) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_anchor(kind)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, literal: bool) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let token = self.scan_block_scalar(literal)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, single: bool) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_flow_scalar(single)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain_scalar(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_plain_scalar()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn scan_to_next_token(&mut self) -> Result<(), ScannerError> {
        loop {
            self.cache(1)?;
            if self.mark.column == 0 && is_bom(self.ch()) {
                self.skip();
                self.cache(1)?;
            }
            while self.check(' ')
                || (self.in_flow() || !self.simple_key_allowed) && self.check('\t')
            {
                self.skip();
                self.cache(1)?;
            }
            if self.check('#') {
                while !is_breakz(self.ch()) {
                    self.skip();
                    self.cache(1)?;
                }
            }
            if !is_break(self.ch()) {
                return Ok(());
            }
            self.cache(2)?;
            self.skip_line();
            if !self.in_flow() {
                self.simple_key_allowed = true;
            }
        }
    }

    /// Scan a `%NAME param...` line. Arguments are kept as raw words; their
    /// meaning is up to the parser.
    fn scan_directive(&mut self) -> Result<Token, ScannerError> {
        let start_mark = self.mark;
        self.skip();
        let name = self.scan_directive_word()?;
        if name.is_empty() {
            return scanner_error(
                "while scanning a directive",
                start_mark,
                "could not find expected directive name",
                self.mark,
            );
        }
        let mut token = Token::with_value(TokenKind::Directive, start_mark, name);

        loop {
            self.cache(1)?;
            while is_blank(self.ch()) {
                self.skip();
                self.cache(1)?;
            }
            if self.check('#') || is_breakz(self.ch()) {
                break;
            }
            let param = self.scan_directive_word()?;
            token.params.push(param);
        }

        if self.check('#') {
            while !is_breakz(self.ch()) {
                self.skip();
                self.cache(1)?;
            }
        }
        if is_break(self.ch()) {
            self.cache(2)?;
            self.skip_line();
        }
        debug!(directive = %token, "scanned directive");
        Ok(token)
    }

    fn scan_directive_word(&mut self) -> Result<String, ScannerError> {
        let mut string = String::new();
        self.cache(1)?;
        while !is_blankz(self.ch()) {
            self.read(&mut string);
            self.cache(1)?;
        }
        Ok(string)
    }

    fn scan_anchor(&mut self, kind: TokenKind) -> Result<Token, ScannerError> {
        let start_mark = self.mark;
        self.skip();
        self.cache(1)?;

        let mut value = String::new();
        while !is_blankz(self.ch()) && !is_flow_indicator(self.ch()) {
            self.read(&mut value);
            self.cache(1)?;
        }
        if value.is_empty() {
            return scanner_error(
                if kind == TokenKind::Alias {
                    "while scanning an alias"
                } else {
                    "while scanning an anchor"
                },
                start_mark,
                "did not find expected anchor name",
                self.mark,
            );
        }
        Ok(Token::with_value(kind, start_mark, value))
    }

    fn scan_tag(&mut self) -> Result<Token, ScannerError> {
        let start_mark = self.mark;
        let mut token = Token::new(TokenKind::Tag, start_mark);
        self.cache(2)?;

        if self.reader.check_at('<', 1) {
            self.skip();
            self.skip();
            token.value = self.scan_tag_uri(true, start_mark)?;
            if token.value.is_empty() {
                return scanner_error(
                    "while scanning a tag",
                    start_mark,
                    "did not find expected tag URI",
                    self.mark,
                );
            }
            if !self.check('>') {
                return scanner_error(
                    "while scanning a tag",
                    start_mark,
                    "did not find the expected '>'",
                    self.mark,
                );
            }
            self.skip();
            token.tag_kind = Some(TagKind::Verbatim);
        } else if self.reader.check_at('!', 1) {
            self.skip();
            self.skip();
            token.value = self.scan_tag_uri(false, start_mark)?;
            if token.value.is_empty() {
                return scanner_error(
                    "while scanning a tag",
                    start_mark,
                    "did not find expected tag URI",
                    self.mark,
                );
            }
            token.tag_kind = Some(TagKind::SecondaryHandle);
        } else {
            self.skip();
            let mut name = String::new();
            self.cache(1)?;
            while is_alpha(self.ch()) {
                self.read(&mut name);
                self.cache(1)?;
            }
            if !name.is_empty() && self.check('!') {
                self.skip();
                let suffix = self.scan_tag_uri(false, start_mark)?;
                if suffix.is_empty() {
                    return scanner_error(
                        "while scanning a tag",
                        start_mark,
                        "did not find expected tag URI",
                        self.mark,
                    );
                }
                token.value = name;
                token.params.push(suffix);
                token.tag_kind = Some(TagKind::NamedHandle);
            } else {
                let rest = self.scan_tag_uri(false, start_mark)?;
                name.push_str(&rest);
                token.tag_kind = Some(if name.is_empty() {
                    TagKind::NonSpecific
                } else {
                    TagKind::PrimaryHandle
                });
                token.value = name;
            }
        }

        self.cache(1)?;
        if !is_blankz(self.ch()) && !(self.in_flow() && is_flow_indicator(self.ch())) {
            return scanner_error(
                "while scanning a tag",
                start_mark,
                "did not find expected whitespace or line break",
                self.mark,
            );
        }
        Ok(token)
    }

    fn scan_tag_uri(&mut self, verbatim: bool, start_mark: Mark) -> Result<String, ScannerError> {
        let mut string = String::new();
        self.cache(1)?;
        while is_uri_char(self.ch()) || verbatim && matches!(self.ch(), Some(',' | '[' | ']')) {
            if self.check('%') {
                self.scan_uri_escapes(start_mark, &mut string)?;
            } else {
                self.read(&mut string);
            }
            self.cache(1)?;
        }
        Ok(string)
    }

    fn scan_uri_escapes(&mut self, start_mark: Mark, string: &mut String) -> Result<(), ScannerError> {
        let mut octets = Vec::with_capacity(4);
        let mut width = 0;
        loop {
            self.cache(3)?;
            if !(self.check('%') && is_hex(self.ch_at(1)) && is_hex(self.ch_at(2))) {
                return scanner_error(
                    "while parsing a tag",
                    start_mark,
                    "did not find URI escaped octet",
                    self.mark,
                );
            }
            let high = self.ch_at(1).map_or(0, as_hex);
            let low = self.ch_at(2).map_or(0, as_hex);
            let octet = (high << 4 | low) as u8;
            if width == 0 {
                width = utf8_char_width(octet);
                if width == 0 {
                    return scanner_error(
                        "while parsing a tag",
                        start_mark,
                        "found an incorrect leading UTF-8 octet",
                        self.mark,
                    );
                }
            } else if octet & 0xC0 != 0x80 {
                return scanner_error(
                    "while parsing a tag",
                    start_mark,
                    "found an incorrect trailing UTF-8 octet",
                    self.mark,
                );
            }
            octets.push(octet);
            self.skip();
            self.skip();
            self.skip();
            if octets.len() == width {
                break;
            }
        }
        match String::from_utf8(octets) {
            Ok(decoded) => {
                string.push_str(&decoded);
                Ok(())
            }
            Err(_) => scanner_error(
                "while parsing a tag",
                start_mark,
                "found an invalid UTF-8 sequence",
                self.mark,
            ),
        }
    }

    fn scan_block_scalar(&mut self, literal: bool) -> Result<Token, ScannerError> {
        let start_mark = self.mark;
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut chomping = Chomping::Clip;
        let mut increment: i64 = 0;
        let mut indent: i64 = 0;
        let mut leading_blank = false;

        self.skip();
        self.cache(1)?;

        // The chomping and indentation indicators may come in either order.
        for _ in 0..2 {
            if self.check('+') || self.check('-') {
                if chomping != Chomping::Clip {
                    break;
                }
                chomping = if self.check('+') {
                    Chomping::Keep
                } else {
                    Chomping::Strip
                };
                self.skip();
            } else if is_digit(self.ch()) {
                if increment != 0 {
                    break;
                }
                if self.check('0') {
                    return scanner_error(
                        "while scanning a block scalar",
                        start_mark,
                        "found an indentation indicator equal to 0",
                        self.mark,
                    );
                }
                increment = self.ch().map_or(0, as_digit) as i64;
                self.skip();
            }
            self.cache(1)?;
        }

        while is_blank(self.ch()) {
            self.skip();
            self.cache(1)?;
        }
        if self.check('#') {
            while !is_breakz(self.ch()) {
                self.skip();
                self.cache(1)?;
            }
        }
        if !is_breakz(self.ch()) {
            return scanner_error(
                "while scanning a block scalar",
                start_mark,
                "did not find expected comment or line break",
                self.mark,
            );
        }
        if is_break(self.ch()) {
            self.cache(2)?;
            self.skip_line();
        }

        if increment != 0 {
            indent = if self.indent() >= 0 {
                self.indent() + increment
            } else {
                increment
            };
        }
        self.scan_block_scalar_breaks(&mut indent, &mut trailing_breaks, start_mark)?;

        self.cache(1)?;
        while self.mark.column as i64 == indent && self.ch().is_some() {
            let trailing_blank = is_blank(self.ch());
            if !literal && leading_break.starts_with('\n') && !leading_blank && !trailing_blank {
                if trailing_breaks.is_empty() {
                    string.push(' ');
                }
                leading_break.clear();
            } else {
                string.push_str(&leading_break);
                leading_break.clear();
            }
            string.push_str(&trailing_breaks);
            trailing_breaks.clear();
            leading_blank = is_blank(self.ch());
            while !is_breakz(self.ch()) {
                self.read(&mut string);
                self.cache(1)?;
            }
            self.cache(2)?;
            self.read_line(&mut leading_break);
            self.scan_block_scalar_breaks(&mut indent, &mut trailing_breaks, start_mark)?;
        }

        if chomping != Chomping::Strip {
            string.push_str(&leading_break);
        }
        if chomping == Chomping::Keep {
            string.push_str(&trailing_breaks);
        }

        Ok(Token::with_value(
            TokenKind::NonPlainScalar,
            start_mark,
            string,
        ))
    }

    fn scan_block_scalar_breaks(
        &mut self,
        indent: &mut i64,
        breaks: &mut String,
        start_mark: Mark,
    ) -> Result<(), ScannerError> {
        let mut max_indent: i64 = 0;
        loop {
            self.cache(1)?;
            while (*indent == 0 || (self.mark.column as i64) < *indent) && is_space(self.ch()) {
                self.skip();
                self.cache(1)?;
            }
            max_indent = max_indent.max(self.mark.column as i64);
            if (*indent == 0 || (self.mark.column as i64) < *indent) && is_tab(self.ch()) {
                return scanner_error(
                    "while scanning a block scalar",
                    start_mark,
                    "found a tab character where an indentation space is expected",
                    self.mark,
                );
            }
            if !is_break(self.ch()) {
                break;
            }
            self.cache(2)?;
            self.read_line(breaks);
        }
        if *indent == 0 {
            *indent = max_indent.max(self.indent() + 1).max(1);
        }
        Ok(())
    }

    fn scan_flow_scalar(&mut self, single: bool) -> Result<Token, ScannerError> {
        let start_mark = self.mark;
        let quote = if single { '\'' } else { '"' };
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();

        self.skip();
        loop {
            self.cache(4)?;
            if self.at_document_indicator() {
                return scanner_error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected document indicator",
                    self.mark,
                );
            }
            if self.ch().is_none() {
                return scanner_error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected end of stream",
                    self.mark,
                );
            }

            self.cache(2)?;
            let mut leading_blanks = false;
            while !is_blankz(self.ch()) {
                if single && self.check('\'') && self.reader.check_at('\'', 1) {
                    string.push('\'');
                    self.skip();
                    self.skip();
                } else if self.check(quote) {
                    break;
                } else if !single && self.check('\\') && is_break(self.ch_at(1)) {
                    self.cache(3)?;
                    self.skip();
                    self.skip_line();
                    leading_blanks = true;
                    break;
                } else if !single && self.check('\\') {
                    self.scan_escape(&mut string, start_mark)?;
                } else {
                    self.read(&mut string);
                }
                self.cache(2)?;
            }

            self.cache(1)?;
            if self.check(quote) {
                break;
            }

            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    if leading_blanks {
                        self.skip();
                    } else {
                        self.read(&mut whitespaces);
                    }
                } else {
                    self.cache(2)?;
                    if leading_blanks {
                        self.read_line(&mut trailing_breaks);
                    } else {
                        whitespaces.clear();
                        self.read_line(&mut leading_break);
                        leading_blanks = true;
                    }
                }
                self.cache(1)?;
            }

            if leading_blanks {
                if leading_break.starts_with('\n') {
                    if trailing_breaks.is_empty() {
                        string.push(' ');
                    } else {
                        string.push_str(&trailing_breaks);
                        trailing_breaks.clear();
                    }
                    leading_break.clear();
                } else {
                    string.push_str(&leading_break);
                    string.push_str(&trailing_breaks);
                    leading_break.clear();
                    trailing_breaks.clear();
                }
            } else {
                string.push_str(&whitespaces);
                whitespaces.clear();
            }
        }

        self.skip();
        Ok(Token::with_value(
            TokenKind::NonPlainScalar,
            start_mark,
            string,
        ))
    }

    /// Decode one backslash escape of a double-quoted scalar.
    fn scan_escape(&mut self, string: &mut String, start_mark: Mark) -> Result<(), ScannerError> {
        let mut code_length = 0;
        match self.ch_at(1) {
            Some('0') => string.push('\0'),
            Some('a') => string.push('\x07'),
            Some('b') => string.push('\x08'),
            Some('t' | '\t') => string.push('\t'),
            Some('n') => string.push('\n'),
            Some('v') => string.push('\x0B'),
            Some('f') => string.push('\x0C'),
            Some('r') => string.push('\r'),
            Some('e') => string.push('\x1B'),
            Some(' ') => string.push(' '),
            Some('"') => string.push('"'),
            Some('/') => string.push('/'),
            Some('\\') => string.push('\\'),
            Some('N') => string.push('\u{0085}'),
            Some('_') => string.push('\u{00a0}'),
            Some('L') => string.push('\u{2028}'),
            Some('P') => string.push('\u{2029}'),
            Some('x') => code_length = 2,
            Some('u') => code_length = 4,
            Some('U') => code_length = 8,
            _ => {
                return scanner_error(
                    "while parsing a quoted scalar",
                    start_mark,
                    "found unknown escape character",
                    self.mark,
                );
            }
        }
        self.skip();
        self.skip();
        if code_length == 0 {
            return Ok(());
        }

        self.cache(code_length)?;
        let mut value: u32 = 0;
        for k in 0..code_length {
            let Some(digit) = self.ch_at(k).filter(|ch| is_hex(*ch)) else {
                return scanner_error(
                    "while parsing a quoted scalar",
                    start_mark,
                    "did not find expected hexdecimal number",
                    self.mark,
                );
            };
            value = (value << 4) + as_hex(digit);
        }
        let Some(ch) = char::from_u32(value) else {
            return scanner_error(
                "while parsing a quoted scalar",
                start_mark,
                "found invalid Unicode character escape code",
                self.mark,
            );
        };
        string.push(ch);
        for _ in 0..code_length {
            self.skip();
        }
        Ok(())
    }

    fn scan_plain_scalar(&mut self) -> Result<Token, ScannerError> {
        let start_mark = self.mark;
        let indent = self.indent() + 1;
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;

        loop {
            self.cache(4)?;
            if self.at_document_indicator() || self.check('#') {
                break;
            }
            while !is_blankz(self.ch()) {
                if self.in_flow()
                    && self.check(':')
                    && matches!(self.ch_at(1), Some(',' | '?' | '[' | ']' | '{' | '}'))
                {
                    return scanner_error(
                        "while scanning a plain scalar",
                        start_mark,
                        "found unexpected ':'",
                        self.mark,
                    );
                }
                if self.check(':') && is_blankz(self.ch_at(1))
                    || self.in_flow() && is_flow_indicator(self.ch())
                {
                    break;
                }
                if leading_blanks || !whitespaces.is_empty() {
                    if leading_blanks {
                        if leading_break.starts_with('\n') {
                            if trailing_breaks.is_empty() {
                                string.push(' ');
                            } else {
                                string.push_str(&trailing_breaks);
                                trailing_breaks.clear();
                            }
                            leading_break.clear();
                        } else {
                            string.push_str(&leading_break);
                            string.push_str(&trailing_breaks);
                            leading_break.clear();
                            trailing_breaks.clear();
                        }
                        leading_blanks = false;
                    } else {
                        string.push_str(&whitespaces);
                        whitespaces.clear();
                    }
                }
                self.read(&mut string);
                self.cache(2)?;
            }
            if !(is_blank(self.ch()) || is_break(self.ch())) {
                break;
            }
            self.cache(1)?;

            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    if leading_blanks && (self.mark.column as i64) < indent && is_tab(self.ch()) {
                        return scanner_error(
                            "while scanning a plain scalar",
                            start_mark,
                            "found a tab character that violates indentation",
                            self.mark,
                        );
                    }
                    if leading_blanks {
                        self.skip();
                    } else {
                        self.read(&mut whitespaces);
                    }
                } else {
                    self.cache(2)?;
                    if leading_blanks {
                        self.read_line(&mut trailing_breaks);
                    } else {
                        whitespaces.clear();
                        self.read_line(&mut leading_break);
                        leading_blanks = true;
                    }
                }
                self.cache(1)?;
            }
            if !self.in_flow() && (self.mark.column as i64) < indent {
                break;
            }
        }

        if leading_blanks {
            self.simple_key_allowed = true;
        }
        Ok(Token::with_value(TokenKind::PlainScalar, start_mark, string))
    }
}

/// Iterating a scanner yields every remaining token. The iteration ends after
/// the first error.
impl<'r> Iterator for Scanner<'r> {
    type Item = Result<Token, ScannerError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.empty() {
            Ok(true) => None,
            Ok(false) => Some(self.pop()),
            Err(err) => {
                self.tokens.clear();
                self.stream_end_produced = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use TokenKind::*;

    fn scan(input: &str) -> Result<Vec<Token>, ScannerError> {
        let mut bytes = input.as_bytes();
        Scanner::from_reader(&mut bytes).collect()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        scan(input)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn values(input: &str) -> Vec<String> {
        scan(input)
            .unwrap()
            .into_iter()
            .filter(|token| matches!(token.kind, PlainScalar | NonPlainScalar))
            .map(|token| token.value)
            .collect()
    }

    #[test]
    fn empty_input() {
        assert_eq!(kinds(""), Vec::<TokenKind>::new());
        assert_eq!(kinds("  \n# only a comment\n"), Vec::<TokenKind>::new());
        let mut scanner = Scanner::new();
        assert!(scanner.empty().unwrap());
        assert!(matches!(scanner.peek(), Err(ScannerError::Empty)));
        assert!(matches!(scanner.pop(), Err(ScannerError::Empty)));
    }

    #[test]
    fn block_mapping() {
        assert_eq!(
            kinds("a: b\nc: d"),
            vec![
                BlockMappingStart,
                Key,
                PlainScalar,
                Value,
                PlainScalar,
                Key,
                PlainScalar,
                Value,
                PlainScalar,
                BlockMappingEnd,
            ]
        );
    }

    #[test]
    fn block_sequence_with_empty_entry() {
        assert_eq!(
            kinds("- a\n- \n- c"),
            vec![
                BlockSequenceStart,
                BlockEntry,
                PlainScalar,
                BlockEntry,
                BlockEntry,
                PlainScalar,
                BlockSequenceEnd,
            ]
        );
    }

    #[test]
    fn indentless_sequence_in_mapping() {
        assert_eq!(
            kinds("a:\n- b\n- c\nd: e\n"),
            vec![
                BlockMappingStart,
                Key,
                PlainScalar,
                Value,
                BlockSequenceStart,
                BlockEntry,
                PlainScalar,
                BlockEntry,
                PlainScalar,
                BlockSequenceEnd,
                Key,
                PlainScalar,
                Value,
                PlainScalar,
                BlockMappingEnd,
            ]
        );
    }

    #[test]
    fn nested_dedent_emits_every_end() {
        assert_eq!(
            kinds("a:\n  - b:\n      c\nd: e"),
            vec![
                BlockMappingStart,
                Key,
                PlainScalar,
                Value,
                BlockSequenceStart,
                BlockEntry,
                BlockMappingStart,
                Key,
                PlainScalar,
                Value,
                PlainScalar,
                BlockMappingEnd,
                BlockSequenceEnd,
                Key,
                PlainScalar,
                Value,
                PlainScalar,
                BlockMappingEnd,
            ]
        );
    }

    #[test]
    fn flow_collections() {
        assert_eq!(
            kinds("[1, 2, 3]"),
            vec![
                FlowSequenceStart,
                PlainScalar,
                FlowEntry,
                PlainScalar,
                FlowEntry,
                PlainScalar,
                FlowSequenceEnd,
            ]
        );
        assert_eq!(
            kinds("[ a: b, c ]"),
            vec![
                FlowSequenceStart,
                Key,
                PlainScalar,
                Value,
                PlainScalar,
                FlowEntry,
                PlainScalar,
                FlowSequenceEnd,
            ]
        );
    }

    #[test]
    fn solo_flow_mapping_entries() {
        assert_eq!(
            kinds("{a, b: c}"),
            vec![
                FlowMappingStart,
                Key,
                PlainScalar,
                Value,
                FlowEntry,
                Key,
                PlainScalar,
                Value,
                PlainScalar,
                FlowMappingEnd,
            ]
        );
        assert_eq!(
            kinds("{a}"),
            vec![FlowMappingStart, Key, PlainScalar, Value, FlowMappingEnd]
        );
    }

    #[test]
    fn directives_and_documents() {
        let tokens = scan("%YAML 1.2\n%TAG !e! tag:example.com,2000: # comment\n--- a\n...\n")
            .unwrap();
        let kinds: Vec<_> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            vec![Directive, Directive, DocumentStart, PlainScalar, DocumentEnd]
        );
        assert_eq!(tokens[0].value, "YAML");
        assert_eq!(tokens[0].params, vec!["1.2"]);
        assert_eq!(tokens[1].value, "TAG");
        assert_eq!(tokens[1].params, vec!["!e!", "tag:example.com,2000:"]);
    }

    #[test]
    fn tags() {
        let tokens = scan("- !<tag:x> a\n- !!str b\n- !e!foo c\n- !local d\n- ! e").unwrap();
        let tags: Vec<_> = tokens
            .iter()
            .filter(|token| token.kind == Tag)
            .map(|token| (token.tag_kind, token.value.as_str(), token.params.clone()))
            .collect();
        assert_eq!(
            tags,
            vec![
                (Some(TagKind::Verbatim), "tag:x", vec![]),
                (Some(TagKind::SecondaryHandle), "str", vec![]),
                (Some(TagKind::NamedHandle), "e", vec!["foo".to_owned()]),
                (Some(TagKind::PrimaryHandle), "local", vec![]),
                (Some(TagKind::NonSpecific), "", vec![]),
            ]
        );
    }

    #[test]
    fn tag_uri_escapes() {
        let tokens = scan("!e%C3%A9 x").unwrap();
        assert_eq!(tokens[0].value, "e\u{e9}");
        assert!(scan("!e%C3 x").is_err());
    }

    #[test]
    fn anchors_and_aliases() {
        let tokens = scan("a: &x 1\nb: *x").unwrap();
        let named: Vec<_> = tokens
            .iter()
            .filter(|token| matches!(token.kind, Anchor | Alias))
            .map(|token| (token.kind, token.value.as_str()))
            .collect();
        assert_eq!(named, vec![(Anchor, "x"), (Alias, "x")]);
    }

    #[test]
    fn scalar_styles() {
        assert_eq!(
            values("- 'it''s'\n- \"tab\\there \\u263A\"\n- |\n  line one\n  line two\n- >-\n  folded\n  text\n- plain\n  continued"),
            vec![
                "it's",
                "tab\there \u{263A}",
                "line one\nline two\n",
                "folded text",
                "plain continued",
            ]
        );
    }

    #[test]
    fn block_scalar_keep_chomping_and_indent_indicator() {
        assert_eq!(values("key: |+2\n   x\n\n"), vec!["key", " x\n\n"]);
    }

    #[test]
    fn marks_point_at_token_starts() {
        let tokens = scan("b:\n  c").unwrap();
        let key = tokens.iter().find(|token| token.kind == Key).unwrap();
        assert_eq!((key.mark.line, key.mark.column), (0, 0));
        let c = tokens.last().unwrap();
        assert_eq!(c.kind, BlockMappingEnd);
        let c = &tokens[tokens.len() - 2];
        assert_eq!((c.mark.index, c.mark.line, c.mark.column), (5, 1, 2));
    }

    #[test]
    fn lexical_errors_carry_marks() {
        match scan("[1, 2").unwrap_err() {
            ScannerError::Problem {
                problem,
                context_mark,
                ..
            } => {
                assert_eq!(problem, "found unexpected end of stream");
                assert_eq!(context_mark.column, 0);
            }
            err => panic!("unexpected error {err:?}"),
        }

        assert!(matches!(
            scan("a: b\n`c"),
            Err(ScannerError::Problem {
                problem: "found character that cannot start any token",
                ..
            })
        ));
        assert!(matches!(
            scan("\"open"),
            Err(ScannerError::Problem {
                problem: "found unexpected end of stream",
                ..
            })
        ));
        assert!(matches!(
            scan("a: b: c"),
            Err(ScannerError::Problem {
                problem: "mapping values are not allowed in this context",
                ..
            })
        ));
    }

    #[test]
    fn encoding_is_fixed_once() {
        let mut input: &[u8] = b"a\x00";
        let mut scanner = Scanner::from_reader(&mut input);
        scanner.set_encoding(Encoding::Utf16Le);
        scanner.set_encoding(Encoding::Utf8);
        let tokens: Vec<Token> = scanner.collect::<Result<_, _>>().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, "a");

        let mut input = "- a\n- b".as_bytes();
        let mut scanner = Scanner::from_reader(&mut input);
        assert_eq!(scanner.pop().unwrap().kind, BlockSequenceStart);
        scanner.set_encoding(Encoding::Utf16Be);
        let values: Vec<String> = scanner
            .map(|token| token.unwrap().value)
            .filter(|value| !value.is_empty())
            .collect();
        assert_eq!(values, ["a", "b"]);
    }

    #[test]
    fn lazy_scanning_stops_at_resolved_token() {
        let mut input = "- a\n- [b".as_bytes();
        let mut scanner = Scanner::from_reader(&mut input);
        assert_eq!(scanner.pop().unwrap().kind, BlockSequenceStart);
        assert_eq!(scanner.pop().unwrap().kind, BlockEntry);
        assert_eq!(scanner.peek().unwrap().value, "a");
        assert_eq!(scanner.mark().line, 1);
        scanner.pop().unwrap();
        assert_eq!(scanner.pop().unwrap().kind, BlockEntry);
        assert!(scanner.peek().is_err());
    }
}
