use crate::Mark;

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("{problem} (offset {offset}, value {value:#x})")]
    Problem {
        problem: &'static str,
        offset: usize,
        value: i32,
    },
    #[error("invalid byte order mark")]
    InvalidBom,
    #[error("invalid UTF-8 byte {value:#x}")]
    InvalidUtf8 { value: u8 },
    #[error("invalid UTF-16 unpaired surrogate {value:#x}")]
    InvalidUtf16 { value: u16 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("{problem_mark}: {problem} {context} ({context_mark})")]
    Problem {
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        problem_mark: Mark,
    },
    /// A token was requested from a scanner that has none left.
    #[error("no more tokens in the scanner")]
    Empty,
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("{mark}: {problem}")]
    Directive { problem: &'static str, mark: Mark },
    #[error("{mark}: bad YAML version: {value}")]
    InvalidVersion { value: String, mark: Mark },
    #[error("{mark}: {problem}")]
    Problem { problem: &'static str, mark: Mark },
    /// The parser was used in a way it does not support, such as reusing a
    /// document parser after it already handled a document.
    #[error("internal error: {problem}")]
    Internal { problem: &'static str },
    #[error(transparent)]
    Scanner(#[from] ScannerError),
}

/// The broad category of a [`ParserError`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed input text, including bytes that do not decode to an
    /// allowed character.
    Lexical,
    /// A malformed, repeated or unsupported `%YAML` or `%TAG` directive.
    Directive,
    /// Tokens that do not fit the collection grammar.
    Structural,
    /// Misuse of the API rather than malformed input.
    Internal,
    /// The input could not be read.
    Io,
}

impl ParserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParserError::Directive { .. } | ParserError::InvalidVersion { .. } => {
                ErrorKind::Directive
            }
            ParserError::Problem { .. } => ErrorKind::Structural,
            ParserError::Internal { .. } | ParserError::Scanner(ScannerError::Empty) => {
                ErrorKind::Internal
            }
            ParserError::Scanner(ScannerError::Reader(ReaderError::Io(_))) => ErrorKind::Io,
            ParserError::Scanner(ScannerError::Problem { .. } | ScannerError::Reader(_)) => {
                ErrorKind::Lexical
            }
        }
    }

    /// The position that triggered the error, or [`Mark::NULL`] when there is
    /// none.
    pub fn mark(&self) -> Mark {
        match self {
            ParserError::Directive { mark, .. }
            | ParserError::InvalidVersion { mark, .. }
            | ParserError::Problem { mark, .. } => *mark,
            ParserError::Scanner(ScannerError::Problem { problem_mark, .. }) => *problem_mark,
            ParserError::Internal { .. } | ParserError::Scanner(_) => Mark::NULL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_marks() {
        let mark = Mark {
            index: 4,
            line: 1,
            column: 2,
        };
        let err = ParserError::Problem {
            problem: "end of map not found",
            mark,
        };
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(err.mark(), mark);
        assert_eq!(err.to_string(), "line 2 column 3: end of map not found");

        let err = ParserError::Internal {
            problem: "anchor counter is not reset",
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.mark().is_null());

        let err = ParserError::from(ScannerError::Empty);
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err = ParserError::from(ScannerError::from(ReaderError::InvalidBom));
        assert_eq!(err.kind(), ErrorKind::Lexical);
        let err = ParserError::from(ScannerError::from(ReaderError::InvalidUtf8 { value: 0xff }));
        assert_eq!(err.kind(), ErrorKind::Lexical);

        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err = ParserError::from(ScannerError::from(ReaderError::from(io)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
