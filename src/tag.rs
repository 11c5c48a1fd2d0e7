use crate::{Directives, ParserError, Token, TokenKind};

/// The written form of a node tag.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum TagKind {
    /// `!<uri>`, used as written.
    Verbatim,
    /// `!suffix`
    PrimaryHandle,
    /// `!!suffix`
    SecondaryHandle,
    /// `!name!suffix`
    NamedHandle,
    /// A lone `!`.
    NonSpecific,
}

/// A node tag as written, before handle expansion.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Tag {
    pub kind: TagKind,
    /// The handle name of a [`TagKind::NamedHandle`] tag, without the `!`s.
    pub handle: String,
    pub value: String,
}

impl Tag {
    pub fn from_token(token: &Token) -> Result<Tag, ParserError> {
        let kind = match (token.kind, token.tag_kind) {
            (TokenKind::Tag, Some(kind)) => kind,
            _ => {
                return Err(ParserError::Internal {
                    problem: "tag token without a tag kind",
                })
            }
        };
        let (handle, value) = match kind {
            TagKind::Verbatim | TagKind::PrimaryHandle | TagKind::SecondaryHandle => {
                (String::new(), token.value.clone())
            }
            TagKind::NamedHandle => {
                let Some(suffix) = token.params.first() else {
                    return Err(ParserError::Internal {
                        problem: "named tag token without a suffix",
                    });
                };
                (token.value.clone(), suffix.clone())
            }
            TagKind::NonSpecific => (String::new(), String::new()),
        };
        Ok(Tag {
            kind,
            handle,
            value,
        })
    }

    /// The full tag, with its handle expanded by `directives`.
    pub fn translate(&self, directives: &Directives) -> String {
        match self.kind {
            TagKind::Verbatim => self.value.clone(),
            TagKind::PrimaryHandle => {
                format!("{}{}", directives.translate_tag_handle("!"), self.value)
            }
            TagKind::SecondaryHandle => {
                format!("{}{}", directives.translate_tag_handle("!!"), self.value)
            }
            TagKind::NamedHandle => {
                let handle = format!("!{}!", self.handle);
                format!("{}{}", directives.translate_tag_handle(&handle), self.value)
            }
            TagKind::NonSpecific => "!".to_owned(),
        }
    }
}
