#[cfg(feature = "tracing")]
macro_rules! trace {
    ($($arg:tt)*) => { ::tracing::trace!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

pub(crate) fn is_alpha(ch: impl Into<Option<char>>) -> bool {
    let Some(ch) = ch.into() else {
        return false;
    };
    ch >= '0' && ch <= '9'
        || ch >= 'A' && ch <= 'Z'
        || ch >= 'a' && ch <= 'z'
        || ch == '_'
        || ch == '-'
}

pub(crate) fn is_digit(ch: impl Into<Option<char>>) -> bool {
    ch.into().map_or(false, |ch| ch.is_ascii_digit())
}

pub(crate) fn as_digit(ch: char) -> u32 {
    ch.to_digit(10).unwrap_or(0)
}

pub(crate) fn is_hex(ch: impl Into<Option<char>>) -> bool {
    ch.into().map_or(false, |ch| ch.is_ascii_hexdigit())
}

pub(crate) fn as_hex(ch: char) -> u32 {
    ch.to_digit(16).unwrap_or(0)
}

pub(crate) fn is_bom(ch: impl Into<Option<char>>) -> bool {
    ch.into() == Some('\u{feff}')
}

pub(crate) fn is_space(ch: impl Into<Option<char>>) -> bool {
    ch.into() == Some(' ')
}

pub(crate) fn is_tab(ch: impl Into<Option<char>>) -> bool {
    ch.into() == Some('\t')
}

pub(crate) fn is_blank(ch: impl Into<Option<char>>) -> bool {
    let ch = ch.into();
    is_space(ch) || is_tab(ch)
}

pub(crate) fn is_break(ch: impl Into<Option<char>>) -> bool {
    matches!(
        ch.into(),
        Some('\r' | '\n' | '\u{0085}' | '\u{2028}' | '\u{2029}')
    )
}

pub(crate) fn is_breakz(ch: impl Into<Option<char>>) -> bool {
    let ch = ch.into();
    is_break(ch) || ch.is_none()
}

pub(crate) fn is_blankz(ch: impl Into<Option<char>>) -> bool {
    let ch = ch.into();
    is_blank(ch) || is_breakz(ch)
}

/// Flow indicators terminate anchors, aliases and plain scalars inside flow
/// collections.
pub(crate) fn is_flow_indicator(ch: impl Into<Option<char>>) -> bool {
    matches!(ch.into(), Some(',' | '[' | ']' | '{' | '}'))
}

pub(crate) fn is_uri_char(ch: impl Into<Option<char>>) -> bool {
    let ch = ch.into();
    is_alpha(ch)
        || matches!(
            ch,
            Some(
                ';' | '/'
                    | '?'
                    | ':'
                    | '@'
                    | '&'
                    | '='
                    | '+'
                    | '$'
                    | '.'
                    | '%'
                    | '!'
                    | '~'
                    | '*'
                    | '\''
                    | '('
                    | ')'
            )
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_classes() {
        assert!(is_alpha('a') && is_alpha('Z') && is_alpha('7') && is_alpha('-'));
        assert!(!is_alpha('!') && !is_alpha(None));
        assert!(is_blankz(None) && is_blankz(' ') && is_blankz('\t') && is_blankz('\n'));
        assert!(!is_blankz('x'));
        assert!(is_break('\u{2028}') && !is_break(' '));
        assert!(is_breakz(None));
        assert!(is_flow_indicator(']') && !is_flow_indicator(':'));
        assert!(is_uri_char('/') && is_uri_char('%') && !is_uri_char(','));
        assert_eq!(as_hex('f'), 15);
        assert_eq!(as_digit('9'), 9);
    }
}
