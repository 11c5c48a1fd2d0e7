use std::collections::HashMap;

/// The default expansion of the `!!` handle.
pub const DEFAULT_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// The YAML version a document declares.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Version {
    /// `true` until a `%YAML` directive sets the version.
    pub is_default: bool,
    pub major: i32,
    pub minor: i32,
}

impl Default for Version {
    fn default() -> Self {
        Version {
            is_default: true,
            major: 1,
            minor: 2,
        }
    }
}

/// The directives in effect for a document.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Directives {
    pub version: Version,
    /// Tag handle to prefix, as declared by `%TAG`.
    pub tags: HashMap<String, String>,
}

impl Directives {
    pub fn new() -> Directives {
        Directives::default()
    }

    /// Expand a tag handle (`!`, `!!` or `!name!`) to its prefix.
    ///
    /// Declared handles win. `!!` falls back to [`DEFAULT_TAG_PREFIX`]; any
    /// other undeclared handle expands to itself.
    pub fn translate_tag_handle<'a>(&'a self, handle: &'a str) -> &'a str {
        if let Some(prefix) = self.tags.get(handle) {
            return prefix;
        }
        if handle == "!!" {
            DEFAULT_TAG_PREFIX
        } else {
            handle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_version() {
        let directives = Directives::new();
        assert!(directives.version.is_default);
        assert_eq!((directives.version.major, directives.version.minor), (1, 2));
    }

    #[test]
    fn handle_translation() {
        let mut directives = Directives::new();
        assert_eq!(directives.translate_tag_handle("!!"), DEFAULT_TAG_PREFIX);
        assert_eq!(directives.translate_tag_handle("!"), "!");
        assert_eq!(directives.translate_tag_handle("!e!"), "!e!");

        directives
            .tags
            .insert("!!".to_owned(), "tag:example.com,2000:".to_owned());
        directives
            .tags
            .insert("!e!".to_owned(), "tag:e.org:".to_owned());
        assert_eq!(directives.translate_tag_handle("!!"), "tag:example.com,2000:");
        assert_eq!(directives.translate_tag_handle("!e!"), "tag:e.org:");
    }
}
