//! Page titles
//!
//! A [`PageTitle`] is always normalised: underscores become spaces, runs of
//! whitespace collapse, and the first letter is upper-cased. Two titles that
//! the wiki would consider the same page compare equal.

use crate::error::TitleError;
use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

/// Characters that can never appear in a title
const ILLEGAL_CHARACTERS: &[char] = &['#', '<', '>', '[', ']', '|', '{', '}'];

/// Maximum title length in bytes
const MAX_TITLE_BYTES: usize = 255;

/// Normalised page title
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageTitle {
    namespace: Namespace,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interwiki: Option<String>,
}

impl PageTitle {
    /// Create a local title in `namespace`
    ///
    /// # Errors
    /// Returns [`TitleError`] if the normalised text is empty, too long, or
    /// contains characters that cannot appear in a title.
    pub fn new(namespace: Namespace, text: &str) -> Result<Self, TitleError> {
        Ok(Self {
            namespace,
            text: normalise(text)?,
            interwiki: None,
        })
    }

    /// Namespace of this title
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Text without the namespace prefix
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Interwiki prefix for titles hosted on another wiki
    #[inline]
    #[must_use]
    pub fn interwiki(&self) -> Option<&str> {
        self.interwiki.as_deref()
    }

    /// Whether the title points outside this wiki
    #[inline]
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.interwiki.is_some()
    }

    /// Storage key form (`Foo_bar.css`)
    #[must_use]
    pub fn db_key(&self) -> String {
        self.text.replace(' ', "_")
    }

    /// Human-readable form including the namespace (`RawCSS:Foo bar.css`)
    #[must_use]
    pub fn prefixed_text(&self) -> String {
        let local = if self.namespace == Namespace::MAIN {
            self.text.clone()
        } else {
            format!("{}:{}", self.namespace.to_string().replace('_', " "), self.text)
        };
        match &self.interwiki {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local,
        }
    }

    /// Whether `other` names the same local page
    #[inline]
    #[must_use]
    pub fn is_same_page_as(&self, other: &PageTitle) -> bool {
        !self.is_external() && self == other
    }
}

impl Display for PageTitle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefixed_text())
    }
}

/// Parses user-entered page names into [`PageTitle`]s
///
/// Knows the namespace names and the set of interwiki prefixes configured on
/// the wiki. A prefix that is neither stays part of the title text.
#[derive(Debug, Clone, Default)]
pub struct TitleParser {
    interwiki: BTreeSet<String>,
}

impl TitleParser {
    /// Parser without interwiki prefixes
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser recognising the given interwiki prefixes (case-insensitive)
    #[must_use]
    pub fn with_interwiki<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            interwiki: prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Parse `input`, placing it in `default_namespace` unless it carries a
    /// namespace prefix
    ///
    /// # Errors
    /// Returns [`TitleError`] for empty or malformed titles.
    pub fn parse(&self, input: &str, default_namespace: Namespace) -> Result<PageTitle, TitleError> {
        let trimmed = input.trim().replace('_', " ");
        let trimmed = trimmed.trim();

        // a leading colon forces the main namespace
        if let Some(rest) = trimmed.strip_prefix(':') {
            return PageTitle::new(Namespace::MAIN, rest);
        }

        if let Some((prefix, rest)) = trimmed.split_once(':') {
            if let Some(namespace) = Namespace::from_name(prefix) {
                return PageTitle::new(namespace, rest);
            }
            let lowered = prefix.trim().to_ascii_lowercase();
            if self.interwiki.contains(&lowered) {
                let mut title = self.parse(rest, Namespace::MAIN)?;
                title.interwiki = Some(lowered);
                return Ok(title);
            }
        }

        PageTitle::new(default_namespace, trimmed)
    }
}

fn normalise(text: &str) -> Result<String, TitleError> {
    let collapsed = text
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.is_empty() {
        return Err(TitleError::Empty);
    }
    if let Some(character) = collapsed.chars().find(|c| ILLEGAL_CHARACTERS.contains(c)) {
        return Err(TitleError::IllegalCharacter {
            title: collapsed,
            character,
        });
    }
    if collapsed.len() > MAX_TITLE_BYTES {
        return Err(TitleError::TooLong {
            length: collapsed.len(),
        });
    }

    let mut chars = collapsed.chars();
    Ok(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => collapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_namespace_applies_without_prefix() {
        let parser = TitleParser::new();
        let title = parser.parse("main.less", Namespace::RAWCSS).unwrap();
        assert_eq!(title.namespace(), Namespace::RAWCSS);
        assert_eq!(title.text(), "Main.less");
        assert_eq!(title.prefixed_text(), "RawCSS:Main.less");
    }

    #[test]
    fn explicit_prefix_overrides_default() {
        let parser = TitleParser::new();
        let title = parser.parse("Template:Infobox_person", Namespace::RAWCSS).unwrap();
        assert_eq!(title.namespace(), Namespace::TEMPLATE);
        assert_eq!(title.text(), "Infobox person");
        assert_eq!(title.db_key(), "Infobox_person");
    }

    #[test]
    fn leading_colon_forces_main_namespace() {
        let title = TitleParser::new().parse(":Sandbox", Namespace::TEMPLATE).unwrap();
        assert_eq!(title.namespace(), Namespace::MAIN);
        assert_eq!(title.prefixed_text(), "Sandbox");
    }

    #[test]
    fn unknown_prefix_stays_in_text() {
        let title = TitleParser::new().parse("Foo:Bar", Namespace::RAWCSS).unwrap();
        assert_eq!(title.namespace(), Namespace::RAWCSS);
        assert_eq!(title.text(), "Foo:Bar");
    }

    #[test]
    fn interwiki_prefix_marks_external() {
        let parser = TitleParser::with_interwiki(["wikipedia"]);
        let title = parser.parse("Wikipedia:Template:Foo", Namespace::RAWCSS).unwrap();
        assert!(title.is_external());
        assert_eq!(title.namespace(), Namespace::TEMPLATE);
        assert_eq!(title.prefixed_text(), "wikipedia:Template:Foo");
    }

    #[test]
    fn rejects_malformed_titles() {
        let parser = TitleParser::new();
        assert!(matches!(parser.parse("  ", Namespace::MAIN), Err(TitleError::Empty)));
        assert!(matches!(parser.parse("RawCSS:", Namespace::MAIN), Err(TitleError::Empty)));
        assert!(matches!(
            parser.parse("a{b}", Namespace::MAIN),
            Err(TitleError::IllegalCharacter { character: '{', .. })
        ));
        assert!(matches!(
            parser.parse(&"x".repeat(300), Namespace::MAIN),
            Err(TitleError::TooLong { length: 300 })
        ));
    }

    #[test]
    fn external_title_is_never_same_page() {
        let parser = TitleParser::with_interwiki(["meta"]);
        let local = parser.parse("Foo", Namespace::MAIN).unwrap();
        let remote = parser.parse("meta:Foo", Namespace::MAIN).unwrap();
        assert!(!remote.is_same_page_as(&local));
        assert!(local.is_same_page_as(&local.clone()));
    }

    proptest! {
        #[test]
        fn normalisation_is_idempotent(text in "[a-zA-Z0-9 _.-]{1,40}") {
            if let Ok(title) = PageTitle::new(Namespace::RAWCSS, &text) {
                let again = PageTitle::new(Namespace::RAWCSS, title.text()).unwrap();
                prop_assert_eq!(again, title);
            }
        }
    }
}
