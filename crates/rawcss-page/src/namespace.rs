//! Wiki namespaces
//!
//! Namespaces are numeric on the wiki side. Only the handful RawCSS cares
//! about get canonical names; every other id round-trips as a bare number.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A wiki namespace id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(i32);

impl Namespace {
    /// Main (article) namespace
    pub const MAIN: Self = Self(0);
    /// Interface messages and site configuration
    pub const MEDIAWIKI: Self = Self(8);
    /// Templates, which double as application bases
    pub const TEMPLATE: Self = Self(10);
    /// Style sheet pages
    pub const RAWCSS: Self = Self(6200);
    /// Talk pages of style sheets
    pub const RAWCSS_TALK: Self = Self(6201);

    const NAMED: [(Self, &'static str); 5] = [
        (Self::MAIN, ""),
        (Self::MEDIAWIKI, "MediaWiki"),
        (Self::TEMPLATE, "Template"),
        (Self::RAWCSS, "RawCSS"),
        (Self::RAWCSS_TALK, "RawCSS_talk"),
    ];

    /// Create namespace from raw id
    #[inline]
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// Raw namespace id
    #[inline]
    #[must_use]
    pub const fn id(self) -> i32 {
        self.0
    }

    /// Canonical name, `Some("")` for the main namespace
    #[must_use]
    pub fn canonical_name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(ns, _)| *ns == self)
            .map(|(_, name)| *name)
    }

    /// Look up a namespace by its (case-insensitive) name
    ///
    /// Spaces and underscores are interchangeable. The empty name is not
    /// matched; a bare leading colon is handled by the title parser.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().replace(' ', "_");
        if wanted.is_empty() {
            return None;
        }
        Self::NAMED
            .iter()
            .find(|(_, canonical)| canonical.eq_ignore_ascii_case(&wanted))
            .map(|(ns, _)| *ns)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.canonical_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}
