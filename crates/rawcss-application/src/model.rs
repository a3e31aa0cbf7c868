//! Canonical application model
//!
//! Both specification dialects produce [`ApplicationSpecification`]s; the
//! resolver turns each into an immutable [`ApplicationBundle`], which is the
//! unit that gets cached and served.

use crate::error::SpecPath;
use indexmap::IndexMap;
use rawcss_compiler::Variables;
use rawcss_page::{PageId, PageTitle, RevisionId};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Reserved variable carrying the application id into every compilation
pub const APPLICATION_ID_VARIABLE: &str = "application-id";

/// Parsed specifications keyed by application
pub type Specifications = IndexMap<ApplicationId, ApplicationSpecification>;

/// Resolved bundles keyed by application
pub type Applications = IndexMap<ApplicationId, ApplicationBundle>;

/// Identifies an application
///
/// The wildcard applies to pages that match no other application. Every
/// other application is keyed by the numeric id of its base page, so renames
/// of the base keep the key stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ApplicationId {
    /// Catch-all application, written `*`, `0` or left empty
    Wildcard,
    /// Application for one base page
    Page(PageId),
}

impl ApplicationId {
    /// Numeric form, `0` for the wildcard
    #[inline]
    #[must_use]
    pub fn number(self) -> u64 {
        match self {
            Self::Wildcard => 0,
            Self::Page(id) => id.0,
        }
    }

    /// Name of the style module that serves this application
    #[must_use]
    pub fn module_name(self) -> String {
        format!("ext.rawcss.{}", self.number())
    }

    /// Whether `key` denotes the wildcard application
    #[must_use]
    pub fn is_wildcard_key(key: &str) -> bool {
        matches!(key.trim(), "" | "*" | "0")
    }
}

impl From<PageId> for ApplicationId {
    fn from(id: PageId) -> Self {
        if id.0 == 0 {
            Self::Wildcard
        } else {
            Self::Page(id)
        }
    }
}

impl Display for ApplicationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str("*"),
            Self::Page(id) => write!(f, "{id}"),
        }
    }
}

/// Error parsing an [`ApplicationId`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid application id \"{0}\"")]
pub struct InvalidApplicationId(pub String);

impl FromStr for ApplicationId {
    type Err = InvalidApplicationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_wildcard_key(s) {
            return Ok(Self::Wildcard);
        }
        s.trim()
            .parse::<u64>()
            .map(|id| Self::from(PageId(id)))
            .map_err(|_| InvalidApplicationId(s.to_string()))
    }
}

impl From<ApplicationId> for String {
    fn from(id: ApplicationId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ApplicationId {
    type Error = InvalidApplicationId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A style page named by a specification, with its variable overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleReference {
    /// Page name as written, resolved against the RawCSS namespace
    pub page: String,
    /// Overrides applied when compiling the page
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: Variables,
}

impl StyleReference {
    /// Reference without variables
    #[must_use]
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            variables: Variables::new(),
        }
    }

    /// Add a variable override
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// A resource the browser should fetch early
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreloadDirective {
    /// Sanitised, validated URL
    pub href: String,
    /// Request destination (`image`, `font`, `style`, ...)
    #[serde(rename = "as")]
    pub destination: String,
    /// MIME type hint
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Media query the resource applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    /// Fetch in anonymous CORS mode
    #[serde(rename = "crossorigin", default, skip_serializing_if = "std::ops::Not::not")]
    pub cross_origin: bool,
}

impl PreloadDirective {
    /// Directive with only the mandatory fields
    #[must_use]
    pub fn new(href: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            destination: destination.into(),
            mime_type: None,
            media: None,
            cross_origin: false,
        }
    }

    /// Render as one `Link` header value
    ///
    /// `<href>;rel="preload";as="image";type="image/png";crossorigin="anonymous"`
    #[must_use]
    pub fn to_link_header(&self) -> String {
        let mut header = format!("<{}>;rel=\"preload\";as=\"{}\"", self.href, quote(&self.destination));
        if let Some(mime_type) = &self.mime_type {
            header.push_str(&format!(";type=\"{}\"", quote(mime_type)));
        }
        if let Some(media) = &self.media {
            header.push_str(&format!(";media=\"{}\"", quote(media)));
        }
        if self.cross_origin {
            header.push_str(";crossorigin=\"anonymous\"");
        }
        header
    }

    /// Attributes for a `<link rel="preload">` element, in output order
    #[must_use]
    pub fn link_attributes(&self) -> Vec<(&'static str, &str)> {
        let mut attributes = vec![("rel", "preload"), ("href", self.href.as_str()), ("as", self.destination.as_str())];
        if let Some(mime_type) = &self.mime_type {
            attributes.push(("type", mime_type.as_str()));
        }
        if let Some(media) = &self.media {
            attributes.push(("media", media.as_str()));
        }
        if self.cross_origin {
            attributes.push(("crossorigin", "anonymous"));
        }
        attributes
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parsed application, not yet compiled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSpecification {
    /// Application key
    pub id: ApplicationId,
    /// Base page, `None` for the wildcard
    pub base: Option<PageTitle>,
    /// Where the application was written, for save-time diagnostics
    #[serde(skip)]
    pub path: SpecPath,
    /// Style pages in source order, never empty
    pub entries: Vec<StyleReference>,
    /// Preload directives, unique by `href`
    pub preload: Vec<PreloadDirective>,
}

impl ApplicationSpecification {
    /// Add `directive`, replacing an earlier one with the same `href` in place
    pub fn merge_preload(&mut self, directive: PreloadDirective) {
        match self.preload.iter_mut().find(|d| d.href == directive.href) {
            Some(existing) => *existing = directive,
            None => self.preload.push(directive),
        }
    }
}

/// Revision a compiled entry was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceRevision {
    /// Current revision at fill time
    Revision(RevisionId),
    /// Page was missing, invalid or failed to compile
    Unavailable,
}

impl SourceRevision {
    /// Revision id, if the entry was usable
    #[inline]
    #[must_use]
    pub fn id(self) -> Option<RevisionId> {
        match self {
            Self::Revision(id) => Some(id),
            Self::Unavailable => None,
        }
    }
}

/// How an entry was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum EntryStatus {
    /// Less compiled with the entry's variables
    Compiled,
    /// CSS copied unchanged
    Passthrough,
    /// Page could not be used
    NotFound { reason: String },
    /// Compiler rejected the page
    CompileFailed { reason: String },
}

impl EntryStatus {
    /// Whether the entry is an empty placeholder
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::CompileFailed { .. })
    }
}

/// One compiled style sheet of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStyle {
    /// Page name as written in the specification
    pub page: String,
    /// Normalised title, if the name parsed
    pub title: Option<PageTitle>,
    /// Compiled CSS, empty for placeholders
    pub css: String,
    /// Revision used
    pub revision: SourceRevision,
    /// Variables the page was compiled with
    pub variables: Variables,
    /// Outcome
    #[serde(flatten)]
    pub status: EntryStatus,
}

/// A resolved application, ready to serve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationBundle {
    /// Application key
    pub id: ApplicationId,
    /// One entry per style reference, in source order
    pub entries: Vec<ResolvedStyle>,
    /// Preload directives carried through from the specification
    pub preload: Vec<PreloadDirective>,
}

impl ApplicationBundle {
    /// CSS per entry in order, placeholders included as empty strings
    #[must_use]
    pub fn compiled_styles(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.css.as_str()).collect()
    }

    /// Style sheets to serve, placeholders skipped
    #[must_use]
    pub fn styles(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| !e.css.is_empty())
            .map(|e| e.css.as_str())
            .collect()
    }

    /// Revision used per referenced page
    #[must_use]
    pub fn source_revisions(&self) -> IndexMap<&str, SourceRevision> {
        self.entries
            .iter()
            .map(|e| (e.page.as_str(), e.revision))
            .collect()
    }

    /// Merged variables per entry
    #[must_use]
    pub fn variables(&self) -> Vec<&Variables> {
        self.entries.iter().map(|e| &e.variables).collect()
    }

    /// Preload directives
    #[inline]
    #[must_use]
    pub fn preload_directives(&self) -> &[PreloadDirective] {
        &self.preload
    }

    /// Number of placeholder entries
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_placeholder()).count()
    }

    /// Stable hash of everything that determines the served output
    ///
    /// Changes when a revision, variable or preload directive changes.
    #[must_use]
    pub fn definition_summary(&self) -> DefinitionSummary {
        #[derive(Serialize)]
        struct Summary<'a> {
            coatings: Vec<(&'a str, SourceRevision)>,
            variables: Vec<&'a Variables>,
            preload: &'a [PreloadDirective],
        }

        let summary = Summary {
            coatings: self.entries.iter().map(|e| (e.page.as_str(), e.revision)).collect(),
            variables: self.variables(),
            preload: &self.preload,
        };
        let mut hasher = blake3::Hasher::new();
        // Serialising plain strings and maps into a hasher cannot fail
        if serde_json::to_writer(&mut hasher, &summary).is_err() {
            tracing::warn!(application = %self.id, "definition summary serialisation failed");
        }
        DefinitionSummary(*hasher.finalize().as_bytes())
    }
}

/// Blake3 hash of an application's definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefinitionSummary([u8; 32]);

impl DefinitionSummary {
    /// Raw bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 hex characters, for version strings
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for DefinitionSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
