//! Specification parsing
//!
//! The specification page comes in two dialects that share one validation
//! pass:
//! - [`JsonDialect`]: the application-list JSON document, strict
//! - [`WikitextDialect`]: `== id ==` / `=== Page ===` sections, lenient
//!
//! A dialect only *reads* text into draft applications. Everything that
//! needs the wiki (base pages) or applies value rules (variables, preload
//! URLs) happens in [`SpecificationParser`], so both dialects produce the
//! same [`Specifications`] for equivalent input. The dialect's
//! [`FailurePolicy`] decides whether the first rejected value aborts the
//! parse or only drops the part it sits in: a bad base or shared variable
//! drops the application, a bad coating or preload entry drops just itself.
//!
//! Coating pages are not looked up here. A reference to a missing or unusable
//! page is kept and resolves to a placeholder, so deleting one style page
//! never takes the other applications down. [`SaveValidator`] checks the
//! pages before a save.
//!
//! [`SaveValidator`]: crate::save::SaveValidator

use crate::error::{SpecPath, ValidationError};
use crate::model::{ApplicationId, ApplicationSpecification, Specifications, StyleReference};
use rawcss_compiler::Variables;
use rawcss_page::{ContentModel, Namespace, PageStore, PageTitle, StylePageAccessor};
use std::collections::BTreeSet;
use tracing::{debug, warn};

mod json;
pub mod rules;
mod wikitext;

pub use json::JsonDialect;
pub use wikitext::WikitextDialect;

/// What a dialect does with a rejected value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The first error fails the whole parse
    Abort,
    /// The enclosing application, coating or preload entry is dropped with a diagnostic
    Skip,
}

/// Variable override as read, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftVariable {
    /// Name without `@`
    pub name: String,
    /// Raw value
    pub value: String,
    /// Where the variable was written
    pub path: SpecPath,
}

/// Style page reference as read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftCoating {
    /// Page name, resolved against the RawCSS namespace
    pub page: String,
    /// Where the reference was written
    pub path: SpecPath,
    /// Overrides for this page only
    pub variables: Vec<DraftVariable>,
}

/// Preload entry as read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftPreload {
    /// Where the entry was written
    pub path: SpecPath,
    /// Unsanitised URL
    pub href: Option<String>,
    /// `as` value
    pub destination: Option<String>,
    /// `type` value
    pub mime_type: Option<String>,
    /// `media` value
    pub media: Option<String>,
    /// Whether `crossorigin` was truthy
    pub cross_origin: bool,
}

/// One application as read from the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftApplication {
    /// Identifier as written
    pub key: String,
    /// Path of the application itself
    pub path: SpecPath,
    /// Overrides shared by every coating
    pub variables: Vec<DraftVariable>,
    /// Style pages in source order
    pub coatings: Vec<DraftCoating>,
    /// Preload entries in source order
    pub preload: Vec<DraftPreload>,
}

impl DraftApplication {
    /// Empty application for `key`
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            path: SpecPath::root().key(key.as_str()),
            key,
            variables: Vec::new(),
            coatings: Vec::new(),
            preload: Vec::new(),
        }
    }
}

/// Reads specification text in one syntax
///
/// Implement this trait to accept another page format.
pub trait SpecificationDialect: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether pages with this content model use this dialect
    fn handles(&self, model: &ContentModel) -> bool;

    /// How rejected values are treated
    fn failure_policy(&self) -> FailurePolicy;

    /// Read `text` into draft applications
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when the text cannot be read at all.
    fn read(&self, text: &str) -> Result<Vec<DraftApplication>, ValidationError>;
}

/// Dialects by content model
pub struct DialectRegistry {
    dialects: Vec<Box<dyn SpecificationDialect>>,
}

impl Default for DialectRegistry {
    fn default() -> Self {
        default_dialects()
    }
}

impl std::fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialectRegistry")
            .field("dialects", &self.names())
            .finish()
    }
}

impl DialectRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { dialects: Vec::new() }
    }

    /// Register a dialect; earlier registrations win for a shared model
    pub fn register<D: SpecificationDialect + 'static>(&mut self, dialect: D) {
        self.dialects.push(Box::new(dialect));
    }

    /// Dialect for pages with `model`
    #[must_use]
    pub fn find_for_model(&self, model: &ContentModel) -> Option<&dyn SpecificationDialect> {
        self.dialects.iter().find(|d| d.handles(model)).map(|d| &**d)
    }

    /// Registered dialect names
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.dialects.iter().map(|d| d.name()).collect()
    }
}

/// Registry with the JSON and wikitext dialects
#[inline]
#[must_use]
pub fn default_dialects() -> DialectRegistry {
    let mut registry = DialectRegistry::new();
    registry.register(JsonDialect);
    registry.register(WikitextDialect);
    registry
}

/// Result of parsing the specification page
#[derive(Debug)]
pub struct ParseReport {
    /// Dialect used, `None` when no dialect handles the content model
    pub dialect: Option<&'static str>,
    /// Accepted applications, or the error that aborted the parse
    pub outcome: Result<Specifications, ValidationError>,
    /// Applications, coatings and preload entries dropped under [`FailurePolicy::Skip`]
    pub diagnostics: Vec<ValidationError>,
    /// Every local page the text names, usable or not
    pub references: BTreeSet<PageTitle>,
}

impl ParseReport {
    /// Whether the parse succeeded without dropping anything
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcome.is_ok() && self.diagnostics.is_empty()
    }
}

/// Validates draft applications against the wiki
#[derive(Debug)]
pub struct SpecificationParser<'a, S> {
    accessor: &'a StylePageAccessor<S>,
    dialects: &'a DialectRegistry,
    base_namespace: Namespace,
}

impl<'a, S: PageStore> SpecificationParser<'a, S> {
    /// Parser resolving bases in the Template namespace
    #[must_use]
    pub fn new(accessor: &'a StylePageAccessor<S>, dialects: &'a DialectRegistry) -> Self {
        Self {
            accessor,
            dialects,
            base_namespace: Namespace::TEMPLATE,
        }
    }

    /// Resolve bases in `namespace` instead
    #[must_use]
    pub fn with_base_namespace(mut self, namespace: Namespace) -> Self {
        self.base_namespace = namespace;
        self
    }

    /// Parse text stored with `model`
    pub fn parse(&self, text: &str, model: &ContentModel) -> ParseReport {
        match self.dialects.find_for_model(model) {
            Some(dialect) => self.parse_with(dialect, text),
            None => ParseReport {
                dialect: None,
                outcome: Err(ValidationError::syntax(format!(
                    "no specification dialect for content model {model}"
                ))),
                diagnostics: Vec::new(),
                references: BTreeSet::new(),
            },
        }
    }

    /// Parse `text` with an explicit dialect
    pub fn parse_with(&self, dialect: &dyn SpecificationDialect, text: &str) -> ParseReport {
        let mut report = ParseReport {
            dialect: Some(dialect.name()),
            outcome: Ok(Specifications::new()),
            diagnostics: Vec::new(),
            references: BTreeSet::new(),
        };

        let drafts = match dialect.read(text) {
            Ok(drafts) => drafts,
            Err(err) => {
                debug!(dialect = dialect.name(), error = %err, "specification text unreadable");
                report.outcome = Err(err);
                return report;
            }
        };
        report.references = self.references(&drafts);

        let mut validation = Validation {
            parser: self,
            policy: dialect.failure_policy(),
            diagnostics: Vec::new(),
        };
        report.outcome = validation.applications(drafts);
        report.diagnostics = validation.diagnostics;
        report
    }

    /// Local pages named by the drafts, including unusable ones
    fn references(&self, drafts: &[DraftApplication]) -> BTreeSet<PageTitle> {
        let titles = self.accessor.titles();
        let bases = drafts
            .iter()
            .filter(|d| !ApplicationId::is_wildcard_key(&d.key))
            .filter_map(|d| titles.parse(&d.key, self.base_namespace).ok());
        let coatings = drafts
            .iter()
            .flat_map(|d| &d.coatings)
            .filter_map(|c| titles.parse(&c.page, Namespace::RAWCSS).ok());
        bases.chain(coatings).filter(|t| !t.is_external()).collect()
    }

    fn base(&self, draft: &DraftApplication) -> Result<(ApplicationId, Option<PageTitle>), ValidationError> {
        if ApplicationId::is_wildcard_key(&draft.key) {
            return Ok((ApplicationId::Wildcard, None));
        }
        let invalid = || ValidationError::InvalidBase {
            path: draft.path.clone(),
            name: draft.key.clone(),
        };

        let title = self
            .accessor
            .titles()
            .parse(&draft.key, self.base_namespace)
            .map_err(|_| invalid())?;
        if title.is_external() || title.namespace() != self.base_namespace {
            return Err(invalid());
        }
        let record = self.accessor.store().page(&title).ok_or_else(invalid)?;
        Ok((ApplicationId::from(record.id), Some(record.title)))
    }
}

/// Style reference for `draft`, with shared variables under its own
fn style_reference(draft: &DraftCoating, shared: &Variables) -> Result<StyleReference, ValidationError> {
    if draft.page.trim().is_empty() {
        return Err(ValidationError::InvalidCoating {
            path: draft.path.clone(),
            name: draft.page.clone(),
            reason: "style page name is empty".to_string(),
        });
    }

    let mut variables = shared.clone();
    for variable in &draft.variables {
        rules::check_variable(variable)?;
        variables.insert(variable.name.clone(), variable.value.clone());
    }
    Ok(StyleReference {
        page: draft.page.clone(),
        variables,
    })
}

struct Validation<'p, 'a, S> {
    parser: &'p SpecificationParser<'a, S>,
    policy: FailurePolicy,
    diagnostics: Vec<ValidationError>,
}

impl<S: PageStore> Validation<'_, '_, S> {
    fn applications(&mut self, drafts: Vec<DraftApplication>) -> Result<Specifications, ValidationError> {
        let mut specifications = Specifications::new();
        for draft in drafts {
            let key = draft.key.clone();
            if let Some(specification) = self.application(draft)? {
                if let Some(previous) = specifications.insert(specification.id, specification) {
                    debug!(application = %previous.id, key = %key, "duplicate application replaced");
                }
            }
        }
        Ok(specifications)
    }

    /// Checks run in order: base, variables, coatings, preload
    fn application(&mut self, draft: DraftApplication) -> Result<Option<ApplicationSpecification>, ValidationError> {
        let parser = self.parser;
        let Some((id, base)) = self.soft(parser.base(&draft))? else {
            return Ok(None);
        };

        let mut shared = Variables::new();
        for variable in &draft.variables {
            if self.soft(rules::check_variable(variable))?.is_none() {
                return Ok(None);
            }
            shared.insert(variable.name.clone(), variable.value.clone());
        }

        let mut entries = Vec::with_capacity(draft.coatings.len());
        for coating in &draft.coatings {
            if let Some(entry) = self.soft(style_reference(coating, &shared))? {
                entries.push(entry);
            }
        }
        if entries.is_empty() {
            let missing = ValidationError::missing(draft.path.key("coatings").elements());
            self.soft::<()>(Err(missing))?;
            return Ok(None);
        }

        let mut specification = ApplicationSpecification {
            id,
            base,
            path: draft.path,
            entries,
            preload: Vec::new(),
        };
        for preload in draft.preload {
            if let Some(directive) = self.soft(rules::preload_directive(preload))? {
                specification.merge_preload(directive);
            }
        }
        Ok(Some(specification))
    }

    fn soft<T>(&mut self, result: Result<T, ValidationError>) -> Result<Option<T>, ValidationError> {
        match (result, self.policy) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(err), FailurePolicy::Abort) => Err(err),
            (Err(err), FailurePolicy::Skip) => {
                warn!(path = %err.path(), error = %err, "skipping specification section");
                self.diagnostics.push(err);
                Ok(None)
            }
        }
    }
}
