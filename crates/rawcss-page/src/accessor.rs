//! Style page lookup
//!
//! [`StylePageAccessor`] answers one question: given a page name, is there a
//! compilable style sheet behind it? It never caches; the application cache
//! above it owns all caching and invalidation.

use crate::content::StyleLanguage;
use crate::error::NotFound;
use crate::namespace::Namespace;
use crate::store::{PageId, PageStore, RevisionId};
use crate::title::{PageTitle, TitleParser};

/// Which style languages a lookup accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleFilter {
    /// Less or CSS
    #[default]
    Any,
    /// Less only, for callers that need variable definitions
    StyleLanguageOnly,
}

/// A style page ready for compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylePage {
    /// Normalised title
    pub title: PageTitle,
    /// Page id
    pub page_id: PageId,
    /// Revision the text was read from
    pub revision_id: RevisionId,
    /// Less or CSS
    pub language: StyleLanguage,
    /// Source text
    pub text: String,
}

/// Resolves page names to [`StylePage`]s
#[derive(Debug, Clone)]
pub struct StylePageAccessor<S> {
    store: S,
    titles: TitleParser,
    namespaces: Vec<Namespace>,
}

impl<S: PageStore> StylePageAccessor<S> {
    /// Accessor allowing the RawCSS and Template namespaces
    #[must_use]
    pub fn new(store: S, titles: TitleParser) -> Self {
        Self {
            store,
            titles,
            namespaces: vec![Namespace::RAWCSS, Namespace::TEMPLATE],
        }
    }

    /// Replace the allowed namespace set
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: impl IntoIterator<Item = Namespace>) -> Self {
        self.namespaces = namespaces.into_iter().collect();
        self
    }

    /// Underlying page store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Title parser used for page names
    #[inline]
    #[must_use]
    pub fn titles(&self) -> &TitleParser {
        &self.titles
    }

    /// Allowed namespaces
    #[inline]
    #[must_use]
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Resolve `name`, defaulting to `default_namespace`, accepting Less or CSS
    ///
    /// # Errors
    /// Returns [`NotFound`] with the reason the page is unusable.
    pub fn resolve(&self, name: &str, default_namespace: Namespace) -> Result<StylePage, NotFound> {
        self.resolve_filtered(name, default_namespace, StyleFilter::Any)
    }

    /// Resolve `name` with an explicit language filter
    ///
    /// # Errors
    /// Returns [`NotFound`] with the reason the page is unusable.
    pub fn resolve_filtered(
        &self,
        name: &str,
        default_namespace: Namespace,
        filter: StyleFilter,
    ) -> Result<StylePage, NotFound> {
        let title = self
            .titles
            .parse(name, default_namespace)
            .map_err(|source| NotFound::InvalidTitle {
                name: name.to_string(),
                source,
            })?;
        self.resolve_title(&title, filter)
    }

    /// Resolve an already-parsed title
    ///
    /// # Errors
    /// Returns [`NotFound`] with the reason the page is unusable.
    pub fn resolve_title(&self, title: &PageTitle, filter: StyleFilter) -> Result<StylePage, NotFound> {
        if title.is_external() {
            return Err(NotFound::External { title: title.clone() });
        }
        if !self.namespaces.contains(&title.namespace()) {
            return Err(NotFound::NamespaceNotAllowed { title: title.clone() });
        }

        let record = self
            .store
            .page(title)
            .ok_or_else(|| NotFound::Missing { title: title.clone() })?;
        let revision = record
            .latest
            .ok_or_else(|| NotFound::NoRevision { title: title.clone() })?;

        let language = revision
            .model
            .style_language()
            .ok_or_else(|| NotFound::UnsupportedModel {
                title: title.clone(),
                model: revision.model.clone(),
            })?;
        if filter == StyleFilter::StyleLanguageOnly && language != StyleLanguage::Less {
            return Err(NotFound::NotStyleLanguage { title: title.clone() });
        }

        Ok(StylePage {
            title: record.title,
            page_id: record.id,
            revision_id: revision.id,
            language,
            text: revision.text,
        })
    }
}
