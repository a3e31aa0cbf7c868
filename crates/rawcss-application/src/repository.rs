//! Application repository
//!
//! The single entry point for serving applications. It owns the style page
//! accessor, the compiler and the cache, and is the only component that
//! reads the specification page.
//!
//! Every read goes through the cache. A fill reads the specification page,
//! parses it with the dialect its content model selects, resolves the
//! result and records every page it looked at as a dependency.

use crate::cache::{ApplicationCache, Fill, Lookup};
use crate::config::RawCssConfig;
use crate::error::{RepositoryResult, ValidationError};
use crate::model::{ApplicationBundle, ApplicationId, Applications, PreloadDirective, Specifications};
use crate::parsers::{default_dialects, DialectRegistry, ParseReport, SpecificationParser};
use crate::resolver::ApplicationResolver;
use crate::save::SaveValidator;
use crate::store::CacheStore;
use crate::trigger::DependencySink;
use rawcss_compiler::StyleCompiler;
use rawcss_page::{Namespace, PageStore, PageTitle, StylePageAccessor};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// What is being rendered, for picking applications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputContext {
    /// Active skin
    pub skin: String,
    /// Page being rendered
    pub page: PageTitle,
    /// Templates transcluded on the page
    pub templates: Vec<PageTitle>,
}

impl OutputContext {
    /// Context for `page` rendered with `skin`
    #[must_use]
    pub fn new(skin: impl Into<String>, page: PageTitle) -> Self {
        Self {
            skin: skin.into(),
            page,
            templates: Vec::new(),
        }
    }

    /// With templates used on the page
    #[must_use]
    pub fn with_templates(mut self, templates: impl IntoIterator<Item = PageTitle>) -> Self {
        self.templates = templates.into_iter().collect();
        self
    }
}

/// Cache-coherent application repository
pub struct ApplicationRepository<S, C, K> {
    accessor: StylePageAccessor<S>,
    compiler: C,
    cache: ApplicationCache<K>,
    dialects: DialectRegistry,
    specification_page: PageTitle,
    base_namespace: Namespace,
    config: RawCssConfig,
}

impl<S, C, K> std::fmt::Debug for ApplicationRepository<S, C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationRepository")
            .field("specification_page", &self.specification_page)
            .field("base_namespace", &self.base_namespace)
            .field("dialects", &self.dialects)
            .finish_non_exhaustive()
    }
}

impl<S: PageStore, C: StyleCompiler, K: CacheStore> ApplicationRepository<S, C, K> {
    /// Create repository
    ///
    /// # Errors
    /// Returns [`RepositoryError::Config`](crate::error::RepositoryError::Config)
    /// if a configured title or namespace is unusable.
    pub fn new(store: S, compiler: C, cache_store: K, config: &RawCssConfig) -> RepositoryResult<Self> {
        let accessor =
            StylePageAccessor::new(store, config.title_parser()).with_namespaces(config.style_namespace_ids()?);
        Ok(Self {
            accessor,
            compiler,
            cache: ApplicationCache::new(cache_store, config.cache),
            dialects: default_dialects(),
            specification_page: config.specification_title()?,
            base_namespace: config.base_namespace_id()?,
            config: config.clone(),
        })
    }

    /// Replace the dialect registry
    #[must_use]
    pub fn with_dialects(mut self, dialects: DialectRegistry) -> Self {
        self.dialects = dialects;
        self
    }

    /// Style page accessor
    #[inline]
    #[must_use]
    pub fn accessor(&self) -> &StylePageAccessor<S> {
        &self.accessor
    }

    /// Style compiler
    #[inline]
    #[must_use]
    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Application cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ApplicationCache<K> {
        &self.cache
    }

    /// Configuration the repository was built from
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RawCssConfig {
        &self.config
    }

    /// Specification page title
    #[inline]
    #[must_use]
    pub fn specification_page(&self) -> &PageTitle {
        &self.specification_page
    }

    /// Every application, keyed by id
    #[must_use]
    pub fn applications(&self) -> Applications {
        self.lookup().applications
    }

    /// Every application, with how the cache answered
    #[must_use]
    pub fn lookup(&self) -> Lookup {
        self.cache.lookup(|| self.fill())
    }

    /// One application
    #[must_use]
    pub fn application_by_id(&self, id: ApplicationId) -> Option<ApplicationBundle> {
        self.applications().shift_remove(&id)
    }

    /// Ids of every application, in specification order
    #[must_use]
    pub fn application_ids(&self) -> Vec<ApplicationId> {
        self.applications().keys().copied().collect()
    }

    /// Discard the cached applications everywhere
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Invalidate if `title` is the specification page or a dependency
    ///
    /// Returns whether the cache was invalidated.
    pub fn on_dependent_page_changed(&self, title: &PageTitle) -> bool {
        let affected = title.is_same_page_as(&self.specification_page) || self.cache.depends_on(title);
        if affected {
            debug!(page = %title, "dependent page changed");
            self.cache.invalidate();
        }
        affected
    }

    /// Style sheets to serve for `id`, placeholders skipped
    #[must_use]
    pub fn styles(&self, id: ApplicationId) -> Vec<String> {
        self.application_by_id(id)
            .map(|bundle| bundle.styles().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Preload directives for `id`
    #[must_use]
    pub fn preload_directives(&self, id: ApplicationId) -> Vec<PreloadDirective> {
        self.application_by_id(id)
            .map(|bundle| bundle.preload)
            .unwrap_or_default()
    }

    /// `Link` header value for `id`'s preload directives
    #[must_use]
    pub fn link_header(&self, id: ApplicationId) -> Option<String> {
        let directives = self.preload_directives(id);
        if directives.is_empty() {
            return None;
        }
        Some(
            directives
                .iter()
                .map(PreloadDirective::to_link_header)
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Applications to attach to a rendered page
    ///
    /// Templates used on the page select their applications, as does the
    /// page itself when it is a template. Pages matching none get the
    /// wildcard application. Nothing is served to skins outside the
    /// allow-list.
    #[must_use]
    pub fn applications_for_output(&self, context: &OutputContext) -> Vec<ApplicationBundle> {
        if !self.config.skin_allowed(&context.skin) {
            debug!(skin = %context.skin, "skin not enabled for applications");
            return Vec::new();
        }

        let mut applications = self.applications();
        let candidates = context
            .templates
            .iter()
            .chain(std::iter::once(&context.page))
            .filter(|title| title.namespace() == self.base_namespace && !title.is_external());

        let mut selected = Vec::new();
        for title in candidates {
            let Some(record) = self.accessor.store().page(title) else {
                continue;
            };
            if let Some(bundle) = applications.shift_remove(&ApplicationId::from(record.id)) {
                selected.push(bundle);
            }
        }

        if selected.is_empty() {
            selected.extend(applications.shift_remove(&ApplicationId::Wildcard));
        }
        selected
    }

    /// Check specification text before it is saved
    ///
    /// # Errors
    /// The first [`ValidationError`] in the text.
    pub fn validate_specification(&self, text: &str) -> Result<Specifications, ValidationError> {
        SaveValidator::new(&self.accessor, &self.compiler)
            .with_base_namespace(self.base_namespace)
            .validate(text)
    }

    /// Parse the stored specification page without caching
    ///
    /// `None` when the page is missing or has no readable revision.
    #[must_use]
    pub fn parse_specification(&self) -> Option<ParseReport> {
        let revision = self.accessor.store().page(&self.specification_page)?.latest?;
        Some(self.parser().parse(&revision.text, &revision.model))
    }

    fn parser(&self) -> SpecificationParser<'_, S> {
        SpecificationParser::new(&self.accessor, &self.dialects).with_base_namespace(self.base_namespace)
    }

    fn fill(&self) -> Fill {
        let Some(record) = self.accessor.store().page(&self.specification_page) else {
            debug!(page = %self.specification_page, "no specification page");
            return Fill::uncacheable(Applications::new());
        };
        let Some(revision) = record.latest else {
            warn!(page = %self.specification_page, "specification page has no readable revision");
            return Fill::uncacheable(Applications::new());
        };
        if revision.text.trim().is_empty() {
            debug!(page = %self.specification_page, "specification page is empty");
            return Fill::uncacheable(Applications::new());
        }

        let report = self.parser().parse(&revision.text, &revision.model);
        let mut dependencies: BTreeSet<PageTitle> = report.references;
        dependencies.insert(self.specification_page.clone());

        match report.outcome {
            Ok(specifications) => {
                let applications = ApplicationResolver::new(&self.accessor, &self.compiler).resolve(&specifications);
                info!(
                    applications = applications.len(),
                    skipped = report.diagnostics.len(),
                    dialect = report.dialect.unwrap_or("none"),
                    "resolved specification page"
                );
                Fill::cacheable(applications, dependencies)
            }
            Err(err) => {
                warn!(page = %self.specification_page, error = %err, "specification page rejected");
                Fill::cacheable(Applications::new(), dependencies)
            }
        }
    }
}

impl<S: PageStore, C: StyleCompiler, K: CacheStore> DependencySink for ApplicationRepository<S, C, K> {
    fn on_dependent_page_changed(&self, title: &PageTitle) -> bool {
        ApplicationRepository::on_dependent_page_changed(self, title)
    }
}
