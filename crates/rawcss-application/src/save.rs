//! Save-time validation
//!
//! Serving is lenient, saving is not. Before the specification page is
//! stored it must parse as strict JSON with every check passing. Every
//! coating must name an existing, non-empty style page, and every Less
//! coating must compile with the variables its application gives it.

use crate::error::ValidationError;
use crate::model::{ApplicationSpecification, Specifications};
use crate::parsers::{DialectRegistry, JsonDialect, SpecificationParser};
use crate::resolver::compile_variables;
use rawcss_compiler::{CompileError, LessCompiler, StyleCompiler};
use rawcss_page::{Namespace, PageStore, StyleLanguage, StylePageAccessor};
use tracing::debug;

/// Validates specification text before it is saved
#[derive(Debug)]
pub struct SaveValidator<'a, S, C: ?Sized> {
    accessor: &'a StylePageAccessor<S>,
    compiler: &'a C,
    base_namespace: Namespace,
}

impl<'a, S: PageStore, C: StyleCompiler + ?Sized> SaveValidator<'a, S, C> {
    /// Validator resolving bases in the Template namespace
    #[must_use]
    pub fn new(accessor: &'a StylePageAccessor<S>, compiler: &'a C) -> Self {
        Self {
            accessor,
            compiler,
            base_namespace: Namespace::TEMPLATE,
        }
    }

    /// Resolve bases in `namespace` instead
    #[must_use]
    pub fn with_base_namespace(mut self, namespace: Namespace) -> Self {
        self.base_namespace = namespace;
        self
    }

    /// Validate specification text, returning what it would produce
    ///
    /// # Errors
    /// The first [`ValidationError`] found, including missing, empty or
    /// uncompilable coatings ([`ValidationError::InvalidCoating`]).
    pub fn validate(&self, text: &str) -> Result<Specifications, ValidationError> {
        let dialects = DialectRegistry::new();
        let specifications = SpecificationParser::new(self.accessor, &dialects)
            .with_base_namespace(self.base_namespace)
            .parse_with(&JsonDialect, text)
            .outcome?;

        for specification in specifications.values() {
            self.check_coatings(specification)?;
        }
        debug!(applications = specifications.len(), "specification accepted");
        Ok(specifications)
    }

    /// Every coating must name an existing, non-empty style page, and Less
    /// pages must compile with the variables their application gives them
    fn check_coatings(&self, specification: &ApplicationSpecification) -> Result<(), ValidationError> {
        let coatings = specification.path.key("coatings");

        for (index, entry) in specification.entries.iter().enumerate() {
            let invalid = |reason: String| ValidationError::InvalidCoating {
                path: coatings.index(index),
                name: entry.page.clone(),
                reason,
            };
            let page = self
                .accessor
                .resolve(&entry.page, Namespace::RAWCSS)
                .map_err(|err| invalid(err.to_string()))?;
            if page.text.trim().is_empty() {
                return Err(invalid("style page is empty".to_string()));
            }
            if page.language != StyleLanguage::Less {
                continue;
            }

            let variables = compile_variables(specification.id, &entry.variables);
            self.compiler
                .compile(&page.text, &variables)
                .map_err(|err| invalid(err.to_string()))?;
        }
        Ok(())
    }
}

/// Check a Less page's syntax before it is saved
///
/// Variables are not evaluated, since applications may supply them.
///
/// # Errors
/// Returns the [`CompileError`] for malformed source.
pub fn validate_style_page(text: &str) -> Result<(), CompileError> {
    LessCompiler::new().check_syntax(text)
}
