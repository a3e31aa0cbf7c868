//! Application resolution
//!
//! Turns [`Specifications`] into [`Applications`]: every style reference is
//! looked up and compiled in source order. A reference that cannot be used
//! becomes an empty placeholder so one broken page never takes the rest of
//! its application down.

use crate::model::{
    ApplicationBundle, ApplicationId, ApplicationSpecification, Applications, EntryStatus, ResolvedStyle,
    SourceRevision, Specifications, StyleReference, APPLICATION_ID_VARIABLE,
};
use rawcss_compiler::{StyleCompiler, Variables};
use rawcss_page::{Namespace, PageStore, StyleLanguage, StylePageAccessor};
use tracing::{debug, warn};

/// Resolves and compiles specifications
#[derive(Debug)]
pub struct ApplicationResolver<'a, S, C: ?Sized> {
    accessor: &'a StylePageAccessor<S>,
    compiler: &'a C,
}

impl<'a, S: PageStore, C: StyleCompiler + ?Sized> ApplicationResolver<'a, S, C> {
    /// Create resolver
    #[inline]
    #[must_use]
    pub fn new(accessor: &'a StylePageAccessor<S>, compiler: &'a C) -> Self {
        Self { accessor, compiler }
    }

    /// Resolve every application, keeping specification order
    #[must_use]
    pub fn resolve(&self, specifications: &Specifications) -> Applications {
        specifications
            .iter()
            .map(|(id, specification)| (*id, self.resolve_application(specification)))
            .collect()
    }

    /// Resolve one application
    #[must_use]
    pub fn resolve_application(&self, specification: &ApplicationSpecification) -> ApplicationBundle {
        let entries: Vec<_> = specification
            .entries
            .iter()
            .map(|reference| self.entry(specification.id, reference))
            .collect();

        let placeholders = entries.iter().filter(|e| e.status.is_placeholder()).count();
        debug!(
            application = %specification.id,
            entries = entries.len(),
            placeholders,
            "resolved application"
        );

        ApplicationBundle {
            id: specification.id,
            entries,
            preload: specification.preload.clone(),
        }
    }

    fn entry(&self, id: ApplicationId, reference: &StyleReference) -> ResolvedStyle {
        let variables = compile_variables(id, &reference.variables);

        let page = match self.accessor.resolve(&reference.page, Namespace::RAWCSS) {
            Ok(page) => page,
            Err(err) => {
                warn!(application = %id, page = %reference.page, error = %err, "style page unavailable");
                return ResolvedStyle {
                    page: reference.page.clone(),
                    title: err.title().cloned(),
                    css: String::new(),
                    revision: SourceRevision::Unavailable,
                    variables,
                    status: EntryStatus::NotFound {
                        reason: err.to_string(),
                    },
                };
            }
        };

        let (css, revision, status) = match page.language {
            StyleLanguage::Css => (page.text, SourceRevision::Revision(page.revision_id), EntryStatus::Passthrough),
            StyleLanguage::Less => match self.compiler.compile(&page.text, &variables) {
                Ok(css) => (css, SourceRevision::Revision(page.revision_id), EntryStatus::Compiled),
                Err(err) => {
                    warn!(application = %id, page = %page.title, error = %err, "style page failed to compile");
                    (
                        String::new(),
                        SourceRevision::Unavailable,
                        EntryStatus::CompileFailed {
                            reason: err.to_string(),
                        },
                    )
                }
            },
        };

        ResolvedStyle {
            page: reference.page.clone(),
            title: Some(page.title),
            css,
            revision,
            variables,
            status,
        }
    }
}

/// Entry variables with the application id appended last
pub(crate) fn compile_variables(id: ApplicationId, variables: &Variables) -> Variables {
    let mut merged = variables.clone();
    merged.shift_remove(APPLICATION_ID_VARIABLE);
    merged.insert(APPLICATION_ID_VARIABLE.to_string(), id.number().to_string());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpecPath;
    use crate::model::PreloadDirective;
    use pretty_assertions::assert_eq;
    use rawcss_compiler::LessCompiler;
    use rawcss_page::{ContentModel, MemoryPageStore, PageId, PageTitle, TitleParser};

    fn accessor() -> StylePageAccessor<MemoryPageStore> {
        let store = MemoryPageStore::new();
        let rawcss = |t: &str| PageTitle::new(Namespace::RAWCSS, t).unwrap();
        store.save(&rawcss("A.css"), ContentModel::Css, "body{color:red}");
        store.save(&rawcss("B.css"), ContentModel::Css, ".b{margin:0}");
        store.save(&rawcss("Theme.less"), ContentModel::Less, "@c: blue; body{color:@c}");
        store.save(&rawcss("Id.less"), ContentModel::Less, ".app-@{application-id}{display:block}");
        store.save(&rawcss("Broken.less"), ContentModel::Less, "body{color:@nope}");
        StylePageAccessor::new(store, TitleParser::new())
    }

    fn spec(id: ApplicationId, entries: Vec<StyleReference>) -> ApplicationSpecification {
        ApplicationSpecification {
            id,
            base: None,
            path: SpecPath::default(),
            entries,
            preload: vec![PreloadDirective::new("https://x/y.png", "image")],
        }
    }

    fn resolve(accessor: &StylePageAccessor<MemoryPageStore>, spec: &ApplicationSpecification) -> ApplicationBundle {
        ApplicationResolver::new(accessor, &LessCompiler::new()).resolve_application(spec)
    }

    #[test]
    fn css_passes_through_in_order() {
        let accessor = accessor();
        let bundle = resolve(
            &accessor,
            &spec(ApplicationId::Wildcard, vec![StyleReference::new("B.css"), StyleReference::new("A.css")]),
        );
        assert_eq!(bundle.compiled_styles(), vec![".b{margin:0}", "body{color:red}"]);
        assert!(bundle.entries.iter().all(|e| e.status == EntryStatus::Passthrough));
        assert_eq!(bundle.preload.len(), 1);
    }

    #[test]
    fn less_compiles_with_overrides() {
        let accessor = accessor();
        let bundle = resolve(
            &accessor,
            &spec(ApplicationId::Wildcard, vec![StyleReference::new("Theme.less").with_variable("c", "green")]),
        );
        assert_eq!(bundle.compiled_styles(), vec!["body{color:green}"]);
        assert_eq!(bundle.entries[0].status, EntryStatus::Compiled);
        assert!(bundle.entries[0].revision.id().is_some());
    }

    #[test]
    fn application_id_is_available_and_cannot_be_shadowed() {
        let accessor = accessor();
        let id = ApplicationId::Page(PageId(42));
        let bundle = resolve(
            &accessor,
            &spec(id, vec![StyleReference::new("Id.less").with_variable(APPLICATION_ID_VARIABLE, "7")]),
        );
        assert_eq!(bundle.compiled_styles(), vec![".app-42{display:block}"]);
        let variables = &bundle.entries[0].variables;
        assert_eq!(variables.get_index(variables.len() - 1), Some((&APPLICATION_ID_VARIABLE.to_string(), &"42".to_string())));
    }

    #[test]
    fn unusable_entries_become_placeholders() {
        let accessor = accessor();
        let bundle = resolve(
            &accessor,
            &spec(
                ApplicationId::Wildcard,
                vec![
                    StyleReference::new("A.css"),
                    StyleReference::new("Gone.css"),
                    StyleReference::new("Broken.less"),
                    StyleReference::new("B.css"),
                ],
            ),
        );
        assert_eq!(bundle.compiled_styles(), vec!["body{color:red}", "", "", ".b{margin:0}"]);
        assert_eq!(bundle.styles(), vec!["body{color:red}", ".b{margin:0}"]);
        assert_eq!(bundle.placeholder_count(), 2);
        assert!(matches!(bundle.entries[1].status, EntryStatus::NotFound { .. }));
        assert_eq!(bundle.entries[1].title.as_ref().unwrap().text(), "Gone.css");
        assert!(matches!(bundle.entries[2].status, EntryStatus::CompileFailed { .. }));
        assert_eq!(bundle.entries[2].revision, SourceRevision::Unavailable);
    }

    #[test]
    fn resolution_is_idempotent() {
        let accessor = accessor();
        let mut specs = Specifications::new();
        let wildcard = spec(
            ApplicationId::Wildcard,
            vec![StyleReference::new("Theme.less"), StyleReference::new("Gone.css")],
        );
        specs.insert(wildcard.id, wildcard);
        let compiler = LessCompiler::new();
        let resolver = ApplicationResolver::new(&accessor, &compiler);
        assert_eq!(resolver.resolve(&specs), resolver.resolve(&specs));
    }
}
