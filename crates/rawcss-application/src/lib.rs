//! RawCSS Application Repository
//!
//! Serves per-template style applications described on a single wiki
//! specification page. An application pairs a base template (or the `*`
//! wildcard) with an ordered list of style pages, compile-time variables
//! and preload directives.
//!
//! # Pipeline
//!
//! ```text
//! Specification page → Dialect (JSON | wikitext) → SpecificationParser → Specifications
//!                                                                            ↓
//!        Consumers ← ApplicationCache (versioned, generation, lock) ← ApplicationResolver
//!                              ↑
//!                    InvalidationTrigger ← page saves, deletions, purges
//! ```
//!
//! # Example
//!
//! ```rust
//! use rawcss_application::prelude::*;
//! use rawcss_compiler::LessCompiler;
//! use rawcss_page::{ContentModel, MemoryPageStore, Namespace, PageTitle};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryPageStore::new());
//! let spec = PageTitle::new(Namespace::MEDIAWIKI, "RawCSS-applications.json").unwrap();
//! let sheet = PageTitle::new(Namespace::RAWCSS, "Site.less").unwrap();
//! store.save(&sheet, ContentModel::Less, "body{color:@ink}");
//! store.save(
//!     &spec,
//!     ContentModel::ApplicationList,
//!     r#"{"*": {"variables": {"ink": "navy"}, "coatings": ["Site.less"]}}"#,
//! );
//!
//! let repository = ApplicationRepository::new(
//!     Arc::clone(&store),
//!     LessCompiler::new(),
//!     MemoryCacheStore::new(),
//!     &RawCssConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(repository.styles(ApplicationId::Wildcard), vec!["body{color:navy}"]);
//!
//! let trigger = InvalidationTrigger::new(&repository);
//! assert!(trigger.handle(&PageEvent::Saved(sheet)));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod parsers;
pub mod repository;
pub mod resolver;
pub mod save;
pub mod store;
pub mod trigger;

pub use cache::{ApplicationCache, CacheOutcome, Envelope, Fill, Lookup, SCHEMA_VERSION};
pub use config::{CacheSettings, RawCssConfig, DEFAULT_SPECIFICATION_PAGE};
pub use error::{
    CacheError, ConfigError, RepositoryError, RepositoryResult, SpecPath, ValidationError, ValidationErrorKind,
};
pub use model::{
    ApplicationBundle, ApplicationId, ApplicationSpecification, Applications, EntryStatus, PreloadDirective,
    ResolvedStyle, SourceRevision, Specifications, StyleReference, APPLICATION_ID_VARIABLE,
};
pub use repository::{ApplicationRepository, OutputContext};
pub use resolver::ApplicationResolver;
pub use save::{validate_style_page, SaveValidator};
pub use store::{CacheStore, MemoryCacheStore};
pub use trigger::{DependencySink, InvalidationTrigger, PageEvent};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for serving applications
    pub use crate::cache::{ApplicationCache, CacheOutcome};
    pub use crate::config::{CacheSettings, RawCssConfig};
    pub use crate::error::{RepositoryError, ValidationError};
    pub use crate::model::{ApplicationBundle, ApplicationId, PreloadDirective};
    pub use crate::parsers::{DialectRegistry, JsonDialect, SpecificationDialect, WikitextDialect};
    pub use crate::repository::{ApplicationRepository, OutputContext};
    pub use crate::store::{CacheStore, MemoryCacheStore};
    pub use crate::trigger::{DependencySink, InvalidationTrigger, PageEvent};
    pub use rawcss_compiler::StyleCompiler;
    pub use rawcss_page::PageStore;
}
