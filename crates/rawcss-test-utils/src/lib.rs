//! Testing utilities for the RawCSS workspace
//!
//! Shared fixtures: a seeded in-memory wiki and compilers that count or
//! slow down calls, for observing how often resolution runs.

#![allow(missing_docs)]

use rawcss_compiler::{CompileError, LessCompiler, StyleCompiler, Variables};
use rawcss_page::{ContentModel, MemoryPageStore, Namespace, PageId, PageStore, PageTitle, RevisionId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const SPECIFICATION_PAGE: &str = "RawCSS-applications.json";

pub fn title(namespace: Namespace, text: &str) -> PageTitle {
    PageTitle::new(namespace, text).unwrap()
}

pub fn rawcss(text: &str) -> PageTitle {
    title(Namespace::RAWCSS, text)
}

pub fn template(text: &str) -> PageTitle {
    title(Namespace::TEMPLATE, text)
}

pub fn specification_title() -> PageTitle {
    title(Namespace::MEDIAWIKI, SPECIFICATION_PAGE)
}

/// Install a test-writer subscriber; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A shared in-memory wiki with helpers for the pages tests touch
#[derive(Debug, Clone, Default)]
pub struct TestWiki {
    store: Arc<MemoryPageStore>,
}

impl TestWiki {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wiki with `Template:Infobox`, `Template:Navbox` and a few style pages
    pub fn seeded() -> Self {
        let wiki = Self::new();
        wiki.template("Infobox");
        wiki.template("Navbox");
        wiki.css("Site.css", "body{margin:0}");
        wiki.css("Infobox.css", ".infobox{float:right}");
        wiki.less("Theme.less", "@accent: blue; a{color:@accent}");
        wiki
    }

    pub fn store(&self) -> Arc<MemoryPageStore> {
        Arc::clone(&self.store)
    }

    pub fn template(&self, name: &str) -> PageId {
        let page = template(name);
        self.store.save(&page, ContentModel::Wikitext, format!("<div class=\"{name}\">{{{{{{1}}}}}}</div>"));
        self.page_id(&page)
    }

    pub fn css(&self, name: &str, text: &str) -> RevisionId {
        self.store.save(&rawcss(name), ContentModel::Css, text)
    }

    pub fn less(&self, name: &str, text: &str) -> RevisionId {
        self.store.save(&rawcss(name), ContentModel::Less, text)
    }

    /// Store `text` as the JSON specification page
    pub fn specification(&self, text: &str) -> RevisionId {
        self.store.save(&specification_title(), ContentModel::ApplicationList, text)
    }

    pub fn page_id(&self, page: &PageTitle) -> PageId {
        self.store.page(page).unwrap().id
    }
}

/// Wraps a compiler and counts calls
#[derive(Debug, Default)]
pub struct CountingCompiler<C = LessCompiler> {
    inner: C,
    calls: AtomicUsize,
}

impl CountingCompiler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C> CountingCompiler<C> {
    pub fn wrapping(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: StyleCompiler> StyleCompiler for CountingCompiler<C> {
    fn compile(&self, source: &str, variables: &Variables) -> Result<String, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(source, variables)
    }
}

/// Sleeps before every compile, to widen race windows
#[derive(Debug)]
pub struct SlowCompiler<C = LessCompiler> {
    inner: C,
    delay: Duration,
}

impl SlowCompiler {
    pub fn new(delay: Duration) -> Self {
        Self::wrapping(LessCompiler::new(), delay)
    }
}

impl<C> SlowCompiler<C> {
    pub fn wrapping(inner: C, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<C: StyleCompiler> StyleCompiler for SlowCompiler<C> {
    fn compile(&self, source: &str, variables: &Variables) -> Result<String, CompileError> {
        thread::sleep(self.delay);
        self.inner.compile(source, variables)
    }
}
