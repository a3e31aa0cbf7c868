//! Page storage interface
//!
//! [`PageStore`] is the read-only view of the wiki's page and revision tables
//! that RawCSS consumes. [`MemoryPageStore`] is a complete in-process
//! implementation with save and delete, used by tests and tools.

use crate::content::ContentModel;
use crate::title::PageTitle;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Numeric page id, stable across renames
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl Display for PageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric revision id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub u64);

impl Display for RevisionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored revision's main slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Revision id
    pub id: RevisionId,
    /// Content model of the main slot
    pub model: ContentModel,
    /// Main slot text
    pub text: String,
}

/// A page with its current revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Page id
    pub id: PageId,
    /// Normalised title
    pub title: PageTitle,
    /// Current revision, `None` when it is unreadable (suppressed, broken)
    pub latest: Option<Revision>,
}

/// Read access to pages and their current revisions
pub trait PageStore: Send + Sync {
    /// Look up an existing page by title
    fn page(&self, title: &PageTitle) -> Option<PageRecord>;

    /// Look up an existing page by id
    fn page_by_id(&self, id: PageId) -> Option<PageRecord>;

    /// Whether a local page with this title exists
    fn exists(&self, title: &PageTitle) -> bool {
        !title.is_external() && self.page(title).is_some()
    }
}

impl<T: PageStore + ?Sized> PageStore for Arc<T> {
    fn page(&self, title: &PageTitle) -> Option<PageRecord> {
        (**self).page(title)
    }

    fn page_by_id(&self, id: PageId) -> Option<PageRecord> {
        (**self).page_by_id(id)
    }
}

impl<T: PageStore + ?Sized> PageStore for &T {
    fn page(&self, title: &PageTitle) -> Option<PageRecord> {
        (**self).page(title)
    }

    fn page_by_id(&self, id: PageId) -> Option<PageRecord> {
        (**self).page_by_id(id)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    pages: IndexMap<PageTitle, PageRecord>,
    next_page: u64,
    next_revision: u64,
}

/// Thread-safe in-memory page store
#[derive(Debug, Default)]
pub struct MemoryPageStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryPageStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a new revision, creating the page if needed
    pub fn save(&self, title: &PageTitle, model: ContentModel, text: impl Into<String>) -> RevisionId {
        let mut inner = self.inner.write();
        inner.next_revision += 1;
        let revision = Revision {
            id: RevisionId(inner.next_revision),
            model,
            text: text.into(),
        };
        let revision_id = revision.id;

        if let Some(record) = inner.pages.get_mut(title) {
            record.latest = Some(revision);
        } else {
            inner.next_page += 1;
            let record = PageRecord {
                id: PageId(inner.next_page),
                title: title.clone(),
                latest: Some(revision),
            };
            inner.pages.insert(title.clone(), record);
        }
        tracing::trace!(page = %title, revision = %revision_id, "saved page");
        revision_id
    }

    /// Create a page whose current revision cannot be read
    pub fn create_unreadable(&self, title: &PageTitle) -> PageId {
        let mut inner = self.inner.write();
        if let Some(record) = inner.pages.get_mut(title) {
            record.latest = None;
            return record.id;
        }
        inner.next_page += 1;
        let id = PageId(inner.next_page);
        inner.pages.insert(
            title.clone(),
            PageRecord {
                id,
                title: title.clone(),
                latest: None,
            },
        );
        id
    }

    /// Delete a page, returning its last record
    pub fn delete(&self, title: &PageTitle) -> Option<PageRecord> {
        self.inner.write().pages.shift_remove(title)
    }

    /// Number of pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().pages.len()
    }

    /// Whether the store holds no pages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Titles of all pages in creation order
    #[must_use]
    pub fn titles(&self) -> Vec<PageTitle> {
        self.inner.read().pages.keys().cloned().collect()
    }
}

impl PageStore for MemoryPageStore {
    fn page(&self, title: &PageTitle) -> Option<PageRecord> {
        if title.is_external() {
            return None;
        }
        self.inner.read().pages.get(title).cloned()
    }

    fn page_by_id(&self, id: PageId) -> Option<PageRecord> {
        self.inner
            .read()
            .pages
            .values()
            .find(|record| record.id == id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    fn title(text: &str) -> PageTitle {
        PageTitle::new(Namespace::RAWCSS, text).unwrap()
    }

    #[test]
    fn save_creates_then_updates() {
        let store = MemoryPageStore::new();
        let first = store.save(&title("A.css"), ContentModel::Css, "a{}");
        let second = store.save(&title("A.css"), ContentModel::Css, "b{}");

        assert_ne!(first, second);
        assert_eq!(store.len(), 1);
        let record = store.page(&title("A.css")).unwrap();
        assert_eq!(record.latest.unwrap().text, "b{}");
    }

    #[test]
    fn page_ids_survive_updates() {
        let store = MemoryPageStore::new();
        store.save(&title("A.css"), ContentModel::Css, "a{}");
        let id = store.page(&title("A.css")).unwrap().id;
        store.save(&title("A.css"), ContentModel::Css, "b{}");
        assert_eq!(store.page(&title("A.css")).unwrap().id, id);
        assert_eq!(store.page_by_id(id).unwrap().title, title("A.css"));
    }

    #[test]
    fn delete_removes_page() {
        let store = MemoryPageStore::new();
        store.save(&title("A.css"), ContentModel::Css, "a{}");
        assert!(store.delete(&title("A.css")).is_some());
        assert!(!store.exists(&title("A.css")));
        assert!(store.is_empty());
    }

    #[test]
    fn unreadable_page_exists_without_revision() {
        let store = MemoryPageStore::new();
        store.create_unreadable(&title("Hidden.css"));
        let record = store.page(&title("Hidden.css")).unwrap();
        assert!(record.latest.is_none());
        assert!(store.exists(&title("Hidden.css")));
    }
}
