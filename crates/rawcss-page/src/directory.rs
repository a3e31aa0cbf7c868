//! Directory-backed page store
//!
//! Maps a directory tree onto wiki pages so RawCSS can run outside a wiki:
//!
//! ```text
//! pages/
//!   MediaWiki/RawCSS-applications.json   -> MediaWiki:RawCSS-applications.json
//!   RawCSS/Theme.less                    -> RawCSS:Theme.less
//!   Template/Navbox                      -> Template:Navbox
//!   Template/Infobox/styles.css          -> Template:Infobox/styles.css
//! ```
//!
//! Content models come from [`ModelDefaults`]. Revision ids are derived from
//! the file contents, so they are stable across processes and change exactly
//! when the text changes.

use crate::content::ModelDefaults;
use crate::error::PageError;
use crate::namespace::Namespace;
use crate::store::{PageId, PageRecord, PageStore, Revision, RevisionId};
use crate::title::PageTitle;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read-only snapshot of a page directory
#[derive(Debug)]
pub struct DirectoryPageStore {
    root: PathBuf,
    defaults: ModelDefaults,
    pages: RwLock<IndexMap<PageTitle, PageRecord>>,
}

impl DirectoryPageStore {
    /// Load every page under `root`
    ///
    /// # Errors
    /// Returns [`PageError`] if the tree cannot be read or a file name is not
    /// a valid title.
    pub fn open(root: impl Into<PathBuf>, defaults: ModelDefaults) -> Result<Self, PageError> {
        let root = root.into();
        let pages = load(&root, &defaults)?;
        tracing::debug!(root = %root.display(), pages = pages.len(), "loaded page directory");
        Ok(Self {
            root,
            defaults,
            pages: RwLock::new(pages),
        })
    }

    /// Re-read the directory, replacing the snapshot
    ///
    /// # Errors
    /// Same as [`DirectoryPageStore::open`]; the old snapshot is kept on error.
    pub fn reload(&self) -> Result<(), PageError> {
        let pages = load(&self.root, &self.defaults)?;
        *self.pages.write() = pages;
        Ok(())
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Titles of all loaded pages
    #[must_use]
    pub fn titles(&self) -> Vec<PageTitle> {
        self.pages.read().keys().cloned().collect()
    }
}

impl PageStore for DirectoryPageStore {
    fn page(&self, title: &PageTitle) -> Option<PageRecord> {
        if title.is_external() {
            return None;
        }
        self.pages.read().get(title).cloned()
    }

    fn page_by_id(&self, id: PageId) -> Option<PageRecord> {
        self.pages.read().values().find(|p| p.id == id).cloned()
    }
}

fn load(root: &Path, defaults: &ModelDefaults) -> Result<IndexMap<PageTitle, PageRecord>, PageError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
            PageError::io_error(path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let mut pages = IndexMap::new();
    for path in files {
        let Some(title) = title_for(root, &path)? else {
            tracing::warn!(path = %path.display(), "skipping file outside known namespaces");
            continue;
        };
        let bytes = std::fs::read(&path).map_err(|e| PageError::io_error(&path, e))?;
        let text = String::from_utf8(bytes).map_err(|_| PageError::NotUtf8 { path: path.clone() })?;

        let revision = Revision {
            id: revision_id_for(&text),
            model: defaults.model_for(&title),
            text,
        };
        let id = PageId(pages.len() as u64 + 1);
        pages.insert(
            title.clone(),
            PageRecord {
                id,
                title,
                latest: Some(revision),
            },
        );
    }
    Ok(pages)
}

fn title_for(root: &Path, path: &Path) -> Result<Option<PageTitle>, PageError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let (namespace, rest) = match components.as_slice() {
        [] => return Ok(None),
        [single] => (Namespace::MAIN, vec![single.clone()]),
        [first, rest @ ..] => {
            let namespace = Namespace::from_name(first).or_else(|| first.parse().ok().map(Namespace::new));
            match namespace {
                Some(ns) => (ns, rest.to_vec()),
                None => return Ok(None),
            }
        }
    };

    PageTitle::new(namespace, &rest.join("/"))
        .map(Some)
        .map_err(|source| PageError::InvalidTitle {
            path: path.to_path_buf(),
            source,
        })
}

fn revision_id_for(text: &str) -> RevisionId {
    let hash = blake3::hash(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    // keep ids positive and non-zero so they never collide with the sentinel
    RevisionId((u64::from_le_bytes(bytes) >> 1).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentModel;
    use std::fs;

    fn defaults() -> ModelDefaults {
        ModelDefaults::new(PageTitle::new(Namespace::MEDIAWIKI, "RawCSS-applications.json").unwrap())
    }

    #[test]
    fn maps_directories_to_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("RawCSS")).unwrap();
        fs::create_dir_all(dir.path().join("Template/Infobox")).unwrap();
        fs::create_dir_all(dir.path().join("MediaWiki")).unwrap();
        fs::write(dir.path().join("RawCSS/Theme.less"), "@c: red;").unwrap();
        fs::write(dir.path().join("Template/Infobox/styles.css"), "a{}").unwrap();
        fs::write(dir.path().join("MediaWiki/RawCSS-applications.json"), "{}").unwrap();

        let store = DirectoryPageStore::open(dir.path(), defaults()).unwrap();

        let less = store.page(&PageTitle::new(Namespace::RAWCSS, "Theme.less").unwrap()).unwrap();
        assert_eq!(less.latest.unwrap().model, ContentModel::Less);

        let nested = PageTitle::new(Namespace::TEMPLATE, "Infobox/styles.css").unwrap();
        assert!(store.exists(&nested));

        let spec = store
            .page(&PageTitle::new(Namespace::MEDIAWIKI, "RawCSS-applications.json").unwrap())
            .unwrap();
        assert_eq!(spec.latest.unwrap().model, ContentModel::ApplicationList);
    }

    #[test]
    fn revision_ids_follow_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("RawCSS")).unwrap();
        let path = dir.path().join("RawCSS/A.css");
        fs::write(&path, "a{}").unwrap();

        let store = DirectoryPageStore::open(dir.path(), defaults()).unwrap();
        let title = PageTitle::new(Namespace::RAWCSS, "A.css").unwrap();
        let before = store.page(&title).unwrap().latest.unwrap().id;

        fs::write(&path, "b{}").unwrap();
        store.reload().unwrap();
        let after = store.page(&title).unwrap().latest.unwrap().id;
        assert_ne!(before, after);

        fs::write(&path, "a{}").unwrap();
        store.reload().unwrap();
        assert_eq!(store.page(&title).unwrap().latest.unwrap().id, before);
    }

    #[test]
    fn unknown_top_level_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Scratch")).unwrap();
        fs::write(dir.path().join("Scratch/notes.txt"), "x").unwrap();
        let store = DirectoryPageStore::open(dir.path(), defaults()).unwrap();
        assert!(store.titles().is_empty());
    }
}
