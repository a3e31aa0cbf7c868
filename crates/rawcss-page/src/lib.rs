//! RawCSS page access
//!
//! The boundary between RawCSS and the wiki's page storage. Everything the
//! application repository knows about pages goes through this crate:
//!
//! - **Titles**: [`PageTitle`] parsing and normalisation, namespaces, interwiki
//! - **Content models**: [`ContentModel`] and the closed [`StyleLanguage`] variant
//! - **Stores**: the [`PageStore`] trait with in-memory and directory backends
//! - **Lookup**: [`StylePageAccessor`], which turns a page name into a
//!   compilable [`StylePage`] or a [`NotFound`] reason
//!
//! # Example
//!
//! ```rust
//! use rawcss_page::{ContentModel, MemoryPageStore, Namespace, PageTitle, StylePageAccessor, TitleParser};
//!
//! let store = MemoryPageStore::new();
//! let title = PageTitle::new(Namespace::RAWCSS, "Main.css").unwrap();
//! store.save(&title, ContentModel::Css, "body{color:red}");
//!
//! let accessor = StylePageAccessor::new(store, TitleParser::new());
//! let page = accessor.resolve("Main.css", Namespace::RAWCSS).unwrap();
//! assert_eq!(page.text, "body{color:red}");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod accessor;
pub mod content;
pub mod directory;
pub mod error;
pub mod namespace;
pub mod store;
pub mod title;

pub use accessor::{StyleFilter, StylePage, StylePageAccessor};
pub use content::{ContentModel, ModelDefaults, StyleLanguage};
pub use directory::DirectoryPageStore;
pub use error::{NotFound, PageError, TitleError};
pub use namespace::Namespace;
pub use store::{MemoryPageStore, PageId, PageRecord, PageStore, Revision, RevisionId};
pub use title::{PageTitle, TitleParser};
