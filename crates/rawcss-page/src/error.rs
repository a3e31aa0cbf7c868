//! Error types for page access
//!
//! - [`TitleError`]: a page name could not be turned into a title
//! - [`NotFound`]: a style page lookup found nothing usable
//! - [`PageError`]: a page store backend failed to load

use crate::content::ContentModel;
use crate::title::PageTitle;
use std::path::PathBuf;

/// Errors while parsing a page title
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TitleError {
    /// Nothing left after trimming and prefix removal
    #[error("empty title")]
    Empty,

    /// Title contains a character the wiki forbids
    #[error("title '{title}' contains illegal character '{character}'")]
    IllegalCharacter { title: String, character: char },

    /// Title exceeds the storage limit
    #[error("title is {length} bytes long (max 255)")]
    TooLong { length: usize },
}

/// Reasons a style page lookup produced nothing usable
///
/// Every variant is soft at resolution time: the entry becomes a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFound {
    /// The page name is not a valid title
    #[error("invalid style page name '{name}': {source}")]
    InvalidTitle {
        name: String,
        #[source]
        source: TitleError,
    },

    /// The title points at another wiki
    #[error("style page {title} is external")]
    External { title: PageTitle },

    /// The title is outside the style namespaces
    #[error("style page {title} is outside the allowed namespaces")]
    NamespaceNotAllowed { title: PageTitle },

    /// No page with this title
    #[error("style page {title} does not exist")]
    Missing { title: PageTitle },

    /// The page exists but has no readable current revision
    #[error("style page {title} has no readable revision")]
    NoRevision { title: PageTitle },

    /// The page is neither Less nor CSS
    #[error("style page {title} has unsupported content model '{model}'")]
    UnsupportedModel { title: PageTitle, model: ContentModel },

    /// The page is CSS but a style-language page was required
    #[error("style page {title} is not a style-language page")]
    NotStyleLanguage { title: PageTitle },
}

impl NotFound {
    /// Title the lookup was about, when it got that far
    #[must_use]
    pub fn title(&self) -> Option<&PageTitle> {
        match self {
            Self::InvalidTitle { .. } => None,
            Self::External { title }
            | Self::NamespaceNotAllowed { title }
            | Self::Missing { title }
            | Self::NoRevision { title }
            | Self::UnsupportedModel { title, .. }
            | Self::NotStyleLanguage { title } => Some(title),
        }
    }
}

/// Errors from page store backends
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// Filesystem failure
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file name does not map to a valid title
    #[error("file {path} does not map to a page title: {source}")]
    InvalidTitle {
        path: PathBuf,
        #[source]
        source: TitleError,
    },

    /// A file is not valid UTF-8 text
    #[error("file {path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },
}

impl PageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;

    #[test]
    fn not_found_display_includes_title() {
        let title = PageTitle::new(Namespace::RAWCSS, "Gone.css").unwrap();
        let err = NotFound::Missing { title };
        assert_eq!(err.to_string(), "style page RawCSS:Gone.css does not exist");
    }

    #[test]
    fn invalid_title_has_no_title() {
        let err = NotFound::InvalidTitle {
            name: "{bad}".to_string(),
            source: TitleError::Empty,
        };
        assert!(err.title().is_none());
    }
}
