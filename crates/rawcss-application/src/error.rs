//! Error types for the application repository
//!
//! - [`ValidationError`]: a specification page that cannot be accepted, with
//!   the structured path of the offending value
//! - [`CacheError`]: a cache value that cannot be encoded or decoded
//! - [`ConfigError`]: configuration that cannot be loaded
//! - [`RepositoryError`]: anything that stops a repository from being built
//!
//! Compile failures and missing style pages are not errors at this level:
//! the resolver turns them into placeholders.

use rawcss_page::TitleError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// One step in a [`SpecPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object member, `.name`
    Key(String),
    /// Array element, `[3]`
    Index(usize),
    /// The array as a whole, `[]`
    Elements,
}

/// Location of a value inside a specification, e.g. `.Infobox.preload[0].href`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SpecPath(Vec<PathSegment>);

impl SpecPath {
    /// The document root, displayed as `.`
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Path to member `key` of this value
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.with(PathSegment::Key(key.into()))
    }

    /// Path to element `index` of this array
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.with(PathSegment::Index(index))
    }

    /// Path to the elements of this array as a group
    #[must_use]
    pub fn elements(&self) -> Self {
        self.with(PathSegment::Elements)
    }

    /// Segments from the root
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    fn with(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }
}

impl Display for SpecPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(".");
        }
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Elements => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

/// Category of a [`ValidationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    /// The page text is not decodable
    InvalidSyntax,
    /// A value has the wrong type
    InvalidDataType,
    /// A required value is absent or empty
    MissingData,
    /// An application identifier does not name a usable base page
    InvalidBase,
    /// A referenced style page is unusable
    InvalidCoating,
    /// A variable name is not allowed
    InvalidVariableName,
    /// A variable value is not allowed
    InvalidVariableValue,
    /// A preload URL does not validate
    InvalidPreloadHref,
}

/// A rejected specification value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Undecodable page text
    #[error("{path}: invalid syntax: {message}")]
    InvalidSyntax { path: SpecPath, message: String },

    /// Value of the wrong type
    #[error("{path}: expected {expected}")]
    InvalidDataType { path: SpecPath, expected: &'static str },

    /// Required value missing
    #[error("{path}: required data is missing")]
    MissingData { path: SpecPath },

    /// Application identifier does not name an existing local base page
    #[error("{path}: \"{name}\" is not an existing local base page")]
    InvalidBase { path: SpecPath, name: String },

    /// Style page cannot be used as a coating
    #[error("{path}: \"{name}\" cannot be used as a coating: {reason}")]
    InvalidCoating {
        path: SpecPath,
        name: String,
        reason: String,
    },

    /// Variable name outside the allowed alphabet or starting with `--`
    #[error("{path}: invalid variable name \"{name}\"")]
    InvalidVariableName { path: SpecPath, name: String },

    /// Variable value that could escape its declaration
    #[error("{path}: invalid value for variable \"{name}\"")]
    InvalidVariableValue { path: SpecPath, name: String },

    /// Preload URL that fails validation after sanitising
    #[error("{path}: invalid preload URL \"{href}\"")]
    InvalidPreloadHref { path: SpecPath, href: String },
}

impl ValidationError {
    /// Create syntax error at the document root
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            path: SpecPath::root(),
            message: message.into(),
        }
    }

    /// Create data-type error
    #[must_use]
    pub fn data_type(path: SpecPath, expected: &'static str) -> Self {
        Self::InvalidDataType { path, expected }
    }

    /// Create missing-data error
    #[must_use]
    pub fn missing(path: SpecPath) -> Self {
        Self::MissingData { path }
    }

    /// Path of the offending value
    #[must_use]
    pub fn path(&self) -> &SpecPath {
        match self {
            Self::InvalidSyntax { path, .. }
            | Self::InvalidDataType { path, .. }
            | Self::MissingData { path }
            | Self::InvalidBase { path, .. }
            | Self::InvalidCoating { path, .. }
            | Self::InvalidVariableName { path, .. }
            | Self::InvalidVariableValue { path, .. }
            | Self::InvalidPreloadHref { path, .. } => path,
        }
    }

    /// Error category
    #[must_use]
    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            Self::InvalidSyntax { .. } => ValidationErrorKind::InvalidSyntax,
            Self::InvalidDataType { .. } => ValidationErrorKind::InvalidDataType,
            Self::MissingData { .. } => ValidationErrorKind::MissingData,
            Self::InvalidBase { .. } => ValidationErrorKind::InvalidBase,
            Self::InvalidCoating { .. } => ValidationErrorKind::InvalidCoating,
            Self::InvalidVariableName { .. } => ValidationErrorKind::InvalidVariableName,
            Self::InvalidVariableValue { .. } => ValidationErrorKind::InvalidVariableValue,
            Self::InvalidPreloadHref { .. } => ValidationErrorKind::InvalidPreloadHref,
        }
    }
}

/// Errors encoding or decoding cache values
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Stored value is not a readable envelope
    #[error("corrupt cache value under {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be encoded
    #[error("cannot encode cache value: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file unreadable
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Specification page title does not parse
    #[error("invalid specification page \"{name}\": {source}")]
    SpecificationPage {
        name: String,
        #[source]
        source: TitleError,
    },

    /// Specification page on another wiki
    #[error("specification page \"{0}\" is external")]
    ExternalSpecificationPage(String),

    /// Namespace name not known to the wiki
    #[error("unknown namespace \"{0}\"")]
    UnknownNamespace(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Combined repository error
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Unusable configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rejected specification
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unreadable cache value
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;
