//! Repository configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! specification_page = "MediaWiki:RawCSS-applications.json"
//! skins = ["vector-2022", "timeless"]
//!
//! [cache]
//! ttl_secs = 86400
//! version_bump = 1
//! ```

use crate::error::ConfigError;
use rawcss_page::{ModelDefaults, Namespace, PageTitle, TitleParser};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default title of the specification page
pub const DEFAULT_SPECIFICATION_PAGE: &str = "MediaWiki:RawCSS-applications.json";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCssConfig {
    /// Page holding the application specification
    pub specification_page: String,
    /// Namespace application bases must live in
    pub base_namespace: String,
    /// Namespaces style pages may live in
    pub style_namespaces: Vec<String>,
    /// Interwiki prefixes, titles using them are external
    pub interwiki: Vec<String>,
    /// Whether `Template:*.css` pages default to the CSS model
    pub template_css: bool,
    /// Skins applications are served to, empty for every skin
    pub skins: Vec<String>,
    /// Cache behaviour
    pub cache: CacheSettings,
}

impl Default for RawCssConfig {
    fn default() -> Self {
        Self {
            specification_page: DEFAULT_SPECIFICATION_PAGE.to_string(),
            base_namespace: "Template".to_string(),
            style_namespaces: vec!["RawCSS".to_string(), "Template".to_string()],
            interwiki: Vec::new(),
            template_css: false,
            skins: Vec::new(),
            cache: CacheSettings::default(),
        }
    }
}

impl RawCssConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Toml`] for malformed input.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Toml`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        Self::from_toml_str(&text)
    }

    /// With specification page
    #[inline]
    #[must_use]
    pub fn with_specification_page(mut self, name: impl Into<String>) -> Self {
        self.specification_page = name.into();
        self
    }

    /// With skin allow-list
    #[must_use]
    pub fn with_skins<I, S>(mut self, skins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skins = skins.into_iter().map(Into::into).collect();
        self
    }

    /// With interwiki prefixes
    #[must_use]
    pub fn with_interwiki<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interwiki = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// With `Template:*.css` model default
    #[inline]
    #[must_use]
    pub fn with_template_css(mut self, enabled: bool) -> Self {
        self.template_css = enabled;
        self
    }

    /// With cache settings
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }

    /// Title parser knowing the configured interwiki prefixes
    #[must_use]
    pub fn title_parser(&self) -> TitleParser {
        TitleParser::with_interwiki(&self.interwiki)
    }

    /// Parsed specification page title
    ///
    /// # Errors
    /// Returns [`ConfigError::SpecificationPage`] if the name is not a title, or
    /// [`ConfigError::ExternalSpecificationPage`] if it names another wiki.
    pub fn specification_title(&self) -> Result<PageTitle, ConfigError> {
        let invalid = |source| ConfigError::SpecificationPage {
            name: self.specification_page.clone(),
            source,
        };
        let title = self
            .title_parser()
            .parse(&self.specification_page, Namespace::MEDIAWIKI)
            .map_err(invalid)?;
        if title.is_external() {
            return Err(ConfigError::ExternalSpecificationPage(self.specification_page.clone()));
        }
        Ok(title)
    }

    /// Namespace bases are resolved in
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownNamespace`].
    pub fn base_namespace_id(&self) -> Result<Namespace, ConfigError> {
        namespace(&self.base_namespace)
    }

    /// Namespaces style pages are accepted from
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownNamespace`] for the first unknown name.
    pub fn style_namespace_ids(&self) -> Result<Vec<Namespace>, ConfigError> {
        self.style_namespaces.iter().map(|name| namespace(name)).collect()
    }

    /// Content model defaults for page stores
    ///
    /// # Errors
    /// Returns [`ConfigError::SpecificationPage`].
    pub fn model_defaults(&self) -> Result<ModelDefaults, ConfigError> {
        Ok(ModelDefaults::new(self.specification_title()?).with_template_css(self.template_css))
    }

    /// Whether applications are served to `skin`
    #[must_use]
    pub fn skin_allowed(&self, skin: &str) -> bool {
        self.skins.is_empty() || self.skins.iter().any(|s| s.eq_ignore_ascii_case(skin))
    }
}

fn namespace(name: &str) -> Result<Namespace, ConfigError> {
    Namespace::from_name(name).ok_or_else(|| ConfigError::UnknownNamespace(name.to_string()))
}

/// Application cache timings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Logical lifetime of a cached value
    pub ttl_secs: u64,
    /// Lifetime of the fill lock
    pub lock_ttl_secs: u64,
    /// How long a caller without a stale value waits for another fill
    pub lock_wait_ms: u64,
    /// Delay between polls while waiting
    pub poll_interval_ms: u64,
    /// Added to the schema version; raise to discard every cached value
    pub version_bump: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            lock_ttl_secs: 10,
            lock_wait_ms: 2_000,
            poll_interval_ms: 50,
            version_bump: 0,
        }
    }
}

impl CacheSettings {
    /// Logical TTL
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Lock TTL
    #[inline]
    #[must_use]
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// Maximum wait for another caller's fill
    #[inline]
    #[must_use]
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// Poll interval while waiting
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// With TTL in seconds
    #[inline]
    #[must_use]
    pub fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.ttl_secs = secs;
        self
    }

    /// With lock wait in milliseconds
    #[inline]
    #[must_use]
    pub fn with_lock_wait_ms(mut self, ms: u64) -> Self {
        self.lock_wait_ms = ms;
        self
    }

    /// With poll interval in milliseconds
    #[inline]
    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// With version bump
    #[inline]
    #[must_use]
    pub fn with_version_bump(mut self, bump: u32) -> Self {
        self.version_bump = bump;
        self
    }
}
