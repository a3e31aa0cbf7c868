//! Content models
//!
//! The wiki tags every revision with a content model. RawCSS only compiles
//! two of them, which [`StyleLanguage`] captures as a closed set.

use crate::namespace::Namespace;
use crate::title::PageTitle;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Content model of a revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentModel {
    /// Ordinary wiki markup
    Wikitext,
    /// Plain CSS
    Css,
    /// Less source
    Less,
    /// Generic JSON
    Json,
    /// The RawCSS application list (JSON dialect)
    #[serde(rename = "rawcss-application-list")]
    ApplicationList,
    /// Anything else the wiki knows about
    Other(String),
}

impl ContentModel {
    /// Model id as the wiki spells it
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Wikitext => "wikitext",
            Self::Css => "css",
            Self::Less => "less",
            Self::Json => "json",
            Self::ApplicationList => "rawcss-application-list",
            Self::Other(id) => id,
        }
    }

    /// Parse a model id
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        match id {
            "wikitext" => Self::Wikitext,
            "css" => Self::Css,
            "less" => Self::Less,
            "json" => Self::Json,
            "rawcss-application-list" => Self::ApplicationList,
            other => Self::Other(other.to_string()),
        }
    }

    /// Style language, if this model is compilable
    #[inline]
    #[must_use]
    pub fn style_language(&self) -> Option<StyleLanguage> {
        match self {
            Self::Less => Some(StyleLanguage::Less),
            Self::Css => Some(StyleLanguage::Css),
            _ => None,
        }
    }
}

impl Display for ContentModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two kinds of style page RawCSS understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleLanguage {
    /// Less source, compiled with variables
    Less,
    /// Plain CSS, passed through untouched
    Css,
}

impl StyleLanguage {
    /// Matching content model
    #[inline]
    #[must_use]
    pub fn content_model(self) -> ContentModel {
        match self {
            Self::Less => ContentModel::Less,
            Self::Css => ContentModel::Css,
        }
    }
}

/// Rules for picking the model of a page that has none recorded
#[derive(Debug, Clone)]
pub struct ModelDefaults {
    /// The application specification page
    pub specification_page: PageTitle,
    /// Whether `Template:*.css` pages default to CSS
    pub template_css: bool,
}

impl ModelDefaults {
    /// Defaults for `specification_page`, template CSS disabled
    #[inline]
    #[must_use]
    pub fn new(specification_page: PageTitle) -> Self {
        Self {
            specification_page,
            template_css: false,
        }
    }

    /// Enable or disable the `Template:*.css` rule
    #[inline]
    #[must_use]
    pub fn with_template_css(mut self, enabled: bool) -> Self {
        self.template_css = enabled;
        self
    }

    /// Default content model for `title`
    #[must_use]
    pub fn model_for(&self, title: &PageTitle) -> ContentModel {
        if title == &self.specification_page {
            return if title.text().ends_with(".json") {
                ContentModel::ApplicationList
            } else {
                ContentModel::Wikitext
            };
        }

        let text = title.text();
        match title.namespace() {
            Namespace::RAWCSS if text.ends_with(".less") => ContentModel::Less,
            Namespace::RAWCSS if text.ends_with(".css") => ContentModel::Css,
            Namespace::TEMPLATE if self.template_css && text.ends_with(".css") => ContentModel::Css,
            _ => ContentModel::Wikitext,
        }
    }
}
