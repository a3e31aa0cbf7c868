//! Value rules shared by every dialect

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::{DraftPreload, DraftVariable};
use crate::error::ValidationError;
use crate::model::PreloadDirective;

static VARIABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9,\s-]+$").expect("variable name regex"));

/// Base for checking relative preload references
static RELATIVE_BASE: Lazy<Url> = Lazy::new(|| Url::parse("https://wiki.invalid/").expect("static base URL"));

/// Punctuation kept by URL sanitising, besides ASCII letters and digits
const URL_PUNCTUATION: &str = "$-_.+!*'(),{}|\\^~[]`<>#%\";/?:@&=";

/// Check a variable override
///
/// Names are lowercase words, digits, commas and dashes, and cannot start
/// with `--` (custom properties). Values cannot end the declaration or open
/// a comment.
///
/// # Errors
/// [`ValidationError::InvalidVariableName`] or
/// [`ValidationError::InvalidVariableValue`].
pub fn check_variable(variable: &DraftVariable) -> Result<(), ValidationError> {
    let name = variable.name.as_str();
    if !VARIABLE_NAME.is_match(name) || name.starts_with("--") {
        return Err(ValidationError::InvalidVariableName {
            path: variable.path.clone(),
            name: name.to_string(),
        });
    }
    let value = variable.value.as_str();
    if value.contains(';') || value.contains("/*") || value.contains("*/") {
        return Err(ValidationError::InvalidVariableValue {
            path: variable.path.clone(),
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Drop every character that cannot appear in a URL
#[must_use]
pub fn sanitize_href(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || URL_PUNCTUATION.contains(*c))
        .collect()
}

/// Whether a sanitised href is acceptable
///
/// Absolute URLs need a scheme and a host. Relative references must start
/// with `/`, `./` or `../`.
#[must_use]
pub fn is_valid_href(href: &str) -> bool {
    if href.is_empty() {
        return false;
    }
    if href.starts_with('/') || href.starts_with("./") || href.starts_with("../") {
        return RELATIVE_BASE.join(href).is_ok();
    }
    Url::parse(href).is_ok_and(|url| url.host_str().is_some_and(|host| !host.is_empty()))
}

/// Turn a draft preload entry into a directive
///
/// # Errors
/// [`ValidationError::MissingData`] for an absent `href` or `as`,
/// [`ValidationError::InvalidPreloadHref`] for an unusable URL.
pub fn preload_directive(draft: DraftPreload) -> Result<PreloadDirective, ValidationError> {
    let raw = draft
        .href
        .ok_or_else(|| ValidationError::missing(draft.path.key("href")))?;
    let href = sanitize_href(&raw);
    if !is_valid_href(&href) {
        return Err(ValidationError::InvalidPreloadHref {
            path: draft.path.key("href"),
            href: raw,
        });
    }

    let destination = draft
        .destination
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ValidationError::missing(draft.path.key("as")))?;

    Ok(PreloadDirective {
        href,
        destination,
        mime_type: draft.mime_type,
        media: draft.media,
        cross_origin: draft.cross_origin,
    })
}
