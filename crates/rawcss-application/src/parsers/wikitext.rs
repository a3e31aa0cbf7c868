//! Structured-section wikitext dialect
//!
//! ```text
//! == Infobox ==
//! === Infobox.less ===
//! ; accent: #36c
//! === __preload font ===
//! ; href: /w/fonts/a.woff2
//! ; as: font
//! ; crossorigin: 1
//! ```
//!
//! A level-2 heading opens an application (`*` for the wildcard), each
//! level-3 heading inside it names a style page or, with the `__preload`
//! prefix, a preload entry. `; key: value` lines fill the current section.
//! Everything else on the page is ordinary wikitext and is ignored.

use super::{DraftApplication, DraftCoating, DraftPreload, DraftVariable, FailurePolicy, SpecificationDialect};
use crate::error::ValidationError;
use once_cell::sync::Lazy;
use rawcss_page::ContentModel;
use regex::Regex;
use tracing::debug;

static APPLICATION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^== *([\w-]+|\*) *==\s*$").expect("application heading regex"));

static SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^===([^=].*?)===\s*$").expect("section heading regex"));

static DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^; *([\w-]+) *: *(.+?) *$").expect("definition regex"));

const PRELOAD_PREFIX: &str = "__preload";

/// Lenient section dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct WikitextDialect;

impl SpecificationDialect for WikitextDialect {
    fn name(&self) -> &'static str {
        "wikitext"
    }

    fn handles(&self, model: &ContentModel) -> bool {
        *model == ContentModel::Wikitext
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Skip
    }

    fn read(&self, text: &str) -> Result<Vec<DraftApplication>, ValidationError> {
        let mut reader = Reader::default();
        for (number, line) in text.lines().enumerate() {
            reader.line(number + 1, line);
        }
        Ok(reader.finish())
    }
}

enum Section {
    Coating(DraftCoating),
    Preload(DraftPreload),
}

#[derive(Default)]
struct Reader {
    done: Vec<DraftApplication>,
    application: Option<DraftApplication>,
    section: Option<Section>,
}

impl Reader {
    fn line(&mut self, number: usize, line: &str) {
        if let Some(captures) = SECTION_HEADING.captures(line) {
            self.close_section();
            let name = captures[1].trim();
            match &self.application {
                Some(application) if !name.is_empty() => self.section = Some(section(application, name)),
                _ => debug!(line = number, "section heading outside an application"),
            }
        } else if let Some(captures) = APPLICATION_HEADING.captures(line) {
            self.close_application();
            self.application = Some(DraftApplication::new(&captures[1]));
        } else if line.starts_with('=') && !line.starts_with("===") {
            self.close_application();
        } else if let Some(captures) = DEFINITION.captures(line) {
            self.definition(number, &captures[1], &captures[2]);
        } else if line.starts_with(';') {
            debug!(line = number, "ignoring malformed definition");
        }
    }

    fn definition(&mut self, number: usize, key: &str, value: &str) {
        match &mut self.section {
            Some(Section::Coating(coating)) => coating.variables.push(DraftVariable {
                name: key.to_string(),
                value: value.to_string(),
                path: coating.path.key("variables").key(key),
            }),
            Some(Section::Preload(preload)) => {
                let value = Some(value.to_string());
                match key {
                    "href" => preload.href = value,
                    "as" => preload.destination = value,
                    "type" => preload.mime_type = value,
                    "media" => preload.media = value,
                    "crossorigin" => preload.cross_origin = value.is_some_and(|v| !v.is_empty() && v != "0"),
                    _ => debug!(line = number, key, "ignoring unknown preload key"),
                }
            }
            None => debug!(line = number, key, "definition outside a section"),
        }
    }

    fn close_section(&mut self) {
        let (Some(application), Some(section)) = (self.application.as_mut(), self.section.take()) else {
            return;
        };
        match section {
            Section::Coating(coating) => application.coatings.push(coating),
            Section::Preload(preload) => application.preload.push(preload),
        }
    }

    fn close_application(&mut self) {
        self.close_section();
        if let Some(application) = self.application.take() {
            self.done.push(application);
        }
    }

    fn finish(mut self) -> Vec<DraftApplication> {
        self.close_application();
        self.done
    }
}

fn section(application: &DraftApplication, name: &str) -> Section {
    if name.starts_with(PRELOAD_PREFIX) {
        Section::Preload(DraftPreload {
            path: application.path.key("preload").index(application.preload.len()),
            ..DraftPreload::default()
        })
    } else {
        Section::Coating(DraftCoating {
            page: name.to_string(),
            path: application.path.key("coatings").index(application.coatings.len()),
            variables: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read(text: &str) -> Vec<DraftApplication> {
        WikitextDialect.read(text).unwrap()
    }

    #[test]
    fn reads_sections_and_definitions() {
        let drafts = read(
            "Intro prose.\n\n== Infobox ==\n=== Infobox.less ===\n; accent : #36c \n; size: 2px\n\n\
             === __preload font ===\n; href: /w/a.woff2\n; as: font\n; crossorigin: 1\n=== Extra.css ===\n",
        );
        assert_eq!(drafts.len(), 1);
        let app = &drafts[0];
        assert_eq!(app.key, "Infobox");
        assert_eq!(app.coatings.len(), 2);
        assert_eq!(app.coatings[0].page, "Infobox.less");
        assert_eq!(app.coatings[0].variables[0].name, "accent");
        assert_eq!(app.coatings[0].variables[0].value, "#36c");
        assert_eq!(app.coatings[0].variables[1].path.to_string(), ".Infobox.coatings[0].variables.size");
        assert_eq!(app.coatings[1].path.to_string(), ".Infobox.coatings[1]");

        let preload = &app.preload[0];
        assert_eq!(preload.href.as_deref(), Some("/w/a.woff2"));
        assert_eq!(preload.destination.as_deref(), Some("font"));
        assert!(preload.cross_origin);
        assert_eq!(preload.path.to_string(), ".Infobox.preload[0]");
    }

    #[test]
    fn wildcard_and_multiple_applications() {
        let drafts = read("== * ==\n=== A.css ===\n== Navbox ==\n=== B.css ===\n=== C.css ===\n");
        let keys: Vec<_> = drafts.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["*", "Navbox"]);
        assert_eq!(drafts[1].coatings.len(), 2);
    }

    #[test]
    fn other_headings_close_the_application() {
        let drafts = read("== * ==\n=== A.css ===\n== Notes and remarks ==\n=== B.css ===\n; x: y\n");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].coatings.len(), 1);
    }

    #[test]
    fn stray_lines_are_ignored() {
        let drafts = read("; x: y\n=== A.css ===\n== * ==\n; early: 1\n=== A.css ===\n;broken\n==== Deep ====\n");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].coatings.len(), 1);
        assert!(drafts[0].coatings[0].variables.is_empty());
    }

    #[test]
    fn crossorigin_zero_is_false() {
        let drafts = read("== * ==\n=== __preload ===\n; href: /a.png\n; as: image\n; crossorigin: 0\n");
        assert!(!drafts[0].preload[0].cross_origin);
    }

    #[test]
    fn applications_without_sections_are_kept_for_validation() {
        let drafts = read("== * ==\nNothing here yet.\n");
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].coatings.is_empty());
    }
}
