//! Application-list JSON dialect
//!
//! ```json
//! {
//!   "*":       { "coatings": ["Site.css"] },
//!   "Infobox": {
//!     "coatings":  ["Infobox.less", "Template:Infobox/extra.css"],
//!     "variables": { "accent": "#36c" },
//!     "preload":   [{ "href": "/w/fonts/a.woff2", "as": "font", "crossorigin": true }]
//!   }
//! }
//! ```
//!
//! Reading checks the document's shape; the first value of the wrong type
//! fails the read.

use super::{DraftApplication, DraftCoating, DraftPreload, DraftVariable, FailurePolicy, SpecificationDialect};
use crate::error::{SpecPath, ValidationError};
use rawcss_page::ContentModel;
use serde_json::{Map, Value};

/// Strict JSON dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDialect;

impl SpecificationDialect for JsonDialect {
    fn name(&self) -> &'static str {
        "json"
    }

    fn handles(&self, model: &ContentModel) -> bool {
        matches!(model, ContentModel::ApplicationList | ContentModel::Json)
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Abort
    }

    fn read(&self, text: &str) -> Result<Vec<DraftApplication>, ValidationError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ValidationError::syntax(e.to_string()))?;
        let Value::Object(root) = value else {
            return Err(ValidationError::data_type(SpecPath::root(), "object"));
        };
        root.into_iter()
            .map(|(key, specification)| application(key, specification))
            .collect()
    }
}

fn application(key: String, specification: Value) -> Result<DraftApplication, ValidationError> {
    let mut draft = DraftApplication::new(key);
    let Value::Object(mut members) = specification else {
        return Err(ValidationError::data_type(draft.path, "object"));
    };

    if let Some(variables) = members.remove("variables") {
        draft.variables = variable_map(&draft.path.key("variables"), variables)?;
    }

    let coatings_path = draft.path.key("coatings");
    match members.remove("coatings") {
        None => return Err(ValidationError::missing(coatings_path)),
        Some(Value::Array(items)) => {
            for (index, item) in items.into_iter().enumerate() {
                let path = coatings_path.index(index);
                let Value::String(page) = item else {
                    return Err(ValidationError::data_type(path, "string"));
                };
                draft.coatings.push(DraftCoating {
                    page,
                    path,
                    variables: Vec::new(),
                });
            }
        }
        Some(_) => return Err(ValidationError::data_type(coatings_path, "array")),
    }

    let preload_path = draft.path.key("preload");
    match members.remove("preload") {
        None => {}
        Some(Value::Array(items)) => {
            for (index, item) in items.into_iter().enumerate() {
                draft.preload.push(preload(preload_path.index(index), item)?);
            }
        }
        Some(_) => return Err(ValidationError::data_type(preload_path, "array")),
    }

    Ok(draft)
}

fn variable_map(path: &SpecPath, value: Value) -> Result<Vec<DraftVariable>, ValidationError> {
    let Value::Object(entries) = value else {
        return Err(ValidationError::data_type(path.clone(), "object"));
    };
    entries
        .into_iter()
        .map(|(name, value)| {
            let path = path.key(name.as_str());
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return Err(ValidationError::data_type(path, "string")),
            };
            Ok(DraftVariable { name, value, path })
        })
        .collect()
}

fn preload(path: SpecPath, value: Value) -> Result<DraftPreload, ValidationError> {
    let Value::Object(mut members) = value else {
        return Err(ValidationError::data_type(path, "object"));
    };
    Ok(DraftPreload {
        href: string_member(&mut members, &path, "href")?,
        destination: string_member(&mut members, &path, "as")?,
        mime_type: string_member(&mut members, &path, "type")?,
        media: string_member(&mut members, &path, "media")?,
        cross_origin: members.get("crossorigin").is_some_and(truthy),
        path,
    })
}

fn string_member(members: &mut Map<String, Value>, path: &SpecPath, name: &str) -> Result<Option<String>, ValidationError> {
    match members.remove(name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ValidationError::data_type(path.key(name), "string")),
    }
}

/// Loose truthiness: `false`, `0`, `""`, `"0"`, `null` and empty containers are false
pub(super) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn read(text: &str) -> Result<Vec<DraftApplication>, ValidationError> {
        JsonDialect.read(text)
    }

    fn read_err(text: &str) -> (ValidationErrorKind, String) {
        let err = read(text).unwrap_err();
        (err.kind(), err.path().to_string())
    }

    #[test]
    fn reads_applications_in_document_order() {
        let drafts = read(r#"{"Zeta": {"coatings": ["A"]}, "*": {"coatings": ["B", "C"]}}"#).unwrap();
        let keys: Vec<_> = drafts.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["Zeta", "*"]);
        assert_eq!(drafts[1].coatings[1].page, "C");
        assert_eq!(drafts[1].coatings[1].path.to_string(), ".*.coatings[1]");
    }

    #[test]
    fn reads_variables_and_preload() {
        let drafts = read(
            r##"{"*": {
                "coatings": ["A"],
                "variables": {"accent": "#36c", "size": 12},
                "preload": [{"href": "/f.woff2", "as": "font", "type": "font/woff2", "media": "print", "crossorigin": "1"}]
            }}"##,
        )
        .unwrap();
        let app = &drafts[0];
        assert_eq!(app.variables[1].value, "12");
        assert_eq!(app.variables[0].path.to_string(), ".*.variables.accent");
        assert_eq!(
            app.preload[0],
            DraftPreload {
                path: SpecPath::root().key("*").key("preload").index(0),
                href: Some("/f.woff2".into()),
                destination: Some("font".into()),
                mime_type: Some("font/woff2".into()),
                media: Some("print".into()),
                cross_origin: true,
            }
        );
    }

    #[test]
    fn shape_errors() {
        assert_eq!(read_err("[1]"), (ValidationErrorKind::InvalidDataType, ".".into()));
        assert_eq!(read_err("{"), (ValidationErrorKind::InvalidSyntax, ".".into()));
        assert_eq!(read_err(r#"{"*": 1}"#), (ValidationErrorKind::InvalidDataType, ".*".into()));
        assert_eq!(read_err(r#"{"*": {}}"#), (ValidationErrorKind::MissingData, ".*.coatings".into()));
        assert_eq!(
            read_err(r#"{"*": {"coatings": "A"}}"#),
            (ValidationErrorKind::InvalidDataType, ".*.coatings".into())
        );
        assert_eq!(
            read_err(r#"{"*": {"coatings": ["A", 2]}}"#),
            (ValidationErrorKind::InvalidDataType, ".*.coatings[1]".into())
        );
        assert_eq!(
            read_err(r#"{"*": {"coatings": ["A"], "variables": []}}"#),
            (ValidationErrorKind::InvalidDataType, ".*.variables".into())
        );
        assert_eq!(
            read_err(r#"{"*": {"coatings": ["A"], "variables": {"x": true}}}"#),
            (ValidationErrorKind::InvalidDataType, ".*.variables.x".into())
        );
        assert_eq!(
            read_err(r#"{"*": {"coatings": ["A"], "preload": {}}}"#),
            (ValidationErrorKind::InvalidDataType, ".*.preload".into())
        );
        assert_eq!(
            read_err(r#"{"*": {"coatings": ["A"], "preload": ["x"]}}"#),
            (ValidationErrorKind::InvalidDataType, ".*.preload[0]".into())
        );
        assert_eq!(
            read_err(r#"{"*": {"coatings": ["A"], "preload": [{"href": 5}]}}"#),
            (ValidationErrorKind::InvalidDataType, ".*.preload[0].href".into())
        );
    }

    #[test]
    fn empty_coatings_are_left_to_validation() {
        let drafts = read(r#"{"*": {"coatings": []}}"#).unwrap();
        assert!(drafts[0].coatings.is_empty());
    }

    #[test]
    fn crossorigin_truthiness() {
        for value in [json!(true), json!(1), json!("anonymous"), json!([0])] {
            assert!(truthy(&value), "{value}");
        }
        for value in [json!(false), json!(0), json!(""), json!("0"), json!(null), json!({})] {
            assert!(!truthy(&value), "{value}");
        }
    }
}
