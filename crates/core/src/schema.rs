//! Field schemas and form-boundary validation.
//!
//! Every record collection declares its fields as a static list of
//! [`FieldSpec`]s. Drafts are serialized to JSON and checked against that
//! schema before anything is sent to the remote store, so a malformed form
//! never produces a remote write.

use core::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

/// Semantic type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single-line text.
    Text,
    /// Multi-line text.
    LongText,
    /// Absolute URL (image references).
    Url,
    /// List of absolute URLs.
    UrlList,
    /// List of short labels.
    TextList,
    /// RFC 3339 timestamp.
    DateTime,
    /// Non-negative decimal amount.
    Price,
    /// Integer.
    Integer,
    /// Boolean flag.
    Boolean,
    /// One value out of a fixed set.
    Choice(&'static [&'static str]),
}

/// One field of a record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// JSON field name.
    pub name: &'static str,
    /// Semantic type.
    pub kind: FieldKind,
    /// Whether the field must be present and non-empty.
    pub required: bool,
}

impl FieldSpec {
    /// A required field.
    #[must_use]
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// An optional field.
    #[must_use]
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name.
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

/// A non-empty set of field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Record an error for `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Whether no error was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The recorded errors.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Whether `field` has at least one error.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Merge another set of errors into this one.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any error was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Check a serialized draft against a schema.
///
/// Unknown fields are ignored; type mismatches the Rust types already rule out
/// (for instance a string where a boolean is expected) are still reported, so
/// the check also holds for drafts built from raw JSON.
#[must_use]
pub fn validate(schema: &[FieldSpec], draft: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    for spec in schema {
        let value = draft.get(spec.name).unwrap_or(&Value::Null);

        if is_blank(value) {
            if spec.required {
                errors.add(spec.name, "is required");
            }
            continue;
        }

        if let Err(message) = check_kind(spec.kind, value) {
            errors.add(spec.name, message);
        }
    }

    errors
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn check_kind(kind: FieldKind, value: &Value) -> Result<(), String> {
    match kind {
        FieldKind::Text | FieldKind::LongText => value
            .as_str()
            .map(|_| ())
            .ok_or_else(|| "must be text".to_owned()),
        FieldKind::Url => check_url(value),
        FieldKind::UrlList => value
            .as_array()
            .ok_or_else(|| "must be a list of URLs".to_owned())?
            .iter()
            .try_for_each(check_url),
        FieldKind::TextList => {
            let items = value
                .as_array()
                .ok_or_else(|| "must be a list".to_owned())?;
            if items.iter().all(|v| v.as_str().is_some_and(|s| !s.trim().is_empty())) {
                Ok(())
            } else {
                Err("entries cannot be empty".to_owned())
            }
        }
        FieldKind::DateTime => value
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|_| ())
            .ok_or_else(|| "must be an RFC 3339 date".to_owned()),
        FieldKind::Price => {
            let amount = match value {
                Value::String(s) => s.trim().parse::<Decimal>().ok(),
                Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
                _ => None,
            }
            .ok_or_else(|| "must be a number".to_owned())?;
            if amount.is_sign_negative() && !amount.is_zero() {
                Err("cannot be negative".to_owned())
            } else {
                Ok(())
            }
        }
        FieldKind::Integer => value
            .as_i64()
            .map(|_| ())
            .ok_or_else(|| "must be a whole number".to_owned()),
        FieldKind::Boolean => value
            .as_bool()
            .map(|_| ())
            .ok_or_else(|| "must be true or false".to_owned()),
        FieldKind::Choice(options) => match value.as_str() {
            Some(s) if options.contains(&s) => Ok(()),
            _ => Err(format!("must be one of: {}", options.join(", "))),
        },
    }
}

fn check_url(value: &Value) -> Result<(), String> {
    value
        .as_str()
        .and_then(|s| url::Url::parse(s).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|_| ())
        .ok_or_else(|| "must be an http(s) URL".to_owned())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SCHEMA: &[FieldSpec] = &[
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::optional("image_url", FieldKind::Url),
        FieldSpec::required("price", FieldKind::Price),
        FieldSpec::required("sizes", FieldKind::TextList),
        FieldSpec::optional("starts_at", FieldKind::DateTime),
        FieldSpec::optional("status", FieldKind::Choice(&["draft", "live"])),
    ];

    #[test]
    fn test_valid_draft_has_no_errors() {
        let draft = json!({
            "title": "T-shirt",
            "image_url": "https://cdn.example.org/t.png",
            "price": "15.00",
            "sizes": ["S", "M"],
            "starts_at": "2026-06-21T18:00:00Z",
            "status": "live",
        });
        assert!(validate(SCHEMA, &draft).is_empty());
    }

    #[test]
    fn test_required_fields_reported() {
        let draft = json!({ "title": "   ", "sizes": [] });
        let errors = validate(SCHEMA, &draft);
        assert!(errors.has("title"));
        assert!(errors.has("price"));
        assert!(errors.has("sizes"));
        assert!(!errors.has("image_url"));
    }

    #[test]
    fn test_kind_checks() {
        let draft = json!({
            "title": "Fête",
            "image_url": "ftp://nope",
            "price": -2,
            "sizes": ["M", ""],
            "starts_at": "tomorrow",
            "status": "archived",
        });
        let errors = validate(SCHEMA, &draft);
        for field in ["image_url", "price", "sizes", "starts_at", "status"] {
            assert!(errors.has(field), "expected error on {field}");
        }
    }

    #[test]
    fn test_display_joins_errors() {
        let mut errors = ValidationErrors::default();
        errors.add("title", "is required");
        errors.add("price", "cannot be negative");
        assert_eq!(errors.to_string(), "title: is required; price: cannot be negative");
        assert!(errors.into_result().is_err());
    }
}
