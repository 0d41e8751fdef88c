//! Validation outcome types.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::Record;

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub rule: String,
    pub message: String,
    /// Fields a cross-field error spans. Empty for single-field errors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl FieldError {
    pub fn new(field: &str, rule: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            rule: rule.to_string(),
            message: message.into(),
            fields: Vec::new(),
        }
    }
}

/// Outcome of validating one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResult {
    pub is_valid: bool,
    /// At most one entry: evaluation stops at the first failing rule.
    pub errors: Vec<FieldError>,
}

/// Outcome of a single rule check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub is_valid: bool,
    pub message: Option<String>,
}

/// Field → errors, in the order fields were reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    entries: Vec<(String, Vec<FieldError>)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field's errors, replacing any earlier entry for that field.
    pub fn insert(&mut self, field: &str, errors: Vec<FieldError>) {
        match self.entries.iter_mut().find(|(f, _)| f == field) {
            Some((_, existing)) => *existing = errors,
            None => self.entries.push((field.to_string(), errors)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&[FieldError]> {
        self.entries
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, e)| e.as_slice())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of fields with errors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FieldError])> {
        self.entries.iter().map(|(f, e)| (f.as_str(), e.as_slice()))
    }

    /// Every message, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(_, errors)| errors.iter().map(|e| e.message.clone()))
            .collect()
    }

    /// The first error reported.
    pub fn first(&self) -> Option<&FieldError> {
        self.entries.iter().find_map(|(_, errors)| errors.first())
    }

    pub fn first_message(&self) -> Option<&str> {
        self.first().map(|e| e.message.as_str())
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, errors) in &self.entries {
            map.serialize_entry(field, errors)?;
        }
        map.end()
    }
}

/// Outcome of validating a record against a schema.
///
/// `is_valid` is always `errors.is_empty()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: ValidationErrors,
    pub valid_fields: Vec<String>,
    pub data: Record,
}

impl ValidationResult {
    pub fn new(errors: ValidationErrors, valid_fields: Vec<String>, data: Record) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            valid_fields,
            data,
        }
    }

    pub fn first_error(&self) -> Option<&FieldError> {
        self.errors.first()
    }

    pub fn error_messages(&self) -> Vec<String> {
        if self.is_valid {
            Vec::new()
        } else {
            self.errors.messages()
        }
    }
}

/// Options for [`crate::ValidationEngine::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Stop after the first failing field.
    pub abort_early: bool,
    /// When `false`, keys not in the schema are reported as errors.
    pub allow_unknown: bool,
    /// When `true`, the returned data keeps only schema keys.
    pub strip_unknown: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            abort_early: false,
            allow_unknown: true,
            strip_unknown: false,
        }
    }
}

impl ValidateOptions {
    /// Reject unknown keys.
    pub fn strict() -> Self {
        Self {
            allow_unknown: false,
            ..Self::default()
        }
    }

    pub fn abort_early(mut self, yes: bool) -> Self {
        self.abort_early = yes;
        self
    }

    pub fn allow_unknown(mut self, yes: bool) -> Self {
        self.allow_unknown = yes;
        self
    }

    pub fn strip_unknown(mut self, yes: bool) -> Self {
        self.strip_unknown = yes;
        self
    }
}

/// Predicate signature for cross-field rules.
pub type CrossFieldFn = dyn Fn(&Record) -> bool + Send + Sync;

/// An invariant spanning several fields of one record.
#[derive(Clone)]
pub struct CrossFieldRule {
    pub fields: Vec<String>,
    pub message: String,
    test: Arc<CrossFieldFn>,
}

impl CrossFieldRule {
    pub fn new<F>(fields: &[&str], message: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            message: message.into(),
            test: Arc::new(test),
        }
    }

    pub fn test(&self, data: &Record) -> bool {
        (self.test)(data)
    }
}

impl fmt::Debug for CrossFieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossFieldRule")
            .field("fields", &self.fields)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A failed cross-field rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossFieldError {
    pub fields: Vec<String>,
    pub message: String,
}

impl CrossFieldError {
    /// Report under a pseudo-field key such as `_crossField`.
    pub fn into_field_error(self, key: &str) -> FieldError {
        FieldError {
            field: key.to_string(),
            rule: "cross-field".to_string(),
            message: self.message,
            fields: self.fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossFieldResult {
    pub is_valid: bool,
    pub errors: Vec<CrossFieldError>,
}

/// Verdict of an async validator on one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncCheck {
    pub field: String,
    pub is_valid: bool,
    pub message: String,
}

impl AsyncCheck {
    pub fn pass(field: &str) -> Self {
        Self {
            field: field.to_string(),
            is_valid: true,
            message: String::new(),
        }
    }

    pub fn fail(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            is_valid: false,
            message: message.into(),
        }
    }
}

/// One record's outcome inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub index: usize,
    #[serde(flatten)]
    pub result: ValidationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub is_valid: bool,
    pub results: Vec<BatchItem>,
    pub valid_count: usize,
    pub invalid_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_keep_report_order() {
        let mut errors = ValidationErrors::new();
        errors.insert("email", vec![FieldError::new("email", "email", "bad email")]);
        errors.insert("age", vec![FieldError::new("age", "min:18", "too young")]);
        assert_eq!(errors.first_message(), Some("bad email"));
        assert_eq!(errors.messages(), vec!["bad email", "too young"]);

        let json = serde_json::to_string(&errors).unwrap();
        assert!(json.find("email").unwrap() < json.find("age").unwrap());
    }

    #[test]
    fn test_results_serialize_camel_case() {
        let mut errors = ValidationErrors::new();
        errors.insert("email", vec![FieldError::new("email", "required", "Required")]);
        let result = ValidationResult::new(errors, vec!["age".into()], Record::new());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], serde_json::json!(false));
        assert_eq!(json["validFields"], serde_json::json!(["age"]));
        assert!(json.get("is_valid").is_none());

        let batch = BatchResult {
            is_valid: true,
            results: Vec::new(),
            valid_count: 0,
            invalid_count: 0,
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert!(json.get("validCount").is_some());
        assert!(json.get("invalidCount").is_some());

        let field = FieldResult {
            is_valid: true,
            errors: Vec::new(),
        };
        assert_eq!(serde_json::to_value(&field).unwrap()["isValid"], serde_json::json!(true));
    }

    #[test]
    fn test_cross_field_error_conversion() {
        let err = CrossFieldError {
            fields: vec!["a".into(), "b".into()],
            message: "a and b differ".into(),
        }
        .into_field_error("_crossField");
        assert_eq!(err.field, "_crossField");
        assert_eq!(err.rule, "cross-field");
        assert_eq!(err.fields, vec!["a", "b"]);
    }
}
