//! Validation engine — applies registry rules to single values, whole
//! records and cross-field invariants.
//!
//! Per field, evaluation stops at the first failing rule. Across fields
//! there is no early exit unless `abort_early` is set, so every field
//! reports independently.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqflow_core::{ReqflowError, Result};
use serde_json::Value;

use crate::Record;
use crate::result::{
    AsyncCheck, BatchItem, BatchResult, CrossFieldError, CrossFieldResult, CrossFieldRule,
    FieldError, FieldResult, RuleOutcome, ValidateOptions, ValidationErrors, ValidationResult,
};
use crate::rules::{Rule, RuleContext, RuleRegistry};
use crate::schema::Schema;

/// Rule id reported for keys missing from a strict schema.
pub const UNKNOWN_FIELD_RULE: &str = "unknown";

/// Rule id reported for failures from async validators.
pub const ASYNC_RULE: &str = "async";

/// Error key used when an async validator itself fails to run.
pub const GENERAL_ERROR_KEY: &str = "_general";

/// A check that needs I/O, e.g. "is this email already registered".
#[async_trait]
pub trait AsyncValidator: Send + Sync {
    async fn check(&self, data: &Record) -> Result<AsyncCheck>;
}

/// Validation engine over a rule registry.
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    registry: RuleRegistry,
    /// Fixed reference date for date-relative rules; local today when unset.
    today: Option<NaiveDate>,
}

impl ValidationEngine {
    /// Create an engine with only the built-in rules.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: RuleRegistry) -> Self {
        Self {
            registry,
            today: None,
        }
    }

    /// Pin "today" for `futureDate` / `pastDate` and schema-level date checks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// The date rules compare against.
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Install a rule. Returns `true` when it replaced an existing rule.
    pub fn register(&mut self, name: &str, rule: Rule) -> bool {
        self.registry.register(name, rule)
    }

    /// Resolve every rule id a schema mentions. Run this when a schema is
    /// loaded so a typo fails loudly instead of on live data.
    pub fn check_schema(&self, schema: &Schema) -> Result<()> {
        for field in schema.fields() {
            for rule_id in &field.rules {
                self.registry.resolve(rule_id).map_err(|e| match e {
                    ReqflowError::UnknownRule { rule, reason } => ReqflowError::UnknownRule {
                        rule,
                        reason: format!("{reason} (field '{}')", field.field),
                    },
                    other => other,
                })?;
            }
        }
        Ok(())
    }

    fn context(&self) -> RuleContext {
        RuleContext::new(self.today())
    }

    /// Check one value against one rule id. An unresolvable id fails the
    /// value rather than panicking.
    pub fn validate_rule(&self, value: &Value, rule_id: &str) -> RuleOutcome {
        self.validate_rule_in(value, rule_id, &self.context())
    }

    fn validate_rule_in(&self, value: &Value, rule_id: &str, ctx: &RuleContext) -> RuleOutcome {
        match self.registry.resolve(rule_id) {
            Ok(rule) => {
                let is_valid = rule.test(value, ctx);
                RuleOutcome {
                    is_valid,
                    message: (!is_valid).then(|| rule.message()),
                }
            }
            Err(e) => {
                tracing::error!("Validation error for rule \"{rule_id}\": {e}");
                RuleOutcome {
                    is_valid: false,
                    message: Some(format!("Invalid validation rule: {rule_id}")),
                }
            }
        }
    }

    /// Check one value against an ordered rule list, stopping at the first failure.
    pub fn validate_field<S: AsRef<str>>(
        &self,
        value: &Value,
        rules: &[S],
        field: &str,
    ) -> FieldResult {
        self.validate_field_in(value, rules, field, &self.context())
    }

    fn validate_field_in<S: AsRef<str>>(
        &self,
        value: &Value,
        rules: &[S],
        field: &str,
        ctx: &RuleContext,
    ) -> FieldResult {
        let failure = rules.iter().find_map(|rule_id| {
            let rule_id = rule_id.as_ref();
            let outcome = self.validate_rule_in(value, rule_id, ctx);
            (!outcome.is_valid).then(|| {
                FieldError::new(field, rule_id, outcome.message.unwrap_or_default())
            })
        });
        FieldResult {
            is_valid: failure.is_none(),
            errors: failure.into_iter().collect(),
        }
    }

    /// Validate a record against a schema.
    pub fn validate(&self, data: &Record, schema: &Schema, options: ValidateOptions) -> ValidationResult {
        let ctx = self.context();
        let mut errors = ValidationErrors::new();
        let mut valid_fields = Vec::new();

        for field in schema.fields() {
            let value = data.get(&field.field).unwrap_or(&Value::Null);
            let result = self.validate_field_in(value, field.rules.as_slice(), &field.field, &ctx);
            if result.is_valid {
                valid_fields.push(field.field.clone());
            } else {
                errors.insert(&field.field, result.errors);
                if options.abort_early {
                    break;
                }
            }
        }

        if !options.allow_unknown {
            for key in data.keys().filter(|k| !schema.contains(k)) {
                errors.insert(
                    key,
                    vec![FieldError::new(key, UNKNOWN_FIELD_RULE, "Unknown field")],
                );
            }
        }

        let data = if options.strip_unknown {
            strip_unknown(data, schema)
        } else {
            data.clone()
        };

        ValidationResult::new(errors, valid_fields, data)
    }

    /// Register `custom_rules`, then validate. The registrations persist.
    pub fn validate_with(
        &mut self,
        data: &Record,
        schema: &Schema,
        custom_rules: Vec<(String, Rule)>,
    ) -> ValidationResult {
        for (name, rule) in custom_rules {
            self.registry.register(&name, rule);
        }
        self.validate(data, schema, ValidateOptions::default())
    }

    /// Evaluate every cross-field rule and report every failure.
    pub fn validate_cross_field(&self, data: &Record, rules: &[CrossFieldRule]) -> CrossFieldResult {
        let errors: Vec<CrossFieldError> = rules
            .iter()
            .filter(|rule| !rule.test(data))
            .map(|rule| CrossFieldError {
                fields: rule.fields.clone(),
                message: rule.message.clone(),
            })
            .collect();
        CrossFieldResult {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Schema validation, then each async validator in order.
    ///
    /// Async validators only run once the schema passes. A failed check is
    /// reported under its field with rule `async`; a validator that errors
    /// is reported under `_general`.
    pub async fn validate_async(
        &self,
        data: &Record,
        schema: &Schema,
        validators: &[Arc<dyn AsyncValidator>],
    ) -> ValidationResult {
        let result = self.validate(data, schema, ValidateOptions::default());
        if !result.is_valid {
            return result;
        }

        let ValidationResult {
            mut errors,
            valid_fields,
            data,
            ..
        } = result;
        for validator in validators {
            match validator.check(&data).await {
                Ok(check) if check.is_valid => {}
                Ok(check) => {
                    let error = FieldError::new(&check.field, ASYNC_RULE, check.message);
                    errors.insert(&check.field, vec![error]);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Async validator failed: {e}");
                    let error = FieldError::new(
                        GENERAL_ERROR_KEY,
                        ASYNC_RULE,
                        format!("Validation error: {e}"),
                    );
                    errors.insert(GENERAL_ERROR_KEY, vec![error]);
                }
            }
        }
        ValidationResult::new(errors, valid_fields, data)
    }

    /// Trim every string, validate, and sanitize the data only when valid.
    pub fn validate_and_sanitize(
        &self,
        data: &Record,
        schema: &Schema,
        options: ValidateOptions,
    ) -> ValidationResult {
        let trimmed = trim(data, &[]);
        let mut result = self.validate(&trimmed, schema, options);
        if result.is_valid {
            result.data = sanitize(&result.data, &[]);
        }
        result
    }

    /// Validate many records with one schema.
    pub fn validate_batch(
        &self,
        records: &[Record],
        schema: &Schema,
        options: ValidateOptions,
    ) -> BatchResult {
        let results: Vec<BatchItem> = records
            .iter()
            .enumerate()
            .map(|(index, record)| BatchItem {
                index,
                result: self.validate(record, schema, options),
            })
            .collect();
        let valid_count = results.iter().filter(|r| r.result.is_valid).count();
        BatchResult {
            is_valid: valid_count == results.len(),
            invalid_count: results.len() - valid_count,
            valid_count,
            results,
        }
    }

    /// A reusable validator bound to one schema.
    pub fn create_validator(
        &self,
        schema: Schema,
        options: ValidateOptions,
    ) -> impl Fn(&Record) -> ValidationResult + '_ {
        move |data| self.validate(data, &schema, options)
    }
}

/// Copy of `data` holding only schema keys.
pub fn strip_unknown(data: &Record, schema: &Schema) -> Record {
    schema
        .field_names()
        .filter_map(|name| data.get(name).map(|v| (name.to_string(), v.clone())))
        .collect()
}

/// HTML-escape `& < > " ' /`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(ch),
        }
    }
    out
}

/// HTML-escape the named string fields (all string fields when `fields` is
/// empty). Not idempotent: escaping twice double-escapes `&`, so call it
/// once, after validation and before persistence.
pub fn sanitize(data: &Record, fields: &[&str]) -> Record {
    map_strings(data, fields, escape_html)
}

/// Strip surrounding whitespace from the named string fields (all string
/// fields when `fields` is empty). Idempotent.
pub fn trim(data: &Record, fields: &[&str]) -> Record {
    map_strings(data, fields, |s| s.trim().to_string())
}

fn map_strings(data: &Record, fields: &[&str], f: impl Fn(&str) -> String) -> Record {
    let mut out = data.clone();
    for (key, value) in out.iter_mut() {
        if !fields.is_empty() && !fields.contains(&key.as_str()) {
            continue;
        }
        if let Value::String(s) = value {
            *s = f(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn engine() -> ValidationEngine {
        ValidationEngine::new().with_today(NaiveDate::from_ymd_opt(2026, 6, 15).unwrap())
    }

    fn schema() -> Schema {
        Schema::from_table(&[
            ("email", &["required", "email"]),
            ("age", &["required", "numeric", "min:18"]),
            ("nickname", &["minLength:2"]),
        ])
    }

    #[test]
    fn test_valid_record() {
        let data = record(json!({"email": "a@b.co", "age": "30"}));
        let result = engine().validate(&data, &schema(), ValidateOptions::default());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.valid_fields, vec!["email", "age", "nickname"]);
    }

    #[test]
    fn test_first_failure_wins_per_field() {
        let data = record(json!({"email": "", "age": "abc"}));
        let result = engine().validate(&data, &schema(), ValidateOptions::default());
        assert!(!result.is_valid);

        let email = result.errors.get("email").unwrap();
        assert_eq!(email.len(), 1);
        assert_eq!(email[0].rule, "required");

        let age = result.errors.get("age").unwrap();
        assert_eq!(age.len(), 1);
        assert_eq!(age[0].rule, "numeric");
        assert_eq!(result.valid_fields, vec!["nickname"]);
    }

    #[test]
    fn test_abort_early() {
        let data = record(json!({"email": "bad", "age": "1"}));
        let result = engine().validate(&data, &schema(), ValidateOptions::default().abort_early(true));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors.contains("email"));
    }

    #[test]
    fn test_unknown_fields() {
        let data = record(json!({"email": "a@b.co", "age": 20, "extra": "x"}));

        let lenient = engine().validate(&data, &schema(), ValidateOptions::default());
        assert!(lenient.is_valid);
        assert!(lenient.data.contains_key("extra"));

        let strict = engine().validate(&data, &schema(), ValidateOptions::strict());
        assert!(!strict.is_valid);
        let extra = strict.errors.get("extra").unwrap();
        assert_eq!(extra[0].rule, UNKNOWN_FIELD_RULE);
        assert_eq!(extra[0].message, "Unknown field");

        let stripped = engine().validate(&data, &schema(), ValidateOptions::default().strip_unknown(true));
        assert!(stripped.is_valid);
        assert!(!stripped.data.contains_key("extra"));
        assert!(stripped.data.contains_key("email"));
    }

    #[test]
    fn test_validate_field_and_rule() {
        let e = engine();
        let result = e.validate_field(&json!("x"), &["required", "minLength:2", "email"], "name");
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule, "minLength:2");
        assert_eq!(result.errors[0].field, "name");

        let outcome = e.validate_rule(&json!("x"), "nope");
        assert!(!outcome.is_valid);
        assert_eq!(outcome.message.as_deref(), Some("Invalid validation rule: nope"));
    }

    #[test]
    fn test_check_schema_catches_typos() {
        let bad = Schema::new().field("email", &["required", "emial"]);
        let err = engine().check_schema(&bad).unwrap_err();
        assert!(matches!(err, ReqflowError::UnknownRule { ref rule, .. } if rule == "emial"));
        assert!(engine().check_schema(&schema()).is_ok());
    }

    #[test]
    fn test_cross_field_reports_all_failures() {
        let rules = vec![
            CrossFieldRule::new(&["start", "end"], "End must follow start", |d| {
                d.get("end").and_then(Value::as_i64) > d.get("start").and_then(Value::as_i64)
            }),
            CrossFieldRule::new(&["a", "b"], "a and b must differ", |d| d.get("a") != d.get("b")),
        ];
        let data = record(json!({"start": 5, "end": 1, "a": 1, "b": 1}));
        let result = engine().validate_cross_field(&data, &rules);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[1].fields, vec!["a", "b"]);
    }

    #[test]
    fn test_validate_with_custom_rule() {
        let mut e = engine();
        let schema = Schema::new().field("code", &["required", "evenLength"]);
        let data = record(json!({"code": "abc"}));
        let result = e.validate_with(
            &data,
            &schema,
            vec![(
                "evenLength".into(),
                Rule::custom(|v| v.as_str().is_none_or(|s| s.len() % 2 == 0), "Must have even length"),
            )],
        );
        assert!(!result.is_valid);
        assert_eq!(result.errors.first_message(), Some("Must have even length"));
        assert!(e.registry().contains("evenLength"));
    }

    #[test]
    fn test_sanitize_escapes_once() {
        let data = record(json!({"name": "<b>Tom & Jerry's</b>", "count": 3}));
        let once = sanitize(&data, &[]);
        assert_eq!(
            once["name"],
            json!("&lt;b&gt;Tom &amp; Jerry&#x27;s&lt;&#x2F;b&gt;")
        );
        assert_eq!(once["count"], json!(3));

        let twice = sanitize(&once, &[]);
        assert_ne!(twice, once);
        assert!(twice["name"].as_str().unwrap().contains("&amp;amp;"));
    }

    #[test]
    fn test_sanitize_only_named_fields() {
        let data = record(json!({"a": "<", "b": "<"}));
        let out = sanitize(&data, &["a"]);
        assert_eq!(out["a"], json!("&lt;"));
        assert_eq!(out["b"], json!("<"));
    }

    #[test]
    fn test_trim() {
        let data = record(json!({"a": "  x  ", "b": " y", "n": 1}));
        let all = trim(&data, &[]);
        assert_eq!(all["a"], json!("x"));
        assert_eq!(all["b"], json!("y"));
        let some = trim(&data, &["a"]);
        assert_eq!(some["b"], json!(" y"));
        assert_eq!(trim(&all, &[]), all);
    }

    #[test]
    fn test_validate_and_sanitize() {
        let schema = Schema::new().field("name", &["required", "minLength:2"]);
        let data = record(json!({"name": "  A&B  "}));
        let result = engine().validate_and_sanitize(&data, &schema, ValidateOptions::default());
        assert!(result.is_valid);
        assert_eq!(result.data["name"], json!("A&amp;B"));

        let blank = record(json!({"name": "   "}));
        let result = engine().validate_and_sanitize(&blank, &schema, ValidateOptions::default());
        assert!(!result.is_valid);
        assert_eq!(result.errors.first().unwrap().rule, "required");
    }

    #[test]
    fn test_batch_and_reusable_validator() {
        let e = engine();
        let records = vec![
            record(json!({"email": "a@b.co", "age": 40})),
            record(json!({"email": "nope", "age": 40})),
        ];
        let batch = e.validate_batch(&records, &schema(), ValidateOptions::default());
        assert!(!batch.is_valid);
        assert_eq!(batch.valid_count, 1);
        assert_eq!(batch.invalid_count, 1);
        assert_eq!(batch.results[1].index, 1);

        let validator = e.create_validator(schema(), ValidateOptions::default());
        assert!(validator(&records[0]).is_valid);
        assert!(!validator(&records[1]).is_valid);
    }

    struct EmailTaken;

    #[async_trait]
    impl AsyncValidator for EmailTaken {
        async fn check(&self, data: &Record) -> Result<AsyncCheck> {
            if data.get("email") == Some(&json!("taken@b.co")) {
                Ok(AsyncCheck::fail("email", "Email is already registered"))
            } else {
                Ok(AsyncCheck::pass("email"))
            }
        }
    }

    struct DirectoryDown;

    #[async_trait]
    impl AsyncValidator for DirectoryDown {
        async fn check(&self, _data: &Record) -> Result<AsyncCheck> {
            Err(ReqflowError::Storage("directory offline".into()))
        }
    }

    #[derive(Default)]
    struct Counting(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl AsyncValidator for Counting {
        async fn check(&self, _data: &Record) -> Result<AsyncCheck> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(AsyncCheck::pass("age"))
        }
    }

    #[tokio::test]
    async fn test_validate_async_merges_failures() {
        let validators: Vec<Arc<dyn AsyncValidator>> = vec![Arc::new(EmailTaken)];
        let ok = record(json!({"email": "free@b.co", "age": 30}));
        let result = engine().validate_async(&ok, &schema(), &validators).await;
        assert!(result.is_valid);

        let taken = record(json!({"email": "taken@b.co", "age": 30}));
        let result = engine().validate_async(&taken, &schema(), &validators).await;
        assert!(!result.is_valid);
        let errors = result.errors.get("email").unwrap();
        assert_eq!(errors[0].rule, ASYNC_RULE);
        assert_eq!(errors[0].message, "Email is already registered");
    }

    #[tokio::test]
    async fn test_validate_async_reports_broken_validator_as_general() {
        let validators: Vec<Arc<dyn AsyncValidator>> =
            vec![Arc::new(DirectoryDown), Arc::new(EmailTaken)];
        let taken = record(json!({"email": "taken@b.co", "age": 30}));
        let result = engine().validate_async(&taken, &schema(), &validators).await;
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        let general = result.errors.get(GENERAL_ERROR_KEY).unwrap();
        assert_eq!(general[0].rule, "async");
        assert_eq!(
            general[0].message,
            "Validation error: Storage error: directory offline"
        );
        assert!(result.errors.contains("email"));
    }

    #[tokio::test]
    async fn test_validate_async_skips_validators_after_schema_failure() {
        let counter = Arc::new(Counting::default());
        let validators: Vec<Arc<dyn AsyncValidator>> = vec![counter.clone()];
        let bad = record(json!({"email": "nope", "age": 30}));
        let result = engine().validate_async(&bad, &schema(), &validators).await;
        assert!(!result.is_valid);
        assert_eq!(result.errors.get("email").unwrap()[0].rule, "email");
        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 0);

        let good = record(json!({"email": "a@b.co", "age": 30}));
        assert!(engine().validate_async(&good, &schema(), &validators).await.is_valid);
        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn trim_is_idempotent(a in ".{0,20}", b in "\\s{0,3}[a-z]{0,5}\\s{0,3}") {
                let data = record(json!({"a": a, "b": b, "n": 7}));
                let once = trim(&data, &[]);
                prop_assert_eq!(trim(&once, &[]), once);
            }

            #[test]
            fn first_rule_pass_means_valid(local in "[a-z]{1,8}", domain in "[a-z]{1,8}", tld in "[a-z]{2,4}") {
                let email = format!("{local}@{domain}.{tld}");
                let data = record(json!({"email": email}));
                let schema = Schema::new().field("email", &["email"]);
                let result = engine().validate(&data, &schema, ValidateOptions::default());
                prop_assert!(result.is_valid);
                prop_assert!(result.errors.is_empty());
            }

            #[test]
            fn satisfying_values_pass_any_schema(
                fields in prop::collection::vec((0usize..5, 1usize..8, any::<bool>()), 1..8)
            ) {
                let mut schema = Schema::new();
                let mut data = Record::new();
                for (i, (kind, n, required)) in fields.into_iter().enumerate() {
                    let (rule, value) = match kind {
                        0 => (format!("minLength:{n}"), json!("x".repeat(n + 1))),
                        1 => (format!("maxLength:{n}"), json!("y".repeat(n))),
                        2 => ("enum:red,green,blue".to_string(), json!(["red", "green", "blue"][n % 3])),
                        3 => ("numeric".to_string(), json!(n.to_string())),
                        _ => (format!("min:{n}"), json!(n * 2)),
                    };
                    let mut rules = vec![rule.as_str()];
                    if required {
                        rules.insert(0, "required");
                    }
                    let name = format!("f{i}");
                    schema = schema.field(&name, &rules);
                    data.insert(name, value);
                }
                let result = engine().validate(&data, &schema, ValidateOptions::default());
                prop_assert!(result.is_valid, "{:?}", result.errors);
                prop_assert_eq!(result.valid_fields.len(), schema.len());
            }
        }
    }
}
