//! Rule registry — named, parameterizable predicate + message pairs.
//!
//! Built-in rules are a closed enum so their semantics are checked
//! exhaustively; custom rules live in an open map on the registry.
//!
//! Rule identifiers are either a bare name (`email`) or `name:params`
//! (`minLength:2`, `enum:Hourly,Salary`, `pattern:^[A-Z]{3}$`). The id is
//! split on the first `:` only.
//!
//! Every rule except `required` passes empty values, so presence and format
//! compose: an optional field is format-checked only when filled in.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use reqflow_core::{ReqflowError, Result};
use serde_json::Value;

use crate::value::{is_blank_non_zero, is_falsy, to_number, to_text, value_to_datetime};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").unwrap());

static PHONE_SEPARATORS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-().]").unwrap());

/// 10-15 digits after separators are gone, optional `+` and country digit.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?1?[0-9]{10,15}$").unwrap());

static ALPHANUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").unwrap());

static ALPHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\s]+$").unwrap());

/// US `12345` / `12345-6789`, Canada `A1A 1A1` / `A1A1A1`.
static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([0-9]{5}(-[0-9]{4})?|[A-Z][0-9][A-Z]\s?[0-9][A-Z][0-9])$").unwrap()
});

static SSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3}-[0-9]{2}-[0-9]{4}$").unwrap());

/// What date-relative rules compare against.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    pub today: NaiveDate,
}

impl RuleContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    fn start_of_today(&self) -> NaiveDateTime {
        self.today.and_time(chrono::NaiveTime::MIN)
    }
}

/// Built-in rules.
#[derive(Debug, Clone)]
pub enum BuiltinRule {
    Required,
    Email,
    Date,
    FutureDate,
    PastDate,
    Phone,
    Url,
    Numeric,
    Integer,
    Positive,
    Alphanumeric,
    Alpha,
    ZipCode,
    Ssn,
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    OneOf(Vec<String>),
    Pattern { regex: Regex, message: String },
}

/// Zero-argument rule names, in the order `rule_names` reports them.
pub const BUILTIN_RULE_NAMES: &[&str] = &[
    "required",
    "email",
    "futureDate",
    "pastDate",
    "date",
    "phone",
    "url",
    "numeric",
    "integer",
    "positive",
    "alphanumeric",
    "alpha",
    "zipCode",
    "ssn",
];

/// Rule names that need a `:param` suffix.
pub const PARAMETERIZED_RULE_NAMES: &[&str] =
    &["minLength", "maxLength", "min", "max", "enum", "pattern"];

impl BuiltinRule {
    /// Look up a zero-argument built-in by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let rule = match name {
            "required" => Self::Required,
            "email" => Self::Email,
            "date" => Self::Date,
            "futureDate" => Self::FutureDate,
            "pastDate" => Self::PastDate,
            "phone" => Self::Phone,
            "url" => Self::Url,
            "numeric" => Self::Numeric,
            "integer" => Self::Integer,
            "positive" => Self::Positive,
            "alphanumeric" => Self::Alphanumeric,
            "alpha" => Self::Alpha,
            "zipCode" => Self::ZipCode,
            "ssn" => Self::Ssn,
            _ => return None,
        };
        Some(rule)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Email => "email",
            Self::Date => "date",
            Self::FutureDate => "futureDate",
            Self::PastDate => "pastDate",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Numeric => "numeric",
            Self::Integer => "integer",
            Self::Positive => "positive",
            Self::Alphanumeric => "alphanumeric",
            Self::Alpha => "alpha",
            Self::ZipCode => "zipCode",
            Self::Ssn => "ssn",
            Self::MinLength(_) => "minLength",
            Self::MaxLength(_) => "maxLength",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::OneOf(_) => "enum",
            Self::Pattern { .. } => "pattern",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Required => "This field is required".into(),
            Self::Email => "Please enter a valid email address".into(),
            Self::Date => "Please enter a valid date".into(),
            Self::FutureDate => "Date must be today or in the future".into(),
            Self::PastDate => "Date must be in the past".into(),
            Self::Phone => "Please enter a valid phone number (10-15 digits)".into(),
            Self::Url => "Please enter a valid URL (e.g., https://example.com)".into(),
            Self::Numeric => "Please enter a valid number".into(),
            Self::Integer => "Please enter a whole number".into(),
            Self::Positive => "Please enter a positive number".into(),
            Self::Alphanumeric => "Only letters and numbers are allowed".into(),
            Self::Alpha => "Only letters are allowed".into(),
            Self::ZipCode => "Please enter a valid ZIP/postal code".into(),
            Self::Ssn => "Please enter SSN in format XXX-XX-XXXX".into(),
            Self::MinLength(n) => format!("Must be at least {n} character{}", plural(*n)),
            Self::MaxLength(n) => format!("Must be no more than {n} character{}", plural(*n)),
            Self::Min(n) => format!("Must be at least {n}"),
            Self::Max(n) => format!("Must be no more than {n}"),
            Self::OneOf(values) => format!("Must be one of: {}", values.join(", ")),
            Self::Pattern { message, .. } => message.clone(),
        }
    }

    /// Evaluate the rule. `true` means pass.
    pub fn test(&self, value: &Value, ctx: &RuleContext) -> bool {
        match self {
            Self::Required => match value {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Bool(_) | Value::Number(_) | Value::Object(_) => true,
            },
            Self::Numeric | Self::Integer | Self::Positive | Self::Min(_) | Self::Max(_) => {
                if is_blank_non_zero(value) {
                    return true;
                }
                let Some(n) = to_number(value) else {
                    return false;
                };
                match self {
                    Self::Integer => n.is_finite() && n.fract() == 0.0,
                    Self::Positive => n > 0.0,
                    Self::Min(min) => n >= *min,
                    Self::Max(max) => n <= *max,
                    _ => true,
                }
            }
            _ if is_falsy(value) => true,
            Self::Email => EMAIL_RE.is_match(&to_text(value)),
            Self::Date => value_to_datetime(value).is_some(),
            Self::FutureDate => {
                value_to_datetime(value).is_some_and(|dt| dt >= ctx.start_of_today())
            }
            Self::PastDate => value_to_datetime(value).is_some_and(|dt| dt < ctx.start_of_today()),
            Self::Phone => {
                let text = to_text(value);
                let cleaned = PHONE_SEPARATORS_RE.replace_all(&text, "");
                PHONE_RE.is_match(&cleaned)
            }
            Self::Url => url::Url::parse(&to_text(value)).is_ok(),
            Self::Alphanumeric => ALPHANUMERIC_RE.is_match(&to_text(value)),
            Self::Alpha => ALPHA_RE.is_match(&to_text(value)),
            Self::ZipCode => ZIP_RE.is_match(&to_text(value)),
            Self::Ssn => SSN_RE.is_match(&to_text(value)),
            Self::MinLength(n) => to_text(value).chars().count() >= *n,
            Self::MaxLength(n) => to_text(value).chars().count() <= *n,
            Self::OneOf(values) => match value {
                Value::String(s) => values.iter().any(|v| v == s),
                _ => false,
            },
            Self::Pattern { regex, .. } => regex.is_match(&to_text(value)),
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Predicate signature for custom rules.
pub type RuleFn = dyn Fn(&Value) -> bool + Send + Sync;

/// A rule installed at runtime. Custom predicates decide for themselves how
/// to treat empty values.
#[derive(Clone)]
pub struct CustomRule {
    test: Arc<RuleFn>,
    message: String,
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A resolved rule, ready to test values.
#[derive(Debug, Clone)]
pub enum Rule {
    Builtin(BuiltinRule),
    Custom(CustomRule),
}

impl Rule {
    pub fn custom<F>(test: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Custom(CustomRule {
            test: Arc::new(test),
            message: message.into(),
        })
    }

    /// Regex rule. Empty values pass.
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| ReqflowError::UnknownRule {
            rule: format!("pattern:{pattern}"),
            reason: format!("invalid regex: {e}"),
        })?;
        Ok(Self::Builtin(BuiltinRule::Pattern {
            regex,
            message: message.into(),
        }))
    }

    pub fn min_length(n: usize) -> Self {
        Self::Builtin(BuiltinRule::MinLength(n))
    }

    pub fn max_length(n: usize) -> Self {
        Self::Builtin(BuiltinRule::MaxLength(n))
    }

    pub fn min(n: f64) -> Self {
        Self::Builtin(BuiltinRule::Min(n))
    }

    pub fn max(n: f64) -> Self {
        Self::Builtin(BuiltinRule::Max(n))
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Builtin(BuiltinRule::OneOf(values.into_iter().map(Into::into).collect()))
    }

    pub fn test(&self, value: &Value, ctx: &RuleContext) -> bool {
        match self {
            Self::Builtin(rule) => rule.test(value, ctx),
            Self::Custom(rule) => (rule.test)(value),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Builtin(rule) => rule.message(),
            Self::Custom(rule) => rule.message.clone(),
        }
    }
}

impl From<BuiltinRule> for Rule {
    fn from(rule: BuiltinRule) -> Self {
        Self::Builtin(rule)
    }
}

/// Registry of custom rules layered over the built-ins.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    custom: HashMap<String, Rule>,
}

impl RuleRegistry {
    /// Create a registry holding only the built-in rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a rule. Returns `true` when an existing rule
    /// (built-in or custom) was overwritten.
    pub fn register(&mut self, name: &str, rule: Rule) -> bool {
        let shadows_builtin = BuiltinRule::from_name(name).is_some();
        let replaced = self.custom.insert(name.to_string(), rule).is_some();
        let overwrote = replaced || shadows_builtin;
        if overwrote {
            tracing::warn!("Overwriting existing validation rule: {name}");
        } else {
            tracing::debug!("Registered validation rule: {name}");
        }
        overwrote
    }

    /// Whether `rule_id` resolves.
    pub fn contains(&self, rule_id: &str) -> bool {
        self.resolve(rule_id).is_ok()
    }

    /// Resolve a rule identifier to a rule.
    pub fn resolve(&self, rule_id: &str) -> Result<Rule> {
        if let Some(rule) = self.custom.get(rule_id) {
            return Ok(rule.clone());
        }

        let (name, param) = match rule_id.split_once(':') {
            Some((name, param)) => (name, Some(param)),
            None => (rule_id, None),
        };

        let Some(param) = param else {
            if let Some(rule) = BuiltinRule::from_name(name) {
                return Ok(rule.into());
            }
            let reason = if PARAMETERIZED_RULE_NAMES.contains(&name) {
                "missing parameter"
            } else {
                "no such rule"
            };
            return Err(unknown(rule_id, reason));
        };

        match name {
            "minLength" => Ok(Rule::min_length(parse_length(rule_id, param)?)),
            "maxLength" => Ok(Rule::max_length(parse_length(rule_id, param)?)),
            "min" => Ok(Rule::min(parse_bound(rule_id, param)?)),
            "max" => Ok(Rule::max(parse_bound(rule_id, param)?)),
            "enum" => {
                if param.trim().is_empty() {
                    return Err(unknown(rule_id, "missing parameter"));
                }
                Ok(Rule::one_of(param.split(',').map(str::trim)))
            }
            "pattern" => {
                if param.is_empty() {
                    return Err(unknown(rule_id, "missing parameter"));
                }
                Rule::pattern(param, "Invalid format")
            }
            _ if BuiltinRule::from_name(name).is_some() || self.custom.contains_key(name) => {
                Err(unknown(rule_id, "rule takes no parameters"))
            }
            _ => Err(unknown(rule_id, "no such rule")),
        }
    }

    /// Names of every zero-argument rule, built-in first, then custom (sorted).
    pub fn rule_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_RULE_NAMES.iter().map(|n| n.to_string()).collect();
        let mut custom: Vec<&String> = self
            .custom
            .keys()
            .filter(|k| BuiltinRule::from_name(k).is_none())
            .collect();
        custom.sort();
        names.extend(custom.into_iter().cloned());
        names
    }
}

fn unknown(rule_id: &str, reason: &str) -> ReqflowError {
    ReqflowError::UnknownRule {
        rule: rule_id.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_length(rule_id: &str, param: &str) -> Result<usize> {
    param
        .trim()
        .parse::<usize>()
        .map_err(|_| unknown(rule_id, &format!("expected a whole number, got '{param}'")))
}

fn parse_bound(rule_id: &str, param: &str) -> Result<f64> {
    param
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| unknown(rule_id, &format!("expected a number, got '{param}'")))
}
