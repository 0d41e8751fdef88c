//! # ReqFlow Validation
//!
//! Schema-driven validation for loosely typed form records.
//!
//! ```text
//! Schema { field → ["required", "email", "maxLength:100"] }
//!   → RuleRegistry::resolve("maxLength:100")  → Rule
//!   → ValidationEngine::validate(record)       → ValidationResult
//!   → ValidationEngine::validate_cross_field   → CrossFieldResult
//!   → ValidationEngine::validate_async         → + AsyncValidator checks
//!   → sanitize / trim                          → cleaned record
//! ```

pub mod engine;
pub mod result;
pub mod rules;
pub mod schema;
pub mod value;

/// A loosely typed form record: field name → JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

pub use engine::{AsyncValidator, ValidationEngine, escape_html, sanitize, strip_unknown, trim};
pub use result::{
    AsyncCheck, BatchItem, BatchResult, CrossFieldError, CrossFieldResult, CrossFieldRule,
    FieldError, FieldResult, RuleOutcome, ValidateOptions, ValidationErrors, ValidationResult,
};
pub use rules::{BuiltinRule, Rule, RuleContext, RuleRegistry};
pub use schema::{FieldRules, Schema};
