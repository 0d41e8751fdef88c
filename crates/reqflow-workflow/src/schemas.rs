//! Onboarding record schemas and the checks built on them.
//!
//! Schemas are plain static tables so they can be audited (or moved into
//! configuration) without reading code. A full workflow check runs in three
//! stages and stops at the first failing one:
//!
//! ```text
//! WORKFLOW_FIELDS (required) → OPTIONAL_WORKFLOW_FIELDS → cross-field rules
//! ```

use chrono::{Months, NaiveDate};
use reqflow_core::{Result, WorkflowConfig};
use reqflow_validation::value::value_to_date;
use reqflow_validation::{
    CrossFieldRule, FieldError, FieldResult, Record, Schema, ValidateOptions, ValidationEngine,
    ValidationErrors, ValidationResult, sanitize, trim,
};
use serde_json::Value;

pub const WORKFLOW_FIELDS: &[(&str, &[&str])] = &[
    ("employee", &["required", "minLength:2", "maxLength:100"]),
    ("email", &["required", "email"]),
    ("position", &["required", "minLength:2", "maxLength:100"]),
    ("hireDate", &["required", "date", "futureDate"]),
    ("siteName", &["required", "minLength:2"]),
    ("supervisorName", &["required", "minLength:2"]),
    ("supervisorEmail", &["required", "email"]),
    ("employmentType", &["required", "enum:Hourly,Salary"]),
];

/// Checked only when present and non-empty.
pub const OPTIONAL_WORKFLOW_FIELDS: &[(&str, &[&str])] = &[
    ("phone", &["phone"]),
    ("workflowId", &["minLength:5"]),
    ("status", &["enum:Open,In Progress,Complete,Overdue"]),
    ("notes", &["maxLength:1000"]),
];

pub const TASK_FIELDS: &[(&str, &[&str])] = &[
    ("id", &["required", "minLength:2"]),
    ("name", &["required", "minLength:2"]),
    ("status", &["required", "enum:Open,In Progress,Complete"]),
];

pub const WORKFLOW_UPDATE_FIELDS: &[(&str, &[&str])] = &[
    ("status", &["enum:Open,In Progress,Complete,Overdue"]),
    ("tasksComplete", &["numeric", "min:0"]),
    ("tasksTotal", &["numeric", "min:0"]),
    ("notes", &["maxLength:1000"]),
];

pub const TASK_UPDATE_FIELDS: &[(&str, &[&str])] =
    &[("status", &["required", "enum:Open,In Progress,Complete"])];

pub const FILTER_FIELDS: &[(&str, &[&str])] = &[
    ("search", &["maxLength:100"]),
    ("status", &["enum:Open,In Progress,Complete,Overdue"]),
    ("dateFrom", &["date"]),
    ("dateTo", &["date"]),
];

/// Free-text fields HTML-escaped before a workflow is stored.
pub const SANITIZED_FIELDS: &[&str] = &["employee", "position", "siteName", "supervisorName", "notes"];

/// Error key for workflow cross-field failures.
pub const CROSS_FIELD_KEY: &str = "_crossField";
/// Error key for an inverted filter date range.
pub const DATE_RANGE_KEY: &str = "_dateRange";

pub const SAME_PERSON_MESSAGE: &str = "Employee and supervisor cannot be the same person";
pub const SAME_EMAIL_MESSAGE: &str = "Employee and supervisor emails must be different";
pub const HIRE_DATE_HORIZON_MESSAGE: &str = "Hire date cannot be more than 2 years in the future";

const HIRE_DATE_HORIZON_MONTHS: u32 = 24;

fn text_of<'a>(data: &'a Record, field: &str) -> Option<&'a str> {
    data.get(field).and_then(Value::as_str)
}

/// Case-insensitive inequality. Passes when either side is missing.
fn differ_ignoring_case(data: &Record, a: &str, b: &str) -> bool {
    match (text_of(data, a), text_of(data, b)) {
        (Some(a), Some(b)) => a.to_lowercase() != b.to_lowercase(),
        _ => true,
    }
}

/// Validator for onboarding records.
#[derive(Debug, Clone)]
pub struct WorkflowValidator {
    engine: ValidationEngine,
    workflow: Schema,
    optional: Schema,
    task: Schema,
    update: Schema,
    task_update: Schema,
    filter: Schema,
    max_bulk_size: usize,
    max_message_len: usize,
}

impl WorkflowValidator {
    /// Build the validator and resolve every rule id in every schema.
    pub fn new(engine: ValidationEngine, config: &WorkflowConfig) -> Result<Self> {
        let validator = Self {
            workflow: Schema::from_table(WORKFLOW_FIELDS),
            optional: Schema::from_table(OPTIONAL_WORKFLOW_FIELDS),
            task: Schema::from_table(TASK_FIELDS),
            update: Schema::from_table(WORKFLOW_UPDATE_FIELDS),
            task_update: Schema::from_table(TASK_UPDATE_FIELDS),
            filter: Schema::from_table(FILTER_FIELDS),
            max_bulk_size: config.max_bulk_size,
            max_message_len: config.max_reminder_message_len,
            engine,
        };
        for schema in [
            &validator.workflow,
            &validator.optional,
            &validator.task,
            &validator.update,
            &validator.task_update,
            &validator.filter,
        ] {
            validator.engine.check_schema(schema)?;
        }
        Ok(validator)
    }

    /// Copy of this validator whose date rules compare against `today`.
    pub fn at(&self, today: NaiveDate) -> Self {
        Self {
            engine: self.engine.clone().with_today(today),
            ..self.clone()
        }
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    pub fn workflow_schema(&self) -> &Schema {
        &self.workflow
    }

    pub fn max_bulk_size(&self) -> usize {
        self.max_bulk_size
    }

    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    /// The three workflow invariants, anchored at the engine's today.
    pub fn cross_field_rules(&self) -> Vec<CrossFieldRule> {
        let horizon = self
            .engine
            .today()
            .checked_add_months(Months::new(HIRE_DATE_HORIZON_MONTHS));
        vec![
            CrossFieldRule::new(&["employee", "supervisorName"], SAME_PERSON_MESSAGE, |d| {
                differ_ignoring_case(d, "employee", "supervisorName")
            }),
            CrossFieldRule::new(&["email", "supervisorEmail"], SAME_EMAIL_MESSAGE, |d| {
                differ_ignoring_case(d, "email", "supervisorEmail")
            }),
            CrossFieldRule::new(&["hireDate"], HIRE_DATE_HORIZON_MESSAGE, move |d| {
                match (d.get("hireDate").and_then(value_to_date), horizon) {
                    (Some(hire), Some(max)) => hire <= max,
                    _ => true,
                }
            }),
        ]
    }

    /// Required fields, then optional fields, then cross-field invariants.
    pub fn validate_workflow(&self, data: &Record) -> ValidationResult {
        let required = self.engine.validate(data, &self.workflow, ValidateOptions::default());
        if !required.is_valid {
            return required;
        }

        let optional = self.engine.validate(data, &self.optional, ValidateOptions::default());
        if !optional.is_valid {
            return optional;
        }

        let mut valid_fields = required.valid_fields;
        valid_fields.extend(optional.valid_fields);

        let cross = self.engine.validate_cross_field(data, &self.cross_field_rules());
        let mut errors = ValidationErrors::new();
        if !cross.is_valid {
            errors.insert(
                CROSS_FIELD_KEY,
                cross
                    .errors
                    .into_iter()
                    .map(|e| e.into_field_error(CROSS_FIELD_KEY))
                    .collect(),
            );
        }
        ValidationResult::new(errors, valid_fields, required.data)
    }

    pub fn validate_workflow_update(&self, data: &Record) -> ValidationResult {
        self.engine.validate(data, &self.update, ValidateOptions::default())
    }

    pub fn validate_task(&self, data: &Record) -> ValidationResult {
        self.engine.validate(data, &self.task, ValidateOptions::default())
    }

    pub fn validate_task_update(&self, data: &Record) -> ValidationResult {
        self.engine.validate(data, &self.task_update, ValidateOptions::default())
    }

    pub fn validate_reminder_email(&self, email: &str) -> FieldResult {
        self.engine
            .validate_field(&Value::from(email), &["required", "email"], "email")
    }

    /// Optional: blank messages pass.
    pub fn validate_reminder_message(&self, message: &str) -> FieldResult {
        if message.trim().is_empty() {
            return FieldResult {
                is_valid: true,
                errors: Vec::new(),
            };
        }
        let rule = format!("maxLength:{}", self.max_message_len);
        self.engine
            .validate_field(&Value::from(message), std::slice::from_ref(&rule), "message")
    }

    /// A bulk id list must be non-empty and within the bulk limit.
    pub fn validate_bulk_operation(&self, workflow_ids: &[String]) -> ValidationResult {
        const FIELD: &str = "workflowIds";
        let mut errors = ValidationErrors::new();
        if workflow_ids.is_empty() {
            errors.insert(
                FIELD,
                vec![FieldError::new(FIELD, "required", "At least one workflow ID is required")],
            );
        } else if workflow_ids.len() > self.max_bulk_size {
            errors.insert(
                FIELD,
                vec![FieldError::new(
                    FIELD,
                    "max",
                    format!("Cannot process more than {} workflows at once", self.max_bulk_size),
                )],
            );
        }
        let valid_fields = if errors.is_empty() { vec![FIELD.to_string()] } else { Vec::new() };
        let mut data = Record::new();
        data.insert(FIELD.into(), Value::from(workflow_ids.to_vec()));
        ValidationResult::new(errors, valid_fields, data)
    }

    /// Field checks, then `dateFrom <= dateTo` when both are set.
    pub fn validate_filter_params(&self, params: &Record) -> ValidationResult {
        let result = self.engine.validate(params, &self.filter, ValidateOptions::default());
        if !result.is_valid {
            return result;
        }
        let range = CrossFieldRule::new(
            &["dateFrom", "dateTo"],
            "Start date must be before end date",
            |d| match (
                d.get("dateFrom").and_then(value_to_date),
                d.get("dateTo").and_then(value_to_date),
            ) {
                (Some(from), Some(to)) => from <= to,
                _ => true,
            },
        );
        let cross = self.engine.validate_cross_field(params, &[range]);
        if cross.is_valid {
            return result;
        }
        let mut errors = ValidationErrors::new();
        errors.insert(
            DATE_RANGE_KEY,
            cross
                .errors
                .into_iter()
                .map(|e| e.into_field_error(DATE_RANGE_KEY))
                .collect(),
        );
        ValidationResult::new(errors, result.valid_fields, result.data)
    }

    pub fn sanitize_workflow(&self, data: &Record) -> Record {
        sanitize(data, SANITIZED_FIELDS)
    }

    /// Trim every string, validate, and escape free text only when valid.
    pub fn validate_and_sanitize_workflow(&self, data: &Record) -> ValidationResult {
        let trimmed = trim(data, &[]);
        let mut result = self.validate_workflow(&trimmed);
        if result.is_valid {
            result.data = self.sanitize_workflow(&result.data);
        }
        result
    }

    pub fn is_valid_email(&self, value: &Value) -> bool {
        self.engine.validate_field(value, &["email"], "email").is_valid
    }

    pub fn is_future_date(&self, value: &Value) -> bool {
        self.engine.validate_field(value, &["futureDate"], "date").is_valid
    }

    pub fn is_present(&self, value: &Value) -> bool {
        self.engine.validate_field(value, &["required"], "field").is_valid
    }

    /// Length bounds, either of which may be omitted.
    pub fn meets_length(&self, value: &Value, min: Option<usize>, max: Option<usize>) -> bool {
        let mut rules = Vec::new();
        if let Some(min) = min {
            rules.push(format!("minLength:{min}"));
        }
        if let Some(max) = max {
            rules.push(format!("maxLength:{max}"));
        }
        self.engine.validate_field(value, rules.as_slice(), "field").is_valid
    }
}
