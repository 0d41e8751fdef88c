//! Error taxonomy.
//!
//! Validation failures inside the engine never surface as errors: they come
//! back as structured results. `ReqflowError::Validation` is what a lifecycle
//! operation raises once it decides a structured failure must stop the call.

/// Result alias used across the ReqFlow crates.
pub type Result<T> = std::result::Result<T, ReqflowError>;

#[derive(Debug, thiserror::Error)]
pub enum ReqflowError {
    /// Input failed a schema or cross-field rule.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// A rule identifier could not be resolved. Configuration bug, not user input.
    #[error("Unknown validation rule '{rule}': {reason}")]
    UnknownRule { rule: String, reason: String },

    #[error("Workflow {0} not found")]
    WorkflowNotFound(String),

    #[error("Task {task_id} not found in workflow {workflow_id}")]
    TaskNotFound { workflow_id: String, task_id: String },

    #[error("Reminder for workflow {workflow_id} failed: {reason}")]
    ReminderDelivery { workflow_id: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ReqflowError {
    /// Shorthand for a validation failure on one field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::WorkflowNotFound(_) | Self::TaskNotFound { .. })
    }

    /// Whether the caller can reasonably retry or correct input.
    /// Rule and config errors point at a broken deployment instead.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnknownRule { .. } | Self::Config(_))
    }

    /// Human-readable message for end users, optionally prefixed with the
    /// operation that failed (e.g. "Failed to send reminder").
    pub fn user_message(&self, context: Option<&str>) -> String {
        let message = match self {
            Self::Validation { field, message } => {
                if field.starts_with('_') {
                    message.clone()
                } else {
                    format!("{}: {message}", humanize_field(field))
                }
            }
            Self::UnknownRule { .. } | Self::Config(_) => {
                "A configuration problem prevented this action. Please contact support.".into()
            }
            Self::WorkflowNotFound(_) => "Workflow not found.".into(),
            Self::TaskNotFound { .. } => "The requested task could not be found.".into(),
            Self::ReminderDelivery { reason, .. } => {
                if reason.is_empty() {
                    "The reminder could not be delivered. Please try again.".into()
                } else {
                    format!("Delivery failed: {reason}")
                }
            }
            Self::Storage(_) | Self::Io(_) | Self::Json(_) => {
                "An unexpected error occurred. Please try again.".into()
            }
        };

        match context {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}: {message}"),
            _ => message,
        }
    }
}

/// `supervisorEmail` → `Supervisor email`.
fn humanize_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, ch) in field.chars().enumerate() {
        if i == 0 {
            out.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            out.push(' ');
            out.extend(ch.to_lowercase());
        } else if ch == '_' {
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
    out
}
