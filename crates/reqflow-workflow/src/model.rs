//! Workflow and task records — the data the lifecycle manager persists.
//!
//! A workflow never stores its status. [`WorkflowStatus`] is recomputed
//! from the counters and the hire date on every read, see
//! [`crate::lifecycle::LifecyclePolicy::status`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use reqflow_core::{ReqflowError, Result};
use serde::{Deserialize, Serialize};

/// Status of a single onboarding task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Complete,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Open, Self::InProgress, Self::Complete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Complete => "Complete",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ReqflowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ReqflowError::validation("status", "Must be one of: Open, In Progress, Complete")
            })
    }
}

/// Derived workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Complete,
    Overdue,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 4] =
        [Self::Open, Self::InProgress, Self::Complete, Self::Overdue];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Complete => "Complete",
            Self::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = ReqflowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ReqflowError::validation(
                    "status",
                    "Must be one of: Open, In Progress, Complete, Overdue",
                )
            })
    }
}

/// One step of an onboarding workflow. Owned by its workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            status: TaskStatus::Open,
            updated_at: None,
        }
    }
}

/// A new-hire onboarding request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub workflow_id: String,
    pub employee: String,
    pub email: String,
    pub position: String,
    /// Target date the status and reminder logic count down to.
    #[serde(alias = "targetDate")]
    pub hire_date: NaiveDate,
    pub site_name: String,
    pub supervisor_name: String,
    pub supervisor_email: String,
    pub employment_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub tasks_complete: usize,
    #[serde(default)]
    pub tasks_total: usize,
    #[serde(default)]
    pub last_reminder: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Recompute `tasks_complete` / `tasks_total` from the task list.
    pub fn recount(&mut self) {
        self.tasks_complete = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Complete)
            .count();
        self.tasks_total = self.tasks.len();
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Completed share of tasks, 0.0 ..= 1.0. Zero when there are no tasks.
    pub fn progress_ratio(&self) -> f64 {
        if self.tasks_total == 0 {
            0.0
        } else {
            self.tasks_complete as f64 / self.tasks_total as f64
        }
    }

    /// Completed share of tasks as a whole percentage.
    pub fn progress_percent(&self) -> u8 {
        (self.progress_ratio() * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// Partial update applied atomically by a store.
///
/// `None` leaves a field untouched. `updated_at` is always refreshed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_complete: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reminder: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_count: Option<u32>,
    /// Stamp for `updated_at`; the store uses the wall clock when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowPatch {
    /// Task list change with its recomputed counters.
    pub fn tasks(tasks: Vec<Task>) -> Self {
        let tasks_complete = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Complete)
            .count();
        Self {
            tasks_complete: Some(tasks_complete),
            tasks_total: Some(tasks.len()),
            tasks: Some(tasks),
            ..Self::default()
        }
    }

    /// Reminder bookkeeping after a successful delivery.
    pub fn reminder_sent(at: DateTime<Utc>, reminder_count: u32) -> Self {
        Self {
            last_reminder: Some(at),
            reminder_count: Some(reminder_count),
            ..Self::default()
        }
    }

    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn apply(&self, workflow: &mut Workflow) {
        if let Some(tasks) = &self.tasks {
            workflow.tasks = tasks.clone();
        }
        if let Some(n) = self.tasks_complete {
            workflow.tasks_complete = n;
        }
        if let Some(n) = self.tasks_total {
            workflow.tasks_total = n;
        }
        if let Some(date) = self.hire_date {
            workflow.hire_date = date;
        }
        if let Some(phone) = &self.phone {
            workflow.phone = Some(phone.clone());
        }
        if let Some(notes) = &self.notes {
            workflow.notes = Some(notes.clone());
        }
        if let Some(at) = self.last_reminder {
            workflow.last_reminder = Some(at);
        }
        if let Some(count) = self.reminder_count {
            workflow.reminder_count = count;
        }
        workflow.updated_at = self.updated_at.unwrap_or_else(Utc::now);
    }
}

/// A stored workflow with its freshly derived state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowView {
    #[serde(flatten)]
    pub workflow: Workflow,
    pub status: WorkflowStatus,
    pub progress: u8,
    pub needs_reminder: bool,
}
