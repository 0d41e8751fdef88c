//! ReqFlow configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReqflowError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReqflowConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl ReqflowConfig {
    /// Load config from the default path (~/.reqflow/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReqflowError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ReqflowError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReqflowError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the lifecycle manager cannot work with.
    pub fn validate(&self) -> Result<()> {
        let intervals = &self.workflow.reminder_intervals_hours;
        if intervals.is_empty() {
            return Err(ReqflowError::Config(
                "workflow.reminder_intervals_hours must not be empty".into(),
            ));
        }
        if intervals.windows(2).any(|w| w[1] < w[0]) {
            return Err(ReqflowError::Config(
                "workflow.reminder_intervals_hours must be ascending".into(),
            ));
        }
        if self.workflow.max_bulk_size == 0 {
            return Err(ReqflowError::Config(
                "workflow.max_bulk_size must be at least 1".into(),
            ));
        }
        if self.workflow.id_prefix.trim().is_empty() {
            return Err(ReqflowError::Config("workflow.id_prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the ReqFlow home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".reqflow")
    }
}

/// Workflow lifecycle policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Escalating gap between reminders, indexed by reminder count.
    #[serde(default = "default_reminder_intervals")]
    pub reminder_intervals_hours: Vec<u32>,
    /// A workflow is overdue when fewer days than this remain until its target date.
    #[serde(default)]
    pub overdue_threshold_days: i64,
    /// First reminder goes out once this many days (or fewer) remain.
    #[serde(default = "default_first_reminder_window")]
    pub first_reminder_window_days: i64,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    #[serde(default = "default_max_bulk_size")]
    pub max_bulk_size: usize,
    #[serde(default = "default_max_reminder_message_len")]
    pub max_reminder_message_len: usize,
    /// Tasks attached to a new workflow whose record carries none.
    #[serde(default = "default_tasks")]
    pub default_tasks: Vec<TaskTemplate>,
}

fn default_reminder_intervals() -> Vec<u32> { vec![24, 48, 168] }
fn default_first_reminder_window() -> i64 { 7 }
fn default_id_prefix() -> String { "WF-REQ".into() }
fn default_max_bulk_size() -> usize { 100 }
fn default_max_reminder_message_len() -> usize { 500 }
fn default_tasks() -> Vec<TaskTemplate> {
    [
        ("TASK-HR", "HR Paperwork"),
        ("TASK-IT", "IT Account Setup"),
        ("TASK-EQUIP", "Equipment Assignment"),
        ("TASK-ORIENT", "Orientation"),
    ]
    .into_iter()
    .map(|(id, name)| TaskTemplate {
        id: id.into(),
        name: name.into(),
    })
    .collect()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            reminder_intervals_hours: default_reminder_intervals(),
            overdue_threshold_days: 0,
            first_reminder_window_days: default_first_reminder_window(),
            id_prefix: default_id_prefix(),
            max_bulk_size: default_max_bulk_size(),
            max_reminder_message_len: default_max_reminder_message_len(),
            default_tasks: default_tasks(),
        }
    }
}

/// Template for a task created alongside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: String,
    pub name: String,
}

/// Where the local JSON store keeps workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.reqflow/workflows.json".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}
