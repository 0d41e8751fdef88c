//! # ReqFlow Workflow
//!
//! Onboarding workflows: validated creation, task progress, a status that
//! is always derived and never stored, and escalating reminders.
//!
//! ## Lifecycle
//! ```text
//!            ┌── first task Complete ──┐
//!   Open ────┤                         ├──► In Progress ──► Complete
//!            └── hire date passed ─────┴──► Overdue (until all tasks done)
//!
//! Reminders (not Complete):
//!   overdue                        → always due
//!   never reminded, ≤ 7 days out   → due
//!   reminded n times               → due after intervals[min(n, last)] hours
//! ```

pub mod clock;
pub mod filter;
pub mod id;
pub mod lifecycle;
pub mod manager;
pub mod model;
pub mod notify;
pub mod presenter;
pub mod schemas;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use filter::{SortDirection, SortKey, WorkflowFilter, filter_workflows, sort_workflows};
pub use id::generate_workflow_id;
pub use lifecycle::{LifecyclePolicy, days_until, derive_status};
pub use manager::{
    BulkReminderReport, BulkSummary, ReminderOutcome, WorkflowManager, WorkflowStatistics,
};
pub use model::{Task, TaskStatus, Workflow, WorkflowPatch, WorkflowStatus, WorkflowView};
pub use notify::{DeliveryAck, LogNotifier, Notifier, ReminderPayload};
pub use presenter::Presenter;
pub use schemas::WorkflowValidator;
pub use store::{InMemoryWorkflowStore, JsonFileWorkflowStore, WorkflowStore};
