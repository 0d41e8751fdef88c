//! Workflow Lifecycle Manager — creation, task progress and reminders.
//!
//! ## Architecture
//! ```text
//! WorkflowManager
//!   ├── WorkflowValidator  → record checks before anything is stored
//!   ├── LifecyclePolicy    → derived status + reminder eligibility
//!   ├── WorkflowStore      → every read re-fetches, no cache
//!   ├── Notifier           → reminder delivery
//!   ├── Presenter?         → optional progress/success/error feedback
//!   └── Clock              → "now" for every decision
//! ```
//!
//! Bulk reminders run strictly one id at a time in input order. A failed
//! id is recorded and the batch moves on; earlier successes stay applied.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqflow_core::{ReqflowError, Result, WorkflowConfig};
use reqflow_validation::value::{to_text, value_to_date};
use reqflow_validation::{Record, ValidationEngine, ValidationResult};
use serde::Serialize;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::filter::WorkflowFilter;
use crate::id::generate_workflow_id;
use crate::lifecycle::LifecyclePolicy;
use crate::model::{Task, TaskStatus, Workflow, WorkflowPatch, WorkflowStatus, WorkflowView};
use crate::notify::{DeliveryAck, Notifier, ReminderPayload};
use crate::presenter::Presenter;
use crate::schemas::WorkflowValidator;
use crate::store::WorkflowStore;

/// Outcome of one id in a bulk send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderOutcome {
    pub workflow_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall shape of a bulk send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkSummary {
    AllSucceeded,
    AllFailed,
    Mixed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReminderReport {
    pub results: Vec<ReminderOutcome>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BulkReminderReport {
    fn push(&mut self, outcome: ReminderOutcome) {
        if outcome.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.results.push(outcome);
    }

    pub fn summary(&self) -> BulkSummary {
        match (self.success_count, self.failure_count) {
            (_, 0) => BulkSummary::AllSucceeded,
            (0, _) => BulkSummary::AllFailed,
            _ => BulkSummary::Mixed,
        }
    }

    pub fn summary_message(&self) -> String {
        match self.summary() {
            BulkSummary::AllSucceeded => format!(
                "Successfully sent {} reminder{}!",
                self.success_count,
                if self.success_count > 1 { "s" } else { "" }
            ),
            BulkSummary::AllFailed => {
                format!("Failed to send all {} reminders", self.failure_count)
            }
            BulkSummary::Mixed => format!(
                "Sent {} reminders, {} failed",
                self.success_count, self.failure_count
            ),
        }
    }
}

/// Counts by derived status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatistics {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub complete: usize,
    pub overdue: usize,
    pub needing_reminders: usize,
}

/// The lifecycle manager.
pub struct WorkflowManager {
    store: Arc<dyn WorkflowStore>,
    notifier: Arc<dyn Notifier>,
    presenter: Option<Arc<dyn Presenter>>,
    clock: Arc<dyn Clock>,
    validator: WorkflowValidator,
    policy: LifecyclePolicy,
    config: WorkflowConfig,
}

impl WorkflowManager {
    /// Create a manager with the built-in validation rules and the wall clock.
    pub fn new(
        config: &WorkflowConfig,
        store: Arc<dyn WorkflowStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        Ok(Self {
            store,
            notifier,
            presenter: None,
            clock: Arc::new(SystemClock),
            validator: WorkflowValidator::new(ValidationEngine::new(), config)?,
            policy: LifecyclePolicy::from_config(config),
            config: config.clone(),
        })
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Swap in a validator, e.g. one whose engine carries custom rules.
    pub fn with_validator(mut self, validator: WorkflowValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Validator anchored at the clock's today.
    pub fn validator(&self) -> WorkflowValidator {
        self.validator.at(self.clock.today())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn present(&self, f: impl FnOnce(&dyn Presenter)) {
        if let Some(presenter) = &self.presenter {
            f(presenter.as_ref());
        }
    }

    /// Log a failure and surface it to the presenter, then pass it on.
    fn report<T>(&self, result: Result<T>, context: &str) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!("⚠️ {context}: {e}");
            let message = e.user_message(Some(context));
            self.present(|p| p.error(&message));
        }
        result
    }

    // ── Reads ──

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.store.list_workflows().await
    }

    /// Every workflow with freshly derived status.
    pub async fn list_views(&self) -> Result<Vec<WorkflowView>> {
        let now = self.now();
        Ok(self
            .list_workflows()
            .await?
            .into_iter()
            .map(|wf| self.policy.view(wf, now))
            .collect())
    }

    pub async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow> {
        self.list_workflows()
            .await?
            .into_iter()
            .find(|wf| wf.workflow_id == workflow_id)
            .ok_or_else(|| ReqflowError::WorkflowNotFound(workflow_id.to_string()))
    }

    pub fn derive_status(&self, workflow: &Workflow) -> WorkflowStatus {
        self.policy.status(workflow, self.now())
    }

    pub fn needs_reminder(&self, workflow: &Workflow) -> bool {
        self.policy.needs_reminder(workflow, self.now())
    }

    pub fn generate_workflow_id(&self) -> String {
        generate_workflow_id(&self.config.id_prefix, self.clock.today())
    }

    /// Filter snapshots of `workflows` by derived status and the other criteria.
    pub fn filter_workflows(&self, workflows: Vec<Workflow>, filter: &WorkflowFilter) -> Vec<WorkflowView> {
        let now = self.now();
        let views = workflows
            .into_iter()
            .map(|wf| self.policy.view(wf, now))
            .collect();
        crate::filter::filter_workflows(views, filter)
    }

    // ── Creation and updates ──

    /// Validate, sanitize and store a new workflow.
    ///
    /// Tasks come from the record's `tasks` array or, when absent, from the
    /// configured defaults. Every task starts `Open`, so a new workflow
    /// starts `Open` with zeroed counters.
    pub async fn create_workflow(&self, record: &Record) -> Result<Workflow> {
        let result = self.build_workflow(record).await;
        let result = match result {
            Ok(workflow) => self.store.save_workflow(workflow).await,
            Err(e) => Err(e),
        };
        let workflow = self.report(result, "Failed to create workflow")?;
        tracing::info!(
            "📋 Workflow created: {} for {} ({} tasks)",
            workflow.workflow_id,
            workflow.employee,
            workflow.tasks_total
        );
        self.present(|p| p.success("Workflow created successfully!"));
        Ok(workflow)
    }

    async fn build_workflow(&self, record: &Record) -> Result<Workflow> {
        let validator = self.validator();
        let validation = validator.validate_and_sanitize_workflow(record);
        let data = into_data(validation)?;

        let hire_date = data
            .get("hireDate")
            .and_then(value_to_date)
            .ok_or_else(|| ReqflowError::validation("hireDate", "Please enter a valid date"))?;

        let tasks = self.build_tasks(&validator, data.get("tasks"))?;

        let workflow_id = match field_text(&data, "workflowId") {
            Some(id) => {
                if self.list_workflows().await?.iter().any(|wf| wf.workflow_id == id) {
                    return Err(ReqflowError::validation(
                        "workflowId",
                        format!("Workflow {id} already exists"),
                    ));
                }
                id
            }
            None => self.generate_workflow_id(),
        };

        let now = self.now();
        let mut workflow = Workflow {
            workflow_id,
            employee: field_text(&data, "employee").unwrap_or_default(),
            email: field_text(&data, "email").unwrap_or_default(),
            position: field_text(&data, "position").unwrap_or_default(),
            hire_date,
            site_name: field_text(&data, "siteName").unwrap_or_default(),
            supervisor_name: field_text(&data, "supervisorName").unwrap_or_default(),
            supervisor_email: field_text(&data, "supervisorEmail").unwrap_or_default(),
            employment_type: field_text(&data, "employmentType").unwrap_or_default(),
            phone: field_text(&data, "phone"),
            notes: field_text(&data, "notes"),
            tasks,
            tasks_complete: 0,
            tasks_total: 0,
            last_reminder: None,
            reminder_count: 0,
            created_at: now,
            updated_at: now,
        };
        workflow.recount();
        Ok(workflow)
    }

    fn build_tasks(&self, validator: &WorkflowValidator, tasks: Option<&Value>) -> Result<Vec<Task>> {
        let tasks = match tasks {
            None | Some(Value::Null) => self
                .config
                .default_tasks
                .iter()
                .map(|t| Task::new(&t.id, &t.name))
                .collect(),
            Some(Value::Array(items)) => {
                let mut tasks = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let Value::Object(fields) = item else {
                        return Err(ReqflowError::validation(
                            "tasks",
                            format!("Task {} must be an object", i + 1),
                        ));
                    };
                    let mut fields = fields.clone();
                    fields
                        .entry("status")
                        .or_insert_with(|| Value::from(TaskStatus::Open.as_str()));
                    let result = validator.validate_task(&fields);
                    if let Some(err) = result.first_error() {
                        return Err(ReqflowError::validation(
                            "tasks",
                            format!("Task {} {}: {}", i + 1, err.field, err.message),
                        ));
                    }
                    let id = field_text(&fields, "id").unwrap_or_default();
                    if tasks.iter().any(|t: &Task| t.id == id) {
                        return Err(ReqflowError::validation(
                            "tasks",
                            format!("Duplicate task id {id}"),
                        ));
                    }
                    tasks.push(Task::new(&id, &field_text(&fields, "name").unwrap_or_default()));
                }
                tasks
            }
            Some(_) => {
                return Err(ReqflowError::validation("tasks", "Tasks must be a list"));
            }
        };
        if tasks.is_empty() {
            return Err(ReqflowError::validation("tasks", "At least one task is required"));
        }
        Ok(tasks)
    }

    /// Apply a typed partial update. Counters in the patch are checked
    /// against the update schema.
    pub async fn update_workflow(&self, workflow_id: &str, patch: WorkflowPatch) -> Result<Workflow> {
        let result = self.apply_patch(workflow_id, patch).await;
        self.report(result, "Failed to update workflow")
    }

    async fn apply_patch(&self, workflow_id: &str, patch: WorkflowPatch) -> Result<Workflow> {
        if let Value::Object(fields) = serde_json::to_value(&patch)? {
            into_data(self.validator().validate_workflow_update(&fields))?;
        }
        let updated = self
            .store
            .update_workflow(workflow_id, &patch.stamped(self.now()))
            .await?;
        tracing::debug!("Workflow {workflow_id} updated");
        Ok(updated)
    }

    /// Set one task's status, recount, and persist tasks and counters in a
    /// single update. Returns the workflow with its new derived status.
    pub async fn update_task_status(
        &self,
        workflow_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<WorkflowView> {
        let result = self.set_task_status(workflow_id, task_id, status).await;
        let view = self.report(result, "Failed to update task status")?;
        tracing::info!(
            "✅ Task {task_id} in {workflow_id} → {status} (workflow {}, {}/{})",
            view.status,
            view.workflow.tasks_complete,
            view.workflow.tasks_total
        );
        self.present(|p| p.success("Task status updated"));
        Ok(view)
    }

    async fn set_task_status(
        &self,
        workflow_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<WorkflowView> {
        let workflow = self.get_workflow(workflow_id).await?;
        let now = self.now();
        let mut tasks = workflow.tasks;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| ReqflowError::TaskNotFound {
                workflow_id: workflow_id.to_string(),
                task_id: task_id.to_string(),
            })?;
        task.status = status;
        task.updated_at = Some(now);

        let patch = WorkflowPatch::tasks(tasks).stamped(now);
        let updated = self.store.update_workflow(workflow_id, &patch).await?;
        Ok(self.policy.view(updated, now))
    }

    // ── Reminders ──

    /// Send one reminder and record it on the workflow.
    pub async fn send_reminder(&self, workflow_id: &str, message: Option<&str>) -> Result<DeliveryAck> {
        self.present(|p| p.progress("Sending reminder..."));
        let result = self.deliver_reminder(workflow_id, message).await;
        let (ack, recipient) = self.report(result, "Failed to send reminder")?;
        self.present(|p| p.success(&format!("Reminder sent to {recipient}")));
        Ok(ack)
    }

    /// Returns the ack and the recipient's display name.
    async fn deliver_reminder(
        &self,
        workflow_id: &str,
        message: Option<&str>,
    ) -> Result<(DeliveryAck, String)> {
        let workflow = self.get_workflow(workflow_id).await?;
        let validator = self.validator();

        if !validator.validate_reminder_email(&workflow.email).is_valid {
            return Err(ReqflowError::validation(
                "email",
                "Invalid email address for recipient",
            ));
        }
        let message = message.unwrap_or_default();
        if !validator.validate_reminder_message(message).is_valid {
            return Err(ReqflowError::validation(
                "customMessage",
                format!(
                    "Custom message is too long (max {} characters)",
                    validator.max_message_len()
                ),
            ));
        }

        let now = self.now();
        let payload = ReminderPayload {
            workflow_id: workflow.workflow_id.clone(),
            recipient: workflow.email.clone(),
            recipient_name: workflow.employee.clone(),
            custom_message: message.to_string(),
            sent_at: now,
        };

        let ack = match self.notifier.deliver(&payload).await {
            Ok(ack) if ack.success => ack,
            Ok(ack) => {
                return Err(ReqflowError::ReminderDelivery {
                    workflow_id: workflow_id.to_string(),
                    reason: ack.message,
                });
            }
            Err(e @ ReqflowError::ReminderDelivery { .. }) => return Err(e),
            Err(e) => {
                return Err(ReqflowError::ReminderDelivery {
                    workflow_id: workflow_id.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let patch = WorkflowPatch::reminder_sent(now, workflow.reminder_count + 1).stamped(now);
        self.store.update_workflow(workflow_id, &patch).await?;
        tracing::info!(
            "🔔 Reminder #{} sent for {} to {}",
            workflow.reminder_count + 1,
            workflow_id,
            workflow.email
        );
        let recipient = if workflow.employee.is_empty() {
            workflow.email
        } else {
            workflow.employee
        };
        Ok((ack, recipient))
    }

    /// Send reminders one id at a time over the whole list. Per-id failures
    /// become entries in the report; only an empty list fails the call.
    ///
    /// The bulk size limit is not applied here. Callers taking ids from user
    /// input check them with [`WorkflowValidator::validate_bulk_operation`].
    pub async fn send_bulk_reminders(
        &self,
        workflow_ids: &[String],
        message: Option<&str>,
    ) -> Result<BulkReminderReport> {
        if workflow_ids.is_empty() {
            let err = ReqflowError::validation("workflowIds", "At least one workflow ID is required");
            return self.report(Err(err), "Failed to send bulk reminders");
        }

        let total = workflow_ids.len();
        self.present(|p| {
            p.progress(&format!(
                "Sending {total} reminder{}...",
                if total > 1 { "s" } else { "" }
            ))
        });

        let mut report = BulkReminderReport::default();
        for (i, workflow_id) in workflow_ids.iter().enumerate() {
            self.present(|p| p.progress(&format!("Sending reminder {} of {total}...", i + 1)));
            let outcome = match self.deliver_reminder(workflow_id, message).await {
                Ok((ack, _)) => ReminderOutcome {
                    workflow_id: workflow_id.clone(),
                    success: true,
                    message: Some(ack.message),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("⚠️ Reminder for {workflow_id} failed: {e}");
                    ReminderOutcome {
                        workflow_id: workflow_id.clone(),
                        success: false,
                        message: None,
                        error: Some(e.user_message(None)),
                    }
                }
            };
            report.push(outcome);
        }

        let summary = report.summary_message();
        tracing::info!("📣 Bulk reminders: {summary}");
        self.present(|p| match report.summary() {
            BulkSummary::AllSucceeded => p.success(&summary),
            BulkSummary::AllFailed => p.error(&summary),
            BulkSummary::Mixed => p.warning(&summary),
        });
        Ok(report)
    }

    pub async fn workflows_needing_reminders(&self) -> Result<Vec<Workflow>> {
        let now = self.now();
        Ok(self
            .list_workflows()
            .await?
            .into_iter()
            .filter(|wf| self.policy.needs_reminder(wf, now))
            .collect())
    }

    /// Remind every eligible workflow in one bulk pass. `None` when nothing
    /// is due.
    pub async fn check_and_send_reminders(&self) -> Result<Option<BulkReminderReport>> {
        let due = self.workflows_needing_reminders().await;
        let due = self.report(due, "Failed to check and send reminders")?;
        if due.is_empty() {
            tracing::debug!("No workflows need reminders");
            return Ok(None);
        }
        tracing::info!("⏰ Found {} workflows needing reminders", due.len());

        let ids: Vec<String> = due.into_iter().map(|wf| wf.workflow_id).collect();
        self.send_bulk_reminders(&ids, None).await.map(Some)
    }

    // ── Statistics ──

    /// Counts by freshly derived status. Reads the store when `workflows`
    /// is `None`.
    pub async fn statistics(&self, workflows: Option<&[Workflow]>) -> Result<WorkflowStatistics> {
        let fetched;
        let workflows = match workflows {
            Some(list) => list,
            None => {
                fetched = self.list_workflows().await?;
                &fetched
            }
        };
        let now = self.now();
        let mut stats = WorkflowStatistics {
            total: workflows.len(),
            ..WorkflowStatistics::default()
        };
        for wf in workflows {
            match self.policy.status(wf, now) {
                WorkflowStatus::Open => stats.open += 1,
                WorkflowStatus::InProgress => stats.in_progress += 1,
                WorkflowStatus::Complete => stats.complete += 1,
                WorkflowStatus::Overdue => stats.overdue += 1,
            }
            if self.policy.needs_reminder(wf, now) {
                stats.needing_reminders += 1;
            }
        }
        Ok(stats)
    }
}

/// Turn a failed validation into a `Validation` error carrying the first
/// problem; pass the data through otherwise.
fn into_data(result: ValidationResult) -> Result<Record> {
    if !result.is_valid
        && let Some(err) = result.first_error()
    {
        return Err(ReqflowError::validation(err.field.clone(), err.message.clone()));
    }
    Ok(result.data)
}

/// Non-empty text of a field.
fn field_text(data: &Record, field: &str) -> Option<String> {
    data.get(field)
        .map(to_text)
        .filter(|s| !s.trim().is_empty())
}
