//! Derived status and reminder eligibility.
//!
//! ```text
//! (tasks_complete, tasks_total, days_until(hire_date, now))
//!   → Complete     tasks_complete == tasks_total
//!   → Overdue      days_until < overdue_threshold_days
//!   → In Progress  tasks_complete > 0
//!   → Open
//! ```
//!
//! Reminder cadence widens with every reminder sent: the gap after the
//! n-th reminder is `reminder_intervals_hours[min(n, len - 1)]`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqflow_core::WorkflowConfig;

use crate::model::{Workflow, WorkflowStatus, WorkflowView};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days from `now` until midnight UTC of `target`, rounded down.
/// Negative once the target date has started to pass.
pub fn days_until(target: NaiveDate, now: DateTime<Utc>) -> i64 {
    let target = target.and_time(NaiveTime::MIN).and_utc();
    (target - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Status from raw counters. Completeness beats overdue beats progress.
pub fn derive_status(
    tasks_complete: usize,
    tasks_total: usize,
    days_until_target: i64,
    overdue_threshold_days: i64,
) -> WorkflowStatus {
    if tasks_complete == tasks_total {
        WorkflowStatus::Complete
    } else if days_until_target < overdue_threshold_days {
        WorkflowStatus::Overdue
    } else if tasks_complete > 0 {
        WorkflowStatus::InProgress
    } else {
        WorkflowStatus::Open
    }
}

/// Status and reminder rules, built from `[workflow]` config.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecyclePolicy {
    pub overdue_threshold_days: i64,
    pub first_reminder_window_days: i64,
    /// Ascending escalation schedule.
    pub reminder_intervals_hours: Vec<u32>,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

impl LifecyclePolicy {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            overdue_threshold_days: config.overdue_threshold_days,
            first_reminder_window_days: config.first_reminder_window_days,
            reminder_intervals_hours: config.reminder_intervals_hours.clone(),
        }
    }

    pub fn status(&self, workflow: &Workflow, now: DateTime<Utc>) -> WorkflowStatus {
        derive_status(
            workflow.tasks_complete,
            workflow.tasks_total,
            days_until(workflow.hire_date, now),
            self.overdue_threshold_days,
        )
    }

    /// Hours that must pass after the last reminder, given how many were sent.
    /// Clamps at the last (longest) interval.
    pub fn next_interval_hours(&self, reminder_count: u32) -> u32 {
        let index = (reminder_count as usize).min(self.reminder_intervals_hours.len().saturating_sub(1));
        self.reminder_intervals_hours.get(index).copied().unwrap_or(0)
    }

    pub fn needs_reminder(&self, workflow: &Workflow, now: DateTime<Utc>) -> bool {
        let days = days_until(workflow.hire_date, now);
        let status = derive_status(
            workflow.tasks_complete,
            workflow.tasks_total,
            days,
            self.overdue_threshold_days,
        );
        if status == WorkflowStatus::Complete {
            return false;
        }
        if days < self.overdue_threshold_days {
            return true;
        }
        match workflow.last_reminder {
            None => days <= self.first_reminder_window_days,
            Some(last) => {
                let elapsed_secs = (now - last).num_seconds();
                let required_secs = i64::from(self.next_interval_hours(workflow.reminder_count)) * 3600;
                elapsed_secs >= required_secs
            }
        }
    }

    /// Snapshot a workflow with its derived state.
    pub fn view(&self, workflow: Workflow, now: DateTime<Utc>) -> WorkflowView {
        WorkflowView {
            status: self.status(&workflow, now),
            progress: workflow.progress_percent(),
            needs_reminder: self.needs_reminder(&workflow, now),
            workflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;
    use crate::model::tests::sample_workflow;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 10, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_until() {
        assert_eq!(days_until(date(2026, 6, 16), now()), 0);
        assert_eq!(days_until(date(2026, 6, 17), now()), 1);
        assert_eq!(days_until(date(2026, 6, 15), now()), -1);
        assert_eq!(days_until(date(2026, 6, 14), now()), -2);
        let midnight = Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(days_until(date(2026, 6, 15), midnight), 0);
    }

    #[test]
    fn test_status_precedence() {
        assert_eq!(derive_status(3, 3, -10, 0), WorkflowStatus::Complete);
        assert_eq!(derive_status(1, 3, -1, 0), WorkflowStatus::Overdue);
        assert_eq!(derive_status(0, 3, -1, 0), WorkflowStatus::Overdue);
        assert_eq!(derive_status(1, 3, 5, 0), WorkflowStatus::InProgress);
        assert_eq!(derive_status(0, 3, 5, 0), WorkflowStatus::Open);
        assert_eq!(derive_status(0, 3, 1, 2), WorkflowStatus::Overdue);
    }

    #[test]
    fn test_status_tracks_tasks() {
        let policy = LifecyclePolicy::default();
        let mut wf = sample_workflow("WF-1", date(2026, 7, 1));
        assert_eq!(policy.status(&wf, now()), WorkflowStatus::Open);

        wf.tasks[0].status = TaskStatus::Complete;
        wf.recount();
        assert_eq!(policy.status(&wf, now()), WorkflowStatus::InProgress);

        wf.hire_date = date(2026, 6, 1);
        assert_eq!(policy.status(&wf, now()), WorkflowStatus::Overdue);

        wf.tasks[1].status = TaskStatus::Complete;
        wf.recount();
        assert_eq!(policy.status(&wf, now()), WorkflowStatus::Complete);
    }

    #[test]
    fn test_cadence_clamps_at_longest_interval() {
        let policy = LifecyclePolicy::default();
        assert_eq!(policy.next_interval_hours(0), 24);
        assert_eq!(policy.next_interval_hours(1), 48);
        assert_eq!(policy.next_interval_hours(2), 168);
        assert_eq!(policy.next_interval_hours(9), 168);
    }

    #[test]
    fn test_first_reminder_window() {
        let policy = LifecyclePolicy::default();
        let far = sample_workflow("WF-1", date(2026, 8, 1));
        assert!(!policy.needs_reminder(&far, now()));

        let near = sample_workflow("WF-2", date(2026, 6, 22));
        assert_eq!(days_until(near.hire_date, now()), 6);
        assert!(policy.needs_reminder(&near, now()));
    }

    #[test]
    fn test_reminder_escalation() {
        let policy = LifecyclePolicy::default();
        let mut wf = sample_workflow("WF-1", date(2026, 6, 20));
        wf.reminder_count = 2;
        wf.last_reminder = Some(now() - Duration::hours(100));
        assert!(!policy.needs_reminder(&wf, now()));
        wf.last_reminder = Some(now() - Duration::hours(168));
        assert!(policy.needs_reminder(&wf, now()));

        wf.reminder_count = 0;
        wf.last_reminder = Some(now() - Duration::hours(23));
        assert!(!policy.needs_reminder(&wf, now()));
    }

    #[test]
    fn test_overdue_and_complete_override_cadence() {
        let policy = LifecyclePolicy::default();
        let mut wf = sample_workflow("WF-1", date(2026, 6, 1));
        wf.last_reminder = Some(now() - Duration::hours(1));
        wf.reminder_count = 5;
        assert!(policy.needs_reminder(&wf, now()));

        for task in &mut wf.tasks {
            task.status = TaskStatus::Complete;
        }
        wf.recount();
        assert!(!policy.needs_reminder(&wf, now()));
    }

    #[test]
    fn test_view_snapshot() {
        let policy = LifecyclePolicy::default();
        let wf = sample_workflow("WF-1", date(2026, 6, 20));
        let view = policy.view(wf, now());
        assert_eq!(view.status, WorkflowStatus::Open);
        assert_eq!(view.progress, 0);
        assert!(view.needs_reminder);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "Open");
        assert_eq!(json["workflowId"], "WF-1");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn status_is_total_and_ordered(
                total in 0usize..20,
                done_frac in 0usize..=100,
                days in -400i64..400,
                threshold in -5i64..5,
            ) {
                let complete = total * done_frac / 100;
                let status = derive_status(complete, total, days, threshold);
                prop_assert!(WorkflowStatus::ALL.contains(&status));
                if complete == total {
                    prop_assert_eq!(status, WorkflowStatus::Complete);
                } else if days < threshold {
                    prop_assert_eq!(status, WorkflowStatus::Overdue);
                } else if complete > 0 {
                    prop_assert_eq!(status, WorkflowStatus::InProgress);
                } else {
                    prop_assert_eq!(status, WorkflowStatus::Open);
                }
            }
        }
    }
}
