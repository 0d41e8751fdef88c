//! Listing helpers: filter and sort workflow snapshots.
//!
//! Both work on [`WorkflowView`]s so status filtering uses the derived
//! status, never a stored one.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDate;
use reqflow_core::{ReqflowError, Result};
use serde::{Deserialize, Serialize};

use crate::model::{WorkflowStatus, WorkflowView};

/// Filter criteria. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowFilter {
    /// Case-insensitive substring of employee, workflow id, email or position.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    /// Keep workflows with at least one task whose id contains this.
    #[serde(default, rename = "type")]
    pub task_type: Option<String>,
    /// Inclusive lower bound on the creation date.
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date.
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

impl WorkflowFilter {
    pub fn matches(&self, view: &WorkflowView) -> bool {
        let wf = &view.workflow;

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let haystack =
                [&wf.employee, &wf.workflow_id, &wf.email, &wf.position].map(|s| s.to_lowercase());
            if !haystack.iter().any(|s| s.contains(&needle)) {
                return false;
            }
        }

        if self.status.is_some_and(|status| status != view.status) {
            return false;
        }

        if let Some(task_type) = self.task_type.as_deref().filter(|s| !s.is_empty())
            && !wf.tasks.iter().any(|t| t.id.contains(task_type))
        {
            return false;
        }

        let created = wf.created_at.date_naive();
        if self.date_from.is_some_and(|from| created < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| created > to) {
            return false;
        }

        true
    }
}

pub fn filter_workflows(views: Vec<WorkflowView>, filter: &WorkflowFilter) -> Vec<WorkflowView> {
    views.into_iter().filter(|v| filter.matches(v)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Employee,
    WorkflowId,
    HireDate,
    CreatedAt,
    Progress,
}

impl FromStr for SortKey {
    type Err = ReqflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "employee" => Ok(Self::Employee),
            "workflowId" => Ok(Self::WorkflowId),
            "hireDate" | "targetDate" => Ok(Self::HireDate),
            "createdAt" => Ok(Self::CreatedAt),
            "progress" => Ok(Self::Progress),
            other => Err(ReqflowError::validation(
                "sort",
                format!("Cannot sort by '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = ReqflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ReqflowError::validation(
                "direction",
                format!("Unknown sort direction '{other}'"),
            )),
        }
    }
}

fn compare(a: &WorkflowView, b: &WorkflowView, key: SortKey) -> Ordering {
    let (a, b) = (&a.workflow, &b.workflow);
    match key {
        SortKey::Employee => a.employee.cmp(&b.employee),
        SortKey::WorkflowId => a.workflow_id.cmp(&b.workflow_id),
        SortKey::HireDate => a.hire_date.cmp(&b.hire_date),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::Progress => a.progress_ratio().total_cmp(&b.progress_ratio()),
    }
}

/// Stable in-place sort.
pub fn sort_workflows(views: &mut [WorkflowView], key: SortKey, direction: SortDirection) {
    views.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecyclePolicy;
    use crate::model::TaskStatus;
    use crate::model::tests::sample_workflow;
    use chrono::{Duration, TimeZone, Utc};

    fn views() -> Vec<WorkflowView> {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 10, 0, 0).unwrap();
        let policy = LifecyclePolicy::default();

        let mut a = sample_workflow("WF-REQ-20260601-AAAA", NaiveDate::from_ymd_opt(2026, 9, 1).unwrap());
        a.employee = "Zed Quinn".into();

        let mut b = sample_workflow("WF-REQ-20260602-BBBB", NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        b.employee = "Amy Park".into();
        b.position = "Analyst".into();
        b.created_at += Duration::days(1);
        b.tasks[0].status = TaskStatus::Complete;
        b.tasks.push(crate::model::Task::new("TASK-EQUIP", "Laptop"));
        b.recount();

        vec![policy.view(a, now), policy.view(b, now)]
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let filter = WorkflowFilter {
            search: Some("ANALYST".into()),
            ..Default::default()
        };
        let out = filter_workflows(views(), &filter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].workflow.employee, "Amy Park");
    }

    #[test]
    fn test_status_uses_derived_value() {
        let filter = WorkflowFilter {
            status: Some(WorkflowStatus::Overdue),
            ..Default::default()
        };
        let out = filter_workflows(views(), &filter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, WorkflowStatus::Overdue);
    }

    #[test]
    fn test_type_and_date_range() {
        let by_type = WorkflowFilter {
            task_type: Some("EQUIP".into()),
            ..Default::default()
        };
        assert_eq!(filter_workflows(views(), &by_type).len(), 1);

        let day_one = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let by_date = WorkflowFilter {
            date_from: Some(day_one),
            date_to: Some(day_one),
            ..Default::default()
        };
        let out = filter_workflows(views(), &by_date);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].workflow.employee, "Zed Quinn");
    }

    #[test]
    fn test_filter_from_json_params() {
        let filter: WorkflowFilter =
            serde_json::from_str(r#"{"status": "In Progress", "type": "IT"}"#).unwrap();
        assert_eq!(filter.status, Some(WorkflowStatus::InProgress));
        assert_eq!(filter.task_type.as_deref(), Some("IT"));
    }

    #[test]
    fn test_sorting() {
        let mut list = views();
        sort_workflows(&mut list, SortKey::Employee, SortDirection::Asc);
        assert_eq!(list[0].workflow.employee, "Amy Park");

        sort_workflows(&mut list, SortKey::Progress, SortDirection::Desc);
        assert_eq!(list[0].workflow.employee, "Amy Park");

        sort_workflows(&mut list, SortKey::HireDate, SortDirection::Desc);
        assert_eq!(list[0].workflow.employee, "Zed Quinn");

        assert_eq!("createdAt".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert!("salary".parse::<SortKey>().is_err());
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
    }
}
