//! Persistence port and two adapters.
//!
//! - [`InMemoryWorkflowStore`]: process-local, for tests and embedding.
//! - [`JsonFileWorkflowStore`]: one pretty-printed JSON array on disk,
//!   human-readable. Every call re-reads the file; nothing is cached.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqflow_core::{ReqflowError, Result};
use tokio::sync::Mutex;

use crate::model::{Workflow, WorkflowPatch};

/// Persistence port for workflows.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn list_workflows(&self) -> Result<Vec<Workflow>>;

    /// Insert, or replace the workflow with the same id.
    async fn save_workflow(&self, workflow: Workflow) -> Result<Workflow>;

    /// Apply a partial update. Fails with `WorkflowNotFound` when absent.
    async fn update_workflow(&self, id: &str, patch: &WorkflowPatch) -> Result<Workflow>;
}

fn upsert(workflows: &mut Vec<Workflow>, workflow: Workflow) {
    match workflows
        .iter_mut()
        .find(|wf| wf.workflow_id == workflow.workflow_id)
    {
        Some(existing) => *existing = workflow,
        None => workflows.push(workflow),
    }
}

fn patch_in_place(workflows: &mut [Workflow], id: &str, patch: &WorkflowPatch) -> Result<Workflow> {
    let workflow = workflows
        .iter_mut()
        .find(|wf| wf.workflow_id == id)
        .ok_or_else(|| ReqflowError::WorkflowNotFound(id.to_string()))?;
    patch.apply(workflow);
    Ok(workflow.clone())
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: Mutex<Vec<Workflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflows(workflows: Vec<Workflow>) -> Self {
        Self {
            workflows: Mutex::new(workflows),
        }
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        Ok(self.workflows.lock().await.clone())
    }

    async fn save_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        upsert(&mut *self.workflows.lock().await, workflow.clone());
        Ok(workflow)
    }

    async fn update_workflow(&self, id: &str, patch: &WorkflowPatch) -> Result<Workflow> {
        patch_in_place(&mut self.workflows.lock().await, id, patch)
    }
}

/// File-backed store.
///
/// Writes are serialized through a lock so a read-modify-write inside this
/// process cannot interleave.
#[derive(Debug)]
pub struct JsonFileWorkflowStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileWorkflowStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Workflow>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ReqflowError::Storage(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        let workflows: Vec<Workflow> = serde_json::from_str(&json).map_err(|e| {
            ReqflowError::Storage(format!("Failed to parse {}: {e}", self.path.display()))
        })?;
        tracing::debug!("📂 Loaded {} workflows from {}", workflows.len(), self.path.display());
        Ok(workflows)
    }

    async fn write_all(&self, workflows: &[Workflow]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(workflows)?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            ReqflowError::Storage(format!("Failed to write {}: {e}", self.path.display()))
        })?;
        tracing::debug!("💾 Saved {} workflows to {}", workflows.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for JsonFileWorkflowStore {
    async fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.read_all().await
    }

    async fn save_workflow(&self, workflow: Workflow) -> Result<Workflow> {
        let _guard = self.write_lock.lock().await;
        let mut workflows = self.read_all().await?;
        upsert(&mut workflows, workflow.clone());
        self.write_all(&workflows).await?;
        Ok(workflow)
    }

    async fn update_workflow(&self, id: &str, patch: &WorkflowPatch) -> Result<Workflow> {
        let _guard = self.write_lock.lock().await;
        let mut workflows = self.read_all().await?;
        let updated = patch_in_place(&mut workflows, id, patch)?;
        self.write_all(&workflows).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_workflow;
    use chrono::NaiveDate;

    fn hire() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let store = InMemoryWorkflowStore::new();
        store.save_workflow(sample_workflow("WF-1", hire())).await.unwrap();
        store.save_workflow(sample_workflow("WF-2", hire())).await.unwrap();
        assert_eq!(store.list_workflows().await.unwrap().len(), 2);

        let mut replacement = sample_workflow("WF-1", hire());
        replacement.employee = "Janet".into();
        store.save_workflow(replacement).await.unwrap();
        let all = store.list_workflows().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].employee, "Janet");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryWorkflowStore::new();
        let err = store
            .update_workflow("nope", &WorkflowPatch::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("workflows.json");
        let store = JsonFileWorkflowStore::new(&path);
        assert!(store.list_workflows().await.unwrap().is_empty());

        store.save_workflow(sample_workflow("WF-1", hire())).await.unwrap();
        let patch = WorkflowPatch {
            reminder_count: Some(4),
            ..WorkflowPatch::default()
        };
        let updated = store.update_workflow("WF-1", &patch).await.unwrap();
        assert_eq!(updated.reminder_count, 4);

        let reopened = JsonFileWorkflowStore::new(&path);
        let all = reopened.list_workflows().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].reminder_count, 4);
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflows.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileWorkflowStore::new(&path)
            .list_workflows()
            .await
            .unwrap_err();
        assert!(matches!(err, ReqflowError::Storage(_)));
    }
}
