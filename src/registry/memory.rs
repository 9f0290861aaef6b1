use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use super::{RequestSource, TaskRegistry};
use crate::error::RolloutResult;
use crate::models::{Request, Task, TaskCleanup, TaskId};

#[derive(Debug, Default)]
struct RegistryState {
    /// Active ids; `None` when the task's record has not been written yet
    active: BTreeMap<TaskId, Option<Task>>,
    cleanups: BTreeMap<TaskId, TaskCleanup>,
}

/// Task registry held in memory
#[derive(Debug, Default)]
pub struct InMemoryTaskRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&self, task: Task) {
        self.state
            .write()
            .active
            .insert(task.task_id.clone(), Some(task));
    }

    /// Register an active id whose task record cannot be resolved
    pub fn add_task_id_without_record(&self, task_id: TaskId) {
        self.state.write().active.insert(task_id, None);
    }

    pub fn remove_task(&self, task_id: &TaskId) {
        self.state.write().active.remove(task_id);
    }

    pub fn cleanups(&self) -> Vec<TaskCleanup> {
        self.state.read().cleanups.values().cloned().collect()
    }

    pub fn cleanup_for(&self, task_id: &TaskId) -> Option<TaskCleanup> {
        self.state.read().cleanups.get(task_id).cloned()
    }
}

#[async_trait]
impl TaskRegistry for InMemoryTaskRegistry {
    async fn active_task_ids(&self) -> RolloutResult<Vec<TaskId>> {
        Ok(self.state.read().active.keys().cloned().collect())
    }

    async fn tasks(&self, task_ids: &[TaskId]) -> RolloutResult<HashMap<TaskId, Task>> {
        let state = self.state.read();
        Ok(task_ids
            .iter()
            .filter_map(|id| {
                state
                    .active
                    .get(id)
                    .and_then(Option::as_ref)
                    .map(|task| (id.clone(), task.clone()))
            })
            .collect())
    }

    async fn create_cleanup(&self, cleanup: &TaskCleanup) -> RolloutResult<bool> {
        let mut state = self.state.write();
        if state.cleanups.contains_key(&cleanup.task_id) {
            return Ok(false);
        }
        state
            .cleanups
            .insert(cleanup.task_id.clone(), cleanup.clone());
        Ok(true)
    }
}

/// Request definitions held in memory
#[derive(Debug, Default)]
pub struct InMemoryRequestSource {
    requests: DashMap<String, Request>,
}

impl InMemoryRequestSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: Request) {
        self.requests.insert(request.id.clone(), request);
    }

    pub fn remove(&self, request_id: &str) {
        self.requests.remove(request_id);
    }
}

#[async_trait]
impl RequestSource for InMemoryRequestSource {
    async fn fetch_request(&self, request_id: &str) -> RolloutResult<Option<Request>> {
        Ok(self.requests.get(request_id).map(|r| r.value().clone()))
    }
}
