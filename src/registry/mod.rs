//! # Task and Request Registries
//!
//! Read access to live tasks and request definitions, plus the sink for
//! task cleanup directives.
//!
//! ## Usage
//!
//! ```rust
//! use rollout_core::registry::{InMemoryTaskRegistry, TaskRegistry};
//!
//! # async fn example() -> rollout_core::error::RolloutResult<()> {
//! let registry = InMemoryTaskRegistry::new();
//! let active = registry.active_task_ids().await?;
//! let tasks = registry.tasks(&active).await?;
//! assert!(tasks.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod memory;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::RolloutResult;
use crate::models::{Request, Task, TaskCleanup, TaskId};

pub use memory::{InMemoryRequestSource, InMemoryTaskRegistry};

#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Ids of every task currently running
    async fn active_task_ids(&self) -> RolloutResult<Vec<TaskId>>;

    /// Full task records; ids without a record are absent from the map
    async fn tasks(&self, task_ids: &[TaskId]) -> RolloutResult<HashMap<TaskId, Task>>;

    /// Queue a task for termination.
    ///
    /// Returns `false` when a cleanup already exists for the task, in which
    /// case the existing one is kept.
    async fn create_cleanup(&self, cleanup: &TaskCleanup) -> RolloutResult<bool>;
}

#[async_trait]
pub trait RequestSource: Send + Sync {
    async fn fetch_request(&self, request_id: &str) -> RolloutResult<Option<Request>>;
}
