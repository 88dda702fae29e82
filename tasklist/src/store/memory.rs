//! In-process task store.
//!
//! The [`MemoryStore`] keeps tasks in a map guarded by a [`RwLock`]. It backs
//! `--store memory` for local development and the router tests. Contents are
//! lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tasklist_proto::task::{NewTask, Task, TaskId};
use tokio::sync::RwLock;

use super::{StoreError, TaskStore};

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    last_created_at: Option<DateTime<Utc>>,
}

/// In-memory [`TaskStore`].
///
/// Creation timestamps strictly increase across inserts, so listing order
/// matches insertion order even when two inserts land in the same clock tick.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored tasks.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    /// Returns `true` if no tasks are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tasks.is_empty()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn add_task(&self, task: NewTask) -> Result<TaskId, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let created_at = match inner.last_created_at {
            Some(last) if last >= now => last + TimeDelta::microseconds(1),
            _ => now,
        };
        let id = loop {
            let candidate = TaskId::generate();
            if !inner.tasks.contains_key(&candidate) {
                break candidate;
            }
        };
        inner.last_created_at = Some(created_at);
        inner.tasks.insert(
            id.clone(),
            Task {
                id: id.clone(),
                content: task.into_content(),
                completed: false,
                created_at,
            },
        );
        drop(inner);
        Ok(id)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.inner.read().await.tasks.values().cloned().collect();
        tasks.sort_by(Task::newest_first);
        Ok(tasks)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.inner.read().await.tasks.get(id).cloned())
    }

    async fn update_task(&self, id: &TaskId, completed: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        task.completed = completed;
        drop(inner);
        Ok(())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        self.inner.write().await.tasks.remove(id);
        Ok(())
    }
}
