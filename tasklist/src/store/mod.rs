//! Persistence gateway: task records in a remote document collection.
//!
//! [`TaskStore`] is the narrow interface the router talks to. The
//! [`TaskGateway`] wrapper records whether a backend could be constructed at
//! startup; when it could not, every call fails fast with
//! [`StoreError::Unavailable`] without touching the network.

pub mod auth;
pub mod firestore;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tasklist_proto::task::{NewTask, Task, TaskId};

use crate::config::{StoreBackend, StoreConfig};

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

/// Errors returned by persistence operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No usable backend: missing or malformed credentials.
    #[error("task storage is unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed the request.
    #[error("task storage operation failed: {0}")]
    OperationFailed(String),

    /// The task was not present when an update required it.
    #[error("task {0} not found")]
    NotFound(TaskId),
}

/// Add/list/get/update/delete over a collection of tasks.
///
/// Implementations perform no retries; each call is a single request.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a new task with `completed = false` and a server-assigned
    /// creation time, returning its id.
    async fn add_task(&self, task: NewTask) -> Result<TaskId, StoreError>;

    /// Returns every task, newest first.
    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;

    /// Fetches one task, or `None` if it does not exist.
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Sets the completion flag. Fails with [`StoreError::NotFound`] rather
    /// than creating the task if it does not exist.
    async fn update_task(&self, id: &TaskId, completed: bool) -> Result<(), StoreError>;

    /// Removes a task. Removing a missing task succeeds.
    async fn delete_task(&self, id: &TaskId) -> Result<(), StoreError>;
}

/// A persistence backend, or the reason none could be constructed.
#[derive(Clone)]
pub enum TaskGateway {
    /// Backend constructed and ready for requests.
    Ready(Arc<dyn TaskStore>),
    /// Backend disabled for the lifetime of the process.
    Unavailable {
        /// Human-readable cause, safe to log.
        reason: String,
    },
}

impl std::fmt::Debug for TaskGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("TaskGateway::Ready"),
            Self::Unavailable { reason } => f
                .debug_struct("TaskGateway::Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

impl TaskGateway {
    /// Wraps a constructed backend.
    pub fn ready(store: impl TaskStore + 'static) -> Self {
        Self::Ready(Arc::new(store))
    }

    /// Creates a gateway that fails every call with `reason`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Builds the configured backend.
    ///
    /// Never fails: a configuration problem yields [`TaskGateway::Unavailable`]
    /// and is logged once here.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        let gateway = match config.backend {
            StoreBackend::Memory => Self::ready(MemoryStore::new()),
            StoreBackend::Firestore => match FirestoreStore::from_config(config) {
                Ok(store) => Self::ready(store),
                Err(e) => Self::unavailable(e.to_string()),
            },
        };
        match &gateway {
            Self::Ready(_) => {
                tracing::info!(backend = ?config.backend, collection = %config.collection, "task storage ready");
            }
            Self::Unavailable { reason } => {
                tracing::warn!(reason = %reason, "task storage disabled");
            }
        }
        gateway
    }

    /// Returns `true` if a backend is available.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    fn store(&self) -> Result<&dyn TaskStore, StoreError> {
        match self {
            Self::Ready(store) => Ok(store.as_ref()),
            Self::Unavailable { reason } => Err(StoreError::Unavailable(reason.clone())),
        }
    }

    /// See [`TaskStore::add_task`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the gateway is unavailable or the backend fails.
    pub async fn add_task(&self, task: NewTask) -> Result<TaskId, StoreError> {
        self.store()?.add_task(task).await
    }

    /// See [`TaskStore::list_tasks`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the gateway is unavailable or the backend fails.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.store()?.list_tasks().await
    }

    /// See [`TaskStore::get_task`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the gateway is unavailable or the backend fails.
    pub async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        self.store()?.get_task(id).await
    }

    /// See [`TaskStore::update_task`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the gateway is unavailable, the task is
    /// missing, or the backend fails.
    pub async fn update_task(&self, id: &TaskId, completed: bool) -> Result<(), StoreError> {
        self.store()?.update_task(id, completed).await
    }

    /// See [`TaskStore::delete_task`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the gateway is unavailable or the backend fails.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        self.store()?.delete_task(id).await
    }
}
