//! Task model for Tasklist.
//!
//! A [`Task`] is a short piece of user-supplied text plus a completion flag.
//! Its identifier and creation time are assigned by the persistence layer;
//! its content never changes after creation.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Maximum allowed task identifier length in bytes.
pub const MAX_TASK_ID_LENGTH: usize = 128;

/// Length of identifiers produced by [`TaskId::generate`].
const GENERATED_ID_LENGTH: usize = 20;

/// Errors raised when validating task input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Content was empty or contained only whitespace.
    #[error("task content is empty")]
    EmptyContent,

    /// Identifier was empty, too long, or contained characters outside
    /// `[A-Za-z0-9_-]`.
    #[error("invalid task id: {0:?}")]
    InvalidId(String),
}

/// Opaque identifier of a stored task.
///
/// Restricted to `[A-Za-z0-9_-]` so it can be embedded in URL paths and
/// document names without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh 20-character alphanumeric identifier, the same
    /// shape as document-store auto ids.
    #[must_use]
    pub fn generate() -> Self {
        let id = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_ID_LENGTH)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Parses an identifier received from a client or a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidId`] if `raw` is empty, longer than
    /// [`MAX_TASK_ID_LENGTH`], or contains a character outside
    /// `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self, TaskError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_TASK_ID_LENGTH
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(TaskError::InvalidId(raw.to_string()))
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content for a task that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    content: String,
}

impl NewTask {
    /// Accepts user input as typed.
    ///
    /// Whitespace only decides whether the input is blank; the stored
    /// content keeps it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::EmptyContent`] for empty or whitespace-only
    /// input.
    pub fn new(content: &str) -> Result<Self, TaskError> {
        if content.trim().is_empty() {
            return Err(TaskError::EmptyContent);
        }
        Ok(Self {
            content: content.to_string(),
        })
    }

    /// Returns the content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consumes the value, returning the content.
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }
}

/// A stored to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier assigned by the store on creation.
    pub id: TaskId,
    /// User-supplied description. Never empty.
    pub content: String,
    /// Flipped by the toggle operation.
    pub completed: bool,
    /// Server-assigned creation time; listings sort on it, newest first.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Orders two tasks newest first, breaking ties by id so listings are
    /// stable.
    #[must_use]
    pub fn newest_first(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}
