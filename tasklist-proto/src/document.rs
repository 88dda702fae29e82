//! Document-store wire format for tasks.
//!
//! Tasks are stored as Firestore documents in a single flat collection.
//! The REST API wraps every field in a typed value object, e.g.
//! `{"content": {"stringValue": "Buy milk"}}`. This module builds the
//! request bodies the persistence gateway sends and decodes the documents
//! it receives back.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::task::{NewTask, Task, TaskError, TaskId};

/// Field holding the task text.
pub const FIELD_CONTENT: &str = "content";
/// Field holding the completion flag.
pub const FIELD_COMPLETED: &str = "completed";
/// Completion flag written by the earliest deployments. Read-only fallback.
pub const FIELD_LEGACY_DONE: &str = "done";
/// Server-assigned creation timestamp; the listing sort key.
pub const FIELD_CREATED_AT: &str = "created_at";

/// Errors produced while decoding a stored document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The payload did not have the expected JSON shape.
    #[error("unexpected document shape: {0}")]
    UnexpectedShape(String),

    /// The document `name` was missing.
    #[error("document has no name")]
    MissingName,

    /// The last segment of the document name is not a valid task id.
    #[error("document name has an invalid id: {0}")]
    InvalidId(#[from] TaskError),

    /// The `content` field was missing, not a string, or blank.
    #[error("document {0} has no content")]
    MissingContent(String),

    /// Neither `created_at` nor the document `createTime` was present.
    #[error("document {0} has no creation time")]
    MissingTimestamp(String),

    /// A timestamp could not be parsed as RFC 3339.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The raw timestamp string.
        value: String,
        /// Parser error message.
        reason: String,
    },
}

/// Location of one project's default database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePath {
    project_id: String,
}

impl DatabasePath {
    /// Creates a path for the `(default)` database of `project_id`.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }

    /// Returns the project id.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Resource name of the documents root, e.g.
    /// `projects/p/databases/(default)/documents`.
    #[must_use]
    pub fn documents_root(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    /// Full resource name of one document.
    #[must_use]
    pub fn document_name(&self, collection: &str, id: &TaskId) -> String {
        format!("{}/{collection}/{id}", self.documents_root())
    }
}

/// Body for a `documents:commit` call that creates one task document.
///
/// The write fails if the document already exists, and `created_at` is
/// filled in by the server with the commit time.
#[must_use]
pub fn create_request(document_name: &str, task: &NewTask) -> Value {
    json!({
        "writes": [{
            "update": {
                "name": document_name,
                "fields": {
                    FIELD_CONTENT: { "stringValue": task.content() },
                    FIELD_COMPLETED: { "booleanValue": false },
                },
            },
            "updateTransforms": [{
                "fieldPath": FIELD_CREATED_AT,
                "setToServerValue": "REQUEST_TIME",
            }],
            "currentDocument": { "exists": false },
        }],
    })
}

/// Body for a `documents:runQuery` call listing a collection newest first.
#[must_use]
pub fn list_request(collection: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "orderBy": [{
                "field": { "fieldPath": FIELD_CREATED_AT },
                "direction": "DESCENDING",
            }],
        },
    })
}

/// Body for a `PATCH` that sets only the completion flag.
#[must_use]
pub fn completed_patch(completed: bool) -> Value {
    json!({
        "fields": {
            FIELD_COMPLETED: { "booleanValue": completed },
        },
    })
}

/// Decodes one stored document into a [`Task`].
///
/// # Errors
///
/// Returns [`DocumentError`] if the document has no usable name, content,
/// or creation time.
pub fn decode_document(document: &Value) -> Result<Task, DocumentError> {
    let object = document
        .as_object()
        .ok_or_else(|| DocumentError::UnexpectedShape("document is not an object".into()))?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or(DocumentError::MissingName)?;
    let raw_id = name.rsplit('/').next().unwrap_or(name);
    let id = TaskId::parse(raw_id)?;

    let empty = Map::new();
    let fields = object
        .get("fields")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let content = typed_value(fields, FIELD_CONTENT, "stringValue")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| DocumentError::MissingContent(id.to_string()))?;

    let completed = typed_value(fields, FIELD_COMPLETED, "booleanValue")
        .or_else(|| typed_value(fields, FIELD_LEGACY_DONE, "booleanValue"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let raw_created = typed_value(fields, FIELD_CREATED_AT, "timestampValue")
        .or_else(|| object.get("createTime"))
        .and_then(Value::as_str)
        .ok_or_else(|| DocumentError::MissingTimestamp(id.to_string()))?;

    Ok(Task {
        id,
        content: content.to_string(),
        completed,
        created_at: parse_timestamp(raw_created)?,
    })
}

/// Result of decoding a `runQuery` response.
#[derive(Debug, Default)]
pub struct QueryResults {
    /// Decoded tasks in response order.
    pub tasks: Vec<Task>,
    /// Documents that could not be decoded, with their names when known.
    pub rejected: Vec<(Option<String>, DocumentError)>,
}

/// Decodes a `runQuery` response body.
///
/// The body is a JSON array of result entries; entries without a
/// `document` (progress markers such as a bare `readTime`) are skipped.
/// Undecodable documents are collected in [`QueryResults::rejected`]
/// rather than failing the whole listing.
///
/// # Errors
///
/// Returns [`DocumentError::UnexpectedShape`] if the body is not an array.
pub fn decode_query_results(body: &Value) -> Result<QueryResults, DocumentError> {
    let entries = body
        .as_array()
        .ok_or_else(|| DocumentError::UnexpectedShape("query response is not an array".into()))?;

    let mut results = QueryResults::default();
    for document in entries.iter().filter_map(|entry| entry.get("document")) {
        match decode_document(document) {
            Ok(task) => results.tasks.push(task),
            Err(e) => {
                let name = document
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                results.rejected.push((name, e));
            }
        }
    }
    Ok(results)
}

/// Extracts `fields[field][kind]`.
fn typed_value<'a>(fields: &'a Map<String, Value>, field: &str, kind: &str) -> Option<&'a Value> {
    fields.get(field).and_then(|v| v.get(kind))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DocumentError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DocumentError::InvalidTimestamp {
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
