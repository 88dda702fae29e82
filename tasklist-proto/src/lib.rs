//! Shared definitions for the Tasklist data model and the document-store
//! wire format.

pub mod document;
pub mod task;
