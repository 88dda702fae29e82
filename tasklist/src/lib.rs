//! Tasklist server library.
//!
//! Exposes the router and both gateways for use in tests and embedding.
//! The server renders a task list backed by a remote document collection
//! and asks a hosted language model for short tips about individual tasks.

pub mod config;
pub mod flash;
pub mod page;
pub mod router;
pub mod store;
pub mod suggest;
