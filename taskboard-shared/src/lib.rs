//! # Taskboard Shared Library
//!
//! Domain types and business logic behind the Taskboard API.
//!
//! ## Module Organization
//!
//! - `models`: Database records and their queries
//! - `auth`: Password hashing, tokens, principals and the access policy
//! - `engine`: Task rules (queries, attachments, status changes, service)
//! - `store`: Persistence traits with Postgres and in-memory backends
//! - `storage`: Blob storage for task documents
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod engine;
pub mod models;
pub mod storage;
pub mod store;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
