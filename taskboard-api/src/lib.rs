//! # Taskboard API Server Library
//!
//! This library provides the core functionality for the Taskboard API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Authentication and security headers
//! - `routes`: API route handlers
//! - `upload`: Multipart gating and document storage for task requests

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod upload;
