//! # Teamboard Shared Library
//!
//! Core of the Teamboard collaboration service: teams with a two-role
//! roster, tasks with a guarded status lifecycle, per-task comments, and
//! team-scoped realtime fan-out of every change.
//!
//! ## Module Organization
//!
//! - `models`: Row types and their SQL
//! - `store`: Persistence port with Postgres and in-memory adapters
//! - `auth`: Identity resolution and authorization checks
//! - `services`: Membership Registry, Task Lifecycle Controller, Comment Ledger
//! - `realtime`: Fan-out hub, event catalogue and control protocol
//! - `db`: Connection pool and migrations
//! - `error`: Core error taxonomy

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod realtime;
pub mod services;
pub mod store;

pub use error::{CoreError, CoreResult, Gate};

/// Current version of the Teamboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
