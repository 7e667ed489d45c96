//! Database layer for Teamboard
//!
//! - `pool`: PostgreSQL connection pool with a health check
//! - `migrations`: Schema migrations embedded from the workspace `migrations/`
//!   directory
//!
//! Row types and their queries live in [`crate::models`]; the
//! [`crate::store::PgStore`] adapter composes them into transactions.

pub mod migrations;
pub mod pool;
