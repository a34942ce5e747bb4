//! `db` crate: pure persistence layer.
//!
//! Provides a connection pool, embedded migrations, typed row structs and
//! repository functions for the `automation_runs` table. No business logic
//! lives here.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;

pub use error::DbError;
pub use pool::{create_pool, run_migrations, DbConfig, DbPool};
