//! Database layer
//!
//! Database abstraction supporting:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for shared deployments)
//!
//! The driver is selected from configuration. Repositories reach the
//! backend-specific pool through the `DatabasePool` trait.
//!
//! # Usage
//!
//! ```ignore
//! use sessiongate::config::DatabaseConfig;
//! use sessiongate::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
