//! `transitio` is a transactional, file-based schema-migration runner for
//! PostgreSQL.
//!
//! Core concepts:
//! - Migrations are plain SQL files on disk: one directory per version, each
//!   named with a numeric version prefix (`0_init`, `1_users`, ...), holding
//!   an `up*.sql` script and, when the change is reversible, a `down*.sql`
//!   script.
//! - The database carries its own version ledger (one row per applied
//!   version, default table `__migrations`); the highest recorded version is
//!   the schema's current version, `-1` meaning nothing applied yet.
//! - A run moves the schema to a single requested target version by applying
//!   every intervening script in order inside one transaction: the whole
//!   move commits, or none of it does.
//!
//! The [MigrationEngine] never owns a connection. Every operation takes a
//! [StatementExecutor], so the same engine drives a live
//! [PostgresExecutor](postgres::PostgresExecutor) in production and an
//! in-memory `FakeExecutor` (from the `testing` module) in tests.
//!
//! # Example
//!
//! ```no_run
//! use transitio::postgres::{ConnectParams, PostgresExecutor};
//! use transitio::{MigrationCatalog, MigrationEngine, VersionStore};
//!
//! fn main() -> Result<(), transitio::Error> {
//!     let params = ConnectParams {
//!         host: "localhost".to_string(),
//!         port: 5432,
//!         user: "postgres".to_string(),
//!         password: "postgres".to_string(),
//!         database: "app".to_string(),
//!     };
//!     let mut executor = PostgresExecutor::connect(&params)?;
//!
//!     let engine = MigrationEngine::new(
//!         MigrationCatalog::new("./migrations"),
//!         VersionStore::new(),
//!     );
//!     let outcome = engine.migrate(&mut executor, 2)?;
//!     println!("schema is now at version {}", outcome.version());
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! A run assumes it is the only process applying migrations to its
//! database: the migration transaction is the sole concurrency control,
//! and no advisory lock is taken. If several runners could race (parallel
//! deploy jobs, for example), serialize them externally.
//!
//! # Feature flags
//!
//! - `postgres` (default) - the [postgres] executor backend.
//! - `testing` - utilities for exercising runs without a database.
//! - `tracing` - emit `tracing` events from the engine.

mod core;
pub use core::{
    Direction, MigrationOutcome, MigrationPlan, MigrationStep, SchemaStatus, NO_VERSION,
};

mod error;
pub use error::Error;

mod executor;
pub use executor::StatementExecutor;

mod catalog;
pub use catalog::MigrationCatalog;

mod store;
pub use store::{VersionStore, DEFAULT_LEDGER_TABLE_NAME};

mod engine;
pub use engine::MigrationEngine;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;
