use crate::error::Error;

/// A minimal statement-execution capability over one live database
/// connection.
///
/// The engine and the version store drive everything through this trait, so
/// a run can be exercised against an in-memory fake as easily as against a
/// real PostgreSQL connection. Implementations hold exactly one connection;
/// transaction control arrives as plain `BEGIN` / `COMMIT` / `ROLLBACK`
/// statements.
pub trait StatementExecutor {
    /// Execute one or more SQL statements, discarding any result rows.
    fn execute(&mut self, sql: &str) -> Result<(), Error>;

    /// Run a query expected to yield at most one row holding a single
    /// nullable integer column.
    fn query_scalar(&mut self, sql: &str) -> Result<Option<i64>, Error>;
}
