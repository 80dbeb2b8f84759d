use crate::core::NO_VERSION;
use crate::error::Error;
use crate::executor::StatementExecutor;
use chrono::Utc;

/// Default name of the version ledger table.
pub const DEFAULT_LEDGER_TABLE_NAME: &str = "__migrations";

/// Reads and writes the persisted version ledger.
///
/// The ledger holds one row per applied version; the maximum recorded
/// version is the schema's current version. The store performs no ordering
/// or contiguity checks of its own - the engine is responsible for calling
/// it in ledger order.
#[derive(Debug, Clone)]
pub struct VersionStore {
    ledger_table_name: String,
}

impl VersionStore {
    pub fn new() -> Self {
        Self {
            ledger_table_name: DEFAULT_LEDGER_TABLE_NAME.to_string(),
        }
    }

    /// Set a custom name for the version ledger table.
    /// Defaults to "__migrations".
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.ledger_table_name = name.into();
        self
    }

    pub fn table_name(&self) -> &str {
        &self.ledger_table_name
    }

    /// Idempotently create the ledger table. Must run once per session
    /// before any read or write; a safe no-op when the table already exists.
    pub fn ensure_ledger<E: StatementExecutor>(&self, executor: &mut E) -> Result<(), Error> {
        executor.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {} (version BIGINT PRIMARY KEY NOT NULL, applied_at TEXT NOT NULL)",
            self.ledger_table_name
        ))
    }

    /// Highest version recorded in the ledger, or [NO_VERSION] when the
    /// ledger is empty.
    pub fn current_version<E: StatementExecutor>(&self, executor: &mut E) -> Result<i64, Error> {
        let max = executor
            .query_scalar(&format!(
                "SELECT MAX(version) FROM {}",
                self.ledger_table_name
            ))
            .map_err(|e| Error::Statement(format!("failed to read the version ledger: {}", e)))?;
        Ok(max.unwrap_or(NO_VERSION))
    }

    /// Append the ledger row for a freshly applied version, stamped with the
    /// current UTC time.
    pub fn record_applied<E: StatementExecutor>(
        &self,
        executor: &mut E,
        version: i64,
    ) -> Result<(), Error> {
        let applied_at = Utc::now().to_rfc3339();
        executor
            .execute(&format!(
                "INSERT INTO {} (version, applied_at) VALUES ({}, '{}')",
                self.ledger_table_name, version, applied_at
            ))
            .map_err(|e| Error::LedgerWrite {
                version,
                cause: e.to_string(),
            })
    }

    /// Remove the ledger row for a freshly reverted version.
    pub fn record_reverted<E: StatementExecutor>(
        &self,
        executor: &mut E,
        version: i64,
    ) -> Result<(), Error> {
        executor
            .execute(&format!(
                "DELETE FROM {} WHERE version = {}",
                self.ledger_table_name, version
            ))
            .map_err(|e| Error::LedgerWrite {
                version,
                cause: e.to_string(),
            })
    }
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeExecutor;

    #[test]
    fn current_version_of_empty_ledger_is_sentinel() {
        let store = VersionStore::new();
        let mut executor = FakeExecutor::new();
        assert_eq!(store.current_version(&mut executor).unwrap(), NO_VERSION);
    }

    #[test]
    fn current_version_is_the_ledger_maximum() {
        let store = VersionStore::new();
        let mut executor = FakeExecutor::with_versions([0, 1, 2]);
        assert_eq!(store.current_version(&mut executor).unwrap(), 2);
    }

    #[test]
    fn record_applied_inserts_a_stamped_row() {
        let store = VersionStore::new();
        let mut executor = FakeExecutor::new();
        store.record_applied(&mut executor, 0).unwrap();
        assert_eq!(executor.ledger_versions(), vec![0]);
        let statement = &executor.statements()[0];
        assert!(statement.starts_with("INSERT INTO __migrations (version, applied_at) VALUES (0, '"));
    }

    #[test]
    fn record_reverted_deletes_exactly_that_row() {
        let store = VersionStore::new();
        let mut executor = FakeExecutor::with_versions([0, 1]);
        store.record_reverted(&mut executor, 1).unwrap();
        assert_eq!(executor.ledger_versions(), vec![0]);
        assert_eq!(
            executor.statements(),
            &["DELETE FROM __migrations WHERE version = 1".to_string()]
        );
    }

    #[test]
    fn ensure_ledger_creates_if_not_exists() {
        let store = VersionStore::new();
        let mut executor = FakeExecutor::new();
        store.ensure_ledger(&mut executor).unwrap();
        assert_eq!(
            executor.statements(),
            &["CREATE TABLE IF NOT EXISTS __migrations (version BIGINT PRIMARY KEY NOT NULL, applied_at TEXT NOT NULL)"
                .to_string()]
        );
    }

    #[test]
    fn custom_table_name_flows_through_every_statement() {
        let store = VersionStore::new().with_table_name("schema_history");
        assert_eq!(store.table_name(), "schema_history");
        let mut executor = FakeExecutor::new().with_table_name("schema_history");
        store.ensure_ledger(&mut executor).unwrap();
        store.record_applied(&mut executor, 0).unwrap();
        assert_eq!(store.current_version(&mut executor).unwrap(), 0);
        assert!(executor.statements().iter().all(|s| s.contains("schema_history")));
    }

    #[test]
    fn failed_ledger_insert_is_a_ledger_write_error() {
        let store = VersionStore::new();
        let mut executor = FakeExecutor::new().fail_matching("INSERT INTO __migrations");
        let error = store.record_applied(&mut executor, 3).unwrap_err();
        assert_eq!(
            error,
            Error::LedgerWrite {
                version: 3,
                cause: "injected failure matching 'INSERT INTO __migrations'".to_string(),
            }
        );
    }
}
