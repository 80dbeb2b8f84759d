//! PostgreSQL-backed statement execution.
//!
//! Available with the `postgres` feature flag (enabled by default).

use crate::error::Error;
use crate::executor::StatementExecutor;
use postgres::{Client, NoTls};

/// Connection parameters for the target database, used verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// [StatementExecutor] backed by a live PostgreSQL connection.
///
/// Holds exactly one connection for the lifetime of a run. Scripts are
/// executed with [Client::batch_execute], so a single script file may
/// contain several semicolon-separated statements.
pub struct PostgresExecutor {
    client: Client,
}

impl PostgresExecutor {
    /// Open a connection with the given parameters.
    pub fn connect(params: &ConnectParams) -> Result<Self, Error> {
        let client = postgres::Config::new()
            .host(&params.host)
            .port(params.port)
            .user(&params.user)
            .password(&params.password)
            .dbname(&params.database)
            .connect(NoTls)
            .map_err(|e| Error::Connectivity(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already-established connection.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Give the connection back, e.g. to run verification queries.
    pub fn into_client(self) -> Client {
        self.client
    }
}

impl std::fmt::Debug for PostgresExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresExecutor").finish_non_exhaustive()
    }
}

impl StatementExecutor for PostgresExecutor {
    fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.client
            .batch_execute(sql)
            .map_err(|e| Error::Statement(e.to_string()))
    }

    fn query_scalar(&mut self, sql: &str) -> Result<Option<i64>, Error> {
        let row = self
            .client
            .query_opt(sql, &[])
            .map_err(|e| Error::Statement(e.to_string()))?;
        match row {
            Some(row) => row
                .try_get::<_, Option<i64>>(0)
                .map_err(|e| Error::Statement(e.to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Direction, MigrationOutcome, NO_VERSION};
    use crate::catalog::MigrationCatalog;
    use crate::engine::MigrationEngine;
    use crate::store::VersionStore;
    use crate::test_postgres::fresh_connect_params;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_script(root: &Path, dir: &str, file: &str, sql: &str) {
        let directory = root.join(dir);
        fs::create_dir_all(&directory).unwrap();
        fs::write(directory.join(file), sql).unwrap();
    }

    #[test]
    fn connect_failure_is_a_connectivity_error() {
        let params = ConnectParams {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "nobody".to_string(),
            password: "wrong".to_string(),
            database: "missing".to_string(),
        };
        let error = PostgresExecutor::connect(&params).unwrap_err();
        assert!(matches!(error, Error::Connectivity(_)));
    }

    #[test]
    #[ignore = "requires a running Docker daemon"]
    fn executor_runs_batches_and_reads_scalars() {
        let params = fresh_connect_params();
        let mut executor = PostgresExecutor::connect(&params).unwrap();
        executor
            .execute("CREATE TABLE counters (n BIGINT); INSERT INTO counters (n) VALUES (4), (9)")
            .unwrap();
        assert_eq!(
            executor.query_scalar("SELECT MAX(n) FROM counters").unwrap(),
            Some(9)
        );
        // An aggregate over no rows yields one NULL row.
        assert_eq!(
            executor
                .query_scalar("SELECT MAX(n) FROM counters WHERE n > 100")
                .unwrap(),
            None
        );
        // A plain query may yield no row at all.
        assert_eq!(
            executor
                .query_scalar("SELECT n FROM counters WHERE n > 100")
                .unwrap(),
            None
        );
    }

    #[test]
    #[ignore = "requires a running Docker daemon"]
    fn full_cycle_against_live_postgres() {
        let params = fresh_connect_params();
        let root = TempDir::new().unwrap();
        write_script(root.path(), "0_users", "up.sql", "CREATE TABLE users (id BIGINT)");
        write_script(root.path(), "0_users", "down.sql", "DROP TABLE users");
        write_script(
            root.path(),
            "1_posts",
            "up.sql",
            "CREATE TABLE posts (id BIGINT); CREATE INDEX posts_id_idx ON posts (id)",
        );
        write_script(root.path(), "1_posts", "down.sql", "DROP TABLE posts");

        let engine = MigrationEngine::new(MigrationCatalog::new(root.path()), VersionStore::new());
        let mut executor = PostgresExecutor::connect(&params).unwrap();

        let outcome = engine.migrate(&mut executor, 1).unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::UpgradedTo {
                version: 1,
                steps_applied: vec![0, 1],
                scripts_missing: vec![],
            }
        );
        let status = engine.status(&mut executor).unwrap();
        assert_eq!(status.current_version, 1);

        let mut client = executor.into_client();
        let users_exists: bool = client
            .query_one(
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = 'users')",
                &[],
            )
            .unwrap()
            .get(0);
        assert!(users_exists);

        let mut executor = PostgresExecutor::from_client(client);
        let outcome = engine.migrate(&mut executor, NO_VERSION).unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::DowngradedTo {
                version: NO_VERSION,
                steps_applied: vec![1, 0],
                scripts_missing: vec![],
            }
        );
        let status = engine.status(&mut executor).unwrap();
        assert_eq!(status.current_version, NO_VERSION);

        let mut client = executor.into_client();
        let users_exists: bool = client
            .query_one(
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = 'users')",
                &[],
            )
            .unwrap()
            .get(0);
        assert!(!users_exists);
    }

    #[test]
    #[ignore = "requires a running Docker daemon"]
    fn invalid_sql_rolls_back_against_live_postgres() {
        let params = fresh_connect_params();
        let root = TempDir::new().unwrap();
        write_script(root.path(), "0_users", "up.sql", "CREATE TABLE users (id BIGINT)");
        write_script(root.path(), "1_bad", "up.sql", "THIS IS NOT SQL");

        let engine = MigrationEngine::new(MigrationCatalog::new(root.path()), VersionStore::new());
        let mut executor = PostgresExecutor::connect(&params).unwrap();

        let error = engine.migrate(&mut executor, 1).unwrap_err();
        match error {
            Error::ScriptExecution {
                version, direction, ..
            } => {
                assert_eq!(version, 1);
                assert_eq!(direction, Direction::Up);
            }
            other => panic!("expected a script execution error, got {:?}", other),
        }

        // The ledger table itself was created outside the transaction, but
        // the rolled-back run must not have recorded any version - and the
        // users table from step 0 must be gone.
        let status = engine.status(&mut executor).unwrap();
        assert_eq!(status.current_version, NO_VERSION);
        let mut client = executor.into_client();
        let users_exists: bool = client
            .query_one(
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = 'users')",
                &[],
            )
            .unwrap()
            .get(0);
        assert!(!users_exists);
    }
}
