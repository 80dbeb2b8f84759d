//! Utilities for exercising migration runs without a live database.
//!
//! [FakeExecutor] implements [StatementExecutor] entirely in memory: it
//! records every statement it receives, simulates the version ledger's
//! insert / delete / max behavior with transactional snapshot semantics,
//! and can inject a failure for any statement containing a configured
//! substring. [MigrationTestBed] pairs a fake executor with a temporary
//! on-disk migration root for full engine scenarios.
//!
//! Available with the `testing` feature flag.

use crate::catalog::MigrationCatalog;
use crate::core::{MigrationOutcome, MigrationPlan, SchemaStatus};
use crate::engine::MigrationEngine;
use crate::error::Error;
use crate::executor::StatementExecutor;
use crate::store::{VersionStore, DEFAULT_LEDGER_TABLE_NAME};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// In-memory [StatementExecutor] simulating the version ledger.
///
/// `BEGIN` snapshots the ledger; inserts and deletes then apply to the
/// snapshot, which `COMMIT` promotes and `ROLLBACK` discards - the same
/// visibility a single-connection transaction has against a real database.
/// Statements that are neither transaction control nor ledger writes are
/// recorded and accepted silently.
#[derive(Debug)]
pub struct FakeExecutor {
    table_name: String,
    statements: Vec<String>,
    ledger: BTreeSet<i64>,
    open_transaction: Option<BTreeSet<i64>>,
    fail_matching: Option<String>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            table_name: DEFAULT_LEDGER_TABLE_NAME.to_string(),
            statements: Vec::new(),
            ledger: BTreeSet::new(),
            open_transaction: None,
            fail_matching: None,
        }
    }

    /// Start with the given versions already recorded in the ledger.
    pub fn with_versions(versions: impl IntoIterator<Item = i64>) -> Self {
        let mut executor = Self::new();
        executor.ledger = versions.into_iter().collect();
        executor
    }

    /// Recognize ledger statements against a table name other than the
    /// default.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Fail any statement containing the given substring.
    pub fn fail_matching(mut self, needle: impl Into<String>) -> Self {
        self.fail_matching = Some(needle.into());
        self
    }

    /// Every statement received so far, in order. Failed statements are
    /// recorded too.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Committed ledger contents, ascending.
    pub fn ledger_versions(&self) -> Vec<i64> {
        self.ledger.iter().copied().collect()
    }

    pub fn in_transaction(&self) -> bool {
        self.open_transaction.is_some()
    }

    fn visible_ledger(&self) -> &BTreeSet<i64> {
        self.open_transaction.as_ref().unwrap_or(&self.ledger)
    }

    fn visible_ledger_mut(&mut self) -> &mut BTreeSet<i64> {
        match self.open_transaction {
            Some(ref mut pending) => pending,
            None => &mut self.ledger,
        }
    }

    fn check_injected_failure(&self, sql: &str) -> Result<(), Error> {
        if let Some(ref needle) = self.fail_matching {
            if sql.contains(needle.as_str()) {
                return Err(Error::Statement(format!(
                    "injected failure matching '{}'",
                    needle
                )));
            }
        }
        Ok(())
    }
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementExecutor for FakeExecutor {
    fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.statements.push(sql.to_string());
        self.check_injected_failure(sql)?;

        let trimmed = sql.trim();
        if trimmed == "BEGIN" {
            self.open_transaction = Some(self.ledger.clone());
        } else if trimmed == "COMMIT" {
            if let Some(pending) = self.open_transaction.take() {
                self.ledger = pending;
            }
        } else if trimmed == "ROLLBACK" {
            self.open_transaction = None;
        } else if let Some(version) = parse_ledger_insert(trimmed, &self.table_name) {
            self.visible_ledger_mut().insert(version);
        } else if let Some(version) = parse_ledger_delete(trimmed, &self.table_name) {
            self.visible_ledger_mut().remove(&version);
        }
        Ok(())
    }

    fn query_scalar(&mut self, sql: &str) -> Result<Option<i64>, Error> {
        self.statements.push(sql.to_string());
        self.check_injected_failure(sql)?;
        Ok(self.visible_ledger().iter().max().copied())
    }
}

fn parse_ledger_insert(sql: &str, table_name: &str) -> Option<i64> {
    let prefix = format!("INSERT INTO {} ", table_name);
    if !sql.starts_with(&prefix) {
        return None;
    }
    let values = sql.split("VALUES (").nth(1)?;
    values.split(',').next()?.trim().parse().ok()
}

fn parse_ledger_delete(sql: &str, table_name: &str) -> Option<i64> {
    let prefix = format!("DELETE FROM {} WHERE version = ", table_name);
    sql.strip_prefix(&prefix)?.trim().parse().ok()
}

/// A disposable migration scenario: a temporary on-disk migration root plus
/// a [FakeExecutor], driven through a [MigrationEngine] with default
/// settings.
#[derive(Debug)]
pub struct MigrationTestBed {
    root: TempDir,
    executor: FakeExecutor,
}

impl MigrationTestBed {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("failed to create temporary migration root"),
            executor: FakeExecutor::new(),
        }
    }

    /// Path of the temporary migration root.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Create the directory for one version without any scripts.
    pub fn add_version(&self, dir_name: &str) {
        fs::create_dir_all(self.root.path().join(dir_name))
            .expect("failed to create migration directory");
    }

    /// Write a script file inside a version directory, creating the
    /// directory if needed.
    pub fn add_script(&self, dir_name: &str, file_name: &str, sql: &str) {
        let directory = self.root.path().join(dir_name);
        fs::create_dir_all(&directory).expect("failed to create migration directory");
        fs::write(directory.join(file_name), sql).expect("failed to write migration script");
    }

    /// Replace the simulated ledger with already-applied versions. Discards
    /// any statements recorded so far.
    pub fn seed_ledger(&mut self, versions: impl IntoIterator<Item = i64>) {
        self.executor = FakeExecutor::with_versions(versions);
    }

    /// Inject a failure for statements containing the given substring.
    pub fn fail_matching(&mut self, needle: impl Into<String>) {
        let executor = std::mem::take(&mut self.executor);
        self.executor = executor.fail_matching(needle);
    }

    /// A fresh engine over this bed's migration root and a default store.
    pub fn engine(&self) -> MigrationEngine {
        MigrationEngine::new(MigrationCatalog::new(self.root.path()), VersionStore::new())
    }

    /// Run a migration to `target` with default engine settings.
    pub fn migrate(&mut self, target: i64) -> Result<MigrationOutcome, Error> {
        let engine = self.engine();
        engine.migrate(&mut self.executor, target)
    }

    /// Preview the plan for a move to `target`.
    pub fn plan(&mut self, target: i64) -> Result<MigrationPlan, Error> {
        let engine = self.engine();
        engine.plan(&mut self.executor, target)
    }

    pub fn status(&mut self) -> Result<SchemaStatus, Error> {
        let engine = self.engine();
        engine.status(&mut self.executor)
    }

    pub fn executor(&self) -> &FakeExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut FakeExecutor {
        &mut self.executor
    }

    /// Committed ledger contents, ascending.
    pub fn ledger_versions(&self) -> Vec<i64> {
        self.executor.ledger_versions()
    }
}

impl Default for MigrationTestBed {
    fn default() -> Self {
        Self::new()
    }
}
