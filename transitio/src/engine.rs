use crate::catalog::MigrationCatalog;
use crate::core::{
    Direction, MigrationOutcome, MigrationPlan, MigrationStep, SchemaStatus, NO_VERSION,
};
use crate::error::Error;
use crate::executor::StatementExecutor;
use crate::store::VersionStore;

/// The migration-state reconciliation engine.
///
/// Given a requested target version, the engine resolves the current version
/// from the [VersionStore], enumerates available versions through the
/// [MigrationCatalog], computes the step plan, and applies it through a
/// [StatementExecutor] - every script and every ledger update inside one
/// transaction. Any step failure rolls the whole plan back, so the database
/// is only ever observable at the pre-run version or the target version.
///
/// The engine holds no connection: the executor is threaded through every
/// operation, so the same engine value can drive any number of runs.
pub struct MigrationEngine {
    catalog: MigrationCatalog,
    store: VersionStore,
    skip_if_latest: bool,
    on_step_applied: Option<Box<dyn Fn(&MigrationStep) + Send + Sync>>,
    on_script_missing: Option<Box<dyn Fn(&MigrationStep) + Send + Sync>>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for MigrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEngine")
            .field("catalog", &self.catalog)
            .field("store", &self.store)
            .field("skip_if_latest", &self.skip_if_latest)
            .field("on_step_applied", &self.on_step_applied.is_some())
            .field("on_script_missing", &self.on_script_missing.is_some())
            .finish()
    }
}

impl MigrationEngine {
    pub fn new(catalog: MigrationCatalog, store: VersionStore) -> Self {
        Self {
            catalog,
            store,
            skip_if_latest: false,
            on_step_applied: None,
            on_script_missing: None,
        }
    }

    /// When enabled, [migrate](Self::migrate) reports
    /// [MigrationOutcome::AlreadyAtTarget] without opening a transaction
    /// whenever the stored version already equals the highest available
    /// version, regardless of the requested target. Intended for unattended
    /// "migrate to latest" runs.
    pub fn with_skip_if_latest(mut self, skip: bool) -> Self {
        self.skip_if_latest = skip;
        self
    }

    /// Set a callback invoked after each step's script and ledger update
    /// have both succeeded.
    pub fn on_step_applied(
        mut self,
        callback: impl Fn(&MigrationStep) + Send + Sync + 'static,
    ) -> Self {
        self.on_step_applied = Some(Box::new(callback));
        self
    }

    /// Set a callback invoked when a step has no script for its direction.
    /// The step's ledger update still happens.
    pub fn on_script_missing(
        mut self,
        callback: impl Fn(&MigrationStep) + Send + Sync + 'static,
    ) -> Self {
        self.on_script_missing = Some(Box::new(callback));
        self
    }

    /// Report where the database and the catalog currently stand.
    pub fn status<E: StatementExecutor>(&self, executor: &mut E) -> Result<SchemaStatus, Error> {
        self.store.ensure_ledger(executor)?;
        let current_version = self.store.current_version(executor)?;
        let highest_available = self.catalog.highest_version()?;
        Ok(SchemaStatus {
            current_version,
            highest_available,
        })
    }

    /// Compute the validated plan for a move to `target` without opening a
    /// transaction or touching any script.
    pub fn plan<E: StatementExecutor>(
        &self,
        executor: &mut E,
        target: i64,
    ) -> Result<MigrationPlan, Error> {
        let max = self.catalog.highest_version()?;
        if target < NO_VERSION || target > max {
            return Err(Error::InvalidTarget {
                requested: target,
                max,
            });
        }
        self.store.ensure_ledger(executor)?;
        let current = self.store.current_version(executor)?;
        Ok(MigrationPlan::between(current, target))
    }

    /// Move the database to `target`, applying every intervening script in
    /// order inside a single transaction.
    ///
    /// Target validation happens against the on-disk catalog before any
    /// database statement is issued. When the ledger is already at the
    /// target (or at the highest available version, with
    /// [with_skip_if_latest](Self::with_skip_if_latest) enabled), no
    /// transaction is opened.
    pub fn migrate<E: StatementExecutor>(
        &self,
        executor: &mut E,
        target: i64,
    ) -> Result<MigrationOutcome, Error> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("migrate", target = target).entered();

        let max = self.catalog.highest_version()?;
        if target < NO_VERSION || target > max {
            return Err(Error::InvalidTarget {
                requested: target,
                max,
            });
        }

        self.store.ensure_ledger(executor)?;
        let current = self.store.current_version(executor)?;

        if self.skip_if_latest && current == max {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                current_version = current,
                "Already at the highest available version"
            );
            return Ok(MigrationOutcome::AlreadyAtTarget { version: current });
        }
        if current == target {
            #[cfg(feature = "tracing")]
            tracing::debug!(current_version = current, "Already at the requested version");
            return Ok(MigrationOutcome::AlreadyAtTarget { version: current });
        }

        let plan = MigrationPlan::between(current, target);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            current_version = current,
            target_version = target,
            steps = plan.len(),
            "Computed migration plan"
        );

        let (steps_applied, scripts_missing) = self.apply(executor, &plan)?;

        let outcome = if target > current {
            MigrationOutcome::UpgradedTo {
                version: target,
                steps_applied,
                scripts_missing,
            }
        } else {
            MigrationOutcome::DowngradedTo {
                version: target,
                steps_applied,
                scripts_missing,
            }
        };
        Ok(outcome)
    }

    /// Run every step of the plan between `BEGIN` and `COMMIT`, rolling the
    /// transaction back on the first failure.
    fn apply<E: StatementExecutor>(
        &self,
        executor: &mut E,
        plan: &MigrationPlan,
    ) -> Result<(Vec<i64>, Vec<i64>), Error> {
        executor.execute("BEGIN")?;

        let mut steps_applied = Vec::new();
        let mut scripts_missing = Vec::new();
        for step in plan.steps() {
            match self.apply_step(executor, step) {
                Ok(had_script) => {
                    steps_applied.push(step.version);
                    if !had_script {
                        scripts_missing.push(step.version);
                    }
                }
                Err(error) => {
                    let _ = executor.execute("ROLLBACK");
                    #[cfg(feature = "tracing")]
                    tracing::error!(
                        version = step.version,
                        error = %error,
                        "Migration step failed, transaction rolled back"
                    );
                    return Err(error);
                }
            }
        }

        executor.execute("COMMIT")?;
        #[cfg(feature = "tracing")]
        tracing::info!(steps = steps_applied.len(), "Migration committed");
        Ok((steps_applied, scripts_missing))
    }

    fn apply_step<E: StatementExecutor>(
        &self,
        executor: &mut E,
        step: &MigrationStep,
    ) -> Result<bool, Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            version = step.version,
            direction = %step.direction,
            "Applying migration step"
        );

        let had_script = match self.catalog.script_for(step.version, step.direction)? {
            Some(sql) => {
                executor
                    .execute(&sql)
                    .map_err(|e| Error::ScriptExecution {
                        version: step.version,
                        direction: step.direction,
                        cause: e.to_string(),
                    })?;
                true
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    version = step.version,
                    direction = %step.direction,
                    "No script for this step, updating the ledger anyway"
                );
                // Call on_script_missing hook
                if let Some(ref callback) = self.on_script_missing {
                    callback(step);
                }
                false
            }
        };

        match step.direction {
            Direction::Up => self.store.record_applied(executor, step.version)?,
            Direction::Down => self.store.record_reverted(executor, step.version)?,
        }

        // Call on_step_applied hook
        if let Some(ref callback) = self.on_step_applied {
            callback(step);
        }
        Ok(had_script)
    }
}
