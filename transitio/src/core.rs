use std::fmt;

/// Sentinel version meaning "no migrations have been applied".
pub const NO_VERSION: i64 = -1;

/// The direction a migration step moves the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// File-name prefix that marks a script for this direction.
    pub fn script_prefix(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_prefix())
    }
}

/// One unit of schema change within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStep {
    /// The version this step applies (`Up`) or reverts (`Down`).
    pub version: i64,
    pub direction: Direction,
}

/// The ordered sequence of steps needed to move between two versions.
///
/// Constructed fresh per run, consumed immediately, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    /// Compute the steps needed to move from `current` to `target`.
    ///
    /// Moving up yields one `Up` step per version from `current + 1` through
    /// `target`, ascending. Moving down yields one `Down` step per version
    /// from `current` down through `target + 1`, descending: reverting step
    /// `v` undoes the change that brought the ledger from `v - 1` to `v`.
    /// Equal versions yield an empty plan.
    pub fn between(current: i64, target: i64) -> Self {
        let steps = if target > current {
            ((current + 1)..=target)
                .map(|version| MigrationStep {
                    version,
                    direction: Direction::Up,
                })
                .collect()
        } else if target < current {
            ((target + 1)..=current)
                .rev()
                .map(|version| MigrationStep {
                    version,
                    direction: Direction::Down,
                })
                .collect()
        } else {
            Vec::new()
        };
        Self { steps }
    }

    /// The steps in application order.
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// The direction shared by every step, or `None` for an empty plan.
    pub fn direction(&self) -> Option<Direction> {
        self.steps.first().map(|step| step.direction)
    }
}

/// Where the database and the on-disk catalog stand, before any move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Highest version recorded in the ledger, or [NO_VERSION].
    pub current_version: i64,
    /// Highest version available on disk, or [NO_VERSION].
    pub highest_available: i64,
}

/// Terminal status of a completed migration run.
///
/// A failed run is the `Err` arm of the surrounding `Result`, carrying the
/// failing version in the error itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The ledger was already at the requested version; no transaction was
    /// opened.
    AlreadyAtTarget { version: i64 },
    /// The schema moved forward to `version`.
    UpgradedTo {
        version: i64,
        /// Versions stepped through, in application order.
        steps_applied: Vec<i64>,
        /// Versions whose ledger entry was written without a script on disk.
        scripts_missing: Vec<i64>,
    },
    /// The schema moved backward to `version`.
    DowngradedTo {
        version: i64,
        /// Versions stepped through, in application order.
        steps_applied: Vec<i64>,
        /// Versions whose ledger entry was removed without a script on disk.
        scripts_missing: Vec<i64>,
    },
}

impl MigrationOutcome {
    /// The version the ledger records after the run.
    pub fn version(&self) -> i64 {
        match self {
            MigrationOutcome::AlreadyAtTarget { version }
            | MigrationOutcome::UpgradedTo { version, .. }
            | MigrationOutcome::DowngradedTo { version, .. } => *version,
        }
    }
}
