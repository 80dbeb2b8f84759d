use crate::core::Direction;

/// Error type for the transitio crate.
///
/// Driver and filesystem causes are carried as strings so the whole enum
/// derives `PartialEq` and tests can assert on exact error values.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The requested target version is outside the valid range.
    #[error("target version {requested} is out of range: valid targets are -1 through {max}")]
    InvalidTarget { requested: i64, max: i64 },
    /// The database connection could not be established.
    #[error("failed to connect to the database: {0}")]
    Connectivity(String),
    /// The migration root is unreadable or its directory naming is malformed.
    #[error("migration catalog error: {0}")]
    Catalog(String),
    /// A migration script's SQL failed to execute. The whole run is rolled
    /// back.
    #[error("{direction} script for version {version} failed: {cause}")]
    ScriptExecution {
        version: i64,
        direction: Direction,
        cause: String,
    },
    /// The ledger update for a step failed. Treated like a script failure:
    /// the whole run is rolled back.
    #[error("ledger update for version {version} failed: {cause}")]
    LedgerWrite { version: i64, cause: String },
    /// Any other statement-level failure: transaction control, ledger reads,
    /// ledger table creation.
    #[error("{0}")]
    Statement(String),
}
