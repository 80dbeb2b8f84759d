//! Command-line driver for transitio database migrations.
//!
//! Reads connection parameters and the migration root from a JSON
//! configuration file, then moves the database to the requested target
//! version. The target comes from the command line or, when omitted, from
//! an interactive prompt.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use transitio::postgres::{ConnectParams, PostgresExecutor};
use transitio::{Direction, MigrationCatalog, MigrationEngine, MigrationOutcome, VersionStore};

#[derive(Parser)]
#[command(
    name = "transitio",
    version,
    about = "Apply versioned SQL migration scripts to a PostgreSQL database"
)]
struct Args {
    /// Target version to migrate to (-1 reverts everything). Prompts on
    /// stdin when omitted.
    #[arg(allow_negative_numbers = true)]
    target: Option<i64>,

    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Exit successfully without prompting when the database is already at
    /// the highest available version
    #[arg(long)]
    skip_if_latest: bool,

    /// Print the steps that would run without touching the database
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct Config {
    host: String,
    /// Port the server listens on (default: 5432)
    #[serde(default = "default_port")]
    port: u16,
    user: String,
    password: String,
    database: String,
    /// Root directory holding one subdirectory per migration version
    migrations_dir: PathBuf,
}

fn default_port() -> u16 {
    5432
}

impl Config {
    fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let catalog = MigrationCatalog::new(&config.migrations_dir);
    let engine = MigrationEngine::new(catalog.clone(), VersionStore::new())
        .with_skip_if_latest(args.skip_if_latest)
        .on_step_applied(|step| match step.direction {
            Direction::Up => println!("Upgraded to v{}", step.version),
            Direction::Down => println!("Downgraded to v{}", step.version - 1),
        })
        .on_script_missing(|step| {
            println!(
                "Warning: no {} script for version {}, ledger updated anyway",
                step.direction, step.version
            )
        });

    let mut executor = PostgresExecutor::connect(&config.connect_params()).map_err(|e| {
        format!(
            "{} - check the connection settings in {}",
            e,
            args.config.display()
        )
    })?;

    let status = engine.status(&mut executor)?;
    println!("-------- VERSION MANAGER --------");
    println!("Migrations root : {}", catalog.root().display());
    println!("Current version : {}", status.current_version);
    println!("Highest available version : {}", status.highest_available);

    // An explicit target still goes through the engine so out-of-range
    // requests are rejected; the early exit only avoids the prompt.
    if args.target.is_none()
        && args.skip_if_latest
        && status.current_version == status.highest_available
    {
        println!("Already at the highest available version, nothing to do.");
        return Ok(());
    }

    let target = match args.target {
        Some(target) => target,
        None => prompt_for_target()?,
    };

    if args.dry_run {
        let plan = engine.plan(&mut executor, target)?;
        if plan.is_empty() {
            println!("Already at version {}, nothing to do.", target);
        } else {
            println!("Would apply {} step(s):", plan.len());
            for step in plan.steps() {
                println!("  {} v{}", step.direction, step.version);
            }
        }
        return Ok(());
    }

    match engine.migrate(&mut executor, target)? {
        MigrationOutcome::AlreadyAtTarget { version } => {
            println!("Already at version {}, nothing to do.", version);
        }
        MigrationOutcome::UpgradedTo {
            version,
            steps_applied,
            ..
        } => {
            println!(
                "Upgrade complete: {} step(s) applied, now at version {}",
                steps_applied.len(),
                version
            );
        }
        MigrationOutcome::DowngradedTo {
            version,
            steps_applied,
            ..
        } => {
            println!(
                "Downgrade complete: {} step(s) applied, now at version {}",
                steps_applied.len(),
                version
            );
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read configuration file {}: {}", path.display(), e))?;
    let config: Config = serde_json::from_str(&text)
        .map_err(|e| format!("invalid configuration in {}: {}", path.display(), e))?;
    Ok(config)
}

fn prompt_for_target() -> Result<i64, Box<dyn std::error::Error>> {
    print!("Which version do you want to migrate to? ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    line.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number, enter a numeric version", line.trim()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_with_default_port() {
        let config: Config = serde_json::from_str(
            r#"{
                "host": "db.internal",
                "user": "app",
                "password": "secret",
                "database": "app",
                "migrations_dir": "./migrations"
            }"#,
        )
        .unwrap();
        assert_eq!(config.port, 5432);
        let params = config.connect_params();
        assert_eq!(params.host, "db.internal");
        assert_eq!(params.database, "app");
    }

    #[test]
    fn config_rejects_missing_connection_fields() {
        let result = serde_json::from_str::<Config>(r#"{"host": "db.internal"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn negative_targets_parse_from_the_command_line() {
        let args = Args::try_parse_from(["transitio", "-1"]).unwrap();
        assert_eq!(args.target, Some(-1));
    }

    #[test]
    fn flags_default_off() {
        let args = Args::try_parse_from(["transitio"]).unwrap();
        assert_eq!(args.target, None);
        assert!(!args.skip_if_latest);
        assert!(!args.dry_run);
        assert_eq!(args.config, PathBuf::from("config.json"));
    }

    #[test]
    fn config_path_and_flags_parse_together() {
        let args =
            Args::try_parse_from(["transitio", "3", "--config", "deploy.json", "--dry-run"])
                .unwrap();
        assert_eq!(args.target, Some(3));
        assert_eq!(args.config, PathBuf::from("deploy.json"));
        assert!(args.dry_run);
    }
}
