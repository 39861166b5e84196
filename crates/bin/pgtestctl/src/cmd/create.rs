//! Database creation command.
//!
//! Provisions an ephemeral database the same way a test does:
//! 1. Resolving the schema files and migrations directories
//! 2. Sweeping expired databases on the server
//! 3. Creating the database and applying the schema
//! 4. Printing the new database URL on stdout
//!
//! Schema files are applied first, then migrations directories, each group in the order
//! given on the command line.
//!
//! The sweep in step 2 only schedules drops in the background. The process exits right after
//! step 4, so drops that have not completed by then are abandoned and the databases they
//! targeted wait for the next sweep. Use the `purge` command to drop expired databases
//! reliably.
//!
//! # Configuration
//!
//! - Database URL: `--database-url` flag or `PGTEST_DATABASE_URL` env var
//!   (default: `postgres:///postgres?sslmode=disable`)
//! - Logging: `PGTEST_LOG` env var (`error`, `warn`, `info`, `debug`, `trace`)

use std::path::PathBuf;

use monitoring::logging;

use crate::{args::GlobalArgs, ui};

/// Caller tag used when `--tag` is not given.
const DEFAULT_TAG: &str = "pgtestctl";

/// Command-line arguments for the `create` command.
#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// SQL file to apply to the new database (repeatable)
    #[arg(long = "schema-file", value_name = "FILE")]
    pub schema_files: Vec<PathBuf>,

    /// Directory of `*.sql` migrations to apply in path order (repeatable)
    #[arg(long = "migrations", value_name = "DIR")]
    pub migrations: Vec<PathBuf>,

    /// Tag appended to the database name
    #[arg(long, default_value = DEFAULT_TAG)]
    pub tag: String,
}

/// Create an ephemeral database and print its URL.
///
/// # Errors
///
/// Returns [`Error`] if any provisioning step fails.
#[tracing::instrument(skip_all, fields(database_url = %global.redacted_url()))]
pub async fn run(
    Args {
        global,
        schema_files,
        migrations,
        tag,
    }: Args,
) -> Result<(), Error> {
    let mut options = pgtest::Options::new()
        .database_url(global.database_url.as_str())
        .caller_tag(tag);
    for file in schema_files {
        options = options.schema_file(file);
    }
    for dir in migrations {
        options = options.migrations(dir);
    }

    let db = options.try_open().await.map_err(|err| {
        tracing::error!(error = %err, error_source = logging::error_source(&err), "Failed to create test database");
        Error::Provision(err)
    })?;

    crate::success!("Created database {}", ui::db_name(db.name()));
    println!("{}", db.url());

    Ok(())
}

/// Errors for database creation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Provisioning failed
    ///
    /// The database may have been created before the failure (for instance when a schema
    /// file does not apply); it is then collected by a later sweep.
    #[error("failed to create test database")]
    Provision(#[source] pgtest::Error),
}
