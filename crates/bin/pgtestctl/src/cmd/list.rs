//! Database listing command.
//!
//! Prints the ephemeral databases found on the server, oldest first, one per line:
//! name, creation time and age, separated by tabs.
//!
//! # Configuration
//!
//! - Database URL: `--database-url` flag or `PGTEST_DATABASE_URL` env var
//! - Logging: `PGTEST_LOG` env var (`error`, `warn`, `info`, `debug`, `trace`)

use std::time::Duration;

use chrono::{DateTime, Utc};
use monitoring::logging;
use pgtest::{DatabaseName, GcError, GcPolicy, gc};
use sqlx::PgConnection;

use crate::{
    args::{ConnectError, GlobalArgs},
    ui,
};

/// Command-line arguments for the `list` command.
#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Only list databases older than the retention window
    #[arg(long)]
    pub expired: bool,

    /// Retention window in seconds, used with `--expired`
    #[arg(long, value_name = "SECS", default_value_t = GcPolicy::DEFAULT_RETENTION.as_secs())]
    pub retention: u64,
}

/// List ephemeral databases.
///
/// # Errors
///
/// Returns [`Error`] if the server cannot be reached or queried.
#[tracing::instrument(skip_all, fields(database_url = %global.redacted_url()))]
pub async fn run(
    Args {
        global,
        expired,
        retention,
    }: Args,
) -> Result<(), Error> {
    let mut conn = global.connect().await?;

    let now = Utc::now();
    let names = fetch(&mut conn, expired.then(|| Duration::from_secs(retention)), now)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, error_source = logging::error_source(&err), "Failed to list test databases");
            Error::List(err)
        })?;

    for name in &names {
        match name.created_at() {
            Some(created_at) => println!(
                "{name}\t{}\t{}",
                created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                ui::age(now - created_at)
            ),
            None => println!("{name}\t-\t-"),
        }
    }

    if names.is_empty() {
        crate::info!("No test databases found");
    }

    Ok(())
}

/// Test databases on the server, oldest first
///
/// With a `retention`, only the databases older than it at `now` are returned.
pub(crate) async fn fetch(
    conn: &mut PgConnection,
    retention: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<Vec<DatabaseName>, GcError> {
    match retention {
        Some(retention) => {
            let policy = GcPolicy {
                retention,
                ..Default::default()
            };
            gc::list_expired(conn, &policy, now).await
        }
        None => gc::list(conn).await,
    }
}

/// Errors for database listing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Could not connect to the server
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The database catalog could not be queried
    #[error("failed to list test databases")]
    List(#[source] GcError),
}
