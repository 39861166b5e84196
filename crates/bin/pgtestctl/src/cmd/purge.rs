//! Expired database purge command.
//!
//! Drops expired ephemeral databases out of band by:
//! 1. Listing the databases older than the retention window, oldest first
//! 2. Dropping them one at a time, waiting for each drop to complete
//! 3. Reporting every drop that failed
//!
//! A database that is still in use cannot be dropped; it is reported and left in place.
//! The operation is idempotent - safe to call repeatedly.
//!
//! # Configuration
//!
//! - Database URL: `--database-url` flag or `PGTEST_DATABASE_URL` env var
//! - Logging: `PGTEST_LOG` env var (`error`, `warn`, `info`, `debug`, `trace`)

use std::time::Duration;

use chrono::Utc;
use monitoring::logging;
use pgtest::{DatabaseName, GcPolicy, gc};

use crate::{
    args::{ConnectError, GlobalArgs},
    ui,
};

/// Command-line arguments for the `purge` command.
#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Minimum age in seconds of the databases to drop
    #[arg(long, value_name = "SECS", default_value_t = GcPolicy::DEFAULT_RETENTION.as_secs())]
    pub retention: u64,

    /// Drop at most this many databases, oldest first
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Print what would be dropped without dropping anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Drop expired ephemeral databases.
///
/// # Errors
///
/// Returns [`Error`] if the server cannot be queried, or if any drop failed.
#[tracing::instrument(skip_all, fields(database_url = %global.redacted_url()))]
pub async fn run(
    Args {
        global,
        retention,
        limit,
        dry_run,
    }: Args,
) -> Result<(), Error> {
    let mut conn = global.connect().await?;

    let policy = GcPolicy {
        retention: Duration::from_secs(retention),
        max_drops: limit.unwrap_or(usize::MAX),
    };
    let mut expired = gc::list_expired(&mut conn, &policy, Utc::now())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, error_source = logging::error_source(&err), "Failed to list expired test databases");
            Error::List(err)
        })?;
    expired.truncate(policy.max_drops);

    if expired.is_empty() {
        crate::info!("No expired test databases");
        return Ok(());
    }

    if dry_run {
        crate::info!("Would drop {} database(s):", expired.len());
        for name in &expired {
            crate::detail!("{name}");
        }
        return Ok(());
    }

    let failed = drop_all(&mut conn, &expired).await;
    let dropped = expired.len() - failed;

    if failed > 0 {
        return Err(Error::DropsFailed { failed, dropped });
    }

    crate::success!("Dropped {} expired database(s)", dropped);

    Ok(())
}

/// Drop each database in turn, reporting failures. Returns the number of failures.
pub(crate) async fn drop_all(conn: &mut sqlx::PgConnection, names: &[DatabaseName]) -> usize {
    let mut failed = 0;
    for name in names {
        match gc::drop_database(conn, name).await {
            Ok(()) => crate::detail!("dropped {}", ui::db_name(name)),
            Err(err) => {
                tracing::warn!(error = %err, error_source = logging::error_source(&err), "Failed to drop test database");
                crate::warning!("{err}: {}", logging::error_source(&err));
                failed += 1;
            }
        }
    }
    failed
}

/// Errors for database purging.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Could not connect to the server
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The database catalog could not be queried
    #[error("failed to list expired test databases")]
    List(#[source] pgtest::GcError),

    /// Some databases could not be dropped
    ///
    /// The reasons are reported as the drops fail.
    #[error("{failed} database(s) could not be dropped ({dropped} dropped)")]
    DropsFailed { failed: usize, dropped: usize },
}
