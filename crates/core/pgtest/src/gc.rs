//! Garbage collection of expired test databases
//!
//! Every provisioning call sweeps the server for databases left behind by earlier test runs.
//! A database is expired when its name sorts before the name a database created
//! `retention` ago would get; the timestamp embedded in every name makes that a plain string
//! comparison.
//!
//! Drops run as detached tasks: [`collect`] returns as soon as they are scheduled, and their
//! outcome is never reported. A drop that fails (the database is still in use, another process
//! dropped it first, the runtime shut down) leaves the database eligible for the next pass.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::{Connection as _, PgConnection};
use url::Url;

use crate::DatabaseName;

mod sql;

/// Suffix of the synthetic name compared against during a sweep.
const BOUNDARY_SUFFIX: &str = "db";

/// How aggressively a sweep removes expired databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcPolicy {
    /// Minimum age of a database before it may be dropped
    ///
    /// Must comfortably exceed the longest test run; a database dropped under a running
    /// test fails that test.
    pub retention: Duration,

    /// Maximum number of drops scheduled by one sweep
    ///
    /// Bounds the cost each provisioning call pays; a large backlog is worked off over
    /// several calls.
    pub max_drops: usize,
}

impl GcPolicy {
    /// Default minimum age before a database is dropped
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3 * 60);

    /// Default number of drops per sweep
    pub const DEFAULT_MAX_DROPS: usize = 6;

    /// The name every database created before `now - retention` sorts before.
    ///
    /// Returns `None` when the retention reaches back past the representable time range, in
    /// which case nothing is old enough to collect.
    pub fn boundary(&self, now: DateTime<Utc>) -> Option<DatabaseName> {
        let retention = TimeDelta::from_std(self.retention).ok()?;
        let cutoff = now.checked_sub_signed(retention)?;
        Some(DatabaseName::format(cutoff, BOUNDARY_SUFFIX))
    }
}

impl Default for GcPolicy {
    fn default() -> Self {
        Self {
            retention: Self::DEFAULT_RETENTION,
            max_drops: Self::DEFAULT_MAX_DROPS,
        }
    }
}

/// Runs one sweep: lists expired databases and schedules a drop for at most
/// `policy.max_drops` of them, oldest first.
///
/// Returns the names whose drop was *scheduled*. Each drop runs on its own task with its own
/// connection to `admin_url`, because `conn` is closed by the caller before the drops get to
/// run. Must be called from within a Tokio runtime.
#[tracing::instrument(skip_all, err)]
pub async fn collect(
    conn: &mut PgConnection,
    admin_url: &Url,
    policy: &GcPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<DatabaseName>, GcError> {
    let mut expired = list_expired(conn, policy, now).await?;
    expired.truncate(policy.max_drops);

    for name in &expired {
        tokio::spawn(connect_and_drop(admin_url.clone(), name.clone()));
    }

    if !expired.is_empty() {
        tracing::debug!(count = expired.len(), "scheduled drop of expired test databases");
    }

    Ok(expired)
}

/// Lists the databases a sweep at `now` considers expired, oldest first.
///
/// Unbounded: `policy.max_drops` is not applied.
pub async fn list_expired(
    conn: &mut PgConnection,
    policy: &GcPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<DatabaseName>, GcError> {
    let Some(boundary) = policy.boundary(now) else {
        return Ok(Vec::new());
    };

    let names = sql::list_before(&mut *conn, boundary.as_str())
        .await
        .map_err(GcError::Enumerate)?;

    Ok(names
        .into_iter()
        .map(DatabaseName::from_owned_unchecked)
        .collect())
}

/// Lists every ephemeral database on the server, oldest first, whatever its age.
pub async fn list(conn: &mut PgConnection) -> Result<Vec<DatabaseName>, GcError> {
    let names = sql::list_all(&mut *conn)
        .await
        .map_err(GcError::Enumerate)?;

    Ok(names
        .into_iter()
        .map(DatabaseName::from_owned_unchecked)
        .collect())
}

/// Drops `name` and waits for the server to confirm.
pub async fn drop_database(conn: &mut PgConnection, name: &DatabaseName) -> Result<(), GcError> {
    sql::drop_database(conn, name.as_str())
        .await
        .map_err(|source| GcError::Drop {
            name: name.clone(),
            source,
        })
}

/// Body of a background drop. Failures are discarded.
async fn connect_and_drop(admin_url: Url, name: DatabaseName) {
    let Ok(mut conn) = PgConnection::connect(admin_url.as_str()).await else {
        return;
    };
    let _ = drop_database(&mut conn, &name).await;
    let _ = conn.close().await;
}

/// Errors that can occur while collecting expired databases.
#[derive(Debug, thiserror::Error)]
pub enum GcError {
    /// The database catalog could not be queried
    #[error("failed to list test databases")]
    Enumerate(#[source] sqlx::Error),

    /// A database could not be dropped
    ///
    /// Only returned by [`drop_database`]; background drops discard their errors.
    #[error("failed to drop database '{name}'")]
    Drop {
        name: DatabaseName,
        #[source]
        source: sqlx::Error,
    },
}
