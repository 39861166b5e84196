//! Test utilities for tests against a throwaway PostgreSQL server

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use pgtemp::{PgTempDB, PgTempDBBuilder};
use sqlx::{Connection as _, PgConnection};
use url::Url;

/// A PostgreSQL server living as long as the value
///
/// Every test starts its own server, so databases created or dropped by one test are never
/// observed by another.
pub struct TempServer {
    admin_url: Url,

    /// On drop, the server is stopped and its data directory deleted.
    _temp_db: PgTempDB,
}

impl TempServer {
    /// Start a server and wait until it accepts connections
    pub async fn start() -> Self {
        monitoring::logging::init();

        let temp_db = PgTempDB::from_builder(PgTempDBBuilder::new().with_initdb_arg("locale", "C"));
        let admin_url =
            Url::parse(&temp_db.connection_uri()).expect("pgtemp should return a valid URL");

        let conn = connect_with_retry(admin_url.as_str())
            .await
            .expect("failed to connect to temp server");
        conn.close().await.expect("failed to close connection");

        Self {
            admin_url,
            _temp_db: temp_db,
        }
    }

    /// URL of the server's `postgres` database
    pub fn admin_url(&self) -> &Url {
        &self.admin_url
    }

    /// Connect to the server's `postgres` database
    pub async fn connect(&self) -> PgConnection {
        PgConnection::connect(self.admin_url.as_str())
            .await
            .expect("failed to connect to temp server")
    }

    /// Create a database outside of the provisioner, for fixtures
    pub async fn create_database(&self, name: &str) {
        let mut conn = self.connect().await;
        let stmt = format!("CREATE DATABASE {}", pg_escape::quote_identifier(name));
        sqlx::raw_sql(&stmt)
            .execute(&mut conn)
            .await
            .expect("failed to create fixture database");
    }

    /// Whether a database named `name` exists on the server
    pub async fn database_exists(&self, name: &str) -> bool {
        let mut conn = self.connect().await;
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&mut conn)
            .await
            .expect("failed to query pg_database")
    }

    /// Wait until the database `name` is gone, for up to a few seconds
    ///
    /// Background drops are not observable, so tests poll the catalog instead.
    pub async fn wait_until_dropped(&self, name: &str) -> bool {
        let gone = move || async move {
            if self.database_exists(name).await {
                Err(())
            } else {
                Ok(())
            }
        };

        gone.retry(poll_policy()).await.is_ok()
    }

    /// Terminate the backend serving `conn` and wait until the server has reaped it
    ///
    /// The next statement sent over `conn` fails.
    pub async fn terminate_backend(&self, conn: &mut PgConnection) {
        let pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut *conn)
            .await
            .expect("failed to query backend pid");

        let mut admin = self.connect().await;
        let terminated: bool = sqlx::query_scalar("SELECT pg_terminate_backend($1)")
            .bind(pid)
            .fetch_one(&mut admin)
            .await
            .expect("failed to terminate backend");
        assert!(terminated, "backend {pid} should have been signalled");

        let gone = move || async move {
            let alive: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM pg_stat_activity WHERE pid = $1)",
            )
            .bind(pid)
            .fetch_one(&mut self.connect().await)
            .await
            .expect("failed to query pg_stat_activity");
            if alive { Err(()) } else { Ok(()) }
        };
        gone.retry(poll_policy())
            .await
            .expect("terminated backend should exit");
    }
}

/// Connect with retry logic to handle startup timing issues
///
/// pgtemp returns before PostgreSQL is ready, see [`is_server_starting_up`].
pub async fn connect_with_retry(url: &str) -> Result<PgConnection, sqlx::Error> {
    (|| PgConnection::connect(url))
        .retry(startup_retry_policy())
        .when(is_server_starting_up)
        .notify(|err, dur| {
            tracing::warn!(
                error = %err,
                "Database still starting up during test connection. Retrying in {:.1}s",
                dur.as_secs_f32()
            );
        })
        .await
}

/// Whether a connection failure means the server is not up yet
///
/// Depending on how far startup got, connecting fails with:
/// - `ConnectionRefused`: the postmaster is not listening on its port yet
/// - `NotFound`: its Unix socket does not exist yet
/// - SQLSTATE 57P03 (`cannot_connect_now`): it listens but still runs recovery
fn is_server_starting_up(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code == "57P03"),
        sqlx::Error::Io(io_err) => matches!(
            io_err.kind(),
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound
        ),
        _ => false,
    }
}

/// Exponential backoff tuned for a local server that starts within a few seconds, even
/// when many tests start servers at once
fn startup_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(250))
        .with_max_times(60)
}

/// Backoff for polling background work, about five seconds in total
fn poll_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(20))
        .with_max_delay(Duration::from_millis(250))
        .with_max_times(30)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn is_server_starting_up_with_refused_connection_retries() {
        let err = sqlx::Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(is_server_starting_up(&err));
    }

    #[test]
    fn is_server_starting_up_with_missing_socket_retries() {
        let err = sqlx::Error::Io(io::Error::from(io::ErrorKind::NotFound));
        assert!(is_server_starting_up(&err));
    }

    #[test]
    fn is_server_starting_up_with_other_failures_gives_up() {
        let denied = sqlx::Error::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!is_server_starting_up(&denied));
        assert!(!is_server_starting_up(&sqlx::Error::PoolTimedOut));
    }
}
