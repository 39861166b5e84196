//! Test utilities for command tests against a throwaway PostgreSQL server

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use pgtemp::{PgTempDB, PgTempDBBuilder};
use sqlx::{Connection as _, Executor as _, PgConnection};
use url::Url;

use crate::args::GlobalArgs;

/// A PostgreSQL server living as long as the value
pub struct TempServer {
    admin_url: Url,
    _temp_db: PgTempDB,
}

impl TempServer {
    /// Start a server and wait until it accepts connections
    pub async fn start() -> Self {
        monitoring::logging::init();

        let temp_db = PgTempDB::from_builder(PgTempDBBuilder::new().with_initdb_arg("locale", "C"));
        let admin_url =
            Url::parse(&temp_db.connection_uri()).expect("pgtemp should return a valid URL");

        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(250))
            .with_max_times(60);
        let conn = (|| PgConnection::connect(admin_url.as_str()))
            .retry(retry_policy)
            .when(is_server_starting_up)
            .await
            .expect("failed to connect to temp server");
        conn.close().await.expect("failed to close connection");

        Self {
            admin_url,
            _temp_db: temp_db,
        }
    }

    /// Global arguments pointing the commands at this server
    pub fn global_args(&self) -> GlobalArgs {
        GlobalArgs {
            database_url: self.admin_url.clone(),
        }
    }

    pub async fn connect(&self) -> PgConnection {
        PgConnection::connect(self.admin_url.as_str())
            .await
            .expect("failed to connect to temp server")
    }

    /// Create a database outside of the provisioner, for fixtures
    pub async fn create_database(&self, name: &str) {
        let stmt = format!("CREATE DATABASE {}", pg_escape::quote_identifier(name));
        self.connect()
            .await
            .execute(stmt.as_str())
            .await
            .expect("failed to create fixture database");
    }

    pub async fn database_exists(&self, name: &str) -> bool {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&mut self.connect().await)
            .await
            .expect("failed to query pg_database")
    }
}

/// Refused connections, a missing socket and SQLSTATE 57P03 all mean the server is still
/// starting
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
