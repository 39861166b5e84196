//! Shared command-line arguments for pgtestctl commands.

use pgtest::url::Redacted;
use sqlx::{Connection as _, PgConnection};
use url::Url;

/// Global arguments shared across all commands.
///
/// Commands include these options by using `#[command(flatten)]` in their Args struct.
#[derive(Debug, clap::Args)]
pub struct GlobalArgs {
    /// URL of the administrative database of the PostgreSQL server
    #[arg(
        long,
        env = "PGTEST_DATABASE_URL",
        default_value = pgtest::config::DEFAULT_DATABASE_URL,
        value_parser = clap::value_parser!(Url),
        hide_env_values = true
    )]
    pub database_url: Url,
}

impl GlobalArgs {
    /// Open a connection to the administrative database.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or rejects the connection.
    pub async fn connect(&self) -> Result<PgConnection, ConnectError> {
        PgConnection::connect(self.database_url.as_str())
            .await
            .map_err(|source| ConnectError {
                url: self.redacted_url(),
                source,
            })
    }

    /// The database URL with any password masked, for display.
    pub fn redacted_url(&self) -> String {
        Redacted(&self.database_url).to_string()
    }
}

/// Failure to connect to the administrative database.
#[derive(Debug, thiserror::Error)]
#[error("failed to connect to '{url}'")]
pub struct ConnectError {
    url: String,
    #[source]
    source: sqlx::Error,
}
