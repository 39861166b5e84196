//! Default administrative connection target.

use std::sync::LazyLock;

/// Environment variable overriding [`DEFAULT_DATABASE_URL`].
pub const DATABASE_URL_ENV_VAR: &str = "PGTEST_DATABASE_URL";

/// Administrative database used when neither [`crate::Options::database_url`] nor
/// [`DATABASE_URL_ENV_VAR`] is set: the `postgres` database of a local server, without TLS.
pub const DEFAULT_DATABASE_URL: &str = "postgres:///postgres?sslmode=disable";

/// Administrative database URL from the environment, falling back to
/// [`DEFAULT_DATABASE_URL`].
///
/// Read once per process. An empty value counts as unset.
pub static DATABASE_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var(DATABASE_URL_ENV_VAR)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned())
});
