//! Ephemeral PostgreSQL databases for test suites
//!
//! Every call to [`open`] creates a brand new database on a shared server, applies a schema to
//! it and hands back a connection. Tests never see each other's data, and nothing needs to
//! be cleaned up: each call also sweeps databases left behind by earlier runs once they are
//! older than the retention window (three minutes by default).
//!
//! ```no_run
//! # async fn example() {
//! let mut db = pgtest::Options::new()
//!     .migrations("migrations")
//!     .open(&pgtest::Panic)
//!     .await;
//!
//! sqlx::query("INSERT INTO users (name) VALUES ('alice')")
//!     .execute(&mut *db)
//!     .await
//!     .expect("insert should succeed");
//! # }
//! ```
//!
//! Databases are named `pgtest_<YYYYMMDDHHMMSS>Z_<random>[_<tag>]`, so they sort by
//! creation time and can be told apart from everything else on the server. The
//! administrative connection defaults to `postgres:///postgres?sslmode=disable` and can be
//! changed through the `PGTEST_DATABASE_URL` environment variable or
//! [`Options::database_url`].

pub mod config;
mod error;
mod fatal;
pub mod gc;
mod name;
mod provision;
pub mod schema;
pub mod url;

#[cfg(test)]
mod test_utils;


pub use self::{
    error::Error,
    fatal::{Exit, Fataler, Panic},
    gc::{GcError, GcPolicy},
    name::{DatabaseName, MAX_NAME_LEN, NameGenerator, PREFIX, RANDOM_SUFFIX_LEN, sanitize_tag},
    provision::{Options, TestDb, open, try_open},
    schema::{SchemaBlob, SchemaError, SchemaSource},
};
