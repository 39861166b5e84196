//! Error types for provisioning ephemeral databases

use std::path::PathBuf;

use crate::{DatabaseName, gc::GcError, schema::SchemaError};

/// SQLSTATE `duplicate_database`.
const DUPLICATE_DATABASE: &str = "42P04";

/// Errors that can occur while provisioning an ephemeral database.
///
/// None of them is retried: a test whose database cannot be set up is expected to fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The schema sources could not be resolved
    #[error("failed to load schema")]
    Schema(#[from] SchemaError),

    /// The administrative database URL is not a valid URL
    #[error("invalid database URL")]
    InvalidUrl {
        #[source]
        source: url::ParseError,
    },

    /// The administrative database URL has no path to put a database name in
    #[error("database URL '{url}' cannot carry a database name")]
    UrlWithoutPath {
        /// The URL, with any password masked
        url: String,
    },

    /// Connecting to the administrative database or to the new database failed
    #[error("error connecting to '{url}'")]
    Connect {
        /// The URL, with any password masked
        url: String,
        #[source]
        source: sqlx::Error,
    },

    /// Collecting expired databases failed before anything was created
    #[error("failed to collect expired test databases")]
    Gc(#[from] GcError),

    /// `CREATE DATABASE` failed
    ///
    /// This includes the (improbable) case of a name collision, see
    /// [`Error::is_name_collision`].
    #[error("failed to create database '{name}'")]
    CreateDatabase {
        name: DatabaseName,
        #[source]
        source: sqlx::Error,
    },

    /// A schema file failed to execute against the new database
    ///
    /// Files after this one were not applied.
    #[error("failed to apply schema file '{}'", path.display())]
    ApplySchema {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
}

impl Error {
    /// Returns `true` if `CREATE DATABASE` failed because the generated name was taken.
    ///
    /// Only for diagnostics: collisions are never retried.
    pub fn is_name_collision(&self) -> bool {
        matches!(
            self,
            Error::CreateDatabase {
                source: sqlx::Error::Database(err),
                ..
            } if err.code().is_some_and(|code| code == DUPLICATE_DATABASE)
        )
    }
}
