//! Schema resolution
//!
//! Turns the schema sources configured on [`crate::Options`] into the ordered list of SQL
//! texts applied to a fresh database.
//!
//! # Ordering rules
//!
//! - Sources are resolved in the order they were configured
//! - A file source contributes its whole content as one SQL text
//! - A migrations directory is scanned recursively for `*.sql` files; the matches are sorted
//!   by their full path string and expanded in place. Migration ordering is therefore
//!   expressed through file names (`0001_init.sql`, `0002_add_users.sql`, ...)
//!
//! Resolution is all-or-nothing: any read or traversal error fails the whole call.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

/// Extension of files picked up from migrations directories.
pub const SQL_EXTENSION: &str = "sql";

/// A place to load schema from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// A single SQL file, applied as one unit
    File(PathBuf),
    /// A directory of migration files, applied in path order
    Migrations(PathBuf),
}

/// One unit of SQL text, with the file it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaBlob {
    pub path: PathBuf,
    pub sql: String,
}

/// Resolves schema sources into SQL texts, in application order.
#[tracing::instrument(skip_all, err)]
pub fn resolve(sources: &[SchemaSource]) -> Result<Vec<SchemaBlob>, SchemaError> {
    let mut paths = Vec::new();
    for source in sources {
        match source {
            SchemaSource::File(path) => paths.push(path.clone()),
            SchemaSource::Migrations(dir) => paths.extend(migration_files(dir)?),
        }
    }

    let blobs = paths
        .into_iter()
        .map(|path| match fs_err::read_to_string(&path) {
            Ok(sql) => Ok(SchemaBlob { path, sql }),
            Err(source) => Err(SchemaError::ReadFile { path, source }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(count = blobs.len(), "resolved schema files");

    Ok(blobs)
}

/// Lists the migration files below `dir`, sorted by their full path string.
///
/// Every entry whose extension is exactly `sql` qualifies, at any depth, except
/// directories. Symbolic links are listed but not followed while walking.
pub fn migration_files(dir: &Path) -> Result<Vec<PathBuf>, SchemaError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|source| SchemaError::WalkDir {
            dir: dir.to_path_buf(),
            source,
        })?;

        if entry.file_type().is_dir() {
            continue;
        }
        if entry.path().extension() != Some(OsStr::new(SQL_EXTENSION)) {
            continue;
        }

        files.push(entry.into_path());
    }

    // Byte-wise on the whole path, independent of the directory enumeration order
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));

    Ok(files)
}

/// Errors that can occur while resolving schema sources.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A schema or migration file could not be read
    #[error("failed to read schema file '{}'", path.display())]
    ReadFile {
        /// The file that failed to read
        path: PathBuf,
        /// The underlying IO error (includes path context via `fs_err`)
        #[source]
        source: std::io::Error,
    },

    /// A migrations directory could not be traversed
    ///
    /// Also returned when the directory does not exist.
    #[error("failed to walk migrations directory '{}'", dir.display())]
    WalkDir {
        /// The configured migrations directory
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}
