//! Ephemeral database names
//!
//! Every database created by this crate is named
//! `pgtest_<YYYYMMDDHHMMSS>Z_<suffix>[_<tag>]`:
//!
//! - the timestamp is the UTC creation time, fixed-width, so comparing two names as strings
//!   compares their creation times
//! - the suffix is [`RANDOM_SUFFIX_LEN`] random lowercase letters, which is what makes names
//!   unique across concurrent callers
//! - the optional tag identifies the caller (usually the test file) for humans browsing the
//!   server; it plays no part in uniqueness
//!
//! The garbage collector relies on the string ordering: it never parses a name, it compares
//! names against a synthetic boundary name (see [`crate::GcPolicy::boundary`]).

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

/// Literal prefix shared by all ephemeral databases.
///
/// Distinguishes them from user databases living on the same server.
pub const PREFIX: &str = "pgtest";

/// Number of random lowercase letters in every name.
///
/// 26^10 ≈ 1.4 × 10^14 possible suffixes per second of creation time.
pub const RANDOM_SUFFIX_LEN: usize = 10;

/// PostgreSQL identifier limit (`NAMEDATALEN - 1`).
///
/// Longer identifiers are silently truncated by the server, which would make the derived
/// connection URL point at a database that does not exist.
pub const MAX_NAME_LEN: usize = 63;

/// `chrono` format of the embedded creation time.
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Length of a formatted timestamp (`YYYYMMDDHHMMSS`).
const TIMESTAMP_LEN: usize = 14;

/// Bytes taken by everything except the caller tag: `pgtest_` + timestamp + `Z_` + suffix.
const BASE_NAME_LEN: usize = PREFIX.len() + 1 + TIMESTAMP_LEN + 2 + RANDOM_SUFFIX_LEN;

/// Maximum caller tag length, leaving room for the `_` separator.
const MAX_TAG_LEN: usize = MAX_NAME_LEN - BASE_NAME_LEN - 1;

/// Name of an ephemeral database.
///
/// Built by [`NameGenerator::generate`] or [`DatabaseName::format`]; names read back from the
/// server are wrapped with [`DatabaseName::from_owned_unchecked`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseName(String);

impl DatabaseName {
    /// Formats a name from its parts: `pgtest_<created_at>Z_<suffix>`.
    ///
    /// The suffix is used verbatim. The garbage collector passes `db` to build its boundary
    /// name; the generator passes the random suffix and the sanitized caller tag.
    pub fn format(created_at: DateTime<Utc>, suffix: &str) -> Self {
        Self(format!(
            "{PREFIX}_{}Z_{suffix}",
            created_at.format(TIMESTAMP_FORMAT)
        ))
    }

    /// Wraps a name without checking that it follows the naming convention.
    ///
    /// Meant for names read back from `pg_database`, which are trusted.
    pub fn from_owned_unchecked(name: String) -> Self {
        Self(name)
    }

    /// Returns the creation time embedded in the name.
    ///
    /// Returns `None` if the name does not follow the naming convention.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let rest = self.0.strip_prefix(PREFIX)?.strip_prefix('_')?;
        let timestamp = rest.get(..TIMESTAMP_LEN)?;
        if !rest[TIMESTAMP_LEN..].starts_with("Z_") {
            return None;
        }
        NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .ok()
            .map(|t| t.and_utc())
    }

    /// Get a reference to the inner str
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::ops::Deref for DatabaseName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for DatabaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for DatabaseName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<str> for DatabaseName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl std::fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for DatabaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Generator of unique [`DatabaseName`]s.
///
/// Owns its random source; nothing is shared process-wide. The generator is `Sync`, so a
/// single instance can be shared between concurrent tests through an `Arc`.
pub struct NameGenerator {
    rng: Mutex<StdRng>,
}

impl NameGenerator {
    /// Creates a generator seeded from the operating system's entropy source.
    ///
    /// Seeding from the OS rather than from the clock keeps processes started in the same
    /// instant from producing the same suffixes.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Creates a generator with a fixed seed, yielding a reproducible suffix sequence.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Generates the name of a database created at `now`.
    ///
    /// The caller tag is sanitized (see [`sanitize_tag`]) and dropped when nothing is left of
    /// it. The result never exceeds [`MAX_NAME_LEN`] bytes.
    pub fn generate(&self, caller_tag: Option<&str>, now: DateTime<Utc>) -> DatabaseName {
        let mut suffix = String::with_capacity(MAX_NAME_LEN - BASE_NAME_LEN + RANDOM_SUFFIX_LEN);
        {
            let mut rng = self.rng.lock();
            suffix.extend((0..RANDOM_SUFFIX_LEN).map(|_| rng.random_range(b'a'..=b'z') as char));
        }

        if let Some(tag) = caller_tag.map(sanitize_tag).filter(|tag| !tag.is_empty()) {
            suffix.push('_');
            suffix.push_str(&tag);
        }

        DatabaseName::format(now, &suffix)
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NameGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameGenerator").finish_non_exhaustive()
    }
}

/// Reduces a caller tag to `[a-z0-9_]`, at most as long as fits in a database name.
///
/// ASCII letters are lowercased; every other character becomes `_`. Keeps names readable
/// in `psql` listings and usable unescaped in connection URLs.
pub fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TAG_LEN)
        .collect()
}

/// Derives a caller tag from a source file path: its file stem.
///
/// `crates/app/tests/it_users.rs` yields `it_users`.
pub fn tag_from_source_file(file: &str) -> Option<String> {
    Path::new(file)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(ToOwned::to_owned)
}
