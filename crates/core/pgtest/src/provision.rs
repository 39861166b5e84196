//! Provisioning of ephemeral databases
//!
//! A provisioning call runs these steps, each gating the next:
//!
//! 1. Resolve the schema sources (before touching the server)
//! 2. Connect to the administrative database (the *control connection*)
//! 3. Sweep expired databases, see [`crate::gc`]
//! 4. Generate a fresh name and `CREATE DATABASE` it
//! 5. Close the control connection, whatever the outcome of the previous steps
//! 6. Connect to the new database and apply the schema, one file at a time
//!
//! A failure after step 4 leaves the new database behind; it is collected by a later sweep
//! like any other expired database.

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use sqlx::{Connection as _, Executor as _, PgConnection};
use url::Url;

use crate::{
    DatabaseName, Error, Fataler, NameGenerator, config,
    gc::{self, GcPolicy},
    name,
    schema::{self, SchemaBlob, SchemaSource},
    url::{Redacted, database_url, parse_admin_url},
};

/// Options for provisioning an ephemeral database.
///
/// # Defaults
///
/// | Option | Default |
/// |--------|---------|
/// | schema | none (empty database) |
/// | database URL | `PGTEST_DATABASE_URL`, else `postgres:///postgres?sslmode=disable` |
/// | caller tag | file stem of the source file calling [`Options::new`] |
/// | name generator | a fresh OS-seeded generator per call |
/// | GC policy | [`GcPolicy::default`] (3 minutes, 6 drops) |
#[derive(Debug, Clone)]
pub struct Options {
    schema: Vec<SchemaSource>,
    database_url: Option<String>,
    caller_tag: Option<String>,
    name_generator: Option<Arc<NameGenerator>>,
    gc_policy: GcPolicy,
}

impl Options {
    /// Create options with the defaults listed above.
    ///
    /// The caller tag defaults to the stem of the file this is called from, so databases
    /// created by `tests/it_users.rs` end in `_it_users`. Helpers wrapping this constructor
    /// can forward their own caller with `#[track_caller]`.
    #[track_caller]
    pub fn new() -> Self {
        let caller = std::panic::Location::caller();
        Self {
            schema: Vec::new(),
            database_url: None,
            caller_tag: name::tag_from_source_file(caller.file()),
            name_generator: None,
            gc_policy: GcPolicy::default(),
        }
    }

    /// Apply the SQL file at `path` as one unit.
    ///
    /// May be called several times; sources are applied in the order they are added.
    #[must_use]
    pub fn schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema.push(SchemaSource::File(path.into()));
        self
    }

    /// Apply every `*.sql` file below `dir`, sorted by path.
    ///
    /// May be called several times; sources are applied in the order they are added.
    #[must_use]
    pub fn migrations(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema.push(SchemaSource::Migrations(dir.into()));
        self
    }

    /// Connect to the server through the administrative database at `url`.
    ///
    /// Takes precedence over `PGTEST_DATABASE_URL`.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Tag the database name with `tag` instead of the calling file's stem.
    ///
    /// The tag is reduced to `[a-z0-9_]` and truncated to fit PostgreSQL's identifier limit.
    #[must_use]
    pub fn caller_tag(mut self, tag: impl Into<String>) -> Self {
        self.caller_tag = Some(tag.into());
        self
    }

    /// Draw names from `generator` instead of a fresh OS-seeded one.
    #[must_use]
    pub fn name_generator(mut self, generator: Arc<NameGenerator>) -> Self {
        self.name_generator = Some(generator);
        self
    }

    /// Sweep expired databases according to `policy`.
    #[must_use]
    pub fn gc_policy(mut self, policy: GcPolicy) -> Self {
        self.gc_policy = policy;
        self
    }

    /// Provision a database, reporting any failure to `fataler`.
    pub async fn open(self, fataler: &impl Fataler) -> TestDb {
        open(fataler, self).await
    }

    /// Provision a database, returning any failure.
    pub async fn try_open(self) -> Result<TestDb, Error> {
        try_open(self).await
    }
}

impl Default for Options {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

/// An ephemeral database, connected and with its schema applied.
///
/// Dereferences to the [`PgConnection`] opened on it. Dropping the value closes the
/// connection but leaves the database on the server until a later sweep collects it.
pub struct TestDb {
    name: DatabaseName,
    url: Url,
    conn: PgConnection,
}

impl TestDb {
    /// Create provisioning options, see [`Options::new`].
    #[track_caller]
    pub fn builder() -> Options {
        Options::new()
    }

    /// Name of the database on the server
    pub fn name(&self) -> &DatabaseName {
        &self.name
    }

    /// Connection URL of the database
    ///
    /// Use it to open more connections, or a pool.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Consume and return the inner connection
    pub fn into_connection(self) -> PgConnection {
        self.conn
    }
}

impl std::ops::Deref for TestDb {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for TestDb {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl std::fmt::Debug for TestDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDb")
            .field("name", &self.name)
            .field("url", &Redacted(&self.url).to_string())
            .finish_non_exhaustive()
    }
}

/// Provision a database, reporting any failure to `fataler`.
///
/// `fataler` never returns, so the caller always gets a usable database.
pub async fn open(fataler: &impl Fataler, options: Options) -> TestDb {
    match try_open(options).await {
        Ok(db) => db,
        Err(err) => fataler.fatal(err),
    }
}

/// Provision a database, returning any failure.
#[tracing::instrument(skip_all, err)]
pub async fn try_open(options: Options) -> Result<TestDb, Error> {
    let blobs = schema::resolve(&options.schema)?;

    let admin_url = match &options.database_url {
        Some(url) => parse_admin_url(url)?,
        None => parse_admin_url(&config::DATABASE_URL)?,
    };

    let mut control = connect(&admin_url).await?;
    let created = sweep_and_create(&mut control, &admin_url, &options).await;
    if let Err(err) = control.close().await {
        tracing::debug!(error = %err, "failed to close control connection");
    }
    let (name, url) = created?;

    let mut conn = connect(&url).await?;
    apply_schema(&mut conn, &blobs).await?;

    tracing::info!(database = %name, url = %Redacted(&url), "created test database");

    Ok(TestDb { name, url, conn })
}

/// Steps run on the control connection.
async fn sweep_and_create(
    control: &mut PgConnection,
    admin_url: &Url,
    options: &Options,
) -> Result<(DatabaseName, Url), Error> {
    let now = Utc::now();
    gc::collect(control, admin_url, &options.gc_policy, now).await?;

    let name = match &options.name_generator {
        Some(generator) => generator.generate(options.caller_tag.as_deref(), now),
        None => NameGenerator::new().generate(options.caller_tag.as_deref(), now),
    };
    let url = database_url(admin_url, &name);

    let stmt = format!("CREATE DATABASE {}", pg_escape::quote_identifier(&name));
    control
        .execute(stmt.as_str())
        .await
        .map_err(|source| Error::CreateDatabase {
            name: name.clone(),
            source,
        })?;

    Ok((name, url))
}

async fn connect(url: &Url) -> Result<PgConnection, Error> {
    PgConnection::connect(url.as_str())
        .await
        .map_err(|source| Error::Connect {
            url: Redacted(url).to_string(),
            source,
        })
}

/// Execute each blob in order, stopping at the first failure.
///
/// A query string without arguments goes through the simple query protocol, so a file may
/// hold any number of statements.
async fn apply_schema(conn: &mut PgConnection, blobs: &[SchemaBlob]) -> Result<(), Error> {
    for blob in blobs {
        conn.execute(blob.sql.as_str())
            .await
            .map_err(|source| Error::ApplySchema {
                path: blob.path.clone(),
                source,
            })?;
        tracing::debug!(path = %blob.path.display(), "applied schema file");
    }
    Ok(())
}
