//! Internal SQL operations on the server catalog

use sqlx::{Executor, PgConnection, Postgres};

/// List ephemeral database names that sort before `boundary`
///
/// Comparison and ordering use the `"C"` collation, so names compare byte-wise (and therefore
/// chronologically) whatever the server's default collation is. Oldest first.
pub(crate) async fn list_before<'c, E>(exe: E, boundary: &str) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT datname::text
        FROM pg_database
        WHERE datname LIKE 'pgtest\_%'
          AND datname::text COLLATE "C" < $1
        ORDER BY datname::text COLLATE "C"
    "#};

    sqlx::query_scalar(query).bind(boundary).fetch_all(exe).await
}

/// List every ephemeral database name, oldest first
pub(crate) async fn list_all<'c, E>(exe: E) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT datname::text
        FROM pg_database
        WHERE datname LIKE 'pgtest\_%'
        ORDER BY datname::text COLLATE "C"
    "#};

    sqlx::query_scalar(query).fetch_all(exe).await
}

/// Drop a database
///
/// `DROP DATABASE` cannot take a bind parameter, so the name is quoted as an identifier.
/// Fails if the database does not exist or still has open connections.
pub(crate) async fn drop_database(conn: &mut PgConnection, name: &str) -> Result<(), sqlx::Error> {
    let stmt = format!("DROP DATABASE {}", pg_escape::quote_identifier(name));
    conn.execute(stmt.as_str()).await?;
    Ok(())
}
