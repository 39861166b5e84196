//! Connection URL helpers
//!
//! The URL of an ephemeral database is the administrative URL with its path replaced by the
//! database name; host, credentials and query parameters (`sslmode`, `host=/socket/dir`, ...)
//! are carried over unchanged.

use url::Url;

use crate::{DatabaseName, Error};

/// Parses an administrative connection URL.
///
/// The URL must be able to carry a database name in its path, which rules out
/// cannot-be-a-base URLs such as `postgres:mydb`.
pub fn parse_admin_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|source| Error::InvalidUrl { source })?;
    if parsed.cannot_be_a_base() {
        return Err(Error::UrlWithoutPath {
            url: Redacted(&parsed).to_string(),
        });
    }
    Ok(parsed)
}

/// Builds the URL of the database `name` on the server behind `admin_url`.
pub fn database_url(admin_url: &Url, name: &DatabaseName) -> Url {
    let mut url = admin_url.clone();
    // Names are restricted to `[a-z0-9_]`, so the path needs no percent-encoding
    url.set_path(&format!("/{name}"));
    url
}

/// Displays a URL with its password masked.
///
/// Used wherever a URL ends up in logs or error messages.
pub struct Redacted<'a>(pub &'a Url);

impl std::fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.password().is_none() {
            return self.0.fmt(f);
        }
        let mut masked = self.0.clone();
        // Only fails for URLs without a host, which cannot carry a password
        let _ = masked.set_password(Some("***"));
        masked.fmt(f)
    }
}
