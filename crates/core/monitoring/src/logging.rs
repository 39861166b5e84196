//! A set of utilities to enable logging configuration using tracing_subscriber.

use std::{io::IsTerminal, sync::Once};

use tracing_subscriber::{EnvFilter, filter::LevelFilter};

static PGTEST_LOG_ENV_VAR: &str = "PGTEST_LOG";

/// List of crates in the workspace.
const PGTEST_CRATES: &[&str] = &["monitoring", "pgtest", "pgtestctl"];

/// Initializes a tracing subscriber for logging.
///
/// Log output goes to stderr so that commands printing results on stdout
/// (e.g. a freshly provisioned database URL) stay pipeable.
pub fn init() {
    // Since we also use this function to enable logging in tests, wrap it in `Once` to prevent
    // multiple initializations.
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let (env_filter, pgtest_log_level) = env_filter_and_log_level();

        // `try_init` so a subscriber installed by a test harness is not an error
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .try_init();

        tracing::debug!("log level: {}", pgtest_log_level);
    });
}

fn env_filter_and_log_level() -> (EnvFilter, String) {
    // Parse directives from RUST_LOG, ignoring any that do not parse
    let directive_string = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let mut env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::ERROR.into())
        .parse_lossy(&directive_string);

    let log_level = std::env::var(PGTEST_LOG_ENV_VAR).unwrap_or_else(|_| "info".to_string());

    for crate_name in PGTEST_CRATES {
        // Add directives for each workspace crate, if not overriden by RUST_LOG
        if directive_string.contains(&format!("{crate_name}=")) {
            continue;
        }
        match format!("{crate_name}={log_level}").parse() {
            Ok(directive) => env_filter = env_filter.add_directive(directive),
            Err(err) => eprintln!("ignoring invalid {PGTEST_LOG_ENV_VAR} value {log_level:?}: {err}"),
        }
    }

    (env_filter, log_level)
}

/// Renders the `source()` chain of an error as a single ` -> `-separated string.
///
/// Meant for structured log fields, next to `error = %err`:
///
/// ```ignore
/// tracing::error!(error = %err, error_source = logging::error_source(&err), "drop failed");
/// ```
pub fn error_source(err: &dyn std::error::Error) -> String {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain.join(" -> ")
}
