use console::style;

/// Print a success message with a green checkmark
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        eprintln!("{} {}", console::style("✓").green().bold(), format!($($arg)*))
    };
}

/// Print an info message with a cyan arrow
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        eprintln!("{} {}", console::style("→").cyan(), format!($($arg)*))
    };
}

/// Print a warning message with a yellow warning symbol
#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        eprintln!("{} {}", console::style("⚠").yellow().bold(), format!($($arg)*))
    };
}

/// Print an error message with a red cross, including the full error chain
#[macro_export]
macro_rules! error {
    ($err:expr) => {{
        eprintln!("{} {}", console::style("✗").red().bold(), $err);

        let err_ref = &$err;
        for (i, cause) in err_ref.chain().skip(1).enumerate() {
            let indent = if i == 0 { "  " } else { "    " };
            eprintln!(
                "{indent}{} {}",
                console::style("→").dim(),
                console::style(cause).dim()
            );
        }
    }};
}

/// Print a dimmed detail message (indented)
#[macro_export]
macro_rules! detail {
    ($($arg:tt)*) => {
        eprintln!("  {}", console::style(format!($($arg)*)).dim())
    };
}

/// Style a database name (cyan)
pub fn db_name(name: impl std::fmt::Display) -> String {
    style(name).cyan().to_string()
}

/// Render an age as `1h02m03s`, `2m03s` or `3s`
pub fn age(age: chrono::TimeDelta) -> String {
    let secs = age.num_seconds().max(0);
    let (hours, mins, secs) = (secs / 3600, secs / 60 % 60, secs % 60);
    if hours > 0 {
        format!("{hours}h{mins:02}m{secs:02}s")
    } else if mins > 0 {
        format!("{mins}m{secs:02}s")
    } else {
        format!("{secs}s")
    }
}
