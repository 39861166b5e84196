//! Failure sinks
//!
//! A [`Fataler`] is how [`crate::open`] reports setup failures without depending on a
//! particular test framework: it receives the error and does not return.

use crate::Error;

/// A capability to fail immediately.
///
/// Implementations must diverge: panic, abort, exit, or unwind through the surrounding
/// test harness.
pub trait Fataler {
    /// Reports `err` and never returns.
    fn fatal(&self, err: Error) -> !;
}

impl<F: Fataler + ?Sized> Fataler for &F {
    fn fatal(&self, err: Error) -> ! {
        (**self).fatal(err)
    }
}

/// Fails by panicking, which is how `#[test]` and `#[tokio::test]` functions fail.
///
/// The panic message carries the whole error chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Panic;

impl Fataler for Panic {
    #[track_caller]
    fn fatal(&self, err: Error) -> ! {
        panic!("{}", render_chain(&err))
    }
}

/// Fails by logging the error and exiting the process with status 1.
///
/// For binaries and harnesses that do not catch panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exit;

impl Fataler for Exit {
    fn fatal(&self, err: Error) -> ! {
        tracing::error!(error = %render_chain(&err), "test database setup failed");
        std::process::exit(1)
    }
}

/// Renders an error and its sources as `outer: cause: root cause`.
pub(crate) fn render_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
