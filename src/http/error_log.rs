//! Destination for server-level diagnostics.

use std::fmt::Display;
use std::sync::Arc;

use crate::config::ERROR_LOG_NAME;

/// Named sink for listener and connection errors.
///
/// Cloning is cheap; every clone writes to the same destination. Events are
/// emitted through `tracing` with the `aws::server` target, so they end up
/// wherever the subscriber sends them (stderr by default).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLog {
    name: Arc<str>,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(ERROR_LOG_NAME)
    }
}

impl ErrorLog {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a non-fatal error.
    pub fn error(&self, message: impl Display) {
        tracing::error!(target: "aws::server", server = %self.name, "{message}");
    }

    /// Record `err` and terminate the process with exit status 1.
    pub fn fatal(&self, err: impl Display) -> ! {
        self.error(err);
        std::process::exit(1)
    }
}
