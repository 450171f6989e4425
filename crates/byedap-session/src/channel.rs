//! External collaborator seams
//!
//! The editor host plugs in here: an [`OutputChannel`] receives raw adapter
//! output and lifecycle lines, a [`Notifier`] receives the user-facing
//! failure messages produced by the classifier. The session core never
//! renders UI itself.

use tracing::{error, info};

/// Append-only diagnostic log sink.
///
/// Receives the echoed command line, every flushed output line from the
/// adapter subprocess, and structured lifecycle messages ("Exited with code
/// N"). `reveal` asks the host to bring the log in front of the user after an
/// unclassified failure.
pub trait OutputChannel: Send + Sync {
    /// Append a complete line
    fn append_line(&self, line: &str);

    /// Append a raw chunk without a trailing newline (stderr passthrough)
    fn append(&self, chunk: &str);

    /// Ask the host to surface the log to the user
    fn reveal(&self);
}

/// User-facing notification sink for classified failures.
pub trait Notifier: Send + Sync {
    /// Show an error message to the user
    fn error(&self, message: &str);
}

/// Default [`OutputChannel`] that routes everything through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingChannel;

impl OutputChannel for TracingChannel {
    fn append_line(&self, line: &str) {
        info!(target: "byedap::adapter", "{}", line);
    }

    fn append(&self, chunk: &str) {
        info!(target: "byedap::adapter", "{}", chunk.trim_end_matches('\n'));
    }

    fn reveal(&self) {
        // Nothing to bring forward when logging to tracing
    }
}

/// Default [`Notifier`] that logs errors through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        error!(target: "byedap::adapter", "{}", message);
    }
}
