//! Per-record reporting.

use std::io::Write;

use apns_core::Response;
use apns_push::{Reporter, Skip};

/// Writes one `<status>: '<reason>'` line per answered record.
///
/// Skipped records go to the log, not to the report stream.
pub struct LineReporter<W> {
    out: W,
}

impl LineReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> LineReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Reporter for LineReporter<W> {
    fn delivered(&mut self, line: usize, device_token: &str, response: &Response) {
        tracing::debug!(line, token = device_token, status = response.status, "delivered");

        // Flush per record so a consumer sees each result before the next push.
        if let Err(e) = writeln!(self.out, "{response}").and_then(|()| self.out.flush()) {
            tracing::error!(line, error = %e, "failed to write report");
        }
    }

    fn skipped(&mut self, line: usize, skip: &Skip) {
        tracing::warn!(line, "{skip}");
    }
}
