//! Transport-agnostic progress events and the console renderer.
//!
//! The runner emits `LoadEvent`s; a `ProgressSink` decides how to present
//! them. `ConsoleProgress` prints the operator-facing log, and a plain
//! `Vec<LoadEvent>` collects them for tests.

use super::outcome::{LoadReport, Verification};
use std::io::{self, Write};
use std::time::Duration;

/// Characters of each statement shown in progress lines.
pub const PREVIEW_CHARS: usize = 50;

/// Something that happened during a load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Connecting { target: String },
    Connected,
    Executing {
        /// 1-based statement number.
        index: usize,
        total: usize,
        preview: String,
    },
    StatementSucceeded { index: usize, elapsed: Duration },
    StatementFailed { index: usize, reason: String },
    Verifying,
    Verified(Verification),
    Finished(LoadReport),
}

/// Receives progress events as a load advances.
pub trait ProgressSink {
    fn emit(&mut self, event: LoadEvent);
}

impl ProgressSink for Vec<LoadEvent> {
    fn emit(&mut self, event: LoadEvent) {
        self.push(event);
    }
}

/// Renders events as human-readable lines.
pub struct ConsoleProgress<W: Write> {
    out: W,
}

impl ConsoleProgress<io::Stdout> {
    /// Creates a renderer writing to stdout.
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consumes the renderer and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_event(&mut self, event: &LoadEvent) -> io::Result<()> {
        match event {
            LoadEvent::Connecting { target } => writeln!(self.out, "Connecting to {target}..."),
            LoadEvent::Connected => {
                writeln!(self.out, "✓ Connected successfully")?;
                writeln!(self.out, "Executing SQL script...")
            }
            LoadEvent::Executing {
                index,
                total,
                preview,
            } => writeln!(self.out, "Executing statement {index}/{total}: {preview}..."),
            LoadEvent::StatementSucceeded { elapsed, .. } => writeln!(
                self.out,
                "✓ Statement executed successfully ({} ms)",
                elapsed.as_millis()
            ),
            LoadEvent::StatementFailed { index, reason } => {
                writeln!(self.out, "⚠ Warning executing statement {index}: {reason}")
            }
            LoadEvent::Verifying => writeln!(self.out, "Verifying data load..."),
            LoadEvent::Verified(verification) => self.write_verification(verification),
            LoadEvent::Finished(report) => self.write_summary(report),
        }
    }

    fn write_verification(&mut self, verification: &Verification) -> io::Result<()> {
        match verification {
            Verification::Failed(reason) => {
                writeln!(self.out, "⚠ Warning during verification: {reason}")
            }
            Verification::Verified(result) => {
                writeln!(
                    self.out,
                    "✓ Data verification: {} rows loaded",
                    result.row_count
                )?;
                if result.is_empty() {
                    return writeln!(
                        self.out,
                        "⚠ Warning: Table is empty - data may not have loaded correctly"
                    );
                }
                if let Some(reason) = &result.sample_error {
                    return writeln!(self.out, "⚠ Warning: could not fetch sample rows: {reason}");
                }
                writeln!(self.out, "✓ Sample data:")?;
                for row in &result.sample {
                    let cells: Vec<String> = row.iter().map(|v| v.to_display_string()).collect();
                    writeln!(self.out, "  ({})", cells.join(", "))?;
                }
                Ok(())
            }
        }
    }

    fn write_summary(&mut self, report: &LoadReport) -> io::Result<()> {
        writeln!(
            self.out,
            "Statements: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        )?;
        if report.has_warnings() {
            writeln!(self.out, "⚠ Data load completed with warnings")
        } else {
            writeln!(self.out, "✓ Data load completed successfully!")
        }
    }
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
    fn emit(&mut self, event: LoadEvent) {
        if let Err(e) = self.write_event(&event).and_then(|_| self.out.flush()) {
            tracing::debug!("Failed to write progress output: {e}");
        }
    }
}
