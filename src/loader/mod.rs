//! Script loading: connect, execute every statement, verify, disconnect.
//!
//! Only a failed connection ends a load early. Statement failures and
//! verification problems are carried in the [`LoadReport`].

mod outcome;
mod progress;
mod runner;

pub use outcome::{ExecutionOutcome, LoadReport, Verification, VerificationResult};
pub use progress::{ConsoleProgress, LoadEvent, ProgressSink, PREVIEW_CHARS};
pub use runner::ScriptRunner;

use crate::config::TargetConfig;
use crate::db::DatabaseClient;
use crate::error::Result;
use crate::script::Statement;
use std::future::Future;
use tracing::{error, info};

/// What to verify once the statements have run.
#[derive(Debug, Clone)]
pub struct VerifySettings<'a> {
    pub target: &'a TargetConfig,
    pub sample_limit: usize,
}

/// Runs a whole load against the session returned by `connect`.
///
/// Returns `Err` only when `connect` fails, in which case no statement is
/// sent. Otherwise the session is closed before returning, whatever the
/// statements did.
pub async fn load<C, Fut>(
    connect: C,
    target_name: &str,
    statements: &[Statement],
    verify: VerifySettings<'_>,
    progress: &mut dyn ProgressSink,
) -> Result<LoadReport>
where
    C: FnOnce() -> Fut,
    Fut: Future<Output = Result<Box<dyn DatabaseClient>>>,
{
    progress.emit(LoadEvent::Connecting {
        target: target_name.to_string(),
    });

    let db = connect().await.map_err(|e| {
        error!("Cannot open session: {e}");
        e
    })?;
    progress.emit(LoadEvent::Connected);
    info!(statements = statements.len(), "Session open");

    let runner = ScriptRunner::new(db);
    let outcomes = runner.run(statements, progress).await;

    progress.emit(LoadEvent::Verifying);
    let verification = runner.verify(verify.target, verify.sample_limit).await;
    progress.emit(LoadEvent::Verified(verification.clone()));

    runner.close().await;

    let report = LoadReport {
        outcomes,
        verification,
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        rows = ?report.verification.row_count(),
        "Load finished"
    );
    progress.emit(LoadEvent::Finished(report.clone()));

    Ok(report)
}
