//! Statement execution and post-load verification on one session.

use super::outcome::{ExecutionOutcome, Verification, VerificationResult};
use super::progress::{LoadEvent, ProgressSink, PREVIEW_CHARS};
use crate::config::TargetConfig;
use crate::db::{DatabaseClient, Value};
use crate::script::Statement;
use tracing::{debug, warn};

/// Runs statements, in order, on a session it owns.
///
/// The session is released by [`ScriptRunner::close`].
pub struct ScriptRunner {
    db: Box<dyn DatabaseClient>,
}

impl ScriptRunner {
    pub fn new(db: Box<dyn DatabaseClient>) -> Self {
        Self { db }
    }

    /// Executes every statement, one at a time, and returns one outcome each.
    ///
    /// A failing statement is recorded and the next one still runs.
    pub async fn run(
        &self,
        statements: &[Statement],
        progress: &mut dyn ProgressSink,
    ) -> Vec<ExecutionOutcome> {
        let total = statements.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, statement) in statements.iter().enumerate() {
            let index = i + 1;
            progress.emit(LoadEvent::Executing {
                index,
                total,
                preview: statement.preview(PREVIEW_CHARS).to_string(),
            });
            debug!(index, total, sql = %statement, "Executing statement");

            match self.db.execute_query(statement.as_str()).await {
                Ok(result) => {
                    progress.emit(LoadEvent::StatementSucceeded {
                        index,
                        elapsed: result.execution_time,
                    });
                    outcomes.push(ExecutionOutcome::Succeeded);
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!(index, "Statement failed: {reason}");
                    progress.emit(LoadEvent::StatementFailed {
                        index,
                        reason: reason.clone(),
                    });
                    outcomes.push(ExecutionOutcome::Failed(reason));
                }
            }
        }

        outcomes
    }

    /// Counts the rows in the target table and fetches a small sample.
    ///
    /// Never fails: problems are reported inside the returned value.
    /// `target` must already be validated, since its names are interpolated.
    pub async fn verify(&self, target: &TargetConfig, sample_limit: usize) -> Verification {
        let count_sql = format!("SELECT COUNT(*) FROM {}", target.table);
        let count = match self.db.execute_query(&count_sql).await {
            Ok(result) => result.scalar().and_then(Value::as_count),
            Err(e) => {
                warn!("Verification count failed: {e}");
                return Verification::Failed(e.to_string());
            }
        };

        let Some(row_count) = count else {
            return Verification::Failed("Could not verify row count".to_string());
        };

        let mut result = VerificationResult {
            row_count,
            ..Default::default()
        };
        if row_count == 0 || sample_limit == 0 {
            return Verification::Verified(result);
        }

        let sample_sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            target.columns.join(", "),
            target.table,
            sample_limit
        );
        match self.db.execute_query(&sample_sql).await {
            Ok(sample) => {
                result.columns = sample.columns;
                result.sample = sample.rows;
                result.sample.truncate(sample_limit);
            }
            Err(e) => {
                warn!("Verification sample failed: {e}");
                result.sample_error = Some(e.to_string());
            }
        }

        Verification::Verified(result)
    }

    /// Releases the session. Errors are logged, not returned.
    pub async fn close(self) {
        if let Err(e) = self.db.close().await {
            warn!("Failed to close session cleanly: {e}");
        }
    }
}
