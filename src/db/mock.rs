//! Mock database client for testing.
//!
//! Records every statement it receives and answers the verification
//! queries from preset values, so the runner can be exercised without a
//! server.

use super::{ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{LoaderError, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct LogState {
    statements: Vec<String>,
    close_calls: usize,
}

/// Shared view of what a mock client was asked to do.
///
/// Clones observe the same log, so a test can keep one after handing the
/// client to the runner.
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    inner: Arc<Mutex<LogState>>,
}

impl QueryLog {
    /// Returns every statement received, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Returns how many times `close` was called.
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        // A poisoned log only means another test thread panicked mid-push.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A mock database client that returns predefined results.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    log: QueryLog,
    failures: Vec<(String, String)>,
    row_count: u64,
    count_value: Option<Value>,
    sample_columns: Vec<ColumnInfo>,
    sample_rows: Vec<Row>,
    verification_error: Option<String>,
}

impl MockDatabaseClient {
    /// Creates a mock whose target table is empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value returned by `SELECT COUNT(*)`.
    pub fn with_row_count(mut self, count: u64) -> Self {
        self.row_count = count;
        self
    }

    /// Answers `SELECT COUNT(*)` with `value` instead of a number.
    pub fn with_count_value(mut self, value: Value) -> Self {
        self.count_value = Some(value);
        self
    }

    /// Sets the rows returned by the sample query.
    pub fn with_sample(mut self, columns: &[&str], rows: Vec<Row>) -> Self {
        self.sample_columns = columns
            .iter()
            .map(|name| ColumnInfo::new(*name, "text"))
            .collect();
        self.sample_rows = rows;
        self
    }

    /// Fails any statement containing `pattern` with `message`.
    pub fn fail_when_contains(mut self, pattern: &str, message: &str) -> Self {
        self.failures.push((pattern.to_string(), message.to_string()));
        self
    }

    /// Fails every `SELECT` against the target table.
    pub fn fail_verification(mut self, message: &str) -> Self {
        self.verification_error = Some(message.to_string());
        self
    }

    /// Returns a handle on the statement log.
    pub fn log(&self) -> QueryLog {
        self.log.clone()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        {
            let mut log = self.log.lock();
            if log.close_calls > 0 {
                return Err(LoaderError::connection("Session is closed"));
            }
            log.statements.push(sql.to_string());
        }

        if let Some((_, message)) = self.failures.iter().find(|(p, _)| sql.contains(p.as_str())) {
            return Err(LoaderError::query(message.clone()));
        }

        let sql_upper = sql.trim_start().to_uppercase();

        if sql_upper.starts_with("SELECT") {
            if let Some(message) = &self.verification_error {
                return Err(LoaderError::query(message.clone()));
            }

            let result = if sql_upper.starts_with("SELECT COUNT(") {
                QueryResult::with_data(
                    vec![ColumnInfo::new("count", "int8")],
                    vec![vec![self
                        .count_value
                        .clone()
                        .unwrap_or(Value::Int(self.row_count as i64))]],
                )
            } else {
                QueryResult::with_data(self.sample_columns.clone(), self.sample_rows.clone())
            };
            return Ok(result.with_execution_time(Duration::from_millis(1)));
        }

        Ok(QueryResult::new().with_execution_time(Duration::from_millis(1)))
    }

    async fn close(&self) -> Result<()> {
        self.log.lock().close_calls += 1;
        Ok(())
    }
}
