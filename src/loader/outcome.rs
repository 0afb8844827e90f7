//! Result types produced by a load.

use crate::db::{ColumnInfo, Row};

/// How a single statement ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    /// The server rejected the statement; the text is its error message.
    Failed(String),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Row count and sample read back from the target table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationResult {
    /// Rows in the target table.
    pub row_count: u64,

    /// Columns of the sample rows.
    pub columns: Vec<ColumnInfo>,

    /// At most `sample_limit` rows. Empty when the table is empty.
    pub sample: Vec<Row>,

    /// Set when the count succeeded but the sample query did not.
    pub sample_error: Option<String>,
}

impl VerificationResult {
    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}

/// Result of the post-load check.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// The count query answered.
    Verified(VerificationResult),
    /// The count query failed or returned something that is not a count.
    Failed(String),
}

impl Verification {
    /// Returns the row count, if the table could be counted.
    pub fn row_count(&self) -> Option<u64> {
        match self {
            Self::Verified(result) => Some(result.row_count),
            Self::Failed(_) => None,
        }
    }

    /// True when the table was counted and is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Verified(result) if result.is_empty())
    }

    /// Returns the warning an operator should see, if any.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Failed(reason) => Some(format!("Verification failed: {reason}")),
            Self::Verified(result) if result.is_empty() => {
                Some("Table is empty - data may not have loaded correctly".to_string())
            }
            Self::Verified(VerificationResult {
                sample_error: Some(reason),
                ..
            }) => Some(format!("Could not fetch sample rows: {reason}")),
            Self::Verified(_) => None,
        }
    }
}

/// Everything a finished load reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    /// One outcome per statement, in script order.
    pub outcomes: Vec<ExecutionOutcome>,

    pub verification: Verification,
}

impl LoadReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Returns `(1-based statement number, reason)` for each failure.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &str)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, outcome)| match outcome {
                ExecutionOutcome::Failed(reason) => Some((i + 1, reason.as_str())),
                ExecutionOutcome::Succeeded => None,
            })
    }

    /// True when any statement failed or verification raised a warning.
    pub fn has_warnings(&self) -> bool {
        self.failed() > 0 || self.verification.warning().is_some()
    }
}
