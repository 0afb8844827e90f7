//! SQL script splitting.
//!
//! Splits a script into statements on lines ending with `;`. Full-line `--`
//! comments and blank lines are dropped wherever they appear. String
//! literals and block comments are not understood; a `;` inside them that
//! ends a line still ends the statement.

use crate::error::{LoaderError, Result};
use std::fmt;
use std::path::Path;

const LINE_COMMENT: &str = "--";
const TERMINATOR: char = ';';

/// One complete SQL statement, trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement(String);

impl Statement {
    /// Returns the statement text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns at most `max_chars` characters of the statement.
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.0.char_indices().nth(max_chars) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Splits script text into statements, preserving order.
///
/// Never fails. A final statement without `;` is still returned.
pub fn split(script: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(LINE_COMMENT) {
            continue;
        }

        current.push_str(line);
        current.push(' ');

        if line.ends_with(TERMINATOR) {
            push_statement(&mut statements, &current);
            current.clear();
        }
    }

    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<Statement>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        statements.push(Statement(text.to_string()));
    }
}

/// Reads and splits a script file.
pub fn load(path: &Path) -> Result<Vec<Statement>> {
    if !path.is_file() {
        return Err(LoaderError::input(format!(
            "{} not found",
            path.display()
        )));
    }

    let text = std::fs::read_to_string(path).map_err(|e| {
        LoaderError::input(format!("Failed to read {}: {e}", path.display()))
    })?;

    Ok(split(&text))
}
