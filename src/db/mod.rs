//! Database abstraction layer for the loader.
//!
//! Provides a trait-based interface for database sessions, allowing
//! the Embucket REST protocol, PostgreSQL and the in-memory mock to be
//! used interchangeably by the script runner.

mod embucket;
mod mock;
mod postgres;
mod types;

pub use embucket::EmbucketClient;
pub use mock::{MockDatabaseClient, QueryLog};
pub use postgres::PostgresClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Embucket, spoken to over the Snowflake-compatible REST API.
    #[default]
    Embucket,
    Postgres,
}

impl DatabaseBackend {
    /// Returns the backend as a string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embucket => "embucket",
            Self::Postgres => "postgres",
        }
    }

    /// Parses a backend from a string or URL scheme.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "embucket" | "snowflake" => Some(Self::Embucket),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Embucket => 3000,
            Self::Postgres => 5432,
        }
    }
}

/// Opens one session for the given backend and configuration.
///
/// This is the central factory function for database connections.
pub async fn connect(
    config: &ConnectionConfig,
    query_timeout: Duration,
) -> Result<Box<dyn DatabaseClient>> {
    match config.backend() {
        DatabaseBackend::Embucket => {
            let client = EmbucketClient::connect(config, query_timeout).await?;
            Ok(Box::new(client))
        }
        DatabaseBackend::Postgres => {
            let client = PostgresClient::connect(config, query_timeout).await?;
            Ok(Box::new(client))
        }
    }
}

/// One authenticated database session.
///
/// Statements sent through the same client run on the same session, in
/// the order they are awaited.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes a SQL statement and returns any rows it produced.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Ends the session. Further queries fail.
    async fn close(&self) -> Result<()>;
}
