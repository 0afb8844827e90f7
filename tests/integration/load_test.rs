//! End-to-end load tests against the mock client.
//!
//! Covers the connect, execute, verify and close sequence.

use embucket_loader::config::TargetConfig;
use embucket_loader::db::{DatabaseClient, MockDatabaseClient, Value};
use embucket_loader::error::{LoaderError, Result};
use embucket_loader::loader::{
    load, ConsoleProgress, ExecutionOutcome, LoadEvent, LoadReport, Verification, VerifySettings,
};
use embucket_loader::script::{self, split, Statement};
use std::path::Path;

fn fixture_statements() -> Vec<Statement> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/load_events_data.sql");
    script::load(&path).unwrap()
}

async fn run_with(
    mock: MockDatabaseClient,
    statements: &[Statement],
    events: &mut Vec<LoadEvent>,
) -> Result<LoadReport> {
    let target = TargetConfig::default();
    load(
        || async move { Ok(Box::new(mock) as Box<dyn DatabaseClient>) },
        "mock",
        statements,
        VerifySettings {
            target: &target,
            sample_limit: 3,
        },
        events,
    )
    .await
}

#[tokio::test]
async fn test_fixture_loads_past_failing_statement() {
    let statements = fixture_statements();
    assert_eq!(statements.len(), 4);
    assert!(statements[0].as_str().starts_with("CREATE TABLE IF NOT EXISTS events ("));
    assert!(!statements[0].as_str().contains("identity"));
    assert!(!statements[3].as_str().ends_with(';'));

    let mock = MockDatabaseClient::new()
        .fail_when_contains("ALTER TABLE", "ALTER is not supported")
        .with_row_count(2)
        .with_sample(
            &["event_id", "event"],
            vec![
                vec![Value::from("e-1"), Value::from("page_view")],
                vec![Value::from("e-2"), Value::from("page_ping")],
            ],
        );
    let log = mock.log();
    let mut events = Vec::new();

    let report = run_with(mock, &statements, &mut events).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![
            ExecutionOutcome::Succeeded,
            ExecutionOutcome::Failed("Query error: ALTER is not supported".to_string()),
            ExecutionOutcome::Succeeded,
            ExecutionOutcome::Succeeded,
        ]
    );
    assert_eq!(report.verification.row_count(), Some(2));
    assert!(report.has_warnings());

    // Four statements, then the count and the sample.
    let executed = log.statements();
    assert_eq!(executed.len(), 6);
    assert_eq!(executed[4], "SELECT COUNT(*) FROM events");
    assert_eq!(log.close_calls(), 1);
}

#[tokio::test]
async fn test_second_of_five_fails() {
    let statements = split(
        "INSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);\nINSERT INTO t VALUES (3);\n\
         INSERT INTO t VALUES (4);\nINSERT INTO t VALUES (5);",
    );
    let mock = MockDatabaseClient::new()
        .fail_when_contains("(2)", "duplicate key")
        .with_row_count(4);
    let log = mock.log();

    let report = run_with(mock, &statements, &mut Vec::new()).await.unwrap();

    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failed(), 1);
    assert!(!report.outcomes[1].is_success());
    assert_eq!(log.statements().len(), 5 + 2);
}

#[tokio::test]
async fn test_connection_failure_is_fatal() {
    let statements = split("CREATE TABLE t (a int);\nINSERT INTO t VALUES (1);");
    let target = TargetConfig::default();
    let mut events: Vec<LoadEvent> = Vec::new();

    let result = load(
        || async { Err(LoaderError::connection("Cannot connect to localhost:3000")) },
        "localhost:3000",
        &statements,
        VerifySettings {
            target: &target,
            sample_limit: 3,
        },
        &mut events,
    )
    .await;

    assert!(matches!(result, Err(LoaderError::Connection(_))));
    assert_eq!(
        events,
        vec![LoadEvent::Connecting {
            target: "localhost:3000".to_string()
        }]
    );
}

#[tokio::test]
async fn test_empty_table_is_a_warning() {
    let statements = split("CREATE TABLE events (event_id TEXT);");
    let mock = MockDatabaseClient::new();
    let log = mock.log();

    let report = run_with(mock, &statements, &mut Vec::new()).await.unwrap();

    assert_eq!(report.failed(), 0);
    assert!(report.verification.is_empty());
    assert!(report.has_warnings());
    assert_eq!(log.statements().last().unwrap(), "SELECT COUNT(*) FROM events");
}

#[tokio::test]
async fn test_verification_failure_is_a_warning() {
    let statements = split("SET x = 1;");
    let mock = MockDatabaseClient::new().fail_verification("Table 'events' does not exist");
    let log = mock.log();

    let report = run_with(mock, &statements, &mut Vec::new()).await.unwrap();

    assert!(matches!(report.verification, Verification::Failed(_)));
    assert_eq!(log.close_calls(), 1);
}

#[tokio::test]
async fn test_session_closed_when_every_statement_fails() {
    let statements = split("BAD ONE;\nBAD TWO;");
    let mock = MockDatabaseClient::new().fail_when_contains("BAD", "syntax error");
    let log = mock.log();

    let report = run_with(mock, &statements, &mut Vec::new()).await.unwrap();

    assert_eq!(report.failed(), 2);
    assert_eq!(log.close_calls(), 1);
}

#[tokio::test]
async fn test_empty_script_still_verifies() {
    let mock = MockDatabaseClient::new().with_row_count(10);
    let report = run_with(mock, &split("-- nothing to do\n"), &mut Vec::new())
        .await
        .unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(report.verification.row_count(), Some(10));
}

#[tokio::test]
async fn test_console_output() {
    let statements = split("CREATE TABLE events (event_id TEXT);");
    let mock = MockDatabaseClient::new();
    let target = TargetConfig::default();
    let mut console = ConsoleProgress::new(Vec::new());

    load(
        || async move { Ok(Box::new(mock) as Box<dyn DatabaseClient>) },
        "embucket@localhost:3000",
        &statements,
        VerifySettings {
            target: &target,
            sample_limit: 3,
        },
        &mut console,
    )
    .await
    .unwrap();

    let output = String::from_utf8(console.into_inner()).unwrap();
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines[0], "Connecting to embucket@localhost:3000...");
    assert_eq!(lines[1], "✓ Connected successfully");
    assert_eq!(
        lines[3],
        "Executing statement 1/1: CREATE TABLE events (event_id TEXT);..."
    );
    assert!(output.contains("✓ Data verification: 0 rows loaded"));
    assert!(output.contains("Table is empty"));
    assert!(output.ends_with("⚠ Data load completed with warnings\n"));
}
