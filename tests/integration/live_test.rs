//! Live server tests.
//!
//! Skipped unless EMBUCKET_TEST_URL or DATABASE_URL is set.

use embucket_loader::config::{ConnectionConfig, TargetConfig};
use embucket_loader::db::{self, DatabaseClient};
use embucket_loader::loader::{load, LoadEvent, VerifySettings};
use embucket_loader::script::split;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(60);

fn config_from_env(var: &str) -> Option<ConnectionConfig> {
    let url = std::env::var(var).ok()?;
    ConnectionConfig::from_connection_string(&url).ok()
}

async fn roundtrip(config: ConnectionConfig, table: &str) {
    let script = format!(
        "-- scratch table for the loader tests\n\
         DROP TABLE IF EXISTS {table};\n\
         CREATE TABLE {table} (\n  event_id TEXT,\n  event TEXT\n);\n\
         THIS IS NOT SQL;\n\
         INSERT INTO {table} VALUES ('e-1', 'page_view'), ('e-2', 'page_ping');\n"
    );
    let statements = split(&script);
    let target = TargetConfig {
        table: table.to_string(),
        columns: vec!["event_id".to_string(), "event".to_string()],
    };
    let mut events: Vec<LoadEvent> = Vec::new();

    let report = load(
        || db::connect(&config, TIMEOUT),
        &config.display_string(),
        &statements,
        VerifySettings {
            target: &target,
            sample_limit: 3,
        },
        &mut events,
    )
    .await
    .unwrap();

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.failed(), 1);
    assert!(!report.outcomes[2].is_success());
    assert_eq!(report.verification.row_count(), Some(2));

    let cleanup = db::connect(&config, TIMEOUT).await.unwrap();
    let _ = cleanup
        .execute_query(&format!("DROP TABLE IF EXISTS {table}"))
        .await;
    cleanup.close().await.unwrap();
}

#[tokio::test]
async fn test_embucket_roundtrip() {
    let Some(config) = config_from_env("EMBUCKET_TEST_URL") else {
        eprintln!("Skipping test: EMBUCKET_TEST_URL not set");
        return;
    };
    roundtrip(config, "loader_it_events").await;
}

#[tokio::test]
async fn test_postgres_roundtrip() {
    let Some(config) = config_from_env("DATABASE_URL") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    roundtrip(config, "loader_it_events").await;
}

#[tokio::test]
async fn test_embucket_bad_credentials() {
    let Some(mut config) = config_from_env("EMBUCKET_TEST_URL") else {
        eprintln!("Skipping test: EMBUCKET_TEST_URL not set");
        return;
    };
    config.password = Some("definitely-wrong".to_string());

    let result = db::connect(&config, TIMEOUT).await;
    assert!(result.is_err());
}
