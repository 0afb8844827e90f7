//! Embucket database client.
//!
//! Embucket exposes the Snowflake REST protocol: a login request returns a
//! session token, statements are posted one at a time with that token, and
//! the session is deleted on close. Result cells arrive as JSON, mostly as
//! strings.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{LoaderError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

const CLIENT_APP_ID: &str = "embucket-loader";

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    data: LoginData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    account_name: &'a str,
    login_name: &'a str,
    password: &'a str,
    client_app_id: &'a str,
    client_app_version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct LoginResponseData {
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponseData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type", default)]
    data_type: String,
}

/// Envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl ApiResponse {
    /// Returns the payload, or the server's message when `success` is false.
    fn into_data<T: DeserializeOwned + Default>(self) -> std::result::Result<T, String> {
        if !self.success {
            let message = self
                .message
                .unwrap_or_else(|| "request was not successful".to_string());
            return Err(match self.code {
                Some(code) => format!("{message} (code {code})"),
                None => message,
            });
        }
        match self.data {
            None | Some(serde_json::Value::Null) => Ok(T::default()),
            Some(data) => {
                serde_json::from_value(data).map_err(|e| format!("Malformed response: {e}"))
            }
        }
    }
}

#[derive(Debug)]
struct Session {
    token: String,
    sequence_id: u64,
}

/// Client for one Embucket session.
#[derive(Debug)]
pub struct EmbucketClient {
    http: reqwest::Client,
    base_url: Url,
    session: Mutex<Option<Session>>,
}

impl EmbucketClient {
    /// Logs in and returns a client bound to the new session.
    pub async fn connect(config: &ConnectionConfig, query_timeout: Duration) -> Result<Self> {
        let base_url = config.base_url()?;
        let http = reqwest::Client::builder()
            .timeout(query_timeout)
            .build()
            .map_err(|e| LoaderError::internal(format!("Cannot build HTTP client: {e}")))?;

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        let token = loop {
            debug!("Login attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            match login(&http, &base_url, config).await {
                Ok(token) => break token,
                Err(LoginError::Transport(e))
                    if attempt < MAX_RETRY_ATTEMPTS && (e.is_connect() || e.is_timeout()) =>
                {
                    warn!(
                        "Login attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e.into_connection_error(config)),
            }
        };

        debug!("Session established with {}", base_url);

        Ok(Self {
            http,
            base_url,
            session: Mutex::new(Some(Session {
                token,
                sequence_id: 0,
            })),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| LoaderError::internal(format!("Invalid endpoint '{path}': {e}")))
    }
}

#[async_trait]
impl DatabaseClient for EmbucketClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        // Held for the whole request so statements never overlap.
        let mut guard = self.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| LoaderError::connection("Session is closed"))?;
        session.sequence_id += 1;

        let mut url = self.endpoint("queries/v1/query-request")?;
        url.query_pairs_mut()
            .append_pair("requestId", &uuid::Uuid::new_v4().to_string());

        let body = QueryRequest {
            sql_text: sql,
            async_exec: false,
            sequence_id: session.sequence_id,
        };

        let start = Instant::now();
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth_header(&session.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LoaderError::query(describe_transport_error(&e)))?;

        let data: QueryResponseData = read_envelope(response)
            .await
            .map_err(LoaderError::query)?
            .into_data()
            .map_err(LoaderError::query)?;

        Ok(into_query_result(data).with_execution_time(start.elapsed()))
    }

    async fn close(&self) -> Result<()> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };

        let mut url = self.endpoint("session")?;
        url.query_pairs_mut().append_pair("delete", "true");

        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth_header(&session.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| LoaderError::connection(describe_transport_error(&e)))?;

        if !response.status().is_success() {
            return Err(LoaderError::connection(format!(
                "Session delete returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

enum LoginError {
    Transport(reqwest::Error),
    Rejected(String),
}

impl LoginError {
    fn into_connection_error(self, config: &ConnectionConfig) -> LoaderError {
        match self {
            Self::Transport(e) if e.is_connect() => LoaderError::connection(format!(
                "Cannot connect to {}:{}. Check that the server is running.",
                config.host(),
                config.port()
            )),
            Self::Transport(e) if e.is_timeout() => LoaderError::connection(format!(
                "Connection to {}:{} timed out. The server may be overloaded or unreachable.",
                config.host(),
                config.port()
            )),
            Self::Transport(e) => LoaderError::connection(describe_transport_error(&e)),
            Self::Rejected(message) => LoaderError::connection(format!(
                "Login failed for user '{}': {message}",
                config.user()
            )),
        }
    }
}

async fn login(
    http: &reqwest::Client,
    base_url: &Url,
    config: &ConnectionConfig,
) -> std::result::Result<String, LoginError> {
    let mut url = base_url
        .join("session/v1/login-request")
        .map_err(|e| LoginError::Rejected(format!("Invalid login endpoint: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("databaseName", config.database())
            .append_pair("schemaName", config.schema());
        if let Some(warehouse) = config.warehouse() {
            query.append_pair("warehouse", warehouse);
        }
    }

    let body = LoginRequest {
        data: LoginData {
            account_name: config.account(),
            login_name: config.user(),
            password: config.password(),
            client_app_id: CLIENT_APP_ID,
            client_app_version: env!("CARGO_PKG_VERSION"),
        },
    };

    let response = http
        .post(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(&body)
        .send()
        .await
        .map_err(LoginError::Transport)?;

    let data: LoginResponseData = read_envelope(response)
        .await
        .map_err(LoginError::Rejected)?
        .into_data()
        .map_err(LoginError::Rejected)?;

    if data.token.is_empty() {
        return Err(LoginError::Rejected("no session token returned".to_string()));
    }
    Ok(data.token)
}

/// Reads the JSON envelope, falling back to the HTTP status for non-JSON bodies.
async fn read_envelope(response: reqwest::Response) -> std::result::Result<ApiResponse, String> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| describe_transport_error(&e))?;

    match serde_json::from_str::<ApiResponse>(&text) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => Err(format!("HTTP {status}: {}", text.trim())),
        Err(e) => Err(format!("Malformed response: {e}")),
    }
}

fn auth_header(token: &str) -> String {
    format!("Snowflake Token=\"{token}\"")
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timed out".to_string()
    } else {
        error.to_string()
    }
}

fn into_query_result(data: QueryResponseData) -> QueryResult {
    let columns = data
        .rowtype
        .into_iter()
        .map(|t| ColumnInfo::new(t.name, t.data_type))
        .collect();
    let rows: Vec<Row> = data
        .rowset
        .into_iter()
        .map(|row| row.into_iter().map(convert_cell).collect())
        .collect();

    QueryResult::with_data(columns, rows)
}

fn convert_cell(cell: serde_json::Value) -> Value {
    match cell {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}
