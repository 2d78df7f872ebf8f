//! Per-request PostgreSQL connections.
//!
//! Nothing here is pooled: every operation opens a [`Session`] through a
//! [`Connector`], runs its statements one at a time and closes the session
//! before returning. The traits are the seam between the provisioning logic
//! and `sqlx`, which lets the sequence be exercised without a server.

use std::{fmt, future::Future, str::FromStr};

use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column, ConnectOptions, Connection, Row, ValueRef};

use crate::{ApiError, ConnectionTarget};

// ---

const APPLICATION_NAME: &str = "psql-management";

/// TLS negotiation mode, spelled the way callers send it ("Prefer", "VerifyFull", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl FromStr for SslMode {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "disable" => Ok(SslMode::Disable),
            "allow" => Ok(SslMode::Allow),
            "" | "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verifyca" => Ok(SslMode::VerifyCa),
            "verifyfull" => Ok(SslMode::VerifyFull),
            _ => Err(ApiError::Validation(format!(
                "SslMode '{}' is not supported.",
                s
            ))),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let name = match self {
            SslMode::Disable => "Disable",
            SslMode::Allow => "Allow",
            SslMode::Prefer => "Prefer",
            SslMode::Require => "Require",
            SslMode::VerifyCa => "VerifyCA",
            SslMode::VerifyFull => "VerifyFull",
        };
        f.write_str(name)
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        // ---
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Everything needed to open one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    // ---
    pub host: String,
    pub port: u16,
    pub ssl_mode: SslMode,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectParams {
    /// Parameters for the target database under the caller's credentials.
    pub fn from_target(target: &ConnectionTarget) -> Result<Self, ApiError> {
        // ---
        Ok(ConnectParams {
            host: target.host.clone(),
            port: target.port,
            ssl_mode: target.ssl_mode.parse()?,
            database: target.database_name.clone(),
            user: target.user.clone(),
            password: target.password.clone(),
        })
    }

    pub fn with_database(mut self, database: &str) -> Self {
        // ---
        self.database = database.to_string();
        self
    }

    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        // ---
        self.user = user.to_string();
        self.password = password.to_string();
        self
    }

    #[cfg(test)]
    pub fn connection_string(&self) -> String {
        self.render(&self.password)
    }

    /// Connection string with the password masked, for logs.
    pub fn redacted(&self) -> String {
        self.render("****")
    }

    fn render(&self, password: &str) -> String {
        // ---
        format!(
            "Server={};Database={};Port={};User Id={};Password={};Ssl Mode={};Pooling=false;",
            self.host, self.database, self.port, self.user, password, self.ssl_mode
        )
    }
}

/// One result row: column names in result-set order, every value as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowMap(pub Vec<(String, String)>);

impl RowMap {
    fn from_pg_row(row: &PgRow) -> Result<Self, ApiError> {
        // ---
        let mut cells = Vec::with_capacity(row.len());
        for (i, column) in row.columns().iter().enumerate() {
            let raw = row.try_get_raw(i)?;
            let bytes = if raw.is_null() {
                None
            } else {
                Some(raw.as_bytes().map_err(sqlx::Error::Decode)?)
            };
            cells.push((column.name(), bytes));
        }
        Self::from_cells(cells)
    }

    /// Assemble a row from `(column, raw text)` pairs. NULL becomes `""`,
    /// invalid UTF-8 is replaced, a repeated column name is an error.
    pub fn from_cells<'a, I>(cells: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a [u8]>)>,
    {
        // ---
        let mut row: Vec<(String, String)> = Vec::new();
        for (name, bytes) in cells {
            if row.iter().any(|(existing, _)| existing == name) {
                return Err(ApiError::DuplicateColumn(name.to_string()));
            }
            let value = bytes
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            row.push((name.to_string(), value));
        }
        Ok(RowMap(row))
    }
}

impl Serialize for RowMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // ---
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Opens sessions. Cloned into the router state.
pub trait Connector: Clone + Send + Sync + 'static {
    type Session: Session;

    fn open(
        &self,
        params: &ConnectParams,
    ) -> impl Future<Output = Result<Self::Session, ApiError>> + Send;
}

/// A single open connection. Statements run sequentially and are committed
/// as they complete.
pub trait Session: Send {
    /// Run a one-parameter `SELECT EXISTS(...)` lookup.
    fn exists(
        &mut self,
        lookup: &'static str,
        name: &str,
    ) -> impl Future<Output = Result<bool, ApiError>> + Send;

    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn fetch_rows(&mut self, sql: &str)
        -> impl Future<Output = Result<Vec<RowMap>, ApiError>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

/// Driver options built from the request alone; `~/.pgpass` is never consulted.
fn connect_options(params: &ConnectParams) -> PgConnectOptions {
    // ---
    // Statement logging stays off: role DDL carries passwords.
    PgConnectOptions::new_without_pgpass()
        .host(&params.host)
        .port(params.port)
        .database(&params.database)
        .username(&params.user)
        .password(&params.password)
        .ssl_mode(params.ssl_mode.into())
        .application_name(APPLICATION_NAME)
        .disable_statement_logging()
}

pub struct PgSession {
    conn: PgConnection,
}

impl Connector for PgConnector {
    type Session = PgSession;

    async fn open(&self, params: &ConnectParams) -> Result<PgSession, ApiError> {
        // ---
        tracing::debug!("Opening connection: {}", params.redacted());

        let conn = connect_options(params).connect().await?;
        Ok(PgSession { conn })
    }
}

impl Session for PgSession {
    async fn exists(&mut self, lookup: &'static str, name: &str) -> Result<bool, ApiError> {
        // ---
        let found: bool = sqlx::query_scalar(lookup)
            .bind(name)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(found)
    }

    async fn execute(&mut self, sql: &str) -> Result<(), ApiError> {
        // ---
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    /// Uses the simple-query protocol, so every column arrives as text.
    async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<RowMap>, ApiError> {
        // ---
        let rows = sqlx::Executor::fetch_all(&mut self.conn, sqlx::raw_sql(sql)).await?;
        rows.iter().map(RowMap::from_pg_row).collect()
    }

    async fn close(self) {
        // ---
        if let Err(e) = self.conn.close().await {
            tracing::debug!("Connection did not close cleanly: {}", e);
        }
    }
}
