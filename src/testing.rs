//! In-memory stand-in for a PostgreSQL server, used by unit tests.
//!
//! The fake keeps a tiny catalog (databases and roles), records every
//! statement with the database and user it ran under, and applies the
//! effect of `CREATE ROLE`, `CREATE USER` and `CREATE DATABASE` so repeated
//! provisioning runs observe their own earlier work.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::{ConnectParams, Connector, RowMap, Session};
use crate::ApiError;

// ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    pub database: String,
    pub user: String,
    pub sql: String,
}

#[derive(Debug, Default)]
pub struct Catalog {
    pub databases: BTreeSet<String>,
    pub roles: BTreeSet<String>,
    pub executed: Vec<Executed>,
    pub opened: Vec<ConnectParams>,
    pub closed: usize,
    /// Rows handed back by `fetch_rows`.
    pub rows: Vec<RowMap>,
    /// Any statement containing this text fails.
    pub fail_on: Option<String>,
    pub refuse_connections: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    catalog: Arc<Mutex<Catalog>>,
}

pub struct FakeSession {
    server: FakeServer,
    params: ConnectParams,
}

impl FakeServer {
    pub fn with_database(self, name: &str) -> Self {
        // ---
        self.catalog().databases.insert(name.to_string());
        self
    }

    pub fn with_role(self, name: &str) -> Self {
        // ---
        self.catalog().roles.insert(name.to_string());
        self
    }

    pub fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap()
    }

    /// Statement text only, in execution order.
    pub fn statements(&self) -> Vec<String> {
        // ---
        self.catalog()
            .executed
            .iter()
            .map(|e| e.sql.clone())
            .collect()
    }

    pub fn clear_log(&self) {
        // ---
        let mut catalog = self.catalog();
        catalog.executed.clear();
        catalog.opened.clear();
        catalog.closed = 0;
    }
}

impl Connector for FakeServer {
    type Session = FakeSession;

    async fn open(&self, params: &ConnectParams) -> Result<FakeSession, ApiError> {
        // ---
        let mut catalog = self.catalog();
        if catalog.refuse_connections {
            return Err(ApiError::Database(sqlx::Error::Protocol(
                "connection refused".to_string(),
            )));
        }
        catalog.opened.push(params.clone());
        Ok(FakeSession {
            server: self.clone(),
            params: params.clone(),
        })
    }
}

impl FakeSession {
    fn record(&self, sql: &str) -> Result<MutexGuard<'_, Catalog>, ApiError> {
        // ---
        let mut catalog = self.server.catalog();
        if let Some(fail) = &catalog.fail_on {
            if sql.contains(fail.as_str()) {
                return Err(ApiError::Database(sqlx::Error::Protocol(format!(
                    "statement failed: {}",
                    sql
                ))));
            }
        }
        catalog.executed.push(Executed {
            database: self.params.database.clone(),
            user: self.params.user.clone(),
            sql: sql.to_string(),
        });
        Ok(catalog)
    }
}

impl Session for FakeSession {
    async fn exists(&mut self, lookup: &'static str, name: &str) -> Result<bool, ApiError> {
        // ---
        let catalog = self.server.catalog();
        if lookup.contains("pg_database") {
            Ok(catalog.databases.contains(name))
        } else {
            Ok(catalog.roles.contains(name))
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<(), ApiError> {
        // ---
        let mut catalog = self.record(sql)?;
        for (prefix, is_database) in [
            ("CREATE ROLE ", false),
            ("CREATE USER ", false),
            ("CREATE DATABASE ", true),
        ] {
            if let Some(name) = sql.strip_prefix(prefix).and_then(leading_ident) {
                if is_database {
                    catalog.databases.insert(name);
                } else {
                    catalog.roles.insert(name);
                }
            }
        }
        Ok(())
    }

    async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<RowMap>, ApiError> {
        // ---
        let catalog = self.record(sql)?;
        Ok(catalog.rows.clone())
    }

    async fn close(self) {
        self.server.catalog().closed += 1;
    }
}

/// Unquote the identifier a statement starts with (`"a""b" ...` gives `a"b`).
fn leading_ident(rest: &str) -> Option<String> {
    // ---
    let mut chars = rest.strip_prefix('"')?.chars().peekable();
    let mut name = String::new();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                name.push('"');
            } else {
                return Some(name);
            }
        } else {
            name.push(c);
        }
    }
    None
}
