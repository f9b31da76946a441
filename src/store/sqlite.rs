//! SQLite implementation of [`CorrelationStore`].
//!
//! Records survive restarts. The table name is configurable so several
//! bridges can share one database file.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE <table> (
//!     repo       TEXT    NOT NULL,
//!     issue_id   INTEGER NOT NULL,
//!     ticket_id  TEXT    NOT NULL,
//!     created_at TEXT    NOT NULL,
//!     PRIMARY KEY (repo, issue_id)
//! );
//! ```
//!
//! Ticket IDs are stored as text and parsed back on read.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{CorrelationStore, PutOutcome, StoreError};
use crate::types::{CorrelationKey, TicketId};

/// SQLite-backed correlation store.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: Arc<str>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures `table` exists.
    ///
    /// `path` may be `:memory:`. The table name must be a plain SQL identifier
    /// (`[A-Za-z_][A-Za-z0-9_]*`) since it is interpolated into statements.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;

        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| StoreError::unavailable("open", e))?;

        conn.execute_batch("PRAGMA busy_timeout = 5000;")
            .map_err(|e| StoreError::unavailable("configure pragmas", e))?;

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                repo TEXT NOT NULL,
                issue_id INTEGER NOT NULL,
                ticket_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (repo, issue_id)
            );
            "#
        ))
        .map_err(|e| StoreError::unavailable("create table", e))?;

        debug!(path = %path.display(), table, "Opened correlation store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: Arc::from(table),
        })
    }

    /// Opens a private in-memory database.
    pub fn in_memory(table: &str) -> Result<Self, StoreError> {
        Self::open(":memory:", table)
    }

    async fn run_blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = Arc::clone(&self.table);

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::unavailable(operation, "connection lock poisoned"))?;
            f(&conn, &table)
        })
        .await
        .map_err(|e| StoreError::unavailable(operation, e))?
    }
}

impl CorrelationStore for SqliteStore {
    async fn get(&self, key: &CorrelationKey) -> Result<Option<TicketId>, StoreError> {
        let key = key.clone();
        self.run_blocking("get", move |conn, table| select_ticket(conn, table, &key))
            .await
    }

    async fn put(&self, key: &CorrelationKey, ticket: TicketId) -> Result<PutOutcome, StoreError> {
        let key = key.clone();
        self.run_blocking("put", move |conn, table| {
            let issue_id = issue_id_param(&key, "put")?;
            let inserted = conn
                .execute(
                    &format!(
                        "INSERT INTO {table} (repo, issue_id, ticket_id, created_at)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(repo, issue_id) DO NOTHING"
                    ),
                    params![
                        key.repo,
                        issue_id,
                        ticket.to_string(),
                        Utc::now().to_rfc3339()
                    ],
                )
                .map_err(|e| StoreError::unavailable("put", e))?;

            if inserted == 1 {
                return Ok(PutOutcome::Inserted);
            }

            // Lost to an existing record; report whose ticket it holds.
            match select_ticket(conn, table, &key)? {
                Some(existing) => Ok(PutOutcome::Existing(existing)),
                None => Err(StoreError::unavailable(
                    "put",
                    format!("insert for {key} was ignored but no record exists"),
                )),
            }
        })
        .await
    }
}

fn select_ticket(
    conn: &Connection,
    table: &str,
    key: &CorrelationKey,
) -> Result<Option<TicketId>, StoreError> {
    let issue_id = issue_id_param(key, "get")?;
    let stored: Option<String> = conn
        .query_row(
            &format!("SELECT ticket_id FROM {table} WHERE repo = ?1 AND issue_id = ?2"),
            params![key.repo, issue_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::unavailable("get", e))?;

    stored
        .map(|value| {
            value.parse().map_err(|_| StoreError::InvalidRecord {
                key: key.clone(),
                value,
            })
        })
        .transpose()
}

// SQLite integers are signed 64-bit.
fn issue_id_param(key: &CorrelationKey, operation: &'static str) -> Result<i64, StoreError> {
    i64::try_from(key.issue.0)
        .map_err(|_| StoreError::unavailable(operation, format!("issue id {} out of range", key.issue)))
}

fn validate_table_name(table: &str) -> Result<(), StoreError> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(StoreError::unavailable(
            "open",
            format!("invalid table name {table:?}"),
        ))
    }
}
