//! SQLite connection boundary
//!
//! [`Database`] owns a single SQLite connection behind a mutex. Every
//! statement issued by this crate runs while holding that lock, and
//! multi-statement operations (an insert and its identity read-back, a whole
//! reconciliation) hold it for their full duration via
//! [`Database::with_connection`].
//!
//! The connection runs in autocommit mode, so each statement commits on its
//! own.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::error::{MapperError, MapperResult};
use crate::reconcile::LiveColumn;
use crate::schema::quote_ident;
use crate::value::Value;

/// A shared handle to one SQLite connection
///
/// Cloning is cheap and every clone uses the same connection and lock.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> MapperResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| MapperError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        debug!("Opened database at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> MapperResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: None,
        })
    }

    /// Path of the database file, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the connection for every handle sharing it
    ///
    /// Closing twice is a no-op. If SQLite refuses to close, the connection
    /// stays open and usable and the error is returned.
    pub fn close(&self) -> MapperResult<()> {
        let mut guard = self.conn.lock().map_err(|_| MapperError::LockPoisoned)?;
        if let Some(conn) = guard.take() {
            restore_on_failure(&mut guard, conn.close())?;
            debug!("Closed database {:?}", self.path);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }

    /// Run `f` with exclusive access to the connection
    ///
    /// The lock is not re-entrant: `f` must use the connection it is given
    /// and never call back into this `Database`.
    pub fn with_connection<T, F>(&self, f: F) -> MapperResult<T>
    where
        F: FnOnce(&Connection) -> MapperResult<T>,
    {
        let guard = self.conn.lock().map_err(|_| MapperError::LockPoisoned)?;
        let conn = guard.as_ref().ok_or(MapperError::ConnectionClosed)?;
        f(conn)
    }

    /// Execute one statement and collect every result row
    pub fn execute(&self, sql: &str, params: &[Value]) -> MapperResult<Vec<Row>> {
        self.with_connection(|conn| run(conn, sql, params))
    }

    /// Check whether a table with this name exists
    pub fn table_exists(&self, table: &str) -> MapperResult<bool> {
        self.with_connection(|conn| table_exists(conn, table))
    }

    /// Introspect the columns of an existing table
    pub fn table_columns(&self, table: &str) -> MapperResult<Vec<LiveColumn>> {
        self.with_connection(|conn| table_columns(conn, table))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never lock here: this may be formatted while the lock is held
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

/// One result row, indexable by position or column name
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(column, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Put the connection back into `slot` when closing it failed
fn restore_on_failure(
    slot: &mut Option<Connection>,
    closed: Result<(), (Connection, rusqlite::Error)>,
) -> MapperResult<()> {
    closed.map_err(|(conn, e)| {
        *slot = Some(conn);
        MapperError::Database(e)
    })
}

/// Execute `sql` on an already locked connection
pub(crate) fn run(conn: &Connection, sql: &str, params: &[Value]) -> MapperResult<Vec<Row>> {
    debug!(params = params.len(), "SQL: {}", sql);

    let mut stmt = conn.prepare(sql)?;
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        result.push(Row {
            columns: Arc::clone(&columns),
            values,
        });
    }

    Ok(result)
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> MapperResult<bool> {
    let rows = run(
        conn,
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        &[Value::from(table)],
    )?;
    let count = rows
        .first()
        .and_then(|row| row.get(0))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    Ok(count > 0)
}

/// Read `PRAGMA table_info` for `table`
///
/// Declared types are normalized to uppercase; defaults are the SQL text
/// SQLite recorded for the column, or `None`.
pub(crate) fn table_columns(conn: &Connection, table: &str) -> MapperResult<Vec<LiveColumn>> {
    let rows = run(conn, &format!("PRAGMA table_info({})", quote_ident(table)), &[])?;

    let columns = rows
        .iter()
        .map(|row| LiveColumn {
            name: row
                .get_by_name("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            sql_type: row
                .get_by_name("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_uppercase(),
            default: row
                .get_by_name("dflt_value")
                .and_then(Value::as_str)
                .map(String::from),
            primary_key: row
                .get_by_name("pk")
                .and_then(Value::as_i64)
                .is_some_and(|pk| pk > 0),
        })
        .collect();

    Ok(columns)
}
