//! SQLite database backend implementation
//!
//! This module opens connections, runs single statements against a
//! `rusqlite::Connection`, and provides the synchronous [`Driver`].

use crate::core::{
    config::DatabaseConfig,
    driver::{Completion, Driver, DriverRequest, Job},
    error::{DatabaseError, Result},
    execution_mode::ExecutionMode,
    result_set::RawResult,
    value::SqlValue,
};
use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Row, ToSql};

/// Open a connection as described by `config`
///
/// # Errors
///
/// Returns a connection error if the file cannot be opened or a pragma fails.
pub fn open_connection(config: &DatabaseConfig) -> Result<Connection> {
    let opened = if config.is_in_memory() {
        Connection::open_in_memory()
    } else {
        Connection::open(&config.name)
    };
    let conn = opened.map_err(|e| {
        DatabaseError::connection(format!("failed to open '{}': {}", config.name, e))
    })?;

    if config.foreign_keys {
        conn.execute("PRAGMA foreign_keys = ON", []).map_err(|e| {
            DatabaseError::connection(format!("failed to enable foreign keys: {}", e))
        })?;
    }

    if let Some(mode) = &config.journal_mode {
        // journal_mode answers with the mode actually in effect
        conn.pragma_update_and_check(None, "journal_mode", mode, |_| Ok(()))
            .map_err(|e| {
                DatabaseError::connection(format!("failed to set journal mode {}: {}", mode, e))
            })?;
    }

    Ok(conn)
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Convert a rusqlite Row to positional values
fn row_values(row: &Row<'_>, width: usize) -> rusqlite::Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(width);

    for i in 0..width {
        let value = match row.get_ref(i)? {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::Integer(v),
            ValueRef::Real(v) => SqlValue::Real(v),
            // Text the engine holds as invalid UTF-8 is handed back untouched
            ValueRef::Text(v) => match std::str::from_utf8(v) {
                Ok(text) => SqlValue::Text(text.to_string()),
                Err(_) => SqlValue::Blob(v.to_vec()),
            },
            ValueRef::Blob(v) => SqlValue::Blob(v.to_vec()),
        };
        values.push(value);
    }

    Ok(values)
}

/// Run one statement and collect everything the result set needs
///
/// `rows_affected` and `insert_id` are only reported when the connection's
/// total change count moved; the per-statement counters otherwise keep the
/// values of an earlier statement. `insert_id` also requires a new rowid.
pub(crate) fn run_statement(conn: &Connection, request: &DriverRequest) -> Result<RawResult> {
    let mut stmt = conn.prepare(&request.sql)?;

    if request.read_only && !stmt.readonly() {
        return Err(DatabaseError::read_only(request.sql.clone()));
    }

    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();
    let rowid_before = conn.last_insert_rowid();
    let total_before = conn.total_changes();

    let mut rows = Vec::new();
    {
        let mut cursor = stmt.query(params_from_iter(request.params.iter()))?;
        while let Some(row) = cursor.next()? {
            rows.push(row_values(row, width)?);
        }
    }

    let (rows_affected, insert_id) = if conn.total_changes() != total_before {
        let rowid_after = conn.last_insert_rowid();
        (conn.changes(), (rowid_after != rowid_before).then_some(rowid_after))
    } else {
        (0, None)
    };

    Ok(RawResult {
        columns,
        rows,
        rows_affected,
        insert_id,
    })
}

/// Synchronous SQLite driver
///
/// Statements run on the calling thread and complete before
/// [`Driver::execute`] returns.
pub struct SqliteDriver {
    connection: Mutex<Connection>,
}

impl SqliteDriver {
    /// Wrap an open connection
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Mutex::new(connection),
        }
    }

    /// Open a connection as described by `config`
    ///
    /// # Errors
    ///
    /// Returns a connection error if the database cannot be opened.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(open_connection(config)?))
    }
}

impl Driver for SqliteDriver {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Immediate
    }

    fn execute(&self, request: DriverRequest, done: Completion) {
        // Release the connection before the completion runs: it may dispatch
        // the next statement straight away
        let result = {
            let connection = self.connection.lock();
            run_statement(&connection, &request)
        };
        done(result);
    }

    fn schedule(&self, job: Job) {
        job();
    }
}

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        let connection = self.connection.get_mut();
        if !connection.is_autocommit() {
            log::warn!("closing connection with an open transaction, rolling back");
            let _ = connection.execute_batch("ROLLBACK");
        }
    }
}
