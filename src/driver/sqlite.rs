use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, ToSql};
use tracing::{debug, warn};

use super::{BufferedRows, Executor, Rows};
use crate::types::{PenumbraError, Result};
use crate::value::Value;

/// Executor over a single embedded SQLite connection.
///
/// Result sets are read fully before being handed out, so the connection lock
/// is held only for the duration of the statement. A failure while stepping
/// becomes the terminal error of the returned iterator.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Runs one or more statements that produce no rows (schema setup, seeding).
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Runs a single statement and returns the number of changed rows.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let changed = self
            .conn
            .lock()
            .execute(sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(changed)
    }
}

impl Executor for SqliteExecutor {
    fn query<'a>(&'a self, sql: &str, params: &[Value]) -> Result<Box<dyn Rows + 'a>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut cursor = stmt.query(rusqlite::params_from_iter(params.iter()))?;

        let mut buffered = Vec::new();
        let mut terminal = None;
        loop {
            match cursor.next() {
                Ok(Some(row)) => {
                    let mut values = Vec::with_capacity(width);
                    for idx in 0..width {
                        match row.get_ref(idx) {
                            Ok(value) => values.push(from_value_ref(value)),
                            Err(err) => {
                                terminal = Some(err);
                                break;
                            }
                        }
                    }
                    if terminal.is_some() {
                        break;
                    }
                    buffered.push(values);
                }
                Ok(None) => break,
                Err(err) => {
                    terminal = Some(err);
                    break;
                }
            }
        }

        debug!(rows = buffered.len(), columns = width, "driver.sqlite.query");
        let mut rows = BufferedRows::new(columns, buffered);
        if let Some(err) = terminal {
            warn!(error = %err, "driver.sqlite.step_failed");
            rows = rows.with_terminal_error(PenumbraError::Sqlite(err));
        }
        Ok(Box::new(rows))
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_owned()),
            Err(_) => Value::Bytes(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Int(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}
