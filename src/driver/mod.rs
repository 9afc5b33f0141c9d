//! Execution collaborators: statement executors and row iterators.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::{PenumbraError, Result};
use crate::value::Value;

/// In-memory scripted executor.
pub mod memory;

/// Executor backed by an embedded SQLite connection.
pub mod sqlite;

pub use memory::{MemoryExecutor, ResultSet};
pub use sqlite::SqliteExecutor;

/// Runs statements and hands back row iterators.
pub trait Executor: Send + Sync {
    /// Executes `sql` with positional `params`.
    fn query<'a>(&'a self, sql: &str, params: &[Value]) -> Result<Box<dyn Rows + 'a>>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn query<'a>(&'a self, sql: &str, params: &[Value]) -> Result<Box<dyn Rows + 'a>> {
        (**self).query(sql, params)
    }
}

/// Cursor over a running query's result set.
pub trait Rows {
    /// Column names in result order. Names are not necessarily unique.
    fn columns(&self) -> Result<Vec<String>>;

    /// Advances to the next row. Returns false at the end or on failure.
    fn next(&mut self) -> bool;

    /// Reads column `index` of the current row.
    fn value(&self, index: usize) -> Result<Value>;

    /// Takes the terminal error that stopped iteration, if any.
    fn err(&mut self) -> Option<PenumbraError>;

    /// Releases the cursor. Must be idempotent.
    fn close(&mut self);
}

/// Owns a row iterator and closes it when dropped.
pub struct RowsGuard<'a> {
    rows: Box<dyn Rows + 'a>,
}

impl<'a> RowsGuard<'a> {
    /// Wraps an open iterator.
    pub fn new(rows: Box<dyn Rows + 'a>) -> Self {
        Self { rows }
    }
}

impl<'a> Deref for RowsGuard<'a> {
    type Target = dyn Rows + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.rows
    }
}

impl<'a> DerefMut for RowsGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.rows
    }
}

impl Drop for RowsGuard<'_> {
    fn drop(&mut self) {
        self.rows.close();
    }
}

/// Fully buffered result set exposed through [`Rows`].
///
/// Both bundled drivers hand out this type. A terminal error, when present,
/// is reported after the buffered rows have been consumed.
#[derive(Debug)]
pub struct BufferedRows {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
    current: Option<Vec<Value>>,
    terminal: Option<PenumbraError>,
    close_counter: Option<Arc<AtomicUsize>>,
    closed: bool,
}

impl BufferedRows {
    /// Builds an iterator over `rows`.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
            current: None,
            terminal: None,
            close_counter: None,
            closed: false,
        }
    }

    /// Reports `err` once the buffered rows are exhausted.
    pub fn with_terminal_error(mut self, err: PenumbraError) -> Self {
        self.terminal = Some(err);
        self
    }

    /// Increments `counter` the first time the iterator is closed.
    pub fn with_close_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.close_counter = Some(counter);
        self
    }
}

impl Rows for BufferedRows {
    fn columns(&self) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }

    fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.current = self.rows.next();
        self.current.is_some()
    }

    fn value(&self, index: usize) -> Result<Value> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| PenumbraError::Execution("no current row".into()))?;
        row.get(index).cloned().ok_or_else(|| {
            PenumbraError::Execution(format!(
                "column index {index} out of range for row of {} values",
                row.len()
            ))
        })
    }

    fn err(&mut self) -> Option<PenumbraError> {
        if self.current.is_some() {
            return None;
        }
        self.terminal.take()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.current = None;
        if let Some(counter) = &self.close_counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}
