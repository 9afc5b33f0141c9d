use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{BufferedRows, Executor, Rows};
use crate::types::{PenumbraError, Result};
use crate::value::Value;

/// Scripted result for a single statement.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    terminal_error: Option<String>,
}

impl ResultSet {
    /// Starts a result set with the given column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            terminal_error: None,
        }
    }

    /// Appends a row.
    pub fn row<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.rows.push(values.into_iter().collect());
        self
    }

    /// Makes the iterator fail with `message` after the scripted rows.
    pub fn fail_after_rows(mut self, message: impl Into<String>) -> Self {
        self.terminal_error = Some(message.into());
        self
    }
}

#[derive(Debug)]
enum Scripted {
    Rows(ResultSet),
    Error(String),
}

/// A statement recorded by [`MemoryExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    /// SQL text as received.
    pub sql: String,
    /// Bound parameters.
    pub params: Vec<Value>,
}

/// Executor that replays scripted result sets in order.
///
/// Every call consumes the next scripted entry and records the statement, so
/// tests can assert on the exact SQL that reached the driver.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    script: Mutex<VecDeque<Scripted>>,
    executed: Mutex<Vec<ExecutedStatement>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl MemoryExecutor {
    /// Creates an executor with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a result set for the next statement.
    pub fn push_result(&self, result: ResultSet) -> &Self {
        self.script.lock().push_back(Scripted::Rows(result));
        self
    }

    /// Queues an execution failure for the next statement.
    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.script.lock().push_back(Scripted::Error(message.into()));
        self
    }

    /// Statements executed so far.
    pub fn statements(&self) -> Vec<ExecutedStatement> {
        self.executed.lock().clone()
    }

    /// Number of row iterators handed out.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of row iterators closed.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Executor for MemoryExecutor {
    fn query<'a>(&'a self, sql: &str, params: &[Value]) -> Result<Box<dyn Rows + 'a>> {
        self.executed.lock().push(ExecutedStatement {
            sql: sql.to_owned(),
            params: params.to_vec(),
        });
        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Rows(result)) => {
                debug!(rows = result.rows.len(), "driver.memory.query");
                self.opened.fetch_add(1, Ordering::SeqCst);
                let mut rows = BufferedRows::new(result.columns, result.rows)
                    .with_close_counter(Arc::clone(&self.closed));
                if let Some(message) = result.terminal_error {
                    rows = rows.with_terminal_error(PenumbraError::Execution(message));
                }
                Ok(Box::new(rows))
            }
            Some(Scripted::Error(message)) => Err(PenumbraError::Execution(message)),
            None => Err(PenumbraError::Execution(format!(
                "no scripted result for statement: {sql}"
            ))),
        }
    }
}
