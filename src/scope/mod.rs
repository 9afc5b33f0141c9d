//! Per-call query context threaded through the callback chain.
//!
//! A [`Scope`] is created for one top-level call and dropped when the call
//! ends. It owns the accumulated directives, the call's instance flags, the
//! generated SQL and the first error raised by any stage. Stages are expected
//! to check [`Scope::has_error`] and return early instead of doing more work.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::db::{Db, QueryOutcome};
use crate::destination::Destination;
use crate::materialize::ColumnError;
use crate::schema::{FieldDef, Model};
use crate::types::PenumbraError;
use crate::value::Value;

mod flags;
mod search;

pub use flags::{InstanceFlag, InstanceFlags};
pub use search::{Condition, Direction, Search};

/// Stage of a query call, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Scope created, nothing run yet.
    Idle,
    /// Resolving the destination and rendering SQL.
    BuildingSql,
    /// Statement handed to the executor.
    Executing,
    /// Iterating rows into the destination.
    ScanningRows,
    /// Checking iterator errors and the not-found condition.
    Finalizing,
    /// Running post-load hooks.
    AfterHook,
    /// Call finished.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::BuildingSql => "building-sql",
            Phase::Executing => "executing",
            Phase::ScanningRows => "scanning-rows",
            Phase::Finalizing => "finalizing",
            Phase::AfterHook => "after-hook",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

pub(crate) fn enter(phase: &mut Phase, next: Phase) {
    trace!(from = %phase, to = %next, "scope.phase");
    *phase = next;
}

/// Records `err` unless an earlier error is already present.
pub(crate) fn record_error(slot: &mut Option<PenumbraError>, err: PenumbraError) -> bool {
    if slot.is_some() {
        debug!(error = %err, "scope.error.suppressed");
        return false;
    }
    *slot = Some(err);
    true
}

/// Named per-call options consumed by the query stage.
#[derive(Default)]
pub struct Directives<'a> {
    /// Append `ORDER BY <table>.<pk> <dir>` when the destination has a primary key.
    pub order_by_primary_key: Option<Direction>,
    /// Free-form SQL appended after the built statement (e.g. `FOR UPDATE`).
    pub query_option: Option<String>,
    /// Materialize into this value instead of the scope's destination.
    pub query_destination: Option<&'a mut dyn Destination>,
}

impl fmt::Debug for Directives<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directives")
            .field("order_by_primary_key", &self.order_by_primary_key)
            .field("query_option", &self.query_option)
            .field(
                "query_destination",
                &self.query_destination.as_ref().map(|d| d.type_name()),
            )
            .finish()
    }
}

/// Mutable context for a single query call.
pub struct Scope<'a> {
    pub(crate) db: &'a Db,
    pub(crate) value: &'a mut dyn Destination,
    pub(crate) search: Search,
    pub(crate) directives: Directives<'a>,
    pub(crate) flags: InstanceFlags,
    pub(crate) sql: String,
    pub(crate) sql_vars: Vec<Value>,
    pub(crate) rows_affected: u64,
    pub(crate) column_errors: Vec<ColumnError>,
    pub(crate) error: Option<PenumbraError>,
    pub(crate) phase: Phase,
}

impl<'a> Scope<'a> {
    /// Creates a fresh scope targeting `value`.
    pub fn new(db: &'a Db, value: &'a mut dyn Destination) -> Self {
        Self {
            db,
            value,
            search: Search::default(),
            directives: Directives::default(),
            flags: InstanceFlags::default(),
            sql: String::new(),
            sql_vars: Vec::new(),
            rows_affected: 0,
            column_errors: Vec::new(),
            error: None,
            phase: Phase::Idle,
        }
    }

    /// Database handle the scope runs against.
    pub fn db(&self) -> &'a Db {
        self.db
    }

    /// The caller's destination.
    pub fn value_mut(&mut self) -> &mut dyn Destination {
        &mut *self.value
    }

    /// Accumulated search directives.
    pub fn search(&self) -> &Search {
        &self.search
    }

    /// Mutable access to the search directives.
    pub fn search_mut(&mut self) -> &mut Search {
        &mut self.search
    }

    /// Named per-call directives.
    pub fn directives(&self) -> &Directives<'a> {
        &self.directives
    }

    /// Mutable access to the named directives.
    pub fn directives_mut(&mut self) -> &mut Directives<'a> {
        &mut self.directives
    }

    /// Raises an instance flag. Returns false when it was already raised.
    pub fn set_flag(&mut self, flag: InstanceFlag) -> bool {
        self.flags.set(flag)
    }

    /// Whether `flag` is raised for this call.
    pub fn has_flag(&self, flag: InstanceFlag) -> bool {
        self.flags.contains(flag)
    }

    /// All instance flags.
    pub fn flags(&self) -> InstanceFlags {
        self.flags
    }

    /// Records an error. Only the first error of a call is kept.
    pub fn add_error(&mut self, err: PenumbraError) -> bool {
        record_error(&mut self.error, err)
    }

    /// Whether any stage has failed.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// The first recorded error.
    pub fn error(&self) -> Option<&PenumbraError> {
        self.error.as_ref()
    }

    /// SQL text of the last statement built.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameters bound to [`Scope::sql`].
    pub fn sql_vars(&self) -> &[Value] {
        &self.sql_vars
    }

    /// Rows produced by the last execution.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Column-level scan failures that were skipped.
    pub fn column_errors(&self) -> &[ColumnError] {
        &self.column_errors
    }

    /// Current stage of the call.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Model of the caller's destination, if its shape is supported.
    pub fn value_model(&mut self) -> Option<Arc<Model>> {
        let models = self.db.models();
        self.value.target().ok().map(|target| target.model(models))
    }

    /// Primary key field of the caller's destination.
    pub fn primary_field(&mut self) -> Option<FieldDef> {
        self.value_model()
            .and_then(|model| model.primary_field().cloned())
    }

    /// Quotes an identifier for the configured dialect.
    pub fn quote(&self, ident: &str) -> String {
        self.db.config().dialect.quote(ident)
    }

    /// Quoted table name: the search override or the destination's table.
    pub fn quoted_table_name(&mut self) -> Option<String> {
        if let Some(table) = self.search.table_name() {
            return Some(self.quote(table));
        }
        let model = self.value_model()?;
        Some(self.quote(model.table()))
    }

    pub(crate) fn into_outcome(mut self) -> QueryOutcome {
        enter(&mut self.phase, Phase::Done);
        QueryOutcome {
            sql: self.sql,
            params: self.sql_vars,
            rows_affected: self.rows_affected,
            column_errors: self.column_errors,
            error: self.error,
        }
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("value", &self.value.type_name())
            .field("search", &self.search)
            .field("directives", &self.directives)
            .field("flags", &self.flags)
            .field("sql", &self.sql)
            .field("rows_affected", &self.rows_affected)
            .field("error", &self.error)
            .field("phase", &self.phase)
            .finish()
    }
}
