use tracing::debug;

use super::{Db, QueryOutcome};
use crate::destination::Destination;
use crate::scope::{Direction, Directives, InstanceFlag, InstanceFlags, Scope, Search};
use crate::types::Result;
use crate::value::Value;

/// Directives for one query call, consumed by [`Query::run`].
///
/// ```ignore
/// let mut users: Vec<User> = Vec::new();
/// db.query()
///     .where_clause("age > ?", [Value::Int(18)])
///     .order_by_primary_key(Direction::Desc)
///     .limit(10)
///     .find(&mut users)?;
/// ```
#[must_use = "a query does nothing until it is run"]
pub struct Query<'a> {
    db: &'a Db,
    search: Search,
    directives: Directives<'a>,
    flags: InstanceFlags,
}

impl<'a> Query<'a> {
    pub(crate) fn new(db: &'a Db) -> Self {
        Self {
            db,
            search: Search::default(),
            directives: Directives::default(),
            flags: InstanceFlags::default(),
        }
    }

    /// Reads from `table` instead of the destination's table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.search.table(table);
        self
    }

    /// Selects `columns` instead of `*`.
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.search.select(columns);
        self
    }

    /// Adds a condition; conditions are joined with `AND`.
    pub fn where_clause<I>(mut self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.search.where_clause(sql, params);
        self
    }

    /// Adds an `ORDER BY` clause.
    pub fn order(mut self, clause: impl Into<String>) -> Self {
        self.search.order(clause);
        self
    }

    /// Caps the number of rows.
    pub fn limit(mut self, limit: u64) -> Self {
        self.search.limit(limit);
        self
    }

    /// Skips the first `offset` rows.
    pub fn offset(mut self, offset: u64) -> Self {
        self.search.offset(offset);
        self
    }

    /// Runs `sql` verbatim; other search directives are ignored.
    pub fn raw<I>(mut self, sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.search.raw(sql, params);
        self
    }

    /// Requests an association for the preload stage.
    pub fn preload(mut self, association: impl Into<String>) -> Self {
        self.search.preload(association);
        self
    }

    /// Orders by the destination's primary key.
    pub fn order_by_primary_key(mut self, direction: Direction) -> Self {
        self.directives.order_by_primary_key = Some(direction);
        self
    }

    /// Appends a SQL fragment (e.g. `FOR UPDATE`) to the built statement.
    pub fn query_option(mut self, option: impl Into<String>) -> Self {
        self.directives.query_option = Some(option.into());
        self
    }

    /// Materializes rows into `dest` instead of the destination passed to
    /// [`Query::run`]. Post-load hooks still run on the original destination.
    pub fn destination<D: Destination>(mut self, dest: &'a mut D) -> Self {
        self.directives.query_destination = Some(dest);
        self
    }

    /// Raises an instance flag for this call.
    pub fn set_flag(mut self, flag: InstanceFlag) -> Self {
        if !self.flags.set(flag) {
            debug!(flag = %flag, "query.flag.already_set");
        }
        self
    }

    /// Bypasses the query stage.
    pub fn skip_query(self) -> Self {
        self.set_flag(InstanceFlag::SkipQuery)
    }

    /// Marks the call as association-only; the query stage is bypassed.
    pub fn only_preload(self) -> Self {
        self.set_flag(InstanceFlag::OnlyPreload)
    }

    /// Runs the query chain against `dest`.
    pub fn run<D: Destination>(self, dest: &'a mut D) -> QueryOutcome {
        let db = self.db;
        let mut scope = Scope::new(db, dest);
        scope.search = self.search;
        scope.directives = self.directives;
        scope.flags = self.flags;
        db.callbacks().query().invoke_all(&mut scope);
        scope.into_outcome()
    }

    /// Runs the chain and returns the row count or the first error.
    pub fn find<D: Destination>(self, dest: &'a mut D) -> Result<u64> {
        self.run(dest).into_result()
    }

    /// Loads the row with the lowest primary key.
    pub fn first<D: Destination>(self, dest: &'a mut D) -> Result<u64> {
        self.order_by_primary_key(Direction::Asc).limit(1).find(dest)
    }

    /// Loads the row with the highest primary key.
    pub fn last<D: Destination>(self, dest: &'a mut D) -> Result<u64> {
        self.order_by_primary_key(Direction::Desc).limit(1).find(dest)
    }
}
