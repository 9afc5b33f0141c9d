use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Sort direction for primary-key ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl Direction {
    /// SQL keyword for the direction.
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A `WHERE` fragment with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// SQL fragment using `?` placeholders.
    pub sql: String,
    /// Parameters bound to the placeholders, in order.
    pub params: Vec<Value>,
}

/// Accumulated query-building directives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Search {
    pub(crate) table: Option<String>,
    pub(crate) select: Option<String>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) orders: Vec<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) raw: Option<Condition>,
    pub(crate) preloads: Vec<String>,
}

impl Search {
    /// Overrides the table the statement reads from.
    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = Some(table.into());
        self
    }

    /// Replaces the `*` projection.
    pub fn select(&mut self, columns: impl Into<String>) -> &mut Self {
        self.select = Some(columns.into());
        self
    }

    /// Adds a `WHERE` condition; conditions are joined with `AND`.
    pub fn where_clause<I>(&mut self, sql: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.conditions.push(Condition {
            sql: sql.into(),
            params: params.into_iter().collect(),
        });
        self
    }

    /// Appends an ordering clause unless the identical clause is already present.
    pub fn order(&mut self, clause: impl Into<String>) -> &mut Self {
        let clause = clause.into();
        if !clause.trim().is_empty() && !self.orders.iter().any(|o| *o == clause) {
            self.orders.push(clause);
        }
        self
    }

    /// Limits the number of rows.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` rows.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Uses `sql` verbatim instead of building a `SELECT`.
    pub fn raw<I>(&mut self, sql: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.raw = Some(Condition {
            sql: sql.into(),
            params: params.into_iter().collect(),
        });
        self
    }

    /// Requests an association preload.
    pub fn preload(&mut self, association: impl Into<String>) -> &mut Self {
        let association = association.into();
        if !self.preloads.contains(&association) {
            self.preloads.push(association);
        }
        self
    }

    /// Table override, if any.
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Ordering clauses in the order they were added.
    pub fn orders(&self) -> &[String] {
        &self.orders
    }

    /// Requested association preloads.
    pub fn preloads(&self) -> &[String] {
        &self.preloads
    }

    /// Accumulated `WHERE` conditions.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Row limit.
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// Row offset.
    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// Projection override.
    pub fn select_clause(&self) -> Option<&str> {
        self.select.as_deref()
    }

    /// Raw statement, when one was supplied.
    pub fn raw_statement(&self) -> Option<&Condition> {
        self.raw.as_ref()
    }
}
