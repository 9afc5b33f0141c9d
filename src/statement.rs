//! Statement rendering from accumulated search directives.

use serde::{Deserialize, Serialize};

use crate::scope::Search;
use crate::types::{PenumbraError, Result};
use crate::value::Value;

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    /// Rendered SQL.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

/// Identifier quoting and placeholder style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// `"ident"`, `?` placeholders.
    #[default]
    Ansi,
    /// Same as ANSI.
    Sqlite,
    /// `` `ident` ``, `?` placeholders.
    Mysql,
    /// `"ident"`, `$n` placeholders.
    Postgres,
}

impl DialectKind {
    fn quote_char(self) -> char {
        match self {
            DialectKind::Mysql => '`',
            DialectKind::Ansi | DialectKind::Sqlite | DialectKind::Postgres => '"',
        }
    }

    /// Quotes an identifier. Dotted names are quoted per part and parts that
    /// are already quoted are left alone.
    pub fn quote(self, ident: &str) -> String {
        let q = self.quote_char();
        ident
            .split('.')
            .map(|part| {
                if part.len() >= 2 && part.starts_with(q) && part.ends_with(q) {
                    part.to_owned()
                } else {
                    let escaped = part.replace(q, &format!("{q}{q}"));
                    format!("{q}{escaped}{q}")
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Rewrites `?` placeholders for dialects that number them.
    ///
    /// `next` is the 1-based index of the first placeholder in `sql` and is
    /// advanced past every placeholder rewritten. Question marks inside
    /// single-quoted literals are left untouched.
    pub fn bind_placeholders(self, sql: &str, next: &mut usize) -> String {
        if self != DialectKind::Postgres {
            *next += sql.matches('?').count();
            return sql.to_owned();
        }
        let mut out = String::with_capacity(sql.len() + 4);
        let mut in_literal = false;
        for ch in sql.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(ch);
                }
                '?' if !in_literal => {
                    out.push('$');
                    out.push_str(&next.to_string());
                    *next += 1;
                }
                _ => out.push(ch),
            }
        }
        out
    }
}

/// Inputs available to a [`StatementBuilder`].
#[derive(Debug)]
pub struct BuildContext<'s> {
    /// Accumulated directives.
    pub search: &'s Search,
    /// Quoted table of the destination, if known.
    pub quoted_table: Option<String>,
    /// Dialect used for quoting and placeholders.
    pub dialect: DialectKind,
}

/// Renders the final statement for a query call.
pub trait StatementBuilder: Send + Sync {
    /// Builds SQL and parameters from `ctx`.
    fn build(&self, ctx: &BuildContext<'_>) -> Result<Statement>;
}

/// Default builder: a raw statement verbatim, otherwise a plain `SELECT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectBuilder;

impl StatementBuilder for SelectBuilder {
    fn build(&self, ctx: &BuildContext<'_>) -> Result<Statement> {
        let search = ctx.search;
        let mut next = 1;
        if let Some(raw) = search.raw_statement() {
            return Ok(Statement {
                sql: ctx.dialect.bind_placeholders(&raw.sql, &mut next),
                params: raw.params.clone(),
            });
        }

        let table = ctx
            .quoted_table
            .as_deref()
            .ok_or_else(|| PenumbraError::Statement("no table to select from".into()))?;
        let mut sql = format!(
            "SELECT {} FROM {table}",
            search.select_clause().unwrap_or("*")
        );
        let mut params = Vec::new();

        let conditions = search.conditions();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            for (idx, cond) in conditions.iter().enumerate() {
                if idx > 0 {
                    sql.push_str(" AND ");
                }
                sql.push('(');
                sql.push_str(&ctx.dialect.bind_placeholders(&cond.sql, &mut next));
                sql.push(')');
                params.extend(cond.params.iter().cloned());
            }
        }
        if !search.orders().is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&search.orders().join(","));
        }
        if let Some(limit) = search.limit_value() {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = search.offset_value() {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(Statement { sql, params })
    }
}

/// Appends `option` to `sql`, inserting a separating space when needed.
pub fn append_query_option(sql: &mut String, option: &str) {
    if option.is_empty() {
        return;
    }
    if !sql.is_empty() && !sql.ends_with(' ') {
        sql.push(' ');
    }
    sql.push_str(option);
}
