//! Record metadata and field resolution.
//!
//! A [`Record`] describes itself once through a [`ModelBuilder`]; the
//! resulting [`Model`] maps column names to field indexes and is cached per
//! type by [`ModelCache`]. At scan time [`Record::slots`] hands out mutable
//! references to every mapped field in model order, so a row can be written
//! straight into the record.

use std::collections::HashMap;

use crate::types::BoxError;

mod cache;
mod macros;
mod slot;

pub use cache::ModelCache;
pub use slot::{ColumnSlot, Discard};

/// Signature of the optional post-load hook.
pub type AfterFindFn<T> = fn(&mut T) -> std::result::Result<(), BoxError>;

/// A struct-shaped value rows can be materialized into.
///
/// Most types implement this through the [`record!`](crate::record) macro,
/// which also wires up the destination shapes for `T` and `Box<T>`.
pub trait Record: Default + Send + 'static {
    /// Hook invoked on each loaded record after a successful query.
    const AFTER_FIND: Option<AfterFindFn<Self>> = None;

    /// Describes the table and field/column layout of the type.
    fn describe() -> ModelBuilder;

    /// Mutable references to every described field, in description order.
    fn slots(&mut self) -> Vec<&mut dyn ColumnSlot>;
}

/// Metadata for a single mapped field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Rust field name.
    pub name: String,
    /// Column the field is bound to.
    pub column: String,
    /// Whether the field is the primary key.
    pub primary_key: bool,
}

/// Cached metadata for a record type.
#[derive(Debug, Clone)]
pub struct Model {
    type_name: &'static str,
    table: String,
    fields: Vec<FieldDef>,
    by_column: HashMap<String, usize>,
    primary_key: Option<usize>,
    has_after_find: bool,
}

impl Model {
    /// Builds the model of `T` from its description.
    pub fn of<T: Record>() -> Self {
        T::describe().build(std::any::type_name::<T>(), T::AFTER_FIND.is_some())
    }

    /// Rust type name of the record.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Unquoted table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in description order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Index of the field bound to `column`.
    pub fn field_index(&self, column: &str) -> Option<usize> {
        self.by_column.get(column).copied()
    }

    /// The primary key field, if the type has one.
    pub fn primary_field(&self) -> Option<&FieldDef> {
        self.primary_key.map(|idx| &self.fields[idx])
    }

    /// Whether the type carries an `after_find` hook.
    pub fn has_after_find(&self) -> bool {
        self.has_after_find
    }
}

/// Fluent description of a record's table and fields.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    table: String,
    fields: Vec<FieldDef>,
}

impl ModelBuilder {
    /// Starts a description for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field whose column name is derived from the field name.
    pub fn field(self, name: &str) -> Self {
        let column = to_column_name(name);
        self.column(name, column)
    }

    /// Adds a field bound to an explicit column name.
    pub fn column(mut self, name: &str, column: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.to_owned(),
            column: column.into(),
            primary_key: false,
        });
        self
    }

    /// Marks the most recently added field as the primary key.
    pub fn primary_key(mut self) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.primary_key = true;
        }
        self
    }

    /// Finalizes the description.
    ///
    /// When no field is marked, a field bound to the `id` column becomes the
    /// primary key. If two fields claim the same column the first one keeps it.
    pub fn build(self, type_name: &'static str, has_after_find: bool) -> Model {
        let mut by_column = HashMap::with_capacity(self.fields.len());
        for (idx, field) in self.fields.iter().enumerate() {
            by_column.entry(field.column.clone()).or_insert(idx);
        }
        let primary_key = self
            .fields
            .iter()
            .position(|f| f.primary_key)
            .or_else(|| by_column.get("id").copied());
        let mut fields = self.fields;
        if let Some(idx) = primary_key {
            fields[idx].primary_key = true;
        }
        Model {
            type_name,
            table: self.table,
            fields,
            by_column,
            primary_key,
            has_after_find,
        }
    }
}

/// Converts a field name into its default column name (`UserID` -> `user_id`).
pub fn to_column_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (idx, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && idx > 0 {
            let prev = chars[idx - 1];
            let next_lower = chars.get(idx + 1).is_some_and(|c| c.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_lower);
            if boundary && prev != '_' {
                out.push('_');
            }
        }
        out.extend(ch.to_lowercase());
    }
    out
}
