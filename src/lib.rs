//! Penumbra: a callback-driven query engine.
//!
//! A query call creates a [`Scope`], runs the registered query chain
//! (`penumbra:query`, `penumbra:preload`, `penumbra:after_query` by default)
//! against it and tears it down. The query stage renders a statement from
//! the accumulated directives, hands it to an [`Executor`] and materializes
//! the returned rows into the caller's destination: a single record or a
//! growable sequence of records held directly or boxed.
//!
//! ```ignore
//! #[derive(Debug, Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! penumbra::record! {
//!     User => "users" {
//!         id,
//!         name,
//!     }
//! }
//!
//! let db = Db::new(SqliteExecutor::open("app.db")?);
//! let mut users: Vec<User> = Vec::new();
//! db.query().where_clause("name LIKE ?", [Value::from("a%")]).find(&mut users)?;
//! ```

#![warn(missing_docs)]

pub mod callbacks;
pub mod db;
pub mod destination;
pub mod driver;
pub mod materialize;
pub mod profile;
pub mod schema;
pub mod scope;
pub mod statement;
pub mod types;
pub mod value;

pub use callbacks::{CallbackChain, Callbacks, Handler, Preloader};
pub use db::{Config, Db, DbBuilder, Query, QueryOutcome, ScanErrorPolicy};
pub use destination::{Destination, Element, RecordTarget, SequenceTarget, Target};
pub use driver::{BufferedRows, Executor, MemoryExecutor, ResultSet, Rows, RowsGuard, SqliteExecutor};
pub use materialize::ColumnError;
pub use profile::{profile_reset, profile_snapshot, QueryProfileSnapshot};
pub use schema::{AfterFindFn, ColumnSlot, FieldDef, Model, ModelBuilder, Record};
pub use scope::{Direction, Directives, InstanceFlag, InstanceFlags, Phase, Scope, Search};
pub use statement::{BuildContext, DialectKind, SelectBuilder, Statement, StatementBuilder};
pub use types::{BoxError, PenumbraError, Result, ScanError};
pub use value::Value;
