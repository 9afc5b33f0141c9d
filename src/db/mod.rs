//! The database handle and the per-call query entry points.

use std::fmt;
use std::sync::Arc;

use crate::callbacks::{Callbacks, Preloader};
use crate::destination::Destination;
use crate::driver::Executor;
use crate::materialize::ColumnError;
use crate::schema::ModelCache;
use crate::statement::{SelectBuilder, StatementBuilder};
use crate::types::{PenumbraError, Result};
use crate::value::Value;

mod config;
mod query;

pub use config::{Config, ScanErrorPolicy};
pub use query::Query;

/// Shared handle a query call runs against.
///
/// Holds the executor, the callback chains, the statement builder and the
/// per-type model cache. A `Db` is immutable while queries run; chains are
/// edited through [`Db::callbacks_mut`] between calls.
pub struct Db {
    executor: Arc<dyn Executor>,
    callbacks: Callbacks,
    statement_builder: Arc<dyn StatementBuilder>,
    preloader: Option<Arc<dyn Preloader>>,
    models: ModelCache,
    config: Config,
}

impl Db {
    /// Creates a handle with default config and the default query chain.
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self::builder(executor).build()
    }

    /// Starts configuring a handle around `executor`.
    pub fn builder(executor: impl Executor + 'static) -> DbBuilder {
        DbBuilder {
            executor: Arc::new(executor),
            config: Config::default(),
            statement_builder: Arc::new(SelectBuilder),
            preloader: None,
            callbacks: Callbacks::default(),
        }
    }

    /// Runtime options.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The executor statements are sent to.
    pub fn executor(&self) -> &dyn Executor {
        &*self.executor
    }

    /// Renders statements for the query stage.
    pub fn statement_builder(&self) -> &dyn StatementBuilder {
        &*self.statement_builder
    }

    /// Association loader used by the preload stage.
    pub fn preloader(&self) -> Option<&dyn Preloader> {
        self.preloader.as_deref()
    }

    /// Per-type model metadata.
    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    /// Registered callback chains.
    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    /// Mutable access to the callback chains.
    pub fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.callbacks
    }

    /// Starts a query call.
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Loads every matching row into `dest`; returns the number of rows.
    pub fn find<D: Destination>(&self, dest: &mut D) -> Result<u64> {
        self.query().find(dest)
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("callbacks", &self.callbacks)
            .field("models", &self.models.len())
            .field("preloader", &self.preloader.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`Db`].
pub struct DbBuilder {
    executor: Arc<dyn Executor>,
    config: Config,
    statement_builder: Arc<dyn StatementBuilder>,
    preloader: Option<Arc<dyn Preloader>>,
    callbacks: Callbacks,
}

impl DbBuilder {
    /// Replaces the runtime options.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Replaces the default [`SelectBuilder`].
    pub fn with_statement_builder(mut self, builder: impl StatementBuilder + 'static) -> Self {
        self.statement_builder = Arc::new(builder);
        self
    }

    /// Installs an association loader.
    pub fn with_preloader(mut self, preloader: impl Preloader + 'static) -> Self {
        self.preloader = Some(Arc::new(preloader));
        self
    }

    /// Replaces the callback chains.
    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Finishes the handle.
    pub fn build(self) -> Db {
        Db {
            executor: self.executor,
            callbacks: self.callbacks,
            statement_builder: self.statement_builder,
            preloader: self.preloader,
            models: ModelCache::new(),
            config: self.config,
        }
    }
}

impl fmt::Debug for DbBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbBuilder")
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

/// What a query call left behind once its scope was torn down.
#[derive(Debug)]
pub struct QueryOutcome {
    /// SQL of the executed statement, including any query option. Empty when
    /// the query stage was bypassed or failed before building.
    pub sql: String,
    /// Parameters bound to `sql`.
    pub params: Vec<Value>,
    /// Number of rows produced.
    pub rows_affected: u64,
    /// Column failures skipped under [`ScanErrorPolicy::Skip`].
    pub column_errors: Vec<ColumnError>,
    /// First error raised by any stage.
    pub error: Option<PenumbraError>,
}

impl QueryOutcome {
    /// Whether the call finished without error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into the row count or the recorded error.
    pub fn into_result(self) -> Result<u64> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.rows_affected),
        }
    }
}
