//! Ordered, named callback chains.
//!
//! A query call runs every handler of the query chain in registration order
//! against the same [`Scope`]. The chain never short-circuits on its own:
//! handlers check the scope's error state and return early.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::scope::Scope;
use crate::types::{PenumbraError, Result};

mod preload;
mod query;

pub use preload::{preload_callback, Preloader};
pub use query::{after_query_callback, query_callback};

/// Name of the built-in query stage.
pub const QUERY: &str = "penumbra:query";
/// Name of the built-in preload stage.
pub const PRELOAD: &str = "penumbra:preload";
/// Name of the built-in post-load hook stage.
pub const AFTER_QUERY: &str = "penumbra:after_query";

/// A stage handler. Results land in the scope.
pub type Handler = Arc<dyn Fn(&mut Scope<'_>) + Send + Sync>;

#[derive(Clone)]
struct Processor {
    name: String,
    handler: Handler,
}

/// Ordered list of uniquely named handlers.
#[derive(Clone, Default)]
pub struct CallbackChain {
    processors: Vec<Processor>,
}

impl CallbackChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.processors.iter().position(|p| p.name == name)
    }

    /// Appends `handler` under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(PenumbraError::DuplicateCallback(name));
        }
        self.processors.push(Processor {
            name,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Swaps the handler registered under `name`, keeping its position.
    pub fn replace<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        let idx = self
            .position(name)
            .ok_or_else(|| PenumbraError::UnknownCallback(name.to_owned()))?;
        info!(callback = name, "callbacks.replace");
        self.processors[idx].handler = Arc::new(handler);
        Ok(())
    }

    /// Removes the handler registered under `name`.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| PenumbraError::UnknownCallback(name.to_owned()))?;
        info!(callback = name, "callbacks.remove");
        self.processors.remove(idx);
        Ok(())
    }

    /// Registered names in invocation order.
    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name.as_str()).collect()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Returns true when no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs every handler in order against `scope`.
    pub fn invoke_all(&self, scope: &mut Scope<'_>) {
        for processor in &self.processors {
            (processor.handler)(scope);
        }
    }
}

impl fmt::Debug for CallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Callback chains of a [`Db`](crate::Db) handle.
#[derive(Clone, Debug)]
pub struct Callbacks {
    query: CallbackChain,
}

impl Default for Callbacks {
    /// The query chain with `query`, `preload` and `after_query` registered.
    fn default() -> Self {
        let mut query = CallbackChain::new();
        query.processors.push(Processor {
            name: QUERY.to_owned(),
            handler: Arc::new(query_callback),
        });
        query.processors.push(Processor {
            name: PRELOAD.to_owned(),
            handler: Arc::new(preload_callback),
        });
        query.processors.push(Processor {
            name: AFTER_QUERY.to_owned(),
            handler: Arc::new(after_query_callback),
        });
        Self { query }
    }
}

impl Callbacks {
    /// Callbacks with empty chains.
    pub fn empty() -> Self {
        Self {
            query: CallbackChain::new(),
        }
    }

    /// The query chain.
    pub fn query(&self) -> &CallbackChain {
        &self.query
    }

    /// Mutable access to the query chain.
    pub fn query_mut(&mut self) -> &mut CallbackChain {
        &mut self.query
    }
}
