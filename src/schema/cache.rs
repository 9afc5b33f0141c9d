use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::{Model, Record};

/// Per-type cache of [`Model`] metadata, shared across calls.
#[derive(Debug, Default)]
pub struct ModelCache {
    models: RwLock<HashMap<TypeId, Arc<Model>>>,
}

impl ModelCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the model of `T`, describing the type on first use.
    pub fn model_of<T: Record>(&self) -> Arc<Model> {
        let key = TypeId::of::<T>();
        if let Some(model) = self.models.read().get(&key) {
            return Arc::clone(model);
        }
        let mut models = self.models.write();
        let model = models.entry(key).or_insert_with(|| {
            trace!(record = std::any::type_name::<T>(), "schema.model.describe");
            Arc::new(Model::of::<T>())
        });
        Arc::clone(model)
    }

    /// Number of cached record types.
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Returns true when nothing has been described yet.
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}
