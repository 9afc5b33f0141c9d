use tracing::{debug, trace};

use crate::scope::Scope;
use crate::types::{BoxError, PenumbraError};

/// Populates associations of an already loaded destination.
///
/// Installed on a [`Db`](crate::Db) through
/// [`DbBuilder::with_preloader`](crate::DbBuilder::with_preloader). The
/// preload stage calls it once per requested association, in request order.
pub trait Preloader: Send + Sync {
    /// Loads `association` into the scope's destination.
    fn preload(&self, scope: &mut Scope<'_>, association: &str) -> std::result::Result<(), BoxError>;
}

/// Runs the configured [`Preloader`] for every association named by the
/// search. Does nothing when the call has already failed.
pub fn preload_callback(scope: &mut Scope<'_>) {
    if scope.has_error() || scope.search.preloads().is_empty() {
        return;
    }
    let db = scope.db;
    let associations = scope.search.preloads().to_vec();
    let Some(preloader) = db.preloader() else {
        debug!(count = associations.len(), "query.preload.unconfigured");
        scope.add_error(PenumbraError::Preload {
            association: associations[0].clone(),
            source: "no preloader configured".into(),
        });
        return;
    };
    for association in associations {
        trace!(association = %association, "query.preload");
        if let Err(source) = preloader.preload(scope, &association) {
            scope.add_error(PenumbraError::Preload {
                association,
                source,
            });
            return;
        }
        if scope.has_error() {
            return;
        }
    }
}
