//! Destination shapes a query can materialize into.
//!
//! Every destination resolves, once per call, to one of two [`Target`]s: a
//! single record populated in place, or a growable sequence that receives one
//! freshly allocated record per row. Anything else is rejected with
//! [`PenumbraError::UnsupportedDestination`].

use std::sync::Arc;

use crate::schema::{ColumnSlot, Model, ModelCache, Record};
use crate::types::{PenumbraError, Result};
use crate::value::Value;

/// Caller-supplied value a query populates.
pub trait Destination {
    /// Classifies the destination.
    fn target(&mut self) -> Result<Target<'_>>;

    /// Rust type name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Resolved shape of a destination.
pub enum Target<'a> {
    /// A single record populated directly.
    Record(&'a mut dyn RecordTarget),
    /// A sequence that receives one record per row.
    Sequence(&'a mut dyn SequenceTarget),
}

impl Target<'_> {
    /// Model of the record type behind the target.
    pub fn model(&self, cache: &ModelCache) -> Arc<Model> {
        match self {
            Target::Record(record) => record.model(cache),
            Target::Sequence(seq) => seq.model(cache),
        }
    }

    /// Returns true for sequence targets.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Target::Sequence(_))
    }
}

/// Type-erased view of a single record.
pub trait RecordTarget {
    /// Cached model of the record type.
    fn model(&self, cache: &ModelCache) -> Arc<Model>;

    /// Addressable field slots, in model order.
    fn slots(&mut self) -> Vec<&mut dyn ColumnSlot>;

    /// Runs the type's `after_find` hook, if it has one.
    fn after_find(&mut self) -> Result<()>;
}

impl<T: Record> RecordTarget for T {
    fn model(&self, cache: &ModelCache) -> Arc<Model> {
        cache.model_of::<T>()
    }

    fn slots(&mut self) -> Vec<&mut dyn ColumnSlot> {
        Record::slots(self)
    }

    fn after_find(&mut self) -> Result<()> {
        match T::AFTER_FIND {
            Some(hook) => hook(self).map_err(PenumbraError::AfterFind),
            None => Ok(()),
        }
    }
}

/// Type-erased view of a growable sequence of records.
pub trait SequenceTarget {
    /// Cached model of the element record type.
    fn model(&self, cache: &ModelCache) -> Arc<Model>;

    /// Whether elements are held through an indirection (`Box<T>`).
    fn is_indirect(&self) -> bool;

    /// Number of elements currently held.
    fn len(&self) -> usize;

    /// Returns true when the sequence holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the sequence.
    fn reset(&mut self);

    /// Allocates a fresh record, lets `fill` populate it and appends it.
    ///
    /// The record is not appended when `fill` fails.
    fn push_with(&mut self, fill: &mut dyn FnMut(&mut dyn RecordTarget) -> Result<()>) -> Result<()>;

    /// Visits every element in order, stopping at the first error.
    fn for_each_record(&mut self, f: &mut dyn FnMut(&mut dyn RecordTarget) -> Result<()>) -> Result<()>;
}

/// Element of a sequence destination: a record held directly or boxed.
pub trait Element: Send + 'static {
    /// Record type carried by the element.
    type Record: Record;
    /// Whether the record sits behind an indirection.
    const INDIRECT: bool;

    /// Wraps a populated record into an element.
    fn wrap(record: Self::Record) -> Self;

    /// Mutable access to the carried record.
    fn record_mut(&mut self) -> &mut Self::Record;
}

impl<E: Element> SequenceTarget for Vec<E> {
    fn model(&self, cache: &ModelCache) -> Arc<Model> {
        cache.model_of::<E::Record>()
    }

    fn is_indirect(&self) -> bool {
        E::INDIRECT
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn reset(&mut self) {
        // Drop the old allocation as well so a reused destination does not
        // keep stale capacity around.
        *self = Vec::new();
    }

    fn push_with(&mut self, fill: &mut dyn FnMut(&mut dyn RecordTarget) -> Result<()>) -> Result<()> {
        let mut record = E::Record::default();
        fill(&mut record)?;
        self.push(E::wrap(record));
        Ok(())
    }

    fn for_each_record(&mut self, f: &mut dyn FnMut(&mut dyn RecordTarget) -> Result<()>) -> Result<()> {
        for element in self.iter_mut() {
            f(element.record_mut())?;
        }
        Ok(())
    }
}

impl<E: Element> Destination for Vec<E> {
    fn target(&mut self) -> Result<Target<'_>> {
        Ok(Target::Sequence(self))
    }
}

impl<D: Destination + ?Sized> Destination for &mut D {
    fn target(&mut self) -> Result<Target<'_>> {
        (**self).target()
    }

    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }
}

macro_rules! unsupported_destination {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Destination for $ty {
                fn target(&mut self) -> Result<Target<'_>> {
                    Err(PenumbraError::UnsupportedDestination {
                        type_name: std::any::type_name::<$ty>(),
                    })
                }
            }
        )*
    };
}

unsupported_destination!(bool, i32, i64, u64, f64, String, Value, serde_json::Value);
