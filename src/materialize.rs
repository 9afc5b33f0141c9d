//! Row materialization.
//!
//! The materializer drains a row iterator into a resolved [`Target`]. The
//! column list is mapped onto the record's fields once per result set; each
//! row then scans column by column into the slots of either the single target
//! record (last row wins) or a freshly allocated sequence element.

use tracing::{debug, warn};

use crate::db::ScanErrorPolicy;
use crate::destination::{RecordTarget, Target};
use crate::driver::Rows;
use crate::profile::{profile_timer, record_profile_timer, QueryProfileKind};
use crate::schema::{ColumnSlot, Discard, Model, ModelCache};
use crate::types::{PenumbraError, Result, ScanError};

/// A column value that could not be scanned and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnError {
    /// 1-based row number within the result set.
    pub row: u64,
    /// Column name.
    pub column: String,
    /// Coercion failure.
    pub source: ScanError,
}

/// Mapping from result column position to record field index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    fields: Vec<Option<usize>>,
}

impl ColumnPlan {
    /// Binds each column to the field mapped to its name.
    ///
    /// A field is bound at most once: when a name repeats, only its first
    /// column is scanned and later ones are discarded.
    pub fn new(model: &Model, columns: &[String]) -> Self {
        let mut taken = vec![false; model.fields().len()];
        let fields = columns
            .iter()
            .map(|column| match model.field_index(column) {
                Some(idx) if !taken[idx] => {
                    taken[idx] = true;
                    Some(idx)
                }
                _ => None,
            })
            .collect();
        Self { fields }
    }

    /// Field index for each column, in column order.
    pub fn fields(&self) -> &[Option<usize>] {
        &self.fields
    }

    /// Number of columns with no field.
    pub fn unmapped(&self) -> usize {
        self.fields.iter().filter(|f| f.is_none()).count()
    }
}

/// Drives row iteration into a destination.
pub struct Materializer<'c> {
    models: &'c ModelCache,
    policy: ScanErrorPolicy,
}

impl<'c> Materializer<'c> {
    /// Creates a materializer resolving models through `models`.
    pub fn new(models: &'c ModelCache, policy: ScanErrorPolicy) -> Self {
        Self { models, policy }
    }

    /// Scans every row of `rows` into `target`.
    ///
    /// `rows_affected` is bumped once per produced row and skipped column
    /// failures are appended to `column_errors`. Fails with the iterator's
    /// terminal error, with [`PenumbraError::RecordNotFound`] when a single
    /// record target saw no rows, or with the first scan error under
    /// [`ScanErrorPolicy::Abort`].
    pub fn run(
        &self,
        rows: &mut dyn Rows,
        target: &mut Target<'_>,
        rows_affected: &mut u64,
        column_errors: &mut Vec<ColumnError>,
    ) -> Result<()> {
        let columns = rows.columns()?;
        let model = target.model(self.models);
        let plan = ColumnPlan::new(&model, &columns);
        if plan.unmapped() > 0 {
            debug!(
                record = model.type_name(),
                unmapped = plan.unmapped(),
                "query.columns.unmapped"
            );
        }
        let is_sequence = target.is_sequence();

        while rows.next() {
            *rows_affected += 1;
            let row = *rows_affected;
            if !is_sequence && row == 2 {
                debug!(record = model.type_name(), "query.single.overrun");
            }
            let started = profile_timer();
            let scanned = match target {
                Target::Sequence(seq) => {
                    let source: &dyn Rows = &*rows;
                    seq.push_with(&mut |record: &mut dyn RecordTarget| {
                        self.scan_row(source, &plan, &columns, row, record, column_errors)
                    })
                }
                Target::Record(record) => {
                    self.scan_row(&*rows, &plan, &columns, row, &mut **record, column_errors)
                }
            };
            record_profile_timer(QueryProfileKind::Scan, started);
            scanned?;
        }

        if let Some(err) = rows.err() {
            return Err(err);
        }
        if *rows_affected == 0 && !is_sequence {
            debug!(record = model.type_name(), "query.not_found");
            return Err(PenumbraError::RecordNotFound);
        }
        Ok(())
    }

    fn scan_row(
        &self,
        rows: &dyn Rows,
        plan: &ColumnPlan,
        columns: &[String],
        row: u64,
        record: &mut dyn RecordTarget,
        column_errors: &mut Vec<ColumnError>,
    ) -> Result<()> {
        let mut slots = record.slots();
        let slot_count = slots.len();
        let mut discard = Discard;
        for (idx, field) in plan.fields().iter().enumerate() {
            let value = rows.value(idx)?;
            let slot: &mut dyn ColumnSlot = match *field {
                Some(field) => match slots.get_mut(field) {
                    Some(slot) => &mut **slot,
                    None => {
                        return Err(PenumbraError::Schema(format!(
                            "field {field} requested but the record exposes {slot_count} slots"
                        )))
                    }
                },
                None => &mut discard,
            };
            if let Err(source) = slot.scan(&value) {
                let column = columns[idx].clone();
                match self.policy {
                    ScanErrorPolicy::Abort => return Err(PenumbraError::Scan { column, source }),
                    ScanErrorPolicy::Skip => {
                        warn!(row, column = %column, error = %source, "query.scan.column_skipped");
                        column_errors.push(ColumnError {
                            row,
                            column,
                            source,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
