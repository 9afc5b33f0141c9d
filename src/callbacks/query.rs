use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::destination::{Destination, RecordTarget, Target};
use crate::driver::RowsGuard;
use crate::materialize::Materializer;
use crate::profile::{profile_timer, record_profile_timer, QueryProfileKind};
use crate::scope::{enter, record_error, Phase, Scope};
use crate::statement::{append_query_option, BuildContext};

/// Builds and runs the statement and materializes its rows into the scope's
/// destination (or its `query_destination` override).
pub fn query_callback(scope: &mut Scope<'_>) {
    if let Some(flag) = scope.flags.query_bypass() {
        trace!(flag = %flag, "query.skip");
        return;
    }
    let started = Instant::now();

    if let Some(direction) = scope.directives.order_by_primary_key {
        if let (Some(table), Some(pk)) = (scope.quoted_table_name(), scope.primary_field()) {
            let clause = format!("{table}.{} {direction}", scope.quote(&pk.column));
            scope.search.order(clause);
        }
    }
    let quoted_table = scope.quoted_table_name();

    let db = scope.db;
    let Scope {
        value,
        search,
        directives,
        sql,
        sql_vars,
        rows_affected,
        column_errors,
        error,
        phase,
        ..
    } = scope;
    enter(phase, Phase::BuildingSql);

    let dest: &mut dyn Destination = match directives.query_destination.as_mut() {
        Some(replacement) => &mut **replacement,
        None => &mut **value,
    };
    let mut target = match dest.target() {
        Ok(target) => target,
        Err(err) => {
            record_error(error, err);
            return;
        }
    };
    if let Target::Sequence(seq) = &mut target {
        seq.reset();
    }

    let build_started = profile_timer();
    let built = db.statement_builder().build(&BuildContext {
        search,
        quoted_table,
        dialect: db.config().dialect,
    });
    record_profile_timer(QueryProfileKind::Build, build_started);
    match built {
        Ok(statement) => {
            *sql = statement.sql;
            *sql_vars = statement.params;
        }
        Err(err) => {
            record_error(error, err);
            return;
        }
    }
    if error.is_some() {
        return;
    }

    *rows_affected = 0;
    if let Some(option) = directives.query_option.as_deref() {
        append_query_option(sql, option);
    }

    enter(phase, Phase::Executing);
    let exec_started = profile_timer();
    let opened = db.executor().query(sql, sql_vars);
    record_profile_timer(QueryProfileKind::Execute, exec_started);
    let mut rows = match opened {
        Ok(rows) => RowsGuard::new(rows),
        Err(err) => {
            record_error(error, err);
            return;
        }
    };

    enter(phase, Phase::ScanningRows);
    let materializer = Materializer::new(db.models(), db.config().scan_errors);
    let outcome = materializer.run(&mut *rows, &mut target, rows_affected, column_errors);
    enter(phase, Phase::Finalizing);
    drop(rows);
    if let Err(err) = outcome {
        record_error(error, err);
    }

    trace_query(db.config(), sql, sql_vars.len(), *rows_affected, started.elapsed());
}

fn trace_query(
    config: &crate::db::Config,
    sql: &str,
    params: usize,
    rows: u64,
    elapsed: Duration,
) {
    let elapsed_us = elapsed.as_micros().min(u64::MAX as u128) as u64;
    if config.log_sql {
        debug!(sql, params, rows, elapsed_us, "query.trace");
    }
    if let Some(threshold) = config.slow_query_threshold_ms {
        if elapsed >= Duration::from_millis(threshold) {
            warn!(sql, rows, elapsed_us, threshold_ms = threshold, "query.slow");
        }
    }
}

/// Runs the destination's `after_find` hook when the call has not failed.
pub fn after_query_callback(scope: &mut Scope<'_>) {
    if scope.has_error() {
        return;
    }
    let db = scope.db;
    let Scope {
        value,
        error,
        phase,
        ..
    } = scope;
    let Ok(target) = value.target() else {
        return;
    };
    if !target.model(db.models()).has_after_find() {
        return;
    }
    enter(phase, Phase::AfterHook);
    let result = match target {
        Target::Record(record) => record.after_find(),
        Target::Sequence(seq) => seq.for_each_record(&mut |record: &mut dyn RecordTarget| record.after_find()),
    };
    trace!(ok = result.is_ok(), "query.after_find");
    if let Err(err) = result {
        record_error(error, err);
    }
}
