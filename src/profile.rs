//! Opt-in timing counters for the phases of a query call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of query profiling counters.
///
/// Profiling is enabled via the `PENUMBRA_PROFILE` environment variable and
/// tracks where time goes across the phases of a query call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryProfileSnapshot {
    /// Total nanoseconds spent rendering statements.
    pub build_ns: u64,
    /// Number of statements rendered.
    pub build_count: u64,
    /// Total nanoseconds spent waiting on the executor.
    pub execute_ns: u64,
    /// Number of executor calls.
    pub execute_count: u64,
    /// Total nanoseconds spent scanning rows into destinations.
    pub scan_ns: u64,
    /// Number of rows scanned.
    pub scan_count: u64,
}

#[derive(Default)]
struct QueryProfileCounters {
    build_ns: AtomicU64,
    build_count: AtomicU64,
    execute_ns: AtomicU64,
    execute_count: AtomicU64,
    scan_ns: AtomicU64,
    scan_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<QueryProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("PENUMBRA_PROFILE").is_some())
}

fn counters() -> Option<&'static QueryProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(QueryProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum QueryProfileKind {
    Build,
    Execute,
    Scan,
}

pub(crate) fn record_profile_timer(kind: QueryProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    let (ns, count) = match kind {
        QueryProfileKind::Build => (&counters.build_ns, &counters.build_count),
        QueryProfileKind::Execute => (&counters.execute_ns, &counters.execute_count),
        QueryProfileKind::Scan => (&counters.scan_ns, &counters.scan_count),
    };
    ns.fetch_add(nanos, Ordering::Relaxed);
    count.fetch_add(1, Ordering::Relaxed);
}

/// Returns the current counters, or `None` when profiling is disabled.
pub fn profile_snapshot() -> Option<QueryProfileSnapshot> {
    let counters = counters()?;
    Some(QueryProfileSnapshot {
        build_ns: counters.build_ns.load(Ordering::Relaxed),
        build_count: counters.build_count.load(Ordering::Relaxed),
        execute_ns: counters.execute_ns.load(Ordering::Relaxed),
        execute_count: counters.execute_count.load(Ordering::Relaxed),
        scan_ns: counters.scan_ns.load(Ordering::Relaxed),
        scan_count: counters.scan_count.load(Ordering::Relaxed),
    })
}

/// Resets all counters to zero.
pub fn profile_reset() {
    if let Some(counters) = counters() {
        for counter in [
            &counters.build_ns,
            &counters.build_count,
            &counters.execute_ns,
            &counters.execute_count,
            &counters.scan_ns,
            &counters.scan_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
