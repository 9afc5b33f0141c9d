use serde::{Deserialize, Serialize};

use crate::statement::DialectKind;
use crate::types::{PenumbraError, Result};

/// What to do when a single column cannot be scanned into its field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanErrorPolicy {
    /// Log the failure, leave the field untouched and keep going.
    #[default]
    Skip,
    /// Record a scan error and stop iterating.
    Abort,
}

/// Runtime options of a [`Db`](crate::Db) handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Policy for per-column scan failures.
    pub scan_errors: ScanErrorPolicy,
    /// Emit a `query.trace` event for every executed statement.
    pub log_sql: bool,
    /// Statements slower than this are logged at warn level.
    pub slow_query_threshold_ms: Option<u64>,
    /// Identifier quoting and placeholder style.
    pub dialect: DialectKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_errors: ScanErrorPolicy::Skip,
            log_sql: true,
            slow_query_threshold_ms: Some(200),
            dialect: DialectKind::Ansi,
        }
    }
}

impl Config {
    /// Aborts the call on the first column that fails to scan.
    pub fn strict() -> Self {
        Self {
            scan_errors: ScanErrorPolicy::Abort,
            log_sql: true,
            slow_query_threshold_ms: Some(200),
            dialect: DialectKind::Ansi,
        }
    }

    /// No SQL tracing and no slow-query warnings.
    pub fn quiet() -> Self {
        Self {
            scan_errors: ScanErrorPolicy::Skip,
            log_sql: false,
            slow_query_threshold_ms: None,
            dialect: DialectKind::Ansi,
        }
    }

    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|err| PenumbraError::Config(err.to_string()))
    }
}
