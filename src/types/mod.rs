//! Shared error and result types.

use thiserror::Error;

/// Boxed error returned by user hooks and external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PenumbraError>;

/// Failure to coerce a single column value into a field slot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot scan {found} into {expected}{}", detail_suffix(.detail))]
pub struct ScanError {
    /// Semantic type of the destination slot.
    pub expected: &'static str,
    /// Kind of the source value.
    pub found: &'static str,
    /// Optional parse or range detail.
    pub detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {detail}"),
        None => String::new(),
    }
}

impl ScanError {
    /// Builds a scan error without further detail.
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Self {
            expected,
            found,
            detail: None,
        }
    }

    /// Builds a scan error carrying a parse/range detail.
    pub fn with_detail(expected: &'static str, found: &'static str, detail: impl Into<String>) -> Self {
        Self {
            expected,
            found,
            detail: Some(detail.into()),
        }
    }
}

/// Errors surfaced by query execution.
#[derive(Debug, Error)]
pub enum PenumbraError {
    /// Destination is neither a single record nor a sequence of records.
    #[error("unsupported destination, expected a record or a sequence of records (got {type_name})")]
    UnsupportedDestination {
        /// Rust type name of the rejected destination.
        type_name: &'static str,
    },
    /// A single-record lookup produced zero rows.
    #[error("record not found")]
    RecordNotFound,
    /// The statement could not be built from the accumulated directives.
    #[error("statement error: {0}")]
    Statement(String),
    /// The executor or row iterator failed.
    #[error("execution error: {0}")]
    Execution(String),
    /// Error raised by the bundled SQLite driver.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// A column could not be scanned into its field.
    #[error("column '{column}': {source}")]
    Scan {
        /// Column name as reported by the row iterator.
        column: String,
        /// Underlying coercion failure.
        #[source]
        source: ScanError,
    },
    /// The post-load hook of the destination failed.
    #[error("after_find hook failed: {0}")]
    AfterFind(#[source] BoxError),
    /// An association preload failed.
    #[error("preload of '{association}' failed: {source}")]
    Preload {
        /// Association name that was requested.
        association: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
    /// A record's slots disagree with its described fields.
    #[error("schema mismatch: {0}")]
    Schema(String),
    /// A callback name was registered twice.
    #[error("callback '{0}' is already registered")]
    DuplicateCallback(String),
    /// A callback name was referenced but never registered.
    #[error("callback '{0}' is not registered")]
    UnknownCallback(String),
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PenumbraError {
    /// Returns true for the soft "no row" condition of single-record lookups.
    pub fn is_record_not_found(&self) -> bool {
        matches!(self, PenumbraError::RecordNotFound)
    }

    /// Builds an [`PenumbraError::Execution`] from any displayable error.
    pub fn execution(err: impl std::fmt::Display) -> Self {
        PenumbraError::Execution(err.to_string())
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            PenumbraError::UnsupportedDestination { .. } => "UnsupportedDestination",
            PenumbraError::RecordNotFound => "RecordNotFound",
            PenumbraError::Statement(_) => "Statement",
            PenumbraError::Execution(_) => "Execution",
            PenumbraError::Sqlite(_) => "Execution",
            PenumbraError::Scan { .. } => "Scan",
            PenumbraError::AfterFind(_) => "AfterFind",
            PenumbraError::Preload { .. } => "Preload",
            PenumbraError::Schema(_) => "Schema",
            PenumbraError::DuplicateCallback(_) => "DuplicateCallback",
            PenumbraError::UnknownCallback(_) => "UnknownCallback",
            PenumbraError::Config(_) => "Config",
        }
    }
}
