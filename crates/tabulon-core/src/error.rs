//! Error types for Tabulon

use thiserror::Error;

/// Errors raised by view transitions and engine construction
///
/// Filtering itself never fails: an unparseable numeric comparison is a
/// non-match. Everything here is a caller mistake caught at the boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column is not sortable: {0}")]
    ColumnNotSortable(String),

    #[error("Column is not filterable: {0}")]
    ColumnNotFilterable(String),

    #[error("Unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("Operator '{0}' requires a second value")]
    MissingSecondValue(String),

    #[error("Duplicate row key: {0}")]
    DuplicateRowKey(String),

    #[error("Unknown row key: {0}")]
    UnknownRowKey(String),

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("Feature disabled: {0}")]
    FeatureDisabled(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for Tabulon operations
pub type Result<T> = std::result::Result<T, EngineError>;
