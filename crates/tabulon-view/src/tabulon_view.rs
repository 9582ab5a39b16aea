//! Tabulon View - the synchronous half of the engine
//!
//! Every function here is a pure, run-to-completion computation over an
//! in-memory snapshot:
//!
//! - `filter` - Free-text search and the AND/OR rule combinator
//! - `sorting` - Stable single-column ordering
//! - `pagination` - Page window over the filtered and sorted sequence
//! - `selection` - Row-key selection reconciled against the filtered view
//! - `projection` - Base and personalized column lists with visibility
//! - `audit` - Bounded in-memory audit trail
//! - `export` - CSV and JSON serialization of the visible view

pub mod audit;
pub mod export;
pub mod filter;
pub mod pagination;
pub mod projection;
pub mod selection;
pub mod sorting;

pub use audit::{AuditAction, AuditCallback, AuditEvent, AuditSink};
pub use export::{ExportOptions, FieldDelimiter, RecordDelimiter, TextQualifier};
pub use filter::{Combinator, FilterOperator, FilterRule, FilterState};
pub use pagination::PageWindow;
pub use projection::ColumnProjection;
pub use selection::SelectionTracker;
pub use sorting::{SortDirection, SortState};
