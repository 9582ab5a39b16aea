//! Tabulon Core - shared types for the tabular view engine
//!
//! This crate provides the types every other Tabulon crate depends on:
//!
//! - `CellValue` - A dynamically typed cell extracted from a record
//! - `RowKey` / `RowIdentity` - Stable per-record identity
//! - `ColumnDescriptor` - Declarative column schema with capability flags
//! - `EngineConfig` / `FeatureFlags` - Engine configuration
//! - `EngineError` - Error type for view transitions
//! - `logging` - Tracing bootstrap for binaries and tests

mod column;
mod config;
mod error;
pub mod logging;
mod row;
mod value;

pub use column::*;
pub use config::*;
pub use error::*;
pub use row::*;
pub use value::*;
