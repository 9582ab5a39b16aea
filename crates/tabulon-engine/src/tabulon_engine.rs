//! Tabulon Engine - a reducer-style tabular view engine
//!
//! `ViewEngine<T>` takes an arbitrary record type, a declarative column
//! schema and a row identity function, and produces a filtered, sorted,
//! paginated and selectable view while augmentation jobs annotate the same
//! records in the background.
//!
//! ```ignore
//! let mut engine = ViewEngine::builder(columns, |sale: &Sale| RowKey::from(sale.id))
//!     .records(sales)
//!     .build()?;
//! engine.dispatch(ViewAction::SetSort(Some(SortState::desc("sales"))))?;
//! engine.settle().await;
//! ```

mod engine;
mod events;
mod view;

pub use engine::{ViewEngine, ViewEngineBuilder};
pub use events::{ViewAction, ViewEvent, ViewObserver};
pub use view::ViewSnapshot;

pub use tabulon_augment::{Feedback, Handlers, JobDisposition, JobKind, JobReport, JobState};
pub use tabulon_core::{ColumnDescriptor, EngineConfig, EngineError, FeatureFlags, RowKey};
pub use tabulon_view::{FilterOperator, FilterRule, FilterState, SortDirection, SortState};
