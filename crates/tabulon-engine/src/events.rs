//! View actions and notifications
//!
//! Every user-driven transition goes through [`ViewAction`] and
//! `ViewEngine::dispatch`. Observers receive [`ViewEvent`]s describing what
//! changed after the view has been recomputed.

use tabulon_augment::JobKind;
use tabulon_core::RowKey;
use tabulon_view::{FilterRule, FilterState, SortState};

/// A state transition requested by the caller
#[derive(Clone, Debug, PartialEq)]
pub enum ViewAction {
    /// Replace the free-text search query
    SetSearch(String),

    /// Replace the advanced filter rules
    SetFilter(FilterState),
    AddFilterRule(FilterRule),
    RemoveFilterRule(usize),
    ClearFilters,

    /// Set or clear the single sort key
    SetSort(Option<SortState>),

    /// Header click: none, then ascending, then descending, then none
    CycleSort(String),

    SetPage(usize),
    NextPage,
    PrevPage,

    /// Change rows per page. Resets to the first page.
    SetPageSize(usize),

    ToggleRow(RowKey),

    /// Select every row of the current filtered view (not the whole dataset)
    SelectAll,
    ClearSelection,

    SetColumnVisible { column_id: String, visible: bool },
    ShowAllColumns,
    HideAllColumns,

    /// Switch between the base and personalized column projections
    SetPersonalization(bool),
}

/// Notification delivered to the view observer
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    /// Search, rules or personalization overlay changed the filtered set
    FilterChanged { filtered_count: usize },

    SortChanged { sort: Option<SortState> },

    PageChanged { page_index: usize, page_count: usize },

    /// Selection changed, including pruning after the view narrowed
    SelectionChanged { selected: usize },

    /// The caller replaced the raw records
    DatasetReplaced { version: u64, row_count: usize },

    /// A natural-language query replaced the working set, or the working set
    /// was restored to the raw records (`query` is `None`)
    WorkingSetReplaced { query: Option<String>, row_count: usize },

    AugmentationApplied { kind: JobKind, version: u64 },
}

/// Observer callback for view events
pub type ViewObserver = Box<dyn Fn(&ViewEvent) + Send + Sync>;
