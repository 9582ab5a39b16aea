//! Read-only view of the engine state

use tabulon_core::{ColumnDescriptor, RowKey};
use tabulon_view::SortState;

/// Everything a renderer needs for one frame
///
/// Borrowed from the engine, so it is always consistent with the latest
/// committed state.
#[derive(Debug)]
pub struct ViewSnapshot<'a, T> {
    /// Visible columns in the active order
    pub columns: Vec<&'a ColumnDescriptor<T>>,
    /// Records on the current page
    pub rows: Vec<&'a T>,
    pub row_keys: Vec<&'a RowKey>,
    pub filtered_count: usize,
    /// Size of the working set (raw records or the query result)
    pub total_count: usize,
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub sort: Option<&'a SortState>,
    pub selected_count: usize,
    pub version: u64,
    pub personalized: bool,
    /// Active natural-language query, if the working set came from one
    pub query: Option<&'a str>,
    /// Error of the last failed natural-language query
    pub query_error: Option<&'a str>,
}

impl<T> ViewSnapshot<'_, T> {
    pub fn has_next_page(&self) -> bool {
        self.page_index + 1 < self.page_count
    }

    pub fn has_prev_page(&self) -> bool {
        self.page_index > 0
    }

    pub fn is_empty(&self) -> bool {
        self.filtered_count == 0
    }
}
