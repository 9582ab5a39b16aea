//! Row selection
//!
//! Selection is keyed by `RowKey` and is always a subset of the keys in the
//! last computed filtered view. Any change to that view must go through
//! [`SelectionTracker::reconcile`].

use std::collections::HashSet;

use indexmap::IndexSet;
use tabulon_core::{EngineError, Result, RowKey};

#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    selected: IndexSet<RowKey>,
    multi_select: bool,
}

impl SelectionTracker {
    pub fn new(multi_select: bool) -> Self {
        Self {
            selected: IndexSet::new(),
            multi_select,
        }
    }

    pub fn is_multi_select(&self) -> bool {
        self.multi_select
    }

    /// Select exactly the keys of the current filtered view
    pub fn select_all<'a>(&mut self, filtered_keys: impl IntoIterator<Item = &'a RowKey>) -> Result<()> {
        if !self.multi_select {
            return Err(EngineError::FeatureDisabled("multiSelect"));
        }
        self.selected = filtered_keys.into_iter().cloned().collect();
        Ok(())
    }

    /// Flip one key. In single-select mode selecting a key drops the others.
    /// Returns whether the key is selected afterwards.
    pub fn toggle(&mut self, key: RowKey) -> bool {
        if self.selected.shift_remove(&key) {
            return false;
        }
        if !self.multi_select {
            self.selected.clear();
        }
        self.selected.insert(key);
        true
    }

    pub fn clear(&mut self) -> bool {
        let had_selection = !self.selected.is_empty();
        self.selected.clear();
        had_selection
    }

    pub fn is_selected(&self, key: &RowKey) -> bool {
        self.selected.contains(key)
    }

    /// Selected keys in selection order
    pub fn selected_keys(&self) -> impl Iterator<Item = &RowKey> {
        self.selected.iter()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Intersect the selection with the new filtered key set.
    /// Returns true if any key was pruned.
    pub fn reconcile(&mut self, filtered_keys: &HashSet<RowKey>) -> bool {
        let before = self.selected.len();
        self.selected.retain(|key| filtered_keys.contains(key));
        self.selected.len() != before
    }
}
