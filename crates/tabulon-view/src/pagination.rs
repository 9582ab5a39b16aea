//! Page window over the filtered and sorted sequence

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tabulon_core::{EngineError, Result};

/// Current page index and size. The index is always kept inside
/// `[0, page_count - 1]` for the total it was last clamped against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    page_index: usize,
    page_size: usize,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: 25,
        }
    }
}

impl PageWindow {
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(EngineError::InvalidPageSize(page_size));
        }
        Ok(Self {
            page_index: 0,
            page_size,
        })
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages for `total` rows; an empty view still has one (empty) page
    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    /// Move to `page_index`, clamped against `total`
    pub fn set_page(&mut self, page_index: usize, total: usize) {
        self.page_index = page_index.min(self.page_count(total) - 1);
    }

    /// Change the page size; the window always restarts at page 0
    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if page_size == 0 {
            return Err(EngineError::InvalidPageSize(page_size));
        }
        self.page_size = page_size;
        self.page_index = 0;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.page_index = 0;
    }

    /// Pull the index back inside the valid range after the total shrank.
    /// Returns true if the index changed.
    pub fn clamp(&mut self, total: usize) -> bool {
        let max_index = self.page_count(total) - 1;
        if self.page_index > max_index {
            self.page_index = max_index;
            return true;
        }
        false
    }

    pub fn has_next(&self, total: usize) -> bool {
        self.page_index + 1 < self.page_count(total)
    }

    pub fn has_prev(&self) -> bool {
        self.page_index > 0
    }

    /// Advance one page if possible, returning whether the index moved
    pub fn next(&mut self, total: usize) -> bool {
        if self.has_next(total) {
            self.page_index += 1;
            return true;
        }
        false
    }

    pub fn prev(&mut self) -> bool {
        if self.has_prev() {
            self.page_index -= 1;
            return true;
        }
        false
    }

    /// Positions covered by the current page for `total` rows
    pub fn range(&self, total: usize) -> Range<usize> {
        let start = (self.page_index * self.page_size).min(total);
        let end = (start + self.page_size).min(total);
        start..end
    }

    /// The slice of `items` on the current page
    pub fn slice<'a, I>(&self, items: &'a [I]) -> &'a [I] {
        &items[self.range(items.len())]
    }
}

/// One-shot page computation: `page(records, page_index, page_size)`.
/// Out-of-range pages are empty rather than clamped.
pub fn page<I>(items: &[I], page_index: usize, page_size: usize) -> &[I] {
    if page_size == 0 {
        return &[];
    }
    let start = page_index.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        let window = PageWindow::new(10).unwrap();
        assert_eq!(window.page_count(0), 1);
        assert_eq!(window.page_count(10), 1);
        assert_eq!(window.page_count(11), 2);
    }

    #[test]
    fn test_slice_last_partial_page() {
        let items: Vec<u32> = (0..7).collect();
        let mut window = PageWindow::new(3).unwrap();
        window.set_page(2, items.len());
        assert_eq!(window.slice(&items), &[6]);
    }

    #[test]
    fn test_set_page_clamps() {
        let mut window = PageWindow::new(5).unwrap();
        window.set_page(10, 12);
        assert_eq!(window.page_index(), 2);
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut window = PageWindow::new(2).unwrap();
        window.set_page(4, 10);
        assert!(window.clamp(3));
        assert_eq!(window.page_index(), 1);
        assert!(window.clamp(0));
        assert_eq!(window.page_index(), 0);
        assert!(!window.clamp(0));
    }

    #[test]
    fn test_page_size_change_resets_index() {
        let mut window = PageWindow::new(2).unwrap();
        window.set_page(3, 10);
        window.set_page_size(4).unwrap();
        assert_eq!(window.page_index(), 0);
        assert_eq!(window.set_page_size(0), Err(EngineError::InvalidPageSize(0)));
        assert_eq!(window.page_size(), 4);
    }

    #[test]
    fn test_next_prev() {
        let mut window = PageWindow::new(2).unwrap();
        assert!(!window.prev());
        assert!(window.next(3));
        assert!(!window.next(3));
        assert!(window.prev());
        assert_eq!(window.page_index(), 0);
    }

    #[test]
    fn test_one_shot_page() {
        let items = [1, 2, 3];
        assert_eq!(page(&items, 1, 1), &[2]);
        assert_eq!(page(&items, 5, 1), &[] as &[i32]);
        assert_eq!(page(&items, 0, 0), &[] as &[i32]);
    }
}
