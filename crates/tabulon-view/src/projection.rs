//! Column projection and personalization
//!
//! Two column orders are tracked: the caller-declared base order and an
//! optional personalized order. A toggle picks which one is active, together
//! with the personalized filter overlay. Visibility is keyed by column id and
//! is shared by both orders.

use std::collections::{HashMap, HashSet};

use crate::filter::FilterState;

#[derive(Debug, Clone, Default)]
pub struct ColumnProjection {
    base: Vec<String>,
    personalized: Option<Vec<String>>,
    overlay: FilterState,
    personalized_active: bool,
    visibility: HashMap<String, bool>,
}

impl ColumnProjection {
    pub fn new(base: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let base: Vec<String> = base.into_iter().map(Into::into).collect();
        let visibility = base.iter().map(|id| (id.clone(), true)).collect();
        Self {
            base,
            personalized: None,
            overlay: FilterState::default(),
            personalized_active: false,
            visibility,
        }
    }

    pub fn base_order(&self) -> &[String] {
        &self.base
    }

    pub fn personalized_order(&self) -> Option<&[String]> {
        self.personalized.as_deref()
    }

    pub fn is_personalized(&self) -> bool {
        self.personalized_active
    }

    /// Column order currently in effect
    pub fn active_order(&self) -> &[String] {
        match (&self.personalized, self.personalized_active) {
            (Some(order), true) => order,
            _ => &self.base,
        }
    }

    /// Overlay filters in effect (empty unless personalization is active)
    pub fn active_overlay(&self) -> Option<&FilterState> {
        (self.personalized_active && !self.overlay.is_empty()).then_some(&self.overlay)
    }

    /// Store a personalized projection.
    ///
    /// Unknown ids and duplicates are dropped, and base columns the
    /// personalized order forgot are appended in base order, so the
    /// personalized list is always a permutation of the base list.
    pub fn set_personalized(&mut self, order: Vec<String>, overlay: FilterState) {
        let known: HashSet<&str> = self.base.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let mut sanitized: Vec<String> = order
            .into_iter()
            .filter(|id| known.contains(id.as_str()) && seen.insert(id.clone()))
            .collect();
        for id in &self.base {
            if !seen.contains(id) {
                sanitized.push(id.clone());
            }
        }
        self.personalized = Some(sanitized);
        self.overlay = overlay;
    }

    /// Switch between base and personalized projections. Returns the new
    /// state; turning it on without a personalized list stays off. The
    /// stored overlay survives the switch and is only hidden while off.
    pub fn set_personalization(&mut self, enabled: bool) -> bool {
        self.personalized_active = enabled && self.personalized.is_some();
        self.personalized_active
    }

    /// Forget any personalized projection
    pub fn clear_personalized(&mut self) {
        self.personalized = None;
        self.personalized_active = false;
        self.overlay = FilterState::default();
    }

    /// Set a column's visibility. Returns false for unknown columns.
    pub fn set_visible(&mut self, column_id: &str, visible: bool) -> bool {
        match self.visibility.get_mut(column_id) {
            Some(current) => {
                *current = visible;
                true
            }
            None => false,
        }
    }

    /// Toggle a column's visibility, returning the new value
    pub fn toggle_visible(&mut self, column_id: &str) -> Option<bool> {
        let current = self.visibility.get_mut(column_id)?;
        *current = !*current;
        Some(*current)
    }

    /// Check if a column is visible. Unknown ids count as visible.
    pub fn is_visible(&self, column_id: &str) -> bool {
        self.visibility.get(column_id).copied().unwrap_or(true)
    }

    pub fn show_all(&mut self) {
        self.visibility.values_mut().for_each(|v| *v = true);
    }

    pub fn hide_all(&mut self) {
        self.visibility.values_mut().for_each(|v| *v = false);
    }

    /// Visible columns in the active order
    pub fn visible_columns(&self) -> Vec<&str> {
        self.active_order()
            .iter()
            .filter(|id| self.is_visible(id))
            .map(String::as_str)
            .collect()
    }

    /// Hidden columns in the active order
    pub fn hidden_columns(&self) -> Vec<&str> {
        self.active_order()
            .iter()
            .filter(|id| !self.is_visible(id))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterOperator, FilterRule};
    use pretty_assertions::assert_eq;

    fn projection() -> ColumnProjection {
        ColumnProjection::new(["name", "region", "sales", "margin"])
    }

    fn overlay() -> FilterState {
        FilterState::default().with_rule(FilterRule::new(
            1,
            "sales",
            FilterOperator::GreaterThan,
            "0",
        ))
    }

    #[test]
    fn test_all_columns_visible_by_default() {
        let projection = projection();
        assert_eq!(projection.visible_columns(), vec!["name", "region", "sales", "margin"]);
        assert!(projection.is_visible("unknown"));
    }

    #[test]
    fn test_personalized_order_is_sanitized() {
        let mut projection = projection();
        projection.set_personalized(
            vec![
                "sales".to_string(),
                "bogus".to_string(),
                "sales".to_string(),
                "name".to_string(),
            ],
            FilterState::default(),
        );
        assert_eq!(
            projection.personalized_order().unwrap(),
            &["sales", "name", "region", "margin"]
        );
    }

    #[test]
    fn test_toggle_restores_base_and_hides_overlay() {
        let mut projection = projection();
        projection.set_personalized(vec!["margin".to_string(), "sales".to_string()], overlay());

        assert!(projection.set_personalization(true));
        assert_eq!(projection.active_order(), &["margin", "sales", "name", "region"]);
        assert!(projection.active_overlay().is_some());

        assert!(!projection.set_personalization(false));
        assert_eq!(projection.active_order(), &["name", "region", "sales", "margin"]);
        assert!(projection.active_overlay().is_none());
        assert_eq!(projection.base_order(), &["name", "region", "sales", "margin"]);

        assert!(projection.set_personalization(true));
        assert_eq!(projection.active_overlay(), Some(&overlay()));
    }

    #[test]
    fn test_clear_personalized_drops_overlay() {
        let mut projection = projection();
        projection.set_personalized(vec!["sales".to_string()], overlay());
        projection.set_personalization(true);
        projection.clear_personalized();

        assert!(!projection.set_personalization(true));
        assert!(projection.active_overlay().is_none());
        assert!(projection.personalized_order().is_none());
    }

    #[test]
    fn test_personalization_without_list_stays_off() {
        let mut projection = projection();
        assert!(!projection.set_personalization(true));
        assert!(!projection.is_personalized());
    }

    #[test]
    fn test_visibility_independent_of_active_list() {
        let mut projection = projection();
        projection.set_visible("region", false);
        projection.set_personalized(vec!["region".to_string(), "name".to_string()], FilterState::default());
        projection.set_personalization(true);

        assert_eq!(projection.visible_columns(), vec!["name", "sales", "margin"]);
        assert_eq!(projection.hidden_columns(), vec!["region"]);
        assert_eq!(projection.toggle_visible("region"), Some(true));
        assert_eq!(projection.toggle_visible("bogus"), None);
    }

    #[test]
    fn test_show_and_hide_all() {
        let mut projection = projection();
        projection.hide_all();
        assert!(projection.visible_columns().is_empty());
        projection.show_all();
        assert_eq!(projection.visible_columns().len(), 4);
        assert!(!projection.set_visible("bogus", false));
    }
}
