use async_trait::async_trait;
use tabulon_core::ColumnDescriptor;
use tabulon_view::{FilterOperator, FilterRule, FilterState};

use crate::error::JobResult;
use crate::handlers::Personalizer;
use crate::results::PersonalizationResult;

/// Puts predictive, then anomaly-detectable, then numeric columns first and
/// hides rows without a value in the leading predictive column
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedPersonalizer;

#[async_trait]
impl<T: Send + Sync + 'static> Personalizer<T> for SimulatedPersonalizer {
    async fn personalize(
        &self,
        _records: &[T],
        columns: &[ColumnDescriptor<T>],
    ) -> JobResult<PersonalizationResult> {
        let mut ranked: Vec<&ColumnDescriptor<T>> = columns.iter().collect();
        // stable, so ties keep their declared order
        ranked.sort_by_key(|c| {
            if c.capabilities.predictive {
                0
            } else if c.capabilities.anomaly_detectable {
                1
            } else if c.is_numeric {
                2
            } else {
                3
            }
        });

        let mut filter_overlay = FilterState::default();
        if let Some(primary) = columns
            .iter()
            .find(|c| c.capabilities.predictive && c.is_filterable)
        {
            filter_overlay.add_rule(FilterRule::new(
                0,
                primary.id.clone(),
                FilterOperator::IsNotEmpty,
                "",
            ));
        }

        Ok(PersonalizationResult {
            columns: ranked.into_iter().map(|c| c.id.clone()).collect(),
            filter_overlay,
        })
    }
}
