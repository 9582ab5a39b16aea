use async_trait::async_trait;
use tabulon_core::{AugmentationConfig, ColumnDescriptor};

use super::{Stats, numeric_values, simulate_latency};
use crate::error::JobResult;
use crate::handlers::InsightGenerator;
use crate::results::{Insight, Severity};

/// Per-column averages and spread warnings for numeric columns
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedInsights;

#[async_trait]
impl<T: Send + Sync + 'static> InsightGenerator<T> for SimulatedInsights {
    async fn generate_insights(
        &self,
        records: &[T],
        columns: &[ColumnDescriptor<T>],
        config: &AugmentationConfig,
    ) -> JobResult<Vec<Insight>> {
        simulate_latency(config).await;

        if records.is_empty() {
            return Ok(vec![Insight {
                id: "dataset-empty".to_string(),
                title: "No records".to_string(),
                description: "The dataset is empty".to_string(),
                severity: Severity::Info,
                confidence: 1.0,
                column_id: None,
            }]);
        }

        let mut insights = Vec::new();
        for column in columns.iter().filter(|c| c.is_numeric) {
            let values = numeric_values(records, column);
            let Some(stats) = Stats::of(&values) else {
                continue;
            };
            let coverage = stats.count as f64 / records.len() as f64;

            insights.push(Insight {
                id: format!("{}-average", column.id),
                title: format!("Average {}", column.label),
                description: format!(
                    "{} averages {:.2} across {} rows (min {:.2}, max {:.2})",
                    column.label, stats.mean, stats.count, stats.min, stats.max
                ),
                severity: Severity::Info,
                confidence: coverage,
                column_id: Some(column.id.clone()),
            });

            if stats.variation() > 0.5 {
                insights.push(Insight {
                    id: format!("{}-spread", column.id),
                    title: format!("Wide spread in {}", column.label),
                    description: format!(
                        "{} varies by {:.0}% around its mean",
                        column.label,
                        stats.variation() * 100.0
                    ),
                    severity: Severity::Medium,
                    confidence: (0.6 + 0.3 * coverage).min(0.95),
                    column_id: Some(column.id.clone()),
                });
            }
        }

        insights.retain(|insight| insight.confidence >= config.confidence_threshold);
        Ok(insights)
    }
}
