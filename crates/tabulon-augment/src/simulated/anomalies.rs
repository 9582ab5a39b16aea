use async_trait::async_trait;
use tabulon_core::{AugmentationConfig, ColumnDescriptor, RowKey};

use super::{Stats, numeric_values, simulate_latency};
use crate::error::{JobError, JobResult};
use crate::handlers::AnomalyDetector;
use crate::results::{AnomalyReport, Severity};

/// z-score outliers over anomaly-detectable columns
///
/// Falls back to every numeric column when none is flagged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedAnomalyDetector;

#[async_trait]
impl<T: Send + Sync + 'static> AnomalyDetector<T> for SimulatedAnomalyDetector {
    async fn detect_anomalies(
        &self,
        records: &[T],
        keys: &[RowKey],
        columns: &[ColumnDescriptor<T>],
        config: &AugmentationConfig,
    ) -> JobResult<Vec<AnomalyReport>> {
        simulate_latency(config).await;

        if records.len() != keys.len() {
            return Err(JobError::failed("Row keys do not match records"));
        }

        let flagged: Vec<&ColumnDescriptor<T>> = columns
            .iter()
            .filter(|c| c.capabilities.anomaly_detectable)
            .collect();
        let candidates = if flagged.is_empty() {
            columns.iter().filter(|c| c.is_numeric).collect()
        } else {
            flagged
        };

        let mut reports = Vec::new();
        for column in candidates {
            let values = numeric_values(records, column);
            let Some(stats) = Stats::of(&values) else {
                continue;
            };
            for (index, value) in values {
                let Some(z) = stats.z_score(value) else {
                    continue;
                };
                if z.abs() < config.anomaly_z_threshold {
                    continue;
                }
                reports.push(AnomalyReport {
                    row_key: keys[index].clone(),
                    column_id: column.id.clone(),
                    value,
                    score: z,
                    severity: if z.abs() >= 3.0 {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    message: format!(
                        "{} of {:.2} is {:.1} standard deviations from the mean {:.2}",
                        column.label,
                        value,
                        z.abs(),
                        stats.mean
                    ),
                });
            }
        }
        Ok(reports)
    }
}
