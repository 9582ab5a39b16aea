use async_trait::async_trait;
use tabulon_core::{AugmentationConfig, ColumnDescriptor};

use super::simulate_latency;
use crate::error::{JobError, JobResult};
use crate::handlers::RowPredictor;
use crate::results::{Prediction, Trend};

const GROWTH_PER_PERIOD: f64 = 0.05;

/// Flat-rate projection of the first predictive (or numeric) column
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedPredictor;

#[async_trait]
impl<T: Send + Sync + 'static> RowPredictor<T> for SimulatedPredictor {
    async fn predict_row(
        &self,
        record: &T,
        columns: &[ColumnDescriptor<T>],
        config: &AugmentationConfig,
    ) -> JobResult<Prediction> {
        simulate_latency(config).await;

        let column = columns
            .iter()
            .find(|c| c.capabilities.predictive)
            .or_else(|| columns.iter().find(|c| c.is_numeric))
            .ok_or_else(|| JobError::failed("No predictive column"))?;

        let current = column
            .value(record)
            .as_f64()
            .ok_or_else(|| JobError::failed(format!("{} has no numeric value", column.id)))?;

        let horizon = config.prediction_horizon.max(1);
        let growth = GROWTH_PER_PERIOD * horizon as f64;
        let predicted = current + current.abs() * growth;
        let trend = if predicted > current {
            Trend::Up
        } else if predicted < current {
            Trend::Down
        } else {
            Trend::Flat
        };

        Ok(Prediction {
            column_id: column.id.clone(),
            current,
            predicted,
            confidence: (0.9 - 0.05 * horizon as f64).clamp(0.1, 0.95),
            trend,
            explanation: format!(
                "Projected {:+.1}% over {} period(s)",
                growth * 100.0,
                horizon
            ),
        })
    }
}
