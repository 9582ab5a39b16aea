//! Simulated handlers
//!
//! **Not for production.** These are deterministic stand-ins used when a
//! caller enables a feature without supplying a handler. They make the
//! engine usable in demos and tests; they do not model anything.

mod anomalies;
mod insights;
mod nlq;
mod personalizer;
mod predictor;
mod validator;

use std::time::Duration;

use async_trait::async_trait;
use tabulon_core::{AugmentationConfig, ColumnDescriptor};

use crate::error::JobResult;
use crate::handlers::FeedbackSink;
use crate::results::Feedback;

pub use anomalies::SimulatedAnomalyDetector;
pub use insights::SimulatedInsights;
pub use nlq::SimulatedQuery;
pub use personalizer::SimulatedPersonalizer;
pub use predictor::SimulatedPredictor;
pub use validator::SimulatedValidator;

/// Feedback sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingFeedbackSink;

#[async_trait]
impl FeedbackSink for LoggingFeedbackSink {
    async fn submit_feedback(&self, feedback: Feedback) -> JobResult<()> {
        tracing::info!(
            job = %feedback.job,
            row_key = ?feedback.row_key,
            helpful = feedback.helpful,
            "Feedback received"
        );
        Ok(())
    }
}

async fn simulate_latency(config: &AugmentationConfig) {
    if config.simulated_latency_ms > 0 {
        tokio::time::sleep(Duration::from_millis(config.simulated_latency_ms)).await;
    }
}

/// `(row index, value)` for every row with a numeric value in `column`
fn numeric_values<T>(records: &[T], column: &ColumnDescriptor<T>) -> Vec<(usize, f64)> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| column.value(record).as_f64().map(|v| (index, v)))
        .collect()
}

/// Summary statistics of a numeric column
#[derive(Debug, Clone, Copy, PartialEq)]
struct Stats {
    count: usize,
    mean: f64,
    std_dev: f64,
    min: f64,
    max: f64,
}

impl Stats {
    fn of(values: &[(usize, f64)]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().map(|(_, v)| v).sum::<f64>() / count as f64;
        let variance = values.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let min = values.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
        let max = values.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count,
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }

    /// Coefficient of variation, zero when the mean is zero
    fn variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean).abs()
        }
    }

    fn z_score(&self, value: f64) -> Option<f64> {
        (self.std_dev > 0.0).then(|| (value - self.mean) / self.std_dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stats() {
        let stats = Stats::of(&[(0, 2.0), (1, 4.0), (2, 4.0), (3, 4.0), (4, 5.0), (5, 5.0), (6, 7.0), (7, 9.0)])
            .unwrap();
        assert_eq!(stats.count, 8);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std_dev, 2.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.z_score(9.0), Some(2.0));
    }

    #[test]
    fn test_stats_degenerate() {
        assert!(Stats::of(&[]).is_none());
        let flat = Stats::of(&[(0, 3.0), (1, 3.0)]).unwrap();
        assert_eq!(flat.z_score(3.0), None);
        assert_eq!(flat.variation(), 0.0);
    }
}
