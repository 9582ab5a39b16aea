//! Pluggable augmentation handlers
//!
//! Each job type is an `async_trait` so callers can supply any
//! implementation (a model client, a rules engine, a test double). A job
//! whose handler is not supplied falls back to the matching type in
//! [`crate::simulated`].

use std::sync::Arc;

use async_trait::async_trait;
use tabulon_core::{AugmentationConfig, ColumnDescriptor, RowKey};

use crate::error::JobResult;
use crate::results::{
    AnomalyReport, Feedback, Insight, PersonalizationResult, Prediction, ValidationResult,
};
use crate::simulated;

/// Dataset-level insight generation
#[async_trait]
pub trait InsightGenerator<T>: Send + Sync + 'static {
    async fn generate_insights(
        &self,
        records: &[T],
        columns: &[ColumnDescriptor<T>],
        config: &AugmentationConfig,
    ) -> JobResult<Vec<Insight>>;
}

/// Per-row predictive values
#[async_trait]
pub trait RowPredictor<T>: Send + Sync + 'static {
    async fn predict_row(
        &self,
        record: &T,
        columns: &[ColumnDescriptor<T>],
        config: &AugmentationConfig,
    ) -> JobResult<Prediction>;
}

/// Outlier detection over the whole snapshot
///
/// `keys[i]` is the row key of `records[i]`. Every report must name the row
/// its value came from; reports with keys outside the snapshot are dropped.
#[async_trait]
pub trait AnomalyDetector<T>: Send + Sync + 'static {
    async fn detect_anomalies(
        &self,
        records: &[T],
        keys: &[RowKey],
        columns: &[ColumnDescriptor<T>],
        config: &AugmentationConfig,
    ) -> JobResult<Vec<AnomalyReport>>;
}

/// Per-row validation suggestions
#[async_trait]
pub trait RowValidator<T>: Send + Sync + 'static {
    async fn validate_row(
        &self,
        record: &T,
        columns: &[ColumnDescriptor<T>],
    ) -> JobResult<Vec<ValidationResult>>;
}

/// Column reordering and filter overlay for the current dataset
#[async_trait]
pub trait Personalizer<T>: Send + Sync + 'static {
    async fn personalize(
        &self,
        records: &[T],
        columns: &[ColumnDescriptor<T>],
    ) -> JobResult<PersonalizationResult>;
}

/// Natural-language query producing a replacement working set
#[async_trait]
pub trait NaturalLanguageQuery<T>: Send + Sync + 'static {
    async fn query(
        &self,
        query: &str,
        records: &[T],
        columns: &[ColumnDescriptor<T>],
    ) -> JobResult<Vec<T>>;
}

#[async_trait]
pub trait FeedbackSink: Send + Sync + 'static {
    async fn submit_feedback(&self, feedback: Feedback) -> JobResult<()>;
}

/// Caller-supplied handlers. Unset entries use the simulated defaults.
pub struct Handlers<T> {
    insights: Option<Arc<dyn InsightGenerator<T>>>,
    predictor: Option<Arc<dyn RowPredictor<T>>>,
    anomalies: Option<Arc<dyn AnomalyDetector<T>>>,
    validator: Option<Arc<dyn RowValidator<T>>>,
    personalizer: Option<Arc<dyn Personalizer<T>>>,
    nlq: Option<Arc<dyn NaturalLanguageQuery<T>>>,
    feedback: Option<Arc<dyn FeedbackSink>>,
}

impl<T> Default for Handlers<T> {
    fn default() -> Self {
        Self {
            insights: None,
            predictor: None,
            anomalies: None,
            validator: None,
            personalizer: None,
            nlq: None,
            feedback: None,
        }
    }
}

impl<T> std::fmt::Debug for Handlers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("insights", &self.insights.is_some())
            .field("predictor", &self.predictor.is_some())
            .field("anomalies", &self.anomalies.is_some())
            .field("validator", &self.validator.is_some())
            .field("personalizer", &self.personalizer.is_some())
            .field("nlq", &self.nlq.is_some())
            .field("feedback", &self.feedback.is_some())
            .finish()
    }
}

impl<T> Handlers<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_insights(mut self, handler: impl InsightGenerator<T>) -> Self {
        self.insights = Some(Arc::new(handler));
        self
    }

    pub fn with_predictor(mut self, handler: impl RowPredictor<T>) -> Self {
        self.predictor = Some(Arc::new(handler));
        self
    }

    pub fn with_anomaly_detector(mut self, handler: impl AnomalyDetector<T>) -> Self {
        self.anomalies = Some(Arc::new(handler));
        self
    }

    pub fn with_validator(mut self, handler: impl RowValidator<T>) -> Self {
        self.validator = Some(Arc::new(handler));
        self
    }

    pub fn with_personalizer(mut self, handler: impl Personalizer<T>) -> Self {
        self.personalizer = Some(Arc::new(handler));
        self
    }

    pub fn with_nlq(mut self, handler: impl NaturalLanguageQuery<T>) -> Self {
        self.nlq = Some(Arc::new(handler));
        self
    }

    pub fn with_feedback(mut self, handler: impl FeedbackSink) -> Self {
        self.feedback = Some(Arc::new(handler));
        self
    }

    pub(crate) fn insights(&self) -> Arc<dyn InsightGenerator<T>> {
        self.insights
            .clone()
            .unwrap_or_else(|| Arc::new(simulated::SimulatedInsights))
    }

    pub(crate) fn predictor(&self) -> Arc<dyn RowPredictor<T>> {
        self.predictor
            .clone()
            .unwrap_or_else(|| Arc::new(simulated::SimulatedPredictor))
    }

    pub(crate) fn anomalies(&self) -> Arc<dyn AnomalyDetector<T>> {
        self.anomalies
            .clone()
            .unwrap_or_else(|| Arc::new(simulated::SimulatedAnomalyDetector))
    }

    pub(crate) fn validator(&self) -> Arc<dyn RowValidator<T>> {
        self.validator
            .clone()
            .unwrap_or_else(|| Arc::new(simulated::SimulatedValidator))
    }

    pub(crate) fn personalizer(&self) -> Arc<dyn Personalizer<T>> {
        self.personalizer
            .clone()
            .unwrap_or_else(|| Arc::new(simulated::SimulatedPersonalizer))
    }

    pub(crate) fn nlq(&self) -> Arc<dyn NaturalLanguageQuery<T>> {
        self.nlq
            .clone()
            .unwrap_or_else(|| Arc::new(simulated::SimulatedQuery))
    }

    pub(crate) fn feedback(&self) -> Arc<dyn FeedbackSink> {
        self.feedback
            .clone()
            .unwrap_or_else(|| Arc::new(simulated::LoggingFeedbackSink))
    }
}
