//! Augmentation payloads and per-job state

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabulon_core::RowKey;
use tabulon_view::FilterState;

/// The independently scheduled job types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    Insights,
    Predictions,
    Anomalies,
    Validation,
    Personalization,
    NaturalLanguageQuery,
    Feedback,
}

impl JobKind {
    /// Jobs fired on every dataset replacement
    pub fn dataset_jobs() -> &'static [JobKind] {
        &[
            JobKind::Insights,
            JobKind::Predictions,
            JobKind::Anomalies,
            JobKind::Validation,
            JobKind::Personalization,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Insights => "insights",
            JobKind::Predictions => "predictions",
            JobKind::Anomalies => "anomalies",
            JobKind::Validation => "validation",
            JobKind::Personalization => "personalization",
            JobKind::NaturalLanguageQuery => "naturalLanguageQuery",
            JobKind::Feedback => "feedback",
        }
    }

    /// Results keyed by row rather than by dataset
    pub fn is_row_scoped(&self) -> bool {
        matches!(
            self,
            JobKind::Predictions | JobKind::Anomalies | JobKind::Validation
        )
    }

    /// Feedback is not tied to a dataset version and is never discarded
    pub fn is_versioned(&self) -> bool {
        !matches!(self, JobKind::Feedback)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: f64,
    pub column_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// Predicted value for one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub column_id: String,
    pub current: f64,
    pub predicted: f64,
    pub confidence: f64,
    pub trend: Trend,
    pub explanation: String,
}

/// An outlier finding. Always scoped to the row the value belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub row_key: RowKey,
    pub column_id: String,
    pub value: f64,
    pub score: f64,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub column_id: String,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Alternate column order plus the filter overlay that goes with it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizationResult {
    pub columns: Vec<String>,
    pub filter_overlay: FilterState,
}

/// User feedback on an augmentation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub job: JobKind,
    pub row_key: Option<RowKey>,
    pub helpful: bool,
    pub comment: Option<String>,
}

/// Per-row results with per-row error markers
#[derive(Debug, Clone, PartialEq)]
pub struct RowResults<P> {
    pub values: HashMap<RowKey, P>,
    pub errors: HashMap<RowKey, String>,
}

impl<P> Default for RowResults<P> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            errors: HashMap::new(),
        }
    }
}

impl<P> RowResults<P> {
    pub fn get(&self, key: &RowKey) -> Option<&P> {
        self.values.get(key)
    }

    pub fn error(&self, key: &RowKey) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Applied,
    StaleDiscarded,
    Failed,
}

/// Externally visible status of one job kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: JobState,
    pub loading: bool,
    pub error: Option<String>,
    /// Dataset version of the latest run
    pub version: u64,
    /// Results dropped because they arrived for an outdated run
    pub stale_discards: u64,
}

/// Merged result of one job kind
///
/// The payload is immutable once merged; a later merge swaps in a new `Arc`
/// so readers never observe a partially written result.
#[derive(Debug)]
pub struct JobSlot<R> {
    status: JobStatus,
    run: u64,
    result: Option<Arc<R>>,
}

impl<R> Default for JobSlot<R> {
    fn default() -> Self {
        Self {
            status: JobStatus::default(),
            run: 0,
            result: None,
        }
    }
}

impl<R> JobSlot<R> {
    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.status.error.as_deref()
    }

    pub fn result(&self) -> Option<&Arc<R>> {
        self.result.as_ref()
    }

    pub(crate) fn run(&self) -> u64 {
        self.run
    }

    pub(crate) fn begin(&mut self, version: u64, run: u64) {
        self.run = run;
        self.status.state = JobState::Running;
        self.status.loading = true;
        self.status.error = None;
        self.status.version = version;
    }

    pub(crate) fn apply(&mut self, result: Option<R>, error: Option<String>) {
        self.result = result.map(Arc::new);
        self.status.state = JobState::Applied;
        self.status.loading = false;
        self.status.error = error;
    }

    pub(crate) fn fail(&mut self, result: Option<R>, error: String) {
        self.result = result.map(Arc::new);
        self.status.state = JobState::Failed;
        self.status.loading = false;
        self.status.error = Some(error);
    }

    /// Count a discarded result. Only the latest run owns the visible state.
    pub(crate) fn discard(&mut self, owns_state: bool) {
        self.status.stale_discards += 1;
        if owns_state {
            self.status.state = JobState::StaleDiscarded;
            self.status.loading = false;
        }
    }

    /// Forget the running job: its outcome will arrive as stale
    pub(crate) fn abandon(&mut self, run: u64) {
        self.run = run;
        self.status.state = JobState::Idle;
        self.status.loading = false;
        self.result = None;
    }

    /// Forget the result and status of a replaced dataset. A run still in
    /// flight keeps its run id so its outcome is counted as stale.
    pub(crate) fn invalidate(&mut self) {
        self.status.state = JobState::Idle;
        self.status.loading = false;
        self.status.error = None;
        self.result = None;
    }
}

/// All merged augmentation state
#[derive(Debug)]
pub struct AugmentationState<T> {
    pub insights: JobSlot<Vec<Insight>>,
    pub predictions: JobSlot<RowResults<Prediction>>,
    pub anomalies: JobSlot<RowResults<Vec<AnomalyReport>>>,
    pub validation: JobSlot<RowResults<Vec<ValidationResult>>>,
    pub personalization: JobSlot<PersonalizationResult>,
    pub nlq: JobSlot<Vec<T>>,
    pub feedback: JobSlot<()>,
}

impl<T> Default for AugmentationState<T> {
    fn default() -> Self {
        Self {
            insights: JobSlot::default(),
            predictions: JobSlot::default(),
            anomalies: JobSlot::default(),
            validation: JobSlot::default(),
            personalization: JobSlot::default(),
            nlq: JobSlot::default(),
            feedback: JobSlot::default(),
        }
    }
}

impl<T> AugmentationState<T> {
    pub fn status(&self, kind: JobKind) -> &JobStatus {
        match kind {
            JobKind::Insights => self.insights.status(),
            JobKind::Predictions => self.predictions.status(),
            JobKind::Anomalies => self.anomalies.status(),
            JobKind::Validation => self.validation.status(),
            JobKind::Personalization => self.personalization.status(),
            JobKind::NaturalLanguageQuery => self.nlq.status(),
            JobKind::Feedback => self.feedback.status(),
        }
    }

    pub(crate) fn run(&self, kind: JobKind) -> u64 {
        match kind {
            JobKind::Insights => self.insights.run(),
            JobKind::Predictions => self.predictions.run(),
            JobKind::Anomalies => self.anomalies.run(),
            JobKind::Validation => self.validation.run(),
            JobKind::Personalization => self.personalization.run(),
            JobKind::NaturalLanguageQuery => self.nlq.run(),
            JobKind::Feedback => self.feedback.run(),
        }
    }

    pub(crate) fn begin(&mut self, kind: JobKind, version: u64, run: u64) {
        match kind {
            JobKind::Insights => self.insights.begin(version, run),
            JobKind::Predictions => self.predictions.begin(version, run),
            JobKind::Anomalies => self.anomalies.begin(version, run),
            JobKind::Validation => self.validation.begin(version, run),
            JobKind::Personalization => self.personalization.begin(version, run),
            JobKind::NaturalLanguageQuery => self.nlq.begin(version, run),
            JobKind::Feedback => self.feedback.begin(version, run),
        }
    }

    pub(crate) fn discard(&mut self, kind: JobKind, owns_state: bool) {
        match kind {
            JobKind::Insights => self.insights.discard(owns_state),
            JobKind::Predictions => self.predictions.discard(owns_state),
            JobKind::Anomalies => self.anomalies.discard(owns_state),
            JobKind::Validation => self.validation.discard(owns_state),
            JobKind::Personalization => self.personalization.discard(owns_state),
            JobKind::NaturalLanguageQuery => self.nlq.discard(owns_state),
            JobKind::Feedback => self.feedback.discard(owns_state),
        }
    }

    pub(crate) fn abandon(&mut self, kind: JobKind, run: u64) {
        match kind {
            JobKind::Insights => self.insights.abandon(run),
            JobKind::Predictions => self.predictions.abandon(run),
            JobKind::Anomalies => self.anomalies.abandon(run),
            JobKind::Validation => self.validation.abandon(run),
            JobKind::Personalization => self.personalization.abandon(run),
            JobKind::NaturalLanguageQuery => self.nlq.abandon(run),
            JobKind::Feedback => self.feedback.abandon(run),
        }
    }

    /// Drop results that belong to a replaced dataset
    pub(crate) fn invalidate_dataset(&mut self) {
        self.insights.invalidate();
        self.predictions.invalidate();
        self.anomalies.invalidate();
        self.validation.invalidate();
        self.personalization.invalidate();
        self.nlq.invalidate();
    }

    pub fn is_loading(&self) -> bool {
        [
            JobKind::Insights,
            JobKind::Predictions,
            JobKind::Anomalies,
            JobKind::Validation,
            JobKind::Personalization,
            JobKind::NaturalLanguageQuery,
            JobKind::Feedback,
        ]
        .iter()
        .any(|kind| self.status(*kind).loading)
    }
}
