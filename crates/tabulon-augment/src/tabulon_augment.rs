//! Tabulon Augment - asynchronous enrichment jobs
//!
//! Insights, predictions, anomaly flags, validation, personalization and
//! natural-language queries run as independent tokio tasks against a
//! snapshot of the dataset. Results are stamped with the dataset version
//! they were computed for and merged only while that version is current.
//!
//! - `handlers` - `async_trait` contracts callers implement
//! - `scheduler` - Spawning, stale-result suppression and merging
//! - `results` - Payload types and per-job status
//! - `simulated` - Deterministic default handlers (not for production)

mod error;
pub mod handlers;
pub mod results;
pub mod scheduler;
pub mod simulated;

pub use error::{JobError, JobResult};
pub use handlers::{
    AnomalyDetector, FeedbackSink, Handlers, InsightGenerator, NaturalLanguageQuery,
    Personalizer, RowPredictor, RowValidator,
};
pub use results::{
    AnomalyReport, AugmentationState, Feedback, Insight, JobKind, JobSlot, JobState, JobStatus,
    PersonalizationResult, Prediction, RowResults, Severity, Trend, ValidationResult,
};
pub use scheduler::{AugmentationScheduler, JobDisposition, JobReport, Snapshot};
