//! Version-stamped augmentation scheduler
//!
//! Jobs are fire-and-forget tokio tasks. Each one captures the dataset
//! version and a per-kind run number when it is triggered and reports back
//! over an unbounded channel. The owner merges outcomes with [`poll`],
//! [`next_outcome`] or [`settle`]; a merge is the only point where job
//! results touch shared state, and it rejects any outcome whose version or
//! run is no longer current.
//!
//! [`poll`]: AugmentationScheduler::poll
//! [`next_outcome`]: AugmentationScheduler::next_outcome
//! [`settle`]: AugmentationScheduler::settle

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt, stream};
use serde_json::json;
use tabulon_core::{AugmentationConfig, ColumnDescriptor, EngineError, FeatureFlags, RowKey};
use tabulon_view::AuditAction;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::{JobError, JobResult};
use crate::handlers::Handlers;
use crate::results::{
    AnomalyReport, AugmentationState, Feedback, Insight, JobKind, JobSlot, JobStatus,
    PersonalizationResult, Prediction, RowResults, ValidationResult,
};

#[cfg(test)]
mod tests;

/// The data a job runs against
///
/// `keys[i]` is the row key of `records[i]`. Everything is behind an `Arc`
/// so a snapshot can be handed to many tasks without copying records.
pub struct Snapshot<T> {
    pub records: Arc<Vec<T>>,
    pub keys: Arc<Vec<RowKey>>,
    pub columns: Arc<Vec<ColumnDescriptor<T>>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            keys: self.keys.clone(),
            columns: self.columns.clone(),
        }
    }
}

impl<T> Snapshot<T> {
    pub fn new(
        records: Arc<Vec<T>>,
        keys: Arc<Vec<RowKey>>,
        columns: Arc<Vec<ColumnDescriptor<T>>>,
    ) -> Self {
        Self {
            records,
            keys,
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

type RowBatch<P> = Vec<(RowKey, JobResult<P>)>;

enum JobPayload<T> {
    Insights(JobResult<Vec<Insight>>),
    Predictions(JobResult<RowBatch<Prediction>>),
    Anomalies(JobResult<Vec<AnomalyReport>>),
    Validation(JobResult<RowBatch<Vec<ValidationResult>>>),
    Personalization(JobResult<PersonalizationResult>),
    Query(JobResult<Vec<T>>),
    Feedback(JobResult<()>),
}

impl<T> JobPayload<T> {
    fn failed(kind: JobKind, error: JobError) -> Self {
        match kind {
            JobKind::Insights => Self::Insights(Err(error)),
            JobKind::Predictions => Self::Predictions(Err(error)),
            JobKind::Anomalies => Self::Anomalies(Err(error)),
            JobKind::Validation => Self::Validation(Err(error)),
            JobKind::Personalization => Self::Personalization(Err(error)),
            JobKind::NaturalLanguageQuery => Self::Query(Err(error)),
            JobKind::Feedback => Self::Feedback(Err(error)),
        }
    }
}

struct JobOutcome<T> {
    kind: JobKind,
    version: u64,
    run: u64,
    keys: Arc<Vec<RowKey>>,
    payload: JobPayload<T>,
}

/// How a finished job was merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDisposition {
    /// Result merged. `error` summarizes per-row failures, if any.
    Applied { count: usize, error: Option<String> },
    Failed { error: String },
    StaleDiscarded { captured: u64, current: u64 },
}

/// One merged job outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub kind: JobKind,
    pub version: u64,
    pub run: u64,
    pub disposition: JobDisposition,
}

impl JobReport {
    pub fn is_applied(&self) -> bool {
        matches!(self.disposition, JobDisposition::Applied { .. })
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.disposition, JobDisposition::StaleDiscarded { .. })
    }

    pub fn audit_action(&self) -> AuditAction {
        match (&self.disposition, self.kind) {
            (_, JobKind::Feedback) => AuditAction::Feedback,
            (JobDisposition::Applied { .. }, _) => AuditAction::AugmentationCompleted,
            (JobDisposition::Failed { .. }, _) => AuditAction::AugmentationFailed,
            (JobDisposition::StaleDiscarded { .. }, _) => AuditAction::AugmentationDiscarded,
        }
    }

    pub fn audit_details(&self) -> serde_json::Value {
        match &self.disposition {
            JobDisposition::Applied { count, error } => json!({
                "type": self.kind,
                "version": self.version,
                "count": count,
                "error": error,
            }),
            JobDisposition::Failed { error } => json!({
                "type": self.kind,
                "version": self.version,
                "error": error,
            }),
            JobDisposition::StaleDiscarded { captured, current } => json!({
                "type": self.kind,
                "capturedVersion": captured,
                "currentVersion": current,
            }),
        }
    }
}

/// Runs augmentation jobs and merges their results
pub struct AugmentationScheduler<T> {
    handlers: Handlers<T>,
    config: Arc<AugmentationConfig>,
    features: FeatureFlags,
    version: u64,
    next_run: u64,
    in_flight: usize,
    state: AugmentationState<T>,
    tx: mpsc::UnboundedSender<JobOutcome<T>>,
    rx: mpsc::UnboundedReceiver<JobOutcome<T>>,
}

impl<T> std::fmt::Debug for AugmentationScheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AugmentationScheduler")
            .field("version", &self.version)
            .field("in_flight", &self.in_flight)
            .field("handlers", &self.handlers)
            .finish()
    }
}

impl<T> AugmentationScheduler<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(handlers: Handlers<T>, config: AugmentationConfig, features: FeatureFlags) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handlers,
            config: Arc::new(config),
            features,
            version: 0,
            next_run: 0,
            in_flight: 0,
            state: AugmentationState::default(),
            tx,
            rx,
        }
    }

    /// Current dataset version
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    pub fn state(&self) -> &AugmentationState<T> {
        &self.state
    }

    pub fn status(&self, kind: JobKind) -> &JobStatus {
        self.state.status(kind)
    }

    /// Number of spawned jobs whose outcome has not been merged yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    pub fn is_enabled(&self, kind: JobKind) -> bool {
        match kind {
            JobKind::Insights => self.features.insights,
            JobKind::Predictions => self.features.predictions,
            JobKind::Anomalies => self.features.anomalies,
            JobKind::Validation => self.features.validation,
            JobKind::Personalization => self.features.personalization,
            JobKind::NaturalLanguageQuery => self.features.nlq,
            JobKind::Feedback => true,
        }
    }

    /// Start a new dataset version.
    ///
    /// Must be called before the jobs for the new dataset are triggered so
    /// that late results of the previous version are recognized as stale.
    /// Results merged for the previous version are dropped.
    pub fn advance_version(&mut self) -> u64 {
        self.version += 1;
        self.state.invalidate_dataset();
        tracing::debug!(version = self.version, "dataset version advanced");
        self.version
    }

    /// Trigger every enabled dataset-scoped job, returning the kinds started
    #[tracing::instrument(skip_all, fields(version = self.version, rows = snapshot.len()))]
    pub fn trigger_dataset_jobs(&mut self, snapshot: &Snapshot<T>) -> Vec<JobKind> {
        let kinds: Vec<JobKind> = JobKind::dataset_jobs()
            .iter()
            .copied()
            .filter(|kind| self.is_enabled(*kind))
            .collect();
        for kind in &kinds {
            self.spawn_dataset_job(*kind, snapshot);
        }
        kinds
    }

    /// Re-run one dataset-scoped job against `snapshot`
    pub fn trigger(&mut self, kind: JobKind, snapshot: &Snapshot<T>) -> tabulon_core::Result<u64> {
        if !JobKind::dataset_jobs().contains(&kind) {
            return Err(EngineError::Config(format!(
                "{kind} is not a dataset job"
            )));
        }
        if !self.is_enabled(kind) {
            return Err(EngineError::FeatureDisabled(kind.as_str()));
        }
        Ok(self.spawn_dataset_job(kind, snapshot))
    }

    /// Run a natural-language query against `snapshot`
    #[tracing::instrument(skip(self, snapshot), fields(version = self.version))]
    pub fn run_query(&mut self, query: &str, snapshot: &Snapshot<T>) -> tabulon_core::Result<u64> {
        if !self.features.nlq {
            return Err(EngineError::FeatureDisabled("nlq"));
        }
        let handler = self.handlers.nlq();
        let snap = snapshot.clone();
        let query = query.to_string();
        Ok(self.spawn(JobKind::NaturalLanguageQuery, snapshot.keys.clone(), async move {
            JobPayload::Query(handler.query(&query, &snap.records, &snap.columns).await)
        }))
    }

    pub fn submit_feedback(&mut self, feedback: Feedback) -> u64 {
        let handler = self.handlers.feedback();
        self.spawn(JobKind::Feedback, Arc::default(), async move {
            JobPayload::Feedback(handler.submit_feedback(feedback).await)
        })
    }

    /// Stop tracking the current run of `kind` and drop its result.
    ///
    /// There is no hard cancellation: the task keeps running and its outcome
    /// is discarded as stale when it arrives.
    pub fn abandon(&mut self, kind: JobKind) {
        self.next_run += 1;
        self.state.abandon(kind, self.next_run);
    }

    /// Merge every outcome that has already arrived, without waiting
    pub fn poll(&mut self) -> Vec<JobReport> {
        let mut reports = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            reports.push(self.merge(outcome));
        }
        reports
    }

    /// Wait for and merge the next outcome. `None` when nothing is running.
    pub async fn next_outcome(&mut self) -> Option<JobReport> {
        if self.in_flight == 0 {
            return None;
        }
        let outcome = self.rx.recv().await?;
        Some(self.merge(outcome))
    }

    /// Merge outcomes until no job is running
    pub async fn settle(&mut self) -> Vec<JobReport> {
        let mut reports = Vec::new();
        while let Some(report) = self.next_outcome().await {
            reports.push(report);
        }
        reports
    }

    fn spawn_dataset_job(&mut self, kind: JobKind, snapshot: &Snapshot<T>) -> u64 {
        let config = self.config.clone();
        let snap = snapshot.clone();
        let keys = snapshot.keys.clone();
        let limit = self.config.max_concurrent_row_jobs.max(1);

        match kind {
            JobKind::Insights => {
                let handler = self.handlers.insights();
                self.spawn(kind, keys, async move {
                    JobPayload::Insights(
                        handler
                            .generate_insights(&snap.records, &snap.columns, &config)
                            .await,
                    )
                })
            }
            JobKind::Predictions => {
                let handler = self.handlers.predictor();
                self.spawn(kind, keys, async move {
                    let rows = (0..snap.len()).map(|index| {
                        let handler = handler.clone();
                        let snap = snap.clone();
                        let config = config.clone();
                        async move {
                            let result = guarded(handler.predict_row(
                                &snap.records[index],
                                &snap.columns,
                                &config,
                            ))
                            .await;
                            (snap.keys[index].clone(), result)
                        }
                    });
                    let batch = stream::iter(rows)
                        .buffer_unordered(limit)
                        .collect::<Vec<_>>()
                        .await;
                    JobPayload::Predictions(Ok(batch))
                })
            }
            JobKind::Anomalies => {
                let handler = self.handlers.anomalies();
                self.spawn(kind, keys, async move {
                    JobPayload::Anomalies(
                        handler
                            .detect_anomalies(&snap.records, &snap.keys, &snap.columns, &config)
                            .await,
                    )
                })
            }
            JobKind::Validation => {
                let handler = self.handlers.validator();
                self.spawn(kind, keys, async move {
                    let rows = (0..snap.len()).map(|index| {
                        let handler = handler.clone();
                        let snap = snap.clone();
                        async move {
                            let result =
                                guarded(handler.validate_row(&snap.records[index], &snap.columns))
                                    .await;
                            (snap.keys[index].clone(), result)
                        }
                    });
                    let batch = stream::iter(rows)
                        .buffer_unordered(limit)
                        .collect::<Vec<_>>()
                        .await;
                    JobPayload::Validation(Ok(batch))
                })
            }
            JobKind::Personalization => {
                let handler = self.handlers.personalizer();
                self.spawn(kind, keys, async move {
                    JobPayload::Personalization(
                        handler.personalize(&snap.records, &snap.columns).await,
                    )
                })
            }
            JobKind::NaturalLanguageQuery | JobKind::Feedback => {
                // Not dataset jobs; callers are filtered before reaching here.
                self.state.run(kind)
            }
        }
    }

    fn spawn<F>(&mut self, kind: JobKind, keys: Arc<Vec<RowKey>>, job: F) -> u64
    where
        F: Future<Output = JobPayload<T>> + Send + 'static,
    {
        self.next_run += 1;
        let run = self.next_run;
        let version = self.version;
        self.state.begin(kind, version, run);
        self.in_flight += 1;

        let tx = self.tx.clone();
        match Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(%kind, version, run, "job started");
                handle.spawn(async move {
                    let payload = AssertUnwindSafe(job)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| JobPayload::failed(kind, JobError::from_panic(panic)));
                    let _ = tx.send(JobOutcome {
                        kind,
                        version,
                        run,
                        keys,
                        payload,
                    });
                });
            }
            Err(_) => {
                tracing::warn!(%kind, "no tokio runtime, failing job");
                let _ = tx.send(JobOutcome {
                    kind,
                    version,
                    run,
                    keys,
                    payload: JobPayload::failed(kind, JobError::NoRuntime),
                });
            }
        }
        run
    }

    fn merge(&mut self, outcome: JobOutcome<T>) -> JobReport {
        self.in_flight = self.in_flight.saturating_sub(1);
        let JobOutcome {
            kind,
            version,
            run,
            keys,
            payload,
        } = outcome;

        let latest = self.state.run(kind);
        if kind.is_versioned() && (version != self.version || run != latest) {
            self.state.discard(kind, run == latest);
            tracing::warn!(
                %kind,
                captured = version,
                current = self.version,
                run,
                latest,
                "Discarding stale job result"
            );
            return JobReport {
                kind,
                version,
                run,
                disposition: JobDisposition::StaleDiscarded {
                    captured: version,
                    current: self.version,
                },
            };
        }

        let disposition = match payload {
            JobPayload::Insights(result) => merge_dataset(&mut self.state.insights, result, Vec::len),
            JobPayload::Predictions(result) => merge_rows(&mut self.state.predictions, result, &keys),
            JobPayload::Validation(result) => merge_rows(&mut self.state.validation, result, &keys),
            JobPayload::Anomalies(result) => merge_anomalies(&mut self.state.anomalies, result, &keys),
            JobPayload::Personalization(result) => {
                merge_dataset(&mut self.state.personalization, result, |p| p.columns.len())
            }
            JobPayload::Query(result) => merge_dataset(&mut self.state.nlq, result, Vec::len),
            JobPayload::Feedback(result) => merge_dataset(&mut self.state.feedback, result, |_| 1),
        };

        match &disposition {
            JobDisposition::Applied { count, error } => {
                tracing::info!(%kind, version, count, partial_error = ?error, "Job applied")
            }
            JobDisposition::Failed { error } => {
                tracing::warn!(%kind, version, %error, "Job failed")
            }
            JobDisposition::StaleDiscarded { .. } => {}
        }

        JobReport {
            kind,
            version,
            run,
            disposition,
        }
    }
}

/// Await a handler call, turning a panic into a job error
async fn guarded<R>(call: impl Future<Output = JobResult<R>>) -> JobResult<R> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(JobError::from_panic(panic)),
    }
}

fn merge_dataset<R>(
    slot: &mut JobSlot<R>,
    result: JobResult<R>,
    count: impl FnOnce(&R) -> usize,
) -> JobDisposition {
    match result {
        Ok(value) => {
            let count = count(&value);
            slot.apply(Some(value), None);
            JobDisposition::Applied { count, error: None }
        }
        Err(e) => {
            let error = e.to_string();
            slot.fail(None, error.clone());
            JobDisposition::Failed { error }
        }
    }
}

/// Merge a per-row batch. The job fails only when every row failed.
fn merge_rows<P>(
    slot: &mut JobSlot<RowResults<P>>,
    result: JobResult<RowBatch<P>>,
    keys: &[RowKey],
) -> JobDisposition {
    let mut rows = RowResults::default();
    let batch = match result {
        Ok(batch) => batch,
        Err(e) => {
            let error = e.to_string();
            for key in keys {
                rows.errors.insert(key.clone(), error.clone());
            }
            slot.fail(Some(rows), error.clone());
            return JobDisposition::Failed { error };
        }
    };

    let total = batch.len();
    for (key, row) in batch {
        match row {
            Ok(value) => {
                rows.values.insert(key, value);
            }
            Err(e) => {
                rows.errors.insert(key, e.to_string());
            }
        }
    }

    let failed = rows.errors.len();
    if total > 0 && failed == total {
        let error = format!("{failed} of {total} rows failed");
        slot.fail(Some(rows), error.clone());
        return JobDisposition::Failed { error };
    }

    let error = (failed > 0).then(|| format!("{failed} of {total} rows failed"));
    let count = rows.values.len();
    slot.apply(Some(rows), error.clone());
    JobDisposition::Applied { count, error }
}

/// Group anomaly reports by the row they name, dropping unknown rows
fn merge_anomalies(
    slot: &mut JobSlot<RowResults<Vec<AnomalyReport>>>,
    result: JobResult<Vec<AnomalyReport>>,
    keys: &[RowKey],
) -> JobDisposition {
    let mut rows: RowResults<Vec<AnomalyReport>> = RowResults::default();
    let reports = match result {
        Ok(reports) => reports,
        Err(e) => {
            let error = e.to_string();
            for key in keys {
                rows.errors.insert(key.clone(), error.clone());
            }
            slot.fail(Some(rows), error.clone());
            return JobDisposition::Failed { error };
        }
    };

    let known: HashSet<&RowKey> = keys.iter().collect();
    let mut count = 0;
    for report in reports {
        if !known.contains(&report.row_key) {
            tracing::warn!(row_key = %report.row_key, "Dropping anomaly report for unknown row");
            continue;
        }
        count += 1;
        rows.values
            .entry(report.row_key.clone())
            .or_default()
            .push(report);
    }

    slot.apply(Some(rows), None);
    JobDisposition::Applied { count, error: None }
}
