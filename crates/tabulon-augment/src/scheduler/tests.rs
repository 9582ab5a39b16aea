use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tabulon_core::{AugmentationConfig, CellValue, ColumnDescriptor, EngineError, FeatureFlags, RowKey};
use tabulon_view::AuditAction;
use tokio::sync::Notify;

use super::*;
use crate::handlers::{
    AnomalyDetector, InsightGenerator, NaturalLanguageQuery, Personalizer, RowPredictor,
    RowValidator,
};
use crate::results::{JobState, Severity};
use crate::simulated::SimulatedPredictor;

#[derive(Debug, Clone, PartialEq)]
struct Sale {
    id: u32,
    region: &'static str,
    sales: f64,
}

fn sale(id: u32, region: &'static str, sales: f64) -> Sale {
    Sale { id, region, sales }
}

fn records() -> Vec<Sale> {
    vec![sale(1, "West", 50.0), sale(2, "East", 150.0), sale(3, "West", 75.0)]
}

fn columns() -> Vec<ColumnDescriptor<Sale>> {
    vec![
        ColumnDescriptor::new("id", "ID", |s: &Sale| CellValue::from(s.id)).numeric(),
        ColumnDescriptor::new("region", "Region", |s: &Sale| CellValue::from(s.region)),
        ColumnDescriptor::new("sales", "Sales", |s: &Sale| CellValue::from(s.sales))
            .numeric()
            .predictive()
            .anomaly_detectable(),
    ]
}

fn snapshot(records: Vec<Sale>) -> Snapshot<Sale> {
    let keys = records.iter().map(|r| RowKey::from(r.id)).collect();
    Snapshot::new(Arc::new(records), Arc::new(keys), Arc::new(columns()))
}

fn only(kind: JobKind) -> FeatureFlags {
    let mut features = FeatureFlags::none();
    match kind {
        JobKind::Insights => features.insights = true,
        JobKind::Predictions => features.predictions = true,
        JobKind::Anomalies => features.anomalies = true,
        JobKind::Validation => features.validation = true,
        JobKind::Personalization => features.personalization = true,
        JobKind::NaturalLanguageQuery => features.nlq = true,
        JobKind::Feedback => {}
    }
    features
}

fn scheduler(handlers: Handlers<Sale>, features: FeatureFlags) -> AugmentationScheduler<Sale> {
    let mut scheduler = AugmentationScheduler::new(handlers, AugmentationConfig::default(), features);
    scheduler.advance_version();
    scheduler
}

struct GatedInsights {
    gate: Arc<Notify>,
}

#[async_trait]
impl InsightGenerator<Sale> for GatedInsights {
    async fn generate_insights(
        &self,
        records: &[Sale],
        _columns: &[ColumnDescriptor<Sale>],
        _config: &AugmentationConfig,
    ) -> JobResult<Vec<Insight>> {
        self.gate.notified().await;
        Ok(vec![Insight {
            id: "count".to_string(),
            title: "Row count".to_string(),
            description: format!("{} rows", records.len()),
            severity: Severity::Info,
            confidence: 1.0,
            column_id: None,
        }])
    }
}

struct FlakyPredictor {
    fail_all: bool,
}

#[async_trait]
impl RowPredictor<Sale> for FlakyPredictor {
    async fn predict_row(
        &self,
        record: &Sale,
        columns: &[ColumnDescriptor<Sale>],
        config: &AugmentationConfig,
    ) -> JobResult<Prediction> {
        if self.fail_all || record.id == 2 {
            return Err(JobError::failed("model timeout"));
        }
        SimulatedPredictor.predict_row(record, columns, config).await
    }
}

struct PanickingPersonalizer;

#[async_trait]
impl Personalizer<Sale> for PanickingPersonalizer {
    async fn personalize(
        &self,
        _records: &[Sale],
        _columns: &[ColumnDescriptor<Sale>],
    ) -> JobResult<PersonalizationResult> {
        panic!("personalizer exploded");
    }
}

struct PanickingValidator;

#[async_trait]
impl RowValidator<Sale> for PanickingValidator {
    async fn validate_row(
        &self,
        _record: &Sale,
        _columns: &[ColumnDescriptor<Sale>],
    ) -> JobResult<Vec<ValidationResult>> {
        panic!("validator exploded");
    }
}

/// Reports one real row and one row that does not exist
struct StrayAnomalies {
    fail: bool,
}

#[async_trait]
impl AnomalyDetector<Sale> for StrayAnomalies {
    async fn detect_anomalies(
        &self,
        _records: &[Sale],
        _keys: &[RowKey],
        _columns: &[ColumnDescriptor<Sale>],
        _config: &AugmentationConfig,
    ) -> JobResult<Vec<AnomalyReport>> {
        if self.fail {
            return Err(JobError::failed("detector offline"));
        }
        let report = |key: &str| AnomalyReport {
            row_key: RowKey::from(key),
            column_id: "sales".to_string(),
            value: 150.0,
            score: 2.5,
            severity: Severity::Medium,
            message: "high".to_string(),
        };
        Ok(vec![report("2"), report("99")])
    }
}

struct GatedQuery {
    gate: Arc<Notify>,
}

#[async_trait]
impl NaturalLanguageQuery<Sale> for GatedQuery {
    async fn query(
        &self,
        query: &str,
        records: &[Sale],
        _columns: &[ColumnDescriptor<Sale>],
    ) -> JobResult<Vec<Sale>> {
        if query == "slow" {
            self.gate.notified().await;
            return Ok(records[..1].to_vec());
        }
        Ok(records[1..].to_vec())
    }
}

#[tokio::test]
async fn test_simulated_jobs_all_apply() {
    let mut scheduler = scheduler(Handlers::new(), FeatureFlags::all());
    let started = scheduler.trigger_dataset_jobs(&snapshot(records()));
    assert_eq!(started, JobKind::dataset_jobs().to_vec());
    assert!(scheduler.status(JobKind::Insights).loading);

    let reports = scheduler.settle().await;
    assert_eq!(reports.len(), 5);
    assert!(reports.iter().all(JobReport::is_applied));
    assert!(scheduler.is_idle());
    assert!(!scheduler.state().is_loading());

    let predictions = scheduler.state().predictions.result().unwrap();
    assert_eq!(predictions.len(), 3);
    assert_eq!(
        predictions.get(&RowKey::from(2u32)).map(|p| p.column_id.as_str()),
        Some("sales")
    );

    let personalization = scheduler.state().personalization.result().unwrap();
    assert_eq!(personalization.columns, vec!["sales", "id", "region"]);
    assert!(!scheduler.state().insights.result().unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_result_is_never_merged() {
    let gate = Arc::new(Notify::new());
    let handlers = Handlers::new().with_insights(GatedInsights { gate: gate.clone() });
    let mut scheduler = scheduler(handlers, only(JobKind::Insights));

    scheduler.trigger_dataset_jobs(&snapshot(records()));
    // dataset replaced before the job resolves
    scheduler.advance_version();
    gate.notify_one();

    let reports = scheduler.settle().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].disposition,
        JobDisposition::StaleDiscarded { captured: 1, current: 2 }
    );
    assert_eq!(reports[0].audit_action(), AuditAction::AugmentationDiscarded);

    let status = scheduler.status(JobKind::Insights);
    assert_eq!(status.state, JobState::StaleDiscarded);
    assert!(!status.loading);
    assert_eq!(status.stale_discards, 1);
    assert!(scheduler.state().insights.result().is_none());

    // the next run for the current version merges normally
    scheduler.trigger_dataset_jobs(&snapshot(records()[..2].to_vec()));
    gate.notify_one();
    let reports = scheduler.settle().await;
    assert!(reports[0].is_applied());
    let insights = scheduler.state().insights.result().unwrap();
    assert_eq!(insights[0].description, "2 rows");
}

#[tokio::test]
async fn test_partial_row_failure_applies_with_summary() {
    let handlers = Handlers::new().with_predictor(FlakyPredictor { fail_all: false });
    let mut scheduler = scheduler(handlers, only(JobKind::Predictions));
    scheduler.trigger_dataset_jobs(&snapshot(records()));

    let reports = scheduler.settle().await;
    assert_eq!(
        reports[0].disposition,
        JobDisposition::Applied {
            count: 2,
            error: Some("1 of 3 rows failed".to_string())
        }
    );

    let predictions = scheduler.state().predictions.result().unwrap();
    assert_eq!(predictions.error(&RowKey::from(2u32)), Some("model timeout"));
    assert!(predictions.get(&RowKey::from(1u32)).is_some());
    assert_eq!(
        scheduler.status(JobKind::Predictions).error.as_deref(),
        Some("1 of 3 rows failed")
    );
}

#[tokio::test]
async fn test_all_rows_failing_fails_the_job() {
    let handlers = Handlers::new().with_predictor(FlakyPredictor { fail_all: true });
    let mut scheduler = scheduler(handlers, only(JobKind::Predictions));
    scheduler.trigger_dataset_jobs(&snapshot(records()));

    let reports = scheduler.settle().await;
    assert_eq!(
        reports[0].disposition,
        JobDisposition::Failed {
            error: "3 of 3 rows failed".to_string()
        }
    );
    assert_eq!(reports[0].audit_action(), AuditAction::AugmentationFailed);
    let predictions = scheduler.state().predictions.result().unwrap();
    assert_eq!(predictions.errors.len(), 3);
    assert!(predictions.is_empty());
}

#[tokio::test]
async fn test_new_version_resets_job_status() {
    let handlers = Handlers::new().with_predictor(FlakyPredictor { fail_all: true });
    let mut features = only(JobKind::Predictions);
    features.insights = true;
    let mut scheduler = scheduler(handlers, features);
    scheduler.trigger_dataset_jobs(&snapshot(records()));
    scheduler.settle().await;
    assert_eq!(scheduler.status(JobKind::Insights).state, JobState::Applied);
    assert_eq!(scheduler.status(JobKind::Predictions).state, JobState::Failed);

    scheduler.advance_version();

    for kind in [JobKind::Insights, JobKind::Predictions] {
        let status = scheduler.status(kind);
        assert_eq!(status.state, JobState::Idle, "{kind}");
        assert_eq!(status.error, None, "{kind}");
        assert!(!status.loading, "{kind}");
    }
    assert!(scheduler.state().insights.result().is_none());
    assert!(scheduler.state().predictions.result().is_none());
}

#[tokio::test]
async fn test_panicking_handlers_become_job_failures() {
    let handlers = Handlers::new()
        .with_personalizer(PanickingPersonalizer)
        .with_validator(PanickingValidator);
    let mut features = only(JobKind::Personalization);
    features.validation = true;
    let mut scheduler = scheduler(handlers, features);
    scheduler.trigger_dataset_jobs(&snapshot(records()));
    scheduler.settle().await;

    let personalization = scheduler.status(JobKind::Personalization);
    assert_eq!(personalization.state, JobState::Failed);
    assert!(
        personalization
            .error
            .as_deref()
            .unwrap()
            .contains("personalizer exploded")
    );

    let validation = scheduler.state().validation.result().unwrap();
    assert_eq!(scheduler.status(JobKind::Validation).state, JobState::Failed);
    assert!(
        validation
            .error(&RowKey::from(1u32))
            .unwrap()
            .contains("validator exploded")
    );
}

#[tokio::test]
async fn test_anomalies_are_scoped_to_known_rows() {
    let handlers = Handlers::new().with_anomaly_detector(StrayAnomalies { fail: false });
    let mut scheduler = scheduler(handlers, only(JobKind::Anomalies));
    scheduler.trigger_dataset_jobs(&snapshot(records()));

    let reports = scheduler.settle().await;
    assert_eq!(
        reports[0].disposition,
        JobDisposition::Applied { count: 1, error: None }
    );
    let anomalies = scheduler.state().anomalies.result().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies.get(&RowKey::from(2u32)).unwrap().len(), 1);
    assert!(anomalies.get(&RowKey::from("99")).is_none());
}

#[tokio::test]
async fn test_anomaly_failure_marks_every_row() {
    let handlers = Handlers::new().with_anomaly_detector(StrayAnomalies { fail: true });
    let mut scheduler = scheduler(handlers, only(JobKind::Anomalies));
    scheduler.trigger_dataset_jobs(&snapshot(records()));
    scheduler.settle().await;

    let anomalies = scheduler.state().anomalies.result().unwrap();
    assert_eq!(anomalies.errors.len(), 3);
    assert_eq!(anomalies.error(&RowKey::from(3u32)), Some("detector offline"));
}

#[tokio::test]
async fn test_simulated_anomaly_flags_the_outlier_row() {
    let mut scheduler = scheduler(Handlers::new(), only(JobKind::Anomalies));
    let rows = vec![
        sale(1, "West", 10.0),
        sale(2, "West", 11.0),
        sale(3, "East", 9.0),
        sale(4, "East", 10.0),
        sale(5, "West", 12.0),
        sale(6, "East", 10.0),
        sale(7, "West", 100.0),
    ];
    scheduler.trigger_dataset_jobs(&snapshot(rows));
    scheduler.settle().await;

    let anomalies = scheduler.state().anomalies.result().unwrap();
    let flagged: Vec<_> = anomalies.values.keys().cloned().collect();
    assert_eq!(flagged, vec![RowKey::from(7u32)]);
}

#[tokio::test]
async fn test_overlapping_queries_resolve_to_latest() {
    let gate = Arc::new(Notify::new());
    let handlers = Handlers::new().with_nlq(GatedQuery { gate: gate.clone() });
    let mut scheduler = scheduler(handlers, only(JobKind::NaturalLanguageQuery));
    let snap = snapshot(records());

    scheduler.run_query("slow", &snap).unwrap();
    scheduler.run_query("fast", &snap).unwrap();
    gate.notify_one();

    let reports = scheduler.settle().await;
    assert_eq!(reports.iter().filter(|r| r.is_stale()).count(), 1);
    assert_eq!(reports.iter().filter(|r| r.is_applied()).count(), 1);

    let rows = scheduler.state().nlq.result().unwrap();
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(scheduler.status(JobKind::NaturalLanguageQuery).state, JobState::Applied);
}

#[tokio::test]
async fn test_feedback_is_never_stale() {
    let mut scheduler = scheduler(Handlers::new(), FeatureFlags::none());
    scheduler.submit_feedback(Feedback {
        job: JobKind::Insights,
        row_key: None,
        helpful: true,
        comment: Some("useful".to_string()),
    });
    scheduler.advance_version();

    let reports = scheduler.settle().await;
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_applied());
    assert_eq!(reports[0].audit_action(), AuditAction::Feedback);
}

#[tokio::test]
async fn test_disabled_jobs_are_rejected() {
    let mut scheduler = scheduler(Handlers::new(), FeatureFlags::none());
    let snap = snapshot(records());

    assert!(scheduler.trigger_dataset_jobs(&snap).is_empty());
    assert_eq!(
        scheduler.trigger(JobKind::Insights, &snap),
        Err(EngineError::FeatureDisabled("insights"))
    );
    assert_eq!(
        scheduler.run_query("top 1 by sales", &snap),
        Err(EngineError::FeatureDisabled("nlq"))
    );
    assert!(matches!(
        scheduler.trigger(JobKind::Feedback, &snap),
        Err(EngineError::Config(_))
    ));
    assert!(scheduler.next_outcome().await.is_none());
}

#[test]
fn test_trigger_without_runtime_fails_job() {
    let mut scheduler = scheduler(Handlers::new(), only(JobKind::Insights));
    scheduler.trigger_dataset_jobs(&snapshot(records()));

    let reports = scheduler.poll();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].disposition,
        JobDisposition::Failed {
            error: JobError::NoRuntime.to_string()
        }
    );
    assert_eq!(reports[0].audit_details()["type"], serde_json::json!("insights"));
    assert!(scheduler.is_idle());
}

#[tokio::test]
async fn test_abandoned_query_is_discarded() {
    let gate = Arc::new(Notify::new());
    let handlers = Handlers::new().with_nlq(GatedQuery { gate: gate.clone() });
    let mut scheduler = scheduler(handlers, only(JobKind::NaturalLanguageQuery));

    scheduler.run_query("slow", &snapshot(records())).unwrap();
    scheduler.abandon(JobKind::NaturalLanguageQuery);
    assert!(!scheduler.status(JobKind::NaturalLanguageQuery).loading);
    gate.notify_one();

    let reports = scheduler.settle().await;
    assert!(reports[0].is_stale());
    assert_eq!(scheduler.status(JobKind::NaturalLanguageQuery).state, JobState::Idle);
    assert!(scheduler.state().nlq.result().is_none());
}
