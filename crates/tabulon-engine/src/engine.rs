//! The view engine
//!
//! `ViewEngine` owns the record snapshot and every piece of view state. All
//! view transitions are synchronous and recompute filter, overlay, sort,
//! page clamp and selection reconciliation before returning. Augmentation
//! jobs run on tokio tasks and only touch engine state when the owner
//! merges them through `poll_augmentations`, `next_augmentation` or
//! `settle`.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tabulon_augment::{
    AnomalyReport, AugmentationScheduler, AugmentationState, Feedback, Handlers, Insight,
    JobDisposition, JobKind, JobReport, JobStatus, Prediction, Snapshot, ValidationResult,
};
use tabulon_core::{
    ColumnDescriptor, EngineConfig, EngineError, FeatureFlags, Result, RowIdentity, RowKey,
    find_column,
};
use tabulon_view::export::{export_delimited, export_json};
use tabulon_view::{
    AuditAction, AuditCallback, AuditEvent, AuditSink, ColumnProjection, ExportOptions,
    FilterRule, FilterState, PageWindow, SelectionTracker, SortState, filter, sorting,
};

use crate::events::{ViewAction, ViewEvent, ViewObserver};
use crate::view::ViewSnapshot;

/// Builder for [`ViewEngine`]
pub struct ViewEngineBuilder<T> {
    columns: Vec<ColumnDescriptor<T>>,
    identity: RowIdentity<T>,
    records: Vec<T>,
    searchable: Option<Vec<String>>,
    handlers: Handlers<T>,
    config: EngineConfig,
    observer: Option<ViewObserver>,
    audit_callback: Option<AuditCallback>,
}

impl<T> ViewEngineBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn records(mut self, records: Vec<T>) -> Self {
        self.records = records;
        self
    }

    /// Columns searched by free text. Defaults to every column.
    pub fn searchable<I, S>(mut self, column_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.searchable = Some(column_ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn handlers(mut self, handlers: Handlers<T>) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.config.features = features;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.default_page_size = page_size;
        self
    }

    pub fn on_event(mut self, observer: impl Fn(&ViewEvent) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn on_audit(mut self, callback: impl Fn(&AuditEvent) + Send + Sync + 'static) -> Self {
        self.audit_callback = Some(Arc::new(callback));
        self
    }

    /// Validate the configuration and schema, load the initial records and
    /// trigger the enabled augmentation jobs for them.
    pub fn build(self) -> Result<ViewEngine<T>> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.id.as_str()) {
                return Err(EngineError::Config(format!(
                    "duplicate column id: {}",
                    column.id
                )));
            }
        }

        let searchable = match self.searchable {
            Some(ids) => {
                if let Some(unknown) = ids.iter().find(|id| find_column(&self.columns, id).is_none()) {
                    return Err(EngineError::UnknownColumn(unknown.clone()));
                }
                ids
            }
            None => self.columns.iter().map(|c| c.id.clone()).collect(),
        };

        let keys = self.identity.keys(&self.records)?;
        let window = PageWindow::new(self.config.default_page_size)?;
        let mut audit = AuditSink::new(self.config.audit_capacity);
        audit.set_callback(self.audit_callback);

        let projection = ColumnProjection::new(self.columns.iter().map(|c| c.id.clone()));
        let selection = SelectionTracker::new(self.config.features.multi_select);
        let scheduler = AugmentationScheduler::new(
            self.handlers,
            self.config.augmentation.clone(),
            self.config.features,
        );

        let raw = Arc::new(self.records);
        let raw_keys = Arc::new(keys);
        let mut engine = ViewEngine {
            columns: Arc::new(self.columns),
            identity: self.identity,
            searchable,
            config: self.config,
            working: raw.clone(),
            working_keys: raw_keys.clone(),
            raw,
            raw_keys,
            query: None,
            query_error: None,
            search: String::new(),
            filter: FilterState::default(),
            sort: None,
            window,
            selection,
            projection,
            visible: Vec::new(),
            scheduler,
            audit,
            observer: self.observer,
        };
        engine.start_dataset();
        Ok(engine)
    }
}

/// Filtered, sorted, paginated and selectable view over `T` records
pub struct ViewEngine<T> {
    columns: Arc<Vec<ColumnDescriptor<T>>>,
    identity: RowIdentity<T>,
    searchable: Vec<String>,
    config: EngineConfig,

    raw: Arc<Vec<T>>,
    raw_keys: Arc<Vec<RowKey>>,
    /// Raw records, or the result of the active natural-language query
    working: Arc<Vec<T>>,
    working_keys: Arc<Vec<RowKey>>,
    query: Option<String>,
    query_error: Option<String>,

    search: String,
    filter: FilterState,
    sort: Option<SortState>,
    window: PageWindow,
    selection: SelectionTracker,
    projection: ColumnProjection,
    /// Filtered and sorted positions into `working`
    visible: Vec<usize>,

    scheduler: AugmentationScheduler<T>,
    audit: AuditSink,
    observer: Option<ViewObserver>,
}

impl<T> std::fmt::Debug for ViewEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEngine")
            .field("records", &self.raw.len())
            .field("working", &self.working.len())
            .field("visible", &self.visible.len())
            .field("search", &self.search)
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("window", &self.window)
            .field("selected", &self.selection.len())
            .field("query", &self.query)
            .finish()
    }
}

impl<T> ViewEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn builder(
        columns: Vec<ColumnDescriptor<T>>,
        row_id: impl Fn(&T) -> RowKey + Send + Sync + 'static,
    ) -> ViewEngineBuilder<T> {
        ViewEngineBuilder {
            columns,
            identity: RowIdentity::new(row_id),
            records: Vec::new(),
            searchable: None,
            handlers: Handlers::new(),
            config: EngineConfig::default(),
            observer: None,
            audit_callback: None,
        }
    }

    /// Apply one view transition
    pub fn dispatch(&mut self, action: ViewAction) -> Result<()> {
        tracing::debug!(?action, "dispatch");
        match action {
            ViewAction::SetSearch(text) => {
                self.set_search(text);
                Ok(())
            }
            ViewAction::SetFilter(state) => self.set_filter(state),
            ViewAction::AddFilterRule(rule) => self.add_filter_rule(rule),
            ViewAction::RemoveFilterRule(id) => {
                self.remove_filter_rule(id);
                Ok(())
            }
            ViewAction::ClearFilters => {
                self.clear_filters();
                Ok(())
            }
            ViewAction::SetSort(sort) => self.set_sort(sort),
            ViewAction::CycleSort(column_id) => self.cycle_sort(&column_id),
            ViewAction::SetPage(index) => {
                self.set_page(index);
                Ok(())
            }
            ViewAction::NextPage => {
                self.next_page();
                Ok(())
            }
            ViewAction::PrevPage => {
                self.prev_page();
                Ok(())
            }
            ViewAction::SetPageSize(size) => self.set_page_size(size),
            ViewAction::ToggleRow(key) => self.toggle_row(key).map(|_| ()),
            ViewAction::SelectAll => self.select_all(),
            ViewAction::ClearSelection => {
                self.clear_selection();
                Ok(())
            }
            ViewAction::SetColumnVisible { column_id, visible } => {
                self.set_column_visible(&column_id, visible)
            }
            ViewAction::ShowAllColumns => {
                self.show_all_columns();
                Ok(())
            }
            ViewAction::HideAllColumns => {
                self.hide_all_columns();
                Ok(())
            }
            ViewAction::SetPersonalization(enabled) => self.set_personalization(enabled),
        }
    }

    // Dataset

    /// Replace the raw records.
    ///
    /// Bumps the dataset version before any job is re-triggered, resets the
    /// page, clears selection and any natural-language query, and drops
    /// augmentation results of the previous version.
    pub fn set_records(&mut self, records: Vec<T>) -> Result<()> {
        let keys = self.identity.keys(&records)?;

        self.raw = Arc::new(records);
        self.raw_keys = Arc::new(keys);
        self.working = self.raw.clone();
        self.working_keys = self.raw_keys.clone();
        self.query = None;
        self.query_error = None;
        self.projection.clear_personalized();
        let had_selection = self.selection.clear();

        let version = self.start_dataset();
        let row_count = self.raw.len();
        self.audit.record(
            AuditAction::DatasetReplaced,
            json!({ "version": version, "rows": row_count }),
        );
        self.emit(ViewEvent::DatasetReplaced { version, row_count });
        if had_selection {
            self.emit(ViewEvent::SelectionChanged { selected: 0 });
        }
        Ok(())
    }

    fn start_dataset(&mut self) -> u64 {
        let version = self.scheduler.advance_version();
        self.window.reset();
        self.refresh(true);

        let snapshot = Snapshot::new(self.raw.clone(), self.raw_keys.clone(), self.columns.clone());
        let started = self.scheduler.trigger_dataset_jobs(&snapshot);
        tracing::info!(
            version,
            rows = self.raw.len(),
            jobs = started.len(),
            "Dataset loaded"
        );
        version
    }

    // Search and filters

    pub fn set_search(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.search {
            return;
        }
        self.search = text;
        self.refresh(true);
        self.audit.record(
            AuditAction::Search,
            json!({ "query": self.search, "filteredCount": self.visible.len() }),
        );
        self.emit(ViewEvent::FilterChanged {
            filtered_count: self.visible.len(),
        });
    }

    /// Replace the filter rules. Unknown or non-filterable columns and
    /// incomplete rules are rejected and leave the view untouched.
    pub fn set_filter(&mut self, state: FilterState) -> Result<()> {
        state.validate(self.columns.as_slice())?;
        self.filter = state;
        self.filter_changed();
        Ok(())
    }

    pub fn add_filter_rule(&mut self, rule: FilterRule) -> Result<()> {
        let state = self.filter.clone().with_rule(rule);
        self.set_filter(state)
    }

    pub fn remove_filter_rule(&mut self, id: usize) -> bool {
        if !self.filter.remove_rule(id) {
            return false;
        }
        self.filter_changed();
        true
    }

    pub fn clear_filters(&mut self) {
        if self.filter.rules.is_empty() {
            return;
        }
        self.filter.clear();
        self.filter_changed();
    }

    fn filter_changed(&mut self) {
        self.refresh(true);
        self.audit.record(
            AuditAction::Filter,
            json!({
                "rules": self.filter.active_rules().count(),
                "combinator": self.filter.global_combinator.label(),
                "filteredCount": self.visible.len(),
            }),
        );
        self.emit(ViewEvent::FilterChanged {
            filtered_count: self.visible.len(),
        });
    }

    // Sorting

    pub fn set_sort(&mut self, sort: Option<SortState>) -> Result<()> {
        if let Some(state) = &sort {
            sorting::resolve_column(self.columns.as_slice(), state)?;
        }
        self.sort = sort;
        self.refresh(true);
        self.audit.record(
            AuditAction::Sort,
            json!({
                "column": self.sort.as_ref().map(|s| s.column_id.as_str()),
                "direction": self.sort.as_ref().map(|s| s.direction.label()),
            }),
        );
        self.emit(ViewEvent::SortChanged {
            sort: self.sort.clone(),
        });
        Ok(())
    }

    pub fn cycle_sort(&mut self, column_id: &str) -> Result<()> {
        let next = SortState::cycle(self.sort.as_ref(), column_id);
        self.set_sort(next)
    }

    // Pagination

    pub fn set_page(&mut self, page_index: usize) {
        let before = self.window.page_index();
        self.window.set_page(page_index, self.visible.len());
        if self.window.page_index() != before {
            self.page_changed();
        }
    }

    pub fn next_page(&mut self) -> bool {
        let moved = self.window.next(self.visible.len());
        if moved {
            self.page_changed();
        }
        moved
    }

    pub fn prev_page(&mut self) -> bool {
        let moved = self.window.prev();
        if moved {
            self.page_changed();
        }
        moved
    }

    /// Change the page size and return to the first page
    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        self.window.set_page_size(page_size)?;
        self.audit
            .record(AuditAction::PageSize, json!({ "pageSize": page_size }));
        self.emit(ViewEvent::PageChanged {
            page_index: 0,
            page_count: self.window.page_count(self.visible.len()),
        });
        Ok(())
    }

    fn page_changed(&mut self) {
        let page_index = self.window.page_index();
        self.audit
            .record(AuditAction::Page, json!({ "pageIndex": page_index }));
        self.emit(ViewEvent::PageChanged {
            page_index,
            page_count: self.window.page_count(self.visible.len()),
        });
    }

    // Selection

    /// Toggle a row of the current filtered view, returning whether it is
    /// selected afterwards
    pub fn toggle_row(&mut self, key: RowKey) -> Result<bool> {
        if !self.visible.iter().any(|&i| self.working_keys[i] == key) {
            return Err(EngineError::UnknownRowKey(key.to_string()));
        }
        let selected = self.selection.toggle(key.clone());
        self.audit.record(
            AuditAction::Selection,
            json!({ "row": key.as_str(), "selected": selected, "count": self.selection.len() }),
        );
        self.emit(ViewEvent::SelectionChanged {
            selected: self.selection.len(),
        });
        Ok(selected)
    }

    /// Select exactly the rows of the current filtered view
    pub fn select_all(&mut self) -> Result<()> {
        let keys = &self.working_keys;
        self.selection
            .select_all(self.visible.iter().map(|&i| &keys[i]))?;
        self.audit.record(
            AuditAction::Selection,
            json!({ "selectAll": true, "count": self.selection.len() }),
        );
        self.emit(ViewEvent::SelectionChanged {
            selected: self.selection.len(),
        });
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.selection.clear() {
            self.audit
                .record(AuditAction::Selection, json!({ "count": 0 }));
            self.emit(ViewEvent::SelectionChanged { selected: 0 });
        }
    }

    // Columns

    pub fn set_column_visible(&mut self, column_id: &str, visible: bool) -> Result<()> {
        if !self.projection.set_visible(column_id, visible) {
            return Err(EngineError::UnknownColumn(column_id.to_string()));
        }
        self.audit.record(
            AuditAction::ColumnVisibility,
            json!({ "column": column_id, "visible": visible }),
        );
        Ok(())
    }

    pub fn show_all_columns(&mut self) {
        self.projection.show_all();
        self.audit
            .record(AuditAction::ColumnVisibility, json!({ "all": true }));
    }

    pub fn hide_all_columns(&mut self) {
        self.projection.hide_all();
        self.audit
            .record(AuditAction::ColumnVisibility, json!({ "all": false }));
    }

    /// Switch to the personalized projection and its filter overlay, or back
    /// to the base projection. Turning it on before a personalization result
    /// has been merged leaves it off.
    pub fn set_personalization(&mut self, enabled: bool) -> Result<()> {
        if enabled && !self.config.features.personalization {
            return Err(EngineError::FeatureDisabled("personalization"));
        }
        let active = self.projection.set_personalization(enabled);
        self.refresh(true);
        self.audit.record(
            AuditAction::Personalization,
            json!({ "requested": enabled, "active": active }),
        );
        self.emit(ViewEvent::FilterChanged {
            filtered_count: self.visible.len(),
        });
        Ok(())
    }

    // Natural-language queries

    /// Ask the query handler for a replacement working set. The current
    /// working set stays in place until the result is merged.
    pub fn run_query(&mut self, query: &str) -> Result<()> {
        let snapshot = Snapshot::new(self.raw.clone(), self.raw_keys.clone(), self.columns.clone());
        self.scheduler.run_query(query, &snapshot)?;
        self.query = Some(query.to_string());
        self.query_error = None;
        self.audit.record(
            AuditAction::NaturalLanguageQuery,
            json!({ "query": query, "status": "requested" }),
        );
        Ok(())
    }

    /// Drop the query result (or pending query) and restore the raw records
    pub fn reset_query(&mut self) {
        self.scheduler.abandon(JobKind::NaturalLanguageQuery);
        let replaced = !Arc::ptr_eq(&self.working, &self.raw);
        self.query = None;
        self.query_error = None;
        if replaced {
            self.restore_raw();
            self.audit.record(
                AuditAction::NaturalLanguageQuery,
                json!({ "status": "reset", "rows": self.working.len() }),
            );
            self.emit(ViewEvent::WorkingSetReplaced {
                query: None,
                row_count: self.working.len(),
            });
        }
    }

    fn restore_raw(&mut self) {
        self.working = self.raw.clone();
        self.working_keys = self.raw_keys.clone();
        self.refresh(true);
    }

    // Augmentation

    /// Re-run one dataset job against the current working set
    pub fn trigger_job(&mut self, kind: JobKind) -> Result<()> {
        let snapshot = Snapshot::new(
            self.working.clone(),
            self.working_keys.clone(),
            self.columns.clone(),
        );
        self.scheduler.trigger(kind, &snapshot)?;
        Ok(())
    }

    pub fn submit_feedback(&mut self, feedback: Feedback) {
        self.scheduler.submit_feedback(feedback);
    }

    /// Merge every finished job without waiting
    pub fn poll_augmentations(&mut self) -> Vec<JobReport> {
        let reports = self.scheduler.poll();
        for report in &reports {
            self.apply_report(report);
        }
        reports
    }

    /// Wait for the next job to finish and merge it
    pub async fn next_augmentation(&mut self) -> Option<JobReport> {
        let report = self.scheduler.next_outcome().await?;
        self.apply_report(&report);
        Some(report)
    }

    /// Merge jobs until none is running
    pub async fn settle(&mut self) -> Vec<JobReport> {
        let mut reports = Vec::new();
        while let Some(report) = self.next_augmentation().await {
            reports.push(report);
        }
        reports
    }

    fn apply_report(&mut self, report: &JobReport) {
        self.audit
            .record(report.audit_action(), report.audit_details());

        match (&report.disposition, report.kind) {
            (JobDisposition::Applied { .. }, JobKind::Personalization) => {
                self.apply_personalization()
            }
            (JobDisposition::Applied { .. }, JobKind::NaturalLanguageQuery) => {
                self.apply_query_result()
            }
            (JobDisposition::Failed { error }, JobKind::NaturalLanguageQuery) => {
                self.revert_query(error.clone())
            }
            _ => {}
        }

        if report.is_applied() && report.kind != JobKind::Feedback {
            self.emit(ViewEvent::AugmentationApplied {
                kind: report.kind,
                version: report.version,
            });
        }
    }

    fn apply_personalization(&mut self) {
        let Some(result) = self.scheduler.state().personalization.result().cloned() else {
            return;
        };
        let overlay = match result.filter_overlay.validate(self.columns.as_slice()) {
            Ok(()) => result.filter_overlay.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid personalization overlay");
                FilterState::default()
            }
        };
        let overlay_before = self.projection.active_overlay().cloned();
        self.projection
            .set_personalized(result.columns.clone(), overlay);

        if self.projection.is_personalized() {
            let overlay_changed = self.projection.active_overlay() != overlay_before.as_ref();
            self.refresh(overlay_changed);
            self.emit(ViewEvent::FilterChanged {
                filtered_count: self.visible.len(),
            });
        }
    }

    fn apply_query_result(&mut self) {
        let Some(records) = self.scheduler.state().nlq.result().cloned() else {
            return;
        };
        let keys = match self.identity.keys(&records) {
            Ok(keys) => keys,
            Err(e) => {
                self.revert_query(format!("Query returned invalid records: {e}"));
                return;
            }
        };

        self.working = records;
        self.working_keys = Arc::new(keys);
        self.query_error = None;
        self.refresh(true);

        let row_count = self.working.len();
        tracing::info!(query = ?self.query, row_count, "Working set replaced by query");
        self.audit.record(
            AuditAction::NaturalLanguageQuery,
            json!({ "query": self.query, "status": "applied", "rows": row_count }),
        );
        self.emit(ViewEvent::WorkingSetReplaced {
            query: self.query.clone(),
            row_count,
        });
    }

    /// A failed query never leaves a half-applied working set
    fn revert_query(&mut self, error: String) {
        tracing::warn!(query = ?self.query, %error, "Query failed, restoring raw records");
        self.query = None;
        self.restore_raw();
        self.audit.record(
            AuditAction::NaturalLanguageQuery,
            json!({ "status": "failed", "error": error }),
        );
        self.query_error = Some(error);
        self.emit(ViewEvent::WorkingSetReplaced {
            query: None,
            row_count: self.working.len(),
        });
    }

    // Export

    /// Quoted CSV of the visible columns over the filtered and sorted rows
    pub fn export_visible(&mut self) -> Result<String> {
        self.export_visible_with(&ExportOptions::csv())
    }

    pub fn export_visible_with(&mut self, options: &ExportOptions) -> Result<String> {
        self.require_export()?;
        let (text, rows, columns) = {
            let columns = self.visible_columns();
            let rows = self.filtered_records();
            (export_delimited(&columns, &rows, options), rows.len(), columns.len())
        };
        self.audit.record(
            AuditAction::Export,
            json!({ "format": "delimited", "rows": rows, "columns": columns }),
        );
        Ok(text)
    }

    /// JSON array of the filtered and sorted rows, keyed by column id
    pub fn export_visible_json(&mut self) -> Result<String> {
        self.require_export()?;
        let (text, rows) = {
            let columns = self.visible_columns();
            let rows = self.filtered_records();
            (export_json(&columns, &rows).to_string(), rows.len())
        };
        self.audit
            .record(AuditAction::Export, json!({ "format": "json", "rows": rows }));
        Ok(text)
    }

    /// CSV of the selected rows, in view order
    pub fn export_selected(&mut self) -> Result<String> {
        self.require_export()?;
        let (text, rows) = {
            let columns = self.visible_columns();
            let rows: Vec<&T> = self
                .visible
                .iter()
                .filter(|&&i| self.selection.is_selected(&self.working_keys[i]))
                .map(|&i| &self.working[i])
                .collect();
            (
                export_delimited(&columns, &rows, &ExportOptions::csv()),
                rows.len(),
            )
        };
        self.audit.record(
            AuditAction::Export,
            json!({ "format": "delimited", "rows": rows, "selectedOnly": true }),
        );
        Ok(text)
    }

    fn require_export(&self) -> Result<()> {
        if !self.config.features.export {
            return Err(EngineError::FeatureDisabled("export"));
        }
        Ok(())
    }

    // View pipeline

    /// Recompute the view and restore its invariants: the page index inside
    /// the page range and the selection inside the filtered key set.
    fn refresh(&mut self, reset_page: bool) {
        let before = self.window.page_index();
        self.recompute();

        let total = self.visible.len();
        if reset_page {
            self.window.reset();
        } else {
            self.window.clamp(total);
        }
        if self.window.page_index() != before {
            self.emit(ViewEvent::PageChanged {
                page_index: self.window.page_index(),
                page_count: self.window.page_count(total),
            });
        }

        self.reconcile_selection();
    }

    fn recompute(&mut self) {
        let records = self.working.as_slice();
        let columns = self.columns.as_slice();

        let mut indices = filter::apply(records, columns, &self.search, &self.searchable, &self.filter);

        if let Some(overlay) = self.projection.active_overlay() {
            let passing: HashSet<usize> = filter::apply(records, columns, "", &[], overlay)
                .into_iter()
                .collect();
            indices.retain(|i| passing.contains(i));
        }

        if let Some(sort) = &self.sort {
            match sorting::resolve_column(columns, sort) {
                Ok(column) => {
                    indices = sorting::sort_indices(records, &indices, column, sort.direction)
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring invalid sort"),
            }
        }

        tracing::debug!(
            filtered = indices.len(),
            total = records.len(),
            "View recomputed"
        );
        self.visible = indices;
    }

    fn reconcile_selection(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let keys: HashSet<RowKey> = self
            .visible
            .iter()
            .map(|&i| self.working_keys[i].clone())
            .collect();
        if self.selection.reconcile(&keys) {
            let selected = self.selection.len();
            tracing::debug!(selected, "Selection pruned to the filtered view");
            self.audit.record(
                AuditAction::Selection,
                json!({ "reason": "filtered", "count": selected }),
            );
            self.emit(ViewEvent::SelectionChanged { selected });
        }
    }

    fn emit(&self, event: ViewEvent) {
        tracing::trace!(?event, "view event");
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    // Accessors

    pub fn view(&self) -> ViewSnapshot<'_, T> {
        let total = self.visible.len();
        let range = self.window.range(total);
        let page = &self.visible[range];
        ViewSnapshot {
            columns: self.visible_columns(),
            rows: page.iter().map(|&i| &self.working[i]).collect(),
            row_keys: page.iter().map(|&i| &self.working_keys[i]).collect(),
            filtered_count: total,
            total_count: self.working.len(),
            page_index: self.window.page_index(),
            page_size: self.window.page_size(),
            page_count: self.window.page_count(total),
            sort: self.sort.as_ref(),
            selected_count: self.selection.len(),
            version: self.scheduler.version(),
            personalized: self.projection.is_personalized(),
            query: self.query.as_deref(),
            query_error: self.query_error.as_deref(),
        }
    }

    /// Visible columns in the active projection order
    pub fn visible_columns(&self) -> Vec<&ColumnDescriptor<T>> {
        self.projection
            .visible_columns()
            .into_iter()
            .filter_map(|id| find_column(self.columns.as_slice(), id))
            .collect()
    }

    /// Every filtered record in sorted order
    pub fn filtered_records(&self) -> Vec<&T> {
        self.visible.iter().map(|&i| &self.working[i]).collect()
    }

    pub fn filtered_keys(&self) -> Vec<&RowKey> {
        self.visible.iter().map(|&i| &self.working_keys[i]).collect()
    }

    pub fn page_records(&self) -> Vec<&T> {
        let range = self.window.range(self.visible.len());
        self.visible[range].iter().map(|&i| &self.working[i]).collect()
    }

    pub fn filtered_count(&self) -> usize {
        self.visible.len()
    }

    /// The raw records last supplied by the caller
    pub fn records(&self) -> &[T] {
        &self.raw
    }

    pub fn working_records(&self) -> &[T] {
        &self.working
    }

    pub fn columns(&self) -> &[ColumnDescriptor<T>] {
        &self.columns
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn page_window(&self) -> &PageWindow {
        &self.window
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn projection(&self) -> &ColumnProjection {
        &self.projection
    }

    pub fn audit(&self) -> &AuditSink {
        &self.audit
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn version(&self) -> u64 {
        self.scheduler.version()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn query_error(&self) -> Option<&str> {
        self.query_error.as_deref()
    }

    pub fn augmentation(&self) -> &AugmentationState<T> {
        self.scheduler.state()
    }

    pub fn job_status(&self, kind: JobKind) -> &JobStatus {
        self.scheduler.status(kind)
    }

    pub fn is_augmenting(&self) -> bool {
        !self.scheduler.is_idle()
    }

    pub fn insights(&self) -> &[Insight] {
        self.scheduler
            .state()
            .insights
            .result()
            .map(|insights| insights.as_slice())
            .unwrap_or(&[])
    }

    pub fn prediction(&self, key: &RowKey) -> Option<&Prediction> {
        self.scheduler.state().predictions.result()?.get(key)
    }

    pub fn anomalies(&self, key: &RowKey) -> &[AnomalyReport] {
        self.scheduler
            .state()
            .anomalies
            .result()
            .and_then(|rows| rows.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn validation(&self, key: &RowKey) -> &[ValidationResult] {
        self.scheduler
            .state()
            .validation
            .result()
            .and_then(|rows| rows.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Per-row error marker of a row-scoped job
    pub fn row_error(&self, kind: JobKind, key: &RowKey) -> Option<&str> {
        let state = self.scheduler.state();
        match kind {
            JobKind::Predictions => state.predictions.result()?.error(key),
            JobKind::Anomalies => state.anomalies.result()?.error(key),
            JobKind::Validation => state.validation.result()?.error(key),
            _ => None,
        }
    }
}
