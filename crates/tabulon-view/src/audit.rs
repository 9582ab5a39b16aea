//! In-memory audit trail
//!
//! Every state-changing view operation records an [`AuditEvent`]. The sink
//! keeps the most recent events in a ring buffer and optionally forwards
//! each one to a caller-supplied callback as it is recorded.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of operation an audit event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditAction {
    Sort,
    Filter,
    Search,
    Page,
    PageSize,
    Selection,
    Export,
    DatasetReplaced,
    ColumnVisibility,
    Personalization,
    NaturalLanguageQuery,
    AugmentationCompleted,
    AugmentationFailed,
    AugmentationDiscarded,
    Feedback,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Sort => "sort",
            AuditAction::Filter => "filter",
            AuditAction::Search => "search",
            AuditAction::Page => "page",
            AuditAction::PageSize => "pageSize",
            AuditAction::Selection => "selection",
            AuditAction::Export => "export",
            AuditAction::DatasetReplaced => "datasetReplaced",
            AuditAction::ColumnVisibility => "columnVisibility",
            AuditAction::Personalization => "personalization",
            AuditAction::NaturalLanguageQuery => "naturalLanguageQuery",
            AuditAction::AugmentationCompleted => "augmentationCompleted",
            AuditAction::AugmentationFailed => "augmentationFailed",
            AuditAction::AugmentationDiscarded => "augmentationDiscarded",
            AuditAction::Feedback => "feedback",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            details,
        }
    }
}

/// Callback invoked for every recorded event
pub type AuditCallback = Arc<dyn Fn(&AuditEvent) + Send + Sync>;

/// Bounded audit buffer, oldest events evicted first
pub struct AuditSink {
    events: VecDeque<AuditEvent>,
    capacity: usize,
    forward: Option<AuditCallback>,
}

impl fmt::Debug for AuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditSink")
            .field("len", &self.events.len())
            .field("capacity", &self.capacity)
            .field("forwarding", &self.forward.is_some())
            .finish()
    }
}

impl Default for AuditSink {
    fn default() -> Self {
        Self::new(200)
    }
}

impl AuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            forward: None,
        }
    }

    pub fn with_callback(mut self, callback: impl Fn(&AuditEvent) + Send + Sync + 'static) -> Self {
        self.forward = Some(Arc::new(callback));
        self
    }

    pub fn set_callback(&mut self, callback: Option<AuditCallback>) {
        self.forward = callback;
    }

    /// Record an event, forwarding it before it is buffered
    pub fn record(&mut self, action: AuditAction, details: serde_json::Value) {
        let event = AuditEvent::new(action, details);
        tracing::debug!(action = %event.action, details = %event.details, "audit");

        if let Some(forward) = &self.forward {
            forward(&event);
        }

        if self.capacity == 0 {
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Retained events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &AuditEvent> {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&AuditEvent> {
        self.events.back()
    }

    /// Retained events with the given action
    pub fn of_action(&self, action: AuditAction) -> impl Iterator<Item = &AuditEvent> {
        self.events.iter().filter(move |e| e.action == action)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
