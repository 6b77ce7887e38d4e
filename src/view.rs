//! Per-request view models assembled from the store and aggregator.

use crate::aggregate::FailureModeCount;
use crate::content::{Content, classify};
use crate::store::{ErrorAggregator, Trace, TraceStore, TraceSummary};
use crate::TraceError;

pub const PREVIEW_CHARS: usize = 60;

/// First 60 characters, with "..." only when something was cut.
pub fn query_preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Alert,
    Success,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Alert => "alert",
            Status::Success => "success",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub id: i64,
    pub timestamp: String,
    pub preview: String,
    pub status: Status,
    pub active: bool,
}

impl ListItem {
    pub fn from_summary(summary: &TraceSummary, active_id: Option<i64>) -> Self {
        Self {
            id: summary.id,
            timestamp: summary.timestamp.clone(),
            preview: query_preview(&summary.user_query),
            status: if summary.has_failures {
                Status::Alert
            } else {
                Status::Success
            },
            active: active_id == Some(summary.id),
        }
    }
}

/// Sidebar plus right rail, shared by the list and detail pages.
#[derive(Debug, Clone)]
pub struct Panels {
    pub traces: Vec<ListItem>,
    pub error_stats: Vec<FailureModeCount>,
}

impl Panels {
    pub fn load(
        store: &dyn TraceStore,
        aggregator: &dyn ErrorAggregator,
        active_id: Option<i64>,
    ) -> Result<Self, TraceError> {
        let traces = store
            .list_traces()?
            .iter()
            .map(|s| ListItem::from_summary(s, active_id))
            .collect();
        let error_stats = aggregator.failure_mode_counts()?;
        Ok(Self { traces, error_stats })
    }
}

#[derive(Debug, Clone)]
pub struct ListPage {
    pub panels: Panels,
}

/// Values shown in the annotation form. Normally the stored ones; after a
/// failed save, whatever the reviewer submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormValues {
    pub notes: String,
    pub failure_modes: String,
}

#[derive(Debug, Clone)]
pub struct DetailPage {
    pub trace: Trace,
    pub query: Content,
    pub response: Content,
    pub form: FormValues,
    pub next_trace_id: Option<i64>,
    pub save_error: Option<String>,
    pub taxonomy: Vec<String>,
    pub panels: Panels,
}

impl DetailPage {
    /// `Ok(None)` when the trace does not exist.
    pub fn load(
        store: &dyn TraceStore,
        aggregator: &dyn ErrorAggregator,
        id: i64,
        taxonomy: &[String],
    ) -> Result<Option<Self>, TraceError> {
        let Some(trace) = store.get_trace(id)? else {
            return Ok(None);
        };
        let next_trace_id = store.next_trace_id(id)?;
        let panels = Panels::load(store, aggregator, Some(id))?;
        Ok(Some(Self::build(trace, next_trace_id, panels, taxonomy)))
    }

    pub fn build(
        trace: Trace,
        next_trace_id: Option<i64>,
        panels: Panels,
        taxonomy: &[String],
    ) -> Self {
        let query = classify(&trace.user_query);
        let response = classify(&trace.bot_response);
        let form = FormValues {
            notes: trace.notes.clone(),
            failure_modes: trace.failure_modes.clone(),
        };
        Self {
            trace,
            query,
            response,
            form,
            next_trace_id,
            save_error: None,
            taxonomy: taxonomy.to_vec(),
            panels,
        }
    }

    /// Keep the reviewer's input on screen alongside the failure message.
    pub fn with_save_error(mut self, submitted: FormValues, message: String) -> Self {
        self.form = submitted;
        self.save_error = Some(message);
        self
    }
}
