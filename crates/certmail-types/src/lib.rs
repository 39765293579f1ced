//! Shared types for certificate batches
//!
//! Everything here is plain serializable data so reports can be written to
//! disk, read back for a retry run, or handed to another front end.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Terminal outcome of one row in a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RowOutcome {
    Delivered,
    RenderFailed(String),
    SendFailed(String),
    Cancelled,
}

impl RowOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RowOutcome::Delivered)
    }

    /// Reason attached to a failed outcome, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            RowOutcome::RenderFailed(reason) | RowOutcome::SendFailed(reason) => Some(reason),
            RowOutcome::Delivered | RowOutcome::Cancelled => None,
        }
    }
}

/// Lifecycle of a single row while a batch is running
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowStage {
    Pending,
    Rendering,
    Rendered,
    Sending,
    Delivered,
    RenderFailed,
    SendFailed,
    Cancelled,
}

impl RowStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RowStage::Delivered | RowStage::RenderFailed | RowStage::SendFailed | RowStage::Cancelled
        )
    }

    /// Whether `self -> next` is an allowed transition.
    ///
    /// Terminal stages never move again; cancellation is reachable from any
    /// stage that has not finished yet.
    pub fn can_advance_to(self, next: RowStage) -> bool {
        use RowStage::*;
        match (self, next) {
            (Pending, Rendering) => true,
            (Rendering, Rendered) | (Rendering, RenderFailed) => true,
            (Rendered, Sending) => true,
            (Sending, Delivered) | (Sending, SendFailed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl From<&RowOutcome> for RowStage {
    fn from(outcome: &RowOutcome) -> Self {
        match outcome {
            RowOutcome::Delivered => RowStage::Delivered,
            RowOutcome::RenderFailed(_) => RowStage::RenderFailed,
            RowOutcome::SendFailed(_) => RowStage::SendFailed,
            RowOutcome::Cancelled => RowStage::Cancelled,
        }
    }
}

/// One row of a finished batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Position of the row in the input
    pub index: usize,
    pub name: String,
    pub email: String,
    /// Auxiliary columns carried through from ingestion
    #[serde(default)]
    pub fields: Vec<(String, String)>,
    pub certificate_id: Option<Uuid>,
    pub outcome: RowOutcome,
    /// Number of transport attempts made for this row
    pub attempts: u32,
    /// The name did not fit the text box even at the minimum font size
    pub overflow_warning: bool,
}

/// Aggregate counts for a batch
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub delivered: usize,
    pub render_failed: usize,
    pub send_failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.render_failed + self.send_failed
    }

    pub fn is_complete_success(&self) -> bool {
        self.total > 0 && self.delivered == self.total
    }
}

/// Outcome of a whole batch, ordered like the input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.entries.len(),
            ..BatchSummary::default()
        };
        for entry in &self.entries {
            match entry.outcome {
                RowOutcome::Delivered => summary.delivered += 1,
                RowOutcome::RenderFailed(_) => summary.render_failed += 1,
                RowOutcome::SendFailed(_) => summary.send_failed += 1,
                RowOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    /// Rows that did not reach `Delivered` and can be fed into another run
    pub fn retry_candidates(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.outcome.is_delivered())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
