//! Import session state machine and progress tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::import::mapping::MappingConfig;

/// Cap on the row-level error messages retained on the session itself.
/// The full failed-rows queue lives in its own table; this keeps status
/// responses bounded for very large failed-row counts.
pub const MAX_REPORTED_ERRORS: usize = 25;

/// Import session state: `in_progress` is the only non-terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ImportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportState::InProgress => "in_progress",
            ImportState::Completed => "completed",
            ImportState::Failed => "failed",
            ImportState::Cancelled => "cancelled",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "in_progress" => Some(ImportState::InProgress),
            "completed" => Some(ImportState::Completed),
            "failed" => Some(ImportState::Failed),
            "cancelled" => Some(ImportState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImportState::InProgress)
    }
}

/// Whether prior terminal sessions with the same source hash block a new
/// import. The completed-only default lets a failed attempt be retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencePolicy {
    /// Only a prior `completed` session makes re-import a no-op
    #[default]
    CompletedOnly,
    /// Any terminal session (completed, failed, cancelled) blocks re-import
    AnyTerminal,
}

/// Observational progress snapshot, recomputed after each row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    pub rows_processed: usize,
    pub total_rows: usize,
    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,
    pub rows_per_second: f64,
    pub elapsed_seconds: u64,
    pub estimated_remaining_seconds: Option<u64>,
    pub current_operation: String,
}

impl Default for ImportProgress {
    fn default() -> Self {
        Self {
            rows_processed: 0,
            total_rows: 0,
            percentage: 0.0,
            rows_per_second: 0.0,
            elapsed_seconds: 0,
            estimated_remaining_seconds: None,
            current_operation: String::from("Initializing..."),
        }
    }
}

/// One captured row failure, as reported on the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowFailure {
    pub row_index: usize,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// One import attempt against one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub session_id: Uuid,
    pub state: ImportState,
    /// Original file name, for operator display only
    pub source_name: String,
    /// SHA-256 content hash used by the idempotence guard
    pub source_hash: String,
    /// Column mapping this session was run with
    pub mapping: MappingConfig,
    pub progress: ImportProgress,
    /// First `MAX_REPORTED_ERRORS` row failures
    pub errors: Vec<RowFailure>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ImportSession {
    pub fn new(source_name: String, source_hash: String, mapping: MappingConfig) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: ImportState::InProgress,
            source_name,
            source_hash,
            mapping,
            progress: ImportProgress::default(),
            errors: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state. Terminal states are final: a transition
    /// out of one is refused and returns false.
    pub fn transition_to(&mut self, new_state: ImportState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        true
    }

    /// Recompute the progress snapshot from elapsed wall-clock time
    pub fn update_progress(&mut self, rows_processed: usize, total_rows: usize, operation: String) {
        self.progress.rows_processed = rows_processed;
        self.progress.total_rows = total_rows;
        self.progress.percentage = if total_rows > 0 {
            (rows_processed as f64 / total_rows as f64) * 100.0
        } else {
            0.0
        };
        self.progress.current_operation = operation;

        let elapsed = (Utc::now() - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        self.progress.elapsed_seconds = elapsed as u64;
        if rows_processed > 0 && elapsed > 0.0 {
            let rate = rows_processed as f64 / elapsed;
            self.progress.rows_per_second = rate;
            if total_rows > rows_processed && rate > 0.0 {
                let remaining = (total_rows - rows_processed) as f64 / rate;
                self.progress.estimated_remaining_seconds = Some(remaining.ceil() as u64);
            } else {
                self.progress.estimated_remaining_seconds = Some(0);
            }
        } else {
            self.progress.rows_per_second = 0.0;
            self.progress.estimated_remaining_seconds = None;
        }
    }

    /// Record a row failure on the session, capped at `MAX_REPORTED_ERRORS`
    pub fn add_error(&mut self, row_index: usize, error: String) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(RowFailure {
                row_index,
                error,
                failed_at: Utc::now(),
            });
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
