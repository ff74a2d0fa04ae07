//! Event definitions and EventBus for Waxline services
//!
//! Events are broadcast via EventBus and can be serialized for SSE
//! transmission to connected administrative UIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Catalog event types
///
/// All services publish through this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogEvent {
    /// Import session created and started processing rows
    ImportSessionStarted {
        session_id: Uuid,
        source_name: String,
        total_rows: usize,
        timestamp: DateTime<Utc>,
    },

    /// Per-row progress update during an import session
    ImportProgressUpdate {
        session_id: Uuid,
        rows_processed: usize,
        total_rows: usize,
        percentage: f64,
        rows_per_second: f64,
        estimated_remaining_seconds: Option<u64>,
        current_operation: String,
        timestamp: DateTime<Utc>,
    },

    /// A single row failed and was captured into the failed-rows queue
    ImportRowFailed {
        session_id: Uuid,
        row_index: usize,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// All rows attempted; session is terminal
    ImportSessionCompleted {
        session_id: Uuid,
        rows_processed: usize,
        failed_rows: usize,
        timestamp: DateTime<Utc>,
    },

    /// Session aborted by an orchestration-level error
    ImportSessionFailed {
        session_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Session cancelled by administrative action
    ImportSessionCancelled {
        session_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Result of a failed-rows reprocessing pass
    FailedRowsReprocessed {
        session_id: Uuid,
        reprocessed: usize,
        still_failing: usize,
        timestamp: DateTime<Utc>,
    },

    /// Two artist records merged into one
    ArtistsMerged {
        source_id: Uuid,
        target_id: Uuid,
        releases_moved: usize,
        timestamp: DateTime<Utc>,
    },

    /// A repair pass finished (dry-run or committed)
    RepairCompleted {
        tool: String,
        scanned: usize,
        fixed: usize,
        dry_run: bool,
        timestamp: DateTime<Utc>,
    },
}

impl CatalogEvent {
    /// Event type name for SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::ImportSessionStarted { .. } => "ImportSessionStarted",
            CatalogEvent::ImportProgressUpdate { .. } => "ImportProgressUpdate",
            CatalogEvent::ImportRowFailed { .. } => "ImportRowFailed",
            CatalogEvent::ImportSessionCompleted { .. } => "ImportSessionCompleted",
            CatalogEvent::ImportSessionFailed { .. } => "ImportSessionFailed",
            CatalogEvent::ImportSessionCancelled { .. } => "ImportSessionCancelled",
            CatalogEvent::FailedRowsReprocessed { .. } => "FailedRowsReprocessed",
            CatalogEvent::ArtistsMerged { .. } => "ArtistsMerged",
            CatalogEvent::RepairCompleted { .. } => "RepairCompleted",
        }
    }
}

/// Central event distribution bus for application-wide events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers
    ///
    /// Returns the number of subscribers that received the event. A send
    /// error means no subscribers are connected, which is not a failure.
    pub fn publish(&self, event: CatalogEvent) -> usize {
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }
}
