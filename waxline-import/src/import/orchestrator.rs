//! Import session orchestration
//!
//! Drives the end-to-end import: idempotence hashing, strictly sequential
//! row processing (later rows depend on artists created by earlier ones),
//! per-row transactions, progress reporting, cooperative cancellation,
//! and the failed-rows reprocessing entry point.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use waxline_common::events::{CatalogEvent, EventBus};
use waxline_common::{Error, Result};

use crate::classify::ContentClassifier;
use crate::db::{artists, releases, sessions};
use crate::import::artist_resolver::find_or_create_artists;
use crate::import::mapping::{MappingConfig, RawRow};
use crate::import::row_mapper::RowMapper;
use crate::models::{IdempotencePolicy, ImportSession, ImportState};

/// Result of one failed-rows reprocessing pass
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReprocessSummary {
    pub attempted: usize,
    pub reprocessed: usize,
    pub still_failing: usize,
}

/// SHA-256 content hash over the source name and parsed rows, used by the
/// idempotence guard: re-importing an unchanged file produces the same hash
pub fn compute_source_hash(source_name: &str, rows: &[RawRow]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_name.as_bytes());
    hasher.update([0u8]);
    if let Ok(bytes) = serde_json::to_vec(rows) {
        hasher.update(&bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// Session-level import orchestrator
pub struct ImportOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    mapper: RowMapper,
    policy: IdempotencePolicy,
}

impl ImportOrchestrator {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        mapping: MappingConfig,
        policy: IdempotencePolicy,
    ) -> Self {
        let mapper = RowMapper::new(mapping, ContentClassifier::new());
        Self {
            db,
            event_bus,
            mapper,
            policy,
        }
    }

    /// Check the idempotence guard for a prior session with this hash
    pub async fn check_duplicate(
        &self,
        source_hash: &str,
    ) -> Result<Option<(Uuid, ImportState)>> {
        sessions::find_blocking_session(&self.db, source_hash, self.policy).await
    }

    /// Process all rows for a session. Row failures are captured into the
    /// failed-rows queue; only orchestration-level errors propagate.
    pub async fn run(
        &self,
        mut session: ImportSession,
        rows: Vec<RawRow>,
        cancel: CancellationToken,
    ) -> Result<ImportSession> {
        let session_id = session.session_id;
        let total = rows.len();

        session.update_progress(0, total, format!("Importing {} rows", total));
        sessions::save_session(&self.db, &session).await?;
        self.event_bus.publish(CatalogEvent::ImportSessionStarted {
            session_id,
            source_name: session.source_name.clone(),
            total_rows: total,
            timestamp: Utc::now(),
        });
        info!(session_id = %session_id, total_rows = total, "Import session started");

        let mut failed = 0usize;
        for (index, row) in rows.iter().enumerate() {
            // Cooperative cancellation between rows; a row transaction
            // already committed stays committed
            let db_cancelled = self.cancelled_in_db(session_id).await?;
            if cancel.is_cancelled() || db_cancelled {
                session.transition_to(ImportState::Cancelled);
                session.progress.current_operation =
                    format!("Import cancelled after {} rows", index);
                // The cancel endpoint may have already persisted the
                // cancelled state with the operator's reason
                if !db_cancelled {
                    sessions::save_session(&self.db, &session).await?;
                }
                self.event_bus.publish(CatalogEvent::ImportSessionCancelled {
                    session_id,
                    reason: session.progress.current_operation.clone(),
                    timestamp: Utc::now(),
                });
                info!(session_id = %session_id, rows_processed = index, "Import cancelled");
                return Ok(session);
            }

            if let Err(message) = self.persist_row(session_id, row).await {
                failed += 1;
                warn!(session_id = %session_id, row_index = index, error = %message, "Row failed");
                sessions::queue_failed_row(&self.db, session_id, index, row, &message).await?;
                session.add_error(index, message.clone());
                self.event_bus.publish(CatalogEvent::ImportRowFailed {
                    session_id,
                    row_index: index,
                    error: message,
                    timestamp: Utc::now(),
                });
            }

            session.update_progress(
                index + 1,
                total,
                format!("Imported {} of {} rows", index + 1, total),
            );
            sessions::save_session(&self.db, &session).await?;
            self.event_bus.publish(CatalogEvent::ImportProgressUpdate {
                session_id,
                rows_processed: session.progress.rows_processed,
                total_rows: total,
                percentage: session.progress.percentage,
                rows_per_second: session.progress.rows_per_second,
                estimated_remaining_seconds: session.progress.estimated_remaining_seconds,
                current_operation: session.progress.current_operation.clone(),
                timestamp: Utc::now(),
            });
        }

        // All rows attempted: the session completes even with captured
        // failures; `failed` is reserved for orchestration-level errors
        session.transition_to(ImportState::Completed);
        session.progress.current_operation = format!(
            "Processed {} rows ({} failed)",
            total, failed
        );
        sessions::save_session(&self.db, &session).await?;
        self.event_bus.publish(CatalogEvent::ImportSessionCompleted {
            session_id,
            rows_processed: total,
            failed_rows: failed,
            timestamp: Utc::now(),
        });
        info!(session_id = %session_id, failed_rows = failed, "Import session completed");

        Ok(session)
    }

    /// Re-run the row mapper over a session's failed-rows queue.
    ///
    /// Rows that now succeed are removed from the queue; rows that fail
    /// again stay queued with an updated error. Safe to run any number of
    /// times.
    pub async fn reprocess_failed(&self, session_id: Uuid) -> Result<ReprocessSummary> {
        let queued = sessions::load_failed_rows(&self.db, session_id).await?;
        let mut summary = ReprocessSummary {
            attempted: queued.len(),
            ..Default::default()
        };

        for entry in queued {
            match self.persist_row(session_id, &entry.row).await {
                Ok(()) => {
                    sessions::delete_failed_row(&self.db, entry.id).await?;
                    summary.reprocessed += 1;
                }
                Err(message) => {
                    sessions::update_failed_row_error(&self.db, entry.id, &message).await?;
                    summary.still_failing += 1;
                }
            }
        }

        self.event_bus.publish(CatalogEvent::FailedRowsReprocessed {
            session_id,
            reprocessed: summary.reprocessed,
            still_failing: summary.still_failing,
            timestamp: Utc::now(),
        });
        info!(
            session_id = %session_id,
            reprocessed = summary.reprocessed,
            still_failing = summary.still_failing,
            "Failed-rows reprocessing finished"
        );

        Ok(summary)
    }

    /// Map and persist one row inside its own transaction. Any failure
    /// rolls back this row only and is reported as a row-level error.
    async fn persist_row(&self, session_id: Uuid, row: &RawRow) -> std::result::Result<(), String> {
        let drafts = self.mapper.map_row(row).map_err(|e| e.to_string())?;

        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| format!("failed to open row transaction: {}", e))?;

        let resolved = if drafts.release.artist_names.is_empty() {
            // Pre-resolved artist id path
            let artist_id = drafts
                .release
                .artist_id
                .ok_or_else(|| "no usable artist name or artist id in row".to_string())?;
            let artist = artists::load(tx.as_mut(), artist_id)
                .await
                .map_err(|e| format!("artist lookup failed: {}", e))?
                .ok_or_else(|| format!("artist id {} not found", artist_id))?;
            vec![artist]
        } else {
            find_or_create_artists(tx.as_mut(), &drafts.release.artist_names)
                .await
                .map_err(|e| e.to_string())?
        };

        releases::insert_row_graph(tx.as_mut(), session_id, &drafts, &resolved)
            .await
            .map_err(|e| format!("failed to persist release graph: {}", e))?;

        tx.commit()
            .await
            .map_err(|e| format!("failed to commit row: {}", e))?;
        Ok(())
    }

    async fn cancelled_in_db(&self, session_id: Uuid) -> Result<bool> {
        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM import_sessions WHERE session_id = ?")
                .bind(session_id.to_string())
                .fetch_optional(&self.db)
                .await?;
        match state {
            Some(s) => Ok(ImportState::parse(&s)
                .ok_or_else(|| Error::Internal(format!("Unknown session state: {}", s)))?
                == ImportState::Cancelled),
            None => Ok(false),
        }
    }
}
