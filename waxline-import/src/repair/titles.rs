//! Title repair pass
//!
//! Legacy imports occasionally landed notes text, platform statuses, or
//! CSV artifacts in the title column. This pass re-runs the classifier
//! over stored titles and re-derives a better title from the preserved
//! raw row, falling back to the first track name or a placeholder. The
//! displaced value is always kept in notes.

use sqlx::SqlitePool;
use tracing::info;

use crate::classify::ContentClassifier;
use crate::db::releases::{self, ReleaseScanRow};
use crate::import::mapping::MappingConfig;
use crate::import::row_mapper::append_note;
use crate::repair::{RepairAction, RepairReport};

pub struct TitleRepair {
    db: SqlitePool,
    classifier: ContentClassifier,
    mapping: MappingConfig,
}

impl TitleRepair {
    pub fn new(db: SqlitePool, mapping: MappingConfig) -> Self {
        Self {
            db,
            classifier: ContentClassifier::new(),
            mapping,
        }
    }

    /// Scan every release and repair titles flagged by the classifier.
    /// With `dry_run` the report lists what would change and nothing is
    /// written.
    pub async fn run(&self, dry_run: bool) -> Result<RepairReport, waxline_common::Error> {
        let releases = releases::scan_releases(&self.db).await?;
        let mut report = RepairReport {
            scanned: releases.len(),
            dry_run,
            ..Default::default()
        };

        for release in &releases {
            if !self.classifier.looks_like_wrong_column(&release.title) {
                continue;
            }
            report.flagged += 1;

            let replacement = match self.candidate_title(release).await? {
                Some(title) => title,
                None => format!("Untitled {}", release.release_type),
            };

            let notes = append_note(
                release.notes.as_deref(),
                &format!("Imported title cell: {}", release.title),
            );
            let action = RepairAction {
                id: release.id,
                description: format!("Replace title {:?} with {:?}", release.title, replacement),
            };

            if dry_run {
                report.skipped += 1;
            } else {
                releases::update_title_and_notes(&self.db, release.id, &replacement, &notes)
                    .await?;
                info!(release_id = %release.id, new_title = %replacement, "Repaired title");
                report.fixed += 1;
            }
            report.actions.push(action);
        }

        info!(
            scanned = report.scanned,
            flagged = report.flagged,
            fixed = report.fixed,
            dry_run,
            "Title repair pass finished"
        );
        Ok(report)
    }

    /// Best replacement title for a flagged release: the raw row's
    /// title and fallback columns first, then the release notes, then
    /// the first track name.
    async fn candidate_title(
        &self,
        release: &ReleaseScanRow,
    ) -> Result<Option<String>, waxline_common::Error> {
        if let Some(raw_row) = &release.raw_row {
            let columns = self
                .mapping
                .title_columns
                .iter()
                .chain(self.mapping.title_fallback_columns.iter());
            for column in columns {
                if let Some(value) = raw_row.get(column) {
                    if self.usable(value, &release.title) {
                        return Ok(Some(value.to_string()));
                    }
                }
            }
        } else if let Some(notes) = &release.notes {
            // No raw row preserved; a short clean notes value may be the
            // displaced title
            if self.usable(notes, &release.title) {
                return Ok(Some(notes.clone()));
            }
        }

        Ok(releases::first_track_name(&self.db, release.id).await?)
    }

    fn usable(&self, value: &str, current_title: &str) -> bool {
        let trimmed = value.trim();
        !trimmed.is_empty()
            && !trimmed.eq_ignore_ascii_case(current_title.trim())
            && !self.classifier.looks_like_wrong_column(trimmed)
    }
}
