//! Row-to-draft translation
//!
//! Translates one raw CSV row into release/track/platform-request drafts
//! using the session's `MappingConfig`, with the content classifier
//! catching values that were mapped from the wrong source column.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::classify::ContentClassifier;
use crate::import::mapping::{MappingConfig, RawRow};

/// Release type; a single valid song can never constitute an album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Single,
    Album,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Single => "single",
            ReleaseType::Album => "album",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if lower.contains("album") {
            Some(ReleaseType::Album)
        } else if lower.contains("single") {
            Some(ReleaseType::Single)
        } else {
            None
        }
    }
}

/// A single row could not be mapped; captured per row, never aborts the
/// session
#[derive(Debug, Error)]
pub enum RowError {
    #[error("no usable artist name or artist id in row")]
    MissingArtist,
    #[error("row is empty")]
    EmptyRow,
}

/// Release draft produced from one row
#[derive(Debug, Clone)]
pub struct ReleaseDraft {
    pub title: String,
    pub release_type: ReleaseType,
    /// Candidate artist names in credit order (first = primary)
    pub artist_names: Vec<String>,
    /// Pre-resolved artist id, used when the name cell is unusable
    pub artist_id: Option<Uuid>,
    pub notes: Option<String>,
    pub ar_contact: Option<String>,
    /// Verbatim source row, retained for repair/audit
    pub raw_row: RawRow,
}

/// Track draft; numbering is assigned over non-empty name slots only
#[derive(Debug, Clone)]
pub struct TrackDraft {
    pub name: String,
    pub track_number: u32,
    pub performer: Option<String>,
    pub composer: Option<String>,
    pub band: Option<String>,
    pub producer: Option<String>,
    pub studio: Option<String>,
    pub label: Option<String>,
    pub genre: Option<String>,
}

/// Platform distribution request draft
#[derive(Debug, Clone)]
pub struct PlatformRequestDraft {
    pub platform: String,
    pub status: String,
    /// Raw status cell, kept when it doesn't normalize cleanly
    pub notes: Option<String>,
}

/// Everything mapped out of one row
#[derive(Debug, Clone)]
pub struct RowDrafts {
    pub release: ReleaseDraft,
    pub tracks: Vec<TrackDraft>,
    pub platform_requests: Vec<PlatformRequestDraft>,
}

/// Append to a notes field, never overwriting prior content
pub fn append_note(existing: Option<&str>, addition: &str) -> String {
    match existing {
        Some(prior) if !prior.trim().is_empty() => format!("{}\n{}", prior, addition),
        _ => addition.to_string(),
    }
}

/// Maps raw rows into drafts using a fixed mapping and classifier
#[derive(Debug, Clone)]
pub struct RowMapper {
    mapping: MappingConfig,
    classifier: ContentClassifier,
}

impl RowMapper {
    pub fn new(mapping: MappingConfig, classifier: ContentClassifier) -> Self {
        Self { mapping, classifier }
    }

    pub fn mapping(&self) -> &MappingConfig {
        &self.mapping
    }

    /// Translate one raw row into persistable drafts
    pub fn map_row(&self, row: &RawRow) -> Result<RowDrafts, RowError> {
        if row.is_empty() {
            return Err(RowError::EmptyRow);
        }

        let tracks = self.map_tracks(row);

        // Artist candidates: comma-split the name cell, drop empties
        let artist_names: Vec<String> = row
            .first_of(&self.mapping.artist_columns)
            .map(|cell| {
                cell.split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let artist_id = row
            .first_of(&self.mapping.artist_id_columns)
            .and_then(|v| Uuid::parse_str(v).ok());

        if artist_names.is_empty() && artist_id.is_none() {
            return Err(RowError::MissingArtist);
        }

        let (title, demoted_title) = self.resolve_title(row, &tracks);
        let mut notes = row.first_of(&self.mapping.notes_columns).map(str::to_string);
        if let Some(suspect) = demoted_title {
            notes = Some(append_note(
                notes.as_deref(),
                &format!("Imported title cell: {}", suspect),
            ));
        }

        // One valid song cannot constitute an album, regardless of any
        // explicit type marker in the source data
        let explicit_type = row
            .first_of(&self.mapping.release_type_columns)
            .and_then(ReleaseType::parse);
        let release_type = if tracks.len() == 1 {
            ReleaseType::Single
        } else {
            explicit_type.unwrap_or(if tracks.len() > 1 {
                ReleaseType::Album
            } else {
                ReleaseType::Single
            })
        };

        let ar_contact = row.first_of(&self.mapping.ar_columns).map(str::to_string);
        let platform_requests = self.map_platform_requests(row);

        Ok(RowDrafts {
            release: ReleaseDraft {
                title,
                release_type,
                artist_names,
                artist_id,
                notes,
                ar_contact,
                raw_row: row.clone(),
            },
            tracks,
            platform_requests,
        })
    }

    /// Resolve the release title, falling back to alternate columns when
    /// the mapped value looks like it came from the wrong column.
    ///
    /// Returns `(title, demoted_original)`; a demoted original must be
    /// preserved in the release notes, not discarded.
    fn resolve_title(&self, row: &RawRow, tracks: &[TrackDraft]) -> (String, Option<String>) {
        let mapped = row.first_of(&self.mapping.title_columns).map(str::to_string);

        if let Some(title) = &mapped {
            if !self.classifier.looks_like_wrong_column(title) {
                return (title.clone(), None);
            }
        }

        // Mapped value is suspect (or absent): search the prioritized
        // fallback columns for a value that passes the check
        for column in &self.mapping.title_fallback_columns {
            if let Some(candidate) = row.get(column) {
                if Some(candidate) != mapped.as_deref()
                    && !self.classifier.looks_like_wrong_column(candidate)
                {
                    return (candidate.to_string(), mapped);
                }
            }
        }

        // No usable column anywhere: fall back to the first track name,
        // then a generated placeholder
        let placeholder = tracks
            .first()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "Untitled".to_string());
        (placeholder, mapped)
    }

    /// Number only the slots with non-empty names: 1, 2, 3, ... with no
    /// gaps and no empty-track records
    fn map_tracks(&self, row: &RawRow) -> Vec<TrackDraft> {
        let mut tracks = Vec::new();
        for slot in &self.mapping.tracks {
            let Some(name) = row.get(&slot.name) else {
                continue;
            };
            let get = |col: &Option<String>| {
                col.as_deref().and_then(|c| row.get(c)).map(str::to_string)
            };
            tracks.push(TrackDraft {
                name: name.to_string(),
                track_number: tracks.len() as u32 + 1,
                performer: get(&slot.performer),
                composer: get(&slot.composer),
                band: get(&slot.band),
                producer: get(&slot.producer),
                studio: get(&slot.studio),
                label: get(&slot.label),
                genre: get(&slot.genre),
            });
        }
        tracks
    }

    fn map_platform_requests(&self, row: &RawRow) -> Vec<PlatformRequestDraft> {
        let mut requests = Vec::new();
        for platform in &self.mapping.platforms {
            let Some(cell) = row.get(&platform.column) else {
                continue;
            };
            let (status, notes) = normalize_status(cell);
            requests.push(PlatformRequestDraft {
                platform: platform.platform.clone(),
                status,
                notes,
            });
        }
        requests
    }
}

/// Normalize a free-text status cell into the request status vocabulary;
/// values that don't normalize keep their raw text as request notes
fn normalize_status(cell: &str) -> (String, Option<String>) {
    let lower = cell.to_lowercase();
    if lower.contains("upload") || lower.contains("live") {
        ("uploaded".to_string(), None)
    } else if lower.contains("reject") || lower.contains("takedown") {
        ("rejected".to_string(), None)
    } else if lower.contains("approv") || lower.contains("monetiz") || lower == "yes" {
        ("approved".to_string(), None)
    } else if lower.contains("pending") {
        ("pending".to_string(), None)
    } else {
        ("pending".to_string(), Some(cell.to_string()))
    }
}
