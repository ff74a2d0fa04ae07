//! Raw row representation and column-to-field mapping configuration
//!
//! Legacy spreadsheet exports arrive as header→cell mappings with no stable
//! header vocabulary. `RawRow` gives those loose rows defined
//! lookup-with-fallback semantics (an ordered list of candidate headers,
//! matched case-insensitively), and `MappingConfig` declares which columns
//! feed which catalog fields.

use serde::{Deserialize, Serialize};

/// One record from the imported tabular source, as an ordered
/// header→value mapping. Immutable once captured; retained verbatim on the
/// created release for later repair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { cells: pairs }
    }

    /// Append a cell (headers keep source order)
    pub fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.cells.push((header.into(), value.into()));
    }

    /// Case-insensitive header lookup; returns the trimmed value, or None
    /// when the column is absent or blank
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h.trim().eq_ignore_ascii_case(header.trim()))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Try an ordered list of candidate headers, returning the first
    /// non-blank value
    pub fn first_of<S: AsRef<str>>(&self, headers: &[S]) -> Option<&str> {
        headers.iter().find_map(|h| self.get(h.as_ref()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

/// Column sources for one track slot within a row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackColumns {
    pub name: String,
    pub performer: Option<String>,
    pub composer: Option<String>,
    pub band: Option<String>,
    pub producer: Option<String>,
    pub studio: Option<String>,
    pub label: Option<String>,
    pub genre: Option<String>,
}

/// Column source for one platform's distribution status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformColumn {
    pub platform: String,
    pub column: String,
}

/// Declares, per target field, which CSV column(s) supply it
///
/// Created once per import session and persisted as session state. The
/// failed-rows retry queue lives in its own table keyed by session id, not
/// inside this config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Columns checked (in order) for the release title
    pub title_columns: Vec<String>,
    /// Alternate columns searched when the mapped title fails the
    /// wrong-column check
    pub title_fallback_columns: Vec<String>,
    /// Columns checked for the comma-separated artist name cell
    pub artist_columns: Vec<String>,
    /// Columns checked for a pre-resolved artist identifier
    pub artist_id_columns: Vec<String>,
    /// Columns checked for an explicit release type marker
    pub release_type_columns: Vec<String>,
    /// Columns appended into the release notes field
    pub notes_columns: Vec<String>,
    /// Columns carrying the free-text A&R credit
    pub ar_columns: Vec<String>,
    /// Ordered track slots; empty name cells are skipped, not numbered
    pub tracks: Vec<TrackColumns>,
    /// Platform status columns producing distribution requests
    pub platforms: Vec<PlatformColumn>,
}

/// Number of track slots in the legacy export layout
const DEFAULT_TRACK_SLOTS: usize = 12;

impl Default for MappingConfig {
    fn default() -> Self {
        let tracks = (1..=DEFAULT_TRACK_SLOTS)
            .map(|i| TrackColumns {
                name: format!("Song {}", i),
                performer: Some(format!("Performer {}", i)),
                composer: Some(format!("Composer {}", i)),
                band: Some("Band".to_string()),
                producer: Some("Producer".to_string()),
                studio: Some("Studio".to_string()),
                label: Some("Label".to_string()),
                genre: Some("Genre".to_string()),
            })
            .collect();

        Self {
            title_columns: vec![
                "Album/Single Name".to_string(),
                "Release Title".to_string(),
                "Album Name".to_string(),
                "Title".to_string(),
            ],
            title_fallback_columns: vec![
                "Album/Single Name".to_string(),
                "Release Title".to_string(),
                "Album Name".to_string(),
                "Single Name".to_string(),
                "Name".to_string(),
            ],
            artist_columns: vec![
                "Artist Name".to_string(),
                "Artist(s)".to_string(),
                "Artists".to_string(),
                "Artist".to_string(),
            ],
            artist_id_columns: vec!["Artist ID".to_string()],
            release_type_columns: vec!["Release Type".to_string(), "Type".to_string()],
            notes_columns: vec![
                "Notes".to_string(),
                "Comments".to_string(),
                "Remarks".to_string(),
            ],
            ar_columns: vec!["A&R".to_string(), "A&R Contact".to_string(), "AR".to_string()],
            tracks,
            platforms: vec![
                PlatformColumn {
                    platform: "YouTube".to_string(),
                    column: "YouTube Status".to_string(),
                },
                PlatformColumn {
                    platform: "Flow".to_string(),
                    column: "Flow Status".to_string(),
                },
                PlatformColumn {
                    platform: "TikTok".to_string(),
                    column: "TikTok Status".to_string(),
                },
            ],
        }
    }
}
