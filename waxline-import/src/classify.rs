//! Fuzzy content classification heuristics
//!
//! Pure, stateless predicates that decide whether a cell value "looks like"
//! free-text notes, a platform/status marker, a CSV concatenation artifact,
//! or a value that landed in the wrong column. Used at import time by the
//! row mapper and again by the offline repair passes.
//!
//! Classification is deliberately conservative: a false positive routes a
//! row to the reviewable problems queue, a false negative silently corrupts
//! catalog data. All thresholds were tuned against the legacy export and
//! are carried as configuration rather than derived.

/// Known distribution platform names (lowercase)
pub const PLATFORM_TOKENS: &[&str] = &[
    "youtube",
    "flow",
    "tiktok",
    "spotify",
    "deezer",
    "boomplay",
    "audiomack",
    "facebook",
    "instagram",
    "itunes",
];

/// Known distribution status tokens (lowercase)
pub const STATUS_TOKENS: &[&str] = &[
    "uploaded",
    "pending",
    "rejected",
    "approved",
    "monetization",
    "monetized",
    "whitelisted",
    "claimed",
    "takedown",
    "live",
];

/// Substrings that mark free-text remarks rather than titles or names
pub const NOTE_PATTERNS: &[&str] = &[
    "please",
    "note:",
    "important",
    "warning",
    "will whitelist",
    "kindly",
];

/// Tunable classifier cutoffs
///
/// Defaults encode tuning against the legacy spreadsheet exports, not a
/// general rule.
#[derive(Debug, Clone)]
pub struct ClassifierThresholds {
    /// Text longer than this is assumed to be notes
    pub notes_length: usize,
    /// A single unbroken word longer than this is assumed to be notes/junk
    pub long_word_length: usize,
    /// Fraction of tokens that must match platform/status vocabulary
    pub token_overlap_ratio: f64,
    /// Absolute matching-token count that also triggers a platform match
    pub min_token_matches: usize,
    /// Comma count at or above which text is treated as a CSV artifact
    pub min_comma_count: usize,
    /// Digit-run length treated as a timestamp-like identifier
    pub digit_run_length: usize,
    /// Maximum plausible employee name length
    pub max_employee_name_length: usize,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            notes_length: 100,
            long_word_length: 50,
            token_overlap_ratio: 0.30,
            min_token_matches: 2,
            min_comma_count: 2,
            digit_run_length: 6,
            max_employee_name_length: 50,
        }
    }
}

/// Heuristic content classifier
#[derive(Debug, Clone, Default)]
pub struct ContentClassifier {
    thresholds: ClassifierThresholds,
}

impl ContentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    /// True if the text reads like free-form remarks rather than a field value
    pub fn looks_like_notes(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }

        if trimmed.len() > self.thresholds.notes_length {
            return true;
        }

        // Three or more sentence-terminated clauses
        if trimmed.split(". ").count() > 2 {
            return true;
        }

        let lower = trimmed.to_lowercase();
        if NOTE_PATTERNS.iter().any(|p| lower.contains(p)) {
            return true;
        }
        // "copyright" is a remark unless it is part of a status column value
        if lower.contains("copyright") && !lower.contains("status") {
            return true;
        }

        if contains_url(&lower) || lower.contains('@') {
            return true;
        }

        // A single unbroken run this long is never a real title word
        trimmed
            .split_whitespace()
            .any(|w| w.len() > self.thresholds.long_word_length)
    }

    /// True if the text substantially consists of platform names or
    /// distribution status vocabulary
    pub fn looks_like_platform_or_status(&self, text: &str) -> bool {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return false;
        }

        let tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return false;
        }

        let matches = tokens
            .iter()
            .filter(|t| PLATFORM_TOKENS.contains(*t) || STATUS_TOKENS.contains(*t))
            .count();
        if matches == 0 {
            return false;
        }

        // Absolute count OR overlap ratio, to avoid flagging legitimate
        // titles that merely mention a platform once
        matches >= self.thresholds.min_token_matches
            || (matches as f64 / tokens.len() as f64) > self.thresholds.token_overlap_ratio
    }

    /// True if the text carries fingerprints of CSV concatenation:
    /// multiple commas, embedded dates, timestamp-like digit runs, or
    /// doubled periods from auto-generated identifiers
    pub fn looks_like_csv_artifact(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }

        if trimmed.matches(',').count() >= self.thresholds.min_comma_count {
            return true;
        }

        if contains_date_pattern(trimmed) {
            return true;
        }

        if longest_digit_run(trimmed) >= self.thresholds.digit_run_length {
            return true;
        }

        trimmed.contains("..")
    }

    /// Composite wrong-column check for release titles
    ///
    /// Used both when mapping a row at import time and when re-scanning
    /// persisted releases during repair.
    pub fn looks_like_wrong_column(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return true;
        }

        // Purely numeric/punctuation values are IDs, not titles
        if !trimmed.chars().any(|c| c.is_alphabetic()) {
            return true;
        }

        self.looks_like_notes(trimmed)
            || self.looks_like_platform_or_status(trimmed)
            || self.looks_like_csv_artifact(trimmed)
    }

    /// True if the text is a plausible employee name
    pub fn is_valid_employee_name(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.len() > self.thresholds.max_employee_name_length {
            return false;
        }
        if trimmed.contains('@') || trimmed.contains('#') || contains_url(&trimmed.to_lowercase())
        {
            return false;
        }
        if !trimmed.chars().any(|c| c.is_alphabetic()) {
            return false;
        }
        !self.looks_like_notes(trimmed)
            && !self.looks_like_platform_or_status(trimmed)
            && !self.looks_like_csv_artifact(trimmed)
    }
}

fn contains_url(lower: &str) -> bool {
    lower.contains("http://") || lower.contains("https://") || lower.contains("www.")
}

/// Detect `DD-MM-YY`-style date fragments (also `/`-separated)
fn contains_date_pattern(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let d1 = digit_run_at(bytes, i);
            let mut j = i + d1;
            if (1..=2).contains(&d1) && j < bytes.len() && (bytes[j] == b'-' || bytes[j] == b'/') {
                let sep = bytes[j];
                j += 1;
                let d2 = digit_run_at(bytes, j);
                let mut k = j + d2;
                if (1..=2).contains(&d2) && k < bytes.len() && bytes[k] == sep {
                    k += 1;
                    let d3 = digit_run_at(bytes, k);
                    if (2..=4).contains(&d3) {
                        return true;
                    }
                }
            }
            i += d1;
        } else {
            i += 1;
        }
    }
    false
}

fn digit_run_at(bytes: &[u8], start: usize) -> usize {
    bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count()
}

fn longest_digit_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c.is_ascii_digit() {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
