//! Offline repair passes over already-imported catalog data
//!
//! Both passes scan the whole table, report what they would change, and
//! only write when dry-run is off. Every mutation is logged and returned
//! in the report so an operator can audit a pass after the fact.

pub mod employees;
pub mod titles;

/// One release or employee touched by a repair pass
#[derive(Debug, Clone, serde::Serialize)]
pub struct RepairAction {
    pub id: uuid::Uuid,
    pub description: String,
}

/// Outcome of one repair pass
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RepairReport {
    pub scanned: usize,
    pub flagged: usize,
    pub fixed: usize,
    pub skipped: usize,
    pub dry_run: bool,
    /// Operational failures (a findings entry is an action, not an error)
    pub errors: Vec<String>,
    pub actions: Vec<RepairAction>,
}
