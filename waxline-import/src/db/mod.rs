//! Database access for the catalog import service
//!
//! Schema creation lives in `waxline-common`; these modules hold the
//! import-specific queries. Row persistence functions take a
//! `SqliteConnection` so they can run inside the orchestrator's per-row
//! transactions.

pub mod artists;
pub mod employees;
pub mod releases;
pub mod sessions;
pub mod settings;

pub use waxline_common::db::{init_database, init_schema};
