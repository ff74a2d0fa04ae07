//! # Waxline Common Library
//!
//! Shared code for the Waxline catalog services including:
//! - Error types
//! - Database initialization and schema
//! - Event types (CatalogEvent enum) and EventBus
//! - Configuration and data directory resolution

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
