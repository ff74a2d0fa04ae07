//! The import pipeline: mapping configuration, row translation, artist
//! resolution, and the session orchestrator that drives them.

pub mod artist_resolver;
pub mod mapping;
pub mod orchestrator;
pub mod row_mapper;
