//! HTTP API handlers

pub mod artists;
pub mod health;
pub mod import_workflow;
pub mod repair;
pub mod sse;

pub use artists::artist_routes;
pub use health::health_routes;
pub use import_workflow::import_routes;
pub use repair::repair_routes;
pub use sse::event_stream;
