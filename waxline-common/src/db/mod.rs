//! Shared database access for Waxline services

pub mod init;

pub use init::{init_database, init_schema};
