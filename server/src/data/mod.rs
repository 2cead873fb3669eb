//! Data storage layer
//!
//! - `filters` - Rule-based filter engine (validation, compilation, pagination)
//! - `sqlite` - The relational store searches run against
//! - `types` - Row types shared by repositories and services
//! - `error` - Unified error type

pub mod error;
pub mod filters;
pub mod sqlite;
pub mod types;

pub use error::DataError;
pub use sqlite::SqliteService;
