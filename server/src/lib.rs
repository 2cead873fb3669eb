//! Rule-based search over a membership CRM
//!
//! - `data` - Filter engine and SQLite storage
//! - `domain` - Searchable entities and segments
//! - `api` - HTTP surface
//! - `core` - CLI, configuration and lifecycle

pub mod api;
mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
