//! Shared foundation for the OTAP workspace.
//!
//! Provides the pieces both `otapd` and `otc` build on:
//! - `SQLite` pool helpers and the `define_database!` macro
//! - device settings string codec
//! - semantic-version parsing and delivery selectors
//! - tracing initialization

pub mod db;
pub mod settings;
pub mod tracing_init;
pub mod version;
