//! SQLite storage for the device registry and check-in audit log.

pub mod db;
pub mod models;
pub mod queries;

#[cfg(test)]
mod tests;

pub use db::{Database, DatabaseError};
pub use models::{DeliveryResult, Device, NewVersionCheck, VersionCheck};
