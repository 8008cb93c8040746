//! OTAP provisioning server library.
//!
//! Core functionality for `otapd`:
//! - device registry and check-in audit log (SQLite)
//! - version catalog and firmware artifact store
//! - the delivery decision engine
//! - device-facing HTTP endpoints and the operator control surface
//! - best-effort event notifications

pub mod artifacts;
pub mod catalog;
pub mod delivery;
pub mod notify;
pub mod routes;
pub mod storage;
