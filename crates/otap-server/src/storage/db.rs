//! Database connection and initialization.

pub use otap_core::db::DatabaseError;

otap_core::define_database!(Database, "Registry database migrations complete");
