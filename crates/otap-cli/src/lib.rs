//! OTAP control CLI library.

pub mod client;
pub mod table;
