//! Durable collaborator adapters.

#[cfg(feature = "database")]
pub mod postgres;

#[cfg(feature = "database")]
pub use postgres::*;
