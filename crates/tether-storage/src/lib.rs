//! Storage backends for the Tether URL shortener.
//!
//! Two interchangeable implementations of the [`LinkStore`] contract:
//! [`MemoryStore`], a map guarded by a mutex and made durable through an
//! append-only JSON-lines log, and [`PgStore`], backed by Postgres with a
//! unique constraint on the long URL and a tombstone column.
//!
//! [`LinkStore`]: tether_core::LinkStore

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;
