//! Asynchronous bulk soft-delete for the Tether URL shortener.
//!
//! [`DeletePool`] decouples a bulk-delete request from the per-item
//! tombstone writes: items are fanned out to a bounded set of workers and
//! the caller is told nothing beyond "accepted". Best effort, eventual.

pub mod pool;

pub use pool::{DeletePool, DeleteReport, PoolSettings};
