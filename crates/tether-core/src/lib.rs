//! Core types and traits for the Tether URL shortener.
//!
//! This crate defines the link data model, the content-addressed short-code
//! derivation, the backend-agnostic [`LinkStore`] contract, and the error
//! taxonomy shared by every storage backend.

pub mod error;
pub mod record;
pub mod shortcode;
pub mod store;

pub use error::{Result, StoreError};
pub use record::{LinkRecord, OwnerId};
pub use shortcode::ShortCode;
pub use store::{LinkStore, OwnedLink};
