use crate::error::Result;
use crate::record::OwnerId;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One row of an owner-scoped listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedLink {
    /// The original URL.
    pub long_url: String,
    /// The code that resolves to it.
    pub short_code: ShortCode,
}

/// The backend-agnostic link storage contract.
///
/// Implemented once per backend (in-memory map with an append-only log, and
/// Postgres). Every operation must be safe to call from multiple concurrent
/// tasks; cancellation is structural — callers drop or wrap the returned
/// futures (e.g. `tokio::time::timeout`) rather than passing a token.
#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// Resolves a short code to its long URL.
    ///
    /// Resolution is global: ownership is not checked. Fails with
    /// `NotFound` if the code is absent and `Gone` if it is tombstoned.
    async fn get(&self, code: &ShortCode) -> Result<String>;

    /// Lists the live (non-tombstoned) links created by `owner`, in no
    /// particular order. Fails with `NoRecords` when nothing matches.
    async fn get_by_owner(&self, owner: &OwnerId) -> Result<Vec<OwnedLink>>;

    /// Persists a new record for `long_url` and returns its derived code.
    ///
    /// Writing content that already has a record — under any owner — fails
    /// with `AlreadyExists`, which carries the valid code; the original
    /// record and its owner are left untouched.
    async fn write(&self, owner: &OwnerId, long_url: &str) -> Result<ShortCode>;

    /// Applies [`LinkStore::write`] semantics to every item, all-or-nothing:
    /// the first failure aborts the batch and no item is persisted. On
    /// success the codes come back in input order.
    async fn batch_write(&self, owner: &OwnerId, long_urls: &[String]) -> Result<Vec<ShortCode>>;

    /// Tombstones the record for `code` if it exists, is live, and belongs
    /// to `owner`. Anything else — unknown code, foreign owner, already
    /// tombstoned — is a silent no-op, so the operation is idempotent and
    /// commutes with deletes of disjoint codes.
    async fn delete(&self, owner: &OwnerId, code: &ShortCode) -> Result<()>;

    /// Liveness probe. Always true for the in-memory backend; reflects real
    /// connectivity for Postgres.
    async fn ping(&self) -> bool;
}
