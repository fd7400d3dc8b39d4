use crate::shortcode::ShortCode;
use thiserror::Error;

/// Result type for link-store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The closed error taxonomy every storage backend maps into.
///
/// Callers branch on these variants exhaustively; the store itself never
/// retries, every failure is returned to the immediate caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record exists for the requested short code.
    #[error("link is not located in the service: {0}")]
    NotFound(ShortCode),

    /// A record exists for the short code but has been tombstoned. Distinct
    /// from [`StoreError::NotFound`] so callers can report "gone" rather
    /// than "never existed".
    #[error("link has been deleted: {0}")]
    Gone(ShortCode),

    /// The long URL already has a record, under any owner. Carries the
    /// existing (valid) short code so the caller can proceed as if the
    /// write had succeeded.
    #[error("link already exists in the service: {code}")]
    AlreadyExists { code: ShortCode },

    /// An owner-scoped listing matched nothing.
    #[error("user has no records")]
    NoRecords,

    /// Any underlying I/O, serialization, or connectivity failure,
    /// propagated unchanged.
    #[error("storage backend failure: {0}")]
    Backend(String),
}
