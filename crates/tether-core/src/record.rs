use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Opaque identity of the anonymous user who created a record.
///
/// The value comes from an external signing scheme and is never inspected
/// here; any non-empty string scopes listing and deletion rights. The empty
/// string means "no owner" and is used for anonymous/system writes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The "no owner" identity used for anonymous writes.
    pub fn anonymous() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One shortened URL as a backend stores it.
///
/// `long_url`, `short_code` and `owner` are immutable once written; the only
/// legal mutation is the tombstone transition of `deleted` from false to
/// true. Tombstoned records are never physically removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// The original URL that was shortened.
    pub long_url: String,
    /// Content-derived code resolving back to `long_url`.
    pub short_code: ShortCode,
    /// Identity of the creator; scopes listing and deletion only.
    pub owner: OwnerId,
    /// Soft-delete tombstone.
    pub deleted: bool,
}

impl LinkRecord {
    /// Builds a live record for a fresh write, deriving the short code.
    pub fn new(owner: OwnerId, long_url: impl Into<String>) -> Self {
        let long_url = long_url.into();
        let short_code = ShortCode::derive(&long_url);
        Self {
            long_url,
            short_code,
            owner,
            deleted: false,
        }
    }
}
