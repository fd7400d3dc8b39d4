use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Display;

/// How many digest bytes survive truncation. Six bytes encode to exactly
/// eight base64 characters, so derived codes are always 8 characters long.
const DIGEST_PREFIX_LEN: usize = 6;

/// A short code identifying a shortened URL.
///
/// Codes are content-addressed: [`ShortCode::derive`] is a pure function of
/// the long URL's bytes, so the same URL always yields the same code. That
/// determinism is what lets backends detect a duplicate write as a
/// uniqueness conflict instead of pre-checking for existence.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShortCode(String);

impl ShortCode {
    /// Derives the short code for a long URL.
    ///
    /// SHA-256 over the input, truncated to the first six digest bytes and
    /// encoded as unpadded URL-safe base64. Truncation collisions between
    /// distinct URLs are probabilistically rare and deliberately unhandled.
    pub fn derive<T: AsRef<[u8]>>(long_url: T) -> Self {
        let digest = Sha256::digest(long_url.as_ref());
        Self(URL_SAFE_NO_PAD.encode(&digest[..DIGEST_PREFIX_LEN]))
    }

    /// Creates a `ShortCode` from a string without re-deriving it.
    ///
    /// Use this only for codes produced by trusted sources: a previous
    /// [`ShortCode::derive`] call, a storage row, or a replayed log line.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortCode").field(&self.0).finish()
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ShortCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShortCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = ShortCode::derive("https://practicum.yandex.ru");
        let b = ShortCode::derive("https://practicum.yandex.ru");
        assert_eq!(a, b);
    }

    #[test]
    fn known_inputs_yield_known_codes() {
        assert_eq!(ShortCode::derive("https://github.com").as_str(), "mW4fcUsI");
        assert_eq!(
            ShortCode::derive("https://example.com").as_str(),
            "EAaArVRs"
        );
    }

    #[test]
    fn derived_codes_are_url_safe() {
        let code = ShortCode::derive("https://example.com/some/long/path?q=1&r=2");
        assert_eq!(code.as_str().len(), 8);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn distinct_inputs_diverge() {
        // Collision resistance is probabilistic, but these two had better
        // not collide.
        let a = ShortCode::derive("https://example.com/a");
        let b = ShortCode::derive("https://example.com/b");
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_plain_string() {
        let code = ShortCode::derive("https://github.com");
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"mW4fcUsI\"");

        let back: ShortCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
