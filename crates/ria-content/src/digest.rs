//! Content digest primitives
//!
//! Provides [`ContentDigest`], the SHA-256 of a document's raw bytes. The
//! digest is the only key the extraction cache is addressed by.

use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Length of a digest in bytes
pub const DIGEST_LEN: usize = 32;

/// Length of the hex rendering of a digest
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

/// SHA-256 digest of a document's raw bytes
///
/// Identical byte sequences always produce identical digests. Text is hashed
/// over its UTF-8 encoding, so `compute_str(s) == compute(s.as_bytes())`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Wrap raw digest bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Create digest from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DigestError> {
        let arr: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| DigestError::InvalidLength {
            expected: DIGEST_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Hash raw document bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash text over its UTF-8 encoding
    #[inline]
    #[must_use]
    pub fn compute_str(text: &str) -> Self {
        Self::compute(text.as_bytes())
    }

    /// Full lowercase hex rendering, the form used as a storage key
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short string representation (first 12 hex chars), for logs
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(DigestError::InvalidLength {
                expected: DIGEST_HEX_LEN,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for ContentDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Always serialized as the hex key, whatever the format
impl serde::Serialize for ContentDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for ContentDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DigestVisitor;

        impl serde::de::Visitor<'_> for DigestVisitor {
            type Value = ContentDigest;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                formatter.write_str("a 64 character hex SHA-256 digest")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(DigestVisitor)
    }
}

/// Errors that can occur when parsing content digests
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Invalid digest length
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn digest_matches_known_sha256() {
        let digest = ContentDigest::compute(b"abc");
        assert_eq!(
            digest.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_is_fixed_length_hex() {
        let digest = ContentDigest::compute(b"");
        let hex = digest.to_hex();
        assert_eq!(hex.len(), DIGEST_HEX_LEN);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn text_hashes_over_utf8() {
        let text = "Stadium revenue €8.5m per fixture.";
        assert_eq!(
            ContentDigest::compute_str(text),
            ContentDigest::compute(text.as_bytes())
        );
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let result = "abcd".parse::<ContentDigest>();
        assert!(matches!(
            result,
            Err(DigestError::InvalidLength { expected: 64, actual: 4 })
        ));
    }

    #[test]
    fn parse_rejects_non_hex() {
        let bad = "z".repeat(DIGEST_HEX_LEN);
        assert!(matches!(
            bad.parse::<ContentDigest>(),
            Err(DigestError::HexDecode(_))
        ));
    }

    #[test]
    fn from_slice_invalid_length() {
        let result = ContentDigest::from_slice(&[1u8; 31]);
        assert!(matches!(
            result,
            Err(DigestError::InvalidLength { expected: 32, actual: 31 })
        ));
    }

    #[test]
    fn short_is_prefix() {
        let digest = ContentDigest::compute(b"report.pdf");
        assert!(digest.to_string().starts_with(&digest.short()));
    }

    #[test]
    fn serde_uses_hex_string() {
        let digest = ContentDigest::compute(b"test");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{digest}\""));
        let decoded: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, digest);
    }

    proptest! {
        #[test]
        fn prop_equal_bytes_equal_digest(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let copy = data.clone();
            prop_assert_eq!(ContentDigest::compute(&data), ContentDigest::compute(&copy));
        }

        #[test]
        fn prop_distinct_bytes_distinct_digest(
            a in proptest::collection::vec(any::<u8>(), 0..256),
            b in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(ContentDigest::compute(&a), ContentDigest::compute(&b));
        }

        #[test]
        fn prop_display_parse_inverse(data in proptest::collection::vec(any::<u8>(), 0..128)) {
            let digest = ContentDigest::compute(&data);
            let parsed: ContentDigest = digest.to_string().parse().unwrap();
            prop_assert_eq!(parsed, digest);
        }
    }
}
