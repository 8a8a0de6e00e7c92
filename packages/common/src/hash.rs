use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use thiserror::Error;

/// Errors produced when parsing an image hash.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("expected 40 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// A validated SHA-1 digest of an image binary.
///
/// The CDR lookup tables store these as upper-case hex, so that is the
/// canonical textual form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHash([u8; 20]);

impl ImageHash {
    /// Compute the SHA-1 hash of raw image bytes.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha1::digest(data);
        Self(hash.into())
    }

    /// Parse a hex-encoded hash. Either case is accepted.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let s = s.trim();
        if s.len() != 40 {
            return Err(HashError::InvalidLength(s.len()));
        }

        let bytes = hex::decode(s).map_err(|e| HashError::InvalidHex(e.to_string()))?;

        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| HashError::InvalidHex("decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    /// Return the hash as a 40-character upper-case hex string.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Debug for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageHash({})", self.to_hex())
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ImageHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ImageHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
