//! HMAC-SHA2 message authentication with truncated tags.

use hmac::{Hmac, Mac as _};
use keyset_common::KeysetError;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use thiserror::Error;

use crate::primitives::Mac;

/// Shortest HMAC key accepted.
pub const MIN_KEY_SIZE: usize = 16;

/// Longest HMAC key accepted.
pub const MAX_KEY_SIZE: usize = 64;

/// Shortest tag accepted.
pub const MIN_TAG_SIZE: usize = 10;

/// Hash function underlying the HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashType {
    /// SHA-256, 32-byte digests.
    Sha256,
    /// SHA-512, 64-byte digests.
    Sha512,
}

impl HashType {
    /// Digest length in bytes.
    pub fn output_size(self) -> usize {
        match self {
            HashType::Sha256 => 32,
            HashType::Sha512 => 64,
        }
    }
}

/// Errors produced by the MAC layer.
#[derive(Debug, Error)]
pub enum MacError {
    /// The tag size is outside `MIN_TAG_SIZE..=digest size`.
    #[error("invalid tag size {tag_size} for {hash:?}")]
    InvalidTagSize {
        /// Requested tag size.
        tag_size: usize,
        /// Hash the tag would be cut from.
        hash: HashType,
    },

    /// The key was rejected by the HMAC implementation.
    #[error("invalid HMAC key")]
    InvalidKey,

    /// The tag does not authenticate the data.
    #[error("invalid MAC")]
    VerificationFailed,
}

impl From<MacError> for KeysetError {
    fn from(e: MacError) -> Self {
        match e {
            MacError::InvalidTagSize { .. } | MacError::InvalidKey => {
                KeysetError::InvalidKey(e.to_string())
            }
            MacError::VerificationFailed => KeysetError::Crypto(e.to_string()),
        }
    }
}

#[derive(Clone)]
enum Keyed {
    Sha256(Hmac<Sha256>),
    Sha512(Hmac<Sha512>),
}

/// HMAC primitive producing `tag_size`-byte tags.
///
/// Holds the keyed HMAC state only; the raw key is not retained.
pub struct HmacSha2 {
    keyed: Keyed,
    tag_size: usize,
}

impl HmacSha2 {
    /// Build an HMAC over `hash` keyed with `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::InvalidTagSize`] if `tag_size` is shorter than
    /// [`MIN_TAG_SIZE`] or longer than the digest.
    pub fn new(hash: HashType, key: &[u8], tag_size: usize) -> Result<Self, MacError> {
        if tag_size < MIN_TAG_SIZE || tag_size > hash.output_size() {
            return Err(MacError::InvalidTagSize { tag_size, hash });
        }
        let keyed = match hash {
            HashType::Sha256 => {
                Keyed::Sha256(Hmac::<Sha256>::new_from_slice(key).map_err(|_| MacError::InvalidKey)?)
            }
            HashType::Sha512 => {
                Keyed::Sha512(Hmac::<Sha512>::new_from_slice(key).map_err(|_| MacError::InvalidKey)?)
            }
        };
        Ok(Self { keyed, tag_size })
    }

    fn full_tag(&self, data: &[u8]) -> Vec<u8> {
        match self.keyed.clone() {
            Keyed::Sha256(mut m) => {
                m.update(data);
                m.finalize().into_bytes().to_vec()
            }
            Keyed::Sha512(mut m) => {
                m.update(data);
                m.finalize().into_bytes().to_vec()
            }
        }
    }
}

impl Mac for HmacSha2 {
    fn compute_mac(&self, data: &[u8]) -> Result<Vec<u8>, KeysetError> {
        let mut tag = self.full_tag(data);
        tag.truncate(self.tag_size);
        Ok(tag)
    }

    fn verify_mac(&self, tag: &[u8], data: &[u8]) -> Result<(), KeysetError> {
        if tag.len() != self.tag_size {
            return Err(MacError::VerificationFailed.into());
        }
        // Constant-time comparison of the leftmost `tag_size` bytes.
        let verified = match self.keyed.clone() {
            Keyed::Sha256(mut m) => {
                m.update(data);
                m.verify_truncated_left(tag)
            }
            Keyed::Sha512(mut m) => {
                m.update(data);
                m.verify_truncated_left(tag)
            }
        };
        verified.map_err(|_| MacError::VerificationFailed.into())
    }
}
