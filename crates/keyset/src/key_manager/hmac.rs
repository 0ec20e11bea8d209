//! Key manager for HMAC-SHA2 keys.
//!
//! # Wire format
//!
//! ```text
//! key:    {"version": 0, "params": {"hash": "SHA256", "tag_size": 16}, "key_value": "<base64url>"}
//! format: {"params": {"hash": "SHA256", "tag_size": 16}, "key_size": 32}
//! ```

use std::sync::Arc;

use keyset_common::{
    KeyMaterial, KeyMaterialType, KeyTemplate, KeysetError, OutputPrefixType, PrimitiveKind,
};
use serde::{Deserialize, Serialize};

use super::{KeyFactory, KeyTypeManager, PrimitiveFactory};
use crate::crypto::{
    self,
    mac::{MAX_KEY_SIZE, MIN_KEY_SIZE, MIN_TAG_SIZE},
    HashType, HmacSha2,
};
use crate::primitives::Primitive;

/// Key type identifier handled by [`HmacKeyManager`].
pub const HMAC_KEY_TYPE: &str = "type.keyset.dev/keyset.HmacKey";

const VERSION: u32 = 0;

/// Algorithm parameters shared by keys and formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmacParams {
    /// Underlying hash function.
    pub hash: HashType,
    /// Length of the emitted tag in bytes.
    pub tag_size: usize,
}

/// Parsed HMAC key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmacKey {
    /// Format version of this key.
    pub version: u32,
    /// Algorithm parameters.
    pub params: HmacParams,
    /// Raw HMAC key.
    pub key_value: KeyMaterial,
}

/// Parameters for generating an HMAC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmacKeyFormat {
    /// Algorithm parameters.
    pub params: HmacParams,
    /// Key length in bytes.
    pub key_size: usize,
}

/// Manages [`HMAC_KEY_TYPE`] keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct HmacKeyManager;

fn validate_params(params: &HmacParams) -> Result<(), String> {
    let max = params.hash.output_size();
    if params.tag_size < MIN_TAG_SIZE || params.tag_size > max {
        return Err(format!(
            "invalid tag size {} for {:?}; expected {MIN_TAG_SIZE}..={max}",
            params.tag_size, params.hash
        ));
    }
    Ok(())
}

fn validate_key_size(key_size: usize) -> Result<(), String> {
    if key_size < MIN_KEY_SIZE {
        return Err(format!("HMAC key too short: {key_size} bytes, minimum {MIN_KEY_SIZE}"));
    }
    if key_size > MAX_KEY_SIZE {
        return Err(format!("HMAC key too long: {key_size} bytes, maximum {MAX_KEY_SIZE}"));
    }
    Ok(())
}

impl KeyTypeManager for HmacKeyManager {
    type Key = HmacKey;
    type KeyFormat = HmacKeyFormat;

    fn key_type(&self) -> &str {
        HMAC_KEY_TYPE
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn key_material_type(&self) -> KeyMaterialType {
        KeyMaterialType::Symmetric
    }

    fn parse_key(&self, serialized: &[u8]) -> Result<HmacKey, KeysetError> {
        serde_json::from_slice(serialized).map_err(|e| KeysetError::parse(HMAC_KEY_TYPE, e))
    }

    fn serialize_key(&self, key: &HmacKey) -> Result<Vec<u8>, KeysetError> {
        serde_json::to_vec(key).map_err(|e| KeysetError::parse(HMAC_KEY_TYPE, e))
    }

    fn validate_key(&self, key: &HmacKey) -> Result<(), KeysetError> {
        if key.version > VERSION {
            return Err(KeysetError::InvalidKey(format!(
                "HMAC key version {} is newer than supported version {VERSION}",
                key.version
            )));
        }
        validate_key_size(key.key_value.len()).map_err(KeysetError::InvalidKey)?;
        validate_params(&key.params).map_err(KeysetError::InvalidKey)
    }

    fn primitive_factories(&self) -> Vec<PrimitiveFactory<HmacKey>> {
        vec![PrimitiveFactory::new(PrimitiveKind::Mac, |key: &HmacKey| {
            let mac = HmacSha2::new(key.params.hash, key.key_value.as_bytes(), key.params.tag_size)?;
            Ok(Primitive::Mac(Arc::new(mac)))
        })]
    }

    fn key_factory(&self) -> Option<&dyn KeyFactory<Key = HmacKey, KeyFormat = HmacKeyFormat>> {
        Some(self)
    }
}

impl KeyFactory for HmacKeyManager {
    type Key = HmacKey;
    type KeyFormat = HmacKeyFormat;

    fn parse_key_format(&self, serialized: &[u8]) -> Result<HmacKeyFormat, KeysetError> {
        serde_json::from_slice(serialized).map_err(|e| KeysetError::parse("HmacKeyFormat", e))
    }

    fn validate_key_format(&self, format: &HmacKeyFormat) -> Result<(), KeysetError> {
        validate_key_size(format.key_size).map_err(KeysetError::InvalidKeyFormat)?;
        validate_params(&format.params).map_err(KeysetError::InvalidKeyFormat)
    }

    fn create_key(&self, format: &HmacKeyFormat) -> Result<HmacKey, KeysetError> {
        Ok(HmacKey {
            version: VERSION,
            params: format.params,
            key_value: KeyMaterial::new(crypto::random_bytes(format.key_size)),
        })
    }
}

fn template(key_size: usize, hash: HashType, tag_size: usize) -> KeyTemplate {
    let format = HmacKeyFormat {
        params: HmacParams { hash, tag_size },
        key_size,
    };
    KeyTemplate {
        type_url: HMAC_KEY_TYPE.to_owned(),
        value: serde_json::to_vec(&format).unwrap_or_default(),
        output_prefix_type: OutputPrefixType::Tink,
    }
}

/// 32-byte key, SHA-256, 16-byte tag.
pub fn hmac_sha256_128bit_tag_template() -> KeyTemplate {
    template(32, HashType::Sha256, 16)
}

/// 32-byte key, SHA-256, 32-byte tag.
pub fn hmac_sha256_256bit_tag_template() -> KeyTemplate {
    template(32, HashType::Sha256, 32)
}

/// 64-byte key, SHA-512, 32-byte tag.
pub fn hmac_sha512_256bit_tag_template() -> KeyTemplate {
    template(64, HashType::Sha512, 32)
}
