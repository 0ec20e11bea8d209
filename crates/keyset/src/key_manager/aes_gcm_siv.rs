//! Key manager for AES-GCM-SIV keys.
//!
//! One key backs two capabilities: randomised [`crate::primitives::Aead`] and
//! [`crate::primitives::DeterministicAead`].
//!
//! # Wire format
//!
//! ```text
//! key:    {"version": 0, "key_value": "<base64url>"}
//! format: {"key_size": 16 | 32}
//! ```

use std::sync::Arc;

use keyset_common::{
    KeyMaterial, KeyMaterialType, KeyTemplate, KeysetError, OutputPrefixType, PrimitiveKind,
};
use serde::{Deserialize, Serialize};

use super::{KeyFactory, KeyTypeManager, PrimitiveFactory};
use crate::crypto::{self, cipher::KEY_SIZES, AesGcmSiv};
use crate::primitives::Primitive;

/// Key type identifier handled by [`AesGcmSivKeyManager`].
pub const AES_GCM_SIV_KEY_TYPE: &str = "type.keyset.dev/keyset.AesGcmSivKey";

const VERSION: u32 = 0;

/// Parsed AES-GCM-SIV key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AesGcmSivKey {
    /// Format version of this key.
    pub version: u32,
    /// Raw AES key, 16 or 32 bytes.
    pub key_value: KeyMaterial,
}

/// Parameters for generating an AES-GCM-SIV key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AesGcmSivKeyFormat {
    /// Key length in bytes.
    pub key_size: usize,
}

/// Manages [`AES_GCM_SIV_KEY_TYPE`] keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmSivKeyManager;

fn validate_key_size(key_size: usize) -> Result<(), String> {
    if KEY_SIZES.contains(&key_size) {
        Ok(())
    } else {
        Err(format!("invalid AES-GCM-SIV key size {key_size}; expected 16 or 32 bytes"))
    }
}

impl KeyTypeManager for AesGcmSivKeyManager {
    type Key = AesGcmSivKey;
    type KeyFormat = AesGcmSivKeyFormat;

    fn key_type(&self) -> &str {
        AES_GCM_SIV_KEY_TYPE
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn key_material_type(&self) -> KeyMaterialType {
        KeyMaterialType::Symmetric
    }

    fn parse_key(&self, serialized: &[u8]) -> Result<AesGcmSivKey, KeysetError> {
        serde_json::from_slice(serialized).map_err(|e| KeysetError::parse(AES_GCM_SIV_KEY_TYPE, e))
    }

    fn serialize_key(&self, key: &AesGcmSivKey) -> Result<Vec<u8>, KeysetError> {
        serde_json::to_vec(key).map_err(|e| KeysetError::parse(AES_GCM_SIV_KEY_TYPE, e))
    }

    fn validate_key(&self, key: &AesGcmSivKey) -> Result<(), KeysetError> {
        if key.version > VERSION {
            return Err(KeysetError::InvalidKey(format!(
                "AES-GCM-SIV key version {} is newer than supported version {VERSION}",
                key.version
            )));
        }
        validate_key_size(key.key_value.len()).map_err(KeysetError::InvalidKey)
    }

    fn primitive_factories(&self) -> Vec<PrimitiveFactory<AesGcmSivKey>> {
        vec![
            PrimitiveFactory::new(PrimitiveKind::Aead, |key: &AesGcmSivKey| {
                Ok(Primitive::Aead(Arc::new(AesGcmSiv::new(key.key_value.as_bytes())?)))
            }),
            PrimitiveFactory::new(PrimitiveKind::DeterministicAead, |key: &AesGcmSivKey| {
                Ok(Primitive::DeterministicAead(Arc::new(AesGcmSiv::new(
                    key.key_value.as_bytes(),
                )?)))
            }),
        ]
    }

    fn key_factory(
        &self,
    ) -> Option<&dyn KeyFactory<Key = AesGcmSivKey, KeyFormat = AesGcmSivKeyFormat>> {
        Some(self)
    }
}

impl KeyFactory for AesGcmSivKeyManager {
    type Key = AesGcmSivKey;
    type KeyFormat = AesGcmSivKeyFormat;

    fn parse_key_format(&self, serialized: &[u8]) -> Result<AesGcmSivKeyFormat, KeysetError> {
        serde_json::from_slice(serialized)
            .map_err(|e| KeysetError::parse("AesGcmSivKeyFormat", e))
    }

    fn validate_key_format(&self, format: &AesGcmSivKeyFormat) -> Result<(), KeysetError> {
        validate_key_size(format.key_size).map_err(KeysetError::InvalidKeyFormat)
    }

    fn create_key(&self, format: &AesGcmSivKeyFormat) -> Result<AesGcmSivKey, KeysetError> {
        Ok(AesGcmSivKey {
            version: VERSION,
            key_value: KeyMaterial::new(crypto::random_bytes(format.key_size)),
        })
    }
}

fn template(key_size: usize, output_prefix_type: OutputPrefixType) -> KeyTemplate {
    KeyTemplate {
        type_url: AES_GCM_SIV_KEY_TYPE.to_owned(),
        // Serializing a plain struct of integers cannot fail.
        value: serde_json::to_vec(&AesGcmSivKeyFormat { key_size }).unwrap_or_default(),
        output_prefix_type,
    }
}

/// AES-128-GCM-SIV with a TINK prefix.
pub fn aes128_gcm_siv_template() -> KeyTemplate {
    template(16, OutputPrefixType::Tink)
}

/// AES-256-GCM-SIV with a TINK prefix.
pub fn aes256_gcm_siv_template() -> KeyTemplate {
    template(32, OutputPrefixType::Tink)
}

/// AES-256-GCM-SIV without a prefix.
pub fn aes256_gcm_siv_raw_template() -> KeyTemplate {
    template(32, OutputPrefixType::Raw)
}
