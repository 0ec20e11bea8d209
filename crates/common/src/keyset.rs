//! Keyset data model exchanged between the keyset crates and their callers.
//!
//! These types are serialised as JSON; byte fields are encoded as unpadded
//! base64url strings.

use std::collections::HashSet;
use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::KeysetError;

// ---------------------------------------------------------------------------
// Key metadata enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a key inside a keyset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    /// Usable for every operation; the only status a primary may have.
    Enabled,
    /// Kept in the keyset but never turned into a primitive.
    Disabled,
    /// Key material has been erased; only the id remains.
    Destroyed,
}

/// Controls whether and how an identifying prefix is attached to primitive outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputPrefixType {
    /// `0x01 || key_id` prefix.
    Tink,
    /// `0x00 || key_id` prefix; legacy-compatible payload handling.
    Legacy,
    /// `0x00 || key_id` prefix.
    Crunchy,
    /// No prefix at all.
    Raw,
}

/// Classification of key material, fixed per key type by its manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyMaterialType {
    /// Secret symmetric key.
    Symmetric,
    /// Secret half of an asymmetric key pair.
    AsymmetricPrivate,
    /// Public half of an asymmetric key pair.
    AsymmetricPublic,
    /// Reference to a key held by a remote system.
    Remote,
}

impl KeyMaterialType {
    /// Returns `true` if material of this type may leave the process.
    pub fn is_exportable(self) -> bool {
        matches!(self, KeyMaterialType::AsymmetricPublic | KeyMaterialType::Remote)
    }
}

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// Serialized key material.
///
/// The buffer is overwritten with zeroes on drop and never printed.
#[derive(Clone, Default)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    /// Wrap serialized key bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of serialized bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for KeyMaterial {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

impl Serialize for KeyMaterial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        base64url::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for KeyMaterial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        base64url::deserialize(deserializer).map(Self)
    }
}

/// `serde(with = ...)` helper encoding byte vectors as unpadded base64url.
pub mod base64url {
    use super::*;

    /// Serialize bytes as an unpadded base64url string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Deserialize bytes from an unpadded base64url string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Key data and entries
// ---------------------------------------------------------------------------

/// Serialized key material together with the key type that can parse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyData {
    /// Key type identifier; the registry lookup key.
    pub type_url: String,
    /// Serialized key, understood only by the manager for `type_url`.
    pub value: KeyMaterial,
    /// Classification assigned by the manager.
    pub key_material_type: KeyMaterialType,
}

/// One key of a keyset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Identifier, unique among the keyset's enabled and disabled keys.
    pub key_id: u32,
    /// Lifecycle status.
    pub status: KeyStatus,
    /// Prefix policy for outputs produced with this key.
    pub output_prefix_type: OutputPrefixType,
    /// Key material; `None` once the key is destroyed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_data: Option<KeyData>,
}

impl KeyEntry {
    /// Key type identifier, if the material is still present.
    pub fn key_type(&self) -> Option<&str> {
        self.key_data.as_ref().map(|d| d.type_url.as_str())
    }

    /// Metadata view of this entry.
    pub fn info(&self) -> KeyInfo {
        KeyInfo {
            key_id: self.key_id,
            status: self.status,
            output_prefix_type: self.output_prefix_type,
            type_url: self.key_type().map(str::to_owned),
        }
    }
}

// ---------------------------------------------------------------------------
// Keyset
// ---------------------------------------------------------------------------

/// An ordered collection of keys with one designated primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyset {
    /// Id of the key used for encrypting and signing.
    pub primary_key_id: u32,
    /// Keys in insertion order.
    pub keys: Vec<KeyEntry>,
}

impl Keyset {
    /// Decode a keyset from its JSON representation and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::Parse`] on malformed JSON, or any error of
    /// [`Keyset::validate`].
    pub fn from_json(bytes: &[u8]) -> Result<Self, KeysetError> {
        let keyset: Keyset =
            serde_json::from_slice(bytes).map_err(|e| KeysetError::parse("keyset", e))?;
        keyset.validate()?;
        Ok(keyset)
    }

    /// Encode this keyset as JSON.
    ///
    /// The output contains secret key material.
    pub fn to_json(&self) -> Result<Vec<u8>, KeysetError> {
        serde_json::to_vec(self).map_err(|e| KeysetError::parse("keyset", e))
    }

    /// Look up a key by id.
    ///
    /// A destroyed entry may share its id with a live one; the live entry
    /// wins, and a destroyed entry is returned only when nothing else matches.
    pub fn key(&self, key_id: u32) -> Option<&KeyEntry> {
        self.key_position(key_id).map(|i| &self.keys[i])
    }

    /// Mutable counterpart of [`Keyset::key`].
    pub fn key_mut(&mut self, key_id: u32) -> Option<&mut KeyEntry> {
        self.key_position(key_id).map(move |i| &mut self.keys[i])
    }

    fn key_position(&self, key_id: u32) -> Option<usize> {
        let mut destroyed = None;
        for (i, k) in self.keys.iter().enumerate() {
            if k.key_id != key_id {
                continue;
            }
            if k.status != KeyStatus::Destroyed {
                return Some(i);
            }
            destroyed.get_or_insert(i);
        }
        destroyed
    }

    /// Check the structural invariants of a keyset.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::EmptyKeyset`] if no key is enabled;
    /// - [`KeysetError::InvalidKeyset`] on duplicate ids among enabled and
    ///   disabled keys, on destroyed keys that still carry material, or on live
    ///   keys without material;
    /// - [`KeysetError::NoPrimaryKey`] if the primary is absent or not enabled.
    pub fn validate(&self) -> Result<(), KeysetError> {
        let mut seen = HashSet::new();
        let mut enabled = 0usize;

        for key in &self.keys {
            match key.status {
                KeyStatus::Destroyed => {
                    if key.key_data.is_some() {
                        return Err(KeysetError::InvalidKeyset(format!(
                            "destroyed key {} still carries key material",
                            key.key_id
                        )));
                    }
                    continue;
                }
                KeyStatus::Enabled => enabled += 1,
                KeyStatus::Disabled => {}
            }
            if key.key_data.is_none() {
                return Err(KeysetError::InvalidKeyset(format!(
                    "key {} has no key material",
                    key.key_id
                )));
            }
            if !seen.insert(key.key_id) {
                return Err(KeysetError::InvalidKeyset(format!(
                    "duplicate key id {}",
                    key.key_id
                )));
            }
        }

        if enabled == 0 {
            return Err(KeysetError::EmptyKeyset);
        }

        match self.key(self.primary_key_id) {
            Some(k) if k.status == KeyStatus::Enabled => Ok(()),
            Some(_) => Err(KeysetError::NoPrimaryKey(format!(
                "primary key {} is not enabled",
                self.primary_key_id
            ))),
            None => Err(KeysetError::NoPrimaryKey(format!(
                "primary key {} is not in the keyset",
                self.primary_key_id
            ))),
        }
    }

    /// Metadata listing of every key, including disabled and destroyed ones.
    pub fn info(&self) -> KeysetInfo {
        KeysetInfo {
            primary_key_id: self.primary_key_id,
            key_info: self.keys.iter().map(KeyEntry::info).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Templates and metadata
// ---------------------------------------------------------------------------

/// Everything needed to generate a fresh key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTemplate {
    /// Key type identifier of the manager that generates the key.
    pub type_url: String,
    /// Serialized key format understood by that manager.
    #[serde(with = "base64url")]
    pub value: Vec<u8>,
    /// Prefix policy for the generated key.
    pub output_prefix_type: OutputPrefixType,
}

/// Non-secret view of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Key id.
    pub key_id: u32,
    /// Lifecycle status.
    pub status: KeyStatus,
    /// Prefix policy.
    pub output_prefix_type: OutputPrefixType,
    /// Key type identifier; `None` for destroyed keys.
    pub type_url: Option<String>,
}

/// Non-secret view of a keyset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetInfo {
    /// Id of the primary key.
    pub primary_key_id: u32,
    /// One entry per key, in keyset order.
    pub key_info: Vec<KeyInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key_id: u32, status: KeyStatus) -> KeyEntry {
        KeyEntry {
            key_id,
            status,
            output_prefix_type: OutputPrefixType::Tink,
            key_data: Some(KeyData {
                type_url: "type.keyset.dev/test.Key".into(),
                value: KeyMaterial::new(vec![1, 2, 3]),
                key_material_type: KeyMaterialType::Symmetric,
            }),
        }
    }

    #[test]
    fn valid_keyset_passes() {
        let ks = Keyset {
            primary_key_id: 1,
            keys: vec![entry(1, KeyStatus::Enabled), entry(2, KeyStatus::Disabled)],
        };
        assert!(ks.validate().is_ok());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let ks = Keyset {
            primary_key_id: 1,
            keys: vec![entry(1, KeyStatus::Enabled), entry(1, KeyStatus::Disabled)],
        };
        assert!(matches!(ks.validate(), Err(KeysetError::InvalidKeyset(_))));
    }

    #[test]
    fn destroyed_key_may_reuse_nothing_but_its_id() {
        let mut destroyed = entry(2, KeyStatus::Destroyed);
        let ks = Keyset {
            primary_key_id: 1,
            keys: vec![entry(1, KeyStatus::Enabled), destroyed.clone()],
        };
        assert!(matches!(ks.validate(), Err(KeysetError::InvalidKeyset(_))));

        destroyed.key_data = None;
        let ks = Keyset {
            primary_key_id: 1,
            keys: vec![entry(1, KeyStatus::Enabled), destroyed],
        };
        assert!(ks.validate().is_ok());
    }

    #[test]
    fn destroyed_entry_does_not_shadow_live_primary() {
        let mut destroyed = entry(1, KeyStatus::Destroyed);
        destroyed.key_data = None;
        let ks = Keyset {
            primary_key_id: 1,
            keys: vec![destroyed, entry(1, KeyStatus::Enabled)],
        };
        assert!(ks.validate().is_ok());
        assert_eq!(ks.key(1).map(|k| k.status), Some(KeyStatus::Enabled));
    }

    #[test]
    fn destroyed_entry_found_when_alone() {
        let mut destroyed = entry(2, KeyStatus::Destroyed);
        destroyed.key_data = None;
        let mut ks = Keyset {
            primary_key_id: 1,
            keys: vec![entry(1, KeyStatus::Enabled), destroyed],
        };
        assert_eq!(ks.key(2).map(|k| k.status), Some(KeyStatus::Destroyed));
        assert!(ks.key_mut(3).is_none());
        if let Some(k) = ks.key_mut(1) {
            k.status = KeyStatus::Disabled;
        }
        assert_eq!(ks.keys[0].status, KeyStatus::Disabled);
    }

    #[test]
    fn disabled_primary_rejected() {
        let ks = Keyset {
            primary_key_id: 2,
            keys: vec![entry(1, KeyStatus::Enabled), entry(2, KeyStatus::Disabled)],
        };
        assert!(matches!(ks.validate(), Err(KeysetError::NoPrimaryKey(_))));
    }

    #[test]
    fn missing_primary_rejected() {
        let ks = Keyset {
            primary_key_id: 9,
            keys: vec![entry(1, KeyStatus::Enabled)],
        };
        assert!(matches!(ks.validate(), Err(KeysetError::NoPrimaryKey(_))));
    }

    #[test]
    fn no_enabled_keys_is_empty() {
        let ks = Keyset {
            primary_key_id: 1,
            keys: vec![entry(1, KeyStatus::Disabled)],
        };
        assert!(matches!(ks.validate(), Err(KeysetError::EmptyKeyset)));
    }

    #[test]
    fn info_lists_every_key() {
        let mut destroyed = entry(3, KeyStatus::Destroyed);
        destroyed.key_data = None;
        let ks = Keyset {
            primary_key_id: 1,
            keys: vec![entry(1, KeyStatus::Enabled), entry(2, KeyStatus::Disabled), destroyed],
        };
        let info = ks.info();
        assert_eq!(info.primary_key_id, 1);
        assert_eq!(info.key_info.len(), 3);
        assert_eq!(info.key_info[1].status, KeyStatus::Disabled);
        assert_eq!(info.key_info[2].type_url, None);
    }

    #[test]
    fn json_round_trip_keeps_material() {
        let ks = Keyset {
            primary_key_id: 1,
            keys: vec![entry(1, KeyStatus::Enabled)],
        };
        let json = ks.to_json().unwrap();
        let text = String::from_utf8(json.clone()).unwrap();
        assert!(text.contains("\"ENABLED\""));
        let decoded = Keyset::from_json(&json).unwrap();
        let data = decoded.keys[0].key_data.as_ref().unwrap();
        assert_eq!(data.value.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(Keyset::from_json(b"{not json"), Err(KeysetError::Parse { .. })));
    }

    #[test]
    fn key_material_redacted_in_debug() {
        let m = KeyMaterial::new(vec![0xAA; 4]);
        assert!(format!("{m:?}").contains("REDACTED"));
    }

    #[test]
    fn only_public_and_remote_material_is_exportable() {
        assert!(KeyMaterialType::AsymmetricPublic.is_exportable());
        assert!(KeyMaterialType::Remote.is_exportable());
        assert!(!KeyMaterialType::Symmetric.is_exportable());
        assert!(!KeyMaterialType::AsymmetricPrivate.is_exportable());
    }
}
