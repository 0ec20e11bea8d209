//! Validated keysets and the entry point for obtaining primitives from them.

use keyset_common::{
    KeyEntry, KeyStatus, KeyTemplate, Keyset, KeysetError, KeysetInfo, PrimitiveKind,
};

use crate::crypto;
use crate::primitive_set::PrimitiveSet;
use crate::primitives::Primitive;
use crate::registry::Registry;

/// An immutable, validated keyset.
#[derive(Debug, Clone)]
pub struct KeysetHandle {
    keyset: Keyset,
}

impl KeysetHandle {
    /// Wrap `keyset` after validating it.
    ///
    /// # Errors
    ///
    /// Any error of [`Keyset::validate`].
    pub fn new(keyset: Keyset) -> Result<Self, KeysetError> {
        keyset.validate()?;
        Ok(Self { keyset })
    }

    /// Decode and validate a JSON keyset.
    ///
    /// # Errors
    ///
    /// Any error of [`Keyset::from_json`].
    pub fn from_json(bytes: &[u8]) -> Result<Self, KeysetError> {
        Keyset::from_json(bytes).map(|keyset| Self { keyset })
    }

    /// A one-key keyset generated from `template`.
    ///
    /// # Errors
    ///
    /// Any error of [`Registry::new_key_data`].
    pub fn generate_new(registry: &Registry, template: &KeyTemplate) -> Result<Self, KeysetError> {
        let key_data = registry.new_key_data(template)?;
        let key_id = crypto::random_key_id();
        Self::new(Keyset {
            primary_key_id: key_id,
            keys: vec![KeyEntry {
                key_id,
                status: KeyStatus::Enabled,
                output_prefix_type: template.output_prefix_type,
                key_data: Some(key_data),
            }],
        })
    }

    /// The underlying keyset, including secret material.
    pub fn keyset(&self) -> &Keyset {
        &self.keyset
    }

    /// Give up the handle and return the keyset.
    pub fn into_keyset(self) -> Keyset {
        self.keyset
    }

    /// Non-secret listing of every key, disabled and destroyed ones included.
    pub fn keyset_info(&self) -> KeysetInfo {
        self.keyset.info()
    }

    /// Build the primitive set of `kind` for this keyset.
    ///
    /// # Errors
    ///
    /// Any error of [`PrimitiveSet::from_keyset`].
    pub fn primitive_set(
        &self,
        registry: &Registry,
        kind: PrimitiveKind,
    ) -> Result<PrimitiveSet, KeysetError> {
        PrimitiveSet::from_keyset(registry, &self.keyset, kind)
    }

    /// Build the wrapped primitive of `kind` for this keyset.
    ///
    /// # Errors
    ///
    /// Any error of [`KeysetHandle::primitive_set`] or [`Registry::wrap`].
    pub fn primitive(&self, registry: &Registry, kind: PrimitiveKind) -> Result<Primitive, KeysetError> {
        registry.wrap(self.primitive_set(registry, kind)?, kind)
    }

    /// Encode the keyset as JSON, provided no key holds secret material.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::UnsupportedOperation`] if any key's material is
    /// symmetric or private.
    pub fn export_json(&self) -> Result<Vec<u8>, KeysetError> {
        let secret = self
            .keyset
            .keys
            .iter()
            .filter_map(|k| k.key_data.as_ref().map(|d| (k.key_id, d.key_material_type)))
            .find(|(_, material)| !material.is_exportable());
        if let Some((key_id, material)) = secret {
            return Err(KeysetError::UnsupportedOperation(format!(
                "key {key_id} holds {material:?} material and cannot be exported"
            )));
        }
        self.keyset.to_json()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use keyset_common::{KeyData, KeyMaterial, KeyMaterialType, OutputPrefixType};

    use super::*;
    use crate::key_manager::aes_gcm_siv::aes256_gcm_siv_template;
    use crate::key_manager::{AesGcmSivKeyManager, KeyManagerImpl};
    use crate::wrapper::AeadWrapper;

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register_key_manager(Arc::new(KeyManagerImpl::new(AesGcmSivKeyManager).unwrap()), false)
            .unwrap();
        registry.register_primitive_wrapper(Arc::new(AeadWrapper)).unwrap();
        registry
    }

    #[test]
    fn generated_handle_encrypts() {
        let registry = registry();
        let handle = KeysetHandle::generate_new(&registry, &aes256_gcm_siv_template()).unwrap();
        let info = handle.keyset_info();
        assert_eq!(info.key_info.len(), 1);
        assert_ne!(info.primary_key_id, 0);

        let aead = handle.primitive(&registry, PrimitiveKind::Aead).unwrap().into_aead().unwrap();
        let ct = aead.encrypt(b"hello", b"").unwrap();
        assert_eq!(ct[0], 0x01);
        assert_eq!(&ct[1..5], &info.primary_key_id.to_be_bytes());
        assert_eq!(aead.decrypt(&ct, b"").unwrap(), b"hello");
    }

    #[test]
    fn json_round_trip_keeps_working_keys() {
        let registry = registry();
        let handle = KeysetHandle::generate_new(&registry, &aes256_gcm_siv_template()).unwrap();
        let aead = handle.primitive(&registry, PrimitiveKind::Aead).unwrap().into_aead().unwrap();
        let ct = aead.encrypt(b"persisted", b"").unwrap();

        let restored = KeysetHandle::from_json(&handle.keyset().to_json().unwrap()).unwrap();
        let aead = restored.primitive(&registry, PrimitiveKind::Aead).unwrap().into_aead().unwrap();
        assert_eq!(aead.decrypt(&ct, b"").unwrap(), b"persisted");
    }

    #[test]
    fn unregistered_kind_fails_cleanly() {
        let registry = registry();
        let handle = KeysetHandle::generate_new(&registry, &aes256_gcm_siv_template()).unwrap();
        assert!(matches!(
            handle.primitive(&registry, PrimitiveKind::DeterministicAead),
            Err(KeysetError::NotFound(_))
        ));
        assert!(matches!(
            handle.primitive(&registry, PrimitiveKind::Mac),
            Err(KeysetError::UnsupportedPrimitive { .. })
        ));
    }

    #[test]
    fn secret_keysets_are_not_exportable() {
        let registry = registry();
        let handle = KeysetHandle::generate_new(&registry, &aes256_gcm_siv_template()).unwrap();
        assert!(matches!(
            handle.export_json(),
            Err(KeysetError::UnsupportedOperation(_))
        ));

        let public = KeysetHandle::new(Keyset {
            primary_key_id: 1,
            keys: vec![KeyEntry {
                key_id: 1,
                status: KeyStatus::Enabled,
                output_prefix_type: OutputPrefixType::Tink,
                key_data: Some(KeyData {
                    type_url: "type.keyset.dev/test.PublicKey".into(),
                    value: KeyMaterial::new(vec![4, 5, 6]),
                    key_material_type: KeyMaterialType::AsymmetricPublic,
                }),
            }],
        })
        .unwrap();
        assert!(public.export_json().is_ok());
    }

    #[test]
    fn invalid_keyset_rejected() {
        let keyset = Keyset {
            primary_key_id: 7,
            keys: Vec::new(),
        };
        assert!(matches!(KeysetHandle::new(keyset), Err(KeysetError::EmptyKeyset)));
    }
}
