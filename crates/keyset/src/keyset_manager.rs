//! Rotation tooling: add, promote, disable, destroy and delete keys.
//!
//! Every operation keeps the keyset valid once it has a primary. The primary
//! can never be disabled, destroyed or deleted, and only an enabled key can
//! become primary.

use keyset_common::{KeyEntry, KeyStatus, KeyTemplate, Keyset, KeysetError};
use tracing::info;

use crate::crypto;
use crate::keyset_handle::KeysetHandle;
use crate::registry::Registry;

/// Mutable builder over a keyset.
#[derive(Debug, Clone)]
pub struct KeysetManager {
    keyset: Keyset,
}

impl KeysetManager {
    /// Start from an empty keyset.
    pub fn new() -> Self {
        Self {
            keyset: Keyset {
                primary_key_id: 0,
                keys: Vec::new(),
            },
        }
    }

    /// Start from the keyset of `handle`.
    pub fn from_handle(handle: KeysetHandle) -> Self {
        Self {
            keyset: handle.into_keyset(),
        }
    }

    /// Snapshot the current keyset as a validated handle.
    ///
    /// # Errors
    ///
    /// Any error of [`KeysetHandle::new`], e.g. before a primary is set.
    pub fn handle(&self) -> Result<KeysetHandle, KeysetError> {
        KeysetHandle::new(self.keyset.clone())
    }

    /// The keyset being edited.
    pub fn keyset(&self) -> &Keyset {
        &self.keyset
    }

    /// Generate a key from `template` and append it as enabled, non-primary.
    ///
    /// Returns the new key id.
    ///
    /// # Errors
    ///
    /// Any error of [`Registry::new_key_data`].
    pub fn add(&mut self, registry: &Registry, template: &KeyTemplate) -> Result<u32, KeysetError> {
        let key_data = registry.new_key_data(template)?;
        let key_id = self.new_key_id();
        self.keyset.keys.push(KeyEntry {
            key_id,
            status: KeyStatus::Enabled,
            output_prefix_type: template.output_prefix_type,
            key_data: Some(key_data),
        });
        info!(key_id, key_type = %template.type_url, "key added");
        Ok(key_id)
    }

    /// Add a key from `template` and make it primary.
    ///
    /// # Errors
    ///
    /// Any error of [`KeysetManager::add`].
    pub fn rotate(&mut self, registry: &Registry, template: &KeyTemplate) -> Result<u32, KeysetError> {
        let key_id = self.add(registry, template)?;
        self.set_primary(key_id)?;
        Ok(key_id)
    }

    /// Make `key_id` the primary.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::NotFound`] if no such key exists;
    /// - [`KeysetError::InvalidKeyset`] if the key is not enabled.
    pub fn set_primary(&mut self, key_id: u32) -> Result<(), KeysetError> {
        let key = self.key(key_id)?;
        if key.status != KeyStatus::Enabled {
            return Err(KeysetError::InvalidKeyset(format!(
                "key {key_id} is {:?} and cannot become primary",
                key.status
            )));
        }
        self.keyset.primary_key_id = key_id;
        info!(key_id, "primary key set");
        Ok(())
    }

    /// Re-enable a disabled key.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::NotFound`] if no such key exists;
    /// - [`KeysetError::InvalidKeyset`] if the key was destroyed.
    pub fn enable(&mut self, key_id: u32) -> Result<(), KeysetError> {
        let key = self.key_mut(key_id)?;
        match key.status {
            KeyStatus::Destroyed => Err(KeysetError::InvalidKeyset(format!(
                "key {key_id} is destroyed and cannot be enabled"
            ))),
            KeyStatus::Enabled | KeyStatus::Disabled => {
                key.status = KeyStatus::Enabled;
                info!(key_id, "key enabled");
                Ok(())
            }
        }
    }

    /// Disable a non-primary key; it stays listed but is never used.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::NotFound`] if no such key exists;
    /// - [`KeysetError::InvalidKeyset`] for the primary or a destroyed key.
    pub fn disable(&mut self, key_id: u32) -> Result<(), KeysetError> {
        self.ensure_not_primary(key_id, "disabled")?;
        let key = self.key_mut(key_id)?;
        match key.status {
            KeyStatus::Destroyed => Err(KeysetError::InvalidKeyset(format!(
                "key {key_id} is destroyed and cannot be disabled"
            ))),
            KeyStatus::Enabled | KeyStatus::Disabled => {
                key.status = KeyStatus::Disabled;
                info!(key_id, "key disabled");
                Ok(())
            }
        }
    }

    /// Erase a non-primary key's material, keeping only its id.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::NotFound`] if no such key exists;
    /// - [`KeysetError::InvalidKeyset`] for the primary.
    pub fn destroy(&mut self, key_id: u32) -> Result<(), KeysetError> {
        self.ensure_not_primary(key_id, "destroyed")?;
        let key = self.key_mut(key_id)?;
        key.status = KeyStatus::Destroyed;
        // Dropping the material zeroes it.
        key.key_data = None;
        info!(key_id, "key destroyed");
        Ok(())
    }

    /// Remove a non-primary key entirely, together with any destroyed entry
    /// sharing its id.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::NotFound`] if no such key exists;
    /// - [`KeysetError::InvalidKeyset`] for the primary.
    pub fn delete(&mut self, key_id: u32) -> Result<(), KeysetError> {
        self.ensure_not_primary(key_id, "deleted")?;
        self.key(key_id)?;
        self.keyset.keys.retain(|k| k.key_id != key_id);
        info!(key_id, "key deleted");
        Ok(())
    }

    fn ensure_not_primary(&self, key_id: u32, action: &str) -> Result<(), KeysetError> {
        if !self.keyset.keys.is_empty() && self.keyset.primary_key_id == key_id {
            return Err(KeysetError::InvalidKeyset(format!(
                "primary key {key_id} cannot be {action}"
            )));
        }
        Ok(())
    }

    fn key(&self, key_id: u32) -> Result<&KeyEntry, KeysetError> {
        self.keyset
            .key(key_id)
            .ok_or_else(|| KeysetError::NotFound(format!("key {key_id} not in keyset")))
    }

    fn key_mut(&mut self, key_id: u32) -> Result<&mut KeyEntry, KeysetError> {
        self.keyset
            .key_mut(key_id)
            .ok_or_else(|| KeysetError::NotFound(format!("key {key_id} not in keyset")))
    }

    /// Random, non-zero, and unused by any key including destroyed ones.
    fn new_key_id(&self) -> u32 {
        loop {
            let id = crypto::random_key_id();
            if self.keyset.key(id).is_none() {
                return id;
            }
        }
    }
}

impl Default for KeysetManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use keyset_common::OutputPrefixType;

    use super::*;
    use crate::key_manager::hmac::hmac_sha256_128bit_tag_template;
    use crate::key_manager::{HmacKeyManager, KeyManagerImpl};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register_key_manager(Arc::new(KeyManagerImpl::new(HmacKeyManager).unwrap()), false)
            .unwrap();
        registry
    }

    #[test]
    fn rotate_makes_new_key_primary() {
        let registry = registry();
        let template = hmac_sha256_128bit_tag_template();
        let mut manager = KeysetManager::new();
        let first = manager.rotate(&registry, &template).unwrap();
        let second = manager.rotate(&registry, &template).unwrap();

        let handle = manager.handle().unwrap();
        assert_eq!(handle.keyset().primary_key_id, second);
        assert_ne!(first, second);
        assert_eq!(handle.keyset_info().key_info.len(), 2);
    }

    #[test]
    fn empty_manager_has_no_valid_handle() {
        assert!(matches!(KeysetManager::new().handle(), Err(KeysetError::EmptyKeyset)));
    }

    #[test]
    fn key_ids_are_unique_and_nonzero() {
        let registry = registry();
        let template = hmac_sha256_128bit_tag_template();
        let mut manager = KeysetManager::new();
        let mut ids = HashSet::new();
        for _ in 0..32 {
            let id = manager.add(&registry, &template).unwrap();
            assert_ne!(id, 0);
            assert!(ids.insert(id));
        }
    }

    #[test]
    fn primary_is_protected() {
        let registry = registry();
        let template = hmac_sha256_128bit_tag_template();
        let mut manager = KeysetManager::new();
        let primary = manager.rotate(&registry, &template).unwrap();

        for result in [
            manager.clone().disable(primary),
            manager.clone().destroy(primary),
            manager.clone().delete(primary),
        ] {
            assert!(matches!(result, Err(KeysetError::InvalidKeyset(_))));
        }
    }

    #[test]
    fn only_enabled_keys_become_primary() {
        let registry = registry();
        let template = hmac_sha256_128bit_tag_template();
        let mut manager = KeysetManager::new();
        manager.rotate(&registry, &template).unwrap();
        let other = manager.add(&registry, &template).unwrap();

        manager.disable(other).unwrap();
        assert!(matches!(manager.set_primary(other), Err(KeysetError::InvalidKeyset(_))));
        manager.enable(other).unwrap();
        manager.set_primary(other).unwrap();
        assert!(matches!(manager.set_primary(12345), Err(KeysetError::NotFound(_))));
    }

    #[test]
    fn destroyed_keys_keep_only_their_id() {
        let registry = registry();
        let template = KeyTemplate {
            output_prefix_type: OutputPrefixType::Raw,
            ..hmac_sha256_128bit_tag_template()
        };
        let mut manager = KeysetManager::new();
        manager.rotate(&registry, &template).unwrap();
        let old = manager.add(&registry, &template).unwrap();
        manager.destroy(old).unwrap();

        let entry = manager.keyset().key(old).unwrap();
        assert_eq!(entry.status, KeyStatus::Destroyed);
        assert!(entry.key_data.is_none());
        assert!(matches!(manager.enable(old), Err(KeysetError::InvalidKeyset(_))));
        assert!(manager.handle().is_ok());
    }

    #[test]
    fn lookups_prefer_the_live_key_over_a_destroyed_namesake() {
        let registry = registry();
        let template = hmac_sha256_128bit_tag_template();
        let live = KeyEntry {
            key_id: 7,
            status: KeyStatus::Enabled,
            output_prefix_type: OutputPrefixType::Tink,
            key_data: Some(registry.new_key_data(&template).unwrap()),
        };
        let destroyed = KeyEntry {
            status: KeyStatus::Destroyed,
            key_data: None,
            ..live.clone()
        };
        let handle = KeysetHandle::new(Keyset {
            primary_key_id: 7,
            keys: vec![destroyed, live],
        })
        .unwrap();
        let set = handle
            .primitive_set(&registry, keyset_common::PrimitiveKind::Mac)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.primary().key_id(), 7);

        let mut manager = KeysetManager::from_handle(handle);
        let other = manager.add(&registry, &template).unwrap();
        manager.set_primary(other).unwrap();
        manager.disable(7).unwrap();
        assert_eq!(manager.keyset().keys[0].status, KeyStatus::Destroyed);
        assert_eq!(manager.keyset().keys[1].status, KeyStatus::Disabled);
        manager.enable(7).unwrap();
        manager.set_primary(7).unwrap();
        assert!(manager.handle().is_ok());
    }

    #[test]
    fn delete_removes_the_entry() {
        let registry = registry();
        let template = hmac_sha256_128bit_tag_template();
        let mut manager = KeysetManager::new();
        let old = manager.rotate(&registry, &template).unwrap();
        manager.rotate(&registry, &template).unwrap();
        manager.delete(old).unwrap();
        assert!(manager.keyset().key(old).is_none());
        assert!(matches!(manager.delete(old), Err(KeysetError::NotFound(_))));
    }
}
