//! Registry of key managers, primitive wrappers and catalogues.
//!
//! Lookups are lock-free reads of an [`ArcSwap`] snapshot. Registrations are
//! serialized by a writer mutex and publish a fresh snapshot, so a reader sees
//! either the state before a registration or the state after it, never a mix.
//!
//! The registry starts empty. Nothing is registered implicitly; bootstrap
//! code (see [`crate::config::RegistryConfig::apply`]) populates it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use arc_swap::ArcSwap;
use keyset_common::{KeyData, KeyEntry, KeyTemplate, KeysetError, PrimitiveKind};
use tracing::{info, warn};

use crate::catalogue::Catalogue;
use crate::key_manager::KeyManager;
use crate::primitive_set::PrimitiveSet;
use crate::primitives::Primitive;
use crate::wrapper::PrimitiveWrapper;

/// How a key manager is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationOptions {
    /// Replace a different manager already registered for the key type.
    pub allow_overwrite: bool,
    /// Allow [`Registry::new_key_data`] to generate keys of this type.
    pub new_key_allowed: bool,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            allow_overwrite: false,
            new_key_allowed: true,
        }
    }
}

#[derive(Clone)]
struct RegisteredManager {
    manager: Arc<dyn KeyManager>,
    new_key_allowed: bool,
}

#[derive(Clone, Default)]
struct RegistryState {
    managers: HashMap<String, RegisteredManager>,
    wrappers: HashMap<PrimitiveKind, Arc<dyn PrimitiveWrapper>>,
    catalogues: HashMap<String, Arc<dyn Catalogue>>,
}

/// Maps key types to managers and primitive kinds to wrappers.
pub struct Registry {
    state: ArcSwap<RegistryState>,
    writer: Mutex<()>,
}

fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(RegistryState::default()),
            writer: Mutex::new(()),
        }
    }

    /// The process-wide registry. Empty until explicitly populated.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// Drop every registration.
    pub fn reset(&self) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.state.store(Arc::new(RegistryState::default()));
        info!("registry reset");
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut RegistryState) -> Result<T, KeysetError>,
    ) -> Result<T, KeysetError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = RegistryState::clone(&self.state.load());
        let out = f(&mut next)?;
        self.state.store(Arc::new(next));
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Key managers
    // -----------------------------------------------------------------------

    /// Register `manager` for its key type, allowing key generation.
    ///
    /// # Errors
    ///
    /// See [`Registry::register_key_manager_with`].
    pub fn register_key_manager(
        &self,
        manager: Arc<dyn KeyManager>,
        allow_overwrite: bool,
    ) -> Result<(), KeysetError> {
        self.register_key_manager_with(
            manager,
            RegistrationOptions {
                allow_overwrite,
                ..RegistrationOptions::default()
            },
        )
    }

    /// Register `manager` for its key type.
    ///
    /// Re-registering the identical instance never fails. It can only turn
    /// key generation off: a flag that is already `false` stays `false`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::DuplicateRegistration`] if a different manager is
    /// registered for the key type and `allow_overwrite` is unset, or if a
    /// different manager would re-allow key generation that an earlier
    /// registration disallowed.
    pub fn register_key_manager_with(
        &self,
        manager: Arc<dyn KeyManager>,
        options: RegistrationOptions,
    ) -> Result<(), KeysetError> {
        let key_type = manager.key_type().to_owned();
        let version = manager.version();

        let (replaced, new_key_allowed) = self.update(|state| {
            let mut replaced = false;
            let mut new_key_allowed = options.new_key_allowed;
            if let Some(existing) = state.managers.get(&key_type) {
                if same_instance(&existing.manager, &manager) {
                    new_key_allowed &= existing.new_key_allowed;
                } else {
                    if !options.allow_overwrite {
                        return Err(KeysetError::DuplicateRegistration(format!(
                            "a different key manager is already registered for key type {key_type}"
                        )));
                    }
                    if new_key_allowed && !existing.new_key_allowed {
                        return Err(KeysetError::DuplicateRegistration(format!(
                            "new keys are already disallowed for key type {key_type}"
                        )));
                    }
                    replaced = true;
                }
            }
            state.managers.insert(
                key_type.clone(),
                RegisteredManager {
                    manager,
                    new_key_allowed,
                },
            );
            Ok((replaced, new_key_allowed))
        })?;

        if replaced {
            warn!(key_type = %key_type, version, "key manager replaced");
        } else {
            info!(
                key_type = %key_type,
                version,
                new_key_allowed,
                "key manager registered"
            );
        }
        Ok(())
    }

    /// The manager registered for `key_type`.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::NotFound`] if no manager is registered.
    pub fn key_manager(&self, key_type: &str) -> Result<Arc<dyn KeyManager>, KeysetError> {
        self.state
            .load()
            .managers
            .get(key_type)
            .map(|r| Arc::clone(&r.manager))
            .ok_or_else(|| {
                KeysetError::NotFound(format!("no key manager registered for key type {key_type}"))
            })
    }

    /// The manager registered for `key_type`, provided it builds `kind`.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::NotFound`] if no manager is registered;
    /// - [`KeysetError::UnsupportedPrimitive`] if it does not build `kind`.
    pub fn get_key_manager(
        &self,
        key_type: &str,
        kind: PrimitiveKind,
    ) -> Result<Arc<dyn KeyManager>, KeysetError> {
        let manager = self.key_manager(key_type)?;
        if !manager.supports_primitive(kind) {
            return Err(KeysetError::UnsupportedPrimitive {
                key_type: key_type.to_owned(),
                kind,
            });
        }
        Ok(manager)
    }

    /// Registered key types, sorted.
    pub fn key_managers(&self) -> Vec<String> {
        let mut types: Vec<String> = self.state.load().managers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Generate fresh key data from `template`.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::NotFound`] if the template's key type is unregistered;
    /// - [`KeysetError::UnsupportedOperation`] if key generation is disallowed
    ///   for that key type or unsupported by its manager;
    /// - any error of [`KeyManager::new_key_data`].
    pub fn new_key_data(&self, template: &KeyTemplate) -> Result<KeyData, KeysetError> {
        let registered = self
            .state
            .load()
            .managers
            .get(&template.type_url)
            .cloned()
            .ok_or_else(|| {
                KeysetError::NotFound(format!(
                    "no key manager registered for key type {}",
                    template.type_url
                ))
            })?;
        if !registered.new_key_allowed {
            return Err(KeysetError::UnsupportedOperation(format!(
                "new key generation is not allowed for key type {}",
                template.type_url
            )));
        }
        registered.manager.new_key_data(&template.value)
    }

    /// Build a primitive of `kind` from `key_data`.
    ///
    /// # Errors
    ///
    /// Any error of [`Registry::get_key_manager`] or [`KeyManager::primitive`].
    pub fn primitive(&self, key_data: &KeyData, kind: PrimitiveKind) -> Result<Primitive, KeysetError> {
        self.get_key_manager(&key_data.type_url, kind)?
            .primitive(key_data.value.as_bytes(), kind)
    }

    /// Build a primitive of `kind` from one keyset entry.
    ///
    /// # Errors
    ///
    /// [`KeysetError::InvalidKeyset`] if the entry has no material, otherwise
    /// any error of [`Registry::primitive`].
    pub fn get_primitive(&self, entry: &KeyEntry, kind: PrimitiveKind) -> Result<Primitive, KeysetError> {
        let key_data = entry.key_data.as_ref().ok_or_else(|| {
            KeysetError::InvalidKeyset(format!("key {} has no key material", entry.key_id))
        })?;
        self.primitive(key_data, kind)
    }

    // -----------------------------------------------------------------------
    // Wrappers
    // -----------------------------------------------------------------------

    /// Register `wrapper` for the kind it produces.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::DuplicateRegistration`] if a different wrapper is
    /// registered for that kind.
    pub fn register_primitive_wrapper(
        &self,
        wrapper: Arc<dyn PrimitiveWrapper>,
    ) -> Result<(), KeysetError> {
        let kind = wrapper.kind();
        self.update(|state| {
            if let Some(existing) = state.wrappers.get(&kind) {
                if same_instance(existing, &wrapper) {
                    return Ok(());
                }
                return Err(KeysetError::DuplicateRegistration(format!(
                    "a different wrapper is already registered for primitive {kind}"
                )));
            }
            state.wrappers.insert(kind, wrapper);
            Ok(())
        })?;
        info!(kind = %kind, "primitive wrapper registered");
        Ok(())
    }

    /// Wrap `set` into one primitive of `kind`.
    ///
    /// # Errors
    ///
    /// - [`KeysetError::NotFound`] if no wrapper is registered for `kind`;
    /// - [`KeysetError::KindMismatch`] if `set` holds another kind.
    pub fn wrap(&self, set: PrimitiveSet, kind: PrimitiveKind) -> Result<Primitive, KeysetError> {
        let wrapper = self
            .state
            .load()
            .wrappers
            .get(&kind)
            .cloned()
            .ok_or_else(|| KeysetError::NotFound(format!("no wrapper registered for primitive {kind}")))?;
        if set.kind() != kind {
            return Err(KeysetError::KindMismatch {
                expected: kind,
                actual: set.kind(),
            });
        }
        wrapper.wrap(Arc::new(set))
    }

    // -----------------------------------------------------------------------
    // Catalogues
    // -----------------------------------------------------------------------

    /// Register `catalogue` under `name`, matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::DuplicateRegistration`] if a different catalogue
    /// is registered under that name.
    pub fn add_catalogue(&self, name: &str, catalogue: Arc<dyn Catalogue>) -> Result<(), KeysetError> {
        self.add_catalogues([(name, catalogue)])
    }

    /// Register several catalogues at once. Either all of them are added or,
    /// on a conflict, none are.
    ///
    /// # Errors
    ///
    /// As [`Registry::add_catalogue`], for any of the names.
    pub fn add_catalogues<'a, I>(&self, catalogues: I) -> Result<(), KeysetError>
    where
        I: IntoIterator<Item = (&'a str, Arc<dyn Catalogue>)>,
    {
        let catalogues: Vec<(String, Arc<dyn Catalogue>)> = catalogues
            .into_iter()
            .map(|(name, catalogue)| (name.to_ascii_lowercase(), catalogue))
            .collect();
        self.update(|state| {
            for (name, catalogue) in &catalogues {
                if let Some(existing) = state.catalogues.get(name) {
                    if !same_instance(existing, catalogue) {
                        return Err(KeysetError::DuplicateRegistration(format!(
                            "a different catalogue is already registered under {name}"
                        )));
                    }
                }
                state.catalogues.insert(name.clone(), Arc::clone(catalogue));
            }
            Ok(())
        })?;
        for (name, _) in &catalogues {
            info!(catalogue = %name, "catalogue added");
        }
        Ok(())
    }

    /// The catalogue registered under `name`, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::NotFound`] if none is registered.
    pub fn catalogue(&self, name: &str) -> Result<Arc<dyn Catalogue>, KeysetError> {
        self.state
            .load()
            .catalogues
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| KeysetError::NotFound(format!("no catalogue named {name}")))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.load();
        let mut wrappers: Vec<_> = state.wrappers.keys().collect();
        wrappers.sort();
        let mut catalogues: Vec<_> = state.catalogues.keys().collect();
        catalogues.sort();
        f.debug_struct("Registry")
            .field("key_managers", &self.key_managers())
            .field("wrappers", &wrappers)
            .field("catalogues", &catalogues)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use keyset_common::{KeyMaterial, KeyMaterialType, KeyStatus, OutputPrefixType};

    use super::*;
    use crate::key_manager::aes_gcm_siv::{aes256_gcm_siv_template, AES_GCM_SIV_KEY_TYPE};
    use crate::key_manager::hmac::hmac_sha256_128bit_tag_template;
    use crate::key_manager::{AesGcmSivKeyManager, HmacKeyManager, KeyManagerImpl};
    use crate::wrapper::{AeadWrapper, MacWrapper};

    fn aes() -> Arc<dyn KeyManager> {
        Arc::new(KeyManagerImpl::new(AesGcmSivKeyManager).unwrap())
    }

    fn hmac() -> Arc<dyn KeyManager> {
        Arc::new(KeyManagerImpl::new(HmacKeyManager).unwrap())
    }

    #[test]
    fn starts_empty() {
        let registry = Registry::new();
        assert!(registry.key_managers().is_empty());
        assert!(matches!(
            registry.get_key_manager(AES_GCM_SIV_KEY_TYPE, PrimitiveKind::Aead),
            Err(KeysetError::NotFound(_))
        ));
    }

    #[test]
    fn identical_reregistration_is_a_no_op() {
        let registry = Registry::new();
        let km = aes();
        registry.register_key_manager(Arc::clone(&km), false).unwrap();
        registry.register_key_manager(Arc::clone(&km), false).unwrap();
        assert_eq!(registry.key_managers(), vec![AES_GCM_SIV_KEY_TYPE.to_owned()]);
    }

    #[test]
    fn identical_reregistration_can_only_disallow_generation() {
        let registry = Registry::new();
        let km = hmac();
        registry.register_key_manager(Arc::clone(&km), false).unwrap();
        registry
            .register_key_manager_with(
                Arc::clone(&km),
                RegistrationOptions {
                    allow_overwrite: false,
                    new_key_allowed: false,
                },
            )
            .unwrap();
        registry.register_key_manager(km, false).unwrap();
        assert!(matches!(
            registry.new_key_data(&hmac_sha256_128bit_tag_template()),
            Err(KeysetError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn distinct_manager_for_same_type_rejected() {
        let registry = Registry::new();
        registry.register_key_manager(aes(), false).unwrap();
        let err = registry.register_key_manager(aes(), false).unwrap_err();
        assert!(matches!(err, KeysetError::DuplicateRegistration(_)));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn overwrite_replaces_manager() {
        let registry = Registry::new();
        registry.register_key_manager(aes(), false).unwrap();
        let replacement = aes();
        registry.register_key_manager(Arc::clone(&replacement), true).unwrap();
        let current = registry.key_manager(AES_GCM_SIV_KEY_TYPE).unwrap();
        assert!(same_instance(&current, &replacement));
    }

    #[test]
    fn lookup_checks_capability() {
        let registry = Registry::new();
        registry.register_key_manager(hmac(), false).unwrap();
        assert!(registry
            .get_key_manager(crate::key_manager::hmac::HMAC_KEY_TYPE, PrimitiveKind::Mac)
            .is_ok());
        assert!(matches!(
            registry.get_key_manager(crate::key_manager::hmac::HMAC_KEY_TYPE, PrimitiveKind::Aead),
            Err(KeysetError::UnsupportedPrimitive { .. })
        ));
    }

    #[test]
    fn new_key_data_respects_generation_flag() {
        let registry = Registry::new();
        let km = aes();
        registry
            .register_key_manager_with(
                Arc::clone(&km),
                RegistrationOptions {
                    allow_overwrite: false,
                    new_key_allowed: false,
                },
            )
            .unwrap();
        assert!(matches!(
            registry.new_key_data(&aes256_gcm_siv_template()),
            Err(KeysetError::UnsupportedOperation(_))
        ));
        // Re-registering the same instance succeeds but keeps generation off.
        registry.register_key_manager(Arc::clone(&km), false).unwrap();
        assert!(matches!(
            registry.new_key_data(&aes256_gcm_siv_template()),
            Err(KeysetError::UnsupportedOperation(_))
        ));
        // A replacement cannot re-enable it either.
        assert!(matches!(
            registry.register_key_manager(aes(), true),
            Err(KeysetError::DuplicateRegistration(_))
        ));

        registry.register_key_manager(hmac(), false).unwrap();
        let data = registry.new_key_data(&hmac_sha256_128bit_tag_template()).unwrap();
        assert_eq!(data.key_material_type, KeyMaterialType::Symmetric);
    }

    #[test]
    fn wrapper_registration_and_wrap() {
        let registry = Registry::new();
        registry.register_key_manager(aes(), false).unwrap();
        let wrapper: Arc<dyn PrimitiveWrapper> = Arc::new(AeadWrapper);
        registry.register_primitive_wrapper(Arc::clone(&wrapper)).unwrap();
        registry.register_primitive_wrapper(wrapper).unwrap();
        assert!(matches!(
            registry.register_primitive_wrapper(Arc::new(AeadWrapper)),
            Err(KeysetError::DuplicateRegistration(_))
        ));

        let key = KeyEntry {
            key_id: 1,
            status: KeyStatus::Enabled,
            output_prefix_type: OutputPrefixType::Tink,
            key_data: Some(registry.new_key_data(&aes256_gcm_siv_template()).unwrap()),
        };
        let primitive = registry.get_primitive(&key, PrimitiveKind::Aead).unwrap();
        let mut builder = PrimitiveSet::builder(PrimitiveKind::Aead);
        builder.add(primitive, &key).unwrap();
        builder.set_primary(1);
        let set = builder.build().unwrap();

        let aead = registry.wrap(set, PrimitiveKind::Aead).unwrap().into_aead().unwrap();
        let ct = aead.encrypt(b"hello", b"").unwrap();
        assert_eq!(&ct[..5], &[0x01, 0, 0, 0, 1]);
        assert_eq!(aead.decrypt(&ct, b"").unwrap(), b"hello");
    }

    #[test]
    fn wrap_without_wrapper_is_not_found() {
        let registry = Registry::new();
        registry.register_primitive_wrapper(Arc::new(MacWrapper)).unwrap();
        let key = KeyEntry {
            key_id: 1,
            status: KeyStatus::Enabled,
            output_prefix_type: OutputPrefixType::Raw,
            key_data: Some(KeyData {
                type_url: AES_GCM_SIV_KEY_TYPE.into(),
                value: KeyMaterial::default(),
                key_material_type: KeyMaterialType::Symmetric,
            }),
        };
        let primitive = Primitive::Aead(Arc::new(crate::crypto::AesGcmSiv::new(&[0u8; 16]).unwrap()));
        let mut builder = PrimitiveSet::builder(PrimitiveKind::Aead);
        builder.add(primitive, &key).unwrap();
        builder.set_primary(1);
        let set = builder.build().unwrap();
        assert!(matches!(
            registry.wrap(set, PrimitiveKind::Aead),
            Err(KeysetError::NotFound(_))
        ));
    }

    #[test]
    fn entry_without_material_rejected() {
        let registry = Registry::new();
        let key = KeyEntry {
            key_id: 4,
            status: KeyStatus::Destroyed,
            output_prefix_type: OutputPrefixType::Tink,
            key_data: None,
        };
        assert!(matches!(
            registry.get_primitive(&key, PrimitiveKind::Aead),
            Err(KeysetError::InvalidKeyset(_))
        ));
    }

    #[test]
    fn reset_clears_everything() {
        let registry = Registry::new();
        registry.register_key_manager(aes(), false).unwrap();
        registry.register_primitive_wrapper(Arc::new(AeadWrapper)).unwrap();
        registry.reset();
        assert!(registry.key_managers().is_empty());
        // A fresh instance can be registered after a reset.
        registry.register_key_manager(aes(), false).unwrap();
    }

    #[test]
    fn concurrent_registration_and_lookup() {
        let registry = Arc::new(Registry::new());
        let km = aes();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let km = Arc::clone(&km);
                thread::spawn(move || {
                    registry.register_key_manager(km, false).unwrap();
                    registry
                        .get_key_manager(AES_GCM_SIV_KEY_TYPE, PrimitiveKind::Aead)
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.key_managers().len(), 1);
    }

    #[test]
    fn global_registry_is_shared() {
        assert!(std::ptr::eq(Registry::global(), Registry::global()));
    }
}
